//! Provider profiles
//!
//! Maps a provider selection plus user-supplied region/endpoint to a fully
//! specified [`ProviderProfile`]. Everything that differs between providers
//! lives in the [`PROVIDERS`] table; adding a provider is a new row there.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MIB: u64 = 1024 * 1024;

/// Supported S3-compatible providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aws,
    ArvanCloud,
    Custom,
}

/// Whether the bucket name goes into the hostname or the URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingStyle {
    VirtualHost,
    PathStyle,
}

/// Bucket naming rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingRules {
    /// AWS rules: lowercase letters, digits, dots and hyphens only
    Strict,
    /// Strict rules, but underscores are tolerated
    Relaxed,
}

/// Static per-provider configuration
#[derive(Debug)]
pub struct ProviderDefaults {
    pub kind: ProviderKind,
    pub display_name: &'static str,
    /// Region used when the caller leaves it empty; `None` makes it required
    pub default_region: Option<&'static str>,
    /// Region must appear in [`AWS_REGIONS`]
    pub requires_known_region: bool,
    /// Endpoint template with a `{region}` placeholder
    pub endpoint_template: Option<&'static str>,
    pub endpoint_required: bool,
    pub addressing_style: AddressingStyle,
    pub naming: NamingRules,
    /// Objects at or above this size use multipart upload
    pub multipart_threshold: u64,
    pub part_size: u64,
}

/// The provider table
pub const PROVIDERS: &[ProviderDefaults] = &[
    ProviderDefaults {
        kind: ProviderKind::Aws,
        display_name: "AWS",
        default_region: None,
        requires_known_region: true,
        endpoint_template: None,
        endpoint_required: false,
        addressing_style: AddressingStyle::VirtualHost,
        naming: NamingRules::Strict,
        multipart_threshold: 16 * MIB,
        part_size: 16 * MIB,
    },
    ProviderDefaults {
        kind: ProviderKind::ArvanCloud,
        display_name: "ArvanCloud",
        default_region: Some("ir-thr-at1"),
        requires_known_region: false,
        endpoint_template: Some("https://s3.{region}.arvanstorage.ir"),
        endpoint_required: false,
        addressing_style: AddressingStyle::PathStyle,
        naming: NamingRules::Strict,
        multipart_threshold: 8 * MIB,
        part_size: 8 * MIB,
    },
    CUSTOM,
];

/// Any S3-compatible endpoint; the most permissive row
const CUSTOM: ProviderDefaults = ProviderDefaults {
    kind: ProviderKind::Custom,
    display_name: "Custom",
    default_region: Some("us-east-1"),
    requires_known_region: false,
    endpoint_template: None,
    endpoint_required: true,
    addressing_style: AddressingStyle::PathStyle,
    naming: NamingRules::Relaxed,
    multipart_threshold: 8 * MIB,
    part_size: 8 * MIB,
};

/// Known AWS region identifiers
pub const AWS_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-southeast-5",
    "ap-southeast-7",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ca-central-1",
    "ca-west-1",
    "eu-central-1",
    "eu-central-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-south-1",
    "eu-south-2",
    "eu-north-1",
    "il-central-1",
    "me-south-1",
    "me-central-1",
    "mx-central-1",
    "sa-east-1",
    "us-gov-east-1",
    "us-gov-west-1",
    "cn-north-1",
    "cn-northwest-1",
];

impl ProviderKind {
    /// Look up this provider's row in the table
    pub fn defaults(self) -> &'static ProviderDefaults {
        PROVIDERS
            .iter()
            .find(|row| row.kind == self)
            .unwrap_or(&CUSTOM)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.defaults().display_name)
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "s3" => Ok(ProviderKind::Aws),
            "arvancloud" | "arvan" => Ok(ProviderKind::ArvanCloud),
            "custom" => Ok(ProviderKind::Custom),
            other => Err(Error::Configuration(format!(
                "Unknown provider '{other}'. Expected one of: aws, arvancloud, custom"
            ))),
        }
    }
}

impl fmt::Display for AddressingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressingStyle::VirtualHost => f.write_str("virtual-host"),
            AddressingStyle::PathStyle => f.write_str("path-style"),
        }
    }
}

/// A fully specified connection descriptor
///
/// Only [`resolve`] builds one, so every instance satisfies the per-provider
/// invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderProfile {
    kind: ProviderKind,
    endpoint_url: Option<String>,
    region: String,
    addressing_style: AddressingStyle,
}

impl ProviderProfile {
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Endpoint URL, or `None` to let the SDK resolve the regional AWS endpoint
    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn addressing_style(&self) -> AddressingStyle {
        self.addressing_style
    }

    pub fn force_path_style(&self) -> bool {
        self.addressing_style == AddressingStyle::PathStyle
    }

    pub fn naming_rules(&self) -> NamingRules {
        self.kind.defaults().naming
    }

    /// Location constraint to send on bucket creation
    ///
    /// `us-east-1` is the implicit default and must not be sent.
    pub fn location_constraint(&self) -> Option<&str> {
        if self.region == "us-east-1" {
            None
        } else {
            Some(&self.region)
        }
    }

    /// Endpoint for display purposes
    pub fn endpoint_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }
}

/// Resolve user input into a provider profile
///
/// Pure function. Empty strings are treated as "not supplied".
pub fn resolve(kind: ProviderKind, region: &str, endpoint_url: &str) -> Result<ProviderProfile> {
    let defaults = kind.defaults();
    let region = region.trim();
    let endpoint_url = endpoint_url.trim();

    let region = match (region.is_empty(), defaults.default_region) {
        (false, _) => region.to_string(),
        (true, Some(default)) => default.to_string(),
        (true, None) => {
            return Err(Error::Configuration(format!(
                "Region is required for {}",
                defaults.display_name
            )));
        }
    };

    if defaults.requires_known_region && !AWS_REGIONS.contains(&region.as_str()) {
        return Err(Error::Configuration(format!(
            "Unknown {} region '{region}'",
            defaults.display_name
        )));
    }

    let endpoint_url = if !endpoint_url.is_empty() {
        Some(validate_endpoint(endpoint_url)?)
    } else if let Some(template) = defaults.endpoint_template {
        Some(template.replace("{region}", &region))
    } else if defaults.endpoint_required {
        return Err(Error::Configuration(format!(
            "Endpoint URL is required for {} providers",
            defaults.display_name
        )));
    } else {
        None
    };

    Ok(ProviderProfile {
        kind,
        endpoint_url,
        region,
        addressing_style: defaults.addressing_style,
    })
}

fn validate_endpoint(endpoint: &str) -> Result<String> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| Error::Configuration(format!("Invalid endpoint URL '{endpoint}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Configuration(format!(
            "Endpoint URL must use http or https: '{endpoint}'"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::Configuration(format!(
            "Endpoint URL has no host: '{endpoint}'"
        )));
    }

    Ok(endpoint.trim_end_matches('/').to_string())
}
