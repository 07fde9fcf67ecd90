//! Configuration file
//!
//! Optional TOML file at ~/.config/s3cm/config.toml (or `--config`). It holds
//! tuning and named connection profiles; credentials are never stored here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use s3cm_core::{MultipartConfig, ProviderKind, RetryPolicy};
use s3cm_s3::TimeoutConfig;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

const MIB: u64 = 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Profile used when `--profile` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub transfer: TransferSettings,

    #[serde(default)]
    pub timeout: TimeoutSettings,

    /// Named connection profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            default_profile: None,
            retry: RetryPolicy::default(),
            transfer: TransferSettings::default(),
            timeout: TimeoutSettings::default(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Overrides for the provider's multipart tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_mib: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size_mib: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

impl TransferSettings {
    pub fn apply(&self, provider: ProviderKind) -> MultipartConfig {
        let mut config = MultipartConfig::for_provider(provider);
        if let Some(mib) = self.threshold_mib {
            config = config.threshold(mib.saturating_mul(MIB));
        }
        if let Some(mib) = self.part_size_mib {
            config = config.part_size(mib.saturating_mul(MIB));
        }
        if let Some(n) = self.concurrency {
            config = config.concurrency(n);
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,

    #[serde(default = "default_read_ms")]
    pub read_ms: u64,
}

fn default_connect_ms() -> u64 {
    TimeoutConfig::default().connect_ms
}

fn default_read_ms() -> u64 {
    TimeoutConfig::default().read_ms
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            read_ms: default_read_ms(),
        }
    }
}

impl From<&TimeoutSettings> for TimeoutConfig {
    fn from(settings: &TimeoutSettings) -> Self {
        TimeoutConfig {
            connect_ms: settings.connect_ms,
            read_ms: settings.read_ms,
        }
    }
}

/// Named connection profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub provider: ProviderKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Locates and loads the configuration file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use the default path under the user's config directory
    pub fn new() -> anyhow::Result<Self> {
        let config_dir =
            dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(Self {
            config_path: config_dir.join("s3cm").join("config.toml"),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration; a missing file yields the defaults
    pub fn load(&self) -> anyhow::Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("reading {}", self.config_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", self.config_path.display()))?;

        if config.schema_version > SCHEMA_VERSION {
            bail!(
                "Configuration file version {} is newer than supported version {SCHEMA_VERSION}. Please upgrade s3cm.",
                config.schema_version
            );
        }

        Ok(config)
    }
}

impl Config {
    /// Profile named `name`, or the default profile when `name` is `None`
    pub fn profile(&self, name: Option<&str>) -> anyhow::Result<Option<&ProfileEntry>> {
        match name.or(self.default_profile.as_deref()) {
            Some(name) => self
                .profiles
                .get(name)
                .map(Some)
                .with_context(|| format!("Profile '{name}' is not defined")),
            None => Ok(None),
        }
    }
}
