//! Connection setup shared by all commands
//!
//! Merges flags, environment and the config file into a provider profile and
//! credentials, then opens a session. Flags win over the selected profile,
//! which wins over provider defaults.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use s3cm_core::{
    BucketDirectory, BucketRef, Credentials, Error, ProviderKind, ProviderProfile, Result,
    SessionManager, TransferEngine, resolve,
};
use s3cm_s3::S3Connector;

use crate::config::{Config, ConfigManager};

/// Region offered for AWS when none is configured
const AWS_DEFAULT_REGION: &str = "us-east-1";

/// Connection options, accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Storage provider: aws, arvancloud or custom
    #[arg(long, global = true, env = "S3CM_PROVIDER")]
    pub provider: Option<ProviderKind>,

    /// Region (provider default when omitted)
    #[arg(long, global = true, env = "S3CM_REGION")]
    pub region: Option<String>,

    /// Endpoint URL (required for custom providers)
    #[arg(long, global = true, env = "S3CM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Named profile from the config file
    #[arg(long, global = true, env = "S3CM_PROFILE")]
    pub profile: Option<String>,

    /// Access key ID
    #[arg(long, global = true, env = "S3CM_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long, global = true, env = "S3CM_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Config file path
    #[arg(long, global = true, env = "S3CM_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn load_config(&self) -> Result<Config> {
        let manager = match &self.config {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new().map_err(config_error)?,
        };
        manager.load().map_err(config_error)
    }

    /// Resolve the provider profile from flags and the config file
    pub fn profile(&self, config: &Config) -> Result<ProviderProfile> {
        let entry = config
            .profile(self.profile.as_deref())
            .map_err(config_error)?;

        let provider = self
            .provider
            .or(entry.map(|e| e.provider))
            .unwrap_or(ProviderKind::Aws);

        let region = self
            .region
            .clone()
            .or_else(|| entry.and_then(|e| e.region.clone()))
            .or_else(|| (provider == ProviderKind::Aws).then(|| AWS_DEFAULT_REGION.to_string()))
            .unwrap_or_default();

        let endpoint = self
            .endpoint
            .clone()
            .or_else(|| entry.and_then(|e| e.endpoint.clone()))
            .unwrap_or_default();

        resolve(provider, &region, &endpoint)
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::new(
            self.access_key.clone().unwrap_or_default(),
            self.secret_key.clone().unwrap_or_default(),
        )
    }
}

fn config_error(err: anyhow::Error) -> Error {
    Error::Configuration(format!("{err:#}"))
}

/// A connected session with its bucket directory and transfer engine
pub struct Shell {
    pub sessions: Arc<SessionManager>,
    pub buckets: BucketDirectory,
    pub transfers: TransferEngine,
}

impl Shell {
    /// Connect using `args`; fails like [`SessionManager::connect`]
    pub async fn connect(args: &ConnectionArgs) -> Result<Self> {
        let config = args.load_config()?;
        let profile = args.profile(&config)?;
        let credentials = args.credentials()?;

        let connector = Arc::new(S3Connector::new((&config.timeout).into()));
        let sessions = Arc::new(SessionManager::with_retry(connector, config.retry.clone()));
        let multipart = config.transfer.apply(profile.kind());

        sessions.connect(profile, credentials).await?;

        Ok(Self {
            buckets: BucketDirectory::new(Arc::clone(&sessions)),
            transfers: TransferEngine::new(Arc::clone(&sessions)).with_multipart(multipart),
            sessions,
        })
    }

    /// Connect and select `bucket`
    pub async fn with_bucket(args: &ConnectionArgs, bucket: &str) -> Result<Self> {
        let shell = Self::connect(args).await?;
        shell.buckets.select_bucket(&BucketRef::new(bucket)).await?;
        Ok(shell)
    }
}
