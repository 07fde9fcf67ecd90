//! Builds an SDK client per profile and credentials

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig as SdkTimeoutConfig;
use aws_config::{BehaviorVersion, Region};

use s3cm_core::{Connector, Credentials, ProviderProfile, Result, StorageBackend};

use crate::client::S3Backend;

/// HTTP timeouts applied to every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub read_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5000,
            read_ms: 30000,
        }
    }
}

/// [`Connector`] backed by `aws-sdk-s3`
#[derive(Debug, Clone, Default)]
pub struct S3Connector {
    timeouts: TimeoutConfig,
}

impl S3Connector {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl Connector for S3Connector {
    async fn connect(
        &self,
        profile: &ProviderProfile,
        credentials: &Credentials,
    ) -> Result<Arc<dyn StorageBackend>> {
        let static_credentials = aws_credential_types::Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            None, // session token
            None, // expiry
            "s3cm-static-credentials",
        );

        let timeouts = SdkTimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(self.timeouts.connect_ms))
            .read_timeout(Duration::from_millis(self.timeouts.read_ms))
            .build();

        // Retries are owned by the core's retry policy
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(static_credentials)
            .region(Region::new(profile.region().to_string()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts);

        if let Some(endpoint) = profile.endpoint_url() {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.force_path_style())
            .build();

        tracing::debug!(
            endpoint = %profile.endpoint_display(),
            region = profile.region(),
            path_style = profile.force_path_style(),
            "Built S3 client"
        );

        Ok(Arc::new(S3Backend::new(aws_sdk_s3::Client::from_conf(
            s3_config,
        ))))
    }
}
