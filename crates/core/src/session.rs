//! Session management
//!
//! A [`SessionManager`] owns at most one live [`Session`] and the bucket
//! selected within it. Managers are plain values: the shell creates one and
//! hands an `Arc` to the bucket directory and transfer engine, and tests can
//! run as many independent managers as they like.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::provider::{AddressingStyle, ProviderKind, ProviderProfile};
use crate::retry::RetryPolicy;
use crate::traits::{BucketRef, Connector, StorageBackend};

/// Access key pair, held in memory only
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create credentials; both parts must be non-empty
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Result<Self> {
        let access_key_id = access_key_id.into().trim().to_string();
        let secret_access_key = secret_access_key.into().trim().to_string();

        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return Err(Error::Configuration(
                "Both access key ID and secret access key are required".into(),
            ));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Access key with everything but the last four characters masked
    pub fn masked_access_key(&self) -> String {
        let chars: Vec<char> = self.access_key_id.chars().collect();
        let visible = chars.len().saturating_sub(4);
        chars
            .iter()
            .enumerate()
            .map(|(i, c)| if i < visible { '*' } else { *c })
            .collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.masked_access_key())
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// An authenticated, provider-scoped connection
pub struct Session {
    id: u64,
    profile: ProviderProfile,
    credentials: Credentials,
    backend: Arc<dyn StorageBackend>,
    connected_at: jiff::Timestamp,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn connected_at(&self) -> jiff::Timestamp {
        self.connected_at
    }

    /// Display summary, without secrets
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            provider: self.profile.kind(),
            endpoint: self.profile.endpoint_display(),
            region: self.profile.region().to_string(),
            addressing_style: self.profile.addressing_style(),
            access_key: self.credentials.masked_access_key(),
            connected_at: self.connected_at,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("profile", &self.profile)
            .field("credentials", &self.credentials)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

/// Serializable view of the active session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub region: String,
    pub addressing_style: AddressingStyle,
    pub access_key: String,
    pub connected_at: jiff::Timestamp,
}

struct Active {
    session: Arc<Session>,
    selected: Option<BucketRef>,
}

/// Owner of the single active session
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    state: RwLock<Option<Active>>,
    // Serializes connect attempts; the later attempt supersedes the earlier.
    connect_lock: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_retry(connector, RetryPolicy::default())
    }

    pub fn with_retry(connector: Arc<dyn Connector>, retry: RetryPolicy) -> Self {
        Self {
            connector,
            retry,
            state: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Retry policy shared by everything running on this manager's sessions
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Authenticate against `profile` and make it the active session
    ///
    /// The credentials are checked with a bucket listing before anything is
    /// replaced; a failed attempt leaves the previous session in place.
    pub async fn connect(
        &self,
        profile: ProviderProfile,
        credentials: Credentials,
    ) -> Result<Arc<Session>> {
        let _guard = self.connect_lock.lock().await;

        tracing::info!(
            provider = %profile.kind(),
            endpoint = %profile.endpoint_display(),
            region = profile.region(),
            addressing = %profile.addressing_style(),
            "Connecting"
        );

        let backend = self.connector.connect(&profile, &credentials).await?;

        self.retry
            .run("verify_credentials", || backend.list_buckets(None))
            .await
            .map_err(classify_verification_failure)?;

        let session = Arc::new(Session {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            profile,
            credentials,
            backend,
            connected_at: jiff::Timestamp::now(),
        });

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = state.take() {
            tracing::info!(session = previous.session.id, "Tearing down previous session");
            drop(previous);
        }
        *state = Some(Active {
            session: Arc::clone(&session),
            selected: None,
        });

        tracing::info!(session = session.id, "Connected");
        Ok(session)
    }

    /// Drop the active session and bucket selection; no-op when disconnected
    pub fn disconnect(&self) {
        let previous = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(previous) = previous {
            tracing::info!(session = previous.session.id, "Disconnected");
        }
    }

    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| Arc::clone(&a.session))
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.current_session().map(|s| s.status())
    }

    /// Active session, or [`Error::NoActiveSession`]
    pub fn active(&self) -> Result<Arc<Session>> {
        self.current_session().ok_or(Error::NoActiveSession)
    }

    pub fn selected_bucket(&self) -> Option<BucketRef> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|a| a.selected.clone())
    }

    /// Active session together with its selected bucket
    pub fn active_bucket(&self) -> Result<(Arc<Session>, BucketRef)> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let active = state.as_ref().ok_or(Error::NoActiveSession)?;
        let bucket = active.selected.clone().ok_or(Error::NoBucketSelected)?;
        Ok((Arc::clone(&active.session), bucket))
    }

    /// Record the selection, provided `session_id` is still the active session
    pub(crate) fn set_selected(&self, session_id: u64, bucket: BucketRef) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.as_mut() {
            Some(active) if active.session.id == session_id => {
                active.selected = Some(bucket);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("retry", &self.retry)
            .field("session", &self.current_session())
            .finish_non_exhaustive()
    }
}

// The check only tells us whether the endpoint accepts the credentials, so
// anything other than an auth or network failure is a generic provider error.
fn classify_verification_failure(err: Error) -> Error {
    match err {
        Error::Authentication { .. } | Error::Connectivity(_) | Error::Provider { .. } => err,
        other => Error::Provider {
            code: other.kind().to_string(),
            status: None,
            message: other.to_string(),
        },
    }
}
