//! Bucket directory
//!
//! Lists, creates and selects buckets on the active session.

use std::sync::Arc;

use futures::TryStreamExt;
use futures::stream::BoxStream;

use crate::error::{Error, Result};
use crate::paging::paginate;
use crate::provider::NamingRules;
use crate::session::{Session, SessionManager};
use crate::traits::BucketRef;

/// Bucket operations against a [`SessionManager`]'s active session
#[derive(Debug, Clone)]
pub struct BucketDirectory {
    sessions: Arc<SessionManager>,
}

impl BucketDirectory {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Lazily list buckets in provider order
    ///
    /// Fails up front when disconnected. Each call re-queries the provider.
    pub fn list_buckets(&self) -> Result<BoxStream<'static, Result<BucketRef>>> {
        let session = self.sessions.active()?;
        Ok(self.listing(session))
    }

    /// Validate `name` and create the bucket in the profile's region
    pub async fn create_bucket(&self, name: &str) -> Result<BucketRef> {
        let session = self.sessions.active()?;
        let profile = session.profile();
        validate_bucket_name(name, profile.naming_rules())?;

        let location = profile.location_constraint();
        self.sessions
            .retry_policy()
            .run("create_bucket", || {
                session.backend().create_bucket(name, location)
            })
            .await?;

        tracing::info!(bucket = name, region = profile.region(), "Created bucket");
        Ok(BucketRef::new(name))
    }

    /// Make `bucket` the target of subsequent transfers
    ///
    /// The bucket must show up in a fresh listing.
    pub async fn select_bucket(&self, bucket: &BucketRef) -> Result<()> {
        let session = self.sessions.active()?;
        let session_id = session.id();

        let mut buckets = self.listing(session);
        let mut found = false;
        while let Some(candidate) = buckets.try_next().await? {
            if candidate.name == bucket.name {
                found = true;
                break;
            }
        }
        if !found {
            return Err(Error::NotFound(format!("Bucket '{bucket}' does not exist")));
        }

        // The session may have been replaced while we were listing
        if !self.sessions.set_selected(session_id, bucket.clone()) {
            return Err(Error::NoActiveSession);
        }

        tracing::debug!(bucket = %bucket, "Selected bucket");
        Ok(())
    }

    pub fn selected_bucket(&self) -> Option<BucketRef> {
        self.sessions.selected_bucket()
    }

    fn listing(&self, session: Arc<Session>) -> BoxStream<'static, Result<BucketRef>> {
        let retry = self.sessions.retry_policy().clone();
        paginate(move |token: Option<String>| {
            let session = Arc::clone(&session);
            let retry = retry.clone();
            async move {
                let page = retry
                    .run("list_buckets", || session.backend().list_buckets(token.clone()))
                    .await?;
                Ok((page.buckets, page.next_token))
            }
        })
    }
}

/// Check a bucket name against S3 naming rules
pub fn validate_bucket_name(name: &str, rules: NamingRules) -> Result<()> {
    let invalid = |reason: &str| Err(Error::Validation(format!("Invalid bucket name '{name}': {reason}")));

    if !(3..=63).contains(&name.len()) {
        return invalid("must be between 3 and 63 characters");
    }

    let allowed = |c: char| {
        c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || c == '.'
            || c == '-'
            || (c == '_' && rules == NamingRules::Relaxed)
    };
    if !name.chars().all(allowed) {
        return invalid(match rules {
            NamingRules::Strict => "only lowercase letters, numbers, dots and hyphens are allowed",
            NamingRules::Relaxed => {
                "only lowercase letters, numbers, dots, hyphens and underscores are allowed"
            }
        });
    }

    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return invalid("must start and end with a letter or number");
    }

    if name.contains("..") {
        return invalid("must not contain two adjacent periods");
    }

    if looks_like_ipv4(name) {
        return invalid("must not be formatted as an IP address");
    }

    if name.starts_with("xn--") {
        return invalid("must not start with 'xn--'");
    }

    Ok(())
}

fn looks_like_ipv4(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
