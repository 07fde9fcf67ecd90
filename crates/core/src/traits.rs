//! Storage backend traits
//!
//! [`StorageBackend`] is the set of provider primitives the core builds on;
//! [`Connector`] produces one per profile and credentials. The S3 adapter
//! implements both, which keeps the core independent of any specific SDK.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::provider::ProviderProfile;
use crate::session::Credentials;

/// Reference to a bucket by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

impl BucketRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for BucketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Object key
    pub key: String,

    /// Size in bytes
    pub size_bytes: i64,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// Entity tag of the stored version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ObjectKey {
    pub fn new(key: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
            last_modified: None,
            etag: None,
        }
    }

    /// Human-readable size
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size_bytes.max(0) as u64, humansize::BINARY)
    }
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct BucketPage {
    pub buckets: Vec<BucketRef>,
    /// Token for the next page; `None` on the last page
    pub next_token: Option<String>,
}

/// One page of an object listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectKey>,
    /// Token for the next page; `None` on the last page
    pub next_token: Option<String>,
}

/// A multipart upload that was started but neither completed nor aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    pub key: String,
    pub upload_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiated: Option<jiff::Timestamp>,
}

/// A part accepted by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Streaming object body
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Response of a GET on an object
pub struct ObjectBody {
    /// Length of this response body (from the requested offset)
    pub content_length: Option<u64>,
    pub reader: ObjectReader,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Provider primitives for S3-compatible storage
///
/// Implementations return already-normalized errors and perform no retries;
/// retry policy belongs to the callers in this crate.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List one page of buckets
    async fn list_buckets(&self, continuation: Option<String>) -> Result<BucketPage>;

    /// Create a bucket, optionally pinned to a region
    async fn create_bucket(&self, bucket: &str, location_constraint: Option<&str>) -> Result<()>;

    /// List one page of objects under a prefix (recursive, no delimiter)
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<String>,
    ) -> Result<ObjectPage>;

    /// Get object metadata
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectKey>;

    /// Upload an object in a single request
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Open an object body, starting at `offset`
    ///
    /// With `if_match`, the provider must refuse (HTTP 412) if the object's
    /// entity tag no longer matches.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        if_match: Option<&str>,
    ) -> Result<ObjectBody>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Start a multipart upload and return its upload ID
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String>;

    /// Upload one part and return its ETag
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String>;

    /// Commit a multipart upload; `parts` is in ascending part-number order
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Abort a multipart upload and discard its parts
    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<()>;

    /// List in-progress multipart uploads
    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<PendingUpload>>;
}

/// Builds a [`StorageBackend`] scoped to a profile and credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        profile: &ProviderProfile,
        credentials: &Credentials,
    ) -> Result<Arc<dyn StorageBackend>>;
}
