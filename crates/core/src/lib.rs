//! s3cm-core: Core library for the s3cm storage client
//!
//! This crate provides the SDK-independent parts of s3cm:
//! - Provider profile resolution
//! - Session management with credential probing
//! - Bucket listing, creation and selection
//! - Object transfers with multipart upload, progress and cancellation
//! - Error normalization and retry with backoff
//!
//! Provider access goes through the [`StorageBackend`] and [`Connector`]
//! traits, implemented by the `s3cm-s3` crate on top of the AWS SDK.

pub mod bucket;
pub mod error;
pub mod multipart;
pub mod normalize;
mod paging;
pub mod provider;
pub mod retry;
pub mod session;
pub mod traits;
pub mod transfer;

#[cfg(test)]
mod test_support;

pub use bucket::{BucketDirectory, validate_bucket_name};
pub use error::{Error, Result};
pub use multipart::MultipartConfig;
pub use normalize::{ProviderFailure, normalize};
pub use provider::{AddressingStyle, NamingRules, ProviderKind, ProviderProfile, resolve};
pub use retry::RetryPolicy;
pub use session::{Credentials, Session, SessionManager, SessionStatus};
pub use traits::{
    BucketPage, BucketRef, CompletedPart, Connector, ObjectBody, ObjectKey, ObjectPage,
    PendingUpload, StorageBackend,
};
pub use transfer::{
    TransferDirection, TransferEngine, TransferObserver, TransferOptions, TransferStatus,
    TransferTask,
};

pub use tokio_util::sync::CancellationToken;
