//! s3cm-s3: S3 SDK adapter for the s3cm storage client
//!
//! This crate implements the Connector and StorageBackend traits from
//! s3cm-core using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;
pub mod connector;
mod error;

pub use client::S3Backend;
pub use connector::{S3Connector, TimeoutConfig};
