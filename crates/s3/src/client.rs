//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the StorageBackend trait from s3cm-core.
//! Every call is a single attempt; retries happen in the core.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart as SdkCompletedPart,
    CreateBucketConfiguration,
};

use s3cm_core::{
    BucketPage, BucketRef, CompletedPart, Error, ObjectBody, ObjectKey, ObjectPage, PendingUpload,
    Result, StorageBackend,
};

use crate::error::sdk_error;

/// S3 client wrapper
pub struct S3Backend {
    inner: aws_sdk_s3::Client,
}

impl S3Backend {
    pub fn new(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

fn timestamp(value: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<jiff::Timestamp> {
    value.and_then(|t| jiff::Timestamp::from_second(t.secs()).ok())
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn list_buckets(&self, continuation: Option<String>) -> Result<BucketPage> {
        tracing::debug!(continuation = continuation.as_deref(), "ListBuckets");
        let response = self
            .inner
            .list_buckets()
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(sdk_error)?;

        let buckets = response
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(BucketRef::new)
            .collect();

        Ok(BucketPage {
            buckets,
            next_token: response.continuation_token().map(str::to_string),
        })
    }

    async fn create_bucket(&self, bucket: &str, location_constraint: Option<&str>) -> Result<()> {
        tracing::debug!(bucket, location_constraint, "CreateBucket");
        let mut request = self.inner.create_bucket().bucket(bucket);

        if let Some(region) = location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        request.send().await.map_err(sdk_error)?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        tracing::debug!(bucket, prefix, "ListObjectsV2");
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(sdk_error)?;

        let objects = response
            .contents()
            .iter()
            .map(|object| ObjectKey {
                key: object.key().unwrap_or_default().to_string(),
                size_bytes: object.size().unwrap_or(0),
                last_modified: timestamp(object.last_modified()),
                etag: object.e_tag().map(str::to_string),
            })
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectKey> {
        tracing::debug!(bucket, key, "HeadObject");
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(ObjectKey {
            key: key.to_string(),
            size_bytes: response.content_length().unwrap_or(0),
            last_modified: timestamp(response.last_modified()),
            etag: response.e_tag().map(str::to_string),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        tracing::debug!(bucket, key, size = data.len(), "PutObject");
        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        if_match: Option<&str>,
    ) -> Result<ObjectBody> {
        tracing::debug!(bucket, key, offset, if_match, "GetObject");
        let range = (offset > 0).then(|| format!("bytes={offset}-"));
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range)
            .set_if_match(if_match.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(ObjectBody {
            content_length: response
                .content_length()
                .and_then(|n| u64::try_from(n).ok()),
            reader: Box::pin(response.body.into_async_read()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        tracing::debug!(bucket, key, "DeleteObject");
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String> {
        tracing::debug!(bucket, key, "CreateMultipartUpload");
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(sdk_error)?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Provider {
                code: "MissingUploadId".into(),
                status: None,
                message: "CreateMultipartUpload response carried no upload ID".into(),
            })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String> {
        tracing::debug!(bucket, key, part_number, size = data.len(), "UploadPart");
        let response = self
            .inner
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(sdk_error)?;

        response
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| Error::Provider {
                code: "MissingETag".into(),
                status: None,
                message: format!("UploadPart response for part {part_number} carried no ETag"),
            })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        tracing::debug!(bucket, key, parts = parts.len(), "CompleteMultipartUpload");
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        SdkCompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(&p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        tracing::debug!(bucket, key, upload_id, "AbortMultipartUpload");
        self.inner
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<PendingUpload>> {
        tracing::debug!(bucket, prefix, "ListMultipartUploads");
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let response = self
                .inner
                .list_multipart_uploads()
                .bucket(bucket)
                .set_prefix(prefix.map(str::to_string))
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(sdk_error)?;

            uploads.extend(response.uploads().iter().filter_map(|u| {
                Some(PendingUpload {
                    key: u.key()?.to_string(),
                    upload_id: u.upload_id()?.to_string(),
                    initiated: timestamp(u.initiated()),
                })
            }));

            if !response.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = response.next_key_marker().map(str::to_string);
            upload_id_marker = response.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        Ok(uploads)
    }
}
