//! Object transfer engine
//!
//! Uploads, downloads, deletes and lists objects in the selected bucket.
//!
//! Uploads at or above the multipart threshold are split into parts and sent
//! with bounded concurrency; a failed or cancelled multipart upload is always
//! aborted on the provider. Downloads stream in fixed-size chunks into a
//! `.part` file next to the destination and resume with a ranged GET when the
//! body stream breaks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::multipart::{MultipartConfig, calculate_parts, part_byte_range};
use crate::paging::paginate;
use crate::retry::RetryPolicy;
use crate::session::{Session, SessionManager};
use crate::traits::{BucketRef, CompletedPart, ObjectKey, PendingUpload, StorageBackend};

/// Read buffer size for downloads
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Longest object key S3 accepts, in bytes
pub const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Lifecycle of a transfer: `Pending -> InProgress -> {Completed, Failed, Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::InProgress => "in progress",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// State of one upload or download
#[derive(Debug, Clone, Serialize)]
pub struct TransferTask {
    pub direction: TransferDirection,
    pub local_path: PathBuf,
    pub remote_key: String,
    pub bucket: BucketRef,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub status: TransferStatus,
}

impl TransferTask {
    fn new(
        direction: TransferDirection,
        local_path: &Path,
        remote_key: &str,
        bucket: BucketRef,
    ) -> Self {
        Self {
            direction,
            local_path: local_path.to_path_buf(),
            remote_key: remote_key.to_string(),
            bucket,
            total_bytes: 0,
            transferred_bytes: 0,
            status: TransferStatus::Pending,
        }
    }
}

/// Receives a snapshot of the task on every state or progress change
pub trait TransferObserver: Send + Sync {
    fn on_update(&self, task: &TransferTask);
}

impl<F> TransferObserver for F
where
    F: Fn(&TransferTask) + Send + Sync,
{
    fn on_update(&self, task: &TransferTask) {
        self(task)
    }
}

/// Per-call transfer options
#[derive(Clone, Default)]
pub struct TransferOptions {
    pub cancel: CancellationToken,
    pub observer: Option<Arc<dyn TransferObserver>>,
    /// Content type sent with uploads
    pub content_type: Option<String>,
}

impl TransferOptions {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: impl TransferObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("observer", &self.observer.is_some())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Owns the task for the duration of a transfer and reports its changes
struct Tracker<'a> {
    task: TransferTask,
    observer: Option<&'a dyn TransferObserver>,
}

impl Tracker<'_> {
    fn notify(&self) {
        if let Some(observer) = self.observer {
            observer.on_update(&self.task);
        }
    }

    fn set_status(&mut self, status: TransferStatus) {
        debug_assert!(!self.task.status.is_terminal());
        self.task.status = status;
        self.notify();
    }

    // The final byte count is only reported once the transfer is committed.
    fn progress(&mut self, done: u64) {
        if done < self.task.total_bytes && done != self.task.transferred_bytes {
            self.task.transferred_bytes = done;
            self.notify();
        }
    }

    fn complete(&mut self) {
        self.task.transferred_bytes = self.task.total_bytes;
        self.set_status(TransferStatus::Completed);
    }
}

/// Multipart upload in progress
struct MultipartTarget<'a> {
    backend: &'a dyn StorageBackend,
    bucket: &'a str,
    key: &'a str,
    upload_id: &'a str,
}

/// Transfers against the selected bucket of a [`SessionManager`]
#[derive(Debug, Clone)]
pub struct TransferEngine {
    sessions: Arc<SessionManager>,
    multipart: Option<MultipartConfig>,
    chunk_size: usize,
}

impl TransferEngine {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            multipart: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the provider's multipart tuning
    pub fn with_multipart(mut self, config: MultipartConfig) -> Self {
        self.multipart = Some(config);
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    fn retry(&self) -> &RetryPolicy {
        self.sessions.retry_policy()
    }

    fn multipart_for(&self, session: &Session) -> MultipartConfig {
        self.multipart
            .clone()
            .unwrap_or_else(|| MultipartConfig::for_provider(session.profile().kind()))
    }

    /// Lazily list objects under `prefix`, across provider pages
    ///
    /// Each call re-queries the provider.
    pub fn list_objects(&self, prefix: Option<&str>) -> Result<BoxStream<'static, Result<ObjectKey>>> {
        let (session, bucket) = self.sessions.active_bucket()?;
        let retry = self.retry().clone();
        let prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);

        Ok(paginate(move |token: Option<String>| {
            let session = Arc::clone(&session);
            let retry = retry.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            async move {
                let page = retry
                    .run("list_objects", || {
                        session
                            .backend()
                            .list_objects(&bucket.name, prefix.as_deref(), token.clone())
                    })
                    .await?;
                Ok((page.objects, page.next_token))
            }
        }))
    }

    /// Upload a local file to `remote_key`
    ///
    /// Returns the finished task, which is `Completed` or `Cancelled`; failures
    /// come back as errors after the observer has seen the `Failed` state.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        remote_key: &str,
        options: &TransferOptions,
    ) -> Result<TransferTask> {
        let (session, bucket) = self.sessions.active_bucket()?;
        validate_key(remote_key)?;
        let path = local_path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::local_io(path, e))?;
        if !metadata.is_file() {
            return Err(Error::local_io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let mut tracker = Tracker {
            task: TransferTask::new(TransferDirection::Upload, path, remote_key, bucket),
            observer: options.observer.as_deref(),
        };
        tracker.task.total_bytes = metadata.len();
        tracker.set_status(TransferStatus::InProgress);

        let config = self.multipart_for(&session);
        let result = if config.is_multipart(metadata.len()) {
            self.upload_multipart(&session, &config, &mut tracker, options)
                .await
        } else {
            self.upload_single(&session, &mut tracker, options).await
        };

        finish(tracker, result)
    }

    async fn upload_single(
        &self,
        session: &Session,
        tracker: &mut Tracker<'_>,
        options: &TransferOptions,
    ) -> Result<()> {
        let path = tracker.task.local_path.clone();
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::local_io(&path, e))?;

        if options.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let backend = session.backend();
        let bucket = tracker.task.bucket.name.as_str();
        let key = tracker.task.remote_key.as_str();
        tracing::debug!(bucket, key, size = data.len(), "Single-part upload");

        self.retry()
            .run_cancellable("put_object", &options.cancel, || {
                backend.put_object(bucket, key, data.clone(), options.content_type.as_deref())
            })
            .await
    }

    async fn upload_multipart(
        &self,
        session: &Session,
        config: &MultipartConfig,
        tracker: &mut Tracker<'_>,
        options: &TransferOptions,
    ) -> Result<()> {
        if options.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let backend = session.backend().as_ref();
        let bucket = tracker.task.bucket.name.clone();
        let key = tracker.task.remote_key.clone();
        let content_type = options.content_type.as_deref();

        let upload_id = self
            .retry()
            .run_cancellable("create_multipart_upload", &options.cancel, || {
                backend.create_multipart_upload(&bucket, &key, content_type)
            })
            .await?;

        let target = MultipartTarget {
            backend,
            bucket: &bucket,
            key: &key,
            upload_id: &upload_id,
        };

        let committed = match self.upload_parts(&target, config, tracker, options).await {
            Ok(mut parts) => {
                parts.sort_by_key(|p| p.part_number);
                if options.cancel.is_cancelled() {
                    Err(Error::Cancelled)
                } else {
                    self.retry()
                        .run_cancellable("complete_multipart_upload", &options.cancel, || {
                            backend.complete_multipart_upload(&bucket, &key, &upload_id, &parts)
                        })
                        .await
                }
            }
            Err(e) => Err(e),
        };

        match committed {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %err,
                    "Aborting multipart upload"
                );
                // Ignores the cancel token; cancelled uploads must still be aborted.
                let aborted = self
                    .retry()
                    .run("abort_multipart_upload", || {
                        backend.abort_multipart_upload(&bucket, &key, &upload_id)
                    })
                    .await;
                match aborted {
                    Ok(()) => Err(err),
                    Err(abort_err) => {
                        tracing::warn!(upload_id = %upload_id, error = %abort_err, "Multipart abort failed");
                        Err(Error::Transfer {
                            key,
                            source: Box::new(abort_err),
                        })
                    }
                }
            }
        }
    }

    async fn upload_parts(
        &self,
        target: &MultipartTarget<'_>,
        config: &MultipartConfig,
        tracker: &mut Tracker<'_>,
        options: &TransferOptions,
    ) -> Result<Vec<CompletedPart>> {
        let total = tracker.task.total_bytes;
        let part_size = config.calculate_part_size(total);
        let part_count = calculate_parts(total, part_size);
        let path = tracker.task.local_path.clone();
        let path = path.as_path();
        let retry = self.retry();
        let cancel = &options.cancel;

        tracing::debug!(
            key = target.key,
            upload_id = target.upload_id,
            part_count,
            part_size,
            concurrency = config.concurrency,
            "Multipart upload"
        );

        let mut pending = stream::iter(1..=part_count as i32)
            .map(move |part_number| async move {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let (start, end) = part_byte_range(part_number, part_size, total);
                let data = read_range(path, start, end - start).await?;
                let etag = retry
                    .run_cancellable("upload_part", cancel, || {
                        target.backend.upload_part(
                            target.bucket,
                            target.key,
                            target.upload_id,
                            part_number,
                            data.clone(),
                        )
                    })
                    .await?;
                Ok((CompletedPart { part_number, etag }, end - start))
            })
            .buffer_unordered(config.concurrency.max(1));

        let mut parts = Vec::with_capacity(part_count);
        let mut done = 0;
        while let Some(result) = pending.next().await {
            let (part, len) = result?;
            done += len;
            tracker.progress(done);
            parts.push(part);
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        Ok(parts)
    }

    /// Download `remote_key` to a local file
    ///
    /// Same result contract as [`upload`](Self::upload).
    pub async fn download(
        &self,
        remote_key: &str,
        local_path: impl AsRef<Path>,
        options: &TransferOptions,
    ) -> Result<TransferTask> {
        let (session, bucket) = self.sessions.active_bucket()?;
        validate_key(remote_key)?;
        let path = local_path.as_ref();

        let mut tracker = Tracker {
            task: TransferTask::new(TransferDirection::Download, path, remote_key, bucket),
            observer: options.observer.as_deref(),
        };
        tracker.set_status(TransferStatus::InProgress);

        let result = self.download_to(&session, &mut tracker, options).await;
        finish(tracker, result)
    }

    async fn download_to(
        &self,
        session: &Session,
        tracker: &mut Tracker<'_>,
        options: &TransferOptions,
    ) -> Result<()> {
        if options.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let backend = session.backend().as_ref();
        let bucket = tracker.task.bucket.name.clone();
        let key = tracker.task.remote_key.clone();
        let path = tracker.task.local_path.clone();

        let head = self
            .retry()
            .run_cancellable("head_object", &options.cancel, || {
                backend.head_object(&bucket, &key)
            })
            .await?;
        tracker.task.total_bytes = head.size_bytes.max(0) as u64;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::local_io(parent, e))?;
        }

        let partial = partial_path(&path);
        let streamed = self
            .stream_into(backend, &partial, head.etag.as_deref(), tracker, options)
            .await;

        match streamed {
            Ok(()) => tokio::fs::rename(&partial, &path)
                .await
                .map_err(|e| Error::local_io(&path, e)),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!(path = %partial.display(), error = %cleanup, "Could not remove partial file");
                }
                Err(e)
            }
        }
    }

    // Every GET is pinned to the version seen by HEAD, so a resumed body
    // cannot splice bytes from a replaced object.
    async fn stream_into(
        &self,
        backend: &dyn StorageBackend,
        partial: &Path,
        etag: Option<&str>,
        tracker: &mut Tracker<'_>,
        options: &TransferOptions,
    ) -> Result<()> {
        let cancel = &options.cancel;
        let bucket = tracker.task.bucket.name.clone();
        let key = tracker.task.remote_key.clone();
        let (bucket, key) = (bucket.as_str(), key.as_str());
        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| Error::local_io(partial, e))?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut offset = 0u64;
        let mut interruptions = 0;

        'body: loop {
            let mut body = self
                .retry()
                .run_cancellable("get_object", cancel, || {
                    backend.get_object(bucket, key, offset, etag)
                })
                .await?;

            loop {
                let read = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    read = body.reader.read(&mut buf) => read,
                };

                match read {
                    Ok(0) => break 'body,
                    Ok(n) => {
                        file.write_all(&buf[..n])
                            .await
                            .map_err(|e| Error::local_io(partial, e))?;
                        offset += n as u64;
                        tracker.progress(offset);
                    }
                    Err(e) => {
                        interruptions += 1;
                        if interruptions >= self.retry().max_attempts.max(1) {
                            return Err(Error::Connectivity(format!(
                                "object body interrupted at byte {offset}: {e}"
                            )));
                        }
                        tracing::warn!(key, offset, error = %e, "Object body interrupted, resuming");
                        continue 'body;
                    }
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| Error::local_io(partial, e))?;

        let expected = tracker.task.total_bytes;
        if offset != expected {
            return Err(Error::Provider {
                code: "IncompleteBody".into(),
                status: None,
                message: format!("expected {expected} bytes, received {offset}"),
            });
        }
        Ok(())
    }

    /// Delete `remote_key`; a missing key is [`Error::NotFound`]
    pub async fn delete(&self, remote_key: &str) -> Result<()> {
        let (session, bucket) = self.sessions.active_bucket()?;
        validate_key(remote_key)?;
        let backend = session.backend();

        // S3 acknowledges deletes of missing keys, so check first
        self.retry()
            .run("head_object", || backend.head_object(&bucket.name, remote_key))
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => {
                    Error::NotFound(format!("Object '{remote_key}' does not exist in '{bucket}'"))
                }
                other => other,
            })?;

        self.retry()
            .run("delete_object", || backend.delete_object(&bucket.name, remote_key))
            .await?;

        tracing::info!(bucket = %bucket, key = remote_key, "Deleted object");
        Ok(())
    }

    /// Multipart uploads in the selected bucket that were never finished
    pub async fn pending_uploads(&self, prefix: Option<&str>) -> Result<Vec<PendingUpload>> {
        let (session, bucket) = self.sessions.active_bucket()?;
        self.retry()
            .run("list_multipart_uploads", || {
                session.backend().list_multipart_uploads(&bucket.name, prefix)
            })
            .await
    }

    /// Abort an unfinished multipart upload and discard its parts
    pub async fn abort_pending_upload(&self, remote_key: &str, upload_id: &str) -> Result<()> {
        let (session, bucket) = self.sessions.active_bucket()?;
        self.retry()
            .run("abort_multipart_upload", || {
                session
                    .backend()
                    .abort_multipart_upload(&bucket.name, remote_key, upload_id)
            })
            .await?;
        tracing::info!(bucket = %bucket, key = remote_key, upload_id, "Aborted multipart upload");
        Ok(())
    }
}

fn finish(mut tracker: Tracker<'_>, result: Result<()>) -> Result<TransferTask> {
    match result {
        Ok(()) => {
            tracker.complete();
            tracing::info!(
                direction = ?tracker.task.direction,
                key = %tracker.task.remote_key,
                bytes = tracker.task.total_bytes,
                "Transfer completed"
            );
            Ok(tracker.task)
        }
        Err(Error::Cancelled) => {
            tracing::info!(
                direction = ?tracker.task.direction,
                key = %tracker.task.remote_key,
                "Transfer cancelled"
            );
            tracker.set_status(TransferStatus::Cancelled);
            Ok(tracker.task)
        }
        Err(err) => {
            tracker.set_status(TransferStatus::Failed);
            let key = tracker.task.remote_key;
            Err(match err {
                Error::Connectivity(_) | Error::Provider { .. } => Error::Transfer {
                    key,
                    source: Box::new(err),
                },
                other => other,
            })
        }
    }
}

/// Check an object key before it is sent to the provider
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Validation("Object key must not be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::Validation(format!(
            "Object key is {} bytes; the limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn read_range(path: &Path, start: u64, len: u64) -> Result<Vec<u8>> {
    let io = |e: std::io::Error| Error::local_io(path, e);
    let mut file = tokio::fs::File::open(path).await.map_err(io)?;
    file.seek(std::io::SeekFrom::Start(start)).await.map_err(io)?;
    let mut data = vec![0u8; len as usize];
    file.read_exact(&mut data).await.map_err(io)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use futures::TryStreamExt;

    use crate::bucket::BucketDirectory;
    use crate::test_support::{MemoryBackend, connected_manager, manager_without_session};

    const BUCKET: &str = "my-test-bucket-001";

    fn small_parts(concurrency: usize) -> MultipartConfig {
        MultipartConfig {
            threshold: 1024,
            part_size: 1000,
            concurrency,
        }
    }

    async fn engine() -> (TransferEngine, Arc<MemoryBackend>) {
        let (manager, backend) = connected_manager().await;
        backend.add_bucket(BUCKET);
        BucketDirectory::new(Arc::clone(&manager))
            .select_bucket(&BucketRef::new(BUCKET))
            .await
            .unwrap();
        (TransferEngine::new(manager), backend)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    type Events = Arc<Mutex<Vec<(TransferStatus, u64)>>>;

    fn recording() -> (TransferOptions, Events) {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let options = TransferOptions::default().with_observer(move |t: &TransferTask| {
            sink.lock().unwrap().push((t.status, t.transferred_bytes));
        });
        (options, events)
    }

    #[tokio::test]
    async fn test_preconditions() {
        let engine = TransferEngine::new(manager_without_session());
        assert!(matches!(engine.list_objects(None), Err(Error::NoActiveSession)));
        assert!(matches!(engine.delete("a").await, Err(Error::NoActiveSession)));

        let (manager, _backend) = connected_manager().await;
        let engine = TransferEngine::new(manager);
        assert!(matches!(engine.list_objects(None), Err(Error::NoBucketSelected)));
        let err = engine
            .download("a", "/tmp/never-written", &TransferOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoBucketSelected));
    }

    #[tokio::test]
    async fn test_example_scenario_round_trip() {
        let (engine, backend) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("summary.csv");
        let original = pattern(2048);
        std::fs::write(&src, &original).unwrap();

        let key = "reports/2024/summary.csv";
        let task = engine
            .upload(&src, key, &TransferOptions::default().with_content_type("text/csv"))
            .await
            .unwrap();
        assert_eq!(task.status, TransferStatus::Completed);
        assert_eq!(task.total_bytes, 2048);
        assert_eq!(backend.calls("put_object"), 1);
        assert_eq!(backend.calls("create_multipart_upload"), 0);

        let dst = dir.path().join("fresh").join("summary.csv");
        let task = engine.download(key, &dst, &TransferOptions::default()).await.unwrap();
        assert_eq!(task.status, TransferStatus::Completed);
        assert_eq!(std::fs::read(&dst).unwrap(), original);
        assert!(!partial_path(&dst).exists());

        engine.delete(key).await.unwrap();
        let remaining: Vec<ObjectKey> = engine
            .list_objects(Some("reports/"))
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_multipart_round_trip() {
        let (engine, backend) = engine().await;
        let engine = engine.with_multipart(small_parts(3)).with_chunk_size(700);
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("big.bin");
        let original = pattern(4500);
        std::fs::write(&src, &original).unwrap();

        let (options, events) = recording();
        let task = engine.upload(&src, "big.bin", &options).await.unwrap();
        assert_eq!(task.status, TransferStatus::Completed);
        assert_eq!(task.transferred_bytes, 4500);
        assert_eq!(backend.calls("upload_part"), 5);
        assert_eq!(backend.completed_part_orders(), vec![vec![1, 2, 3, 4, 5]]);
        assert_eq!(backend.pending_upload_count(), 0);

        let events = events.lock().unwrap().clone();
        let at_total: Vec<_> = events.iter().filter(|(_, n)| *n == 4500).collect();
        assert_eq!(at_total, vec![&(TransferStatus::Completed, 4500)]);
        assert_eq!(events.first().unwrap().0, TransferStatus::InProgress);

        let dst = dir.path().join("copy.bin");
        let (options, events) = recording();
        engine.download("big.bin", &dst, &options).await.unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), original);
        let events = events.lock().unwrap().clone();
        assert_eq!(events.iter().filter(|(_, n)| *n == 4500).count(), 1);
        assert_eq!(events.last().unwrap(), &(TransferStatus::Completed, 4500));
    }

    #[tokio::test]
    async fn test_part_failure_aborts_upload() {
        let (engine, backend) = engine().await;
        let engine = engine.with_multipart(small_parts(2));
        backend.fail("upload_part#3", 10, || Error::Provider {
            code: "InternalError".into(),
            status: Some(500),
            message: "We encountered an internal error".into(),
        });
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("big.bin");
        std::fs::write(&src, pattern(4500)).unwrap();

        let (options, events) = recording();
        let err = engine.upload(&src, "big.bin", &options).await.unwrap_err();
        assert!(matches!(err, Error::Transfer { ref key, .. } if key == "big.bin"));
        assert_eq!(backend.calls("abort_multipart_upload"), 1);
        assert_eq!(backend.calls("complete_multipart_upload"), 0);
        assert_eq!(backend.pending_upload_count(), 0);
        assert!(backend.object(BUCKET, "big.bin").is_none());
        assert_eq!(events.lock().unwrap().last().unwrap().0, TransferStatus::Failed);
    }

    #[tokio::test]
    async fn test_transient_part_failure_is_retried() {
        let (engine, backend) = engine().await;
        let engine = engine.with_multipart(small_parts(2));
        backend.fail("upload_part#2", 1, || Error::Connectivity("connection reset".into()));
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("big.bin");
        std::fs::write(&src, pattern(4500)).unwrap();

        engine
            .upload(&src, "big.bin", &TransferOptions::default())
            .await
            .unwrap();
        assert_eq!(backend.calls("upload_part"), 6);
        assert_eq!(backend.object(BUCKET, "big.bin").unwrap(), pattern(4500));
    }

    #[tokio::test]
    async fn test_cancel_mid_upload_aborts() {
        let (engine, backend) = engine().await;
        let engine = engine.with_multipart(small_parts(1));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        backend.on_part(move |part| {
            if part == 1 {
                trigger.cancel();
            }
        });
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("big.bin");
        std::fs::write(&src, pattern(4500)).unwrap();

        let task = engine
            .upload(&src, "big.bin", &TransferOptions::default().with_cancel(cancel))
            .await
            .unwrap();
        assert_eq!(task.status, TransferStatus::Cancelled);
        assert_eq!(backend.calls("upload_part"), 1);
        assert_eq!(backend.calls("complete_multipart_upload"), 0);
        assert!(engine.pending_uploads(None).await.unwrap().is_empty());
        assert!(backend.object(BUCKET, "big.bin").is_none());
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (engine, backend) = engine().await;
        let engine = engine.with_multipart(small_parts(2));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("big.bin");
        std::fs::write(&src, pattern(4500)).unwrap();

        let task = engine
            .upload(&src, "big.bin", &TransferOptions::default().with_cancel(cancel))
            .await
            .unwrap();
        assert_eq!(task.status, TransferStatus::Cancelled);
        assert_eq!(backend.calls("create_multipart_upload"), 0);
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_local_io() {
        let (engine, _backend) = engine().await;
        let err = engine
            .upload("/definitely/not/here.bin", "x", &TransferOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LocalIo { .. }));
    }

    #[tokio::test]
    async fn test_invalid_keys() {
        let (engine, _backend) = engine().await;
        assert!(matches!(engine.delete("").await, Err(Error::Validation(_))));
        let long = "k".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(engine.delete(&long).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_download_missing_key_is_not_found() {
        let (engine, _backend) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("missing.bin");

        let (options, events) = recording();
        let err = engine.download("missing.bin", &dst, &options).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!dst.exists());
        assert!(!partial_path(&dst).exists());
        assert_eq!(events.lock().unwrap().last().unwrap().0, TransferStatus::Failed);
    }

    #[tokio::test]
    async fn test_download_resumes_after_broken_stream() {
        let (engine, backend) = engine().await;
        let engine = engine.with_chunk_size(64);
        let original = pattern(3000);
        backend.add_object(BUCKET, "data.bin", &original);
        backend.break_streams(1);
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("data.bin");

        let task = engine
            .download("data.bin", &dst, &TransferOptions::default())
            .await
            .unwrap();
        assert_eq!(task.status, TransferStatus::Completed);
        assert_eq!(backend.calls("get_object"), 2);
        assert_eq!(std::fs::read(&dst).unwrap(), original);
    }

    #[tokio::test]
    async fn test_download_refuses_to_resume_replaced_object() {
        let (engine, backend) = engine().await;
        let engine = engine.with_chunk_size(64);
        backend.add_object(BUCKET, "data.bin", &pattern(3000));
        backend.break_streams(1);
        let replacement: Vec<u8> = pattern(3000).into_iter().rev().collect();
        let writer = Arc::clone(&backend);
        backend.on_get(move |offset| {
            if offset > 0 {
                writer.add_object(BUCKET, "data.bin", &replacement);
            }
        });
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("data.bin");

        let err = engine
            .download("data.bin", &dst, &TransferOptions::default())
            .await
            .unwrap_err();
        match err {
            Error::Transfer { ref key, ref source } => {
                assert_eq!(key, "data.bin");
                assert!(matches!(**source, Error::Provider { status: Some(412), .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.calls("get_object"), 2);
        assert!(!dst.exists());
        assert!(!partial_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_download_gives_up_on_persistent_breaks() {
        let (engine, backend) = engine().await;
        backend.add_object(BUCKET, "data.bin", &pattern(3000));
        backend.break_streams(100);
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("data.bin");

        let err = engine
            .download("data.bin", &dst, &TransferOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transfer { .. }));
        assert!(!dst.exists());
        assert!(!partial_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_download_cancelled_removes_partial() {
        let (engine, backend) = engine().await;
        backend.add_object(BUCKET, "data.bin", &pattern(3000));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("data.bin");

        let task = engine
            .download("data.bin", &dst, &TransferOptions::default().with_cancel(cancel))
            .await
            .unwrap();
        assert_eq!(task.status, TransferStatus::Cancelled);
        assert_eq!(backend.calls("head_object"), 0);
        assert_eq!(backend.calls("get_object"), 0);
        assert!(!dst.exists());
        assert!(!partial_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_download_cancelled_mid_stream() {
        let (engine, backend) = engine().await;
        let engine = engine.with_chunk_size(64);
        backend.add_object(BUCKET, "data.bin", &pattern(3000));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let options = TransferOptions::default()
            .with_cancel(cancel)
            .with_observer(move |task: &TransferTask| {
                if task.transferred_bytes > 0 {
                    trigger.cancel();
                }
            });
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("data.bin");

        let task = engine.download("data.bin", &dst, &options).await.unwrap();
        assert_eq!(task.status, TransferStatus::Cancelled);
        assert_eq!(task.transferred_bytes, 64);
        assert!(!dst.exists());
        assert!(!partial_path(&dst).exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (engine, backend) = engine().await;
        let err = engine.delete("ghost.txt").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(backend.calls("delete_object"), 0);
    }

    #[tokio::test]
    async fn test_list_objects_across_pages() {
        let (engine, backend) = engine().await;
        backend.set_page_size(3);
        for i in 0..7 {
            backend.add_object(BUCKET, &format!("logs/{i:02}.txt"), b"x");
        }
        backend.add_object(BUCKET, "other/file.txt", b"y");

        let keys: Vec<String> = engine
            .list_objects(Some("logs/"))
            .unwrap()
            .map_ok(|o| o.key)
            .try_collect()
            .await
            .unwrap();
        let expected: Vec<String> = (0..7).map(|i| format!("logs/{i:02}.txt")).collect();
        assert_eq!(keys, expected);

        let all: Vec<ObjectKey> = engine.list_objects(None).unwrap().try_collect().await.unwrap();
        assert_eq!(all.len(), 8);
    }

    #[tokio::test]
    async fn test_pending_uploads_can_be_aborted() {
        let (engine, backend) = engine().await;
        let upload_id = backend
            .create_multipart_upload(BUCKET, "stale.bin", None)
            .await
            .unwrap();

        let pending = engine.pending_uploads(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, "stale.bin");

        engine.abort_pending_upload("stale.bin", &upload_id).await.unwrap();
        assert!(engine.pending_uploads(None).await.unwrap().is_empty());
    }
}
