//! In-memory storage backend for unit tests
//!
//! Behaves like a strongly consistent S3 endpoint: bucket and object listings
//! are paged, multipart uploads keep their parts until completed or aborted,
//! and any primitive can be made to fail a given number of times.

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::{Error, Result};
use crate::provider::{ProviderKind, ProviderProfile, resolve};
use crate::retry::RetryPolicy;
use crate::session::{Credentials, SessionManager};
use crate::traits::{
    BucketPage, BucketRef, CompletedPart, Connector, ObjectBody, ObjectKey, ObjectPage,
    PendingUpload, StorageBackend,
};

type PartHook = Box<dyn Fn(i32) + Send + Sync>;
type GetHook = Box<dyn Fn(u64) + Send + Sync>;

struct Upload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    uploads: BTreeMap<String, Upload>,
    next_upload: u64,
    completed_part_orders: Vec<Vec<i32>>,
}

/// In-memory [`StorageBackend`]
pub(crate) struct MemoryBackend {
    state: Mutex<State>,
    page_size: Mutex<usize>,
    faults: Mutex<HashMap<String, (u32, fn() -> Error)>>,
    calls: Mutex<HashMap<String, u32>>,
    part_hook: Mutex<Option<PartHook>>,
    get_hook: Mutex<Option<GetHook>>,
    broken_streams: Mutex<u32>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            page_size: Mutex::new(1000),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            part_hook: Mutex::new(None),
            get_hook: Mutex::new(None),
            broken_streams: Mutex::new(0),
        })
    }

    pub(crate) fn set_page_size(&self, size: usize) {
        *self.page_size.lock().unwrap() = size.max(1);
    }

    pub(crate) fn add_bucket(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .buckets
            .entry(name.to_string())
            .or_default();
    }

    pub(crate) fn add_object(&self, bucket: &str, key: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
    }

    pub(crate) fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key).cloned())
    }

    pub(crate) fn pending_upload_count(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    /// Part numbers passed to each completed multipart commit
    pub(crate) fn completed_part_orders(&self) -> Vec<Vec<i32>> {
        self.state.lock().unwrap().completed_part_orders.clone()
    }

    /// Fail `op` (or `op#part` for a single part) the next `times` calls
    pub(crate) fn fail(&self, op: &str, times: u32, make: fn() -> Error) {
        self.faults
            .lock()
            .unwrap()
            .insert(op.to_string(), (times, make));
    }

    /// Break the next `times` object bodies halfway through
    pub(crate) fn break_streams(&self, times: u32) {
        *self.broken_streams.lock().unwrap() = times;
    }

    /// Run `hook` after each stored part
    pub(crate) fn on_part(&self, hook: impl Fn(i32) + Send + Sync + 'static) {
        *self.part_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Run `hook` with the requested offset before each object GET
    pub(crate) fn on_get(&self, hook: impl Fn(u64) + Send + Sync + 'static) {
        *self.get_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub(crate) fn calls(&self, op: &str) -> u32 {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn enter(&self, op: &str, detail: Option<String>) -> Result<()> {
        *self.calls.lock().unwrap().entry(op.to_string()).or_insert(0) += 1;

        let mut faults = self.faults.lock().unwrap();
        for name in [detail.unwrap_or_default(), op.to_string()] {
            if let Some((remaining, make)) = faults.get_mut(&name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(make());
                }
            }
        }
        Ok(())
    }

    fn page<T: Clone>(&self, items: &[T], start: usize) -> (Vec<T>, Option<String>) {
        let size = *self.page_size.lock().unwrap();
        let end = (start + size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        (items[start..end].to_vec(), next)
    }
}

fn no_such_bucket(bucket: &str) -> Error {
    Error::NotFound(format!("NoSuchBucket: {bucket}"))
}

fn parse_token(token: Option<String>) -> usize {
    token.and_then(|t| t.parse().ok()).unwrap_or(0)
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_buckets(&self, continuation: Option<String>) -> Result<BucketPage> {
        self.enter("list_buckets", None)?;
        let names: Vec<BucketRef> = self
            .state
            .lock()
            .unwrap()
            .buckets
            .keys()
            .map(BucketRef::new)
            .collect();
        let (buckets, next_token) = self.page(&names, parse_token(continuation));
        Ok(BucketPage {
            buckets,
            next_token,
        })
    }

    async fn create_bucket(&self, bucket: &str, _location: Option<&str>) -> Result<()> {
        self.enter("create_bucket", None)?;
        let mut state = self.state.lock().unwrap();
        if state.buckets.contains_key(bucket) {
            return Err(Error::NameConflict(format!("BucketAlreadyOwnedByYou: {bucket}")));
        }
        state.buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        self.enter("list_objects", None)?;
        let objects: Vec<ObjectKey> = {
            let state = self.state.lock().unwrap();
            let objects = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            objects
                .iter()
                .filter(|(k, _)| prefix.is_none_or(|p| k.starts_with(p)))
                .map(|(k, v)| stored(k, v))
                .collect()
        };
        let (objects, next_token) = self.page(&objects, parse_token(continuation));
        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectKey> {
        self.enter("head_object", None)?;
        let state = self.state.lock().unwrap();
        let objects = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects
            .get(key)
            .map(|v| stored(key, v))
            .ok_or_else(|| Error::NotFound("provider returned HTTP 404".into()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<()> {
        self.enter("put_object", None)?;
        let mut state = self.state.lock().unwrap();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        if_match: Option<&str>,
    ) -> Result<ObjectBody> {
        self.enter("get_object", None)?;
        if let Some(hook) = self.get_hook.lock().unwrap().as_ref() {
            hook(offset);
        }
        let data = {
            let state = self.state.lock().unwrap();
            let objects = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            let data = objects
                .get(key)
                .ok_or_else(|| Error::NotFound(format!("NoSuchKey: {key}")))?;
            if if_match.is_some_and(|tag| tag != etag(data)) {
                return Err(Error::Provider {
                    code: "PreconditionFailed".into(),
                    status: Some(412),
                    message: "At least one of the pre-conditions you specified did not hold".into(),
                });
            }
            data[(offset as usize).min(data.len())..].to_vec()
        };

        let fail_at = {
            let mut broken = self.broken_streams.lock().unwrap();
            if *broken > 0 && data.len() > 1 {
                *broken -= 1;
                Some(data.len() / 2)
            } else {
                None
            }
        };

        Ok(ObjectBody {
            content_length: Some(data.len() as u64),
            reader: Box::pin(FlakyReader {
                data,
                pos: 0,
                fail_at,
            }),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.enter("delete_object", None)?;
        let mut state = self.state.lock().unwrap();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        // S3 answers 204 whether or not the key existed
        objects.remove(key);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
    ) -> Result<String> {
        self.enter("create_multipart_upload", None)?;
        let mut state = self.state.lock().unwrap();
        if !state.buckets.contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String> {
        self.enter("upload_part", Some(format!("upload_part#{part_number}")))?;
        {
            let mut state = self.state.lock().unwrap();
            let upload = state
                .uploads
                .get_mut(upload_id)
                .ok_or_else(|| Error::NotFound(format!("NoSuchUpload: {upload_id}")))?;
            upload.parts.insert(part_number, data);
        }
        if let Some(hook) = self.part_hook.lock().unwrap().as_ref() {
            hook(part_number);
        }
        tokio::task::yield_now().await;
        Ok(format!("\"etag-{part_number}\""))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        self.enter("complete_multipart_upload", None)?;
        let mut state = self.state.lock().unwrap();
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::NotFound(format!("NoSuchUpload: {upload_id}")))?;

        let order: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        let mut data = Vec::new();
        for part in parts {
            let bytes = upload.parts.get(&part.part_number).ok_or_else(|| Error::Provider {
                code: "InvalidPart".into(),
                status: Some(400),
                message: format!("part {} was never uploaded", part.part_number),
            })?;
            data.extend_from_slice(bytes);
        }

        state.completed_part_orders.push(order);
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn abort_multipart_upload(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        self.enter("abort_multipart_upload", None)?;
        self.state
            .lock()
            .unwrap()
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("NoSuchUpload: {upload_id}")))
    }

    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<PendingUpload>> {
        self.enter("list_multipart_uploads", None)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .uploads
            .iter()
            .filter(|(_, u)| u.bucket == bucket && prefix.is_none_or(|p| u.key.starts_with(p)))
            .map(|(id, u)| PendingUpload {
                key: u.key.clone(),
                upload_id: id.clone(),
                initiated: None,
            })
            .collect())
    }
}

fn etag(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

fn stored(key: &str, data: &[u8]) -> ObjectKey {
    ObjectKey {
        etag: Some(etag(data)),
        ..ObjectKey::new(key, data.len() as i64)
    }
}

/// Reader that optionally fails with a reset once `fail_at` bytes are served
struct FlakyReader {
    data: Vec<u8>,
    pos: usize,
    fail_at: Option<usize>,
}

impl AsyncRead for FlakyReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let limit = self.fail_at.unwrap_or(self.data.len());
        if self.pos >= limit && self.fail_at.is_some() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        let end = limit.min(self.pos + buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..end]);
        self.pos = end;
        Poll::Ready(Ok(()))
    }
}

/// Connector that always hands out the same backend
pub(crate) struct StaticConnector(pub(crate) Arc<MemoryBackend>);

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(
        &self,
        _profile: &ProviderProfile,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn StorageBackend>> {
        Ok(self.0.clone())
    }
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
    }
}

pub(crate) fn manager_without_session() -> Arc<SessionManager> {
    Arc::new(SessionManager::with_retry(
        Arc::new(StaticConnector(MemoryBackend::new())),
        fast_retry(),
    ))
}

/// Manager connected to a fresh in-memory backend
pub(crate) async fn connected_manager() -> (Arc<SessionManager>, Arc<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let manager = Arc::new(SessionManager::with_retry(
        Arc::new(StaticConnector(backend.clone())),
        fast_retry(),
    ));
    let profile = resolve(ProviderKind::Custom, "", "http://localhost:9000").unwrap();
    manager
        .connect(profile, Credentials::new("minioadmin", "minioadmin").unwrap())
        .await
        .unwrap();
    (manager, backend)
}
