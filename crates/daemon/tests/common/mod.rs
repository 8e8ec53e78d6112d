//! Shared test fixtures.
//!
//! `RecordingStore` is an in-memory [`ObjectStoreClient`] that keeps a log of
//! every call it receives and can be told to fail specific operations.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use object_store::{
    CompletedPart, Listing, ObjectMetadata, ObjectStoreClient, ObjectStoreError, ObjectSummary,
    Result, UploadId, DELIMITER,
};
use parking_lot::Mutex;

use s3fs_daemon::{BucketFs, FlushMode};

pub const MIB: usize = 1024 * 1024;

/// Store operations, used to select which calls fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Head,
    Put,
    CreateMultipart,
    UploadPart,
    Complete,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    Head(String),
    Put { key: String, size: usize },
    CreateMultipart(String),
    UploadPart { key: String, part_number: u32, size: usize },
    Complete { key: String, parts: Vec<u32> },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::List(_) => Op::List,
            Call::Head(_) => Op::Head,
            Call::Put { .. } => Op::Put,
            Call::CreateMultipart(_) => Op::CreateMultipart,
            Call::UploadPart { .. } => Op::UploadPart,
            Call::Complete { .. } => Op::Complete,
        }
    }
}

#[derive(Debug)]
struct Upload {
    key: String,
    parts: HashMap<u32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Bytes>,
    uploads: HashMap<UploadId, Upload>,
    next_upload: u64,
    calls: Vec<Call>,
    failing: HashSet<Op>,
}

#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: Mutex<Inner>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A store holding `keys`, each with a one-byte body.
    pub fn with_keys(keys: &[&str]) -> Arc<Self> {
        let store = Self::new();
        for key in keys {
            store.insert(key, b"x");
        }
        store
    }

    pub fn insert(&self, key: &str, body: &[u8]) {
        self.inner
            .lock()
            .objects
            .insert(key.to_string(), Bytes::copy_from_slice(body));
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().objects.get(key).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.calls().iter().map(Call::op).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Uploads created and not yet completed.
    pub fn pending_uploads(&self) -> usize {
        self.inner.lock().uploads.len()
    }

    /// Make every later call of `op` fail until [`heal`](Self::heal).
    pub fn fail(&self, op: Op) {
        self.inner.lock().failing.insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.inner.lock().failing.remove(&op);
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut inner = self.inner.lock();
        let op = call.op();
        inner.calls.push(call);
        if inner.failing.contains(&op) {
            return Err(ObjectStoreError::Config(format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

/// A filesystem over `store`.
pub fn bucket_fs(store: &Arc<RecordingStore>, mode: FlushMode) -> BucketFs {
    BucketFs::new(store.clone(), mode)
}

#[async_trait]
impl ObjectStoreClient for RecordingStore {
    async fn list(&self, prefix: &str) -> Result<Listing> {
        self.record(Call::List(prefix.to_string()))?;
        let inner = self.inner.lock();

        let mut common_prefixes = BTreeSet::new();
        let mut objects = Vec::new();
        for (key, body) in inner.objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find(DELIMITER) {
                Some(idx) => {
                    common_prefixes.insert(format!("{}{}", prefix, &rest[..=idx]));
                }
                None => objects.push(ObjectSummary {
                    key: key.clone(),
                    size: body.len() as u64,
                    last_modified: Utc::now(),
                }),
            }
        }

        Ok(Listing {
            common_prefixes: common_prefixes.into_iter().collect(),
            objects,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        self.record(Call::Head(key.to_string()))?;
        let inner = self.inner.lock();
        let body = inner
            .objects
            .get(key)
            .ok_or_else(|| ObjectStoreError::NotFound {
                key: key.to_string(),
            })?;
        Ok(ObjectMetadata {
            size: body.len() as u64,
            last_modified: Utc::now(),
        })
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        self.record(Call::Put {
            key: key.to_string(),
            size: body.len(),
        })?;
        self.inner.lock().objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<UploadId> {
        self.record(Call::CreateMultipart(key.to_string()))?;
        let mut inner = self.inner.lock();
        inner.next_upload += 1;
        let upload_id = format!("upload-{}", inner.next_upload);
        inner.uploads.insert(
            upload_id.clone(),
            Upload {
                key: key.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        self.record(Call::UploadPart {
            key: key.to_string(),
            part_number,
            size: body.len(),
        })?;
        let mut inner = self.inner.lock();
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .filter(|upload| upload.key == key)
            .ok_or_else(|| ObjectStoreError::NotFound {
                key: key.to_string(),
            })?;
        let etag = format!("{}-{}", upload_id, part_number);
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(CompletedPart { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &UploadId,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        self.record(Call::Complete {
            key: key.to_string(),
            parts: parts.iter().map(|p| p.part_number).collect(),
        })?;
        let mut inner = self.inner.lock();
        let upload = inner
            .uploads
            .remove(upload_id)
            .ok_or_else(|| ObjectStoreError::NotFound {
                key: key.to_string(),
            })?;

        let mut body = Vec::new();
        for part in &parts {
            match upload.parts.get(&part.part_number) {
                Some((etag, bytes)) if *etag == part.etag => body.extend_from_slice(bytes),
                _ => {
                    return Err(ObjectStoreError::InvalidArgument(format!(
                        "unknown part {} for {}",
                        part.part_number, key
                    )))
                }
            }
        }
        inner.objects.insert(key.to_string(), Bytes::from(body));
        Ok(())
    }
}
