//! Storage - [`ObjectStoreClient`] backed by the `object_store` crate.
//!
//! S3 (or any S3-compatible endpoint such as MinIO) is reached through
//! `AmazonS3`; tests and dry runs use the in-process `InMemory` store. Both
//! implement `ObjectStore` and `MultipartStore`, which is all we rely on.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    CompletedPart, Listing, ObjectMetadata, ObjectStoreClient, ObjectSummary, UploadId, DELIMITER,
};
use crate::error::{ObjectStoreError, Result};

/// Region used when none is configured. Most S3-compatible servers ignore it.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Backend selection for [`Storage`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectStoreConfig {
    /// S3 or an S3-compatible server, addressed path-style.
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        #[serde(default)]
        region: Option<String>,
    },
    /// Process-local store. Contents are lost when the [`Storage`] is dropped.
    Memory,
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                bucket,
                region,
                ..
            } => f
                .debug_struct("S3")
                .field("endpoint", endpoint)
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .field("bucket", bucket)
                .field("region", region)
                .finish(),
            ObjectStoreConfig::Memory => f.write_str("Memory"),
        }
    }
}

/// A bucket handle implementing [`ObjectStoreClient`].
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn ObjectStore>,
    multipart: Arc<dyn MultipartStore>,
    bucket: String,
}

impl Storage {
    /// Build the backend described by `config`.
    pub fn new(config: &ObjectStoreConfig) -> Result<Self> {
        match config {
            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let s3 = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or(DEFAULT_REGION))
                    .with_virtual_hosted_style_request(false)
                    .with_allow_http(true)
                    .build()
                    .map_err(|e| ObjectStoreError::Config(e.to_string()))?;
                let s3 = Arc::new(s3);
                Ok(Self {
                    store: s3.clone(),
                    multipart: s3,
                    bucket: bucket.clone(),
                })
            }
            ObjectStoreConfig::Memory => Ok(Self::memory()),
        }
    }

    /// A fresh, empty in-memory bucket.
    pub fn memory() -> Self {
        let mem = Arc::new(InMemory::new());
        Self {
            store: mem.clone(),
            multipart: mem,
            bucket: "memory".to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn map_err(key: &str, err: object_store::Error) -> ObjectStoreError {
        match err {
            object_store::Error::NotFound { .. } => ObjectStoreError::NotFound {
                key: key.to_string(),
            },
            other => ObjectStoreError::Backend(other),
        }
    }

    fn summary(meta: ObjectMeta) -> ObjectSummary {
        ObjectSummary {
            key: meta.location.to_string(),
            size: meta.size as u64,
            last_modified: meta.last_modified,
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("bucket", &self.bucket)
            .field("store", &self.store.to_string())
            .finish()
    }
}

/// The store path for `key`, taken verbatim.
///
/// Unlike `Path::from`, this never percent-encodes: `50% off.txt` stays
/// `50% off.txt`.
fn location(key: &str) -> Result<Path> {
    Path::parse(key).map_err(|source| ObjectStoreError::InvalidKey {
        key: key.to_string(),
        source,
    })
}

/// Split a raw listing prefix into the directory `object_store` can list and
/// the full prefix entries must start with.
///
/// `"a/b"` lists directory `"a"`; `"a/"` lists `"a"`; `"b"` and `""` list the root.
fn listing_dir(prefix: &str) -> Result<Option<Path>> {
    match prefix.rfind(DELIMITER) {
        Some(idx) if idx > 0 => location(&prefix[..idx]).map(Some),
        _ => Ok(None),
    }
}

#[async_trait]
impl ObjectStoreClient for Storage {
    async fn list(&self, prefix: &str) -> Result<Listing> {
        let dir = listing_dir(prefix)?;
        debug!(bucket = %self.bucket, prefix = %prefix, "listing objects");
        let result = self
            .store
            .list_with_delimiter(dir.as_ref())
            .await
            .map_err(|e| Self::map_err(prefix, e))?;

        let mut common_prefixes: Vec<String> = result
            .common_prefixes
            .into_iter()
            .map(|p| format!("{}{}", p, DELIMITER))
            .filter(|p| p.starts_with(prefix))
            .collect();
        common_prefixes.sort();

        let mut objects: Vec<ObjectSummary> = result
            .objects
            .into_iter()
            .map(Self::summary)
            .filter(|o| o.key.starts_with(prefix))
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(Listing {
            common_prefixes,
            objects,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        let meta = self
            .store
            .head(&location(key)?)
            .await
            .map_err(|e| Self::map_err(key, e))?;
        Ok(ObjectMetadata {
            size: meta.size as u64,
            last_modified: meta.last_modified,
        })
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        debug!(bucket = %self.bucket, key = %key, size = body.len(), "put object");
        self.store
            .put(&location(key)?, PutPayload::from(body))
            .await
            .map_err(|e| Self::map_err(key, e))?;
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<UploadId> {
        let id = self
            .multipart
            .create_multipart(&location(key)?)
            .await
            .map_err(|e| Self::map_err(key, e))?;
        debug!(bucket = %self.bucket, key = %key, upload_id = %id, "created multipart upload");
        Ok(id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        if part_number == 0 {
            return Err(ObjectStoreError::InvalidArgument(
                "multipart part numbers start at 1".to_string(),
            ));
        }
        let size = body.len();
        let part = self
            .multipart
            .put_part(
                &location(key)?,
                upload_id,
                (part_number - 1) as usize,
                PutPayload::from(body),
            )
            .await
            .map_err(|e| Self::map_err(key, e))?;
        debug!(key = %key, upload_id = %upload_id, part_number, size, "uploaded part");
        Ok(CompletedPart {
            part_number,
            etag: part.content_id,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &UploadId,
        mut parts: Vec<CompletedPart>,
    ) -> Result<()> {
        parts.sort_by_key(|p| p.part_number);
        let count = parts.len();
        let parts = parts
            .into_iter()
            .map(|p| PartId {
                content_id: p.etag,
            })
            .collect();
        self.multipart
            .complete_multipart(&location(key)?, upload_id, parts)
            .await
            .map_err(|e| Self::map_err(key, e))?;
        debug!(key = %key, upload_id = %upload_id, parts = count, "completed multipart upload");
        Ok(())
    }
}
