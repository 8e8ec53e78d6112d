//! The object store surface the filesystem layer is written against.
//!
//! Keys are plain strings without a leading slash. Listing always groups on
//! [`DELIMITER`], mirroring the S3 `ListObjectsV2` call with `Delimiter=/`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Key delimiter used to infer synthetic directories.
pub const DELIMITER: char = '/';

/// Identifier of an in-progress multipart upload.
pub type UploadId = String;

/// One object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Result of a prefix + delimiter listing.
///
/// `common_prefixes` keep their trailing delimiter (`"a/d/"`), exactly as S3
/// reports them. Both vectors are in lexicographic key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectSummary>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.common_prefixes.is_empty() && self.objects.is_empty()
    }
}

/// Metadata returned by a head query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Descriptor of an uploaded part, supplied back on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    pub etag: String,
}

/// Thin interface over an S3-compatible bucket.
///
/// Every call is a single round trip. Implementations never retry; the first
/// failure is returned to the caller.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + std::fmt::Debug {
    /// List keys starting with `prefix`, grouping on [`DELIMITER`].
    async fn list(&self, prefix: &str) -> Result<Listing>;

    /// Fetch size and modification time of `key`.
    async fn head(&self, key: &str) -> Result<ObjectMetadata>;

    /// Replace the object at `key` with `body`.
    async fn put(&self, key: &str, body: Bytes) -> Result<()>;

    async fn create_multipart_upload(&self, key: &str) -> Result<UploadId>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> Result<CompletedPart>;

    /// Assemble `parts` (in the given order) into the object at `key`,
    /// replacing whatever was stored there before.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &UploadId,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;
}
