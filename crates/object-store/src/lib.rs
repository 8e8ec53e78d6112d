//! S3-compatible object store client for the s3fs mount.
//!
//! This crate defines the narrow surface the filesystem layer needs from a
//! bucket ([`ObjectStoreClient`]) and a concrete implementation ([`Storage`])
//! on top of the `object_store` crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use s3fs_object_store::{ObjectStoreClient, ObjectStoreConfig, Storage};
//!
//! # async fn example() -> Result<(), s3fs_object_store::ObjectStoreError> {
//! let config = ObjectStoreConfig::S3 {
//!     endpoint: "http://localhost:9000".to_string(),
//!     access_key: "minioadmin".to_string(),
//!     secret_key: "minioadmin".to_string(),
//!     bucket: "photos".to_string(),
//!     region: None,
//! };
//! let storage = Storage::new(&config)?;
//!
//! let listing = storage.list("2024/").await?;
//! for dir in &listing.common_prefixes {
//!     println!("dir  {}", dir);
//! }
//! for object in &listing.objects {
//!     println!("file {} ({} bytes)", object.key, object.size);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod storage;

pub use client::{
    CompletedPart, Listing, ObjectMetadata, ObjectStoreClient, ObjectSummary, UploadId, DELIMITER,
};
pub use error::{ObjectStoreError, Result};
pub use storage::{ObjectStoreConfig, Storage, DEFAULT_REGION};
