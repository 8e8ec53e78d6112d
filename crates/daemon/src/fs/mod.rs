//! Bucket namespace as a filesystem tree.
//!
//! # Architecture
//!
//! - `BucketFs`: root of a mounted bucket, hands out nodes
//! - `DirectoryNode`: synthetic directory derived from a prefix listing
//! - `FileNode`: one open object with its own write buffer
//! - `WriteBuffer`: append buffer plus the multipart commit protocol
//!
//! Object keys and node paths share one format: `/`-separated, no leading
//! slash, root is `""`. The tree is never cached; every lookup and listing
//! goes to the store.

mod bucket_fs;
mod error;
mod node;
pub mod path;
mod write_buffer;

pub use bucket_fs::BucketFs;
pub use error::FsError;
pub use node::{
    DirEntry, DirectoryNode, FileNode, Node, NodeAttributes, NodeKind, SharedStore, DIR_PERM,
    FILE_PERM,
};
pub use write_buffer::{FlushMode, FlushReason, WriteBuffer, FLUSH_THRESHOLD};
