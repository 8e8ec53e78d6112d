//! FUSE binding for a mounted bucket.
//!
//! # Architecture
//!
//! - `S3Fuse`: `fuser::Filesystem` implementation, spawns each request onto tokio
//! - `InodeTable`: Bidirectional inode ↔ path mapping
//! - `HandleTable`: Open file handles, one write buffer each

mod handle_table;
mod inode_table;
mod s3_fuse;

pub use handle_table::HandleTable;
pub use inode_table::InodeTable;
pub use s3_fuse::S3Fuse;
