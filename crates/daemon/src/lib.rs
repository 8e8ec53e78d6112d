//! Mount an S3-compatible bucket as a local filesystem.
//!
//! - [`fs`]: the bucket namespace as directory and file nodes, plus write
//!   buffering and the multipart flush protocol
//! - [`fuse`]: `fuser` binding (feature `fuse`)
//! - [`config`] and [`process`]: settings and the mount lifecycle

pub mod config;
pub mod fs;
#[cfg(feature = "fuse")]
pub mod fuse;
#[cfg(feature = "fuse")]
pub mod process;

pub use config::{Config, ConfigError, ConfigFile};
pub use fs::{BucketFs, FlushMode, FsError};
#[cfg(feature = "fuse")]
pub use process::MountError;
