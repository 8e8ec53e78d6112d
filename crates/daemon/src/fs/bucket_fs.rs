use tracing::debug;

use super::error::FsError;
use super::node::{DirectoryNode, FileNode, Node, SharedStore};
use super::path;
use super::write_buffer::FlushMode;

/// Entry point into a mounted bucket.
///
/// Holds no namespace state of its own: every node it hands out is built
/// from the store on demand.
#[derive(Debug, Clone)]
pub struct BucketFs {
    store: SharedStore,
    flush_mode: FlushMode,
}

impl BucketFs {
    pub fn new(store: SharedStore, flush_mode: FlushMode) -> Self {
        Self { store, flush_mode }
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// The root directory (path `""`).
    pub fn root(&self) -> DirectoryNode {
        debug!("accessing root of the filesystem");
        self.directory(path::ROOT)
    }

    /// A directory node for a path already known to be a directory.
    pub fn directory(&self, path: &str) -> DirectoryNode {
        DirectoryNode::new(path, self.store.clone(), self.flush_mode)
    }

    /// Classify an arbitrary stored path.
    pub async fn resolve(&self, path: &str) -> Result<Node, FsError> {
        if path == path::ROOT {
            return Ok(Node::Directory(self.root()));
        }
        let (parent, name) = path::split(path);
        self.directory(parent).lookup(name).await
    }

    /// Resolve `path` and require a file.
    pub async fn open_file(&self, path: &str) -> Result<FileNode, FsError> {
        match self.resolve(path).await? {
            Node::File(file) => Ok(file),
            Node::Directory(dir) => Err(FsError::IsADirectory(dir.path().to_string())),
        }
    }

    /// Resolve `path` and require a directory.
    pub async fn open_directory(&self, path: &str) -> Result<DirectoryNode, FsError> {
        match self.resolve(path).await? {
            Node::Directory(dir) => Ok(dir),
            Node::File(file) => Err(FsError::NotADirectory(file.path().to_string())),
        }
    }
}
