//! Directory and file nodes.
//!
//! Nodes are built fresh for every traversal. Whether a path is a directory
//! or a file is decided by the listing returned at lookup time and is never
//! remembered, since objects can appear or vanish in the bucket at any time.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use object_store::ObjectStoreClient;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::FsError;
use super::path;
use super::write_buffer::{FlushMode, FlushReason, WriteBuffer};

/// Shared handle to the bucket.
pub type SharedStore = Arc<dyn ObjectStoreClient>;

/// Permission bits reported for directories.
pub const DIR_PERM: u16 = 0o755;
/// Permission bits reported for files.
pub const FILE_PERM: u16 = 0o666;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// Attributes reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttributes {
    pub kind: NodeKind,
    pub perm: u16,
    pub size: u64,
    pub mtime: SystemTime,
}

/// One child of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// Result of resolving a path.
#[derive(Debug)]
pub enum Node {
    Directory(DirectoryNode),
    File(FileNode),
}

impl Node {
    pub fn path(&self) -> &str {
        match self {
            Node::Directory(dir) => dir.path(),
            Node::File(file) => file.path(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Directory(_) => NodeKind::Directory,
            Node::File(_) => NodeKind::File,
        }
    }

    pub async fn attributes(&self) -> Result<NodeAttributes, FsError> {
        match self {
            Node::Directory(dir) => Ok(dir.attributes()),
            Node::File(file) => file.attributes().await,
        }
    }
}

/// A synthetic directory: every key under `path + "/"`.
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    path: String,
    store: SharedStore,
    flush_mode: FlushMode,
}

impl DirectoryNode {
    pub(crate) fn new(path: impl Into<String>, store: SharedStore, flush_mode: FlushMode) -> Self {
        Self {
            path: path.into(),
            store,
            flush_mode,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directories have no backing object, so nothing is fetched.
    pub fn attributes(&self) -> NodeAttributes {
        debug!(path = %self.path, "getting attributes of directory");
        NodeAttributes {
            kind: NodeKind::Directory,
            perm: DIR_PERM,
            size: 0,
            mtime: UNIX_EPOCH,
        }
    }

    /// Classify `name` inside this directory.
    ///
    /// A common prefix `candidate/` wins over an object keyed `candidate`;
    /// entries that merely share the textual prefix are ignored.
    pub async fn lookup(&self, name: &str) -> Result<Node, FsError> {
        path::validate_name(name)?;
        let candidate = path::join(&self.path, name);
        debug!(path = %candidate, "looking up path");

        let listing = self.store.list(&candidate).await?;

        let dir_prefix = path::dir_prefix(&candidate);
        if listing.common_prefixes.iter().any(|p| *p == dir_prefix) {
            debug!(path = %candidate, "path is a directory");
            return Ok(Node::Directory(DirectoryNode::new(
                candidate,
                self.store.clone(),
                self.flush_mode,
            )));
        }

        if listing.objects.iter().any(|o| o.key == candidate) {
            debug!(path = %candidate, "path is a file");
            return Ok(Node::File(FileNode::new(
                candidate,
                self.store.clone(),
                self.flush_mode,
            )));
        }

        debug!(path = %candidate, "path not found");
        Err(FsError::NotFound(candidate))
    }

    /// Children of this directory in lexicographic name order.
    ///
    /// A key and a common prefix that strip to the same name are both
    /// reported.
    pub async fn list_children(&self) -> Result<Vec<DirEntry>, FsError> {
        let prefix = path::dir_prefix(&self.path);
        debug!(prefix = %prefix, "reading directory");

        let listing = self.store.list(&prefix).await.inspect_err(|err| {
            warn!(prefix = %prefix, error = %err, "failed to read directory");
        })?;

        let dirs = listing.common_prefixes.iter().map(|p| DirEntry {
            name: path::child_name(p, &prefix).to_string(),
            kind: NodeKind::Directory,
        });
        let files = listing.objects.iter().map(|o| DirEntry {
            name: path::child_name(&o.key, &prefix).to_string(),
            kind: NodeKind::File,
        });

        // an object keyed exactly `prefix` (a directory marker) has no name
        let mut entries: Vec<DirEntry> = dirs
            .chain(files)
            .filter(|e| !e.name.is_empty())
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Create an empty object for `name` and return a handle for writing it.
    pub async fn create(&self, name: &str) -> Result<FileNode, FsError> {
        path::validate_name(name)?;
        let key = path::join(&self.path, name);
        debug!(key = %key, "creating new file");

        self.store.put(&key, Bytes::new()).await.inspect_err(|err| {
            warn!(key = %key, error = %err, "failed to create new file");
        })?;

        Ok(FileNode::new(key, self.store.clone(), self.flush_mode))
    }
}

/// An object opened through one file handle.
///
/// The write buffer belongs to this handle alone. It always starts empty,
/// even when the object already has content.
#[derive(Debug)]
pub struct FileNode {
    path: String,
    store: SharedStore,
    flush_mode: FlushMode,
    buffer: Mutex<WriteBuffer>,
}

impl FileNode {
    pub(crate) fn new(path: impl Into<String>, store: SharedStore, flush_mode: FlushMode) -> Self {
        Self {
            path: path.into(),
            store,
            flush_mode,
            buffer: Mutex::new(WriteBuffer::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// Size and mtime of the stored object. Buffered bytes are not counted.
    pub async fn attributes(&self) -> Result<NodeAttributes, FsError> {
        debug!(path = %self.path, "getting attributes of file");
        let meta = self.store.head(&self.path).await.inspect_err(|err| {
            warn!(path = %self.path, error = %err, "failed to get attributes of file");
        })?;

        Ok(NodeAttributes {
            kind: NodeKind::File,
            perm: FILE_PERM,
            size: meta.size,
            mtime: SystemTime::from(meta.last_modified),
        })
    }

    /// Append `data` to the handle's buffer, flushing once it reaches the
    /// threshold. Returns the number of bytes accepted, which is all of them.
    pub async fn write(&self, data: &[u8], offset: i64) -> Result<usize, FsError> {
        let mut buffer = self.buffer.lock().await;
        debug!(path = %self.path, size = data.len(), offset, "writing data to buffer");
        buffer.append(data, offset);

        if buffer.should_flush() {
            debug!(
                path = %self.path,
                buffered = buffer.len(),
                "buffer reached threshold, flushing"
            );
            buffer
                .flush(
                    self.store.as_ref(),
                    &self.path,
                    self.flush_mode,
                    FlushReason::Threshold,
                )
                .await?;
        }

        Ok(data.len())
    }

    /// Commit everything written through this handle (close/fsync).
    pub async fn flush(&self) -> Result<(), FsError> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() && !buffer.has_pending_upload() {
            return Ok(());
        }

        debug!(path = %self.path, buffered = buffer.len(), "flushing file");
        buffer
            .flush(
                self.store.as_ref(),
                &self.path,
                self.flush_mode,
                FlushReason::Explicit,
            )
            .await?;
        Ok(())
    }

    /// Replace the stored object with an empty one.
    ///
    /// Anything buffered on this handle is dropped with it.
    pub async fn truncate(&self) -> Result<(), FsError> {
        let mut buffer = self.buffer.lock().await;
        debug!(path = %self.path, buffered = buffer.len(), "truncating file");
        self.store
            .put(&self.path, Bytes::new())
            .await
            .inspect_err(|err| {
                warn!(path = %self.path, error = %err, "failed to truncate file");
            })?;
        buffer.discard();
        Ok(())
    }

    /// Bytes currently held in the handle's buffer.
    pub async fn buffered_len(&self) -> usize {
        self.buffer.lock().await.len()
    }
}
