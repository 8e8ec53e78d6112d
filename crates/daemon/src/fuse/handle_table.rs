//! Open file handles.
//!
//! Every `create` and `open` allocates a handle owning its own [`FileNode`]
//! and therefore its own write buffer. The handle lives until `release`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::fs::FileNode;

#[derive(Debug)]
pub struct HandleTable {
    next_fh: AtomicU64,
    handles: Mutex<HashMap<u64, Arc<FileNode>>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            next_fh: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Register an open file and return its handle number
    pub fn insert(&self, file: FileNode) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().insert(fh, Arc::new(file));
        fh
    }

    pub fn get(&self, fh: u64) -> Option<Arc<FileNode>> {
        self.handles.lock().get(&fh).cloned()
    }

    pub fn remove(&self, fh: u64) -> Option<Arc<FileNode>> {
        self.handles.lock().remove(&fh)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}
