//! Inode ↔ stored path mapping for the FUSE layer.
//!
//! FUSE addresses nodes by 64-bit inode numbers while the bucket only knows
//! keys. An inode is handed out when the kernel looks a path up and lives
//! until the kernel forgets every lookup of it. Only the path is remembered;
//! whether it is a file or a directory is re-resolved against the bucket on
//! every request.

use std::collections::HashMap;

#[derive(Debug)]
struct InodeEntry {
    path: String,
    /// Lookups the kernel holds on this inode.
    lookups: u64,
}

/// Bidirectional mapping between inodes and stored paths
#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    entries: HashMap<u64, InodeEntry>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    /// Create a table holding only the root (`""`)
    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            entries: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.path_to_inode.insert(String::new(), Self::ROOT_INODE);
        table.entries.insert(
            Self::ROOT_INODE,
            InodeEntry {
                path: String::new(),
                lookups: 1,
            },
        );
        table
    }

    fn allocate(&mut self) -> u64 {
        let inode = self.next_inode;
        self.next_inode += 1;
        inode
    }

    /// Inode for `path` as handed to the kernel by `lookup` or `create`.
    ///
    /// Allocates on first sight and counts one kernel lookup either way.
    pub fn lookup(&mut self, path: &str) -> u64 {
        let normalized = Self::normalize_path(path);
        if let Some(&inode) = self.path_to_inode.get(normalized) {
            if let Some(entry) = self.entries.get_mut(&inode) {
                entry.lookups = entry.lookups.saturating_add(1);
            }
            return inode;
        }

        let inode = self.allocate();
        self.path_to_inode.insert(normalized.to_string(), inode);
        self.entries.insert(
            inode,
            InodeEntry {
                path: normalized.to_string(),
                lookups: 1,
            },
        );
        inode
    }

    /// Inode number to report for a directory entry.
    ///
    /// Directory listings do not count as kernel lookups, so an unknown path
    /// gets a fresh number without being remembered.
    pub fn listing_inode(&mut self, path: &str) -> u64 {
        match self.get_inode(path) {
            Some(inode) => inode,
            None => self.allocate(),
        }
    }

    /// Drop `nlookup` kernel lookups of `inode`, removing it once none remain.
    ///
    /// Returns whether the inode was removed. The root is never removed.
    pub fn forget(&mut self, inode: u64, nlookup: u64) -> bool {
        if inode == Self::ROOT_INODE {
            return false;
        }
        let Some(entry) = self.entries.get_mut(&inode) else {
            return false;
        };
        entry.lookups = entry.lookups.saturating_sub(nlookup);
        if entry.lookups > 0 {
            return false;
        }

        if let Some(entry) = self.entries.remove(&inode) {
            // the path may already point at a newer inode
            if self.path_to_inode.get(&entry.path) == Some(&inode) {
                self.path_to_inode.remove(&entry.path);
            }
        }
        true
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode
            .get(Self::normalize_path(path))
            .copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.entries.get(&inode).map(|e| e.path.as_str())
    }

    /// Forget a path that no longer exists in the bucket.
    ///
    /// The root is never forgotten.
    pub fn remove_by_path(&mut self, path: &str) -> Option<u64> {
        let normalized = Self::normalize_path(path);
        if normalized.is_empty() {
            return None;
        }
        let inode = self.path_to_inode.remove(normalized)?;
        self.entries.remove(&inode);
        Some(inode)
    }

    /// Number of known paths, root included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strip surrounding slashes so `/a/b/` and `a/b` share an inode.
    /// Whitespace is part of the key.
    fn normalize_path(path: &str) -> &str {
        path.trim_matches('/')
    }
}
