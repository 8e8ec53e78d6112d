//! `fuser::Filesystem` over a [`BucketFs`].
//!
//! fuser calls into this type from its session thread. Every request is
//! moved onto the tokio runtime together with its reply, so slow bucket
//! round trips never hold up the session loop and requests against the same
//! handle may run concurrently. Per-handle ordering is left to the
//! [`FileNode`](crate::fs::FileNode) buffer lock.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::{c_int, EINVAL, EISDIR, ENOENT};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::handle_table::HandleTable;
use super::inode_table::InodeTable;
use crate::fs::{path, BucketFs, FsError, Node, NodeAttributes, NodeKind, FILE_PERM};

const TTL: Duration = Duration::from_secs(1);
const BLOCK_SIZE: u32 = 4096;

pub struct S3Fuse {
    fs: BucketFs,
    runtime: Handle,
    inodes: Arc<Mutex<InodeTable>>,
    handles: Arc<HandleTable>,
    uid: u32,
    gid: u32,
}

impl S3Fuse {
    /// `runtime` must outlive the mount; requests are spawned onto it.
    pub fn new(fs: BucketFs, runtime: Handle) -> Self {
        Self {
            fs,
            runtime,
            inodes: Arc::new(Mutex::new(InodeTable::new())),
            handles: Arc::new(HandleTable::new()),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.inodes.lock().get_path(ino).map(str::to_owned)
    }

    fn owner(&self) -> Owner {
        Owner {
            uid: self.uid,
            gid: self.gid,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    uid: u32,
    gid: u32,
}

impl Owner {
    fn file_attr(&self, ino: u64, attrs: &NodeAttributes) -> FileAttr {
        let nlink = match attrs.kind {
            NodeKind::Directory => 2,
            NodeKind::File => 1,
        };
        FileAttr {
            ino,
            size: attrs.size,
            blocks: attrs.size.div_ceil(512),
            atime: attrs.mtime,
            mtime: attrs.mtime,
            ctime: attrs.mtime,
            crtime: attrs.mtime,
            kind: file_type(attrs.kind),
            perm: attrs.perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

/// Whether a setattr with `size` truncates a node of `kind`.
///
/// Only truncation to zero is carried out; other sizes, modes, owners and
/// times are accepted and left as they are.
fn truncates(kind: NodeKind, size: Option<u64>) -> Result<bool, c_int> {
    match (kind, size) {
        (NodeKind::Directory, Some(_)) => Err(EISDIR),
        (NodeKind::File, Some(0)) => Ok(true),
        _ => Ok(false),
    }
}

/// Pull a UTF-8 name out of a request; keys are always UTF-8.
fn utf8_name(name: &OsStr) -> Result<String, FsError> {
    name.to_str()
        .map(str::to_owned)
        .ok_or_else(|| FsError::InvalidName(name.to_string_lossy().into_owned()))
}

impl Filesystem for S3Fuse {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        info!(flush_mode = ?self.fs.flush_mode(), "filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        let open = self.handles.len();
        if open > 0 {
            warn!(open, "filesystem destroyed with open handles");
        } else {
            info!("filesystem destroyed");
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(ENOENT);
            return;
        };

        let dir = self.fs.directory(&parent_path);
        let inodes = self.inodes.clone();
        let owner = self.owner();
        self.runtime.spawn(async move {
            let resolved = async {
                let node = dir.lookup(&name).await?;
                let attrs = node.attributes().await?;
                Ok::<_, FsError>((node, attrs))
            }
            .await;

            match resolved {
                Ok((node, attrs)) => {
                    let ino = inodes.lock().lookup(node.path());
                    reply.entry(&TTL, &owner.file_attr(ino, &attrs), 0);
                }
                Err(FsError::NotFound(path)) => {
                    inodes.lock().remove_by_path(&path);
                    reply.error(ENOENT);
                }
                Err(err) => {
                    debug!(parent = %parent_path, name = %name, error = %err, "lookup failed");
                    reply.error(err.errno());
                }
            }
        });
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        if self.inodes.lock().forget(ino, nlookup) {
            debug!(ino, "inode forgotten");
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };

        let fs = self.fs.clone();
        let owner = self.owner();
        self.runtime.spawn(async move {
            let attrs = match fs.resolve(&path).await {
                Ok(node) => node.attributes().await,
                Err(err) => Err(err),
            };
            match attrs {
                Ok(attrs) => reply.attr(&TTL, &owner.file_attr(ino, &attrs)),
                Err(err) => {
                    debug!(path = %path, error = %err, "getattr failed");
                    reply.error(err.errno());
                }
            }
        });
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };
        debug!(path = %path, ?mode, ?size, ?fh, "setattr");

        let fs = self.fs.clone();
        let open = fh.and_then(|fh| self.handles.get(fh));
        let owner = self.owner();
        self.runtime.spawn(async move {
            let node = match fs.resolve(&path).await {
                Ok(node) => node,
                Err(err) => {
                    reply.error(err.errno());
                    return;
                }
            };

            match truncates(node.kind(), size) {
                Ok(true) => {
                    // truncate through the open handle so its buffer goes too
                    let truncated = match (&open, &node) {
                        (Some(file), _) => file.truncate().await,
                        (None, Node::File(file)) => file.truncate().await,
                        (None, Node::Directory(_)) => Ok(()),
                    };
                    if let Err(err) = truncated {
                        reply.error(err.errno());
                        return;
                    }
                }
                Ok(false) => {}
                Err(errno) => {
                    reply.error(errno);
                    return;
                }
            }

            match node.attributes().await {
                Ok(attrs) => reply.attr(&TTL, &owner.file_attr(ino, &attrs)),
                Err(err) => {
                    debug!(path = %path, error = %err, "setattr failed");
                    reply.error(err.errno());
                }
            }
        });
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };

        let dir = self.fs.directory(&path);
        let inodes = self.inodes.clone();
        self.runtime.spawn(async move {
            let children = match dir.list_children().await {
                Ok(children) => children,
                Err(err) => {
                    reply.error(err.errno());
                    return;
                }
            };

            let entries: Vec<(u64, FileType, String)> = {
                let mut inodes = inodes.lock();
                let parent_ino = inodes.listing_inode(path::split(&path).0);
                let mut entries = Vec::with_capacity(children.len() + 2);
                entries.push((ino, FileType::Directory, ".".to_string()));
                entries.push((parent_ino, FileType::Directory, "..".to_string()));
                for child in children {
                    let child_ino = inodes.listing_inode(&path::join(&path, &child.name));
                    entries.push((child_ino, file_type(child.kind), child.name));
                }
                entries
            };

            let skip = usize::try_from(offset).unwrap_or(0);
            for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
                // offset handed back is the index of the next entry
                if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                    break;
                }
            }
            reply.ok();
        });
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(ENOENT);
            return;
        };

        let dir = self.fs.directory(&parent_path);
        let inodes = self.inodes.clone();
        let handles = self.handles.clone();
        let owner = self.owner();
        self.runtime.spawn(async move {
            match dir.create(&name).await {
                Ok(file) => {
                    let ino = inodes.lock().lookup(file.path());
                    let now = SystemTime::now();
                    let attrs = NodeAttributes {
                        kind: NodeKind::File,
                        perm: FILE_PERM,
                        size: 0,
                        mtime: now,
                    };
                    let fh = handles.insert(file);
                    reply.created(&TTL, &owner.file_attr(ino, &attrs), 0, fh, 0);
                }
                Err(err) => reply.error(err.errno()),
            }
        });
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };

        let fs = self.fs.clone();
        self.runtime.spawn(async move {
            match fs.open_directory(&path).await {
                Ok(_) => reply.opened(0, 0),
                Err(err) => reply.error(err.errno()),
            }
        });
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };

        let fs = self.fs.clone();
        let handles = self.handles.clone();
        self.runtime.spawn(async move {
            match fs.open_file(&path).await {
                Ok(file) => {
                    let fh = handles.insert(file);
                    debug!(path = %path, fh, "opened file");
                    reply.opened(fh, 0);
                }
                Err(err) => reply.error(err.errno()),
            }
        });
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(file) = self.handles.get(fh) else {
            reply.error(FsError::BadHandle(fh).errno());
            return;
        };

        let data = data.to_vec();
        self.runtime.spawn(async move {
            match file.write(&data, offset).await {
                Ok(written) => match u32::try_from(written) {
                    Ok(written) => reply.written(written),
                    Err(_) => reply.error(EINVAL),
                },
                Err(err) => reply.error(err.errno()),
            }
        });
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        let Some(file) = self.handles.get(fh) else {
            reply.error(FsError::BadHandle(fh).errno());
            return;
        };

        self.runtime.spawn(async move {
            match file.flush().await {
                Ok(()) => reply.ok(),
                Err(err) => reply.error(err.errno()),
            }
        });
    }

    fn fsync(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _datasync: bool,
        reply: ReplyEmpty,
    ) {
        let Some(file) = self.handles.get(fh) else {
            reply.error(FsError::BadHandle(fh).errno());
            return;
        };

        self.runtime.spawn(async move {
            match file.flush().await {
                Ok(()) => reply.ok(),
                Err(err) => reply.error(err.errno()),
            }
        });
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let Some(file) = self.handles.remove(fh) else {
            reply.error(FsError::BadHandle(fh).errno());
            return;
        };

        self.runtime.spawn(async move {
            match file.flush().await {
                Ok(()) => {
                    debug!(path = %file.path(), fh, "released file");
                    reply.ok();
                }
                Err(err) => {
                    warn!(
                        path = %file.path(),
                        fh,
                        error = %err,
                        "unflushed data dropped on release"
                    );
                    reply.error(err.errno());
                }
            }
        });
    }
}
