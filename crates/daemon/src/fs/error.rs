use object_store::ObjectStoreError;

/// Errors returned by filesystem node operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// No key and no common prefix matched the path.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("unknown file handle: {0}")]
    BadHandle(u64),

    /// Any failure talking to the bucket. Never remapped to another kind.
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

impl FsError {
    /// The errno reported to the kernel for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::InvalidName(_) => libc::EINVAL,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::Store(_) => libc::EIO,
        }
    }
}
