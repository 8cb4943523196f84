//! Error type for the filesystem core.
//!
//! Layered the same way `kvfs-api::error::StoreError` is: one enum per
//! layer, wrapping the layer below via `#[from]`. The bridge binary is the
//! only place these get turned into negative POSIX errno codes — see
//! [`FsError::errno`].

use kvfs_api::error::StoreError;
use thiserror::Error;

/// Error type produced by every operation in [`crate::fs::FileSystem`].
#[derive(Error, Debug)]
pub enum FsError {
    /// Propagated verbatim from the KV store or codec layer. Always an
    /// `EIO`-class failure from the bridge's point of view.
    #[error("store error")]
    Store(#[from] StoreError),

    /// A path component does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A path component that should be a directory is a regular file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// An operation that requires a regular file was given a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// `mknod`/`mkdir` target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A write would push a file past `MAX_FILE_SIZE`.
    #[error("file too big")]
    TooBig,

    /// A supplied path was structurally invalid (empty, not absolute).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl FsError {
    /// Map this error onto the positive POSIX errno magnitude the bridge
    /// should negate and hand back to `fuser`. Exhaustive per spec.md §7.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::Store(_) => libc::EIO,
            FsError::NotFound(_) => libc::ENOENT,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::TooBig => libc::EFBIG,
            FsError::InvalidPath(_) => libc::EINVAL,
        }
    }
}

/// Generic alias for a `Result` with the error type [`FsError`].
pub type Result<T> = std::result::Result<T, FsError>;
