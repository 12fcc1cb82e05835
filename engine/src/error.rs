//! Error type returned by every `sfs-engine` operation.

use sfs_api::error::ImageError;
use thiserror::Error;

/// Error raised by the SFS engine.
#[derive(Error, Debug)]
pub enum SfsError {
    /// Propagated failure from the underlying image accessor.
    #[error("image error")]
    Image(#[from] ImageError),

    /// No entry exists at the given path.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// An entry already exists where one is being created.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// A path component is too long to fit in a directory entry's name
    /// field, or is otherwise not a valid name.
    #[error("name too long or invalid: {0}")]
    NameTooLong(String),

    /// No free block (or no free adjacent pair) remains in the block
    /// table.
    #[error("no space left on device")]
    NoSpace,

    /// A directory has entries other than the ones being special-cased
    /// and cannot be removed.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// The operation does not apply to the kind of entry found at the
    /// path (e.g. `read` on a directory, `mkdir` on an existing file).
    #[error("operation not supported on this entry: {0}")]
    NotSupported(String),

    /// Generic invalid-input error, for conditions not covered above.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl SfsError {
    /// Translate this error into a standard errno-style negative integer,
    /// for a host binding (CLI or FUSE adapter) to hand back to its
    /// caller.
    pub fn to_errno(&self) -> i32 {
        match self {
            SfsError::Image(_) => -libc::EIO,
            SfsError::NotFound(_) => -libc::ENOENT,
            SfsError::AlreadyExists(_) => -libc::EEXIST,
            SfsError::NameTooLong(_) => -libc::ENAMETOOLONG,
            SfsError::NoSpace => -libc::ENOSPC,
            SfsError::NotEmpty(_) => -libc::ENOTEMPTY,
            SfsError::NotSupported(_) => -libc::ENOTSUP,
            SfsError::InvalidInput(_) => -libc::EINVAL,
        }
    }
}

/// Shorthand `Result` for the SFS engine.
pub type Result<T> = std::result::Result<T, SfsError>;
