//! Error type used by the image accessor and `Buffer`/`Block` (de)serialization
//! helpers.
//!
//! Higher layers (the block table, directory codec, path resolver, VFS ops
//! in `sfs-engine`) wrap this error with `#[from]` rather than matching on
//! its variants directly, the same way the layered `cplfs`-style lineage
//! wraps each level's error in the next.

use std::io;
use thiserror::Error;

/// Error raised by the image accessor or by the raw (de)serialization
/// helpers on `Buffer`/`Block`.
#[derive(Error, Debug)]
pub enum ImageError {
    /// I/O failure underneath the memory-mapped image.
    #[error("I/O error in the image accessor")]
    Io(#[from] io::Error),
    /// Failure (de)serializing a fixed-width scalar value through the
    /// `Buffer` helpers.
    #[error("(de)serialization error in the image accessor")]
    Serialize(#[from] bincode::Error),
    /// Invalid input to the image accessor itself (e.g. a read or write
    /// past the end of the device, or a size mismatch on load).
    #[error("invalid image input: {0}")]
    ImageInput(&'static str),
    /// Invalid input to a `Block`/`Buffer` (e.g. a read or write past the
    /// bounds of the buffer).
    #[error("invalid block input: {0}")]
    BlockInput(&'static str),
}

/// Shorthand `Result` for the image-accessor layer.
pub type Result<T> = std::result::Result<T, ImageError>;
