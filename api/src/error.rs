//! The error type produced by the KV adapter and binary codecs.
//!
//! We follow the same pattern as most layered filesystem code: an enum
//! annotated with [`thiserror::Error`] so `Display` is derived from the
//! `#[error(...)]` format strings, and `#[from]` wrapping so the `?`
//! operator can convert `sled`/`bincode`/`io` errors into ours for free.

use std::io;
use thiserror::Error;

/// Error type produced by the store and codec layer.
///
/// The `#[from]` tag generates a `From` impl, so `sled::Error` and
/// `bincode::Error` convert into a `StoreError` automatically wherever `?`
/// is used against this crate's functions.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error performing IO against the backing KV store's files.
    #[error("IO error in the store layer")]
    Io(#[from] io::Error),
    /// Error opening, reading or writing the embedded KV store itself.
    #[error("KV store error")]
    Kv(#[from] sled::Error),
    /// Error (de)serializing a value read from or written to the store.
    #[error("serialization error in the store layer")]
    Codec(#[from] bincode::Error),
    /// A decoded payload did not satisfy a structural invariant, e.g. an
    /// inode payload shorter than the attribute footer, or a directory
    /// payload whose length is not a multiple of the dentry size.
    #[error("malformed payload: {0}")]
    Malformed(&'static str),

    /// Catch-all for the few places a fully generic error is appropriate
    /// (store open/close plumbing). Avoided elsewhere because it destroys
    /// the ability of callers to match on a specific variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Generic alias for a `Result` with the error type [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
