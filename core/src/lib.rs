//! Filesystem core: the layer between a raw key-value store and a POSIX
//! filesystem surface.
//!
//! This crate owns everything that is not specific to how the filesystem is
//! exposed to the kernel: the on-store inode buffer format ([`buffer`]),
//! path resolution ([`path`]), the reference-counted inode cache ([`cache`]),
//! and the POSIX-shaped operation layer itself ([`fs`]). A separate bridge
//! crate adapts [`fs::FileSystem`] to `fuser::Filesystem`.

#![deny(missing_docs)]

pub mod buffer;
pub mod cache;
pub mod error;
pub mod fs;
pub mod path;
