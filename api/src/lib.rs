//! Narrow collaborator interfaces for the kvfs core.
//!
//! This crate owns everything the filesystem core treats as an external
//! dependency rather than as its own logic: the embedded key-value store
//! adapter, the on-store binary layouts, and the error taxonomy those two
//! produce. Nothing in here knows about paths, directory trees, or POSIX
//! semantics; that lives in `kvfs-core`.

#![deny(missing_docs)]

pub mod error;
pub mod store;
pub mod types;
