//! Thin abstraction over the embedded ordered key-value store.
//!
//! Mirrors the shape of a real device controller: a single `Store` handle
//! wraps a `sled::Db`, keys are decimal ASCII inode numbers (or the literal
//! `"0"` for the super block, see [`kvfs_api::types::SUPER_KEY`]), and every
//! method maps directly onto one KV operation. No caching happens here —
//! that is the inode cache's job, one layer up in `kvfs-core`.
//!
//! *EXTRA*: in a more realistic deployment this would be a thin wrapper
//! around `rocksdb::DB` instead; `sled` is used here because it is a
//! pure-Rust embedded ordered KV store with the same get/insert/remove/flush
//! shape, and does not require a C++ toolchain to build.

use std::path::Path;

use crate::error::Result;

/// A handle to the backing key-value store.
///
/// `Store` does not interpret the bytes it stores; it only provides
/// `get`/`put`/`delete` keyed by inode number (or the super block key), plus
/// lifecycle methods to open and close the underlying database.
#[derive(Debug)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    /// Open the store at `path`, creating it if it does not yet exist.
    /// Fails only on genuine backend errors (e.g. a corrupt or
    /// lock-contended database directory).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        let db = sled::open(path)?;
        Ok(Store { db })
    }

    /// Fetch the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?.map(|ivec| ivec.to_vec()))
    }

    /// Store `value` under `key`, overwriting any previous value. A single
    /// `put` is atomic with respect to concurrent `get`s and `put`s on the
    /// same key, but a multi-key update (e.g. a new inode plus its parent's
    /// updated directory listing) is not atomic across the two `put`s.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// Remove the value stored under `key`, if any. A no-op if `key` was
    /// already absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    /// Encode `ino` the way this store expects keys to look: decimal ASCII.
    pub fn ino_key(ino: u64) -> String {
        ino.to_string()
    }

    /// Flush all pending writes to stable storage and close the store.
    /// Consumes `self`; there is no way to use a `Store` after closing it.
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (store, _dir) = temp_store();
        store.put("1", b"hello").unwrap();
        assert_eq!(store.get("1").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn get_of_missing_key_is_none() {
        let (store, _dir) = temp_store();
        assert_eq!(store.get("999").unwrap(), None);
    }

    #[test]
    fn delete_removes_the_key() {
        let (store, _dir) = temp_store();
        store.put("1", b"hello").unwrap();
        store.delete("1").unwrap();
        assert_eq!(store.get("1").unwrap(), None);
    }

    #[test]
    fn delete_of_missing_key_is_a_no_op() {
        let (store, _dir) = temp_store();
        assert!(store.delete("42").is_ok());
    }

    #[test]
    fn reopening_the_store_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            store.put("1", b"persisted").unwrap();
            store.close().unwrap();
        }
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.get("1").unwrap(), Some(b"persisted".to_vec()));
    }
}
