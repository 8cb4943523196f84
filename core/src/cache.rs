//! The reference-counted inode cache.
//!
//! Every inode currently referenced by an open file handle, a directory
//! handle, or an in-flight operation lives in one `HashMap` keyed by inode
//! number, wrapped in an `Arc<Mutex<_>>`. `Arc`'s strong count *is* the
//! reference count: [`InodeCache::get`] clones the `Arc` (bumping the
//! count), and [`InodeCache::release`] drops the caller's clone and evicts
//! the entry once it is the last one standing. A second, much smaller map
//! remembers directory inode numbers by their resolved path, so repeat
//! lookups of the same directory don't have to walk from the root.
//!
//! Two locks exist and are never nested in the same order as each other:
//! `cache_lock` (an `RwLock` guarding both maps) and `ino_lock` (a `Mutex`
//! guarding the super block / inode allocator). `ino_lock` is always
//! released before `cache_lock` is acquired; nothing in this module ever
//! holds both at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use kvfs_api::store::Store;
use kvfs_api::types::{SuperBlockD, ROOT_INO, SUPER_KEY};
use log::{error, warn};

use crate::buffer::InodeBuffer;
use crate::error::Result;

/// One cached inode: its decoded buffer, and whether it has unpersisted
/// changes. Under the write-through-plus-write-back policy this crate uses,
/// `dirty` is normally `false` by the time a caller sees the entry again —
/// it exists as a safety net so eviction always flushes rather than
/// silently trusting that every mutator remembered to write through.
#[derive(Debug)]
pub struct CacheEntry {
    /// The inode's decoded contents.
    pub buffer: InodeBuffer,
    /// Set by every mutating accessor; cleared by [`InodeCache::persist`].
    pub dirty: bool,
}

#[derive(Debug, Default)]
struct CacheInner {
    by_ino: HashMap<u64, Arc<Mutex<CacheEntry>>>,
    dir_paths: HashMap<String, u64>,
}

/// The cache sitting between the filesystem operation layer and the raw
/// key-value store.
#[derive(Debug)]
pub struct InodeCache {
    store: Store,
    cache_lock: RwLock<CacheInner>,
    ino_lock: Mutex<SuperBlockD>,
}

impl InodeCache {
    /// Open the cache over `store`, reading (or, on a fresh store,
    /// initializing) the super block and the root directory inode.
    pub fn mount(store: Store) -> Result<InodeCache> {
        let sb = match store.get(SUPER_KEY)? {
            Some(bytes) => SuperBlockD::decode(&bytes)?,
            None => {
                let sb = SuperBlockD { cur_ino: ROOT_INO };
                store.put(SUPER_KEY, &sb.encode()?)?;
                let root = InodeBuffer::new_empty(kvfs_api::types::FType::Dir);
                store.put(&Store::ino_key(ROOT_INO), &root.encode()?)?;
                sb
            }
        };
        Ok(InodeCache {
            store,
            cache_lock: RwLock::new(CacheInner::default()),
            ino_lock: Mutex::new(sb),
        })
    }

    /// Flush the super block and close the underlying store. Every cached
    /// entry must already have been released; this is only called once the
    /// filesystem is unmounting.
    pub fn unmount(self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }

    /// Allocate the next inode number, persisting the updated super block
    /// immediately. `ino_lock` is held only for the duration of this call.
    ///
    /// The reference design permits deferring this write for up to
    /// [`kvfs_api::types::FILE_COUNTER_THRESHOLD`] allocations at a time;
    /// this implementation always persists on every call instead, since the
    /// write-through policy already pays one `sled` `insert` per mutation
    /// elsewhere and a batched allocator would only reintroduce the crash
    /// window (reissued inode numbers) the threshold exists to bound.
    pub fn alloc_ino(&self) -> Result<u64> {
        let mut sb = self.ino_lock.lock().expect("ino_lock poisoned");
        sb.cur_ino += 1;
        let next = sb.cur_ino;
        self.store.put(SUPER_KEY, &sb.encode()?)?;
        Ok(next)
    }

    /// The highest inode number allocated so far, for a synthetic `statfs`.
    pub fn current_cur_ino(&self) -> Result<u64> {
        let sb = self.ino_lock.lock().expect("ino_lock poisoned");
        Ok(sb.cur_ino)
    }

    /// Fetch (loading from the store on a cache miss) and reference-count a
    /// handle to the inode's cache entry.
    pub fn get(&self, ino: u64) -> Result<Arc<Mutex<CacheEntry>>> {
        {
            let inner = self.cache_lock.read().expect("cache_lock poisoned");
            if let Some(entry) = inner.by_ino.get(&ino) {
                return Ok(Arc::clone(entry));
            }
        }
        let bytes = self
            .store
            .get(&Store::ino_key(ino))?
            .ok_or_else(|| {
                warn!("cache miss for ino {ino} found no backing store entry");
                kvfs_api::error::StoreError::Malformed("inode vanished from store")
            })?;
        let buffer = InodeBuffer::decode(&bytes).map_err(|e| {
            error!("inode {ino} payload failed to decode: {e}");
            e
        })?;
        let entry = Arc::new(Mutex::new(CacheEntry {
            buffer,
            dirty: false,
        }));
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        let entry = Arc::clone(inner.by_ino.entry(ino).or_insert(entry));
        Ok(entry)
    }

    /// Insert a freshly created inode's buffer into the cache (and write it
    /// through to the store), returning a handle to it.
    pub fn insert_new(&self, ino: u64, buffer: InodeBuffer) -> Result<Arc<Mutex<CacheEntry>>> {
        self.store.put(&Store::ino_key(ino), &buffer.encode()?)?;
        let entry = Arc::new(Mutex::new(CacheEntry {
            buffer,
            dirty: false,
        }));
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        inner.by_ino.insert(ino, Arc::clone(&entry));
        Ok(entry)
    }

    /// Write `entry`'s buffer through to the store immediately, clearing
    /// `dirty`. Called by every mutating filesystem operation right after
    /// it changes a buffer, per the write-through policy.
    pub fn persist(&self, ino: u64, entry: &Arc<Mutex<CacheEntry>>) -> Result<()> {
        let mut guard = entry.lock().expect("cache entry poisoned");
        let bytes = guard.buffer.encode()?;
        self.store.put(&Store::ino_key(ino), &bytes).map_err(|e| {
            error!("failed to persist inode {ino}: {e}");
            e
        })?;
        guard.dirty = false;
        Ok(())
    }

    /// Drop one reference to `ino`'s cache entry. If `entry` (the caller's
    /// clone, about to be dropped alongside `handle`) is the last reference
    /// besides the map's own, flush it (if dirty) and remove it from the
    /// cache — mirroring the write-back half of the caching policy.
    pub fn release(&self, ino: u64, entry: Arc<Mutex<CacheEntry>>) -> Result<()> {
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        // Two references remain at this point: `entry` (about to be
        // dropped) and the one the map holds.
        if Arc::strong_count(&entry) <= 2 {
            if let Some(cached) = inner.by_ino.remove(&ino) {
                let guard = cached.lock().expect("cache entry poisoned");
                if guard.dirty {
                    self.store
                        .put(&Store::ino_key(ino), &guard.buffer.encode()?)?;
                }
            }
        }
        drop(entry);
        Ok(())
    }

    /// Delete an inode entirely: drop it from the cache (without writing it
    /// back — it no longer exists) and remove it from the store.
    pub fn forget(&self, ino: u64) -> Result<()> {
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        inner.by_ino.remove(&ino);
        inner.dir_paths.retain(|_, v| *v != ino);
        self.store.delete(&Store::ino_key(ino))?;
        Ok(())
    }

    /// Look up a directory's inode number by its fully resolved path, if it
    /// has been resolved before.
    pub fn lookup_dir_path(&self, path: &str) -> Option<u64> {
        let inner = self.cache_lock.read().expect("cache_lock poisoned");
        inner.dir_paths.get(path).copied()
    }

    /// Remember that `path` resolves to directory inode `ino`.
    pub fn remember_dir_path(&self, path: String, ino: u64) {
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        inner.dir_paths.insert(path, ino);
    }

    /// Forget a remembered directory path, e.g. because it was renamed or
    /// removed.
    pub fn forget_dir_path(&self, path: &str) {
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        inner.dir_paths.remove(path);
    }

    /// Invalidate every memoized path pointing at `ino`. Called on a
    /// successful `rename` of a directory: since the memo is keyed by path
    /// string and a rename changes that string, the stale entry must be
    /// dropped rather than left to resolve to the wrong place.
    pub fn invalidate_dir_paths_to(&self, ino: u64) {
        let mut inner = self.cache_lock.write().expect("cache_lock poisoned");
        inner.dir_paths.retain(|_, v| *v != ino);
    }

    /// Whether `ino` currently has a live entry in the cache map. Test-only:
    /// lets a test assert that a `get`/`release` pair actually evicted its
    /// entry rather than leaking a reference that pins it forever.
    #[cfg(test)]
    pub(crate) fn is_cached(&self, ino: u64) -> bool {
        let inner = self.cache_lock.read().expect("cache_lock poisoned");
        inner.by_ino.contains_key(&ino)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvfs_api::types::{DentryD, FType};

    fn temp_cache() -> (InodeCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (InodeCache::mount(store).unwrap(), dir)
    }

    #[test]
    fn mount_initializes_root_inode() {
        let (cache, _dir) = temp_cache();
        let entry = cache.get(ROOT_INO).unwrap();
        let guard = entry.lock().unwrap();
        assert_eq!(guard.buffer.used_dat_sz(), 0);
    }

    #[test]
    fn alloc_ino_increments_and_persists() {
        let (cache, _dir) = temp_cache();
        let a = cache.alloc_ino().unwrap();
        let b = cache.alloc_ino().unwrap();
        assert_eq!(b, a + 1);
    }

    #[test]
    fn get_caches_repeated_lookups_to_the_same_handle() {
        let (cache, _dir) = temp_cache();
        let a = cache.get(ROOT_INO).unwrap();
        let b = cache.get(ROOT_INO).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn release_evicts_and_writes_back_dirty_entries() {
        let (cache, _dir) = temp_cache();
        let ino = cache.alloc_ino().unwrap();
        let mut buf = InodeBuffer::new_empty(FType::Dir);
        buf.append_dentry(&DentryD::new(1, FType::Reg, "x"));
        let entry = cache.insert_new(ino, buf).unwrap();
        cache.release(ino, entry).unwrap();

        let reloaded = cache.get(ino).unwrap();
        let guard = reloaded.lock().unwrap();
        assert_eq!(guard.buffer.dentry_count(), 1);
    }

    #[test]
    fn dir_path_memo_round_trips() {
        let (cache, _dir) = temp_cache();
        assert_eq!(cache.lookup_dir_path("/a/b"), None);
        cache.remember_dir_path("/a/b".to_string(), 7);
        assert_eq!(cache.lookup_dir_path("/a/b"), Some(7));
        cache.forget_dir_path("/a/b");
        assert_eq!(cache.lookup_dir_path("/a/b"), None);
    }
}
