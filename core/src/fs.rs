//! The POSIX-shaped filesystem operation layer.
//!
//! [`FileSystem`] is the surface the bridge binary drives: every method
//! here corresponds to one POSIX-ish call (`getattr`, `mknod`, `read`,
//! `rename`, ...), taking and returning plain inode numbers the way
//! `fuser::Filesystem` does, so the bridge can pass kernel-supplied inode
//! numbers straight through without maintaining a translation table of its
//! own — this filesystem's inode numbers *are* its FUSE inode numbers.
//!
//! Every mutating method writes through to the store before returning
//! (see [`crate::cache::InodeCache::persist`]); eviction from the cache is
//! a write-back safety net, not the primary persistence path. This crate
//! does not offer a disconnected or lazily-flushed mode — see `SPEC_FULL.md`
//! for why write-through was chosen over pure write-back here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use kvfs_api::store::Store;
use kvfs_api::types::{DentryD, FType, NAME_MAX};
use log::{debug, trace, warn};

use crate::buffer::InodeBuffer;
use crate::cache::{CacheEntry, InodeCache};
use crate::error::{FsError, Result};
use crate::path::{self, Resolved};

/// How many levels of directory nesting [`FileSystem::drop_subtree`] will
/// recurse through before switching to the explicit-work-queue fallback.
/// Past this depth a pathological directory tree could otherwise overflow
/// the call stack.
const DROP_SUBTREE_RECURSION_LIMIT: usize = 256;

/// Attributes of one inode, as reported to `getattr`-style callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    /// Inode number.
    pub ino: u64,
    /// File type.
    pub ftype: FType,
    /// Size of the inode's data region, in bytes. For a directory this is
    /// the number of dentries times [`kvfs_api::types::DIRENTRY_SIZE`],
    /// not a number of bytes an application would find meaningful, which
    /// mirrors `stat(2)`'s own treatment of directory sizes.
    pub size: u64,
    /// Hard link count. Always 1: hard links are a Non-goal.
    pub nlink: u16,
}

/// One entry returned by [`FileSystem::readdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The entry's inode number.
    pub ino: u64,
    /// The entry's file type.
    pub ftype: FType,
    /// The entry's name.
    pub name: String,
}

/// Coarse filesystem-wide statistics, for a synthetic `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    /// Total number of inodes ever allocated (including the root).
    pub total_inodes: u64,
}

/// The filesystem operation layer, wrapping one mounted [`InodeCache`] plus
/// the table of handles admitted by an in-progress `open`/`opendir` session
/// (see [`FileSystem::admit`]).
pub struct FileSystem {
    cache: InodeCache,
    open_handles: Mutex<HashMap<u64, (Arc<Mutex<CacheEntry>>, usize)>>,
}

impl FileSystem {
    /// Open the store at `store_path` and mount it, initializing a fresh
    /// root directory if the store is new.
    pub fn mount<P: AsRef<Path>>(store_path: P) -> Result<FileSystem> {
        let store = Store::open(store_path)?;
        Ok(FileSystem {
            cache: InodeCache::mount(store)?,
            open_handles: Mutex::new(HashMap::new()),
        })
    }

    /// Flush and close the underlying store. Callers must have released
    /// every handle they opened before calling this.
    pub fn unmount(self) -> Result<()> {
        self.cache.unmount()
    }

    fn attr_from_buffer(ino: u64, buffer: &InodeBuffer) -> Result<Attr> {
        Ok(Attr {
            ino,
            ftype: buffer.ftype()?,
            size: buffer.used_dat_sz(),
            nlink: buffer.footer().nlink,
        })
    }

    /// Fetch `ino`'s attributes.
    pub fn getattr(&self, ino: u64) -> Result<Attr> {
        trace!("getattr(ino: {ino})");
        let entry = self.cache.get(ino)?;
        let attr = {
            let guard = entry.lock().expect("cache entry poisoned");
            Self::attr_from_buffer(ino, &guard.buffer)?
        };
        self.cache.release(ino, entry)?;
        Ok(attr)
    }

    fn find_dentry(&self, parent: u64, name: &str) -> Result<Option<(u64, DentryD)>> {
        let entry = self.cache.get(parent)?;
        let mut not_a_dir = false;
        let mut found = None;
        {
            let guard = entry.lock().expect("cache entry poisoned");
            if guard.buffer.ftype()? != FType::Dir {
                not_a_dir = true;
            } else {
                for i in 0..guard.buffer.dentry_count() {
                    let d = guard.buffer.dentry_at(i)?;
                    if d.name() == name {
                        found = Some((i, d));
                        break;
                    }
                }
            }
        }
        self.cache.release(parent, entry)?;
        if not_a_dir {
            return Err(FsError::NotADirectory(name.to_string()));
        }
        Ok(found)
    }

    /// Look up `name` inside directory `parent`.
    pub fn lookup(&self, parent: u64, name: &str) -> Result<Attr> {
        match self.find_dentry(parent, name)? {
            Some((_, d)) => self.getattr(d.ino),
            None => Err(FsError::NotFound(name.to_string())),
        }
    }

    fn create_entry(&self, parent: u64, name: &str, ftype: FType) -> Result<Attr> {
        if name.is_empty() || name.len() > NAME_MAX {
            return Err(FsError::InvalidPath(name.to_string()));
        }
        if self.find_dentry(parent, name)?.is_some() {
            warn!("create_entry(parent: {parent}, name: {name:?}): already exists");
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let ino = self.cache.alloc_ino()?;
        let buffer = InodeBuffer::new_empty(ftype);
        let new_entry = self.cache.insert_new(ino, buffer)?;

        let parent_entry = self.cache.get(parent)?;
        {
            let mut guard = parent_entry.lock().expect("cache entry poisoned");
            guard.buffer.append_dentry(&DentryD::new(ino, ftype, name));
            guard.dirty = true;
        }
        self.cache.persist(parent, &parent_entry)?;
        self.cache.release(parent, parent_entry)?;

        let attr = {
            let guard = new_entry.lock().expect("cache entry poisoned");
            Self::attr_from_buffer(ino, &guard.buffer)?
        };
        self.cache.release(ino, new_entry)?;
        Ok(attr)
    }

    /// Create a regular file named `name` inside directory `parent`.
    pub fn mknod(&self, parent: u64, name: &str) -> Result<Attr> {
        debug!("mknod(parent: {parent}, name: {name:?})");
        self.create_entry(parent, name, FType::Reg)
    }

    /// Create a directory named `name` inside directory `parent`.
    pub fn mkdir(&self, parent: u64, name: &str) -> Result<Attr> {
        debug!("mkdir(parent: {parent}, name: {name:?})");
        self.create_entry(parent, name, FType::Dir)
    }

    /// Recursively delete `ino` and, if it is a directory, every inode
    /// reachable underneath it, bypassing the cache's reference counting
    /// (these inodes are gone, not merely released). Recurses directly up
    /// to [`DROP_SUBTREE_RECURSION_LIMIT`] levels deep; beyond that it
    /// switches to an explicit work queue so a pathological directory tree
    /// cannot overflow the stack.
    fn drop_subtree(&self, ino: u64) -> Result<()> {
        self.drop_subtree_at(ino, 0)
    }

    fn drop_subtree_at(&self, ino: u64, depth: usize) -> Result<()> {
        if depth >= DROP_SUBTREE_RECURSION_LIMIT {
            return self.drop_subtree_iterative(ino);
        }
        let children = self.children_of(ino)?;
        for child in children {
            self.drop_subtree_at(child, depth + 1)?;
        }
        self.cache.forget(ino)?;
        Ok(())
    }

    /// Non-recursive fallback for [`FileSystem::drop_subtree`]: a
    /// post-order deletion driven by an explicit stack rather than the call
    /// stack.
    fn drop_subtree_iterative(&self, root: u64) -> Result<()> {
        let mut pending = vec![root];
        let mut order = Vec::new();
        while let Some(ino) = pending.pop() {
            order.push(ino);
            pending.extend(self.children_of(ino)?);
        }
        for ino in order.into_iter().rev() {
            self.cache.forget(ino)?;
        }
        Ok(())
    }

    fn children_of(&self, ino: u64) -> Result<Vec<u64>> {
        let entry = self.cache.get(ino)?;
        let children = {
            let guard = entry.lock().expect("cache entry poisoned");
            if guard.buffer.ftype()? == FType::Dir {
                (0..guard.buffer.dentry_count())
                    .map(|i| guard.buffer.dentry_at(i).map(|d| d.ino))
                    .collect::<Result<Vec<_>>>()?
            } else {
                Vec::new()
            }
        };
        self.cache.release(ino, entry)?;
        Ok(children)
    }

    fn remove_entry(&self, parent: u64, name: &str, require_dir: bool) -> Result<()> {
        let (idx, d) = self
            .find_dentry(parent, name)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if require_dir && d.ftype != FType::Dir {
            return Err(FsError::NotADirectory(name.to_string()));
        }

        self.drop_subtree(d.ino)?;

        let parent_entry = self.cache.get(parent)?;
        {
            let mut guard = parent_entry.lock().expect("cache entry poisoned");
            guard.buffer.drop_dentry_at(idx)?;
            guard.dirty = true;
        }
        self.cache.persist(parent, &parent_entry)?;
        self.cache.release(parent, parent_entry)?;
        Ok(())
    }

    /// Remove `name` from directory `parent`, recursively dropping its
    /// entire inode subtree if it names a directory.
    pub fn unlink(&self, parent: u64, name: &str) -> Result<()> {
        debug!("unlink(parent: {parent}, name: {name:?})");
        self.remove_entry(parent, name, false)
    }

    /// Remove the directory `name` from directory `parent`, recursively
    /// dropping every inode still reachable underneath it.
    pub fn rmdir(&self, parent: u64, name: &str) -> Result<()> {
        debug!("rmdir(parent: {parent}, name: {name:?})");
        self.remove_entry(parent, name, true)
    }

    /// Move `name` from directory `parent` to `new_name` in directory
    /// `new_parent`. An existing entry at the destination is overwritten;
    /// if it named a directory, its entire subtree is recursively dropped
    /// first, the same as an explicit `rmdir` would.
    pub fn rename(
        &self,
        parent: u64,
        name: &str,
        new_parent: u64,
        new_name: &str,
    ) -> Result<()> {
        debug!(
            "rename(parent: {parent}, name: {name:?}, new_parent: {new_parent}, new_name: {new_name:?})"
        );
        if new_name.is_empty() || new_name.len() > NAME_MAX {
            return Err(FsError::InvalidPath(new_name.to_string()));
        }
        if parent == new_parent && name == new_name {
            return Ok(());
        }
        let (src_idx, src) = self
            .find_dentry(parent, name)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        if let Some((dst_idx, dst)) = self.find_dentry(new_parent, new_name)? {
            let dst_parent_entry = self.cache.get(new_parent)?;
            {
                let mut guard = dst_parent_entry.lock().expect("cache entry poisoned");
                guard.buffer.drop_dentry_at(dst_idx)?;
                guard.dirty = true;
            }
            self.cache.persist(new_parent, &dst_parent_entry)?;
            self.cache.release(new_parent, dst_parent_entry)?;
            self.drop_subtree(dst.ino)?;
        }

        let src_entry = self.cache.get(parent)?;
        {
            let mut guard = src_entry.lock().expect("cache entry poisoned");
            guard.buffer.drop_dentry_at(src_idx)?;
            guard.dirty = true;
        }
        self.cache.persist(parent, &src_entry)?;
        self.cache.release(parent, src_entry)?;

        let dst_parent_entry = self.cache.get(new_parent)?;
        {
            let mut guard = dst_parent_entry.lock().expect("cache entry poisoned");
            guard
                .buffer
                .append_dentry(&DentryD::new(src.ino, src.ftype, new_name));
            guard.dirty = true;
        }
        self.cache.persist(new_parent, &dst_parent_entry)?;
        self.cache.release(new_parent, dst_parent_entry)?;

        Ok(())
    }

    /// Admit `ino` to the cache for an open session, rejecting a type
    /// mismatch (`want` is the type the caller requires) before admission.
    /// Unlike a bare `getattr`, the cache entry's `Arc` is kept alive in
    /// `open_handles` until a matching [`FileSystem::release`] call rather
    /// than released immediately, so the entry stays pinned in
    /// the cache — and so genuinely warm across repeat `read`/`write` calls
    /// against the same handle — for the life of the session, per §4.4's
    /// admission-on-open/eviction-on-release model. Concurrent opens of the
    /// same inode share one stored `Arc` behind a session counter rather
    /// than each holding their own.
    fn admit(&self, ino: u64, want: FType) -> Result<u64> {
        let entry = self.cache.get(ino)?;
        {
            let guard = entry.lock().expect("cache entry poisoned");
            if guard.buffer.ftype()? != want {
                drop(guard);
                self.cache.release(ino, entry)?;
                return Err(match want {
                    FType::Reg => FsError::IsADirectory(ino.to_string()),
                    FType::Dir => FsError::NotADirectory(ino.to_string()),
                });
            }
        }
        let mut handles = self.open_handles.lock().expect("open_handles poisoned");
        match handles.get_mut(&ino) {
            Some((_, count)) => *count += 1,
            None => {
                handles.insert(ino, (entry, 1));
            }
        }
        Ok(ino)
    }

    /// Resolve `ino` and admit it to the cache as an open file, rejecting a
    /// directory with `EISDIR`. The inode number itself serves as the
    /// handle.
    pub fn open(&self, ino: u64) -> Result<u64> {
        self.admit(ino, FType::Reg)
    }

    /// Release a handle previously returned by [`FileSystem::open`] or
    /// [`FileSystem::opendir`]. Decrements the handle's session count;
    /// once it reaches zero the entry's pinned `Arc` is dropped and handed
    /// to [`crate::cache::InodeCache::release`], which flushes it if dirty
    /// and evicts it if nothing else references it — mirroring §4.4's
    /// release/evict contract.
    pub fn release(&self, handle: u64) -> Result<()> {
        let mut handles = self.open_handles.lock().expect("open_handles poisoned");
        if let Some((_, count)) = handles.get_mut(&handle) {
            *count -= 1;
            if *count == 0 {
                if let Some((entry, _)) = handles.remove(&handle) {
                    drop(handles);
                    self.cache.release(handle, entry)?;
                }
            }
        }
        Ok(())
    }

    /// Read up to `size` bytes from `ino` starting at `offset`. Reading
    /// past the end of the data yields fewer bytes than requested, never
    /// an error.
    pub fn read(&self, ino: u64, offset: u64, size: u32) -> Result<Vec<u8>> {
        let entry = self.cache.get(ino)?;
        let out = {
            let guard = entry.lock().expect("cache entry poisoned");
            let data = guard.buffer.data();
            if offset >= data.len() as u64 {
                Vec::new()
            } else {
                let start = offset as usize;
                let end = (start + size as usize).min(data.len());
                data[start..end].to_vec()
            }
        };
        self.cache.release(ino, entry)?;
        Ok(out)
    }

    /// Write `buf` to `ino` at `offset`, growing the file if needed.
    /// Rejects writes that would push the file past
    /// [`kvfs_api::types::MAX_FILE_SIZE`].
    pub fn write(&self, ino: u64, offset: u64, buf: &[u8]) -> Result<u32> {
        trace!("write(ino: {ino}, offset: {offset}, len: {})", buf.len());
        let new_end = offset + buf.len() as u64;
        if new_end > kvfs_api::types::MAX_FILE_SIZE {
            warn!("write(ino: {ino}): {new_end} exceeds MAX_FILE_SIZE");
            return Err(FsError::TooBig);
        }
        let entry = self.cache.get(ino)?;
        {
            let mut guard = entry.lock().expect("cache entry poisoned");
            if guard.buffer.ftype()? != FType::Reg {
                drop(guard);
                self.cache.release(ino, entry)?;
                return Err(FsError::IsADirectory(ino.to_string()));
            }
            guard.buffer.write_data(buf, offset);
            guard.dirty = true;
        }
        self.cache.persist(ino, &entry)?;
        self.cache.release(ino, entry)?;
        Ok(buf.len() as u32)
    }

    /// Truncate (or zero-extend) `ino` to exactly `size` bytes.
    pub fn truncate(&self, ino: u64, size: u64) -> Result<()> {
        debug!("truncate(ino: {ino}, size: {size})");
        if size > kvfs_api::types::MAX_FILE_SIZE {
            return Err(FsError::TooBig);
        }
        let entry = self.cache.get(ino)?;
        {
            let mut guard = entry.lock().expect("cache entry poisoned");
            guard.buffer.truncate(size);
            guard.dirty = true;
        }
        self.cache.persist(ino, &entry)?;
        self.cache.release(ino, entry)?;
        Ok(())
    }

    /// Force `ino`'s buffer to the store. A no-op beyond re-persisting,
    /// since every mutator already writes through; exists so the bridge
    /// has something to call for `fsync`.
    pub fn fsync(&self, ino: u64) -> Result<()> {
        let entry = self.cache.get(ino)?;
        self.cache.persist(ino, &entry)?;
        self.cache.release(ino, entry)?;
        Ok(())
    }

    /// Resolve `ino` and admit it to the cache as an open directory,
    /// rejecting a regular file with `ENOTDIR`.
    pub fn opendir(&self, ino: u64) -> Result<u64> {
        self.admit(ino, FType::Dir)
    }

    /// List the entries of directory `ino`.
    pub fn readdir(&self, ino: u64) -> Result<Vec<DirEntry>> {
        let entry = self.cache.get(ino)?;
        let out = {
            let guard = entry.lock().expect("cache entry poisoned");
            if guard.buffer.ftype()? != FType::Dir {
                drop(guard);
                self.cache.release(ino, entry)?;
                return Err(FsError::NotADirectory(ino.to_string()));
            }
            let mut out = Vec::with_capacity(guard.buffer.dentry_count() as usize);
            for i in 0..guard.buffer.dentry_count() {
                let d = guard.buffer.dentry_at(i)?;
                out.push(DirEntry {
                    ino: d.ino,
                    ftype: d.ftype,
                    name: d.name(),
                });
            }
            out
        };
        self.cache.release(ino, entry)?;
        Ok(out)
    }

    /// Release a directory handle previously returned by
    /// [`FileSystem::opendir`].
    pub fn releasedir(&self, handle: u64) -> Result<()> {
        self.release(handle)
    }

    /// A synthetic `statfs`: this filesystem has no fixed capacity, so the
    /// only meaningful statistic is how many inodes have ever been handed
    /// out.
    pub fn statfs(&self) -> Result<StatFs> {
        Ok(StatFs {
            total_inodes: self.cache.current_cur_ino()?,
        })
    }

    /// Resolve a full path to its final component, for callers (tests, a
    /// CLI) that work in terms of paths rather than parent-inode-plus-name
    /// pairs.
    pub fn resolve(&self, path: &str) -> Result<Resolved> {
        path::resolve(&self.cache, path)
    }

    /// Resolve `path` and fetch its attributes, failing with
    /// [`FsError::NotFound`] if it does not exist.
    pub fn stat_path(&self, path: &str) -> Result<Attr> {
        let resolved = self.resolve(path)?;
        let d = resolved
            .entry
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        self.getattr(d.ino)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvfs_api::types::ROOT_INO;

    fn temp_fs() -> (FileSystem, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileSystem::mount(dir.path()).unwrap(), dir)
    }

    #[test]
    fn root_exists_and_is_a_directory() {
        let (fs, _dir) = temp_fs();
        let attr = fs.getattr(ROOT_INO).unwrap();
        assert_eq!(attr.ftype, FType::Dir);
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn mknod_then_lookup_round_trips() {
        let (fs, _dir) = temp_fs();
        let created = fs.mknod(ROOT_INO, "a.txt").unwrap();
        let found = fs.lookup(ROOT_INO, "a.txt").unwrap();
        assert_eq!(created.ino, found.ino);
        assert_eq!(found.ftype, FType::Reg);
    }

    #[test]
    fn mknod_duplicate_name_fails() {
        let (fs, _dir) = temp_fs();
        fs.mknod(ROOT_INO, "a.txt").unwrap();
        let err = fs.mknod(ROOT_INO, "a.txt").unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
    }

    #[test]
    fn write_then_read_round_trips() {
        let (fs, _dir) = temp_fs();
        let attr = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.write(attr.ino, 0, b"hello world").unwrap();
        let data = fs.read(attr.ino, 0, 1024).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn partial_read_past_eof_is_short_not_an_error() {
        let (fs, _dir) = temp_fs();
        let attr = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.write(attr.ino, 0, b"hi").unwrap();
        let data = fs.read(attr.ino, 0, 1024).unwrap();
        assert_eq!(data, b"hi");
        let empty = fs.read(attr.ino, 100, 10).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn write_past_max_file_size_is_rejected() {
        let (fs, _dir) = temp_fs();
        let attr = fs.mknod(ROOT_INO, "big.bin").unwrap();
        let buf = vec![0u8; (kvfs_api::types::MAX_FILE_SIZE + 1) as usize];
        let err = fs.write(attr.ino, 0, &buf).unwrap_err();
        assert!(matches!(err, FsError::TooBig));
    }

    #[test]
    fn truncate_shrinks_reported_size() {
        let (fs, _dir) = temp_fs();
        let attr = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.write(attr.ino, 0, b"hello world").unwrap();
        fs.truncate(attr.ino, 5).unwrap();
        assert_eq!(fs.getattr(attr.ino).unwrap().size, 5);
    }

    #[test]
    fn open_rejects_a_directory() {
        let (fs, _dir) = temp_fs();
        let etc = fs.mkdir(ROOT_INO, "etc").unwrap();
        let err = fs.open(etc.ino).unwrap_err();
        assert!(matches!(err, FsError::IsADirectory(_)));
    }

    #[test]
    fn opendir_rejects_a_regular_file() {
        let (fs, _dir) = temp_fs();
        let f = fs.mknod(ROOT_INO, "a.txt").unwrap();
        let err = fs.opendir(f.ino).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));
    }

    #[test]
    fn open_then_release_round_trips_and_persists() {
        let (fs, _dir) = temp_fs();
        let attr = fs.mknod(ROOT_INO, "a.txt").unwrap();
        let handle = fs.open(attr.ino).unwrap();
        assert_eq!(handle, attr.ino);
        fs.write(attr.ino, 0, b"hello").unwrap();
        assert_eq!(fs.read(attr.ino, 0, 5).unwrap(), b"hello");
        fs.release(handle).unwrap();
        // Released, not forgotten: the data is still there on a fresh get.
        assert_eq!(fs.read(attr.ino, 0, 5).unwrap(), b"hello");
    }

    #[test]
    fn nested_opens_of_the_same_handle_need_matching_releases() {
        let (fs, _dir) = temp_fs();
        let attr = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.open(attr.ino).unwrap();
        fs.open(attr.ino).unwrap();
        // One release of two leaves the entry admitted; reads still work.
        fs.release(attr.ino).unwrap();
        assert!(fs.read(attr.ino, 0, 1).unwrap().is_empty());
        fs.release(attr.ino).unwrap();
        assert!(fs.read(attr.ino, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn mkdir_then_readdir_lists_children() {
        let (fs, _dir) = temp_fs();
        fs.mkdir(ROOT_INO, "etc").unwrap();
        fs.mknod(ROOT_INO, "a.txt").unwrap();
        let mut names: Vec<String> = fs
            .readdir(ROOT_INO)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "etc".to_string()]);
    }

    #[test]
    fn rmdir_recursively_drops_a_nonempty_subtree() {
        let (fs, _dir) = temp_fs();
        let a = fs.mkdir(ROOT_INO, "a").unwrap();
        let c = fs.mkdir(a.ino, "c").unwrap();
        let g = fs.mknod(c.ino, "g").unwrap();
        fs.rmdir(ROOT_INO, "a").unwrap();

        assert!(matches!(
            fs.lookup(ROOT_INO, "a").unwrap_err(),
            FsError::NotFound(_)
        ));
        assert!(matches!(
            fs.getattr(a.ino).unwrap_err(),
            FsError::Store(_)
        ));
        assert!(matches!(
            fs.getattr(c.ino).unwrap_err(),
            FsError::Store(_)
        ));
        assert!(matches!(
            fs.getattr(g.ino).unwrap_err(),
            FsError::Store(_)
        ));
    }

    #[test]
    fn rmdir_removes_empty_directory() {
        let (fs, _dir) = temp_fs();
        fs.mkdir(ROOT_INO, "etc").unwrap();
        fs.rmdir(ROOT_INO, "etc").unwrap();
        assert!(matches!(
            fs.lookup(ROOT_INO, "etc").unwrap_err(),
            FsError::NotFound(_)
        ));
    }

    #[test]
    fn rmdir_rejects_a_non_directory_target() {
        let (fs, _dir) = temp_fs();
        fs.mknod(ROOT_INO, "a.txt").unwrap();
        let err = fs.rmdir(ROOT_INO, "a.txt").unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));
    }

    #[test]
    fn unlink_recursively_drops_a_directory_too() {
        let (fs, _dir) = temp_fs();
        let etc = fs.mkdir(ROOT_INO, "etc").unwrap();
        fs.mknod(etc.ino, "conf").unwrap();
        fs.unlink(ROOT_INO, "etc").unwrap();
        assert!(matches!(
            fs.lookup(ROOT_INO, "etc").unwrap_err(),
            FsError::NotFound(_)
        ));
    }

    #[test]
    fn rename_moves_entry_between_directories() {
        let (fs, _dir) = temp_fs();
        let etc = fs.mkdir(ROOT_INO, "etc").unwrap();
        let a = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.rename(ROOT_INO, "a.txt", etc.ino, "b.txt").unwrap();
        assert!(matches!(
            fs.lookup(ROOT_INO, "a.txt").unwrap_err(),
            FsError::NotFound(_)
        ));
        let moved = fs.lookup(etc.ino, "b.txt").unwrap();
        assert_eq!(moved.ino, a.ino);
    }

    #[test]
    fn rename_onto_existing_file_overwrites_it() {
        let (fs, _dir) = temp_fs();
        let a = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.mknod(ROOT_INO, "b.txt").unwrap();
        fs.rename(ROOT_INO, "a.txt", ROOT_INO, "b.txt").unwrap();
        let b = fs.lookup(ROOT_INO, "b.txt").unwrap();
        assert_eq!(b.ino, a.ino);
    }

    #[test]
    fn rename_onto_existing_nonempty_directory_drops_its_subtree() {
        let (fs, _dir) = temp_fs();
        let a = fs.mknod(ROOT_INO, "a.txt").unwrap();
        let old_dst = fs.mkdir(ROOT_INO, "b").unwrap();
        let shadowed = fs.mknod(old_dst.ino, "shadowed").unwrap();
        fs.rename(ROOT_INO, "a.txt", ROOT_INO, "b").unwrap();
        let moved = fs.lookup(ROOT_INO, "b").unwrap();
        assert_eq!(moved.ino, a.ino);
        assert!(matches!(
            fs.getattr(old_dst.ino).unwrap_err(),
            FsError::Store(_)
        ));
        assert!(matches!(
            fs.getattr(shadowed.ino).unwrap_err(),
            FsError::Store(_)
        ));
    }

    #[test]
    fn rename_to_same_name_and_parent_is_a_no_op() {
        let (fs, _dir) = temp_fs();
        let a = fs.mknod(ROOT_INO, "a.txt").unwrap();
        fs.write(a.ino, 0, b"hello").unwrap();
        fs.rename(ROOT_INO, "a.txt", ROOT_INO, "a.txt").unwrap();
        let found = fs.lookup(ROOT_INO, "a.txt").unwrap();
        assert_eq!(found.ino, a.ino);
        assert_eq!(fs.read(a.ino, 0, 5).unwrap(), b"hello");
    }

    #[test]
    fn stat_path_resolves_nested_paths() {
        let (fs, _dir) = temp_fs();
        let etc = fs.mkdir(ROOT_INO, "etc").unwrap();
        fs.mknod(etc.ino, "conf").unwrap();
        let attr = fs.stat_path("/etc/conf").unwrap();
        assert_eq!(attr.ftype, FType::Reg);
    }

    #[test]
    fn mount_unmount_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        let ino = {
            let fs = FileSystem::mount(dir.path()).unwrap();
            let attr = fs.mknod(ROOT_INO, "a.txt").unwrap();
            fs.write(attr.ino, 0, b"persisted").unwrap();
            fs.unmount().unwrap();
            attr.ino
        };
        let fs = FileSystem::mount(dir.path()).unwrap();
        let data = fs.read(ino, 0, 1024).unwrap();
        assert_eq!(data, b"persisted");
    }
}
