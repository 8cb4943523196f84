//! Path resolution: walking an absolute path from the root inode to its
//! leaf, one directory-entry linear scan at a time.
//!
//! There is no name cache beyond [`crate::cache::InodeCache`]'s directory
//! path memo; every component not already memoized is found by scanning the
//! parent directory's dentries in order, mirroring how the reference
//! implementation's `path_lookup` walks `inode_t` buffers rather than
//! consulting an index.

use kvfs_api::types::{DentryD, FType, ROOT_INO};

use crate::cache::InodeCache;
use crate::error::{FsError, Result};

/// The outcome of resolving a path down to its final component.
///
/// Distinct from a plain `Option<DentryD>` because callers like `mknod`
/// need the parent's inode number and the leaf's name even when the leaf
/// itself does not exist yet.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Inode number of the directory that contains (or would contain) the
    /// final path component.
    pub parent_ino: u64,
    /// The final path component's name.
    pub name: String,
    /// The matching dentry, if the final component exists.
    pub entry: Option<DentryD>,
}

/// Split an absolute path into its non-empty components. `/` and `` both
/// resolve to zero components (the root itself).
fn components(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath(path.to_string()));
    }
    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

/// Scan `dir_ino`'s dentries for one named `name`, returning its index and
/// decoded value if found. Releases its reference on `dir_ino` before
/// returning, the same pairing discipline every cache accessor in
/// `core/src/fs.rs` follows — without it, every directory this resolves
/// through would stay pinned in the cache for the life of the mount.
fn find_in_dir(cache: &InodeCache, dir_ino: u64, name: &str) -> Result<Option<(u64, DentryD)>> {
    let entry = cache.get(dir_ino)?;
    let found = {
        let guard = entry.lock().expect("cache entry poisoned");
        let mut found = None;
        for i in 0..guard.buffer.dentry_count() {
            let d = guard.buffer.dentry_at(i)?;
            if d.name() == name {
                found = Some((i, d));
                break;
            }
        }
        found
    };
    cache.release(dir_ino, entry)?;
    Ok(found)
}

/// Resolve `path` (must be absolute) to its final component, descending
/// through intermediate directories. Fails with [`FsError::NotFound`] if an
/// intermediate component is missing, and [`FsError::NotADirectory`] if an
/// intermediate component exists but is a regular file.
///
/// The leaf component itself is allowed to be missing: callers that create
/// things (`mknod`, `mkdir`) need exactly that case to succeed at the
/// `Resolved` level and fail only if they find `entry.is_some()`.
pub fn resolve(cache: &InodeCache, path: &str) -> Result<Resolved> {
    let comps = components(path)?;
    if comps.is_empty() {
        return Ok(Resolved {
            parent_ino: ROOT_INO,
            name: String::new(),
            entry: Some(DentryD::new(ROOT_INO, FType::Dir, "")),
        });
    }

    let mut dir_ino = ROOT_INO;
    let mut dir_path = String::from("/");
    for (depth, comp) in comps.iter().enumerate() {
        let is_last = depth == comps.len() - 1;
        if !is_last {
            let next = match cache.lookup_dir_path(&join(&dir_path, comp)) {
                Some(ino) => ino,
                None => match find_in_dir(cache, dir_ino, comp)? {
                    Some((_, d)) if d.ftype == FType::Dir => {
                        cache.remember_dir_path(join(&dir_path, comp), d.ino);
                        d.ino
                    }
                    Some((_, _)) => {
                        return Err(FsError::NotADirectory(join(&dir_path, comp)));
                    }
                    None => return Err(FsError::NotFound(join(&dir_path, comp))),
                },
            };
            dir_path = join(&dir_path, comp);
            dir_ino = next;
        } else {
            let found = find_in_dir(cache, dir_ino, comp)?;
            return Ok(Resolved {
                parent_ino: dir_ino,
                name: comp.to_string(),
                entry: found.map(|(_, d)| d),
            });
        }
    }
    unreachable!("non-empty component list always returns from the loop")
}

/// Resolve `path` and require that it exist, mapping a missing leaf to
/// [`FsError::NotFound`]. The common case for read-only operations.
pub fn resolve_existing(cache: &InodeCache, path: &str) -> Result<DentryD> {
    let r = resolve(cache, path)?;
    r.entry.ok_or_else(|| FsError::NotFound(path.to_string()))
}

fn join(dir: &str, comp: &str) -> String {
    if dir == "/" {
        format!("/{}", comp)
    } else {
        format!("{}/{}", dir, comp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvfs_api::store::Store;

    fn temp_cache() -> (InodeCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (InodeCache::mount(store).unwrap(), dir)
    }

    fn mkdir(cache: &InodeCache, parent: u64, name: &str) -> u64 {
        let ino = cache.alloc_ino().unwrap();
        let buf = crate::buffer::InodeBuffer::new_empty(FType::Dir);
        let handle = cache.insert_new(ino, buf).unwrap();
        cache.release(ino, handle).unwrap();
        let parent_entry = cache.get(parent).unwrap();
        {
            let mut guard = parent_entry.lock().unwrap();
            guard.buffer.append_dentry(&DentryD::new(ino, FType::Dir, name));
            guard.dirty = true;
        }
        cache.persist(parent, &parent_entry).unwrap();
        cache.release(parent, parent_entry).unwrap();
        ino
    }

    #[test]
    fn root_resolves_to_itself() {
        let (cache, _dir) = temp_cache();
        let r = resolve(&cache, "/").unwrap();
        assert_eq!(r.entry.unwrap().ino, ROOT_INO);
    }

    #[test]
    fn single_level_lookup() {
        let (cache, _dir) = temp_cache();
        mkdir(&cache, ROOT_INO, "etc");
        let r = resolve(&cache, "/etc").unwrap();
        assert_eq!(r.parent_ino, ROOT_INO);
        assert!(r.entry.is_some());
    }

    #[test]
    fn missing_leaf_resolves_with_none_entry() {
        let (cache, _dir) = temp_cache();
        let r = resolve(&cache, "/missing").unwrap();
        assert_eq!(r.parent_ino, ROOT_INO);
        assert!(r.entry.is_none());
    }

    #[test]
    fn missing_intermediate_component_errors() {
        let (cache, _dir) = temp_cache();
        let err = resolve(&cache, "/no/such/dir").unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn intermediate_component_that_is_a_file_errors() {
        let (cache, _dir) = temp_cache();
        let ino = cache.alloc_ino().unwrap();
        let buf = crate::buffer::InodeBuffer::new_empty(FType::Reg);
        let handle = cache.insert_new(ino, buf).unwrap();
        cache.release(ino, handle).unwrap();
        let root = cache.get(ROOT_INO).unwrap();
        {
            let mut guard = root.lock().unwrap();
            guard
                .buffer
                .append_dentry(&DentryD::new(ino, FType::Reg, "notdir"));
        }
        cache.persist(ROOT_INO, &root).unwrap();
        cache.release(ROOT_INO, root).unwrap();

        let err = resolve(&cache, "/notdir/leaf").unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));
    }

    #[test]
    fn relative_path_is_rejected() {
        let (cache, _dir) = temp_cache();
        let err = resolve(&cache, "etc").unwrap_err();
        assert!(matches!(err, FsError::InvalidPath(_)));
    }

    #[test]
    fn nested_lookup_uses_the_directory_path_memo() {
        let (cache, _dir) = temp_cache();
        let etc = mkdir(&cache, ROOT_INO, "etc");
        mkdir(&cache, etc, "conf.d");
        assert_eq!(cache.lookup_dir_path("/etc"), None);
        let r = resolve(&cache, "/etc/conf.d").unwrap();
        assert!(r.entry.is_some());
        assert_eq!(cache.lookup_dir_path("/etc"), Some(etc));
    }

    #[test]
    fn resolving_through_a_directory_releases_it_instead_of_pinning_it() {
        let (cache, _dir) = temp_cache();
        let etc = mkdir(&cache, ROOT_INO, "etc");
        mkdir(&cache, etc, "conf.d");
        resolve(&cache, "/etc/conf.d").unwrap();
        // `find_in_dir` is the only thing that touched `etc`'s cache entry
        // during that resolve, and it always pairs its `get` with a
        // `release`; nothing else is holding a reference, so the entry
        // must have been evicted rather than left pinned for the life of
        // the mount.
        assert!(!cache.is_cached(etc));
    }
}
