//! Adapts [`kvfs_core::fs::FileSystem`] to `fuser::Filesystem`.
//!
//! This is the only place in the workspace that knows about `fuser`'s types
//! or about negative POSIX errno codes: every method here does the same
//! three things — call into the core, map a [`kvfs_core::error::FsError`]
//! to `reply.error(err.errno())` on failure, or build a `fuser` reply type
//! from the core's plain data on success.
//!
//! Timestamps are not part of this filesystem's data model (see
//! `SPEC_FULL.md`'s Non-goals), so every reported `atime`/`mtime`/`ctime`
//! is simply the Unix epoch; real filesystems would persist these per
//! inode, but nothing here reads them back for test or correctness
//! purposes.

use std::ffi::OsStr;
use std::os::raw::c_int;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
};
use kvfs_api::types::FType;
use kvfs_core::error::FsError;
use kvfs_core::fs::{Attr, FileSystem};

const TTL: Duration = Duration::from_secs(1);

fn as_file_type(ftype: FType) -> FileType {
    match ftype {
        FType::Reg => FileType::RegularFile,
        FType::Dir => FileType::Directory,
    }
}

fn to_file_attr(attr: &Attr) -> FileAttr {
    let perm = match attr.ftype {
        FType::Dir => 0o755,
        FType::Reg => 0o644,
    };
    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: (attr.size + 511) / 512,
        atime: UNIX_EPOCH,
        mtime: UNIX_EPOCH,
        ctime: UNIX_EPOCH,
        crtime: UNIX_EPOCH,
        kind: as_file_type(attr.ftype),
        perm,
        nlink: attr.nlink as u32,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

fn name_str(name: &OsStr) -> Option<&str> {
    name.to_str()
}

/// The `fuser::Filesystem` adapter around one mounted [`FileSystem`].
pub struct FuseBridge {
    fs: FileSystem,
}

impl FuseBridge {
    /// Wrap an already-mounted filesystem core for serving over FUSE.
    pub fn new(fs: FileSystem) -> FuseBridge {
        FuseBridge { fs }
    }
}

impl Filesystem for FuseBridge {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        Ok(())
    }

    fn destroy(&mut self) {}

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lookup(parent, name) {
            Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        match self.fs.getattr(ino) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(&attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.mknod(parent, name) {
            Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.mkdir(parent, name) {
            Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.unlink(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.rmdir(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(name), Some(newname)) = (name_str(name), name_str(newname)) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.rename(parent, name, newparent, newname) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.open(ino) {
            Ok(handle) => reply.opened(handle, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.fs.read(ino, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.fs.write(ino, offset as u64, data) {
            Ok(n) => reply.written(n),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(ino, size) {
                reply.error(e.errno());
                return;
            }
        }
        match self.fs.getattr(ino) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(&attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.fs.release(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        match self.fs.fsync(ino) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.opendir(ino) {
            Ok(handle) => reply.opened(handle, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.fs.readdir(ino) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        for (i, entry) in entries.into_iter().enumerate().skip(offset as usize) {
            let full = reply.add(
                entry.ino,
                (i + 1) as i64,
                as_file_type(entry.ftype),
                &entry.name,
            );
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        match self.fs.releasedir(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.fs.statfs() {
            Ok(stats) => reply.statfs(
                0,
                0,
                0,
                stats.total_inodes,
                0,
                kvfs_api::types::DIRENTRY_SIZE as u32,
                kvfs_api::types::NAME_MAX as u32,
                0,
            ),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name) = name_str(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        let attr = match self.fs.mknod(parent, name) {
            Ok(attr) => attr,
            Err(FsError::AlreadyExists(_)) => match self.fs.lookup(parent, name) {
                Ok(attr) => attr,
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            },
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        let handle = match self.fs.open(attr.ino) {
            Ok(handle) => handle,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        reply.created(&TTL, &to_file_attr(&attr), 0, handle, 0);
    }
}
