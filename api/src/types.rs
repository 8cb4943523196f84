//! On-store data types and their binary encodings.
//!
//! This module fixes the exact byte layout of everything that crosses the
//! KV-store boundary. `SuperBlockD` goes through [`bincode`] because its
//! layout (a single `u64`) is not externally constrained. `DentryD` is
//! encoded and decoded by hand instead: its 64-byte size is a hard
//! requirement (see [`DIRENTRY_SIZE`]), and leaving that to a derived
//! `Serialize` impl would tie the on-store format to `bincode`'s incidental
//! choices for enum discriminants and array padding.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Maximum number of bytes (excluding the terminating NUL) in a directory
/// entry name. One dentry occupies exactly `NAME_MAX + 1 + 8 + 1` = 64 bytes.
pub const NAME_MAX: usize = 54;

/// Largest regular-file size this filesystem will ever hold, in bytes.
pub const MAX_FILE_SIZE: u64 = 4096;

/// Inode number of the filesystem root. Always present once `mount`
/// succeeds, carrying an empty directory.
pub const ROOT_INO: u64 = 1;

/// KV key under which the super block is stored.
pub const SUPER_KEY: &str = "0";

/// Number of allocations the allocator lets happen before it forces a
/// super block write. See `new_dentry`'s allocation discipline in
/// `kvfs-core`.
pub const FILE_COUNTER_THRESHOLD: u64 = 1024;

/// Size of one encoded [`DentryD`], in bytes.
pub const DIRENTRY_SIZE: usize = 64;

/// File type tag stored both in a [`DentryD`] and logically associated with
/// an inode. No "free" variant exists: a freed inode is simply absent from
/// the store, rather than tombstoned in place, because the store (not an
/// on-disk free list) is this design's source of truth for existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FType {
    /// Regular file.
    Reg,
    /// Directory.
    Dir,
}

impl FType {
    fn to_byte(self) -> u8 {
        match self {
            FType::Reg => 0,
            FType::Dir => 1,
        }
    }

    fn from_byte(b: u8) -> Result<FType> {
        match b {
            0 => Ok(FType::Reg),
            1 => Ok(FType::Dir),
            _ => Err(StoreError::Malformed("unrecognized dentry file type byte")),
        }
    }
}

/// Disk representation of the super block: just the highest inode number
/// ever allocated. Serialized with `bincode` as a little-endian `u64`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlockD {
    /// Highest inode number allocated so far. Monotonically increasing for
    /// the lifetime of the store.
    pub cur_ino: u64,
}

impl SuperBlockD {
    /// Encode this super block to its on-store byte representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a super block from its on-store byte representation.
    pub fn decode(bytes: &[u8]) -> Result<SuperBlockD> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A single 64-byte directory entry, as it is laid out inside a directory
/// inode's data region.
///
/// ```text
/// offset 0  : u64   ino
/// offset 8  : u8    ftype (0 = reg, 1 = dir)
/// offset 9  : u8[55] name (NUL-padded, last byte always NUL)
/// total     : 64 bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DentryD {
    /// Inode number this entry points to.
    pub ino: u64,
    /// File type of the referenced inode.
    pub ftype: FType,
    /// Entry name, NUL-padded, truncated to [`NAME_MAX`] bytes at creation.
    name: [u8; NAME_MAX + 1],
}

impl DentryD {
    /// Build a dentry, silently truncating `name` to [`NAME_MAX`] bytes per
    /// the path resolver's name-length policy.
    pub fn new(ino: u64, ftype: FType, name: &str) -> DentryD {
        let mut buf = [0u8; NAME_MAX + 1];
        let bytes = name.as_bytes();
        let n = bytes.len().min(NAME_MAX);
        buf[..n].copy_from_slice(&bytes[..n]);
        DentryD {
            ino,
            ftype,
            name: buf,
        }
    }

    /// The entry's name, with trailing NUL padding stripped.
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Encode this dentry to its fixed 64-byte on-store representation.
    pub fn encode(&self) -> [u8; DIRENTRY_SIZE] {
        let mut out = [0u8; DIRENTRY_SIZE];
        out[0..8].copy_from_slice(&self.ino.to_le_bytes());
        out[8] = self.ftype.to_byte();
        out[9..9 + NAME_MAX + 1].copy_from_slice(&self.name);
        out
    }

    /// Decode a dentry from a 64-byte slice. Errors if `bytes` is not
    /// exactly [`DIRENTRY_SIZE`] bytes long.
    pub fn decode(bytes: &[u8]) -> Result<DentryD> {
        if bytes.len() != DIRENTRY_SIZE {
            return Err(StoreError::Malformed("dentry payload is not 64 bytes"));
        }
        let mut ino_bytes = [0u8; 8];
        ino_bytes.copy_from_slice(&bytes[0..8]);
        let ino = u64::from_le_bytes(ino_bytes);
        let ftype = FType::from_byte(bytes[8])?;
        let mut name = [0u8; NAME_MAX + 1];
        name.copy_from_slice(&bytes[9..9 + NAME_MAX + 1]);
        Ok(DentryD { ino, ftype, name })
    }
}

/// The trailing, fixed-size attribute footer carried at the tail of every
/// inode payload (see `kvfs-core::buffer` for how it is spliced in before a
/// write-back). An inode's buffer is otherwise just bytes; `ftype` is what
/// lets `getattr(ino)` answer "file or directory" without having to consult
/// the parent's dentry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrFooter {
    /// Number of hard links to this inode. Always 1 in this design, since
    /// hard links are a Non-goal, but persisted so the footer's presence is
    /// meaningful rather than vestigial.
    pub nlink: u16,
    /// File type of the inode this footer belongs to, encoded the same way
    /// a [`DentryD`]'s is.
    ftype: u8,
}

impl Default for AttrFooter {
    fn default() -> AttrFooter {
        AttrFooter {
            nlink: 1,
            ftype: FType::Reg.to_byte(),
        }
    }
}

lazy_static::lazy_static! {
    /// Size of an encoded [`AttrFooter`], in bytes. Computed once since it
    /// depends on `bincode`'s (stable, but not contractual) encoding of a
    /// fixed-width struct.
    pub static ref ATTR_FOOTER_SIZE: usize =
        bincode::serialize(&AttrFooter::default()).unwrap().len();
}

impl AttrFooter {
    /// Build a footer for a freshly created inode of the given type, with a
    /// link count of 1.
    pub fn new(ftype: FType) -> AttrFooter {
        AttrFooter {
            nlink: 1,
            ftype: ftype.to_byte(),
        }
    }

    /// This footer's file type.
    pub fn ftype(&self) -> Result<FType> {
        FType::from_byte(self.ftype)
    }

    /// Encode this footer to its on-store byte representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a footer from its on-store byte representation.
    pub fn decode(bytes: &[u8]) -> Result<AttrFooter> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dentry_round_trips() {
        let d = DentryD::new(42, FType::Dir, "etc");
        let bytes = d.encode();
        assert_eq!(bytes.len(), DIRENTRY_SIZE);
        let back = DentryD::decode(&bytes).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.name(), "etc");
    }

    #[test]
    fn dentry_name_truncates_at_name_max() {
        let long = "a".repeat(NAME_MAX + 20);
        let d = DentryD::new(1, FType::Reg, &long);
        assert_eq!(d.name(), "a".repeat(NAME_MAX));
    }

    #[test]
    fn dentry_name_at_exactly_name_max_round_trips() {
        let exact = "b".repeat(NAME_MAX);
        let d = DentryD::new(1, FType::Reg, &exact);
        assert_eq!(d.name(), exact);
    }

    #[test]
    fn dentry_decode_rejects_wrong_length() {
        assert!(DentryD::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn super_block_round_trips() {
        let sb = SuperBlockD { cur_ino: 7 };
        let bytes = sb.encode().unwrap();
        assert_eq!(SuperBlockD::decode(&bytes).unwrap(), sb);
    }

    #[test]
    fn attr_footer_round_trips() {
        let a = AttrFooter::new(FType::Dir);
        let bytes = a.encode().unwrap();
        let back = AttrFooter::decode(&bytes).unwrap();
        assert_eq!(back, a);
        assert_eq!(back.ftype().unwrap(), FType::Dir);
        assert_eq!(bytes.len(), *ATTR_FOOTER_SIZE);
    }
}
