//! Shared data types for the virtual filesystem: inode attributes, directory
//! entries, and the handful of small value types passed between the facade
//! and the stores.

use std::time::{SystemTime, UNIX_EPOCH};

/// Inode number of the root directory. Fixed for the lifetime of a database.
pub const ROOT_INO: u64 = 1;

/// Default content chunk size, used only the first time a database is
/// initialized. Once recorded in `fs_config`, the stored value wins.
pub const DEFAULT_CHUNK_SIZE: u64 = 4096;

/// Default mode bits for a freshly created directory (root included).
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Implementation limit on symlink hops per resolution, matching common
/// kernel limits closely enough to be unsurprising.
pub const MAX_SYMLINK_HOPS: u32 = 40;

/// Maximum byte length of a single path component.
pub const MAX_NAME_LEN: usize = 255;

/// The tag of an inode's on-disk kind. Dispatch on this at the facade
/// boundary rather than modeling kinds as separate inode types: every kind
/// shares the same `inodes` row shape, differing only in which columns are
/// meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A regular file with chunked byte content.
    Regular,
    /// A directory holding named entries.
    Directory,
    /// A symbolic link pointing at a target path.
    Symlink,
}

impl Kind {
    /// The integer tag stored in the `inodes.kind` column.
    pub fn as_i64(self) -> i64 {
        match self {
            Kind::Regular => 0,
            Kind::Directory => 1,
            Kind::Symlink => 2,
        }
    }

    /// Inverse of [`Kind::as_i64`]. Panics on an unrecognized tag, since that
    /// can only mean the database was written by incompatible code.
    pub fn from_i64(v: i64) -> Kind {
        match v {
            0 => Kind::Regular,
            1 => Kind::Directory,
            2 => Kind::Symlink,
            other => panic!("inode row has unrecognized kind tag {other}"),
        }
    }
}

/// Nanosecond-precision timestamp, stored as a plain `i64` column. Wrapping
/// it (rather than passing raw `i64`s around) keeps call sites from
/// accidentally mixing up nanoseconds with seconds or milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time, nanoseconds since the Unix epoch.
    pub fn now() -> Timestamp {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(d.as_nanos() as i64)
    }
}

/// Which of an inode's timestamps a mutation should bump. `atime` on read,
/// `mtime` on content change, `ctime` on any metadata change.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimesToTouch {
    /// Bump `atime` to now.
    pub atime: bool,
    /// Bump `mtime` to now.
    pub mtime: bool,
    /// Bump `ctime` to now.
    pub ctime: bool,
}

impl TimesToTouch {
    pub const ATIME: TimesToTouch = TimesToTouch {
        atime: true,
        mtime: false,
        ctime: false,
    };
    pub const CONTENT: TimesToTouch = TimesToTouch {
        atime: false,
        mtime: true,
        ctime: true,
    };
    pub const METADATA: TimesToTouch = TimesToTouch {
        atime: false,
        mtime: false,
        ctime: true,
    };
}

/// Full attribute set of an inode, as returned by `stat`/`lstat`/`fstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Stable inode number, constant for the inode's lifetime.
    pub ino: u64,
    /// Regular file, directory, or symlink.
    pub kind: Kind,
    /// Permission and type bits, `chmod`-style.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Content length in bytes; entry count has no bearing on this for directories.
    pub size: u64,
    /// Hard link count.
    pub nlink: u32,
    /// Last access time.
    pub atime: Timestamp,
    /// Last content modification time.
    pub mtime: Timestamp,
    /// Last metadata change time.
    pub ctime: Timestamp,
    /// Creation time, never updated after creation.
    pub birthtime: Timestamp,
    /// Populated only for `kind == Symlink`.
    pub symlink_target: Option<String>,
}

/// Parameters for allocating a brand new inode. `nlink` always starts at 0;
/// the caller links it into a directory in the same transaction, which is
/// what actually brings `nlink` to 1.
#[derive(Debug, Clone)]
pub struct NewInode {
    /// Regular file, directory, or symlink.
    pub kind: Kind,
    /// Initial permission and type bits.
    pub mode: u32,
    /// Initial owning user id.
    pub uid: u32,
    /// Initial owning group id.
    pub gid: u32,
    /// Required when `kind == Symlink`, ignored otherwise.
    pub symlink_target: Option<String>,
}

/// A subset of attributes to overwrite, as used by `chmod`/`chown`/`utimens`.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SetAttrs {
    /// New permission and type bits, if changing.
    pub mode: Option<u32>,
    /// New owning user id, if changing.
    pub uid: Option<u32>,
    /// New owning group id, if changing.
    pub gid: Option<u32>,
    /// New access time, if changing.
    pub atime: Option<Timestamp>,
    /// New modification time, if changing.
    pub mtime: Option<Timestamp>,
}

/// One named child of a directory, as returned by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The entry's name within its parent directory.
    pub name: String,
    /// The inode this entry points at.
    pub ino: u64,
    /// The kind of the pointed-at inode, cached here to avoid a lookup.
    pub kind: Kind,
}

/// Whether the path resolver should follow a symlink found at the final
/// path component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowSymlinks {
    /// Follow a symlink found at the final path component.
    Yes,
    /// Stop resolution at the symlink itself (used by `lstat`/`unlink`/`readlink`).
    No,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_its_integer_tag() {
        for k in [Kind::Regular, Kind::Directory, Kind::Symlink] {
            assert_eq!(Kind::from_i64(k.as_i64()), k);
        }
    }

    #[test]
    fn timestamps_are_monotonic_enough_for_ordering() {
        let a = Timestamp::now();
        let b = Timestamp(a.0 + 1);
        assert!(b > a);
    }
}
