//! The traits each store implements. Splitting these out (rather than
//! hard-wiring the facade to concrete structs) mirrors the layered
//! `FileSysSupport`/`BlockSupport`/`InodeSupport`/`DirectorySupport` design
//! this crate is grounded on: every layer is a seam a caller, or a test,
//! can substitute, even though in practice there is one SQL-backed
//! implementation of each.
//!
//! Every method takes the transaction it runs in explicitly, rather than
//! owning a connection itself: a store is just a namespace for SQL, and the
//! facade (`agentfs::facade`) is what owns transaction lifetime.

use rusqlite::Transaction;

use crate::error::Result;
use crate::types::{DirEntry, NewInode, SetAttrs, Stat, TimesToTouch};

/// Read/write/truncate operations on a regular file's chunked content.
pub trait ChunkStore {
    /// Read up to `length` bytes starting at `offset`. Reads past EOF
    /// return an empty vec; reads spanning a missing interior chunk return
    /// zeros for that span.
    fn read(&self, txn: &Transaction<'_>, ino: u64, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Splice `data` into the file starting at `offset`, growing `size` and
    /// allocating chunks as needed. Updates `mtime`/`ctime`.
    fn write(&self, txn: &Transaction<'_>, ino: u64, offset: u64, data: &[u8]) -> Result<()>;

    /// Shrink or zero-extend the file to `new_size`, dropping or trimming
    /// chunks past the new boundary. Updates `size`, `mtime`, `ctime`.
    fn truncate(&self, txn: &Transaction<'_>, ino: u64, new_size: u64) -> Result<()>;
}

/// Create/lookup/update/delete operations on inodes.
pub trait InodeStore {
    /// Allocate a new inode row. Returns its id. `nlink` starts at 0.
    fn create(&self, txn: &Transaction<'_>, new: &NewInode) -> Result<u64>;

    /// Fetch full attributes for an inode. `NotFound` if it doesn't exist.
    fn get(&self, txn: &Transaction<'_>, ino: u64) -> Result<Stat>;

    /// Bump the requested timestamps to now.
    fn update_times(&self, txn: &Transaction<'_>, ino: u64, which: TimesToTouch) -> Result<()>;

    /// Apply a partial attribute update (`chmod`/`chown`/`utimens`), always
    /// bumping `ctime`. Returns the resulting attributes.
    fn set_attrs(&self, txn: &Transaction<'_>, ino: u64, attrs: &SetAttrs) -> Result<Stat>;

    /// Increment `nlink`, returning the new value.
    fn increment_nlink(&self, txn: &Transaction<'_>, ino: u64) -> Result<u32>;

    /// Decrement `nlink`, returning the new value. Does not itself delete
    /// the inode when it reaches zero; callers decide that, since some
    /// callers (directory replace during `rename`) need to inspect the
    /// value first.
    fn decrement_nlink(&self, txn: &Transaction<'_>, ino: u64) -> Result<u32>;

    /// Delete the inode row along with its chunks and symlink target, if
    /// any. Callers must only call this once `nlink == 0`.
    fn delete(&self, txn: &Transaction<'_>, ino: u64) -> Result<()>;
}

/// Directory entry lookups and mutations.
pub trait DirectoryStore {
    /// Resolve `name` inside `parent`. `Ok(None)` on a miss, as opposed to
    /// `Err(NotFound)`, since a miss is an expected outcome for callers
    /// doing existence checks before insert.
    fn lookup(&self, txn: &Transaction<'_>, parent: u64, name: &str) -> Result<Option<u64>>;

    /// Create a new entry. `AlreadyExists` if `name` is already present.
    fn insert(&self, txn: &Transaction<'_>, parent: u64, name: &str, child: u64) -> Result<()>;

    /// Remove an entry, returning the child inode id it pointed to.
    /// `NotFound` if absent.
    fn remove(&self, txn: &Transaction<'_>, parent: u64, name: &str) -> Result<u64>;

    /// List all entries of a directory, in name order.
    fn list(&self, txn: &Transaction<'_>, parent: u64) -> Result<Vec<DirEntry>>;

    /// Whether a directory currently has zero entries.
    fn is_empty(&self, txn: &Transaction<'_>, parent: u64) -> Result<bool>;
}
