//! Directory entries: `(parent_id, name) -> child_id` rows. Grounded on
//! `hugefs`'s `get_dir_entry`/`link_file`/`unlink_file` helpers, folded into
//! a `agentfs_types::traits::DirectoryStore` implementation. `rename` is not
//! part of this trait: its cross-directory, cross-inode semantics are
//! composed in `facade.rs` out of `lookup`/`insert`/`remove` plus
//! `inode_store`'s link counting, mirroring how `hugefs::Filesystem::rename`
//! composes `lookup`/`link_file`/`unlink_file` rather than having its own
//! primitive.

use rusqlite::{OptionalExtension, Transaction};

use agentfs_types::error::{FsError, Result};
use agentfs_types::traits::DirectoryStore;
use agentfs_types::types::{DirEntry, Kind};

/// `DirectoryStore` implementation backed by the `dirents` table.
pub struct SqlDirectoryStore;

impl DirectoryStore for SqlDirectoryStore {
    fn lookup(&self, txn: &Transaction<'_>, parent: u64, name: &str) -> Result<Option<u64>> {
        Ok(txn
            .query_row(
                "select child_id from dirents where parent_id = ?1 and name = ?2",
                rusqlite::params![parent as i64, name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .map(|id| id as u64))
    }

    fn insert(&self, txn: &Transaction<'_>, parent: u64, name: &str, child: u64) -> Result<()> {
        if self.lookup(txn, parent, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        txn.execute(
            "insert into dirents (parent_id, name, child_id) values (?1, ?2, ?3)",
            rusqlite::params![parent as i64, name, child as i64],
        )?;
        Ok(())
    }

    fn remove(&self, txn: &Transaction<'_>, parent: u64, name: &str) -> Result<u64> {
        let child = self.lookup(txn, parent, name)?.ok_or(FsError::NotFound)?;
        txn.execute(
            "delete from dirents where parent_id = ?1 and name = ?2",
            rusqlite::params![parent as i64, name],
        )?;
        Ok(child)
    }

    fn list(&self, txn: &Transaction<'_>, parent: u64) -> Result<Vec<DirEntry>> {
        let mut stmt = txn.prepare_cached(
            "select d.name, d.child_id, i.kind from dirents d join inodes i on i.id = d.child_id
             where d.parent_id = ?1 order by d.name",
        )?;
        let rows = stmt.query_map([parent as i64], |row| {
            Ok(DirEntry {
                name: row.get(0)?,
                ino: row.get::<_, i64>(1)? as u64,
                kind: Kind::from_i64(row.get(2)?),
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn is_empty(&self, txn: &Transaction<'_>, parent: u64) -> Result<bool> {
        let count: i64 = txn.query_row(
            "select count(*) from dirents where parent_id = ?1",
            [parent as i64],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }
}

/// Validate a single path component per the data model's naming invariant:
/// not empty, not `.`/`..`, and no embedded `/`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::Invalid("directory entry name is empty, `.`/`..`, or contains `/`"));
    }
    if name.len() > agentfs_types::types::MAX_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}
