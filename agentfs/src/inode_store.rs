//! Inode lifecycle: creation, lookup, timestamp/attribute maintenance, link
//! counting, and cascade deletion. Grounded on `hugefs`'s `create_inode`/
//! `stat`/`inc_nlink`/`dec_nlink`/`delete_inode` functions, folded here into
//! a `agentfs_types::traits::InodeStore` implementation per the teacher's
//! trait-seam convention (`InodeSupport` in `api/src/fs.rs`).

use rusqlite::{OptionalExtension, Transaction};

use agentfs_types::error::{FsError, Result};
use agentfs_types::traits::InodeStore;
use agentfs_types::types::{Kind, NewInode, SetAttrs, Stat, TimesToTouch, Timestamp};

/// `InodeStore` implementation backed by the `inodes` table.
pub struct SqlInodeStore;

impl InodeStore for SqlInodeStore {
    fn create(&self, txn: &Transaction<'_>, new: &NewInode) -> Result<u64> {
        let now = Timestamp::now().0;
        txn.execute(
            "insert into inodes (kind, mode, uid, gid, size, nlink, atime_ns, mtime_ns, ctime_ns, birthtime_ns, symlink_target)
             values (?1, ?2, ?3, ?4, 0, 0, ?5, ?5, ?5, ?5, ?6)",
            rusqlite::params![
                new.kind.as_i64(),
                new.mode,
                new.uid,
                new.gid,
                now,
                new.symlink_target,
            ],
        )?;
        Ok(txn.last_insert_rowid() as u64)
    }

    fn get(&self, txn: &Transaction<'_>, ino: u64) -> Result<Stat> {
        txn.query_row(
            "select id, kind, mode, uid, gid, size, nlink, atime_ns, mtime_ns, ctime_ns, birthtime_ns, symlink_target
             from inodes where id = ?1",
            [ino as i64],
            row_to_stat,
        )
        .optional()?
        .ok_or(FsError::NotFound)
    }

    fn update_times(&self, txn: &Transaction<'_>, ino: u64, which: TimesToTouch) -> Result<()> {
        let now = Timestamp::now().0;
        if which.atime {
            txn.execute(
                "update inodes set atime_ns = ?1 where id = ?2",
                rusqlite::params![now, ino as i64],
            )?;
        }
        if which.mtime {
            txn.execute(
                "update inodes set mtime_ns = ?1 where id = ?2",
                rusqlite::params![now, ino as i64],
            )?;
        }
        if which.ctime {
            txn.execute(
                "update inodes set ctime_ns = ?1 where id = ?2",
                rusqlite::params![now, ino as i64],
            )?;
        }
        Ok(())
    }

    fn set_attrs(&self, txn: &Transaction<'_>, ino: u64, attrs: &SetAttrs) -> Result<Stat> {
        let mut st = self.get(txn, ino)?;
        if let Some(mode) = attrs.mode {
            st.mode = mode;
        }
        if let Some(uid) = attrs.uid {
            st.uid = uid;
        }
        if let Some(gid) = attrs.gid {
            st.gid = gid;
        }
        if let Some(atime) = attrs.atime {
            st.atime = atime;
        }
        if let Some(mtime) = attrs.mtime {
            st.mtime = mtime;
        }
        st.ctime = Timestamp::now();

        txn.execute(
            "update inodes set mode = ?1, uid = ?2, gid = ?3, atime_ns = ?4, mtime_ns = ?5, ctime_ns = ?6 where id = ?7",
            rusqlite::params![st.mode, st.uid, st.gid, st.atime.0, st.mtime.0, st.ctime.0, ino as i64],
        )?;
        Ok(st)
    }

    fn increment_nlink(&self, txn: &Transaction<'_>, ino: u64) -> Result<u32> {
        txn.execute(
            "update inodes set nlink = nlink + 1 where id = ?1",
            [ino as i64],
        )?;
        read_nlink(txn, ino)
    }

    fn decrement_nlink(&self, txn: &Transaction<'_>, ino: u64) -> Result<u32> {
        txn.execute(
            "update inodes set nlink = nlink - 1 where id = ?1 and nlink > 0",
            [ino as i64],
        )?;
        read_nlink(txn, ino)
    }

    fn delete(&self, txn: &Transaction<'_>, ino: u64) -> Result<()> {
        txn.execute("delete from chunks where inode_id = ?1", [ino as i64])?;
        txn.execute("delete from inodes where id = ?1", [ino as i64])?;
        Ok(())
    }
}

fn read_nlink(txn: &Transaction<'_>, ino: u64) -> Result<u32> {
    Ok(txn.query_row(
        "select nlink from inodes where id = ?1",
        [ino as i64],
        |row| row.get(0),
    )?)
}

fn row_to_stat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stat> {
    Ok(Stat {
        ino: row.get::<_, i64>(0)? as u64,
        kind: Kind::from_i64(row.get(1)?),
        mode: row.get(2)?,
        uid: row.get(3)?,
        gid: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
        nlink: row.get(6)?,
        atime: Timestamp(row.get(7)?),
        mtime: Timestamp(row.get(8)?),
        ctime: Timestamp(row.get(9)?),
        birthtime: Timestamp(row.get(10)?),
        symlink_target: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::open_test_db;

    #[test]
    fn create_then_get_round_trips_attrs() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let store = SqlInodeStore;
        let ino = store
            .create(
                &txn,
                &NewInode {
                    kind: Kind::Regular,
                    mode: 0o644,
                    uid: 42,
                    gid: 7,
                    symlink_target: None,
                },
            )
            .unwrap();
        let st = store.get(&txn, ino).unwrap();
        assert_eq!(st.mode, 0o644);
        assert_eq!(st.uid, 42);
        assert_eq!(st.nlink, 0);
    }

    #[test]
    fn nlink_reaching_zero_allows_delete() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let store = SqlInodeStore;
        let ino = store
            .create(
                &txn,
                &NewInode {
                    kind: Kind::Regular,
                    mode: 0o644,
                    uid: 0,
                    gid: 0,
                    symlink_target: None,
                },
            )
            .unwrap();
        store.increment_nlink(&txn, ino).unwrap();
        let remaining = store.decrement_nlink(&txn, ino).unwrap();
        assert_eq!(remaining, 0);
        store.delete(&txn, ino).unwrap();
        assert!(matches!(store.get(&txn, ino), Err(FsError::NotFound)));
    }

    #[test]
    fn get_missing_inode_is_not_found() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let store = SqlInodeStore;
        assert!(matches!(store.get(&txn, 999), Err(FsError::NotFound)));
    }
}
