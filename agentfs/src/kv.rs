//! Keyed blob store, sharing the filesystem's database handle and
//! transaction contract per the composition note in SPEC_FULL.md §9
//! ("facade-per-concern... share one database handle"). A simple
//! table-backed collaborator, not part of the POSIX-shaped facade.

use agentfs_types::error::Result;
use agentfs_types::types::Timestamp;

use crate::db::Handle;

/// A keyed blob store backed by the `kv_entries` table.
pub struct KvStore {
    db: Handle,
}

impl KvStore {
    /// Construct a KV store sharing `db`'s connection pool.
    pub fn new(db: Handle) -> Self {
        KvStore { db }
    }

    /// Fetch the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.db.get()?;
        Ok(conn
            .query_row(
                "select value from kv_entries where key = ?1",
                [key],
                |row| row.get(0),
            )
            .ok())
    }

    /// Insert or overwrite the value stored under `key`.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.db.get()?;
        conn.execute(
            "insert or replace into kv_entries (key, value, updated_ns) values (?1, ?2, ?3)",
            rusqlite::params![key, value, Timestamp::now().0],
        )?;
        Ok(())
    }

    /// Remove the value stored under `key`, if any. Not an error if absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        let conn = self.db.get()?;
        conn.execute("delete from kv_entries where key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::open_test_handle;

    #[test]
    fn put_get_delete_round_trip() {
        let kv = KvStore::new(open_test_handle());
        assert_eq!(kv.get("a").unwrap(), None);
        kv.put("a", b"hello").unwrap();
        assert_eq!(kv.get("a").unwrap(), Some(b"hello".to_vec()));
        kv.delete("a").unwrap();
        assert_eq!(kv.get("a").unwrap(), None);
    }
}
