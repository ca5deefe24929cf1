//! Chunked content storage: a regular file's bytes are split across fixed
//! size rows keyed by `(inode_id, idx)`. Grounded on the teacher's
//! `Buffer`/`Block` read-modify-write pattern (`api/src/types.rs`), adapted
//! from a memory-mapped region to SQL rows fetched and re-inserted whole.

use rusqlite::{OptionalExtension, Transaction};

use agentfs_types::error::Result;
use agentfs_types::traits::InodeStore;
use agentfs_types::types::Timestamp;

use crate::inode_store::SqlInodeStore;

/// Chunk store backed by the `chunks` table. Stateless beyond the fixed
/// `chunk_size` negotiated at database initialization.
pub struct SqlChunkStore {
    chunk_size: u64,
}

impl SqlChunkStore {
    /// Construct a chunk store operating with the given chunk size (read
    /// back from `fs_config` at filesystem open, never per-call).
    pub fn new(chunk_size: u64) -> Self {
        SqlChunkStore { chunk_size }
    }

    fn chunk_index(&self, offset: u64) -> u64 {
        offset / self.chunk_size
    }

    fn chunk_offset(&self, offset: u64) -> usize {
        (offset % self.chunk_size) as usize
    }

    fn fetch_chunk(&self, txn: &Transaction<'_>, ino: u64, idx: u64) -> Result<Option<Vec<u8>>> {
        Ok(txn
            .query_row(
                "select data from chunks where inode_id = ?1 and idx = ?2",
                rusqlite::params![ino as i64, idx as i64],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn put_chunk(&self, txn: &Transaction<'_>, ino: u64, idx: u64, data: &[u8]) -> Result<()> {
        txn.execute(
            "insert or replace into chunks (inode_id, idx, data) values (?1, ?2, ?3)",
            rusqlite::params![ino as i64, idx as i64, data],
        )?;
        Ok(())
    }

    /// Read up to `length` bytes of `ino`'s content starting at `offset`.
    /// Never reads past the inode's recorded `size`; missing interior
    /// chunks within range read back as zeros.
    pub fn read(&self, txn: &Transaction<'_>, ino: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        let size = SqlInodeStore.get(txn, ino)?.size;
        if offset >= size {
            return Ok(Vec::new());
        }
        let end = (offset + length).min(size);
        let mut out = Vec::with_capacity((end - offset) as usize);

        let mut pos = offset;
        while pos < end {
            let idx = self.chunk_index(pos);
            let within = self.chunk_offset(pos);
            let chunk = self.fetch_chunk(txn, ino, idx)?;
            let take = ((self.chunk_size as usize) - within).min((end - pos) as usize);
            match chunk {
                Some(bytes) => {
                    for i in within..within + take {
                        out.push(*bytes.get(i).unwrap_or(&0));
                    }
                }
                None => out.extend(std::iter::repeat(0u8).take(take)),
            }
            pos += take as u64;
        }
        Ok(out)
    }

    /// Splice `data` into `ino`'s content starting at `offset`, growing
    /// `size` to `max(size, offset + data.len())` and updating `mtime`/
    /// `ctime`. Each affected chunk is read, spliced in memory, and written
    /// back whole.
    pub fn write(&self, txn: &Transaction<'_>, ino: u64, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut pos = offset;
        let mut src = 0usize;
        while src < data.len() {
            let idx = self.chunk_index(pos);
            let within = self.chunk_offset(pos);
            let take = ((self.chunk_size as usize) - within).min(data.len() - src);

            let mut buf = self
                .fetch_chunk(txn, ino, idx)?
                .unwrap_or_else(|| vec![0u8; self.chunk_size as usize]);
            if buf.len() < within + take {
                buf.resize(within + take, 0);
            }
            buf[within..within + take].copy_from_slice(&data[src..src + take]);
            self.put_chunk(txn, ino, idx, &buf)?;

            pos += take as u64;
            src += take;
        }

        let new_size = offset + data.len() as u64;
        let current = SqlInodeStore.get(txn, ino)?.size;
        let size = current.max(new_size);
        txn.execute(
            "update inodes set size = ?1, mtime_ns = ?2, ctime_ns = ?3 where id = ?4",
            rusqlite::params![size as i64, Timestamp::now().0, Timestamp::now().0, ino as i64],
        )?;
        Ok(())
    }

    /// Shrink or zero-extend `ino` to `new_size`. Chunks entirely past the
    /// new last chunk index are dropped; the new last chunk (if partial) is
    /// truncated or zero-padded in place.
    pub fn truncate(&self, txn: &Transaction<'_>, ino: u64, new_size: u64) -> Result<()> {
        let last_idx = if new_size == 0 {
            None
        } else {
            Some((new_size - 1) / self.chunk_size)
        };

        match last_idx {
            Some(idx) => {
                txn.execute(
                    "delete from chunks where inode_id = ?1 and idx > ?2",
                    rusqlite::params![ino as i64, idx as i64],
                )?;
                let within = ((new_size - 1) % self.chunk_size) as usize + 1;
                if let Some(mut buf) = self.fetch_chunk(txn, ino, idx)? {
                    if buf.len() != within {
                        buf.resize(within, 0);
                        self.put_chunk(txn, ino, idx, &buf)?;
                    }
                }
            }
            None => {
                txn.execute("delete from chunks where inode_id = ?1", [ino as i64])?;
            }
        }

        txn.execute(
            "update inodes set size = ?1, mtime_ns = ?2, ctime_ns = ?3 where id = ?4",
            rusqlite::params![new_size as i64, Timestamp::now().0, Timestamp::now().0, ino as i64],
        )?;
        Ok(())
    }

    /// Delete every chunk belonging to `ino`. Called when an inode's
    /// `nlink` reaches zero.
    pub fn delete_all(&self, txn: &Transaction<'_>, ino: u64) -> Result<()> {
        txn.execute("delete from chunks where inode_id = ?1", [ino as i64])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::open_test_db;
    use agentfs_types::types::{Kind, NewInode};

    fn make_inode(txn: &Transaction<'_>) -> u64 {
        SqlInodeStore
            .create(
                txn,
                &NewInode {
                    kind: Kind::Regular,
                    mode: 0o644,
                    uid: 0,
                    gid: 0,
                    symlink_target: None,
                },
            )
            .unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let ino = make_inode(&txn);
        let store = SqlChunkStore::new(8);

        store.write(&txn, ino, 0, b"aaaaaaaaaaaaaaaa").unwrap();
        store.write(&txn, ino, 4, b"XXXX").unwrap();
        let data = store.read(&txn, ino, 0, 16).unwrap();
        assert_eq!(&data, b"aaaaXXXXaaaaaaaa");

        let rows: i64 = txn
            .query_row(
                "select count(*) from chunks where inode_id = ?1",
                [ino as i64],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn read_past_size_is_empty() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let ino = make_inode(&txn);
        let store = SqlChunkStore::new(8);
        store.write(&txn, ino, 0, b"abc").unwrap();
        let data = store.read(&txn, ino, 3, 100).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn truncate_drops_trailing_chunks_and_pads_last() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let ino = make_inode(&txn);
        let store = SqlChunkStore::new(8);
        store.write(&txn, ino, 0, b"aaaaaaaaaaaaaaaa").unwrap();
        store.truncate(&txn, ino, 5).unwrap();
        let data = store.read(&txn, ino, 0, 5).unwrap();
        assert_eq!(&data, b"aaaaa");
        let rows: i64 = txn
            .query_row(
                "select count(*) from chunks where inode_id = ?1",
                [ino as i64],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }
}
