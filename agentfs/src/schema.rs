//! Declarative schema and idempotent migrations, run once per opened
//! database. Grounded on `hugefs`'s `Filesystem::open`, which runs a static
//! `include_str!("fs_schema.sql")` batch and then creates the root row if
//! absent, except here the migration list is a numbered, idempotent step
//! sequence rather than a single batch, so a later schema change (e.g. a
//! new column) can be appended without touching existing steps.

use rusqlite::Connection;
use tracing::debug;

use agentfs_types::error::Result;
use agentfs_types::types::{Kind, Timestamp, DEFAULT_CHUNK_SIZE, DEFAULT_DIR_MODE, ROOT_INO};

const CREATE_TABLES: &str = "
create table if not exists inodes (
  id integer primary key,
  kind integer not null,
  mode integer not null,
  uid integer not null,
  gid integer not null,
  size integer not null default 0,
  nlink integer not null default 0,
  atime_ns integer not null,
  mtime_ns integer not null,
  ctime_ns integer not null,
  birthtime_ns integer not null,
  symlink_target text
);
create table if not exists dirents (
  parent_id integer not null references inodes(id),
  name text not null,
  child_id integer not null references inodes(id),
  primary key (parent_id, name)
);
create table if not exists chunks (
  inode_id integer not null references inodes(id) on delete cascade,
  idx integer not null,
  data blob not null,
  primary key (inode_id, idx)
);
create table if not exists fs_config (
  key text primary key,
  value text not null
);
create table if not exists kv_entries (
  key text primary key,
  value blob not null,
  updated_ns integer not null
);
create table if not exists tool_calls (
  id integer primary key autoincrement,
  ts_ns integer not null,
  tool_name text not null,
  request text not null,
  response text,
  status text not null
);
";

/// Run every migration step against a freshly opened connection, then
/// ensure the root inode and `chunk_size` config row exist. Safe to call on
/// every open: every step is a no-op on a database that already has it.
pub fn migrate(conn: &mut Connection, default_chunk_size: u64) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;

    let txn = conn.transaction()?;
    ensure_chunk_size(&txn, default_chunk_size)?;
    ensure_root_inode(&txn)?;
    txn.commit()?;

    debug!("schema migrated");
    Ok(())
}

fn ensure_chunk_size(txn: &rusqlite::Transaction<'_>, default_chunk_size: u64) -> Result<()> {
    let existing: Option<String> = txn
        .query_row(
            "select value from fs_config where key = 'chunk_size'",
            [],
            |row| row.get(0),
        )
        .ok();
    if existing.is_none() {
        let chunk_size = if default_chunk_size > 0 {
            default_chunk_size
        } else {
            DEFAULT_CHUNK_SIZE
        };
        txn.execute(
            "insert into fs_config (key, value) values ('chunk_size', ?1)",
            [chunk_size.to_string()],
        )?;
    }
    Ok(())
}

/// Read back the chunk size recorded at first initialization. Callers
/// should never write this column directly; it is fixed for the life of
/// the database.
pub fn chunk_size(conn: &Connection) -> Result<u64> {
    let value: String = conn.query_row(
        "select value from fs_config where key = 'chunk_size'",
        [],
        |row| row.get(0),
    )?;
    Ok(value.parse().unwrap_or(DEFAULT_CHUNK_SIZE))
}

fn ensure_root_inode(txn: &rusqlite::Transaction<'_>) -> Result<()> {
    let exists: Option<i64> = txn
        .query_row("select id from inodes where id = ?1", [ROOT_INO as i64], |row| row.get(0))
        .ok();
    if exists.is_none() {
        let now = Timestamp::now().0;
        txn.execute(
            "insert into inodes (id, kind, mode, uid, gid, size, nlink, atime_ns, mtime_ns, ctime_ns, birthtime_ns, symlink_target)
             values (?1, ?2, ?3, 0, 0, 0, 2, ?4, ?4, ?4, ?4, null)",
            rusqlite::params![ROOT_INO as i64, Kind::Directory.as_i64(), DEFAULT_DIR_MODE, now],
        )?;
    }
    Ok(())
}
