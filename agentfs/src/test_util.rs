//! Shared scratch-database helpers for unit tests, modeled on the
//! teacher's `api/fs-tests/utils.rs` disk-prep/disk-teardown pattern but
//! using `tempfile` instead of manual path bookkeeping and manual cleanup.

use rusqlite::Connection;
use tempfile::TempDir;

use crate::config::Config;
use crate::db::Handle;
use crate::facade::Filesystem;

/// An open in-memory-ish connection (a real file in a temp dir, since
/// `rusqlite`'s bundled SQLite needs a file for multi-connection WAL
/// semantics) with the schema already migrated, at the default chunk size.
pub fn open_test_db() -> Connection {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let mut conn = Connection::open(path).unwrap();
    conn.pragma_update(None, "foreign_keys", "1").unwrap();
    crate::schema::migrate(&mut conn, 4096).unwrap();
    // Leak the tempdir so the file outlives this function; tests run
    // in-process and the OS reclaims it on process exit.
    std::mem::forget(dir);
    conn
}

/// A pooled handle over a freshly migrated scratch database.
pub fn open_test_handle() -> Handle {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let config = Config::with_path(path).build().unwrap();
    let handle = Handle::open(&config).unwrap();
    std::mem::forget(dir);
    handle
}

/// A fully constructed [`Filesystem`] over a freshly migrated scratch
/// database, default chunk size.
pub fn open_test_filesystem() -> Filesystem {
    open_test_filesystem_with_chunk_size(4096)
}

/// Same as [`open_test_filesystem`], but with an explicit chunk size,
/// used by tests exercising chunk-boundary splicing.
pub fn open_test_filesystem_with_chunk_size(chunk_size: u64) -> Filesystem {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let config = Config::with_path(path).chunk_size(chunk_size).build().unwrap();
    let fs = Filesystem::open(&config).unwrap();
    std::mem::forget(dir);
    fs
}
