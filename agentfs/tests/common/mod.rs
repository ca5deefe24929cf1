//! Shared scratch-filesystem helper for integration tests, modeled on the
//! teacher's `api/fs-tests/utils.rs` disk-prep pattern but built on
//! `tempfile` rather than manual path bookkeeping.

use agentfs::config::Config;
use agentfs::facade::Filesystem;
use tempfile::TempDir;

/// A filesystem over a fresh scratch database, plus the `TempDir` guarding
/// its lifetime. Keep the guard alive for as long as the filesystem is used.
pub struct Scratch {
    pub fs: Filesystem,
    _dir: TempDir,
}

/// Open a scratch filesystem at the default chunk size, cache disabled.
pub fn scratch() -> Scratch {
    scratch_with_chunk_size(4096)
}

/// Open a scratch filesystem with an explicit chunk size.
pub fn scratch_with_chunk_size(chunk_size: u64) -> Scratch {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("agent.db");
    let config = Config::with_path(path)
        .chunk_size(chunk_size)
        .build()
        .expect("build config");
    let fs = Filesystem::open(&config).expect("open filesystem");
    Scratch { fs, _dir: dir }
}

/// Open a scratch filesystem with the path cache enabled.
pub fn scratch_with_cache() -> Scratch {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("agent.db");
    let config = Config::with_path(path)
        .cache(agentfs::config::CacheConfig {
            enabled: true,
            max_entries: 1000,
            ttl: None,
        })
        .build()
        .expect("build config");
    let fs = Filesystem::open(&config).expect("open filesystem");
    Scratch { fs, _dir: dir }
}
