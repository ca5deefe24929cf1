//! A virtual, POSIX-like filesystem for AI agents, persisted in a single
//! SQLite database file with write-ahead logging.
//!
//! [`facade::Filesystem`] is the main entry point: open one with
//! [`config::Config`], then call its `create`/`open`/`read`/`write`/`stat`/
//! `link`/`unlink`/`rename`/`mkdir`/`rmdir`/`symlink`/`readlink`/`readdir`/
//! `chmod`/`chown`/`utimens` methods. [`kv::KvStore`] and
//! [`toolcalls::ToolCallLog`] are simple collaborators sharing the same
//! database handle, obtained via [`facade::Filesystem::db_handle`].

#![deny(missing_docs)]

/// Read/write/truncate of chunked regular-file content.
pub mod chunk_store;
/// Database location, chunking, caching, pool, and `atime` configuration.
pub mod config;
/// Connection pool setup and schema migration on open.
pub mod db;
/// Directory entry lookups and mutations.
pub mod directory_store;
/// The public POSIX-shaped filesystem operations.
pub mod facade;
/// Inode creation, lookup, attribute, and link-count maintenance.
pub mod inode_store;
/// Keyed blob store sharing the filesystem's database handle.
pub mod kv;
/// Bounded LRU path -> inode cache with invalidation contract.
pub mod path_cache;
/// Absolute path canonicalization and resolution.
pub mod path_resolver;
/// Table definitions and idempotent migrations.
pub mod schema;
/// Append-only tool-call log sharing the filesystem's database handle.
pub mod toolcalls;

#[cfg(test)]
mod test_util;
