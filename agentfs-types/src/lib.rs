//! Shared types, error taxonomy, and store traits for the virtual
//! filesystem. This crate has no behavior of its own; `agentfs` is the
//! single implementation of the traits defined here.

#![deny(missing_docs)]

/// The error taxonomy every operation returns.
pub mod error;

/// Store trait seams (`ChunkStore`, `InodeStore`, `DirectoryStore`).
pub mod traits;

/// Inode attributes, directory entries, and small value types.
pub mod types;
