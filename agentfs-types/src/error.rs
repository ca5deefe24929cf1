//! The error taxonomy shared across every layer of the filesystem.
//!
//! Each variant names a POSIX error condition rather than an implementation
//! detail, so callers can match on "what went wrong" without caring whether
//! the failure originated in the path resolver, a store, or the database
//! itself. See [`FsError::classify_sqlite`] for how raw `rusqlite` failures
//! get folded into this taxonomy at call sites that need to distinguish,
//! e.g., a uniqueness violation from a generic I/O failure.

use thiserror::Error;

/// Error type returned by every operation in this crate.
#[derive(Error, Debug)]
pub enum FsError {
    /// No inode exists at the resolved path.
    #[error("no such file or directory")]
    NotFound,

    /// An entry already occupies the target name.
    #[error("file exists")]
    AlreadyExists,

    /// A path component that must be a directory (e.g. an intermediate
    /// component) is not one.
    #[error("not a directory")]
    NotADirectory,

    /// An operation that requires a non-directory was given one.
    #[error("is a directory")]
    IsADirectory,

    /// `rmdir` or `rename` targeted a directory with entries still in it.
    #[error("directory not empty")]
    NotEmpty,

    /// A caller-supplied argument failed validation; the payload names which.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// Symlink resolution exceeded [`crate::types::MAX_SYMLINK_HOPS`].
    #[error("too many levels of symbolic links")]
    TooManySymlinks,

    /// A path component exceeded [`crate::types::MAX_NAME_LEN`].
    #[error("name too long")]
    NameTooLong,

    /// The database reported it is out of space.
    #[error("no space left on device")]
    NoSpace,

    /// The database is locked by a concurrent writer; retry later.
    #[error("resource busy")]
    Busy,

    /// The operation's cancellation token fired before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The requested operation has no meaning for this filesystem.
    #[error("operation not supported")]
    Unsupported,

    /// An I/O failure outside the database itself, e.g. creating the parent
    /// directory of the database file.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// A `rusqlite` failure that didn't classify into a more specific
    /// variant via [`FsError::classify_sqlite`].
    #[error("database error")]
    Database(rusqlite::Error),

    /// Failure acquiring a connection from the pool.
    #[error("connection pool error")]
    Pool(#[from] r2d2::Error),

    /// Escape hatch for errors that don't need to be matched on by kind.
    /// Mirrors the teacher's catch-all `APIError::Other`; avoid growing new
    /// call sites that return this when a concrete variant would do.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FsError {
    /// Fold a raw SQLite failure into the taxonomy where the SQLite error
    /// code maps cleanly onto one of our kinds. Returns `None` when the
    /// caller is in a better position to classify the failure itself (e.g.
    /// a uniqueness violation on `dirents` means `already_exists`, but one
    /// on `fs_config` would mean something else entirely).
    pub fn classify_sqlite(err: &rusqlite::Error) -> Option<FsError> {
        if let rusqlite::Error::SqliteFailure(e, _) = err {
            return match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    Some(FsError::Busy)
                }
                rusqlite::ErrorCode::DiskFull => Some(FsError::NoSpace),
                _ => None,
            };
        }
        None
    }
}

/// Every `?` site that bubbles up a raw `rusqlite::Error` goes through here,
/// so `busy`/`no_space` classification in [`FsError::classify_sqlite`]
/// applies uniformly instead of requiring each call site to remember to
/// invoke it.
impl From<rusqlite::Error> for FsError {
    fn from(err: rusqlite::Error) -> Self {
        FsError::classify_sqlite(&err).unwrap_or(FsError::Database(err))
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, FsError>;
