//! The public POSIX-shaped filesystem facade: one public method per
//! operation, each following the same five-step contract (open a
//! transaction, resolve paths, read/write the stores, commit and only then
//! invalidate the path cache, or roll back and leave the cache untouched).
//! Grounded on `hugefs`'s `Filesystem` (`create_file`/`remove_file`/
//! `rename`/`link`/`readlink`/`read_directory`), generalized to the full
//! POSIX-shaped operation list and the cache-invalidation contract this
//! crate adds.
//!
//! Every operation takes a `cancel: Option<&CancellationToken>`. Passing
//! `None` runs the call to completion as normal; passing a token lets a
//! caller request cancellation from another thread, checked once just
//! before commit. A cancellation observed before commit rolls the
//! transaction back; once `commit()` has returned, the token is no longer
//! consulted and the effects stand.

use rusqlite::Transaction;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use agentfs_types::error::{FsError, Result};
use agentfs_types::traits::{DirectoryStore, InodeStore};
use agentfs_types::types::{
    DirEntry, FollowSymlinks, Kind, NewInode, SetAttrs, Stat, TimesToTouch, Timestamp, ROOT_INO,
};

use crate::chunk_store::SqlChunkStore;
use crate::config::{AtimePolicy, Config};
use crate::db::Handle;
use crate::directory_store::{validate_name, SqlDirectoryStore};
use crate::inode_store::SqlInodeStore;
use crate::path_cache::PathCache;
use crate::path_resolver::{resolve, split_parent};

/// A resolved reference to an open inode, returned by [`Filesystem::open`].
/// Cheap to copy; does not itself hold a connection or lock anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(u64);

enum CacheOp {
    Path(String),
    Subtree(String),
}

/// The virtual filesystem. One instance owns one database handle, one path
/// cache, and the chunk size negotiated at first initialization.
pub struct Filesystem {
    db: Handle,
    cache: Option<PathCache>,
    chunk_store: SqlChunkStore,
    atime_policy: AtimePolicy,
}

impl Filesystem {
    /// Open (initializing if needed) a filesystem per `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Handle::open(config)?;
        let chunk_size = {
            let conn = db.get()?;
            crate::schema::chunk_size(&conn)?
        };
        let cache = if config.cache().enabled {
            Some(PathCache::new(config.cache().max_entries, config.cache().ttl))
        } else {
            None
        };
        Ok(Filesystem {
            db,
            cache,
            chunk_store: SqlChunkStore::new(chunk_size),
            atime_policy: config.atime_policy(),
        })
    }

    /// Clone the underlying database handle, for constructing a
    /// [`crate::kv::KvStore`] or [`crate::toolcalls::ToolCallLog`] sharing
    /// this filesystem's connection pool.
    pub fn db_handle(&self) -> Handle {
        self.db.clone()
    }

    fn check_cancel(cancel: Option<&CancellationToken>) -> Result<()> {
        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            return Err(FsError::Cancelled);
        }
        Ok(())
    }

    fn transact<T>(
        &self,
        cancel: Option<&CancellationToken>,
        f: impl FnOnce(&Transaction<'_>) -> Result<(T, Vec<CacheOp>)>,
    ) -> Result<T> {
        let mut conn = self.db.get()?;
        let txn = conn.transaction()?;
        let (value, ops) = f(&txn)?;
        Self::check_cancel(cancel)?;
        txn.commit()?;
        if let Some(cache) = &self.cache {
            for op in ops {
                match op {
                    CacheOp::Path(p) => cache.invalidate_path(&p),
                    CacheOp::Subtree(p) => cache.invalidate_subtree(&p),
                }
            }
        }
        Ok(value)
    }

    fn resolve_in(&self, txn: &Transaction<'_>, path: &str, follow: FollowSymlinks) -> Result<u64> {
        resolve(txn, self.cache.as_ref(), path, follow)
    }

    /// Create a new regular file at `path`. Fails `already_exists` if an
    /// entry is already there.
    #[instrument(skip(self, cancel))]
    pub fn create(
        &self,
        path: &str,
        mode: u32,
        uid: u32,
        gid: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        self.create_with_kind(path, Kind::Regular, mode, uid, gid, None, cancel)
    }

    /// Create a new directory at `path`.
    pub fn mkdir(
        &self,
        path: &str,
        mode: u32,
        uid: u32,
        gid: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        self.create_with_kind(path, Kind::Directory, mode, uid, gid, None, cancel)
    }

    /// Create a symlink at `path` pointing at `target`. `target` is stored
    /// verbatim and is not validated for existence.
    pub fn symlink(
        &self,
        target: &str,
        path: &str,
        uid: u32,
        gid: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        self.create_with_kind(path, Kind::Symlink, 0o777, uid, gid, Some(target.to_string()), cancel)
    }

    fn create_with_kind(
        &self,
        path: &str,
        kind: Kind,
        mode: u32,
        uid: u32,
        gid: u32,
        symlink_target: Option<String>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        let (parent_path, name) = split_parent(path)?;
        validate_name(&name)?;
        self.transact(cancel, |txn| {
            let parent = self.resolve_in(txn, &parent_path, FollowSymlinks::Yes)?;
            if SqlInodeStore.get(txn, parent)?.kind != Kind::Directory {
                return Err(FsError::NotADirectory);
            }
            let new_ino = SqlInodeStore.create(
                txn,
                &NewInode { kind, mode, uid, gid, symlink_target: symlink_target.clone() },
            )?;
            SqlDirectoryStore.insert(txn, parent, &name, new_ino)?;
            if kind == Kind::Directory {
                // A directory's own nlink is `2 + child subdirectory count`:
                // one for the parent's entry, one for its own `.`. The
                // parent picks up one more for this directory's `..`.
                SqlInodeStore.increment_nlink(txn, new_ino)?;
                SqlInodeStore.increment_nlink(txn, new_ino)?;
                SqlInodeStore.increment_nlink(txn, parent)?;
            } else {
                SqlInodeStore.increment_nlink(txn, new_ino)?;
            }
            SqlInodeStore.update_times(txn, parent, TimesToTouch::CONTENT)?;
            let stat = SqlInodeStore.get(txn, new_ino)?;
            debug!(ino = new_ino, %path, "created");
            Ok((stat, vec![]))
        })
    }

    /// Resolve `path` (following symlinks) and return a handle usable with
    /// [`Filesystem::read`], [`Filesystem::write`], [`Filesystem::truncate`],
    /// and [`Filesystem::fstat`].
    pub fn open(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<FileHandle> {
        let mut conn = self.db.get()?;
        let txn = conn.transaction()?;
        let ino = self.resolve_in(&txn, path, FollowSymlinks::Yes)?;
        Self::check_cancel(cancel)?;
        txn.commit()?;
        Ok(FileHandle(ino))
    }

    /// Read up to `length` bytes of `handle`'s content starting at `offset`.
    /// Bumps `atime` first if the configured policy calls for it.
    pub fn read(
        &self,
        handle: FileHandle,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>> {
        self.transact(cancel, |txn| {
            if self.atime_policy == AtimePolicy::Always {
                SqlInodeStore.update_times(txn, handle.0, TimesToTouch::ATIME)?;
            }
            let data = self.chunk_store.read(txn, handle.0, offset, length)?;
            Ok((data, vec![]))
        })
    }

    /// Splice `data` into `handle`'s content starting at `offset`.
    pub fn write(
        &self,
        handle: FileHandle,
        offset: u64,
        data: &[u8],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.transact(cancel, |txn| {
            self.chunk_store.write(txn, handle.0, offset, data)?;
            Ok(((), vec![]))
        })
    }

    /// Resize `handle`'s content to `new_size`.
    pub fn truncate(
        &self,
        handle: FileHandle,
        new_size: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.transact(cancel, |txn| {
            self.chunk_store.truncate(txn, handle.0, new_size)?;
            Ok(((), vec![]))
        })
    }

    /// Attributes of the inode an already-open handle refers to.
    pub fn fstat(&self, handle: FileHandle, cancel: Option<&CancellationToken>) -> Result<Stat> {
        Self::check_cancel(cancel)?;
        let conn = self.db.get()?;
        let txn_conn = conn.unchecked_transaction()?;
        SqlInodeStore.get(&txn_conn, handle.0)
    }

    /// Attributes of the inode `path` resolves to, following a trailing
    /// symlink.
    pub fn stat(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<Stat> {
        Self::check_cancel(cancel)?;
        let conn = self.db.get()?;
        let txn = conn.unchecked_transaction()?;
        let ino = self.resolve_in(&txn, path, FollowSymlinks::Yes)?;
        SqlInodeStore.get(&txn, ino)
    }

    /// Attributes of the inode `path` names, without following a trailing
    /// symlink.
    pub fn lstat(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<Stat> {
        Self::check_cancel(cancel)?;
        let conn = self.db.get()?;
        let txn = conn.unchecked_transaction()?;
        let ino = self.resolve_in(&txn, path, FollowSymlinks::No)?;
        SqlInodeStore.get(&txn, ino)
    }

    /// List the entries of the directory at `path`. Bumps the directory's
    /// `atime` first if the configured policy calls for it.
    pub fn readdir(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<Vec<DirEntry>> {
        self.transact(cancel, |txn| {
            let ino = self.resolve_in(txn, path, FollowSymlinks::Yes)?;
            if SqlInodeStore.get(txn, ino)?.kind != Kind::Directory {
                return Err(FsError::NotADirectory);
            }
            if self.atime_policy == AtimePolicy::Always {
                SqlInodeStore.update_times(txn, ino, TimesToTouch::ATIME)?;
            }
            let entries = SqlDirectoryStore.list(txn, ino)?;
            Ok((entries, vec![]))
        })
    }

    /// The target of the symlink at `path`.
    pub fn readlink(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<String> {
        Self::check_cancel(cancel)?;
        let conn = self.db.get()?;
        let txn = conn.unchecked_transaction()?;
        let ino = self.resolve_in(&txn, path, FollowSymlinks::No)?;
        let st = SqlInodeStore.get(&txn, ino)?;
        if st.kind != Kind::Symlink {
            return Err(FsError::Invalid("path does not name a symlink"));
        }
        st.symlink_target.ok_or(FsError::Invalid("symlink inode missing its target"))
    }

    /// Add a new directory entry `dst` referring to the same inode as
    /// `src`. Fails on directories (no directory hard links).
    pub fn link(&self, src: &str, dst: &str, cancel: Option<&CancellationToken>) -> Result<()> {
        let (dst_parent_path, dst_name) = split_parent(dst)?;
        validate_name(&dst_name)?;
        self.transact(cancel, |txn| {
            let ino = self.resolve_in(txn, src, FollowSymlinks::No)?;
            if SqlInodeStore.get(txn, ino)?.kind == Kind::Directory {
                return Err(FsError::Invalid("cannot hard link a directory"));
            }
            let dst_parent = self.resolve_in(txn, &dst_parent_path, FollowSymlinks::Yes)?;
            SqlDirectoryStore.insert(txn, dst_parent, &dst_name, ino)?;
            SqlInodeStore.increment_nlink(txn, ino)?;
            SqlInodeStore.update_times(txn, dst_parent, TimesToTouch::CONTENT)?;
            Ok(((), vec![CacheOp::Path(dst.to_string())]))
        })
    }

    /// Remove the directory entry at `path`. Cascade-deletes the inode (and
    /// its chunks/symlink target) once `nlink` reaches zero.
    pub fn unlink(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<()> {
        let (parent_path, name) = split_parent(path)?;
        self.transact(cancel, |txn| {
            let parent = self.resolve_in(txn, &parent_path, FollowSymlinks::Yes)?;
            let ino = SqlDirectoryStore.lookup(txn, parent, &name)?.ok_or(FsError::NotFound)?;
            if SqlInodeStore.get(txn, ino)?.kind == Kind::Directory {
                return Err(FsError::IsADirectory);
            }
            SqlDirectoryStore.remove(txn, parent, &name)?;
            let remaining = SqlInodeStore.decrement_nlink(txn, ino)?;
            if remaining == 0 {
                self.chunk_store.delete_all(txn, ino)?;
                SqlInodeStore.delete(txn, ino)?;
            }
            SqlInodeStore.update_times(txn, parent, TimesToTouch::CONTENT)?;
            Ok(((), vec![CacheOp::Path(path.to_string())]))
        })
    }

    /// Remove the empty directory at `path`. Fails `not_empty` if it has
    /// entries.
    pub fn rmdir(&self, path: &str, cancel: Option<&CancellationToken>) -> Result<()> {
        let (parent_path, name) = split_parent(path)?;
        self.transact(cancel, |txn| {
            let parent = self.resolve_in(txn, &parent_path, FollowSymlinks::Yes)?;
            let ino = SqlDirectoryStore.lookup(txn, parent, &name)?.ok_or(FsError::NotFound)?;
            if SqlInodeStore.get(txn, ino)?.kind != Kind::Directory {
                return Err(FsError::NotADirectory);
            }
            if !SqlDirectoryStore.is_empty(txn, ino)? {
                return Err(FsError::NotEmpty);
            }
            SqlDirectoryStore.remove(txn, parent, &name)?;
            SqlInodeStore.decrement_nlink(txn, ino)?;
            SqlInodeStore.delete(txn, ino)?;
            SqlInodeStore.decrement_nlink(txn, parent)?;
            SqlInodeStore.update_times(txn, parent, TimesToTouch::CONTENT)?;
            Ok(((), vec![CacheOp::Subtree(path.to_string())]))
        })
    }

    /// Move the entry at `src` to `dst`. See the directory store's `rename`
    /// semantics for replace/`not_empty`/`invalid`/no-op edge cases.
    pub fn rename(&self, src: &str, dst: &str, cancel: Option<&CancellationToken>) -> Result<()> {
        let (src_parent_path, src_name) = split_parent(src)?;
        let (dst_parent_path, dst_name) = split_parent(dst)?;
        validate_name(&dst_name)?;
        self.transact(cancel, |txn| {
            let src_parent = self.resolve_in(txn, &src_parent_path, FollowSymlinks::Yes)?;
            let dst_parent = self.resolve_in(txn, &dst_parent_path, FollowSymlinks::Yes)?;
            let src_ino = SqlDirectoryStore.lookup(txn, src_parent, &src_name)?.ok_or(FsError::NotFound)?;

            if src_parent == dst_parent && src_name == dst_name {
                return Ok(((), vec![]));
            }

            let src_is_dir = SqlInodeStore.get(txn, src_ino)?.kind == Kind::Directory;
            if src_is_dir && is_within_subtree(txn, dst_parent, src_ino)? {
                return Err(FsError::Invalid("cannot move a directory inside itself"));
            }

            let existing_dst = SqlDirectoryStore.lookup(txn, dst_parent, &dst_name)?;
            if let Some(dst_ino) = existing_dst {
                let dst_stat = SqlInodeStore.get(txn, dst_ino)?;
                SqlDirectoryStore.remove(txn, dst_parent, &dst_name)?;
                if dst_stat.kind == Kind::Directory {
                    if !SqlDirectoryStore.is_empty(txn, dst_ino)? {
                        return Err(FsError::NotEmpty);
                    }
                    // A directory has exactly one parent entry; losing it
                    // always empties it out, same as `rmdir`.
                    SqlInodeStore.decrement_nlink(txn, dst_ino)?;
                    SqlInodeStore.delete(txn, dst_ino)?;
                    SqlInodeStore.decrement_nlink(txn, dst_parent)?;
                } else {
                    let remaining = SqlInodeStore.decrement_nlink(txn, dst_ino)?;
                    if remaining == 0 {
                        self.chunk_store.delete_all(txn, dst_ino)?;
                        SqlInodeStore.delete(txn, dst_ino)?;
                    }
                }
            }

            SqlDirectoryStore.remove(txn, src_parent, &src_name)?;
            SqlDirectoryStore.insert(txn, dst_parent, &dst_name, src_ino)?;
            if src_is_dir {
                SqlInodeStore.decrement_nlink(txn, src_parent)?;
                SqlInodeStore.increment_nlink(txn, dst_parent)?;
            }
            SqlInodeStore.update_times(txn, src_parent, TimesToTouch::CONTENT)?;
            SqlInodeStore.update_times(txn, dst_parent, TimesToTouch::CONTENT)?;

            Ok(((), vec![CacheOp::Subtree(src.to_string()), CacheOp::Subtree(dst.to_string())]))
        })
    }

    /// Change `path`'s permission bits.
    pub fn chmod(&self, path: &str, mode: u32, cancel: Option<&CancellationToken>) -> Result<Stat> {
        self.set_attrs(path, SetAttrs { mode: Some(mode), ..Default::default() }, cancel)
    }

    /// Change `path`'s owning user/group.
    pub fn chown(
        &self,
        path: &str,
        uid: u32,
        gid: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        self.set_attrs(path, SetAttrs { uid: Some(uid), gid: Some(gid), ..Default::default() }, cancel)
    }

    /// Set `path`'s `atime`/`mtime` explicitly.
    pub fn utimens(
        &self,
        path: &str,
        atime: Option<Timestamp>,
        mtime: Option<Timestamp>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        self.set_attrs(path, SetAttrs { atime, mtime, ..Default::default() }, cancel)
    }

    fn set_attrs(
        &self,
        path: &str,
        attrs: SetAttrs,
        cancel: Option<&CancellationToken>,
    ) -> Result<Stat> {
        self.transact(cancel, |txn| {
            let ino = self.resolve_in(txn, path, FollowSymlinks::Yes)?;
            let stat = SqlInodeStore.set_attrs(txn, ino, &attrs)?;
            Ok((stat, vec![]))
        })
    }
}

/// Whether `candidate` is `root` or a descendant of `root` in the directory
/// tree. Used by `rename` to reject moving a directory into its own
/// subtree.
fn is_within_subtree(txn: &Transaction<'_>, mut candidate: u64, root: u64) -> Result<bool> {
    loop {
        if candidate == root {
            return Ok(true);
        }
        if candidate == ROOT_INO {
            return Ok(false);
        }
        candidate = parent_of(txn, candidate)?;
    }
}

fn parent_of(txn: &Transaction<'_>, ino: u64) -> Result<u64> {
    Ok(txn.query_row(
        "select parent_id from dirents where child_id = ?1 limit 1",
        [ino as i64],
        |row| row.get::<_, i64>(0),
    )? as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::open_test_filesystem;

    #[test]
    fn create_write_read_stat_round_trip() {
        let fs = open_test_filesystem();
        fs.create("/hello.txt", 0o644, 0, 0, None).unwrap();
        let handle = fs.open("/hello.txt", None).unwrap();
        fs.write(handle, 0, b"test data", None).unwrap();
        let data = fs.read(handle, 0, 9, None).unwrap();
        assert_eq!(&data, b"test data");
        let st = fs.stat("/hello.txt", None).unwrap();
        assert_eq!(st.size, 9);
        assert_eq!(st.nlink, 1);
    }

    #[test]
    fn hard_link_after_unlink_survives() {
        let fs = open_test_filesystem();
        fs.create("/f", 0o644, 0, 0, None).unwrap();
        fs.link("/f", "/g", None).unwrap();
        let ino_before = fs.stat("/f", None).unwrap().ino;
        fs.unlink("/f", None).unwrap();
        let st = fs.stat("/g", None).unwrap();
        assert_eq!(st.ino, ino_before);
        assert_eq!(st.nlink, 1);
        assert!(fs.stat("/f", None).is_err());
    }

    #[test]
    fn inode_stable_across_link() {
        let fs = open_test_filesystem();
        fs.create("/f", 0o644, 0, 0, None).unwrap();
        let i0 = fs.stat("/f", None).unwrap().ino;
        fs.link("/f", "/g", None).unwrap();
        assert_eq!(fs.stat("/f", None).unwrap().ino, i0);
        assert_eq!(fs.stat("/g", None).unwrap().ino, i0);
        assert_eq!(fs.lstat("/f", None).unwrap().ino, i0);
        let handle = fs.open("/f", None).unwrap();
        assert_eq!(fs.fstat(handle, None).unwrap().ino, i0);
    }

    #[test]
    fn rmdir_non_empty_then_empty() {
        let fs = open_test_filesystem();
        fs.mkdir("/d", 0o755, 0, 0, None).unwrap();
        fs.mkdir("/d/sub", 0o755, 0, 0, None).unwrap();
        assert!(matches!(fs.rmdir("/d", None), Err(FsError::NotEmpty)));
        fs.rmdir("/d/sub", None).unwrap();
        fs.rmdir("/d", None).unwrap();
        assert!(fs.stat("/d", None).is_err());
    }

    #[test]
    fn chunked_write_splices_across_boundaries() {
        let fs = open_test_filesystem_with_chunk_size(8);
        fs.create("/f", 0o644, 0, 0, None).unwrap();
        let handle = fs.open("/f", None).unwrap();
        fs.write(handle, 0, &[b'a'; 16], None).unwrap();
        fs.write(handle, 4, b"XXXX", None).unwrap();
        let data = fs.read(handle, 0, 16, None).unwrap();
        assert_eq!(&data, b"aaaaXXXXaaaaaaaa");
    }

    #[test]
    fn symlink_readlink_and_cycle() {
        let fs = open_test_filesystem();
        fs.symlink("/target", "/link", 0, 0, None).unwrap();
        assert_eq!(fs.readlink("/link", None).unwrap(), "/target");
        assert!(matches!(fs.stat("/link", None), Err(FsError::NotFound)));
        assert_eq!(fs.lstat("/link", None).unwrap().kind, Kind::Symlink);

        fs.symlink("/a", "/a", 0, 0, None).unwrap();
        assert!(matches!(fs.stat("/a", None), Err(FsError::TooManySymlinks)));
    }

    #[test]
    fn rename_invalidates_subtree() {
        let fs = open_test_filesystem();
        fs.mkdir("/a", 0o755, 0, 0, None).unwrap();
        fs.create("/a/x", 0o644, 0, 0, None).unwrap();
        let ino = fs.stat("/a/x", None).unwrap().ino;
        fs.rename("/a", "/b", None).unwrap();
        assert!(fs.stat("/a/x", None).is_err());
        assert_eq!(fs.stat("/b/x", None).unwrap().ino, ino);
    }

    #[test]
    fn cancelled_before_commit_rolls_back() {
        let fs = open_test_filesystem();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            fs.create("/f", 0o644, 0, 0, Some(&token)),
            Err(FsError::Cancelled)
        ));
        assert!(fs.stat("/f", None).is_err());
    }

    fn open_test_filesystem_with_chunk_size(chunk_size: u64) -> Filesystem {
        crate::test_util::open_test_filesystem_with_chunk_size(chunk_size)
    }
}
