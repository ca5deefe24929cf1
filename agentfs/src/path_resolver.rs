//! Absolute path resolution: canonicalization, cache consultation, and
//! segment-by-segment directory walking with symlink expansion and loop
//! detection. Grounded on the teacher's `PathSupport::resolve_path`
//! contract (`api/src/fs.rs`), reworked from an in-memory inode table walk
//! to one driven by `directory_store`/`inode_store` SQL lookups.

use std::collections::VecDeque;

use rusqlite::Transaction;

use agentfs_types::error::{FsError, Result};
use agentfs_types::traits::{DirectoryStore, InodeStore};
use agentfs_types::types::{FollowSymlinks, Kind, MAX_NAME_LEN, MAX_SYMLINK_HOPS, ROOT_INO};

use crate::directory_store::SqlDirectoryStore;
use crate::inode_store::SqlInodeStore;
use crate::path_cache::PathCache;

/// Collapse `.`/`..`/empty segments out of an absolute path string. Purely
/// syntactic, does not consult the directory store, so it has no opinion
/// on symlinks. Used both to build the cache key and as the initial
/// segment list the walker consumes.
fn canonicalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Resolve an absolute path to an inode id, consulting `cache` first (if
/// present) and inserting into it on a fresh successful resolution.
pub fn resolve(
    txn: &Transaction<'_>,
    cache: Option<&PathCache>,
    path: &str,
    follow: FollowSymlinks,
) -> Result<u64> {
    if path.is_empty() {
        return Err(FsError::Invalid("path must not be empty"));
    }
    if !path.starts_with('/') {
        return Err(FsError::Invalid("path must be absolute"));
    }

    let trailing_slash_requires_dir = path.len() > 1 && path.ends_with('/');
    let canonical = canonicalize(path);

    if let Some(cache) = cache {
        if let Some(ino) = cache.get(&canonical) {
            if SqlInodeStore.get(txn, ino).is_ok() {
                return Ok(ino);
            }
            cache.invalidate_path(&canonical);
        }
    }

    let ino = walk(txn, &canonical, follow, trailing_slash_requires_dir)?;

    if let Some(cache) = cache {
        cache.insert(canonical, ino);
    }
    Ok(ino)
}

fn walk(
    txn: &Transaction<'_>,
    canonical: &str,
    follow: FollowSymlinks,
    trailing_slash_requires_dir: bool,
) -> Result<u64> {
    let dirs = SqlDirectoryStore;
    let inodes = SqlInodeStore;

    let mut remaining: VecDeque<String> = canonical
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    let mut stack: Vec<u64> = vec![ROOT_INO];
    let mut hops = 0u32;

    while let Some(seg) = remaining.pop_front() {
        if seg == ".." {
            if stack.len() > 1 {
                stack.pop();
            }
            continue;
        }
        if seg == "." {
            continue;
        }
        if seg.len() > MAX_NAME_LEN {
            return Err(FsError::NameTooLong);
        }

        let cur = *stack.last().unwrap();
        if inodes.get(txn, cur)?.kind != Kind::Directory {
            return Err(FsError::NotADirectory);
        }

        let child = dirs.lookup(txn, cur, &seg)?.ok_or(FsError::NotFound)?;
        let child_stat = inodes.get(txn, child)?;
        let is_final = remaining.is_empty();

        if child_stat.kind == Kind::Symlink && (!is_final || follow == FollowSymlinks::Yes) {
            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return Err(FsError::TooManySymlinks);
            }
            let target = child_stat.symlink_target.unwrap_or_default();
            if target.starts_with('/') {
                stack = vec![ROOT_INO];
            }
            for piece in target.split('/').rev().filter(|s| !s.is_empty()) {
                remaining.push_front(piece.to_owned());
            }
            continue;
        }

        if is_final {
            if trailing_slash_requires_dir && child_stat.kind != Kind::Directory {
                return Err(FsError::NotADirectory);
            }
            return Ok(child);
        }

        if child_stat.kind != Kind::Directory {
            return Err(FsError::NotADirectory);
        }
        stack.push(child);
    }

    Ok(*stack.last().unwrap())
}

/// Split an absolute path into its parent directory's canonical path and
/// its final component name. `/` itself has no parent and is rejected with
/// `invalid`: callers needing the parent of a creation target should
/// never be asked to create `/`.
pub fn split_parent(path: &str) -> Result<(String, String)> {
    let canonical = canonicalize(path);
    if canonical == "/" {
        return Err(FsError::Invalid("path has no parent"));
    }
    let idx = canonical.rfind('/').unwrap();
    let parent = if idx == 0 { "/".to_string() } else { canonical[..idx].to_string() };
    let name = canonical[idx + 1..].to_string();
    Ok((parent, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory_store::SqlDirectoryStore as Dirs;
    use crate::inode_store::SqlInodeStore as Inodes;
    use crate::test_util::open_test_db;
    use agentfs_types::types::NewInode;

    #[test]
    fn resolves_root() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let ino = resolve(&txn, None, "/", FollowSymlinks::Yes).unwrap();
        assert_eq!(ino, ROOT_INO);
    }

    #[test]
    fn resolves_nested_file() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let dirs = Dirs;
        let inodes = Inodes;
        let dir = inodes
            .create(&txn, &NewInode { kind: Kind::Directory, mode: 0o755, uid: 0, gid: 0, symlink_target: None })
            .unwrap();
        dirs.insert(&txn, ROOT_INO, "d", dir).unwrap();
        let file = inodes
            .create(&txn, &NewInode { kind: Kind::Regular, mode: 0o644, uid: 0, gid: 0, symlink_target: None })
            .unwrap();
        dirs.insert(&txn, dir, "f", file).unwrap();

        let resolved = resolve(&txn, None, "/d/f", FollowSymlinks::Yes).unwrap();
        assert_eq!(resolved, file);

        let resolved_dotdot = resolve(&txn, None, "/d/../d/f", FollowSymlinks::Yes).unwrap();
        assert_eq!(resolved_dotdot, file);
    }

    #[test]
    fn self_symlink_is_too_many_symlinks() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let inodes = Inodes;
        let dirs = Dirs;
        let link = inodes
            .create(
                &txn,
                &NewInode {
                    kind: Kind::Symlink,
                    mode: 0o777,
                    uid: 0,
                    gid: 0,
                    symlink_target: Some("/a".to_string()),
                },
            )
            .unwrap();
        dirs.insert(&txn, ROOT_INO, "a", link).unwrap();

        let err = resolve(&txn, None, "/a", FollowSymlinks::Yes).unwrap_err();
        assert!(matches!(err, FsError::TooManySymlinks));
    }

    #[test]
    fn intermediate_non_directory_fails() {
        let mut conn = open_test_db();
        let txn = conn.transaction().unwrap();
        let inodes = Inodes;
        let dirs = Dirs;
        let file = inodes
            .create(&txn, &NewInode { kind: Kind::Regular, mode: 0o644, uid: 0, gid: 0, symlink_target: None })
            .unwrap();
        dirs.insert(&txn, ROOT_INO, "f", file).unwrap();
        let err = resolve(&txn, None, "/f/x", FollowSymlinks::Yes).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory));
    }

    #[test]
    fn split_parent_splits_final_component() {
        let (parent, name) = split_parent("/a/b/c").unwrap();
        assert_eq!(parent, "/a/b");
        assert_eq!(name, "c");
        let (parent, name) = split_parent("/f").unwrap();
        assert_eq!(parent, "/");
        assert_eq!(name, "f");
        assert!(split_parent("/").is_err());
    }
}
