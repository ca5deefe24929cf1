//! Bounded LRU cache of canonical path -> inode id, with optional TTL.
//! Grounded on the teacher's `InodeCacheSupport` layer concept
//! (`api/src/fs.rs`), a cache sitting in front of path resolution that
//! mutating operations must keep coherent, implemented here with the `lru`
//! crate behind a `parking_lot::Mutex` since the teacher's own cache was an
//! in-process `HashMap` with no concurrency story of its own.
//!
//! The invalidation contract is the one piece of this module that must
//! never be "simplified": removing a hard link must invalidate only that
//! link's path, never sibling paths pointing at the same surviving inode.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

struct Inner {
    entries: LruCache<String, u64>,
    expiry: HashMap<String, Instant>,
    ttl: Option<Duration>,
}

/// Thread-safe path -> inode cache. A no-op instance (`enabled: false` at
/// the facade) can still exist; the facade simply never consults it.
pub struct PathCache {
    inner: Mutex<Inner>,
}

impl PathCache {
    /// Build a cache bounded to `max_entries`, with entries expiring after
    /// `ttl` (or never, if `None`).
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        let cap = std::num::NonZeroUsize::new(max_entries.max(1)).unwrap();
        PathCache {
            inner: Mutex::new(Inner {
                entries: LruCache::new(cap),
                expiry: HashMap::new(),
                ttl,
            }),
        }
    }

    /// Look up a canonical path. Returns `None` on a miss or on an expired
    /// entry (an expired hit is treated identically to a miss: callers
    /// re-resolve and re-insert).
    pub fn get(&self, path: &str) -> Option<u64> {
        let mut inner = self.inner.lock();
        if let Some(deadline) = inner.expiry.get(path).copied() {
            if Instant::now() >= deadline {
                inner.entries.pop(path);
                inner.expiry.remove(path);
                return None;
            }
        }
        inner.entries.get(path).copied()
    }

    /// Record a successful resolution.
    pub fn insert(&self, path: String, ino: u64) {
        let mut inner = self.inner.lock();
        if let Some(ttl) = inner.ttl {
            inner.expiry.insert(path.clone(), Instant::now() + ttl);
        }
        inner.entries.put(path, ino);
    }

    /// Remove the entry for exactly this path. Used by `unlink`: the
    /// hard-link-after-unlink regression guard depends on this touching
    /// nothing else.
    pub fn invalidate_path(&self, path: &str) {
        let mut inner = self.inner.lock();
        inner.entries.pop(path);
        inner.expiry.remove(path);
    }

    /// Remove the entry for `path` and every cached entry whose path has
    /// `path` as a proper prefix (i.e. starts with `path + "/"`). Used by
    /// `rmdir` and the source side of `rename`.
    pub fn invalidate_subtree(&self, path: &str) {
        let mut inner = self.inner.lock();
        let prefix = format!("{path}/");
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .filter(|k| k == path || k.starts_with(&prefix))
            .collect();
        for k in doomed {
            inner.entries.pop(&k);
            inner.expiry.remove(&k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_invalidate_path_leaves_siblings() {
        let cache = PathCache::new(10, None);
        cache.insert("/f".into(), 1);
        cache.insert("/g".into(), 1);
        cache.invalidate_path("/f");
        assert_eq!(cache.get("/f"), None);
        assert_eq!(cache.get("/g"), Some(1));
    }

    #[test]
    fn invalidate_subtree_removes_descendants_only() {
        let cache = PathCache::new(10, None);
        cache.insert("/d".into(), 1);
        cache.insert("/d/x".into(), 2);
        cache.insert("/dd".into(), 3);
        cache.invalidate_subtree("/d");
        assert_eq!(cache.get("/d"), None);
        assert_eq!(cache.get("/d/x"), None);
        assert_eq!(cache.get("/dd"), Some(3));
    }

    #[test]
    fn ttl_expiry_behaves_like_a_miss() {
        let cache = PathCache::new(10, Some(Duration::from_millis(1)));
        cache.insert("/f".into(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("/f"), None);
    }
}
