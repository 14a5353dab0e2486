//! Process-wide stat cache
//!
//! Maps `"stat:" + normalized path` to the last successful [`StatResult`].
//! Unbounded; entries are removed whenever this process removes the path.

use dashmap::DashMap;
use filen_core::domain::{NormalizedPath, StatResult};

const KEY_PREFIX: &str = "stat:";

#[derive(Debug, Default)]
pub struct StatCache {
    entries: DashMap<String, StatResult>,
}

fn key(path: &NormalizedPath) -> String {
    format!("{KEY_PREFIX}{path}")
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<StatResult> {
        self.entries.get(&key(path)).map(|e| *e.value())
    }

    pub fn set(&self, path: &NormalizedPath, stat: StatResult) {
        self.entries.insert(key(path), stat);
    }

    pub fn delete(&self, path: &NormalizedPath) {
        self.entries.remove(&key(path));
    }

    /// Drops `path` and every cached descendant of it
    pub fn delete_tree(&self, path: &NormalizedPath) {
        let exact = key(path);
        let prefix = format!("{}/", exact.trim_end_matches('/'));
        self.entries
            .retain(|k, _| k != &exact && !k.starts_with(&prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(size: u64) -> StatResult {
        StatResult {
            is_directory: false,
            is_symlink: false,
            is_file: true,
            size,
            modified_at_ms: 1,
            created_at_ms: 1,
            inode: 7,
        }
    }

    #[test]
    fn test_set_get_delete() {
        let cache = StatCache::new();
        let p = NormalizedPath::new("/a/b");
        assert!(cache.get(&p).is_none());

        cache.set(&p, stat(3));
        assert_eq!(cache.get(&NormalizedPath::new(r"\a\b")).unwrap().size, 3);

        cache.delete(&p);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_tree_removes_descendants_only() {
        let cache = StatCache::new();
        for p in ["/r/dir", "/r/dir/x", "/r/dir/sub/y", "/r/dirx", "/r/other"] {
            cache.set(&NormalizedPath::new(p), stat(1));
        }

        cache.delete_tree(&NormalizedPath::new("/r/dir"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&NormalizedPath::new("/r/dirx")).is_some());
        assert!(cache.get(&NormalizedPath::new("/r/other")).is_some());
    }
}
