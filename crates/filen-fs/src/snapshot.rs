//! Directory tree snapshots
//!
//! [`DirectoryTreeSnapshotter::snapshot`] walks a sync location, filters
//! every entry through the [`PathPolicy`], stats the survivors concurrently
//! and returns the resulting [`DirectoryTree`]. A rebuild only happens when
//! the location's "local data changed" flag is set (or absent), when no
//! previous tree exists, or when the caller forces it.
//!
//! ## Persistence order
//!
//! The new tree is written before the change flag is cleared. If either
//! write fails the flag stays set, so the next pass rebuilds.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use filen_core::domain::{
    DirectoryTree, Issue, IssueSeverity, LocationId, NormalizedPath, StatResult, SyncLocation,
    TreeEntry, TRASH_DIR_NAME,
};
use filen_core::ports::{keys, IIssueSink, IKeyValueStore, KeyValueStoreExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, trace};

use crate::ops::FsOps;
use crate::path_policy::PathPolicy;
use crate::FsError;

/// Result of [`DirectoryTreeSnapshotter::snapshot`]
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// False when the previous tree was returned without walking
    pub changed: bool,
    pub tree: Arc<DirectoryTree>,
}

/// Stat outcome of one walked entry: relative path, name, status
type Stated = Option<(String, String, StatResult)>;

pub struct DirectoryTreeSnapshotter {
    ops: FsOps,
    policy: Arc<PathPolicy>,
    store: Arc<dyn IKeyValueStore>,
    issues: Arc<dyn IIssueSink>,
    max_concurrent_stats: usize,
    exclude_dot_default: bool,
    trees: DashMap<LocationId, Arc<DirectoryTree>>,
}

impl DirectoryTreeSnapshotter {
    pub fn new(
        ops: FsOps,
        policy: Arc<PathPolicy>,
        store: Arc<dyn IKeyValueStore>,
        issues: Arc<dyn IIssueSink>,
        max_concurrent_stats: usize,
        exclude_dot_default: bool,
    ) -> Self {
        Self {
            ops,
            policy,
            store,
            issues,
            max_concurrent_stats: max_concurrent_stats.max(1),
            exclude_dot_default,
            trees: DashMap::new(),
        }
    }

    /// Returns the location's tree, rebuilding it when needed
    ///
    /// # Errors
    /// Fails when the root cannot be listed or the store cannot be written.
    /// Per-entry stat failures go to the issue sink and only omit the entry.
    #[instrument(skip(self, location), fields(root = %root, location = %location.uuid))]
    pub async fn snapshot(
        &self,
        root: &NormalizedPath,
        location: &SyncLocation,
        force_rebuild: bool,
    ) -> Result<Snapshot, FsError> {
        let changed_key = keys::local_data_changed(&location.uuid);
        let data_changed = self
            .store
            .get_json::<bool>(&changed_key)
            .await?
            .unwrap_or(true);

        if !data_changed && !force_rebuild {
            if let Some(tree) = self.cached_tree(&location.uuid).await? {
                debug!("Local data unchanged, reusing previous tree");
                return Ok(Snapshot {
                    changed: false,
                    tree,
                });
            }
        }

        let exclude_dot = self.exclude_dot().await?;
        let tree = Arc::new(self.build_tree(root, exclude_dot).await?);

        self.store
            .set_json(&keys::local_tree(&location.uuid), tree.as_ref())
            .await?;
        self.trees.insert(location.uuid, Arc::clone(&tree));
        self.store.set_json(&changed_key, &false).await?;

        Ok(Snapshot {
            changed: true,
            tree,
        })
    }

    /// In-memory tree first, then the persisted one
    async fn cached_tree(&self, location: &LocationId) -> Result<Option<Arc<DirectoryTree>>, FsError> {
        if let Some(tree) = self.trees.get(location) {
            return Ok(Some(Arc::clone(tree.value())));
        }
        let persisted = self
            .store
            .get_json::<DirectoryTree>(&keys::local_tree(location))
            .await?;
        Ok(persisted.map(|tree| {
            let tree = Arc::new(tree);
            self.trees.insert(*location, Arc::clone(&tree));
            tree
        }))
    }

    /// The user's dot-file preference, or the configured default
    pub async fn exclude_dot(&self) -> Result<bool, FsError> {
        Ok(self
            .store
            .get_json::<bool>(keys::EXCLUDE_DOT)
            .await?
            .unwrap_or(self.exclude_dot_default))
    }

    /// Drops the in-memory tree of a location
    pub fn forget(&self, location: &LocationId) {
        self.trees.remove(location);
    }

    async fn build_tree(
        &self,
        root: &NormalizedPath,
        exclude_dot: bool,
    ) -> Result<DirectoryTree, FsError> {
        let started = Instant::now();
        let reserved = self.policy.platform().reserved_dir_name();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_stats));
        let mut stats: JoinSet<Stated> = JoinSet::new();
        let mut pending = vec![root.clone()];
        let mut excluded = 0usize;

        while let Some(dir) = pending.pop() {
            let entries = match self.ops.list_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == *root => return Err(e),
                Err(e) => {
                    self.issues.report_issue(Issue::local(
                        IssueSeverity::Warning,
                        dir,
                        &e,
                        "Could not read local directory",
                    ));
                    continue;
                }
            };

            for entry in entries {
                if entry.name == TRASH_DIR_NAME || Some(entry.name.as_str()) == reserved {
                    continue;
                }

                let relative = entry.path.relative_to(root)?;
                if let Some(reason) =
                    self.policy
                        .exclusion_reason(entry.path.as_str(), &relative, exclude_dot)
                {
                    trace!(path = %relative, %reason, "Excluded");
                    excluded += 1;
                    continue;
                }
                if entry.is_symlink {
                    continue;
                }
                if entry.is_dir {
                    pending.push(entry.path.clone());
                }

                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|e| FsError::Task(e.to_string()))?;
                let ops = self.ops.clone();
                let issues = Arc::clone(&self.issues);
                stats.spawn(async move {
                    let _permit = permit;
                    match ops.stat(&entry.path).await {
                        Ok(stat) => Some((relative, entry.name, stat)),
                        Err(e) => {
                            issues.report_issue(Issue::local(
                                IssueSeverity::Warning,
                                entry.path,
                                &e,
                                "Could not stat local entry",
                            ));
                            None
                        }
                    }
                });
            }
        }

        let mut tree = DirectoryTree::new();
        while let Some(joined) = stats.join_next().await {
            let Some((relative, name, stat)) = joined.map_err(|e| FsError::Task(e.to_string()))?
            else {
                continue;
            };
            if stat.is_symlink {
                continue;
            }

            if stat.is_directory {
                tree.insert_folder(
                    relative,
                    TreeEntry {
                        name,
                        size: 0,
                        last_modified: stat.modified_at_ms,
                        inode: stat.inode,
                    },
                )?;
            } else if stat.is_file && stat.size > 0 {
                tree.insert_file(
                    relative,
                    TreeEntry {
                        name,
                        size: stat.size,
                        last_modified: stat.modified_at_ms,
                        inode: stat.inode,
                    },
                )?;
            }
        }

        info!(
            files = tree.files.len(),
            folders = tree.folders.len(),
            excluded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Local tree built"
        );
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::busy::{BusyDetector, BusyPolicy};
    use crate::issues::CollectingIssueSink;
    use crate::retry::RetryPolicy;
    use crate::stat_cache::StatCache;
    use filen_cache::MemoryKeyValueStore;
    use filen_core::config::IgnoreConfig;
    use filen_core::domain::{EntryKind, Platform};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Memory store whose tree writes always fail
    #[derive(Default)]
    struct TreeWriteFails {
        inner: MemoryKeyValueStore,
    }

    #[async_trait]
    impl IKeyValueStore for TreeWriteFails {
        async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
            if key.starts_with("localTree:") {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.inner.delete(key).await
        }
    }

    struct Fixture {
        dir: TempDir,
        root: NormalizedPath,
        location: SyncLocation,
        store: Arc<MemoryKeyValueStore>,
        issues: Arc<CollectingIssueSink>,
        snapshotter: DirectoryTreeSnapshotter,
    }

    fn snapshotter(
        store: Arc<dyn IKeyValueStore>,
        issues: Arc<dyn IIssueSink>,
    ) -> DirectoryTreeSnapshotter {
        let ops = FsOps::new(
            Arc::new(StatCache::new()),
            RetryPolicy {
                max_retries: 2,
                delay: Duration::from_millis(1),
            },
            Arc::new(BusyDetector::os(BusyPolicy {
                attempts: 1,
                interval: Duration::from_millis(1),
            })),
        );
        let policy = Arc::new(PathPolicy::new(&IgnoreConfig::default(), Platform::current()));
        DirectoryTreeSnapshotter::new(ops, policy, store, issues, 4, true)
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = NormalizedPath::from_path(dir.path());
        let location = SyncLocation::new(root.clone(), "remote");
        let store = Arc::new(MemoryKeyValueStore::new());
        let issues = Arc::new(CollectingIssueSink::new());
        let snapshotter = snapshotter(store.clone(), issues.clone());
        Fixture {
            dir,
            root,
            location,
            store,
            issues,
            snapshotter,
        }
    }

    impl Fixture {
        fn write(&self, relative: &str, bytes: &[u8]) {
            let path = self.dir.path().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        }

        fn mkdir(&self, relative: &str) {
            std::fs::create_dir_all(self.dir.path().join(relative)).unwrap();
        }

        async fn snapshot(&self, force: bool) -> Snapshot {
            self.snapshotter
                .snapshot(&self.root, &self.location, force)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_zero_byte_files_omitted_empty_folders_kept() {
        let f = fixture();
        f.write("docs/report.txt", b"hello");
        f.write("docs/empty.txt", b"");
        f.mkdir("empty-folder");

        let snap = f.snapshot(false).await;

        assert!(snap.changed);
        assert!(snap.tree.files.contains_key("docs/report.txt"));
        assert!(!snap.tree.files.contains_key("docs/empty.txt"));
        assert!(snap.tree.folders.contains_key("docs"));
        assert!(snap.tree.folders.contains_key("empty-folder"));
        assert_eq!(snap.tree.folders["empty-folder"].size, 0);
        assert_eq!(snap.tree.files["docs/report.txt"].size, 5);
        assert_eq!(snap.tree.files["docs/report.txt"].name, "report.txt");
        assert!(f.issues.is_empty());
    }

    #[tokio::test]
    async fn test_dot_exclusion_follows_preference() {
        let f = fixture();
        f.write("project/.git/config", b"[core]");
        f.write("project/main.rs", b"fn main() {}");

        let snap = f.snapshot(false).await;
        assert!(!snap.tree.files.contains_key("project/.git/config"));
        assert!(!snap.tree.folders.contains_key("project/.git"));
        assert!(snap.tree.files.contains_key("project/main.rs"));

        f.store.set_json(keys::EXCLUDE_DOT, &false).await.unwrap();
        let snap = f.snapshot(true).await;
        assert!(snap.tree.files.contains_key("project/.git/config"));
        assert!(snap.tree.folders.contains_key("project/.git"));
    }

    #[tokio::test]
    async fn test_trash_and_ignored_entries_are_skipped() {
        let f = fixture();
        f.write(&format!("{TRASH_DIR_NAME}/deleted.txt"), b"gone");
        f.write("Thumbs.db", b"junk");
        f.write("download.crdownload", b"partial");
        f.write("keep.txt", b"keep");

        let snap = f.snapshot(false).await;

        assert_eq!(snap.tree.files.len(), 1);
        assert!(snap.tree.files.contains_key("keep.txt"));
        assert!(snap.tree.folders.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_inode_index_resolves_paths() {
        use std::os::unix::fs::MetadataExt;

        let f = fixture();
        f.write("a/b.txt", b"bytes");
        let file_ino = std::fs::metadata(f.dir.path().join("a/b.txt")).unwrap().ino();
        let dir_ino = std::fs::metadata(f.dir.path().join("a")).unwrap().ino();

        let snap = f.snapshot(false).await;

        let file = snap.tree.lookup_inode(file_ino).unwrap();
        assert_eq!(file.kind, EntryKind::File);
        assert_eq!(file.path, "a/b.txt");
        let dir = snap.tree.lookup_inode(dir_ino).unwrap();
        assert_eq!(dir.kind, EntryKind::Folder);
        assert_eq!(dir.path, "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_omitted() {
        let f = fixture();
        f.write("real.txt", b"data");
        std::os::unix::fs::symlink(f.dir.path().join("real.txt"), f.dir.path().join("link.txt"))
            .unwrap();

        let snap = f.snapshot(false).await;
        assert!(snap.tree.files.contains_key("real.txt"));
        assert!(!snap.tree.files.contains_key("link.txt"));
    }

    #[tokio::test]
    async fn test_fast_path_until_flag_set_or_forced() {
        let f = fixture();
        f.write("first.txt", b"1");
        let first = f.snapshot(false).await;
        assert!(first.changed);

        let flag = f
            .store
            .get_json::<bool>(&keys::local_data_changed(&f.location.uuid))
            .await
            .unwrap();
        assert_eq!(flag, Some(false));
        assert!(f
            .store
            .get(&keys::local_tree(&f.location.uuid))
            .await
            .unwrap()
            .is_some());

        f.write("second.txt", b"2");
        let cached = f.snapshot(false).await;
        assert!(!cached.changed);
        assert!(!cached.tree.files.contains_key("second.txt"));

        let forced = f.snapshot(true).await;
        assert!(forced.changed);
        assert!(forced.tree.files.contains_key("second.txt"));

        f.write("third.txt", b"3");
        f.store
            .set_json(&keys::local_data_changed(&f.location.uuid), &true)
            .await
            .unwrap();
        let rebuilt = f.snapshot(false).await;
        assert!(rebuilt.changed);
        assert!(rebuilt.tree.files.contains_key("third.txt"));
    }

    #[tokio::test]
    async fn test_persisted_tree_survives_restart() {
        let f = fixture();
        f.write("a.txt", b"a");
        f.snapshot(false).await;

        f.snapshotter.forget(&f.location.uuid);
        let again = f.snapshot(false).await;
        assert!(!again.changed);
        assert!(again.tree.files.contains_key("a.txt"));
    }

    #[tokio::test]
    async fn test_missing_root_fails_and_keeps_flag() {
        let f = fixture();
        let missing = f.root.join("does-not-exist");

        let err = f
            .snapshotter
            .snapshot(&missing, &f.location, false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let flag = f
            .store
            .get_json::<bool>(&keys::local_data_changed(&f.location.uuid))
            .await
            .unwrap();
        assert_eq!(flag, None);
    }

    // Linux accepts non-UTF-8 names; the lossy listing name no longer
    // resolves, so the stat of that one entry fails.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_entry_stat_failure_is_reported_and_walk_continues() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let f = fixture();
        f.write("docs/keep.txt", b"keep");
        f.write("sibling.txt", b"sibling");
        let bad = f.dir.path().join("docs").join(OsStr::from_bytes(b"bad\xff.txt"));
        std::fs::write(&bad, b"unreadable").unwrap();

        let snap = f.snapshot(false).await;

        assert!(snap.tree.files.contains_key("docs/keep.txt"));
        assert!(snap.tree.files.contains_key("sibling.txt"));
        assert_eq!(snap.tree.files.len(), 2);

        let issues = f.issues.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert!(issues[0].path.as_str().contains("bad"));
    }

    #[tokio::test]
    async fn test_failed_tree_write_keeps_change_flag() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let root = NormalizedPath::from_path(dir.path());
        let location = SyncLocation::new(root.clone(), "remote");
        let store = Arc::new(TreeWriteFails::default());
        store
            .set_json(&keys::local_data_changed(&location.uuid), &true)
            .await
            .unwrap();
        let snapshotter = snapshotter(store.clone(), Arc::new(CollectingIssueSink::new()));

        let err = snapshotter.snapshot(&root, &location, false).await.unwrap_err();
        assert!(matches!(err, FsError::Store(_)));

        let flag = store
            .get_json::<bool>(&keys::local_data_changed(&location.uuid))
            .await
            .unwrap();
        assert_eq!(flag, Some(true));

        // Nothing was cached either, so the next call walks again
        let err = snapshotter.snapshot(&root, &location, false).await.unwrap_err();
        assert!(matches!(err, FsError::Store(_)));
    }
}
