//! `LocalFsService` - owns the stat cache, the policy, the trash manager,
//! the snapshotter and the purge timer
//!
//! Nothing in this crate keeps module-level state: construct one service per
//! process (or per test) and share it behind an `Arc`.

use std::sync::{Arc, Weak};
use std::time::Duration;

use filen_core::config::Config;
use filen_core::domain::{LocationId, NormalizedPath, Platform, StatResult, SyncLocation};
use filen_core::ports::{keys, IIssueSink, IKeyValueStore, KeyValueStoreExt};
use tracing::{info, instrument, warn};

use crate::busy::{BusyDetector, BusyPolicy, FileProbe, OsFileProbe};
use crate::issues::TracingIssueSink;
use crate::ops::FsOps;
use crate::path_policy::{ExclusionReason, PathPolicy};
use crate::retry::RetryPolicy;
use crate::scheduler::PurgeScheduler;
use crate::snapshot::{DirectoryTreeSnapshotter, Snapshot};
use crate::stat_cache::StatCache;
use crate::trash::{PurgeReport, TrashManager};
use crate::FsError;

/// Builder for [`LocalFsService`]
///
/// Only the key-value store is mandatory; everything else defaults to the
/// real filesystem, the running platform and [`Config::default`].
pub struct LocalFsServiceBuilder {
    store: Arc<dyn IKeyValueStore>,
    config: Config,
    issues: Arc<dyn IIssueSink>,
    platform: Platform,
    probe: Arc<dyn FileProbe>,
}

impl LocalFsServiceBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn issue_sink(mut self, issues: Arc<dyn IIssueSink>) -> Self {
        self.issues = issues;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Replaces the busy probe (tests use a scripted one)
    pub fn file_probe(mut self, probe: Arc<dyn FileProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn build(self) -> LocalFsService {
        let cache = Arc::new(StatCache::new());
        let busy = Arc::new(BusyDetector::new(
            self.probe,
            BusyPolicy::from_config(&self.config.busy),
        ));
        let ops = FsOps::new(cache, RetryPolicy::from_config(&self.config.retry), busy);
        let policy = Arc::new(PathPolicy::new(&self.config.ignore, self.platform));

        let trash = TrashManager::new(
            ops.clone(),
            Arc::clone(&self.store),
            self.config.trash.retention_ms(),
            self.platform,
        );
        let snapshotter = DirectoryTreeSnapshotter::new(
            ops.clone(),
            Arc::clone(&policy),
            Arc::clone(&self.store),
            self.issues,
            self.config.snapshot.max_concurrent_stats,
            self.config.snapshot.exclude_dot_default,
        );

        LocalFsService {
            config: self.config,
            store: self.store,
            ops,
            policy,
            trash,
            snapshotter,
            scheduler: PurgeScheduler::new(),
        }
    }
}

pub struct LocalFsService {
    config: Config,
    store: Arc<dyn IKeyValueStore>,
    ops: FsOps,
    policy: Arc<PathPolicy>,
    trash: TrashManager,
    snapshotter: DirectoryTreeSnapshotter,
    scheduler: PurgeScheduler,
}

impl LocalFsService {
    pub fn builder(store: Arc<dyn IKeyValueStore>) -> LocalFsServiceBuilder {
        LocalFsServiceBuilder {
            store,
            config: Config::default(),
            issues: Arc::new(TracingIssueSink),
            platform: Platform::current(),
            probe: Arc::new(OsFileProbe),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    pub fn stat_cache(&self) -> &StatCache {
        self.ops.cache()
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub async fn snapshot(
        &self,
        root: &NormalizedPath,
        location: &SyncLocation,
        force_rebuild: bool,
    ) -> Result<Snapshot, FsError> {
        self.snapshotter.snapshot(root, location, force_rebuild).await
    }

    /// Flags the location so the next snapshot walks the tree again
    pub async fn mark_local_data_changed(&self, location: &LocationId) -> Result<(), FsError> {
        self.store
            .set_json(&keys::local_data_changed(location), &true)
            .await?;
        Ok(())
    }

    pub async fn exclude_dot(&self) -> Result<bool, FsError> {
        self.snapshotter.exclude_dot().await
    }

    /// Stores the dot-file preference; every location rebuilds on its next pass
    pub async fn set_exclude_dot(&self, exclude: bool) -> Result<(), FsError> {
        self.store.set_json(keys::EXCLUDE_DOT, &exclude).await?;
        for location in self.sync_locations().await? {
            self.mark_local_data_changed(&location.uuid).await?;
        }
        Ok(())
    }

    /// The rule that would keep `path` out of a snapshot of `root`
    pub async fn exclusion_reason(
        &self,
        root: &NormalizedPath,
        path: &NormalizedPath,
    ) -> Result<Option<ExclusionReason>, FsError> {
        let relative = path.relative_to(root)?;
        let exclude_dot = self.exclude_dot().await?;
        Ok(self
            .policy
            .exclusion_reason(path.as_str(), &relative, exclude_dot))
    }

    // ------------------------------------------------------------------
    // Trash
    // ------------------------------------------------------------------

    pub async fn move_to_trash(
        &self,
        path: &NormalizedPath,
        location: &SyncLocation,
    ) -> Result<(), FsError> {
        self.trash.move_to_trash(path, location).await
    }

    pub async fn permanently_delete(&self, path: &NormalizedPath) -> Result<(), FsError> {
        self.trash.permanently_delete(path).await
    }

    pub async fn purge_expired_or_all(
        &self,
        location: &SyncLocation,
        purge_all: bool,
    ) -> Result<PurgeReport, FsError> {
        self.trash.purge_expired_or_all(location, purge_all).await
    }

    /// Purges every configured location; a failing location is logged and skipped
    #[instrument(skip(self))]
    pub async fn purge_all_locations(
        &self,
        purge_all: bool,
    ) -> Result<Vec<(SyncLocation, PurgeReport)>, FsError> {
        let mut reports = Vec::new();
        for location in self.sync_locations().await? {
            match self.trash.purge_expired_or_all(&location, purge_all).await {
                Ok(report) => reports.push((location, report)),
                Err(e) => warn!(location = %location.uuid, error = %e, "Trash purge failed"),
            }
        }
        Ok(reports)
    }

    pub async fn trash_size(&self, location: &SyncLocation) -> Result<u64, FsError> {
        self.trash.trash_size(location).await
    }

    /// Runs the expired-entry purge over all locations now and every `interval`
    ///
    /// Calling it again replaces the running loop. The loop holds only a weak
    /// reference, so dropping the last `Arc` ends it.
    pub fn start_scheduled_purge(self: &Arc<Self>, interval: Duration) {
        let service: Weak<Self> = Arc::downgrade(self);
        self.scheduler.start(interval, move || {
            let service = service.clone();
            async move {
                let Some(service) = service.upgrade() else {
                    return;
                };
                if let Err(e) = service.purge_all_locations(false).await {
                    warn!(error = %e, "Scheduled trash purge failed");
                }
            }
        });
    }

    pub fn stop_scheduled_purge(&self) {
        self.scheduler.stop();
    }

    pub fn is_purge_scheduled(&self) -> bool {
        self.scheduler.is_running()
    }

    // ------------------------------------------------------------------
    // Sync locations
    // ------------------------------------------------------------------

    pub async fn sync_locations(&self) -> Result<Vec<SyncLocation>, FsError> {
        Ok(self
            .store
            .get_json::<Vec<SyncLocation>>(keys::SYNC_LOCATIONS)
            .await?
            .unwrap_or_default())
    }

    /// Registers a location; a location with the same local path is replaced
    pub async fn add_sync_location(&self, location: SyncLocation) -> Result<(), FsError> {
        let mut locations = self.sync_locations().await?;
        locations.retain(|l| l.local_path != location.local_path && l.uuid != location.uuid);
        info!(location = %location.uuid, path = %location.local_path, "Adding sync location");
        locations.push(location);
        self.store.set_json(keys::SYNC_LOCATIONS, &locations).await?;
        Ok(())
    }

    /// Unregisters a location and drops its persisted state
    ///
    /// Returns false when no such location was configured.
    pub async fn remove_sync_location(&self, id: &LocationId) -> Result<bool, FsError> {
        let mut locations = self.sync_locations().await?;
        let before = locations.len();
        locations.retain(|l| &l.uuid != id);
        if locations.len() == before {
            return Ok(false);
        }

        self.store.set_json(keys::SYNC_LOCATIONS, &locations).await?;
        for key in [
            keys::local_tree(id),
            keys::local_data_changed(id),
            keys::local_trash_size(id),
        ] {
            self.store.delete(&key).await?;
        }
        self.snapshotter.forget(id);
        info!(location = %id, "Removed sync location");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Filesystem primitives
    // ------------------------------------------------------------------

    pub async fn exists(&self, path: &NormalizedPath) -> Result<bool, FsError> {
        self.ops.exists(path).await
    }

    pub async fn stat(&self, path: &NormalizedPath) -> Result<StatResult, FsError> {
        self.ops.stat(path).await
    }

    pub async fn read_chunk(
        &self,
        path: &NormalizedPath,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, FsError> {
        self.ops.read_chunk(path, offset, length).await
    }

    pub async fn mkdir(&self, path: &NormalizedPath) -> Result<(), FsError> {
        self.ops.mkdir(path).await
    }

    pub async fn move_path(&self, from: &NormalizedPath, to: &NormalizedPath) -> Result<(), FsError> {
        self.ops.move_path(from, to).await
    }

    pub async fn rename(&self, from: &NormalizedPath, to: &NormalizedPath) -> Result<(), FsError> {
        self.ops.rename(from, to).await
    }

    pub async fn unlink(&self, path: &NormalizedPath) -> Result<(), FsError> {
        self.ops.unlink(path).await
    }

    pub async fn utimes(
        &self,
        path: &NormalizedPath,
        atime_ms: u64,
        mtime_ms: u64,
    ) -> Result<(), FsError> {
        self.ops.utimes(path, atime_ms, mtime_ms).await
    }

    pub async fn is_file_busy(&self, path: &NormalizedPath) -> bool {
        self.ops.is_busy(path).await
    }
}
