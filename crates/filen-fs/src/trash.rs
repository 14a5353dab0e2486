//! Local trash
//!
//! Deleted items are relocated into `<root>/.filen.trash.local` keeping their
//! basename (a later item with the same name replaces the earlier one).
//! Purges remove entries whose creation time is older than the retention
//! threshold, or everything when emptying the trash on demand.

use std::sync::Arc;

use filen_core::domain::{
    system_time_ms, DomainError, NormalizedPath, Platform, SyncLocation, TRASH_DIR_NAME,
};
use filen_core::ports::{keys, IKeyValueStore, KeyValueStoreExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::ops::FsOps;
use crate::FsError;

/// Outcome of one purge pass over a location's trash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Entries permanently deleted
    ///
    /// A directory removed as a unit counts once, whatever it contains.
    pub deleted: usize,
    /// Entries queued for deletion that could not be removed
    pub failed: usize,
    /// Bytes left in the trash, as persisted for the location
    pub remaining_bytes: u64,
}

/// `created + retention <= now`
pub fn is_expired(created_at_ms: u64, retention_ms: u64, now_ms: u64) -> bool {
    created_at_ms.saturating_add(retention_ms) <= now_ms
}

pub struct TrashManager {
    ops: FsOps,
    store: Arc<dyn IKeyValueStore>,
    retention_ms: u64,
    platform: Platform,
}

impl TrashManager {
    pub fn new(
        ops: FsOps,
        store: Arc<dyn IKeyValueStore>,
        retention_ms: u64,
        platform: Platform,
    ) -> Self {
        Self {
            ops,
            store,
            retention_ms,
            platform,
        }
    }

    /// Moves `path` into the location's trash directory
    ///
    /// Succeeds without doing anything if `path` is already gone, including
    /// when it disappears while being moved.
    ///
    /// # Errors
    /// - `FsError::Busy` if another process holds the file
    /// - `FsError::Domain` if `path` is the trash directory or inside it
    #[instrument(skip(self, location), fields(path = %path, location = %location.uuid))]
    pub async fn move_to_trash(
        &self,
        path: &NormalizedPath,
        location: &SyncLocation,
    ) -> Result<(), FsError> {
        if !self.ops.exists(path).await? {
            debug!("Already gone");
            self.ops.cache().delete_tree(path);
            return Ok(());
        }
        if self.ops.is_busy(path).await {
            return Err(FsError::Busy(path.clone()));
        }

        let trash = location.trash_dir();
        if path.relative_to(&trash).is_ok() {
            return Err(DomainError::InvalidPath(format!("{path} is inside the trash")).into());
        }
        let name = path
            .file_name()
            .ok_or_else(|| DomainError::InvalidPath(format!("{path} has no file name")))?;

        self.ops.mkdir(&trash).await?;
        let dest = trash.join(name);
        match self.ops.replace_unchecked(path, &dest).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Vanished during move"),
            Err(e) => return Err(e),
        }

        self.ops.cache().delete_tree(path);
        debug!(dest = %dest, "Moved to trash");
        Ok(())
    }

    /// Removes `path` for good; symlinks are unlinked, never followed
    ///
    /// # Errors
    /// `FsError::Busy` if another process holds the file.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn permanently_delete(&self, path: &NormalizedPath) -> Result<(), FsError> {
        if !self.ops.exists(path).await? {
            self.ops.cache().delete_tree(path);
            return Ok(());
        }
        if self.ops.is_busy(path).await {
            return Err(FsError::Busy(path.clone()));
        }

        let stat = match self.ops.stat(path).await {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => {
                self.ops.cache().delete_tree(path);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let result = if stat.is_symlink || !stat.is_directory {
            self.ops.unlink(path).await
        } else {
            self.ops.remove_tree(path).await
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Vanished during delete"),
            Err(e) => return Err(e),
        }

        self.ops.cache().delete_tree(path);
        Ok(())
    }

    /// Purges expired entries, or every entry when `purge_all` is set
    ///
    /// With `purge_all` only the top-level trash entries are queued: each
    /// one is deleted recursively, which removes every nested entry too.
    pub async fn purge_expired_or_all(
        &self,
        location: &SyncLocation,
        purge_all: bool,
    ) -> Result<PurgeReport, FsError> {
        let now_ms = system_time_ms(std::time::SystemTime::now());
        self.purge_at(location, purge_all, now_ms).await
    }

    /// [`purge_expired_or_all`](Self::purge_expired_or_all) against a fixed clock
    #[instrument(skip(self, location), fields(location = %location.uuid))]
    pub async fn purge_at(
        &self,
        location: &SyncLocation,
        purge_all: bool,
        now_ms: u64,
    ) -> Result<PurgeReport, FsError> {
        let trash = location.trash_dir();
        let mut report = PurgeReport::default();

        if !self.ops.exists(&trash).await? {
            self.persist_size(location, 0).await?;
            return Ok(report);
        }

        let reserved = self.platform.reserved_dir_name();
        let mut queued: Vec<NormalizedPath> = Vec::new();
        let mut remaining: u64 = 0;
        let mut pending = vec![trash.clone()];

        while let Some(dir) = pending.pop() {
            let entries = match self.ops.list_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == trash => return Err(e),
                Err(e) => {
                    warn!(dir = %dir, error = %e, "Skipping unreadable trash directory");
                    continue;
                }
            };

            for entry in entries {
                if entry.name == TRASH_DIR_NAME || Some(entry.name.as_str()) == reserved {
                    continue;
                }
                if purge_all {
                    queued.push(entry.path);
                    continue;
                }
                if entry.is_symlink {
                    continue;
                }

                let stat = match self.ops.stat(&entry.path).await {
                    Ok(stat) => stat,
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => {
                        warn!(path = %entry.path, error = %e, "Cannot stat trash entry");
                        continue;
                    }
                };

                if is_expired(stat.created_at_ms, self.retention_ms, now_ms) {
                    queued.push(entry.path);
                } else if stat.is_directory {
                    pending.push(entry.path);
                } else {
                    remaining += stat.size;
                }
            }
        }

        for path in &queued {
            match self.permanently_delete(path).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to purge trash entry");
                    report.failed += 1;
                }
            }
        }

        report.remaining_bytes = if purge_all { 0 } else { remaining };
        self.persist_size(location, report.remaining_bytes).await?;

        info!(
            deleted = report.deleted,
            failed = report.failed,
            remaining_bytes = report.remaining_bytes,
            purge_all,
            "Trash purge complete"
        );
        Ok(report)
    }

    /// Last persisted trash size for the location
    pub async fn trash_size(&self, location: &SyncLocation) -> Result<u64, FsError> {
        Ok(self
            .store
            .get_json::<u64>(&keys::local_trash_size(&location.uuid))
            .await?
            .unwrap_or(0))
    }

    async fn persist_size(&self, location: &SyncLocation, bytes: u64) -> Result<(), FsError> {
        self.store
            .set_json(&keys::local_trash_size(&location.uuid), &bytes)
            .await?;
        Ok(())
    }
}
