//! Filesystem primitives
//!
//! Every call goes through the retry combinator and keeps the stat cache
//! coherent: successful stats are recorded, anything this process removes
//! or moves away is dropped from it. Destructive moves are gated on the
//! busy detector.

use std::fs::FileTimes;
use std::future::Future;
use std::io::{self, ErrorKind, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use filen_core::domain::{NormalizedPath, StatResult};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument, warn};

use crate::busy::BusyDetector;
use crate::retry::{with_retry, RetryPolicy};
use crate::stat_cache::StatCache;
use crate::FsError;

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: NormalizedPath,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// Retrying, cache-aware filesystem operations
#[derive(Debug, Clone)]
pub struct FsOps {
    cache: Arc<StatCache>,
    retry: RetryPolicy,
    busy: Arc<BusyDetector>,
}

fn ms_to_system_time(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

#[cfg(unix)]
const OCCUPIED_CODES: &[i32] = &[libc::EEXIST, libc::ENOTEMPTY, libc::EISDIR, libc::ENOTDIR];

// ERROR_ACCESS_DENIED, ERROR_FILE_EXISTS, ERROR_DIR_NOT_EMPTY, ERROR_ALREADY_EXISTS
#[cfg(windows)]
const OCCUPIED_CODES: &[i32] = &[5, 80, 145, 183];

#[cfg(not(any(unix, windows)))]
const OCCUPIED_CODES: &[i32] = &[];

/// Whether a failed rename was refused because something sits at the target
fn is_destination_occupied(err: &FsError) -> bool {
    match err {
        FsError::Io { source, .. } => {
            source.kind() == ErrorKind::AlreadyExists
                || source
                    .raw_os_error()
                    .is_some_and(|code| OCCUPIED_CODES.contains(&code))
        }
        _ => false,
    }
}

impl FsOps {
    pub fn new(cache: Arc<StatCache>, retry: RetryPolicy, busy: Arc<BusyDetector>) -> Self {
        Self { cache, retry, busy }
    }

    pub fn cache(&self) -> &Arc<StatCache> {
        &self.cache
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether the path exists (symlinks are not followed)
    pub async fn exists(&self, path: &NormalizedPath) -> Result<bool, FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        match with_retry(self.retry, "exists", move || async move {
            tokio::fs::symlink_metadata(p).await
        })
        .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.cache.delete(path);
                Ok(false)
            }
            Err(e) => Err(FsError::io("exists", path, e)),
        }
    }

    /// `lstat` the path, falling back to the cached value on permission errors
    pub async fn stat(&self, path: &NormalizedPath) -> Result<StatResult, FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        self.stat_with(path, move || async move {
            tokio::fs::symlink_metadata(p)
                .await
                .map(|m| StatResult::from_metadata(&m))
        })
        .await
    }

    /// [`stat`](Self::stat) with a caller-provided fetch
    ///
    /// On success the result is cached. A permission-denied failure returns
    /// the previously cached value when there is one; this is the only place
    /// a fatal error is swallowed.
    pub async fn stat_with<F, Fut>(
        &self,
        path: &NormalizedPath,
        fetch: F,
    ) -> Result<StatResult, FsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<StatResult>>,
    {
        match with_retry(self.retry, "stat", fetch).await {
            Ok(stat) => {
                self.cache.set(path, stat);
                Ok(stat)
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => match self.cache.get(path) {
                Some(cached) => {
                    warn!(path = %path, error = %e, "Permission denied, using cached stat");
                    Ok(cached)
                }
                None => Err(FsError::io("stat", path, e)),
            },
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    self.cache.delete(path);
                }
                Err(FsError::io("stat", path, e))
            }
        }
    }

    /// Reads up to `length` bytes starting at `offset`
    #[instrument(skip(self), fields(path = %path))]
    pub async fn read_chunk(
        &self,
        path: &NormalizedPath,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        with_retry(self.retry, "read", move || async move {
            let mut file = tokio::fs::File::open(p).await?;
            file.seek(SeekFrom::Start(offset)).await?;
            let mut buf = Vec::with_capacity(length.min(1 << 20) as usize);
            file.take(length).read_to_end(&mut buf).await?;
            Ok(buf)
        })
        .await
        .map_err(|e| FsError::io("read", path, e))
    }

    /// Creates the directory and any missing parents
    #[instrument(skip(self), fields(path = %path))]
    pub async fn mkdir(&self, path: &NormalizedPath) -> Result<(), FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        with_retry(self.retry, "mkdir", move || async move {
            tokio::fs::create_dir_all(p).await
        })
        .await
        .map_err(|e| FsError::io("mkdir", path, e))
    }

    /// Lists the direct children of a directory
    pub async fn list_dir(&self, path: &NormalizedPath) -> Result<Vec<DirEntry>, FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        let raw = with_retry(self.retry, "readdir", move || async move {
            let mut reader = tokio::fs::read_dir(p).await?;
            let mut out = Vec::new();
            while let Some(entry) = reader.next_entry().await? {
                let file_type = entry.file_type().await?;
                out.push((
                    entry.file_name().to_string_lossy().into_owned(),
                    file_type.is_dir(),
                    file_type.is_symlink(),
                ));
            }
            Ok(out)
        })
        .await
        .map_err(|e| FsError::io("readdir", path, e))?;

        Ok(raw
            .into_iter()
            .map(|(name, is_dir, is_symlink)| DirEntry {
                path: path.join(&name),
                name,
                is_dir,
                is_symlink,
            })
            .collect())
    }

    /// Moves `from` to `to`, creating the destination parent and replacing
    /// whatever already sits at `to`
    ///
    /// # Errors
    /// Returns `FsError::Busy` if the source is locked by another process.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn move_path(&self, from: &NormalizedPath, to: &NormalizedPath) -> Result<(), FsError> {
        if from == to {
            return Ok(());
        }
        if self.is_busy(from).await {
            return Err(FsError::Busy(from.clone()));
        }
        if let Some(parent) = to.parent() {
            self.mkdir(&parent).await?;
        }
        self.replace_unchecked(from, to).await
    }

    /// Renames `from` over `to`, clearing `to` only when the rename reports
    /// it as occupied and `from` still exists
    pub(crate) async fn replace_unchecked(
        &self,
        from: &NormalizedPath,
        to: &NormalizedPath,
    ) -> Result<(), FsError> {
        match self.rename_unchecked(from, to).await {
            Err(e) if is_destination_occupied(&e) => {
                if !self.exists(from).await? {
                    return Err(FsError::io(
                        "rename",
                        from,
                        io::Error::from(ErrorKind::NotFound),
                    ));
                }
                debug!(to = %to, "Destination occupied, replacing it");
                match self.remove_tree(to).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
                self.rename_unchecked(from, to).await
            }
            other => other,
        }
    }

    /// Renames `from` to `to` in place
    ///
    /// # Errors
    /// Returns `FsError::Busy` if the source is locked by another process.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn rename(&self, from: &NormalizedPath, to: &NormalizedPath) -> Result<(), FsError> {
        if self.is_busy(from).await {
            return Err(FsError::Busy(from.clone()));
        }
        self.rename_unchecked(from, to).await
    }

    async fn rename_unchecked(
        &self,
        from: &NormalizedPath,
        to: &NormalizedPath,
    ) -> Result<(), FsError> {
        let (src, dst) = (from.to_path_buf(), to.to_path_buf());
        let (s, d) = (src.as_path(), dst.as_path());
        with_retry(self.retry, "rename", move || async move {
            tokio::fs::rename(s, d).await
        })
        .await
        .map_err(|e| FsError::io("rename", from, e))?;

        self.cache.delete_tree(from);
        self.cache.delete_tree(to);
        debug!("Rename complete");
        Ok(())
    }

    /// Removes a file or a symlink (never its target)
    #[instrument(skip(self), fields(path = %path))]
    pub async fn unlink(&self, path: &NormalizedPath) -> Result<(), FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        let result = with_retry(self.retry, "unlink", move || async move {
            tokio::fs::remove_file(p).await
        })
        .await;
        self.cache.delete(path);
        result.map_err(|e| FsError::io("unlink", path, e))
    }

    /// Removes a file, symlink or whole directory subtree
    pub async fn remove_tree(&self, path: &NormalizedPath) -> Result<(), FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        let result = with_retry(self.retry, "remove", move || async move {
            let metadata = tokio::fs::symlink_metadata(p).await?;
            if metadata.is_dir() {
                tokio::fs::remove_dir_all(p).await
            } else {
                tokio::fs::remove_file(p).await
            }
        })
        .await;
        self.cache.delete_tree(path);
        result.map_err(|e| FsError::io("remove", path, e))
    }

    /// Sets access and modification times (milliseconds since the epoch)
    #[instrument(skip(self), fields(path = %path))]
    pub async fn utimes(
        &self,
        path: &NormalizedPath,
        atime_ms: u64,
        mtime_ms: u64,
    ) -> Result<(), FsError> {
        let target = path.to_path_buf();
        let p = target.as_path();
        with_retry(self.retry, "utimes", move || async move {
            let owned = p.to_path_buf();
            tokio::task::spawn_blocking(move || {
                let times = FileTimes::new()
                    .set_accessed(ms_to_system_time(atime_ms))
                    .set_modified(ms_to_system_time(mtime_ms));
                std::fs::File::open(&owned)?.set_times(times)
            })
            .await
            .map_err(io::Error::other)?
        })
        .await
        .map_err(|e| FsError::io("utimes", path, e))?;

        self.cache.delete(path);
        Ok(())
    }

    pub async fn is_busy(&self, path: &NormalizedPath) -> bool {
        self.busy.is_file_busy(&path.to_path_buf()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::busy::BusyPolicy;
    use tempfile::TempDir;

    fn ops() -> FsOps {
        let retry = RetryPolicy {
            max_retries: 8,
            delay: Duration::from_millis(1),
        };
        let busy = BusyPolicy {
            attempts: 2,
            interval: Duration::from_millis(1),
        };
        FsOps::new(
            Arc::new(StatCache::new()),
            retry,
            Arc::new(BusyDetector::os(busy)),
        )
    }

    fn path_in(dir: &TempDir, name: &str) -> NormalizedPath {
        NormalizedPath::from_path(&dir.path().join(name))
    }

    #[tokio::test]
    async fn test_stat_caches_result() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let file = path_in(&dir, "a.txt");
        std::fs::write(file.to_path_buf(), b"hello").unwrap();

        let stat = ops.stat(&file).await.unwrap();
        assert!(stat.is_file);
        assert_eq!(stat.size, 5);
        assert_eq!(ops.cache().get(&file), Some(stat));
    }

    #[tokio::test]
    async fn test_permission_denied_falls_back_to_cache() {
        let ops = ops();
        let path = NormalizedPath::new("/virtual/locked.txt");
        let cached = StatResult {
            is_directory: false,
            is_symlink: false,
            is_file: true,
            size: 42,
            modified_at_ms: 1_000,
            created_at_ms: 1_000,
            inode: 9,
        };
        ops.cache().set(&path, cached);

        let stat = ops
            .stat_with(&path, || async {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            })
            .await
            .unwrap();
        assert_eq!(stat, cached);
    }

    #[tokio::test]
    async fn test_permission_denied_without_cache_errors() {
        let ops = ops();
        let path = NormalizedPath::new("/virtual/locked.txt");
        let err = ops
            .stat_with(&path, || async {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Io { operation: "stat", .. }));
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        assert!(ops.exists(&path_in(&dir, "")).await.unwrap());
        assert!(!ops.exists(&path_in(&dir, "nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_chunk() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let file = path_in(&dir, "data.bin");
        std::fs::write(file.to_path_buf(), b"0123456789").unwrap();

        assert_eq!(ops.read_chunk(&file, 2, 4).await.unwrap(), b"2345");
        assert_eq!(ops.read_chunk(&file, 8, 10).await.unwrap(), b"89");
        assert!(ops.read_chunk(&file, 20, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_creates_parent_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let src = path_in(&dir, "src.txt");
        let dst = path_in(&dir, "deep/nested/dst.txt");
        std::fs::write(src.to_path_buf(), b"new").unwrap();

        ops.move_path(&src, &dst).await.unwrap();
        assert_eq!(std::fs::read(dst.to_path_buf()).unwrap(), b"new");

        std::fs::write(src.to_path_buf(), b"newer").unwrap();
        ops.move_path(&src, &dst).await.unwrap();
        assert_eq!(std::fs::read(dst.to_path_buf()).unwrap(), b"newer");
        assert!(!ops.exists(&src).await.unwrap());
    }

    #[tokio::test]
    async fn test_move_with_missing_source_keeps_destination() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let gone = path_in(&dir, "gone.txt");
        let keep = path_in(&dir, "keep.txt");
        std::fs::write(keep.to_path_buf(), b"keep").unwrap();

        let err = ops.move_path(&gone, &keep).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(std::fs::read(keep.to_path_buf()).unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_move_onto_itself_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let file = path_in(&dir, "same.txt");
        std::fs::write(file.to_path_buf(), b"same").unwrap();

        ops.move_path(&file, &file).await.unwrap();
        assert_eq!(std::fs::read(file.to_path_buf()).unwrap(), b"same");
    }

    #[tokio::test]
    async fn test_move_directory_replaces_non_empty_directory() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let src = path_in(&dir, "src");
        let dst = path_in(&dir, "dst");
        std::fs::create_dir_all(src.to_path_buf()).unwrap();
        std::fs::write(src.join("new.txt").to_path_buf(), b"new").unwrap();
        std::fs::create_dir_all(dst.to_path_buf()).unwrap();
        std::fs::write(dst.join("old.txt").to_path_buf(), b"old").unwrap();

        ops.move_path(&src, &dst).await.unwrap();

        assert!(!src.to_path_buf().exists());
        assert!(dst.join("new.txt").to_path_buf().exists());
        assert!(!dst.join("old.txt").to_path_buf().exists());
    }

    #[test]
    fn test_destination_occupied_classification() {
        let path = NormalizedPath::new("/x");
        let exists = FsError::io("rename", &path, io::Error::from(ErrorKind::AlreadyExists));
        assert!(is_destination_occupied(&exists));

        let missing = FsError::io("rename", &path, io::Error::from(ErrorKind::NotFound));
        assert!(!is_destination_occupied(&missing));
        assert!(!is_destination_occupied(&FsError::Busy(path)));
    }

    #[tokio::test]
    async fn test_rename_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let a = path_in(&dir, "a");
        let b = path_in(&dir, "b");
        std::fs::write(a.to_path_buf(), b"x").unwrap();
        ops.stat(&a).await.unwrap();

        ops.rename(&a, &b).await.unwrap();
        assert!(ops.cache().get(&a).is_none());
        assert!(ops.stat(&b).await.is_ok());
    }

    #[tokio::test]
    async fn test_utimes_sets_mtime() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let file = path_in(&dir, "t.txt");
        std::fs::write(file.to_path_buf(), b"x").unwrap();

        ops.utimes(&file, 1_600_000_000_000, 1_600_000_000_000)
            .await
            .unwrap();
        let stat = ops.stat(&file).await.unwrap();
        assert_eq!(stat.modified_at_ms, 1_600_000_000_000);
    }

    #[tokio::test]
    async fn test_list_dir_and_remove_tree() {
        let dir = TempDir::new().unwrap();
        let ops = ops();
        let sub = path_in(&dir, "sub");
        ops.mkdir(&sub.join("inner")).await.unwrap();
        std::fs::write(sub.join("f.txt").to_path_buf(), b"x").unwrap();

        let mut entries = ops.list_dir(&sub).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "f.txt");
        assert!(!entries[0].is_dir);
        assert!(entries[1].is_dir);

        ops.remove_tree(&sub).await.unwrap();
        assert!(!ops.exists(&sub).await.unwrap());
        assert!(ops.unlink(&sub).await.unwrap_err().is_not_found());
    }
}
