//! Busy-file detection
//!
//! Heuristic only: a file counts as busy when every read+write open attempt
//! fails with a busy code. Any other outcome (success, not found, permission
//! denied, a directory) short-circuits to "not busy".

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filen_core::config::BusyConfig;
use tracing::{debug, instrument, warn};

/// Opens a path for read+write; the handle is dropped immediately
pub trait FileProbe: Send + Sync {
    fn open_read_write(&self, path: &Path) -> io::Result<()>;
}

/// Probe backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileProbe;

impl FileProbe for OsFileProbe {
    fn open_read_write(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new().read(true).write(true).open(path).map(drop)
    }
}

#[cfg(unix)]
fn is_busy_error(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EBUSY)
}

// ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(windows)]
fn is_busy_error(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(any(unix, windows)))]
fn is_busy_error(_err: &io::Error) -> bool {
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyPolicy {
    /// Number of probes before reporting busy
    pub attempts: u32,
    /// Pause between probes
    pub interval: Duration,
}

impl BusyPolicy {
    pub fn from_config(config: &BusyConfig) -> Self {
        Self {
            attempts: config.attempts,
            interval: config.interval(),
        }
    }
}

impl Default for BusyPolicy {
    fn default() -> Self {
        Self::from_config(&BusyConfig::default())
    }
}

pub struct BusyDetector {
    probe: Arc<dyn FileProbe>,
    policy: BusyPolicy,
}

impl BusyDetector {
    pub fn new(probe: Arc<dyn FileProbe>, policy: BusyPolicy) -> Self {
        Self { probe, policy }
    }

    /// Detector using the real filesystem
    pub fn os(policy: BusyPolicy) -> Self {
        Self::new(Arc::new(OsFileProbe), policy)
    }

    /// Returns true only if every probe failed with a busy code
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn is_file_busy(&self, path: &Path) -> bool {
        let attempts = self.policy.attempts.max(1);

        for attempt in 1..=attempts {
            let probe = Arc::clone(&self.probe);
            let p: PathBuf = path.to_path_buf();
            let outcome = tokio::task::spawn_blocking(move || probe.open_read_write(&p)).await;

            match outcome {
                Ok(Ok(())) => return false,
                Ok(Err(e)) if is_busy_error(&e) => {
                    debug!(attempt, "File busy, probing again");
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "Probe failed with a non-busy error");
                    return false;
                }
                Err(join_err) => {
                    warn!(error = %join_err, "Busy probe task failed");
                    return false;
                }
            }
        }

        warn!(attempts, "File still busy after all probes");
        true
    }
}

impl std::fmt::Debug for BusyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyDetector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProbe {
        calls: AtomicU32,
        error: fn() -> io::Error,
        succeed_after: Option<u32>,
    }

    impl ScriptedProbe {
        fn failing(error: fn() -> io::Error) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                error,
                succeed_after: None,
            })
        }
    }

    impl FileProbe for ScriptedProbe {
        fn open_read_write(&self, _path: &Path) -> io::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_after {
                Some(limit) if n > limit => Ok(()),
                _ => Err((self.error)()),
            }
        }
    }

    fn fast_policy() -> BusyPolicy {
        BusyPolicy {
            attempts: 30,
            interval: Duration::from_millis(1),
        }
    }

    #[cfg(unix)]
    fn ebusy() -> io::Error {
        io::Error::from_raw_os_error(libc::EBUSY)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_busy_after_all_probes() {
        let probe = ScriptedProbe::failing(ebusy);
        let detector = BusyDetector::new(probe.clone(), fast_policy());

        assert!(detector.is_file_busy(Path::new("/locked")).await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 30);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_not_found_short_circuits() {
        let probe = ScriptedProbe::failing(|| io::Error::from_raw_os_error(libc::ENOENT));
        let detector = BusyDetector::new(probe.clone(), fast_policy());

        assert!(!detector.is_file_busy(Path::new("/gone")).await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_released_lock_is_not_busy() {
        let probe = Arc::new(ScriptedProbe {
            calls: AtomicU32::new(0),
            error: ebusy,
            succeed_after: Some(2),
        });
        let detector = BusyDetector::new(probe.clone(), fast_policy());

        assert!(!detector.is_file_busy(Path::new("/briefly-locked")).await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_real_file_is_not_busy() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("free.txt");
        std::fs::write(&file, b"x").unwrap();

        let detector = BusyDetector::os(fast_policy());
        assert!(!detector.is_file_busy(&file).await);
        assert!(!detector.is_file_busy(&dir.path().join("missing")).await);
    }
}
