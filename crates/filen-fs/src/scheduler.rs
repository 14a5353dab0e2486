//! Purge scheduler - the single long-lived background task of the layer
//!
//! [`PurgeScheduler`] runs a job immediately and then on a fixed interval.
//! At most one loop is active per scheduler: starting again cancels the
//! previous loop before the new one is installed.
//!
//! ## Flow
//!
//! ```text
//! start(interval, job) ──→ cancel previous token
//!                          │
//!                          └─→ spawn loop: tick ──→ job() ──→ tick ──→ ...
//!                                           ▲
//!                              stop() / start() cancels
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct ActiveLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the single active periodic loop
#[derive(Default)]
pub struct PurgeScheduler {
    active: Mutex<Option<ActiveLoop>>,
    /// Held while a job runs so a replaced loop never overlaps its successor
    run_lock: Arc<AsyncMutex<()>>,
}

impl PurgeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `job` now and every `interval` after, replacing any running loop
    pub fn start<F, Fut>(&self, interval: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let run_lock = Arc::clone(&self.run_lock);
        let period = interval.max(Duration::from_millis(1));

        info!(interval_ms = period.as_millis() as u64, "Starting scheduled purge");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let _guard = run_lock.lock().await;
                        if child.is_cancelled() {
                            break;
                        }
                        debug!("Scheduled purge tick");
                        job().await;
                    }
                }
            }
            debug!("Scheduled purge loop exited");
        });

        let previous = match self.active.lock() {
            Ok(mut slot) => slot.replace(ActiveLoop { token, handle }),
            Err(poisoned) => poisoned.into_inner().replace(ActiveLoop { token, handle }),
        };
        if let Some(previous) = previous {
            debug!("Cancelling previous purge loop");
            previous.token.cancel();
        }
    }

    /// Cancels the active loop, if any
    pub fn stop(&self) {
        let previous = match self.active.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(previous) = previous {
            info!("Stopping scheduled purge");
            previous.token.cancel();
        }
    }

    /// True while a loop is installed and has not finished
    pub fn is_running(&self) -> bool {
        match self.active.lock() {
            Ok(slot) => slot.as_ref().is_some_and(|l| !l.handle.is_finished()),
            Err(_) => false,
        }
    }
}

impl Drop for PurgeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
