//! Fixed-delay retry combinator
//!
//! Every filesystem call in this crate goes through [`with_retry`]. The
//! error is classified by its raw OS code: transient conditions are retried
//! after a fixed delay, everything else (including codes we do not know)
//! fails immediately.

use std::future::Future;
use std::io;
use std::time::Duration;

use filen_core::config::RetryConfig;
use tracing::{debug, warn};

/// Outcome of classifying a failed filesystem call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient OS condition, worth another attempt
    Retryable,
    /// Final for this attempt; surfaced to the caller
    Fatal,
}

#[cfg(unix)]
const RETRYABLE_CODES: &[i32] = &[
    libc::EAGAIN,
    libc::EBUSY,
    libc::ECANCELED,
    libc::EBADF,
    libc::EINTR,
    libc::EIO,
    libc::EMFILE,
    libc::ENFILE,
    libc::ENOMEM,
    libc::EPIPE,
    libc::ESPIPE,
];

// ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(windows)]
const RETRYABLE_CODES: &[i32] = &[32, 33];

#[cfg(not(any(unix, windows)))]
const RETRYABLE_CODES: &[i32] = &[];

/// Classifies an I/O error for retry purposes
///
/// Raw OS codes are matched against the transient set; unknown codes are
/// fatal. Errors without a raw code (synthesized by std) fall back to their
/// [`io::ErrorKind`].
pub fn classify(err: &io::Error) -> ErrorClass {
    match err.raw_os_error() {
        Some(code) if RETRYABLE_CODES.contains(&code) => ErrorClass::Retryable,
        Some(_) => ErrorClass::Fatal,
        None => match err.kind() {
            io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::OutOfMemory
            | io::ErrorKind::BrokenPipe => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        },
    }
}

/// Retry bounds: `max_retries` extra attempts spaced by `delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.delay(),
        }
    }

    /// Total number of attempts, the initial one included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Runs `action` until it succeeds, fails fatally, or retries run out
///
/// `classifier` decides per error whether another attempt is made. After the
/// last retry the final error is returned as-is.
pub async fn retry_with<T, E, F, Fut, C>(
    policy: RetryPolicy,
    operation: &str,
    classifier: C,
    mut action: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorClass,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match action().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if classifier(&err) == ErrorClass::Fatal || attempt > policy.max_retries {
                    return Err(err);
                }
                warn!(
                    operation,
                    attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Transient filesystem error, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

/// [`retry_with`] specialised to `io::Error` and [`classify`]
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation: &str, action: F) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    retry_with(policy, operation, classify, action).await
}
