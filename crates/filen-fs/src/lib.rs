//! Filen FS - Local filesystem layer of the sync client
//!
//! Provides:
//! - Retrying filesystem operations with errno classification
//! - A process-wide stat cache that tolerates transient permission errors
//! - Path eligibility rules (reserved names, ignore lists, length ceilings)
//! - Busy-file detection before destructive operations
//! - A per-location local trash with scheduled and on-demand purge
//! - Directory tree snapshots consumed by the reconciliation engine
//!
//! ## Modules
//!
//! - [`retry`] - Fixed-delay retry combinator and error classification
//! - [`stat_cache`] - Normalized path -> last known [`StatResult`](filen_core::domain::StatResult)
//! - [`path_policy`] - Pure eligibility predicates
//! - [`busy`] - Busy-file probing
//! - [`ops`] - Filesystem primitives built on the pieces above
//! - [`trash`] - Move-to-trash, permanent delete, purge
//! - [`snapshot`] - Directory tree snapshots
//! - [`scheduler`] - Single-instance periodic task runner
//! - [`issues`] - Issue sink adapters
//! - [`service`] - [`LocalFsService`], the façade owning all mutable state

pub mod busy;
pub mod issues;
pub mod ops;
pub mod path_policy;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod stat_cache;
pub mod trash;

use std::io;

use filen_core::domain::{DomainError, NormalizedPath};
use thiserror::Error;

pub use retry::{classify, ErrorClass, RetryPolicy};
pub use service::{LocalFsService, LocalFsServiceBuilder};
pub use snapshot::Snapshot;
pub use trash::PurgeReport;

/// Errors surfaced by the local filesystem layer
#[derive(Debug, Error)]
pub enum FsError {
    /// An OS-level failure, after retries where the code was transient
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// Name of the failing primitive (`stat`, `rename`, ...)
        operation: &'static str,
        path: NormalizedPath,
        #[source]
        source: io::Error,
    },

    /// Another process holds the file; the destructive operation was refused
    #[error("File busy: {0}")]
    Busy(NormalizedPath),

    /// The key-value store failed
    #[error("Key-value store error: {0}")]
    Store(#[from] anyhow::Error),

    /// A persisted document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A domain invariant was violated
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A spawned filesystem task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}

impl FsError {
    /// Wraps an `io::Error` with the operation and path it came from.
    pub fn io(operation: &'static str, path: &NormalizedPath, source: io::Error) -> Self {
        FsError::Io {
            operation,
            path: path.clone(),
            source,
        }
    }

    /// The raw OS error code, preserved for user-facing translation
    pub fn os_code(&self) -> Option<i32> {
        match self {
            FsError::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Returns true if the underlying error is "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Returns true if a busy probe refused the operation
    pub fn is_busy(&self) -> bool {
        matches!(self, FsError::Busy(_))
    }

    /// Retry classification of the underlying OS error; non-I/O errors are fatal
    pub fn class(&self) -> ErrorClass {
        match self {
            FsError::Io { source, .. } => classify(source),
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_os_code() {
        let err = FsError::io(
            "stat",
            &NormalizedPath::new("/x"),
            io::Error::from_raw_os_error(libc::ENOSPC),
        );
        assert_eq!(err.os_code(), Some(libc::ENOSPC));
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert!(err.to_string().starts_with("stat failed for /x"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = FsError::io(
            "rename",
            &NormalizedPath::new("/x"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(!err.is_busy());

        let busy = FsError::Busy(NormalizedPath::new("/x"));
        assert!(busy.is_busy());
        assert!(!busy.is_not_found());
        assert_eq!(busy.os_code(), None);
    }
}
