//! Domain error types
//!
//! Errors raised while constructing or validating domain values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not within the sync location root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// A path was inserted into a tree map while already present in the other one
    #[error("Path already present as {existing}: {path}")]
    TreeKindConflict {
        /// The offending relative path
        path: String,
        /// The kind it is already recorded as
        existing: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
