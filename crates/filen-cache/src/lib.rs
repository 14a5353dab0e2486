//! Filen Cache - Key-value persistence for the local filesystem layer
//!
//! Stores the small JSON documents the filesystem layer keeps between runs:
//! per-location directory trees, "local data changed" flags, trash sizes,
//! the dot-file preference and the configured sync locations.
//!
//! ## Architecture
//!
//! Implements the `IKeyValueStore` port from `filen-core`. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteKeyValueStore`] - Durable `IKeyValueStore` implementation
//! - [`MemoryKeyValueStore`] - In-process `IKeyValueStore` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use filen_cache::{DatabasePool, SqliteKeyValueStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/filen-localfs/state.db")).await?;
//! let store = SqliteKeyValueStore::new(pool.pool().clone());
//! // Use store as IKeyValueStore...
//! # Ok(())
//! # }
//! ```

pub mod kv;
pub mod pool;

pub use kv::{MemoryKeyValueStore, SqliteKeyValueStore};
pub use pool::DatabasePool;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value is not valid JSON
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
