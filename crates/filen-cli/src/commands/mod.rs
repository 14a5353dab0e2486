//! CLI subcommands and the context they share

pub mod check;
pub mod config;
pub mod daemon;
pub mod locations;
pub mod snapshot;
pub mod trash;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use filen_cache::{DatabasePool, SqliteKeyValueStore};
use filen_core::config::Config;
use filen_core::domain::{NormalizedPath, SyncLocation};
use filen_fs::LocalFsService;

/// Configuration resolved once per invocation
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
}

impl AppContext {
    /// Loads `path` (or the default location), falling back to defaults
    pub fn load(path: Option<PathBuf>) -> Self {
        let config_path = path.unwrap_or_else(Config::default_path);
        let config = Config::load_or_default(&config_path);
        Self {
            config,
            config_path,
        }
    }

    /// Opens the state database and builds the service over it
    pub async fn service(&self) -> Result<Arc<LocalFsService>> {
        let pool = DatabasePool::new(&self.config.store.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to open state database at {}",
                    self.config.store.database.display()
                )
            })?;
        let store = Arc::new(SqliteKeyValueStore::new(pool.pool().clone()));

        Ok(Arc::new(
            LocalFsService::builder(store)
                .config(self.config.clone())
                .build(),
        ))
    }
}

/// Normalizes a user-supplied path, resolving it against the working directory
pub fn absolute(raw: &str) -> Result<NormalizedPath> {
    let path = PathBuf::from(raw);
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("Failed to resolve the current directory")?
            .join(path)
    };
    Ok(NormalizedPath::from_path(&path))
}

/// The configured location with the deepest root containing `path`
pub fn location_for<'a>(
    locations: &'a [SyncLocation],
    path: &NormalizedPath,
) -> Option<&'a SyncLocation> {
    locations
        .iter()
        .filter(|l| path.relative_to(&l.local_path).is_ok())
        .max_by_key(|l| l.local_path.as_str().len())
}

/// The configured location whose root is exactly `root`
pub fn location_at<'a>(
    locations: &'a [SyncLocation],
    root: &NormalizedPath,
) -> Option<&'a SyncLocation> {
    locations.iter().find(|l| &l.local_path == root)
}

/// Like [`location_for`] but fails with a hint when nothing matches
pub async fn require_location(
    service: &LocalFsService,
    path: &NormalizedPath,
) -> Result<SyncLocation> {
    let locations = service.sync_locations().await?;
    location_for(&locations, path).cloned().with_context(|| {
        format!("{path} is not inside a configured sync location (see `filen-localfs locations add`)")
    })
}
