//! Configuration module for the Filen local filesystem layer.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetryConfig,
    pub busy: BusyConfig,
    pub trash: TrashConfig,
    pub snapshot: SnapshotConfig,
    pub ignore: IgnoreConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

/// Retry behaviour for transient filesystem errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

/// Busy-file probing before destructive operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusyConfig {
    /// Number of open probes before a file is declared busy.
    pub attempts: u32,
    /// Spacing between probes, in milliseconds.
    pub interval_ms: u64,
}

/// Local trash retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrashConfig {
    /// Entries older than this many days are purged by the scheduled sweep.
    pub retention_days: u64,
    /// Minutes between scheduled purge sweeps.
    pub purge_interval_minutes: u64,
}

/// Directory tree snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Upper bound on concurrently running per-entry stats.
    pub max_concurrent_stats: usize,
    /// Dot-file exclusion used when the user never set a preference.
    pub exclude_dot_default: bool,
}

/// Built-in ignore lists consulted by the path policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Lowercased names that are never synced.
    pub names: Vec<String>,
    /// Lowercased extensions (without the dot) that are never synced.
    pub extensions: Vec<String>,
    /// Substrings that exclude any relative path containing them.
    pub folders: Vec<String>,
    /// Substrings that exclude any absolute path containing them.
    pub system_paths: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Key-value store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/filen-localfs/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("filen-localfs")
            .join("config.yaml")
    }
}

impl RetryConfig {
    /// Delay between attempts as a `Duration`.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl BusyConfig {
    /// Probe spacing as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl TrashConfig {
    /// Retention threshold in milliseconds.
    pub fn retention_ms(&self) -> u64 {
        self.retention_days.saturating_mul(24 * 60 * 60 * 1000)
    }

    /// Purge sweep interval as a `Duration`.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_minutes.saturating_mul(60))
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            delay_ms: 100,
        }
    }
}

impl Default for BusyConfig {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval_ms: 1000,
        }
    }
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            purge_interval_minutes: 60,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_concurrent_stats: 64,
            exclude_dot_default: true,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            names: strings(&[
                ".ds_store",
                "desktop.ini",
                "thumbs.db",
                "ehthumbs.db",
                "ehthumbs_vista.db",
                ".localized",
                ".directory",
                ".apdisk",
                ".temporaryitems",
                ".fseventsd",
                ".spotlight-v100",
                ".trashes",
                ".trash",
                "$recycle.bin",
                "system volume information",
                ".filen.trash.local",
            ]),
            extensions: strings(&[
                "tmp", "temp", "crdownload", "part", "partial", "download", "swp", "swo", "lnk",
                "filepart",
            ]),
            folders: strings(&[
                "/.filen.trash.local",
                "/$RECYCLE.BIN",
                "/System Volume Information",
                "/.Trash-",
                "/.Trashes",
                "/.fseventsd",
                "/.Spotlight-V100",
            ]),
            system_paths: strings(&[
                "/proc/self/",
                "/System/Library/",
                "/Library/Caches/",
                "/private/var/vm/",
                "C:/Windows/",
                "C:/Program Files/",
                "C:/Program Files (x86)/",
                "C:/ProgramData/",
                "/AppData/Local/Temp/",
            ]),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("filen-localfs")
                .join("state.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.delay_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- retry ---
        must_be_positive(&mut errors, "retry.delay_ms", self.retry.delay_ms);

        // --- busy ---
        must_be_positive(&mut errors, "busy.attempts", self.busy.attempts as u64);
        must_be_positive(&mut errors, "busy.interval_ms", self.busy.interval_ms);

        // --- trash ---
        must_be_positive(
            &mut errors,
            "trash.purge_interval_minutes",
            self.trash.purge_interval_minutes,
        );

        // --- snapshot ---
        must_be_positive(
            &mut errors,
            "snapshot.max_concurrent_stats",
            self.snapshot.max_concurrent_stats as u64,
        );

        // --- ignore ---
        for ext in &self.ignore.extensions {
            if ext.starts_with('.') || ext.is_empty() {
                errors.push(ValidationError {
                    field: "ignore.extensions".into(),
                    message: format!("extension '{ext}' must be non-empty and have no leading dot"),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use filen_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .retry_delay_ms(5)
///     .busy_attempts(3)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.busy.attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- retry ---

    pub fn retry_max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.delay_ms = ms;
        self
    }

    // --- busy ---

    pub fn busy_attempts(mut self, n: u32) -> Self {
        self.config.busy.attempts = n;
        self
    }

    pub fn busy_interval_ms(mut self, ms: u64) -> Self {
        self.config.busy.interval_ms = ms;
        self
    }

    // --- trash ---

    pub fn trash_retention_days(mut self, days: u64) -> Self {
        self.config.trash.retention_days = days;
        self
    }

    pub fn trash_purge_interval_minutes(mut self, minutes: u64) -> Self {
        self.config.trash.purge_interval_minutes = minutes;
        self
    }

    // --- snapshot ---

    pub fn snapshot_max_concurrent_stats(mut self, n: usize) -> Self {
        self.config.snapshot.max_concurrent_stats = n;
        self
    }

    pub fn snapshot_exclude_dot_default(mut self, exclude: bool) -> Self {
        self.config.snapshot.exclude_dot_default = exclude;
        self
    }

    // --- ignore ---

    pub fn ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.config.ignore = ignore;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- store ---

    pub fn store_database(mut self, path: PathBuf) -> Self {
        self.config.store.database = path;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.retry.max_retries, 8);
        assert_eq!(cfg.retry.delay(), Duration::from_millis(100));
        assert_eq!(cfg.busy.attempts, 30);
        assert_eq!(cfg.busy.interval(), Duration::from_secs(1));
        assert_eq!(cfg.trash.retention_days, 30);
        assert_eq!(cfg.trash.retention_ms(), 30 * 24 * 60 * 60 * 1000);
        assert_eq!(cfg.trash.purge_interval(), Duration::from_secs(3600));
        assert_eq!(cfg.snapshot.max_concurrent_stats, 64);
        assert!(cfg.snapshot.exclude_dot_default);
        assert!(cfg.ignore.names.contains(&".ds_store".to_string()));
        assert!(cfg.ignore.extensions.contains(&"crdownload".to_string()));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.store.database.ends_with("filen-localfs/state.db"));
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
retry:
  max_retries: 3
  delay_ms: 50
busy:
  attempts: 5
  interval_ms: 200
trash:
  retention_days: 7
  purge_interval_minutes: 15
snapshot:
  max_concurrent_stats: 16
  exclude_dot_default: false
logging:
  level: debug
store:
  database: /tmp/filen-test.db
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.delay_ms, 50);
        assert_eq!(cfg.busy.attempts, 5);
        assert_eq!(cfg.busy.interval_ms, 200);
        assert_eq!(cfg.trash.retention_days, 7);
        assert_eq!(cfg.trash.purge_interval_minutes, 15);
        assert_eq!(cfg.snapshot.max_concurrent_stats, 16);
        assert!(!cfg.snapshot.exclude_dot_default);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.store.database, PathBuf::from("/tmp/filen-test.db"));
        // Absent section falls back to defaults
        assert!(!cfg.ignore.names.is_empty());
    }

    #[test]
    fn load_partial_section_keeps_other_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"retry:\n  delay_ms: 7\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.retry.delay_ms, 7);
        assert_eq!(cfg.retry.max_retries, 8);
        assert_eq!(cfg.busy.attempts, 30);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.retry.max_retries, 8);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_values() {
        let mut cfg = Config::default();
        cfg.retry.delay_ms = 0;
        cfg.busy.attempts = 0;
        cfg.busy.interval_ms = 0;
        cfg.trash.purge_interval_minutes = 0;
        cfg.snapshot.max_concurrent_stats = 0;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"retry.delay_ms"));
        assert!(fields.contains(&"busy.attempts"));
        assert!(fields.contains(&"busy.interval_ms"));
        assert!(fields.contains(&"trash.purge_interval_minutes"));
        assert!(fields.contains(&"snapshot.max_concurrent_stats"));
    }

    #[test]
    fn validate_allows_zero_retries_and_retention() {
        let mut cfg = Config::default();
        cfg.retry.max_retries = 0;
        cfg.trash.retention_days = 0;
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_catches_dotted_extension() {
        let mut cfg = Config::default();
        cfg.ignore.extensions.push(".bak".to_string());
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "ignore.extensions"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let mut cfg = Config::default();
            cfg.logging.level = level.to_string();
            assert!(
                !cfg.validate().iter().any(|e| e.field == "logging.level"),
                "level '{level}' should be valid"
            );
        }
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .retry_max_retries(2)
            .retry_delay_ms(1)
            .busy_attempts(4)
            .busy_interval_ms(2)
            .trash_retention_days(1)
            .trash_purge_interval_minutes(5)
            .snapshot_max_concurrent_stats(8)
            .snapshot_exclude_dot_default(false)
            .logging_level("warn")
            .store_database(PathBuf::from("/tmp/x.db"))
            .build();
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.retry.delay_ms, 1);
        assert_eq!(cfg.busy.attempts, 4);
        assert_eq!(cfg.busy.interval_ms, 2);
        assert_eq!(cfg.trash.retention_days, 1);
        assert_eq!(cfg.trash.purge_interval_minutes, 5);
        assert_eq!(cfg.snapshot.max_concurrent_stats, 8);
        assert!(!cfg.snapshot.exclude_dot_default);
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.store.database, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn builder_validated_rejects_invalid() {
        let result = ConfigBuilder::new().logging_level("loud").build_validated();
        assert!(result.is_err());

        let ok = ConfigBuilder::new().build_validated();
        assert!(ok.is_ok());
    }
}
