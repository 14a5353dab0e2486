//! Domain entities
//!
//! - Normalized paths and location identifiers
//! - Stat results produced by the filesystem layer
//! - Directory tree snapshots
//! - Sync locations
//! - Issues reported during scans
//! - Platform identification
//!
//! ```
//! use std::time::{Duration, UNIX_EPOCH};
//! use filen_core::domain::system_time_ms;
//!
//! assert_eq!(system_time_ms(UNIX_EPOCH + Duration::from_secs(2)), 2000);
//! ```

pub mod errors;
pub mod issue;
pub mod location;
pub mod newtypes;
pub mod platform;
pub mod stat;
pub mod tree;

pub use errors::DomainError;
pub use issue::{Issue, IssueSeverity, IssueSource};
pub use location::{SyncLocation, TRASH_DIR_NAME};
pub use newtypes::{LocationId, NormalizedPath};
pub use platform::Platform;
pub use stat::{system_time_ms, StatResult};
pub use tree::{DirectoryTree, EntryKind, InodeRef, TreeEntry};
