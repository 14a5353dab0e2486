//! File status snapshot produced by a successful stat

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Result of a successful `lstat` on a path
///
/// Symlinks are never followed: a link reports `is_symlink = true` with the
/// link's own size and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResult {
    pub is_directory: bool,
    pub is_symlink: bool,
    pub is_file: bool,
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch
    pub modified_at_ms: u64,
    /// Birth time in milliseconds since the Unix epoch, or the modification
    /// time when the filesystem does not report one
    pub created_at_ms: u64,
    /// Inode number (0 where the platform exposes none)
    pub inode: u64,
}

impl StatResult {
    /// Build a `StatResult` from `symlink_metadata` output.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        let modified_at_ms = metadata.modified().map(system_time_ms).unwrap_or(0);
        let created_at_ms = metadata
            .created()
            .map(system_time_ms)
            .unwrap_or(modified_at_ms);

        Self {
            is_directory: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            is_file: file_type.is_file(),
            size: metadata.len(),
            modified_at_ms,
            created_at_ms,
            inode: inode_of(metadata),
        }
    }
}

/// Milliseconds since the Unix epoch, clamped to zero for pre-epoch times
pub fn system_time_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn inode_of(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &Metadata) -> u64 {
    0
}
