//! Sync location: one local root paired with one remote folder

use serde::{Deserialize, Serialize};

use super::newtypes::{LocationId, NormalizedPath};

/// Name of the per-location trash directory, created inside the local root
pub const TRASH_DIR_NAME: &str = ".filen.trash.local";

/// A configured pairing of a local directory with a remote folder
///
/// Owned by the caller; the filesystem layer only reads `local_path` and
/// derives the trash directory from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLocation {
    pub uuid: LocationId,
    pub local_path: NormalizedPath,
    pub remote_folder_id: String,
}

impl SyncLocation {
    /// Creates a location with a fresh identifier
    pub fn new(local_path: impl Into<NormalizedPath>, remote_folder_id: impl Into<String>) -> Self {
        Self {
            uuid: LocationId::new(),
            local_path: local_path.into(),
            remote_folder_id: remote_folder_id.into(),
        }
    }

    /// `<local_path>/.filen.trash.local`
    pub fn trash_dir(&self) -> NormalizedPath {
        self.local_path.join(TRASH_DIR_NAME)
    }
}
