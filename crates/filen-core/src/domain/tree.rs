//! Directory tree snapshot types
//!
//! A [`DirectoryTree`] is the local half of the sync diff: every eligible
//! file and folder under a sync location, keyed by its path relative to the
//! location root, plus an inode index used to detect moves and renames by
//! identity rather than by path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A single file or folder recorded in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    /// Size in bytes (always 0 for folders)
    pub size: u64,
    /// Last modification time in milliseconds since the Unix epoch
    pub last_modified: u64,
    pub inode: u64,
}

/// Whether an indexed inode belongs to a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    /// Lowercase name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        }
    }
}

/// Inode index value: the kind and relative path owning an inode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeRef {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
}

/// Snapshot of a sync location's local directory tree
///
/// A path is recorded in at most one of `files` / `folders`; the insert
/// methods enforce this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryTree {
    pub files: HashMap<String, TreeEntry>,
    pub folders: HashMap<String, TreeEntry>,
    pub inode_index: HashMap<u64, InodeRef>,
}

impl DirectoryTree {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a file and indexes its inode
    ///
    /// # Errors
    /// Returns `DomainError::TreeKindConflict` if the path is already a folder.
    pub fn insert_file(&mut self, path: String, entry: TreeEntry) -> Result<(), DomainError> {
        if self.folders.contains_key(&path) {
            return Err(DomainError::TreeKindConflict {
                path,
                existing: EntryKind::Folder.as_str().to_string(),
            });
        }
        self.index(entry.inode, EntryKind::File, &path);
        self.files.insert(path, entry);
        Ok(())
    }

    /// Records a folder and indexes its inode
    ///
    /// # Errors
    /// Returns `DomainError::TreeKindConflict` if the path is already a file.
    pub fn insert_folder(&mut self, path: String, entry: TreeEntry) -> Result<(), DomainError> {
        if self.files.contains_key(&path) {
            return Err(DomainError::TreeKindConflict {
                path,
                existing: EntryKind::File.as_str().to_string(),
            });
        }
        self.index(entry.inode, EntryKind::Folder, &path);
        self.folders.insert(path, entry);
        Ok(())
    }

    // Inode 0 means the platform reported none.
    fn index(&mut self, inode: u64, kind: EntryKind, path: &str) {
        if inode == 0 {
            return;
        }
        self.inode_index.insert(
            inode,
            InodeRef {
                kind,
                path: path.to_string(),
            },
        );
    }

    /// Resolves an inode back to its kind and relative path
    pub fn lookup_inode(&self, inode: u64) -> Option<&InodeRef> {
        self.inode_index.get(&inode)
    }

    /// Looks a relative path up in either map
    pub fn get(&self, path: &str) -> Option<(EntryKind, &TreeEntry)> {
        self.files
            .get(path)
            .map(|e| (EntryKind::File, e))
            .or_else(|| self.folders.get(path).map(|e| (EntryKind::Folder, e)))
    }

    /// Total number of recorded entries
    pub fn len(&self) -> usize {
        self.files.len() + self.folders.len()
    }

    /// Returns true if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }

    /// Sum of all recorded file sizes
    pub fn total_file_bytes(&self) -> u64 {
        self.files.values().map(|e| e.size).sum()
    }
}
