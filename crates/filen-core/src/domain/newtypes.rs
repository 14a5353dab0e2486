//! Domain newtypes
//!
//! Strongly-typed wrappers for location identifiers and platform-independent
//! paths. Every path entering the filesystem layer is converted into a
//! [`NormalizedPath`] exactly once, at the boundary.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// LocationId
// ============================================================================

/// Unique identifier of a sync location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(Uuid);

impl LocationId {
    /// Create a new random LocationId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a LocationId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for LocationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("{s}: {e}")))
    }
}

impl From<Uuid> for LocationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// NormalizedPath
// ============================================================================

/// A platform-independent path string
///
/// Construction converts backslashes to forward slashes and collapses
/// redundant segments (`//`, `.`, resolvable `..`, trailing `/`). A leading
/// `//` (UNC share) is preserved. Normalization is idempotent.
///
/// # Example
///
/// ```
/// use filen_core::domain::NormalizedPath;
///
/// let p = NormalizedPath::new(r"C:\Users\me\.\Filen\\docs\");
/// assert_eq!(p.as_str(), "C:/Users/me/Filen/docs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// Normalize a raw path string
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    /// Normalize a filesystem path (lossy for non-UTF-8 names)
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    /// Borrow the normalized string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into a `PathBuf` usable with OS APIs
    ///
    /// Forward slashes are accepted as separators on every supported
    /// platform, so no conversion back is needed.
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Whether the path starts at a filesystem root
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/') || has_drive_prefix(&self.0)
    }

    /// Iterate over the non-empty segments of the path
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Final segment of the path, if any
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.segments()
            .last()
            .filter(|s| *s != "." && *s != ".." && !is_drive(s))
    }

    /// Parent path, if the path has more than one segment
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let idx = self.0.rfind('/')?;
        if idx == 0 {
            return if self.0.len() > 1 {
                Some(Self("/".to_string()))
            } else {
                None
            };
        }
        Some(Self::new(&self.0[..idx]))
    }

    /// Append a relative segment (or several, separated by `/`)
    #[must_use]
    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.0, segment.as_ref()))
    }

    /// Path of `self` relative to `root`, without a leading slash
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInSyncRoot` if `self` is not below `root`.
    pub fn relative_to(&self, root: &NormalizedPath) -> Result<String, DomainError> {
        let root_str = root.0.trim_end_matches('/');
        let rest = self
            .0
            .strip_prefix(root_str)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| {
                DomainError::PathNotInSyncRoot(format!("{} is not within {}", self.0, root.0))
            })?;
        Ok(rest.trim_start_matches('/').to_string())
    }
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn has_drive_prefix(path: &str) -> bool {
    path.split('/').next().is_some_and(is_drive)
}

fn normalize(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let unc = unified.starts_with("//") && !unified.starts_with("///");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." && !(segments.len() == 1 && is_drive(last)) => {
                    segments.pop();
                }
                Some(_) => {
                    if !absolute && !segments.first().is_some_and(|s| is_drive(s)) {
                        segments.push("..");
                    }
                }
                None => {
                    if !absolute {
                        segments.push("..");
                    }
                }
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (unc, absolute) {
        (true, _) => format!("//{joined}"),
        (false, true) => format!("/{joined}"),
        (false, false) if joined.is_empty() => ".".to_string(),
        (false, false) => joined,
    }
}

impl Display for NormalizedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NormalizedPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for NormalizedPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(path: PathBuf) -> Self {
        Self::from_path(&path)
    }
}

impl From<NormalizedPath> for String {
    fn from(path: NormalizedPath) -> Self {
        path.0
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
