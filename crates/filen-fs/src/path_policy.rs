//! Path eligibility rules
//!
//! Pure predicates, no I/O. A snapshot entry is kept only when none of the
//! exclusion predicates fire (see [`PathPolicy::exclusion_reason`]).
//!
//! Segment-based checks (ignored names, dot paths, folder patterns) are
//! evaluated on the path relative to the sync root with a leading `/`;
//! system patterns and the path length ceiling see the absolute path.

use std::collections::HashSet;
use std::fmt;

use filen_core::config::IgnoreConfig;
use filen_core::domain::Platform;

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "aux", "con", "nul", "prn", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Names at or above this many characters are ignored outright
const MAX_IGNORED_NAME_CHARS: usize = 256;

/// The first exclusion rule that matched a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    PathTooLong,
    NameTooLong,
    SystemPath,
    ExcludedFolder,
    DefaultIgnored,
    DotPath,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExclusionReason::PathTooLong => "path exceeds the platform length limit",
            ExclusionReason::NameTooLong => "name exceeds the platform length limit",
            ExclusionReason::SystemPath => "path is inside a system location",
            ExclusionReason::ExcludedFolder => "path is inside an excluded folder",
            ExclusionReason::DefaultIgnored => "a path segment is ignored by default",
            ExclusionReason::DotPath => "dot files are excluded",
        };
        f.write_str(s)
    }
}

/// Compiled ignore lists plus the platform whose length limits apply
#[derive(Debug, Clone)]
pub struct PathPolicy {
    platform: Platform,
    ignored_names: HashSet<String>,
    ignored_extensions: HashSet<String>,
    folder_patterns: Vec<(String, String)>,
    system_patterns: Vec<(String, String)>,
}

fn with_lowercase(patterns: &[String]) -> Vec<(String, String)> {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| (p.clone(), p.to_lowercase()))
        .collect()
}

fn contains_any(path: &str, patterns: &[(String, String)]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let lower = path.to_lowercase();
    patterns
        .iter()
        .any(|(exact, lowered)| path.contains(exact.as_str()) || lower.contains(lowered.as_str()))
}

impl PathPolicy {
    pub fn new(ignore: &IgnoreConfig, platform: Platform) -> Self {
        Self {
            platform,
            ignored_names: ignore.names.iter().map(|n| n.trim().to_lowercase()).collect(),
            ignored_extensions: ignore
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            folder_patterns: with_lowercase(&ignore.folders),
            system_patterns: with_lowercase(&ignore.system_paths),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// True if `name` contains a reserved character or is a Windows device name
    ///
    /// The device check looks at the stem before the first `.`, so `con.txt`
    /// is reserved too.
    pub fn is_reserved_name(name: &str) -> bool {
        if name
            .chars()
            .any(|c| RESERVED_CHARS.contains(&c) || c.is_control())
        {
            return true;
        }
        let stem = name.split('.').next().unwrap_or(name).trim_end().to_lowercase();
        RESERVED_DEVICE_NAMES.contains(&stem.as_str())
    }

    /// True if every `/`-separated segment of `path` is not reserved
    pub fn is_valid_path(path: &str) -> bool {
        path.split('/')
            .filter(|s| !s.is_empty())
            .all(|segment| !Self::is_reserved_name(segment))
    }

    pub fn is_default_ignored_name(&self, name: &str) -> bool {
        let len = name.chars().count();
        if len == 0 || len >= MAX_IGNORED_NAME_CHARS {
            return true;
        }
        if name.starts_with(' ') || name.ends_with(' ') {
            return true;
        }
        if name.contains('\n') || name.contains('\r') {
            return true;
        }

        let lower = name.to_lowercase();
        if self.ignored_names.contains(lower.trim()) {
            return true;
        }
        if lower.starts_with(".~lock.") || lower.starts_with("~$") {
            return true;
        }
        if lower.ends_with(".tmp") || lower.ends_with(".temp") {
            return true;
        }

        match lower.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self.ignored_extensions.contains(ext),
            _ => false,
        }
    }

    pub fn is_default_ignored_path(&self, path: &str) -> bool {
        path.split('/')
            .filter(|s| !s.is_empty())
            .any(|segment| self.is_default_ignored_name(segment))
    }

    /// Substring match against the folder ignore list
    pub fn is_folder_excluded_by_path(&self, path: &str) -> bool {
        contains_any(path, &self.folder_patterns)
    }

    /// Substring match against the system path ignore list
    pub fn is_system_excluded_path(&self, path: &str) -> bool {
        contains_any(path, &self.system_patterns)
    }

    pub fn is_path_over_max_length(&self, path: &str) -> bool {
        self.platform.measure(path) > self.platform.max_path_length()
    }

    pub fn is_name_over_max_length(&self, name: &str) -> bool {
        self.platform.measure(name) > self.platform.max_name_length()
    }

    /// True if a segment starts with `.` or the path contains `/.`
    pub fn should_exclude_dot_paths(path: &str) -> bool {
        path.contains("/.") || path.split('/').any(|segment| segment.starts_with('.'))
    }

    /// Names the first exclusion rule that fires, if any
    ///
    /// `absolute` is the normalized absolute path, `relative` the path below
    /// the sync root (with or without a leading slash).
    pub fn exclusion_reason(
        &self,
        absolute: &str,
        relative: &str,
        exclude_dot: bool,
    ) -> Option<ExclusionReason> {
        let relative = format!("/{}", relative.trim_start_matches('/'));
        let name = relative.rsplit('/').next().unwrap_or_default();

        if self.is_path_over_max_length(absolute) {
            Some(ExclusionReason::PathTooLong)
        } else if self.is_name_over_max_length(name) {
            Some(ExclusionReason::NameTooLong)
        } else if self.is_system_excluded_path(absolute) {
            Some(ExclusionReason::SystemPath)
        } else if self.is_folder_excluded_by_path(&relative) {
            Some(ExclusionReason::ExcludedFolder)
        } else if self.is_default_ignored_path(&relative) {
            Some(ExclusionReason::DefaultIgnored)
        } else if exclude_dot && Self::should_exclude_dot_paths(&relative) {
            Some(ExclusionReason::DotPath)
        } else {
            None
        }
    }

    pub fn is_excluded(&self, absolute: &str, relative: &str, exclude_dot: bool) -> bool {
        self.exclusion_reason(absolute, relative, exclude_dot).is_some()
    }
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::new(&IgnoreConfig::default(), Platform::current())
    }
}
