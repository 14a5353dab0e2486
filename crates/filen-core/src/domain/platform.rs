//! Operating system family identification
//!
//! Only path/name length ceilings and the reserved system directory name
//! depend on the platform.

use serde::{Deserialize, Serialize};

/// OS family the process runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    /// Platform of the running process
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }

    /// Longest accepted absolute path
    pub fn max_path_length(&self) -> usize {
        match self {
            Platform::Linux => 4095,
            Platform::MacOs => 1023,
            Platform::Windows | Platform::Other => 399,
        }
    }

    /// Longest accepted single name
    pub fn max_name_length(&self) -> usize {
        255
    }

    /// Length of `s` in the unit the platform limits are expressed in
    ///
    /// Linux and macOS count bytes, Windows counts UTF-16 code units.
    pub fn measure(&self, s: &str) -> usize {
        match self {
            Platform::Linux | Platform::MacOs => s.len(),
            Platform::Windows | Platform::Other => s.encode_utf16().count(),
        }
    }

    /// Directory name the OS reserves at volume roots; never walked
    pub fn reserved_dir_name(&self) -> Option<&'static str> {
        match self {
            Platform::Linux => Some("lost+found"),
            Platform::MacOs => Some(".Spotlight-V100"),
            Platform::Windows => Some("System Volume Information"),
            Platform::Other => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Other => "other",
        };
        f.write_str(name)
    }
}
