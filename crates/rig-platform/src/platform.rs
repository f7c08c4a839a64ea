use std::fmt;

use serde::{Deserialize, Serialize};

/// The set of platforms a site descriptor or distro can target. Matches the
/// `platforms` default list in the source site configuration
/// (`["windows", "osx", "linux"]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Osx,
    Linux,
}

impl Platform {
    /// The platform this process is running on.
    pub fn current() -> Platform {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Osx
        } else {
            Platform::Linux
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Osx => "osx",
            Platform::Linux => "linux",
        }
    }

    pub fn from_name(name: &str) -> Option<Platform> {
        match name {
            "windows" => Some(Platform::Windows),
            "osx" => Some(Platform::Osx),
            "linux" => Some(Platform::Linux),
            _ => None,
        }
    }

    /// The script extension used when no explicit target is given for this
    /// platform: `.bat` on Windows, `.sh` elsewhere.
    pub fn default_script_ext(self) -> &'static str {
        match self {
            Platform::Windows => ".bat",
            Platform::Osx | Platform::Linux => ".sh",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalizes path separators to forward slashes, the form descriptor
/// authors write paths in regardless of target platform.
pub fn path_forward_slash(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for p in [Platform::Windows, Platform::Osx, Platform::Linux] {
            assert_eq!(Platform::from_name(p.name()), Some(p));
        }
    }

    #[test]
    fn forward_slash_normalizes_backslashes() {
        assert_eq!(path_forward_slash(r"C:\tools\maya"), "C:/tools/maya");
    }
}
