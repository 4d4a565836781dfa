//! The closed `{os} x {arch}` grid the native and container engines can
//! target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Os {
    Linux,
    Windows,
    Darwin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Os::Linux => "linux",
            Os::Windows => "windows",
            Os::Darwin => "darwin",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        };
        f.write_str(s)
    }
}

/// A `{os, arch}` pair drawn from the closed, enumerated support matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// The platform of the machine running this process.
    ///
    /// # Errors
    /// Returns [`VersionError::UnsupportedPlatform`] if the host OS/arch is
    /// outside the closed support matrix.
    pub fn host() -> Result<Self, VersionError> {
        Platform::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// # Errors
    /// Returns [`VersionError::UnsupportedPlatform`] if `os`/`arch` are not
    /// both members of the closed support matrix.
    pub fn new(os: &str, arch: &str) -> Result<Self, VersionError> {
        let os = match os {
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            "darwin" | "macos" => Os::Darwin,
            _ => {
                return Err(VersionError::UnsupportedPlatform {
                    os: os.to_owned(),
                    arch: arch.to_owned(),
                })
            }
        };
        let arch = match arch {
            "amd64" | "x86_64" => Arch::Amd64,
            "arm64" | "aarch64" => Arch::Arm64,
            _ => {
                return Err(VersionError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_owned(),
                })
            }
        };
        Ok(Platform { os, arch })
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        matches!(self.os, Os::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s.split_once('/').ok_or_else(|| VersionError::InvalidPlatform {
            raw: s.to_owned(),
        })?;
        Platform::new(os, arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_supported_combinations() {
        for os in ["linux", "windows", "darwin"] {
            for arch in ["amd64", "arm64"] {
                let p: Platform = format!("{os}/{arch}").parse().unwrap();
                assert_eq!(p.to_string(), format!("{os}/{arch}"));
            }
        }
    }

    #[test]
    fn rejects_unsupported_os() {
        assert!(Platform::new("plan9", "amd64").is_err());
    }

    #[test]
    fn rejects_unsupported_arch() {
        assert!(Platform::new("linux", "riscv64").is_err());
    }

    #[test]
    fn rejects_malformed_textual_form() {
        assert!("linux-amd64".parse::<Platform>().is_err());
    }

    #[test]
    fn windows_detection() {
        let p: Platform = "windows/amd64".parse().unwrap();
        assert!(p.is_windows());
        let p: Platform = "linux/amd64".parse().unwrap();
        assert!(!p.is_windows());
    }
}
