//! A totally ordered semantic version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;

/// A semantic version, formatted with a mandatory leading `v`.
///
/// Thin wrapper over [`semver::Version`]; the wrapping exists so the rest of
/// the workspace has one `Display`/`FromStr` pair that always agrees on the
/// `v<x>.<y>.<z>[-pre][+build]` textual form used by artifact and module
/// grammars (§3, §4.1 of the design).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(semver::Version);

impl Version {
    /// Parse a version string, tolerating an optional leading `v`.
    ///
    /// # Errors
    /// Returns [`VersionError::InvalidVersion`] if the remainder is not a
    /// valid semantic version.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let stripped = raw.strip_prefix('v').unwrap_or(raw);
        semver::Version::parse(stripped)
            .map(Version)
            .map_err(|source| VersionError::InvalidVersion {
                raw: raw.to_owned(),
                source,
            })
    }

    #[must_use]
    pub fn major(&self) -> u64 {
        self.0.major
    }

    #[must_use]
    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    #[must_use]
    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    #[must_use]
    pub fn inner(&self) -> &semver::Version {
        &self.0
    }
}

impl From<semver::Version> for Version {
    fn from(v: semver::Version) -> Self {
        Version(v)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_v_prefix() {
        assert_eq!(Version::parse("v1.2.3").unwrap(), Version::parse("1.2.3").unwrap());
    }

    #[test]
    fn formats_with_mandatory_v() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.to_string(), "v1.2.3");
    }

    #[test]
    fn formats_prerelease_and_build() {
        let v = Version::parse("v1.2.3-beta.1+build.5").unwrap();
        assert_eq!(v.to_string(), "v1.2.3-beta.1+build.5");
        assert!(v.is_prerelease());
    }

    #[test]
    fn rejects_malformed_version() {
        assert!(Version::parse("not-a-version").is_err());
        assert!(Version::parse("1.2").is_err());
    }

    #[test]
    fn ordering_is_transitive() {
        let a = Version::parse("0.2.0").unwrap();
        let b = Version::parse("0.3.1").unwrap();
        let c = Version::parse("0.4.0").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
    }

    #[test]
    fn prerelease_orders_before_release() {
        let pre = Version::parse("1.0.0-beta").unwrap();
        let release = Version::parse("1.0.0").unwrap();
        assert!(pre < release);
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let v = Version::parse("2.10.0").unwrap();
        let rendered = v.to_string();
        assert_eq!(Version::parse(&rendered).unwrap(), v);
    }
}
