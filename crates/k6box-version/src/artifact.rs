//! Fully pinned artifact identities and the artifact-list canonicalisation
//! shared by the build service and its client (§4.8, §8 "cache-key
//! integrity").

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::VersionError;
use crate::version::Version;

/// A fully pinned `name@v<semver>` identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub version: Version,
}

impl Artifact {
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Artifact {
            name: name.into(),
            version,
        }
    }

    /// Strict parse: `<name>@v<semver>`, leading `v` mandatory.
    ///
    /// # Errors
    /// Returns [`VersionError::InvalidArtifact`] if the grammar or the
    /// embedded version is malformed.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let (name, version_part) = raw
            .split_once('@')
            .ok_or_else(|| VersionError::InvalidArtifact { raw: raw.to_owned() })?;
        if name.is_empty() || !version_part.starts_with('v') {
            return Err(VersionError::InvalidArtifact { raw: raw.to_owned() });
        }
        let version = Version::parse(version_part).map_err(|_| VersionError::InvalidArtifact {
            raw: raw.to_owned(),
        })?;
        Ok(Artifact {
            name: name.to_owned(),
            version,
        })
    }

    /// Loose parse: anything after `@` is a raw constraint string rather
    /// than a pinned semver. Returns `(name, constraint)` rather than a
    /// `Dependency`, so that `k6box-version` need not depend on
    /// `k6box-deps`; callers in `k6box-deps` wrap the pair.
    ///
    /// # Errors
    /// Returns [`VersionError::InvalidConstraint`] if the constraint half
    /// fails to parse.
    pub fn parse_loose(raw: &str) -> Result<(String, Constraint), VersionError> {
        match raw.split_once('@') {
            Some((name, constraint_part)) => {
                let constraint = Constraint::parse(constraint_part)?;
                Ok((name.to_owned(), constraint))
            }
            None => Ok((raw.to_owned(), Constraint::any())),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for Artifact {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Artifact::parse(s)
    }
}

/// The host's logical name, always sorted first in a canonical artifact
/// list (§4.8, §8 "sort stability of artifact lists").
pub const HOST_NAME: &str = "k6";

/// Sort a list of artifacts into canonical order: `k6` first, then
/// strictly lexicographic by name.
pub fn sort_canonical(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        match (a.name == HOST_NAME, b.name == HOST_NAME) {
            (true, true) | (false, false) => a.name.cmp(&b.name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
        }
    });
}

/// Render a canonical comma-separated artifact list, e.g.
/// `k6@v0.49.0,k6/x/faker@v0.3.1`.
#[must_use]
pub fn canonical_list(artifacts: &[Artifact]) -> String {
    let mut sorted = artifacts.to_vec();
    sort_canonical(&mut sorted);
    sorted
        .iter()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-separated artifact list back into `Artifact`s, in
/// whatever order the string gives; callers that need canonical order
/// should call [`sort_canonical`] on the result.
///
/// # Errors
/// Returns the first parse error encountered.
pub fn parse_list(raw: &str) -> Result<Vec<Artifact>, VersionError> {
    raw.split(',').map(Artifact::parse).collect()
}
