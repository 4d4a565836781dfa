//! The per-invocation build context: target platform and developer
//! module-path overrides.
//!
//! §9 "Context-carried replacements" resolves to an explicit struct field
//! threaded through the `Builder` trait rather than a dynamically-typed
//! context-value bag — Rust has no idiomatic equivalent of the latter, and
//! an explicit field is the natural substitute.

use k6box_version::Platform;

/// A developer override redirecting a module's source to a local path.
/// Recognised only by the native engine; the container and service
/// engines ignore replacements entirely (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub name: String,
    pub path: String,
}

impl Replacement {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Replacement {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Parse a `--replace name=path` flag value.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, path) = raw.split_once('=')?;
        if name.is_empty() || path.is_empty() {
            return None;
        }
        Some(Replacement::new(name, path))
    }
}

/// Threaded through every `Builder::build` call.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub platform: Option<Platform>,
    pub replacements: Vec<Replacement>,
}

impl BuildContext {
    #[must_use]
    pub fn new() -> Self {
        BuildContext::default()
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn with_replacements(mut self, replacements: Vec<Replacement>) -> Self {
        self.replacements = replacements;
        self
    }

    /// # Errors
    /// Returns [`k6box_version::VersionError::UnsupportedPlatform`] if no
    /// explicit platform was set and the host platform falls outside the
    /// closed support matrix.
    pub fn resolve_platform(&self) -> Result<Platform, k6box_version::VersionError> {
        match self.platform {
            Some(p) => Ok(p),
            None => Platform::host(),
        }
    }
}
