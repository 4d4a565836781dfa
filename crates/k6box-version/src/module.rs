//! Resolved module identities.
//!
//! The upstream project has two historical, functionally-equivalent shapes
//! for this ("ingredients" and "modules" — see SPEC_FULL.md §9 and
//! DESIGN.md). This rewrite keeps exactly one: `Module { name, path,
//! version }`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::version::Version;

/// A resolved `(name, source-path, version?)` triple.
///
/// `path` is the source-repository location (`host/owner/repo`, e.g.
/// `github.com/grafana/xk6-faker`). A module without a version is a
/// "resolved path, unpinned" — the release finder left it unpinned because
/// its source had no tags yet, and the build engine will ask the toolchain
/// for `latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub path: String,
    pub version: Option<Version>,
}

impl Module {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            path: path.into(),
            version: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Convert to a fully pinned [`Artifact`] if a version is present.
    #[must_use]
    pub fn artifact(&self) -> Option<Artifact> {
        self.version
            .clone()
            .map(|v| Artifact::new(self.name.clone(), v))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{v} ({})", self.name, self.path),
            None => write!(f, "{} ({}, unpinned)", self.name, self.path),
        }
    }
}

/// A `name -> Module` map; keys are unique by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modules(BTreeMap<String, Module>);

impl Modules {
    #[must_use]
    pub fn new() -> Self {
        Modules(BTreeMap::new())
    }

    pub fn insert(&mut self, module: Module) {
        self.0.insert(module.name.clone(), module);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.0.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Does this set of modules resolve a `Dependencies` set? True iff
    /// every dependency name appears here with a non-nil version whose
    /// constraint check passes.
    ///
    /// Generic over the dependency map so `k6box-version` need not depend
    /// on `k6box-deps`'s `Dependency` type; callers pass an iterator of
    /// `(name, constraint-check-fn)`.
    #[must_use]
    pub fn resolves<'a>(
        &self,
        deps: impl IntoIterator<Item = (&'a str, &'a crate::constraint::Constraint)>,
    ) -> bool {
        deps.into_iter().all(|(name, constraint)| {
            self.get(name)
                .and_then(|m| m.version.as_ref())
                .is_some_and(|v| constraint.accepts(v))
        })
    }

    pub fn into_vec(self) -> Vec<Module> {
        self.0.into_values().collect()
    }
}

impl FromIterator<Module> for Modules {
    fn from_iter<T: IntoIterator<Item = Module>>(iter: T) -> Self {
        let mut m = Modules::new();
        for module in iter {
            m.insert(module);
        }
        m
    }
}
