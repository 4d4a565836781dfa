//! `Dependency` / `Dependencies`: the output of script analysis, before
//! resolution to concrete modules.

use std::collections::BTreeMap;

use k6box_version::Constraint;

use crate::error::DepsError;

/// A single logical dependency: either the host (`"k6"`) or a plugin
/// import path / output-adapter name, with the accumulated constraint
/// from every `use k6` pragma and CLI `--with` flag that named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub constraint: Constraint,
}

impl Dependency {
    #[must_use]
    pub fn new(name: impl Into<String>, constraint: Constraint) -> Self {
        Dependency {
            name: name.into(),
            constraint,
        }
    }

    #[must_use]
    pub fn wildcard(name: impl Into<String>) -> Self {
        Dependency::new(name, Constraint::any())
    }

    /// Merge another constraint for the same name into this one by
    /// intersection. A conflict between two non-wildcard constraints that
    /// admit no common version is a hard error (§3).
    ///
    /// # Errors
    /// Returns [`DepsError::ConstraintConflict`] if the two constraints
    /// can never both be satisfied.
    pub fn merge(&mut self, other_constraint: &Constraint) -> Result<(), DepsError> {
        if self.constraint.conflicts_with(other_constraint) {
            return Err(DepsError::ConstraintConflict {
                name: self.name.clone(),
                a: self.constraint.to_string(),
                b: other_constraint.to_string(),
            });
        }
        self.constraint = self.constraint.intersect(other_constraint);
        Ok(())
    }
}

/// A `name -> Dependency` map with unique keys (§3 invariant).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies(BTreeMap<String, Dependency>);

impl Dependencies {
    #[must_use]
    pub fn new() -> Self {
        Dependencies(BTreeMap::new())
    }

    /// Add or merge a dependency by name.
    ///
    /// # Errors
    /// Returns [`DepsError::ConstraintConflict`] if a dependency with the
    /// same name already exists with an irreconcilable constraint.
    pub fn add(&mut self, name: &str, constraint: Constraint) -> Result<(), DepsError> {
        match self.0.get_mut(name) {
            Some(existing) => existing.merge(&constraint),
            None => {
                self.0.insert(name.to_owned(), Dependency::new(name, constraint));
                Ok(())
            }
        }
    }

    /// Add a dependency only if one doesn't already exist, without
    /// merging. Used by "optional enrichment" (§4.2): the caller is
    /// expected to have already checked the name exists via the resolver
    /// oracle before calling this.
    pub fn add_optional(&mut self, name: &str, constraint: Constraint) {
        self.0
            .entry(name.to_owned())
            .or_insert_with(|| Dependency::new(name, constraint));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
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

    /// Merge every dependency from `other` into `self`.
    ///
    /// # Errors
    /// Returns the first conflict encountered.
    pub fn merge_all(&mut self, other: &Dependencies) -> Result<(), DepsError> {
        for dep in other.iter() {
            self.add(&dep.name, dep.constraint.clone())?;
        }
        Ok(())
    }
}

impl IntoIterator for Dependencies {
    type Item = Dependency;
    type IntoIter = std::collections::btree_map::IntoValues<String, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_new_dependency() {
        let mut deps = Dependencies::new();
        deps.add("k6", Constraint::any()).unwrap();
        assert!(deps.contains("k6"));
    }

    #[test]
    fn merging_compatible_constraints_narrows() {
        let mut deps = Dependencies::new();
        deps.add("k6", Constraint::parse(">=0.45").unwrap()).unwrap();
        deps.add("k6", Constraint::parse("<0.50").unwrap()).unwrap();
        let dep = deps.get("k6").unwrap();
        assert!(dep.constraint.accepts(&"0.47.0".parse().unwrap()));
        assert!(!dep.constraint.accepts(&"0.50.0".parse().unwrap()));
    }

    #[test]
    fn merging_conflicting_constraints_errors() {
        let mut deps = Dependencies::new();
        deps.add("k6", Constraint::parse(">=0.50").unwrap()).unwrap();
        let err = deps.add("k6", Constraint::parse("<0.45").unwrap()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(">=0.50"));
        assert!(msg.contains("<0.45"));
    }

    #[test]
    fn optional_add_does_not_overwrite() {
        let mut deps = Dependencies::new();
        deps.add("k6/x/faker", Constraint::parse("^0.3").unwrap()).unwrap();
        deps.add_optional("k6/x/faker", Constraint::any());
        let dep = deps.get("k6/x/faker").unwrap();
        assert!(!dep.constraint.is_wildcard());
    }

    #[test]
    fn optional_add_inserts_when_absent() {
        let mut deps = Dependencies::new();
        deps.add_optional("k6/x/extra", Constraint::any());
        assert!(deps.contains("k6/x/extra"));
    }
}
