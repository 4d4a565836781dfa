//! Version constraint grammar: atoms combined by AND (`,`) and OR (`||`).
//!
//! `semver::VersionReq` gives us version parsing and simple range matching,
//! but has no OR combinator, so the comma/pipe grammar is a small
//! hand-written AST parsed with plain string splitting rather than a
//! parser-combinator crate — the grammar is short enough not to earn one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;
use crate::version::Version;

/// A single comparison atom: an operator and the version it compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Atom {
    op: Op,
    version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Tilde,
    Caret,
}

/// An inclusive/exclusive bound used by interval-based conflict detection.
#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

/// An AND-group reduced to its lower/upper bound interval, for the purpose
/// of deciding whether two constraints can ever both be satisfied (§3
/// "conflicting non-wildcard constraints are an error").
struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Atom {
    /// Reduce this atom to the interval of versions it admits.
    fn interval(&self) -> Interval {
        let v = &self.version;
        match self.op {
            Op::Eq => Interval {
                lower: Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
                upper: Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
            },
            Op::Gt => Interval {
                lower: Some(Bound {
                    version: v.clone(),
                    inclusive: false,
                }),
                upper: None,
            },
            Op::Ge => Interval {
                lower: Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
                upper: None,
            },
            Op::Lt => Interval {
                lower: None,
                upper: Some(Bound {
                    version: v.clone(),
                    inclusive: false,
                }),
            },
            Op::Le => Interval {
                lower: None,
                upper: Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
            },
            Op::Tilde => {
                let mut next = v.inner().clone();
                next.minor += 1;
                next.patch = 0;
                next.pre = semver::Prerelease::EMPTY;
                next.build = semver::BuildMetadata::EMPTY;
                Interval {
                    lower: Some(Bound {
                        version: v.clone(),
                        inclusive: true,
                    }),
                    upper: Some(Bound {
                        version: Version::from(next),
                        inclusive: false,
                    }),
                }
            }
            Op::Caret => {
                let mut next = v.inner().clone();
                if next.major > 0 {
                    next.major += 1;
                    next.minor = 0;
                } else if next.minor > 0 {
                    next.minor += 1;
                } else {
                    next.patch += 1;
                }
                next.patch = if v.inner().major == 0 && v.inner().minor == 0 {
                    next.patch
                } else {
                    0
                };
                next.pre = semver::Prerelease::EMPTY;
                next.build = semver::BuildMetadata::EMPTY;
                Interval {
                    lower: Some(Bound {
                        version: v.clone(),
                        inclusive: true,
                    }),
                    upper: Some(Bound {
                        version: Version::from(next),
                        inclusive: false,
                    }),
                }
            }
        }
    }

    fn accepts(&self, v: &Version) -> bool {
        match self.op {
            Op::Eq => v == &self.version,
            Op::Gt => v > &self.version,
            Op::Ge => v >= &self.version,
            Op::Lt => v < &self.version,
            Op::Le => v <= &self.version,
            Op::Tilde => {
                let lo = &self.version;
                v >= lo && v.major() == lo.major() && v.minor() == lo.minor()
            }
            Op::Caret => {
                let lo = &self.version;
                if v < lo {
                    return false;
                }
                if lo.major() > 0 {
                    v.major() == lo.major()
                } else if lo.minor() > 0 {
                    v.major() == 0 && v.minor() == lo.minor()
                } else {
                    v.major() == 0 && v.minor() == 0 && v.patch() == lo.patch()
                }
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Eq => "=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Tilde => "~",
            Op::Caret => "^",
        };
        write!(f, "{op}{}", self.version)
    }
}

/// A boolean predicate on versions: `AND`-groups of atoms joined by `OR`.
///
/// A missing constraint (the empty string, or no `use k6` pragma at all) is
/// the wildcard `*`, which accepts every version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// `None` means wildcard: accepts anything.
    ors: Option<Vec<Vec<Atom>>>,
    raw: String,
}

impl Constraint {
    /// The wildcard constraint that accepts every version.
    #[must_use]
    pub fn any() -> Self {
        Constraint {
            ors: None,
            raw: "*".to_owned(),
        }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.ors.is_none()
    }

    /// Parse a constraint string such as `>=1.2.3,<2.0.0 || ^3.0.0`.
    ///
    /// # Errors
    /// Returns [`VersionError::InvalidConstraint`] if any atom fails to parse.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Constraint::any());
        }

        let mut ors = Vec::new();
        for or_part in trimmed.split("||") {
            let mut atoms = Vec::new();
            for and_part in or_part.split(',') {
                let and_part = and_part.trim();
                if and_part.is_empty() {
                    continue;
                }
                atoms.push(parse_atom(and_part, raw)?);
            }
            if atoms.is_empty() {
                return Err(VersionError::InvalidConstraint {
                    raw: raw.to_owned(),
                    reason: "empty AND-group".to_owned(),
                });
            }
            ors.push(atoms);
        }
        if ors.is_empty() {
            return Err(VersionError::InvalidConstraint {
                raw: raw.to_owned(),
                reason: "empty constraint".to_owned(),
            });
        }

        Ok(Constraint {
            ors: Some(ors),
            raw: trimmed.to_owned(),
        })
    }

    /// Check whether `v` satisfies this constraint.
    #[must_use]
    pub fn accepts(&self, v: &Version) -> bool {
        match &self.ors {
            None => true,
            Some(ors) => ors.iter().any(|and| and.iter().all(|a| a.accepts(v))),
        }
    }

    /// Intersect two constraints: the result accepts exactly the versions
    /// both accept. Wildcards are the identity element.
    ///
    /// # Errors
    /// Returns [`VersionError::ConflictingConstraints`] only at the call
    /// site (`Dependency::merge`), which has the dependency name for the
    /// error message; this method itself never fails — it just conjoins.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        match (&self.ors, &other.ors) {
            (None, None) => Constraint::any(),
            (None, Some(_)) => other.clone(),
            (Some(_), None) => self.clone(),
            (Some(a), Some(b)) => {
                let mut ors = Vec::with_capacity(a.len() * b.len());
                for and_a in a {
                    for and_b in b {
                        let mut combined = and_a.clone();
                        combined.extend(and_b.clone());
                        ors.push(combined);
                    }
                }
                Constraint {
                    ors: Some(ors),
                    raw: format!("{self} , {other}"),
                }
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Does this constraint admit no version at all once intersected with
    /// `other`? Two wildcards, or a wildcard and anything, never conflict;
    /// two non-wildcard constraints conflict iff every pair of their
    /// AND-groups reduces to an empty interval (§3 `Dependency` merge).
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        let (Some(a), Some(b)) = (&self.ors, &other.ors) else {
            return false;
        };
        a.iter()
            .all(|and_a| b.iter().all(|and_b| and_group_interval(and_a).intersect(&and_group_interval(and_b)).is_empty()))
    }
}

fn and_group_interval(atoms: &[Atom]) -> Interval {
    let mut combined = Interval {
        lower: None,
        upper: None,
    };
    for atom in atoms {
        combined = combined.intersect(&atom.interval());
    }
    combined
}

impl Interval {
    fn intersect(&self, other: &Self) -> Self {
        let lower = pick_tighter_lower(self.lower.as_ref(), other.lower.as_ref());
        let upper = pick_tighter_upper(self.upper.as_ref(), other.upper.as_ref());
        Interval { lower, upper }
    }

    fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => !(lo.inclusive && hi.inclusive),
                std::cmp::Ordering::Less => false,
            },
            _ => false,
        }
    }
}

fn pick_tighter_lower(a: Option<&Bound>, b: Option<&Bound>) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => Some(match x.version.cmp(&y.version) {
            std::cmp::Ordering::Greater => x.clone(),
            std::cmp::Ordering::Less => y.clone(),
            std::cmp::Ordering::Equal => Bound {
                version: x.version.clone(),
                inclusive: x.inclusive && y.inclusive,
            },
        }),
    }
}

fn pick_tighter_upper(a: Option<&Bound>, b: Option<&Bound>) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => Some(match x.version.cmp(&y.version) {
            std::cmp::Ordering::Less => x.clone(),
            std::cmp::Ordering::Greater => y.clone(),
            std::cmp::Ordering::Equal => Bound {
                version: x.version.clone(),
                inclusive: x.inclusive && y.inclusive,
            },
        }),
    }
}

fn parse_atom(spec: &str, full_raw: &str) -> Result<Atom, VersionError> {
    let (op, rest) = if let Some(rest) = spec.strip_prefix(">=") {
        (Op::Ge, rest)
    } else if let Some(rest) = spec.strip_prefix("<=") {
        (Op::Le, rest)
    } else if let Some(rest) = spec.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = spec.strip_prefix('<') {
        (Op::Lt, rest)
    } else if let Some(rest) = spec.strip_prefix('=') {
        (Op::Eq, rest)
    } else if let Some(rest) = spec.strip_prefix('~') {
        (Op::Tilde, rest)
    } else if let Some(rest) = spec.strip_prefix('^') {
        (Op::Caret, rest)
    } else {
        (Op::Eq, spec)
    };

    let version = Version::parse(rest.trim()).map_err(|_| VersionError::InvalidConstraint {
        raw: full_raw.to_owned(),
        reason: format!("`{spec}` is not a valid version atom"),
    })?;

    Ok(Atom { op, version })
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        Version::parse(s).expect("valid test version")
    }

    #[test]
    fn wildcard_accepts_everything() {
        let c = Constraint::any();
        assert!(c.accepts(&v("0.0.1")));
        assert!(c.accepts(&v("99.0.0")));
    }

    #[test]
    fn empty_string_parses_as_wildcard() {
        assert!(Constraint::parse("").unwrap().is_wildcard());
        assert!(Constraint::parse("*").unwrap().is_wildcard());
    }

    #[test]
    fn simple_ge() {
        let c = Constraint::parse(">=0.45.0").unwrap();
        assert!(c.accepts(&v("0.45.0")));
        assert!(c.accepts(&v("0.46.0")));
        assert!(!c.accepts(&v("0.44.9")));
    }

    #[test]
    fn and_combination() {
        let c = Constraint::parse(">=0.45,<0.50").unwrap();
        assert!(c.accepts(&v("0.45.0")));
        assert!(c.accepts(&v("0.49.9")));
        assert!(!c.accepts(&v("0.50.0")));
    }

    #[test]
    fn or_combination() {
        let c = Constraint::parse("=1.0.0 || =2.0.0").unwrap();
        assert!(c.accepts(&v("1.0.0")));
        assert!(c.accepts(&v("2.0.0")));
        assert!(!c.accepts(&v("1.5.0")));
    }

    #[test]
    fn tilde_admits_patch_range() {
        let c = Constraint::parse("~1.2.3").unwrap();
        assert!(c.accepts(&v("1.2.3")));
        assert!(c.accepts(&v("1.2.9")));
        assert!(!c.accepts(&v("1.3.0")));
    }

    #[test]
    fn caret_admits_minor_and_patch_range() {
        let c = Constraint::parse("^1.2.3").unwrap();
        assert!(c.accepts(&v("1.2.3")));
        assert!(c.accepts(&v("1.9.9")));
        assert!(!c.accepts(&v("2.0.0")));
    }

    #[test]
    fn caret_tightens_to_minor_for_zero_major() {
        let c = Constraint::parse("^0.3.0").unwrap();
        assert!(c.accepts(&v("0.3.9")));
        assert!(!c.accepts(&v("0.4.0")));
    }

    #[test]
    fn caret_tightens_to_patch_for_zero_major_and_minor() {
        let c = Constraint::parse("^0.0.3").unwrap();
        assert!(c.accepts(&v("0.0.3")));
        assert!(!c.accepts(&v("0.0.4")));
    }

    #[test]
    fn bare_version_means_equality() {
        let c = Constraint::parse("1.2.3").unwrap();
        assert!(c.accepts(&v("1.2.3")));
        assert!(!c.accepts(&v("1.2.4")));
    }

    #[test]
    fn intersect_with_wildcard_is_identity() {
        let c = Constraint::parse(">=1.0.0").unwrap();
        let merged = c.intersect(&Constraint::any());
        assert!(merged.accepts(&v("1.5.0")));
        assert!(!merged.accepts(&v("0.9.0")));
    }

    #[test]
    fn intersect_narrows_range() {
        let a = Constraint::parse(">=0.45").unwrap();
        let b = Constraint::parse("<0.50").unwrap();
        let merged = a.intersect(&b);
        assert!(merged.accepts(&v("0.47.0")));
        assert!(!merged.accepts(&v("0.50.0")));
        assert!(!merged.accepts(&v("0.44.0")));
    }

    #[test]
    fn rejects_malformed_atom() {
        assert!(Constraint::parse(">=not-a-version").is_err());
    }

    #[test]
    fn disjoint_ranges_conflict() {
        let a = Constraint::parse(">=0.50").unwrap();
        let b = Constraint::parse("<0.45").unwrap();
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn overlapping_ranges_do_not_conflict() {
        let a = Constraint::parse(">=0.45").unwrap();
        let b = Constraint::parse("<0.50").unwrap();
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn wildcard_never_conflicts() {
        let a = Constraint::any();
        let b = Constraint::parse(">=0.50").unwrap();
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn touching_bounds_do_not_conflict() {
        let a = Constraint::parse(">=0.45").unwrap();
        let b = Constraint::parse("<=0.45").unwrap();
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn or_clause_conflicts_only_if_every_pair_conflicts() {
        let a = Constraint::parse(">=0.50").unwrap();
        let b = Constraint::parse("<0.45 || >=0.50").unwrap();
        assert!(!a.conflicts_with(&b));
    }

    proptest! {
        /// Constraint monotonicity (§8): for c and v1 <= v2 both accepted by
        /// an AND-only range constraint, every v in between is accepted too.
        #[test]
        fn and_range_is_convex(
            major in 0u64..5, minor in 0u64..20, patch in 0u64..20,
            lo_bump in 0u64..10, hi_bump in 0u64..10,
        ) {
            let base = semver::Version::new(major, minor, patch);
            let lo = Version::from(base.clone());
            let mut hi_raw = base;
            hi_raw.patch += lo_bump + hi_bump + 1;
            let hi = Version::from(hi_raw);

            let c = Constraint::parse(&format!(">={lo},<={hi}")).unwrap();
            prop_assert!(c.accepts(&lo));
            prop_assert!(c.accepts(&hi));

            let mut mid_raw = lo.inner().clone();
            mid_raw.patch += lo_bump;
            let mid = Version::from(mid_raw);
            prop_assert!(mid >= lo && mid <= hi);
            prop_assert!(c.accepts(&mid));
        }
    }
}
