//! Script analyser (§4.2): a closed-world walk over local imports starting
//! from the entry script, extracting plugin imports and `use k6` version
//! directives.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use k6box_version::Constraint;
use regex::Regex;

use crate::dependency::Dependencies;
use crate::error::DepsError;

/// A filesystem-ish opener, so the analyser can be driven against a real
/// filesystem or an in-memory script tree in tests.
pub trait ScriptOpener {
    /// # Errors
    /// Returns [`DepsError::FileNotFound`] if `path` cannot be read.
    fn read(&self, path: &Path) -> Result<String, DepsError>;
}

/// The real, disk-backed opener.
#[derive(Debug, Default)]
pub struct FsOpener;

impl ScriptOpener for FsOpener {
    fn read(&self, path: &Path) -> Result<String, DepsError> {
        std::fs::read_to_string(path).map_err(|source| DepsError::FileNotFound {
            path: path.display().to_string(),
            source,
        })
    }
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*import\s+(?:[^"';]+?\s+from\s+)?["']([^"']+)["']\s*;?"#)
            .expect("static import regex is valid")
    })
}

fn require_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"require\(\s*["']([^"']+)["']\s*\)"#).expect("static require regex is valid")
    })
}

fn plugin_spec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^k6/x/([^/]+)").expect("static plugin-spec regex is valid"))
}

fn use_pragma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""use k6([^"]*)""#).expect("static use-pragma regex is valid"))
}

/// Step 1 of §4.2: a minimal ESM-to-CJS-ish textual rewrite normalising
/// `import "spec"` and `import x from "spec"` to `require("spec")` before
/// scanning. This is not a JS parser; dynamically constructed imports are
/// silently missed (§9 Open Question 2), by design.
fn normalize_imports(source: &str) -> String {
    import_re()
        .replace_all(source, |caps: &regex::Captures<'_>| format!("require(\"{}\")", &caps[1]))
        .into_owned()
}

/// Analyse `entry` (and, transitively, every local import it reaches) for
/// plugin dependencies and `use k6` version pins.
///
/// # Errors
/// Returns [`DepsError::FileNotFound`] if a referenced file is missing,
/// [`DepsError::ParseError`] if a pragma is malformed, or
/// [`DepsError::ConstraintConflict`] if two pragmas disagree.
pub fn analyse(opener: &dyn ScriptOpener, entry: &Path) -> Result<Dependencies, DepsError> {
    let mut deps = Dependencies::new();
    deps.add("k6", Constraint::any())?;
    let mut visited = HashSet::new();
    scan_file(opener, entry, &mut deps, &mut visited)?;
    Ok(deps)
}

fn scan_file(
    opener: &dyn ScriptOpener,
    path: &Path,
    deps: &mut Dependencies,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), DepsError> {
    if !visited.insert(path.to_path_buf()) {
        return Ok(());
    }

    let raw = opener.read(path)?;
    let normalized = normalize_imports(&raw);

    for caps in require_re().captures_iter(&normalized) {
        let spec = &caps[1];
        if let Some(local_path) = spec.strip_prefix('.') {
            let _ = local_path; // relative-ness already established by the `.` prefix check
            let joined = k6box_util::fs::join_relative(path, spec);
            scan_file(opener, &joined, deps, visited)?;
        } else if let Some(plugin_caps) = plugin_spec_re().captures(spec) {
            let slug = &plugin_caps[1];
            deps.add(&format!("k6/x/{slug}"), Constraint::any())?;
        }
    }

    for caps in use_pragma_re().captures_iter(&normalized) {
        let body = caps[1].trim();
        let (name, constraint) = parse_pragma(body, path)?;
        deps.add(&name, constraint)?;
    }

    Ok(())
}

/// Parse the body of a `"use k6 ..."` pragma (everything after `use k6`,
/// trimmed): either `[with <name>][ <constraints>]` pinning a plugin, or
/// bare `<constraints>` pinning the host.
fn parse_pragma(body: &str, path: &Path) -> Result<(String, Constraint), DepsError> {
    let (name, constraint_part) = if let Some(rest) = body.strip_prefix("with ") {
        let rest = rest.trim_start();
        match rest.split_once(char::is_whitespace) {
            Some((name, constraint)) => (name.to_owned(), constraint.trim()),
            None => (rest.to_owned(), ""),
        }
    } else {
        ("k6".to_owned(), body)
    };

    if name.is_empty() {
        return Err(DepsError::ParseError {
            path: path.display().to_string(),
            raw: body.to_owned(),
            reason: "`use k6 with` requires a plugin name".to_owned(),
        });
    }

    let constraint = Constraint::parse(constraint_part).map_err(|source| DepsError::ParseError {
        path: path.display().to_string(),
        raw: body.to_owned(),
        reason: source.to_string(),
    })?;

    Ok((name, constraint))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// An in-memory script tree, for tests that never touch the real
    /// filesystem.
    struct MapOpener(HashMap<PathBuf, String>, Mutex<usize>);

    impl MapOpener {
        fn new(files: &[(&str, &str)]) -> Self {
            let mut map = HashMap::new();
            for (path, content) in files {
                map.insert(PathBuf::from(path), (*content).to_owned());
            }
            MapOpener(map, Mutex::new(0))
        }
    }

    impl ScriptOpener for MapOpener {
        fn read(&self, path: &Path) -> Result<String, DepsError> {
            *self.1.lock().expect("test mutex poisoned") += 1;
            self.0.get(path).cloned().ok_or_else(|| DepsError::FileNotFound {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        }
    }

    #[test]
    fn plain_import_yields_wildcard_plugin_dep() {
        let opener = MapOpener::new(&[(
            "/scripts/a.js",
            r#"import "k6/x/faker"; export default function(){}"#,
        )]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert!(deps.get("k6").unwrap().constraint.is_wildcard());
        assert!(deps.get("k6/x/faker").unwrap().constraint.is_wildcard());
    }

    #[test]
    fn require_form_is_recognised_directly() {
        let opener = MapOpener::new(&[("/scripts/a.js", r#"require("k6/x/faker");"#)]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert!(deps.contains("k6/x/faker"));
    }

    #[test]
    fn pragma_pins_plugin_constraint() {
        let opener = MapOpener::new(&[(
            "/scripts/a.js",
            r#""use k6 with k6/x/faker ^0.3"; require("k6/x/faker");"#,
        )]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        let dep = deps.get("k6/x/faker").unwrap();
        assert!(dep.constraint.accepts(&"0.3.1".parse().unwrap()));
        assert!(!dep.constraint.accepts(&"0.4.0".parse().unwrap()));
    }

    #[test]
    fn pragma_pins_host_constraint() {
        let opener = MapOpener::new(&[("/scripts/a.js", r#""use k6 >=0.45";"#)]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        let dep = deps.get("k6").unwrap();
        assert!(dep.constraint.accepts(&"0.46.0".parse().unwrap()));
        assert!(!dep.constraint.accepts(&"0.44.0".parse().unwrap()));
    }

    #[test]
    fn recurses_into_relative_imports() {
        let opener = MapOpener::new(&[
            ("/scripts/a.js", r#"require("./lib/b.js");"#),
            ("/scripts/lib/b.js", r#"require("k6/x/faker");"#),
        ]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert!(deps.contains("k6/x/faker"));
    }

    #[test]
    fn import_cycle_does_not_infinite_loop() {
        let opener = MapOpener::new(&[
            ("/scripts/a.js", r#"require("./b.js");"#),
            ("/scripts/b.js", r#"require("./a.js"); require("k6/x/faker");"#),
        ]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert!(deps.contains("k6/x/faker"));
    }

    #[test]
    fn missing_entry_file_is_file_not_found() {
        let opener = MapOpener::new(&[]);
        let err = analyse(&opener, Path::new("/scripts/missing.js")).unwrap_err();
        assert!(matches!(err, DepsError::FileNotFound { .. }));
    }

    #[test]
    fn conflicting_pragmas_across_files_is_constraint_conflict() {
        let opener = MapOpener::new(&[
            (
                "/scripts/a.js",
                r#""use k6 >=0.50"; require("./b.js");"#,
            ),
            ("/scripts/b.js", r#""use k6 <0.45";"#),
        ]);
        let err = analyse(&opener, Path::new("/scripts/a.js")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(">=0.50"));
        assert!(msg.contains("<0.45"));
    }

    #[test]
    fn scans_each_file_at_most_once() {
        let opener = MapOpener::new(&[
            ("/scripts/a.js", r#"require("./shared.js"); require("./shared.js");"#),
            ("/scripts/shared.js", r#"require("k6/x/faker");"#),
        ]);
        analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert_eq!(*opener.1.lock().unwrap(), 2);
    }

    #[test]
    fn analyser_idempotence() {
        let opener = MapOpener::new(&[(
            "/scripts/a.js",
            r#""use k6 with k6/x/faker ^0.3"; require("k6/x/faker");"#,
        )]);
        let first = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        let second = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_plugin_require_is_ignored() {
        let opener = MapOpener::new(&[("/scripts/a.js", r#"require("k6/http");"#)]);
        let deps = analyse(&opener, Path::new("/scripts/a.js")).unwrap();
        assert_eq!(deps.len(), 1); // only the implicit host dep
    }
}
