//! Native build engine (§4.7.1): operational when a Go toolchain and
//! `git` are both on `PATH`. Assembles a scratch module directory — a
//! generated `go.mod`/`main.go` pair requiring the host and every
//! extension module at its resolved version, with `replace` directives
//! for any [`Replacement`] — and drives `go build` with `GOOS`/`GOARCH`
//! set from the target platform, the same way the upstream `xk6` build
//! library does internally (SPEC_FULL.md §4.7.1).

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use k6box_util::process::run_command;
use k6box_version::artifact::HOST_NAME;
use k6box_version::Modules;

use crate::builder::{Builder, EngineKind};
use crate::context::{BuildContext, Replacement};
use crate::error::BuilderError;

const GO_DIRECTIVE: &str = "go 1.22";
const MODULE_NAME: &str = "k6box.invalid/build";

pub struct NativeEngine {
    go_path: PathBuf,
    git_path: PathBuf,
}

impl NativeEngine {
    /// Operational iff both `go` and `git` can be located on `PATH`
    /// (§4.7.1).
    #[must_use]
    pub fn detect() -> Option<Self> {
        let go_path = which::which("go").ok()?;
        let git_path = which::which("git").ok()?;
        Some(NativeEngine { go_path, git_path })
    }
}

impl Builder for NativeEngine {
    fn engine(&self) -> EngineKind {
        EngineKind::Native
    }

    fn build(&self, ctx: &BuildContext, modules: &Modules, sink: &mut dyn Write) -> Result<(), BuilderError> {
        let platform = ctx.resolve_platform()?;
        let host = modules.get(HOST_NAME).ok_or_else(|| BuilderError::ToolchainFailed {
            message: "modules set has no host (k6) entry".to_owned(),
        })?;
        if host.version.is_none() {
            return Err(BuilderError::ToolchainFailed {
                message: "host module is unpinned".to_owned(),
            });
        }

        let scratch = tempfile::tempdir().map_err(|source| BuilderError::Io {
            path: "native-engine scratch directory".to_owned(),
            source,
        })?;
        let scratch_path = scratch.path();

        std::fs::write(scratch_path.join("go.mod"), generate_go_mod(modules, &ctx.replacements)).map_err(|source| {
            BuilderError::Io {
                path: scratch_path.join("go.mod").display().to_string(),
                source,
            }
        })?;
        std::fs::write(scratch_path.join("main.go"), generate_main_go(modules)).map_err(|source| BuilderError::Io {
            path: scratch_path.join("main.go").display().to_string(),
            source,
        })?;

        let output_name = if platform.is_windows() { "k6box-build.exe" } else { "k6box-build" };
        let output_path = scratch_path.join(output_name);

        // `git` itself is never invoked directly here; its presence on
        // PATH is what lets `go build` fetch module sources over git.
        let _ = &self.git_path;

        let mut cmd = Command::new(&self.go_path);
        cmd.current_dir(scratch_path)
            .arg("build")
            .arg("-o")
            .arg(&output_path)
            .arg(".")
            .env("GOOS", platform.os.to_string())
            .env("GOARCH", platform.arch.to_string())
            .env("CGO_ENABLED", "0");

        let output = run_command(&mut cmd)?;

        // The toolchain's own log is noisy; route it to the debug
        // logger and drop stderr from the final error unless the build
        // actually failed (§4.7.1 "redirects the toolchain's standard
        // log to the application debug logger and silences stderr").
        for line in output.stdout.lines() {
            tracing::debug!(target: "k6box_builder::native", "{line}");
        }
        for line in output.stderr.lines() {
            tracing::debug!(target: "k6box_builder::native", "{line}");
        }

        if !output.success {
            return Err(BuilderError::ToolchainFailed {
                message: output.stderr,
            });
        }

        let bytes = std::fs::read(&output_path).map_err(|source| BuilderError::Io {
            path: output_path.display().to_string(),
            source,
        })?;
        sink.write_all(&bytes).map_err(|source| BuilderError::Io {
            path: "build output sink".to_owned(),
            source,
        })?;

        Ok(())
    }
}

/// Render the scratch `go.mod`: a `require` line per resolved module
/// (host included) and a `replace` directive per developer override.
fn generate_go_mod(modules: &Modules, replacements: &[Replacement]) -> String {
    let mut out = format!("module {MODULE_NAME}\n\n{GO_DIRECTIVE}\n\nrequire (\n");
    for module in sorted_with_host_first(modules) {
        if let Some(version) = &module.version {
            out.push_str(&format!("\t{} v{version}\n", module.path));
        }
    }
    out.push_str(")\n");

    if !replacements.is_empty() {
        out.push('\n');
        for replacement in replacements {
            let path = module_path_for(modules, &replacement.name).unwrap_or(&replacement.name);
            out.push_str(&format!("replace {path} => {}\n", replacement.path));
        }
    }
    out
}

fn module_path_for<'a>(modules: &'a Modules, name: &str) -> Option<&'a str> {
    modules.get(name).map(|m| m.path.as_str())
}

/// Render the scratch `main.go`: a blank import per extension module
/// (registering its `init()` side effects with the host) and a call into
/// the host's own command entry point.
fn generate_main_go(modules: &Modules) -> String {
    let mut imports = String::new();
    imports.push_str("\tk6cmd \"github.com/grafana/k6/cmd\"\n");
    for module in sorted_with_host_first(modules) {
        if module.name == HOST_NAME {
            continue;
        }
        imports.push_str(&format!("\t_ \"{}\"\n", module.path));
    }

    format!(
        "package main\n\nimport (\n{imports})\n\nfunc main() {{\n\tk6cmd.Execute()\n}}\n"
    )
}

fn sorted_with_host_first(modules: &Modules) -> Vec<&k6box_version::Module> {
    let mut list: Vec<&k6box_version::Module> = modules.iter().collect();
    list.sort_by(|a, b| match (a.name == HOST_NAME, b.name == HOST_NAME) {
        (true, true) | (false, false) => a.name.cmp(&b.name),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
    });
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use k6box_version::{Module, Version};

    fn sample_modules() -> Modules {
        let mut modules = Modules::new();
        modules.insert(Module::new(HOST_NAME, "github.com/grafana/k6").with_version(Version::parse("0.49.0").unwrap()));
        modules.insert(
            Module::new("k6/x/faker", "github.com/grafana/xk6-faker").with_version(Version::parse("0.3.1").unwrap()),
        );
        modules
    }

    #[test]
    fn go_mod_requires_host_and_extensions() {
        let rendered = generate_go_mod(&sample_modules(), &[]);
        assert!(rendered.contains("github.com/grafana/k6 v0.49.0"));
        assert!(rendered.contains("github.com/grafana/xk6-faker v0.3.1"));
        assert!(rendered.starts_with(&format!("module {MODULE_NAME}")));
    }

    #[test]
    fn go_mod_emits_replace_directive_for_override() {
        let replacements = vec![Replacement::new("k6/x/faker", "../local-faker")];
        let rendered = generate_go_mod(&sample_modules(), &replacements);
        assert!(rendered.contains("replace github.com/grafana/xk6-faker => ../local-faker"));
    }

    #[test]
    fn go_mod_has_no_replace_section_without_overrides() {
        let rendered = generate_go_mod(&sample_modules(), &[]);
        assert!(!rendered.contains("replace"));
    }

    #[test]
    fn main_go_imports_extensions_blank_and_calls_execute() {
        let rendered = generate_main_go(&sample_modules());
        assert!(rendered.contains("_ \"github.com/grafana/xk6-faker\""));
        assert!(rendered.contains("k6cmd.Execute()"));
        assert!(!rendered.contains("_ \"github.com/grafana/k6\""));
    }
}
