//! Cache probe (§4.6): interrogate an existing host binary for its
//! embedded plugin manifest via a "self-describe" invocation, rather than
//! persisting a sidecar manifest alongside it (§9 "Probing the cache via
//! the product itself" — this keeps one source of truth and survives
//! manual replacement of the cached binary).

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use k6box_deps::Dependencies;
use k6box_util::process::run_command;
use k6box_version::{Constraint, Module, Modules, Version};

use crate::error::BuilderError;

const SELF_DESCRIBE_ARG: &str = "version";

fn host_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^k6\s+v(\S+)").expect("static host-line regex is valid"))
}

fn plugin_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(k6/x/\S+)\s+v(\S+)").expect("static plugin-line regex is valid")
    })
}

/// Run `path version` and parse its stdout into a `Modules` set
/// representing what is actually compiled into the binary.
///
/// # Errors
/// Returns a wrapped [`k6box_util::error::UtilError`] if the binary
/// cannot be executed, or [`BuilderError::ProbeParse`] if stdout doesn't
/// contain a recognisable host version line.
pub fn probe(path: &Path) -> Result<Modules, BuilderError> {
    let mut cmd = Command::new(path);
    cmd.arg(SELF_DESCRIBE_ARG);
    let output = run_command(&mut cmd)?;
    parse_self_describe(&output.stdout)
}

fn parse_self_describe(stdout: &str) -> Result<Modules, BuilderError> {
    let host_version = host_line_re()
        .captures(stdout)
        .and_then(|c| c.get(1))
        .and_then(|m| Version::parse(m.as_str()).ok())
        .ok_or_else(|| BuilderError::ProbeParse {
            reason: "no `k6 v<version>` line in self-describe output".to_owned(),
        })?;

    let mut modules = Modules::new();
    modules.insert(
        Module::new(k6box_version::artifact::HOST_NAME, "github.com/grafana/k6").with_version(host_version),
    );

    for caps in plugin_line_re().captures_iter(stdout) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let Some(version) = caps.get(2).and_then(|m| Version::parse(m.as_str()).ok()) else {
            continue;
        };
        modules.insert(Module::new(name, String::new()).with_version(version));
    }

    Ok(modules)
}

/// Fold a probed `Modules` set back into a `Dependencies` set as
/// "optional" additions (§4.2, §4.6): incidental plugins already
/// compiled into the binary don't disappear from the next build just
/// because the script didn't ask for them again.
pub fn enrich_from_probe(deps: &mut Dependencies, probed: &Modules) {
    for module in probed.iter() {
        deps.add_optional(&module.name, Constraint::any());
    }
}
