//! Build-service engine (§4.7.3): fetches a pre-built artifact from a
//! remote build service instead of compiling locally. Gated by a DNS
//! TXT kill-switch so operators can disable it fleet-wide without a
//! client release.
//!
//! No async DNS resolver crate is in this dependency pool, so the
//! lookup shells out to the system resolver the same way the native
//! engine shells out to `go` and the cache probe shells out to the
//! cached binary: bound the wait on a helper thread rather than pull in
//! a resolver crate for one lookup.

use std::io::Write;
use std::process::Command;
use std::sync::mpsc;
use std::time::Duration;

use k6box_util::process::run_command;
use k6box_version::artifact::HOST_NAME;
use k6box_version::{Artifact, Modules};

use crate::builder::{Builder, EngineKind};
use crate::context::BuildContext;
use crate::error::BuilderError;

const DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const KILL_SWITCH_SENTINEL: &str = "disabled=true";

pub struct ServiceEngine {
    base_url: String,
}

impl ServiceEngine {
    /// Operational iff `base_url` is configured and the host named in it
    /// has not published the kill-switch TXT record (§4.7.3). A DNS
    /// lookup failure or timeout is treated as "not disabled" — the
    /// kill-switch is opt-in, not fail-closed.
    #[must_use]
    pub fn detect(base_url: Option<&str>) -> Option<Self> {
        let base_url = base_url?.to_owned();
        let host = url_host(&base_url)?;
        if kill_switch_active(&host) {
            return None;
        }
        Some(ServiceEngine { base_url })
    }
}

fn url_host(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host_port = without_scheme.split('/').next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_owned())
    }
}

/// Run `dig +short TXT <host>` on a helper thread, bounded to
/// [`DNS_LOOKUP_TIMEOUT`] regardless of the caller's own deadline.
fn kill_switch_active(host: &str) -> bool {
    let (tx, rx) = mpsc::channel();
    let host = host.to_owned();
    std::thread::spawn(move || {
        let mut cmd = Command::new("dig");
        cmd.args(["+short", "TXT", &host]);
        let result = run_command(&mut cmd).map(|o| o.stdout).unwrap_or_default();
        let _ = tx.send(result);
    });

    match rx.recv_timeout(DNS_LOOKUP_TIMEOUT) {
        Ok(output) => output.contains(KILL_SWITCH_SENTINEL),
        Err(_) => false,
    }
}

impl Builder for ServiceEngine {
    fn engine(&self) -> EngineKind {
        EngineKind::Service
    }

    fn build(&self, ctx: &BuildContext, modules: &Modules, sink: &mut dyn Write) -> Result<(), BuilderError> {
        let platform = ctx.resolve_platform()?;
        let artifacts = pinned_artifacts(modules)?;
        let path = k6box_version::canonical::canonical_path(&platform, &artifacts);
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));

        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_connect(Some(Duration::from_secs(10)))
                .timeout_global(Some(Duration::from_secs(120)))
                .build(),
        );

        match agent.get(&url).call() {
            Ok(resp) if resp.status().is_success() => {
                let mut body = resp.into_body();
                let mut reader = body.as_reader();
                std::io::copy(&mut reader, sink).map_err(|source| BuilderError::Io {
                    path: "build output sink".to_owned(),
                    source,
                })?;
                Ok(())
            }
            Ok(resp) => Err(BuilderError::ServiceStatus {
                url,
                status: resp.status().as_u16(),
                message: format!("unexpected status {}", resp.status()),
            }),
            Err(err) => Err(BuilderError::ServiceRequest {
                url,
                message: err.to_string(),
            }),
        }
    }
}

fn pinned_artifacts(modules: &Modules) -> Result<Vec<Artifact>, BuilderError> {
    if modules.get(HOST_NAME).is_none() {
        return Err(BuilderError::ServiceRequest {
            url: String::new(),
            message: "modules set has no host (k6) entry".to_owned(),
        });
    }
    modules
        .iter()
        .map(|m| {
            m.artifact().ok_or_else(|| BuilderError::ServiceRequest {
                url: String::new(),
                message: format!("module `{}` is unpinned; the service engine requires exact versions", m.name),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_host_strips_scheme_and_path() {
        assert_eq!(url_host("https://build.example.com/v1"), Some("build.example.com".to_owned()));
    }

    #[test]
    fn url_host_strips_port() {
        assert_eq!(url_host("http://build.example.com:8080"), Some("build.example.com".to_owned()));
    }

    #[test]
    fn url_host_rejects_empty() {
        assert_eq!(url_host("https://"), None);
    }

    #[test]
    fn kill_switch_sentinel_matches_exact_text() {
        assert!("\"disabled=true\"".contains(KILL_SWITCH_SENTINEL));
        assert!(!"\"disabled=false\"".contains(KILL_SWITCH_SENTINEL));
    }

    #[test]
    fn pinned_artifacts_rejects_unpinned_module() {
        let mut modules = Modules::new();
        modules.insert(k6box_version::Module::new(HOST_NAME, "github.com/grafana/k6"));
        assert!(pinned_artifacts(&modules).is_err());
    }

    #[test]
    fn pinned_artifacts_requires_host_entry() {
        let modules = Modules::new();
        assert!(pinned_artifacts(&modules).is_err());
    }

    #[test]
    fn pinned_artifacts_succeeds_when_fully_resolved() {
        let mut modules = Modules::new();
        modules.insert(
            k6box_version::Module::new(HOST_NAME, "github.com/grafana/k6")
                .with_version(k6box_version::Version::parse("0.49.0").unwrap()),
        );
        let artifacts = pinned_artifacts(&modules).unwrap();
        assert_eq!(artifacts.len(), 1);
    }
}
