//! Container build engine (§4.7.2): shells out to the `docker` CLI
//! exactly as a user would at a terminal — there is no Docker Engine API
//! client in this dependency stack, so every step here is a
//! `std::process::Command` invocation, and `docker cp` does the
//! tar-stream handling internally rather than needing a `tar`/`flate2`
//! crate on this side (SPEC_FULL.md §4.7.2, §10.5).

use std::io::Write;
use std::process::Command;

use k6box_util::process::run_command;
use k6box_version::artifact::HOST_NAME;
use k6box_version::Modules;

use crate::builder::{Builder, EngineKind};
use crate::context::BuildContext;
use crate::error::BuilderError;

const BUILDER_IMAGE: &str = "grafana/xk6";

pub struct ContainerEngine {
    docker_path: std::path::PathBuf,
}

impl ContainerEngine {
    /// Operational iff a `docker` binary is on `PATH` and the daemon
    /// answers `docker info` (§4.7.2).
    #[must_use]
    pub fn detect() -> Option<Self> {
        let docker_path = which::which("docker").ok()?;
        let mut cmd = Command::new(&docker_path);
        cmd.arg("info");
        let output = run_command(&mut cmd).ok()?;
        if output.success {
            Some(ContainerEngine { docker_path })
        } else {
            None
        }
    }

    fn docker(&self) -> Command {
        Command::new(&self.docker_path)
    }
}

/// RAII guard that unconditionally removes the scratch container on
/// drop, win or lose: the container is torn down regardless of build
/// outcome (§4.7.2, §9 "RAII replaces unconditional teardown").
struct ContainerGuard<'a> {
    engine: &'a ContainerEngine,
    id: String,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        let mut cmd = self.engine.docker();
        cmd.args(["rm", "-f", &self.id]);
        if let Err(err) = run_command(&mut cmd) {
            tracing::warn!(container = %self.id, error = %err, "failed to remove scratch container");
        }
    }
}

impl Builder for ContainerEngine {
    fn engine(&self) -> EngineKind {
        EngineKind::Container
    }

    fn build(&self, ctx: &BuildContext, modules: &Modules, sink: &mut dyn Write) -> Result<(), BuilderError> {
        let platform = ctx.resolve_platform()?;
        let host = modules.get(HOST_NAME).and_then(|m| m.version.as_ref()).ok_or_else(|| {
            BuilderError::ContainerStep {
                step: "plan".to_owned(),
                message: "host module is unresolved or unpinned".to_owned(),
            }
        })?;

        let mut create = self.docker();
        create
            .args(["create", "-e"])
            .arg(format!("GOOS={}", platform.os))
            .arg("-e")
            .arg(format!("GOARCH={}", platform.arch))
            .arg(BUILDER_IMAGE)
            .arg("build")
            .arg(format!("{HOST_NAME}@v{host}"));

        for module in modules.iter() {
            if module.name == HOST_NAME {
                continue;
            }
            let Some(version) = &module.version else {
                continue;
            };
            create.arg("--with").arg(format!("{}@v{version}", module.path));
        }

        let created = run_command(&mut create)?;
        if !created.success {
            return Err(BuilderError::ContainerStep {
                step: "create".to_owned(),
                message: created.stderr,
            });
        }
        let container_id = created.stdout.trim().to_owned();
        if container_id.is_empty() {
            return Err(BuilderError::ContainerStep {
                step: "create".to_owned(),
                message: "docker create produced no container id".to_owned(),
            });
        }
        let guard = ContainerGuard {
            engine: self,
            id: container_id.clone(),
        };

        let mut start = self.docker();
        start.args(["start", "-a", &container_id]);
        let started = run_command(&mut start)?;
        if !started.success {
            let mut logs = self.docker();
            logs.args(["logs", &container_id]);
            let captured = run_command(&mut logs).map(|o| o.stdout).unwrap_or_default();
            drop(guard);
            return Err(BuilderError::ContainerStep {
                step: "start".to_owned(),
                message: if captured.is_empty() { started.stderr } else { captured },
            });
        }

        let extract_dir = tempfile::tempdir().map_err(|source| BuilderError::Io {
            path: "container-engine extraction directory".to_owned(),
            source,
        })?;
        let output_name = if platform.is_windows() { "k6.exe" } else { "k6" };
        let container_src = format!("{container_id}:/build/{output_name}");
        let host_dest = extract_dir.path().join(output_name);

        let mut cp = self.docker();
        cp.arg("cp").arg(&container_src).arg(&host_dest);
        let copied = run_command(&mut cp)?;
        if !copied.success {
            drop(guard);
            return Err(BuilderError::ContainerStep {
                step: "cp".to_owned(),
                message: copied.stderr,
            });
        }

        drop(guard);

        let bytes = std::fs::read(&host_dest).map_err(|source| BuilderError::Io {
            path: host_dest.display().to_string(),
            source,
        })?;
        sink.write_all(&bytes).map_err(|source| BuilderError::Io {
            path: "build output sink".to_owned(),
            source,
        })?;

        Ok(())
    }
}
