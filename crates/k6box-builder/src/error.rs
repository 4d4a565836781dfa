//! Error taxonomy for build orchestration (§7 *builder-error*,
//! *unsupported-platform*).

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("no build engine is operational in this environment (tried: {tried})")]
    NoEngineAvailable { tried: String },

    #[error("native toolchain not found on PATH (looked for `go` and `git`)")]
    ToolchainNotFound,

    #[error("native build failed: {message}")]
    ToolchainFailed { message: String },

    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("container daemon unreachable")]
    ContainerUnavailable,

    #[error("container step `{step}` failed: {message}")]
    ContainerStep { step: String, message: String },

    #[error("build service request to {url} failed: {message}")]
    ServiceRequest { url: String, message: String },

    #[error("build service at {url} returned {status}: {message}")]
    ServiceStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("platform `{os}/{arch}` is not supported")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("preload is not supported with the service engine")]
    PreloadUnsupportedByService,

    #[error("{0}")]
    Util(#[from] k6box_util::error::UtilError),

    #[error("{0}")]
    Version(#[from] k6box_version::VersionError),

    #[error("cannot parse cache-probe output: {reason}")]
    ProbeParse { reason: String },
}
