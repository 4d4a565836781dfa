//! The launcher's umbrella error type (§7, §10.1). Every lower-level
//! error bubbles up into one of these variants via `#[from]`, and
//! `main` matches on the result only to pick an exit code and print a
//! single line — the mapping itself lives on [`LauncherError::exit_code`].

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("{reason}")]
    InvalidInput { reason: String },

    #[error("{0}")]
    Script(#[from] k6box_deps::DepsError),

    #[error("{0}")]
    Resolver(#[from] k6box_resolver::ResolverError),

    #[error("{0}")]
    Builder(#[from] k6box_builder::BuilderError),

    #[error("platform `{os}/{arch}` is not supported")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("{0}")]
    Util(#[from] k6box_util::error::UtilError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl From<k6box_version::VersionError> for LauncherError {
    fn from(source: k6box_version::VersionError) -> Self {
        LauncherError::InvalidInput {
            reason: source.to_string(),
        }
    }
}

impl LauncherError {
    /// Exit code taxonomy (§7): every launcher-reported failure exits
    /// `116` regardless of kind; the host binary's own exit code (when
    /// the launcher succeeds and the host binary itself fails at
    /// runtime) is forwarded separately in `main`, never routed through
    /// this type.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            LauncherError::InvalidInput { .. }
            | LauncherError::Script(_)
            | LauncherError::Resolver(_)
            | LauncherError::Builder(_)
            | LauncherError::UnsupportedPlatform { .. }
            | LauncherError::Util(_)
            | LauncherError::Io(_) => 116,
        }
    }
}
