//! Error taxonomy for the version, constraint, artifact, module, and
//! platform grammars.

/// Errors raised while parsing or comparing the types in this crate.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("invalid version `{raw}`: {source}")]
    InvalidVersion {
        raw: String,
        #[source]
        source: semver::Error,
    },

    #[error("invalid constraint `{raw}`: {reason}")]
    InvalidConstraint { raw: String, reason: String },

    #[error("invalid artifact `{raw}`: expected `<name>@v<semver>`")]
    InvalidArtifact { raw: String },

    #[error("invalid module path `{raw}`: expected `<host>/<owner>/<repo>`")]
    InvalidModulePath { raw: String },

    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("invalid platform `{raw}`: expected `<os>/<arch>`")]
    InvalidPlatform { raw: String },

    #[error("duplicate name `{name}` with conflicting constraints: `{a}` vs `{b}`")]
    ConflictingConstraints { name: String, a: String, b: String },
}
