//! Error types for `k6box-util`.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A command failed to execute.
    #[error("cannot execute command: {source}")]
    CommandExec {
        #[source]
        source: std::io::Error,
    },

    /// Cannot determine a platform-conventional directory (home, cache).
    #[error("cannot determine {kind} directory")]
    NoDir { kind: &'static str },
}
