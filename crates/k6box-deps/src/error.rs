//! Error taxonomy for script analysis (§7 *script-error*).

#[derive(Debug, thiserror::Error)]
pub enum DepsError {
    #[error("cannot read script {path}: {source}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse `use k6` pragma `{raw}` in {path}: {reason}")]
    ParseError {
        path: String,
        raw: String,
        reason: String,
    },

    #[error("conflicting constraints for `{name}`: `{a}` vs `{b}`")]
    ConstraintConflict { name: String, a: String, b: String },
}
