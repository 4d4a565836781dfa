//! Error taxonomy for the build-service HTTP handler (§4.8, §7 policy:
//! "within the service, each kind maps to an HTTP status").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("malformed request: {reason}")]
    InvalidInput { reason: String },

    #[error("dependency resolution failed: {0}")]
    Resolve(#[from] k6box_resolver::ResolverError),

    #[error("build failed: {0}")]
    Build(#[from] k6box_builder::BuilderError),

    /// A handler's blocking task panicked (§7 *fatal*: "panic in a
    /// service handler, recovered to 500, logged with stack").
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Resolve(_) | ServiceError::Build(_) => StatusCode::PRECONDITION_FAILED,
            ServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "panic recovered in service handler");
        } else if status == StatusCode::PRECONDITION_FAILED {
            tracing::warn!(error = %self, "build request failed");
        }
        (status, self.to_string()).into_response()
    }
}
