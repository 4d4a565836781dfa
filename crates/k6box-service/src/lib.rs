#![forbid(unsafe_code)]
//! The HTTP build service (§4.8): wraps a [`k6box_resolver::Resolver`]
//! and a [`k6box_builder::Builder`] behind a small `axum` router, with
//! `tower`'s concurrency limit providing the bound §5 requires.
//!
//! Unlike the rest of this workspace, this crate is long-running and
//! network-facing, which is why it reaches for `axum`/`tokio`/`tower`
//! rather than the synchronous, subprocess-driven style the other
//! crates share — those crates' synchronous code still runs here, just
//! dispatched onto the blocking thread pool per request (§4.8, §10.1).

pub mod error;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;

use k6box_builder::Builder;
use k6box_resolver::Resolver;

/// Upper bound on how long a single request's write phase may take
/// before the server gives up on it (§5 "write 100s"). `axum::serve`
/// has no separate read-header/read-body timeout hook without an extra
/// hyper-server dependency, so this single request-wide timeout stands
/// in for all three fixed deadlines.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

pub struct AppState {
    resolver: Arc<Resolver>,
    builder: Arc<dyn Builder>,
}

impl AppState {
    #[must_use]
    pub fn new(resolver: Resolver, builder: Box<dyn Builder>) -> Self {
        AppState {
            resolver: Arc::new(resolver),
            builder: Arc::from(builder),
        }
    }
}

/// Build the service router: one route, `GET /:os/:arch/*artifacts`,
/// concurrency-limited to the host's CPU count (§5 "limits concurrent
/// connections to the CPU count").
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let concurrency = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);

    Router::new()
        .route("/:os/:arch/*artifacts", get(handlers::handle_build))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(concurrency))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Bind and serve until the process receives SIGINT (§5 "a process-wide
/// signal handler converts SIGINT into context cancellation").
///
/// # Errors
/// Returns an I/O error if the listener cannot bind, or if the server
/// itself fails.
pub async fn serve(addr: std::net::SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "build service listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight requests");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_limit_is_never_zero() {
        let concurrency = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        assert!(concurrency >= 1);
    }
}
