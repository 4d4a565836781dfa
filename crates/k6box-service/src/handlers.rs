//! Route handler for the build service (§4.8).
//!
//! The resolver and builder are both fully synchronous (ureq, subprocess
//! exec); every request runs its resolve/build work inside
//! `spawn_blocking` rather than pulling an async HTTP client and an
//! async process-exec crate into the dependency graph just for this one
//! component. A panic inside that blocking task surfaces as a
//! `JoinError`, which this handler turns into a `500` instead of taking
//! the whole server down.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use k6box_deps::Dependencies;
use k6box_version::artifact::{parse_list, sort_canonical, HOST_NAME};
use k6box_version::canonical::{canonical_path, etag};
use k6box_version::{Artifact, Module, Modules, Platform};

use crate::error::ServiceError;
use crate::AppState;

pub async fn handle_build(
    State(state): State<Arc<AppState>>,
    Path((os, arch, artifacts)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let platform = Platform::new(&os, &arch).map_err(|e| ServiceError::InvalidInput { reason: e.to_string() })?;

    if let Ok(strict) = parse_list(&artifacts) {
        return handle_strict(state, platform, strict, &headers).await;
    }

    let loose = parse_loose(&artifacts)?;
    handle_loose(state, platform, loose).await
}

async fn handle_strict(
    state: Arc<AppState>,
    platform: Platform,
    artifacts: Vec<Artifact>,
    headers: &HeaderMap,
) -> Result<Response, ServiceError> {
    if !artifacts.iter().any(|a| a.name == HOST_NAME) {
        return Err(ServiceError::InvalidInput {
            reason: "artifact list must include the host (`k6`)".to_owned(),
        });
    }
    let requested_path = format!(
        "/{platform}/{}",
        artifacts.iter().map(std::string::ToString::to_string).collect::<Vec<_>>().join(",")
    );

    let mut artifacts = artifacts;
    sort_canonical(&mut artifacts);
    let canon_path = canonical_path(&platform, &artifacts);

    if requested_path != canon_path {
        return Ok(redirect_permanent(&canon_path));
    }

    let tag = etag(&canon_path);
    if if_none_match_equals(headers, &tag) {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let modules = resolve_pinned(&state, &artifacts).await?;
    let bytes = build_artifact(&state, platform, modules).await?;
    Ok(success_response(&platform, &tag, bytes))
}

/// The wire format carries only `name@version`, never a source path
/// (§6 "Build-service wire format"), so even a strict, fully-pinned
/// request needs a registry round trip to learn each plugin's source
/// path. Each artifact's version is turned into an exact (`=<version>`)
/// constraint so the resolver's usual "find a release satisfying this"
/// path both confirms the pin is a real release and fills in `path`.
async fn resolve_pinned(state: &AppState, artifacts: &[Artifact]) -> Result<Modules, ServiceError> {
    let mut deps = Dependencies::new();
    for artifact in artifacts {
        let constraint = k6box_version::Constraint::parse(&format!("={}", artifact.version))
            .map_err(|e| ServiceError::InvalidInput { reason: e.to_string() })?;
        deps.add(&artifact.name, constraint).map_err(|e| ServiceError::InvalidInput { reason: e.to_string() })?;
    }

    let resolver = Arc::clone(&state.resolver);
    let modules = tokio::task::spawn_blocking(move || resolver.resolve(&deps))
        .await
        .map_err(|e| ServiceError::Internal {
            reason: format!("resolution task panicked: {e}"),
        })??;
    Ok(modules)
}

async fn handle_loose(state: Arc<AppState>, platform: Platform, deps: Dependencies) -> Result<Response, ServiceError> {
    let resolver = Arc::clone(&state.resolver);
    let modules = tokio::task::spawn_blocking(move || resolver.resolve(&deps))
        .await
        .map_err(|e| ServiceError::Internal {
            reason: format!("resolution task panicked: {e}"),
        })??;

    let artifacts: Vec<Artifact> = modules.iter().filter_map(Module::artifact).collect();
    let canon_path = canonical_path(&platform, &artifacts);

    let mut response = Redirect::temporary(&canon_path).into_response();
    response
        .headers_mut()
        .insert("cache-control", "no-cache,no-store".parse().expect("static header value is valid"));
    Ok(response)
}

async fn build_artifact(state: &AppState, platform: Platform, modules: Modules) -> Result<Vec<u8>, ServiceError> {
    let builder = Arc::clone(&state.builder);
    let bytes = tokio::task::spawn_blocking(move || {
        let ctx = k6box_builder::BuildContext::new().with_platform(platform);
        let mut buffer = Vec::new();
        builder.build(&ctx, &modules, &mut buffer)?;
        Ok::<_, k6box_builder::BuilderError>(buffer)
    })
    .await
    .map_err(|e| ServiceError::Internal {
        reason: format!("build task panicked: {e}"),
    })??;
    Ok(bytes)
}

fn success_response(platform: &Platform, tag: &str, body: Vec<u8>) -> Response {
    let filename = if platform.is_windows() { "k6.exe" } else { "k6" };
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        "application/octet-stream".parse().expect("static header value is valid"),
    );
    headers.insert("etag", tag.parse().expect("etag is a valid header value"));
    headers.insert(
        axum::http::header::CACHE_CONTROL,
        "public, max-age=3600, immutable, stale-while-revalidate=600, stale-if-error=600"
            .parse()
            .expect("static header value is valid"),
    );
    headers.insert(
        axum::http::header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\"")
            .parse()
            .expect("header value is valid"),
    );
    response
}

fn redirect_permanent(path: &str) -> Response {
    let mut response = Redirect::permanent(path).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        "public, max-age=31536000, immutable".parse().expect("static header value is valid"),
    );
    response
}

fn if_none_match_equals(headers: &HeaderMap, tag: &str) -> bool {
    headers
        .get(axum::http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == tag)
}

fn parse_loose(artifacts: &str) -> Result<Dependencies, ServiceError> {
    let mut deps = Dependencies::new();
    for part in artifacts.split(',') {
        let (name, constraint) = Artifact::parse_loose(part).map_err(|e| ServiceError::InvalidInput {
            reason: e.to_string(),
        })?;
        deps.add(&name, constraint).map_err(|e| ServiceError::InvalidInput {
            reason: e.to_string(),
        })?;
    }
    if deps.is_empty() {
        return Err(ServiceError::InvalidInput {
            reason: "empty artifact list".to_owned(),
        });
    }
    if !deps.contains(HOST_NAME) {
        deps.add_optional(HOST_NAME, k6box_version::Constraint::any());
    }
    Ok(deps)
}
