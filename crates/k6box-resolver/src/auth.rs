//! Bearer token resolution (§4.5): a fixed environment-variable
//! precedence, falling back to a local `gh`-compatible credential
//! helper located on `PATH` the same way a toolchain binary is located
//! via an env-var override before falling back to a `PATH` search.

use std::process::Command;

use k6box_util::process::run_command;

use crate::error::ResolverError;

const ENV_PRECEDENCE: [&str; 3] = ["APP_GITHUB_TOKEN", "GH_TOKEN", "GITHUB_TOKEN"];

/// Resolve a bearer token from environment, falling back to `gh auth
/// token`. Returns `Ok(None)` rather than an error when no token can be
/// found; callers decide whether the lack of a token is fatal (it is
/// for `starred()`, it isn't for an anonymous registry fetch).
pub fn resolve_token() -> Option<String> {
    for var in ENV_PRECEDENCE {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    gh_token_via_cli().ok().flatten()
}

/// Like [`resolve_token`] but returns an error when no token is
/// available, for callers (starred search) that require authentication.
pub fn require_token() -> Result<String, ResolverError> {
    resolve_token().ok_or(ResolverError::MissingAuthentication)
}

fn gh_token_via_cli() -> Result<Option<String>, ResolverError> {
    let Some(gh) = locate_gh() else {
        return Ok(None);
    };
    let output = run_command(Command::new(&gh).arg("auth").arg("token")).map_err(|e| ResolverError::StarredSearch {
        message: e.to_string(),
    })?;
    if !output.success {
        return Ok(None);
    }
    let token = output.stdout.trim().to_owned();
    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(token))
    }
}

fn locate_gh() -> Option<std::path::PathBuf> {
    for var in ["APP_GH_PATH", "GH_PATH"] {
        if let Ok(path) = std::env::var(var) {
            if !path.trim().is_empty() {
                return Some(std::path::PathBuf::from(path));
            }
        }
    }
    which::which("gh").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that
    // touch them to avoid cross-test interference.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn env_precedence_prefers_app_github_token() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("APP_GITHUB_TOKEN", "app-token");
        std::env::set_var("GH_TOKEN", "gh-token");
        let token = resolve_token();
        std::env::remove_var("APP_GITHUB_TOKEN");
        std::env::remove_var("GH_TOKEN");
        assert_eq!(token.as_deref(), Some("app-token"));
    }

    #[test]
    fn env_precedence_falls_back_to_github_token() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("APP_GITHUB_TOKEN");
        std::env::remove_var("GH_TOKEN");
        std::env::set_var("GITHUB_TOKEN", "gh-fallback");
        let token = resolve_token();
        std::env::remove_var("GITHUB_TOKEN");
        assert_eq!(token.as_deref(), Some("gh-fallback"));
    }

    #[test]
    fn require_token_errors_when_nothing_resolves() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("APP_GITHUB_TOKEN");
        std::env::remove_var("GH_TOKEN");
        std::env::remove_var("GITHUB_TOKEN");
        std::env::remove_var("APP_GH_PATH");
        std::env::remove_var("GH_PATH");
        // Only assert the error variant when no gh binary happens to be
        // on PATH in the test environment.
        if which::which("gh").is_err() {
            assert!(matches!(require_token(), Err(ResolverError::MissingAuthentication)));
        }
    }
}
