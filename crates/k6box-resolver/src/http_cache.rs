//! On-disk HTTP cache keyed by URL, approximating ETag/max-age semantics
//! (§4.3, §6 "Cache layout": `<cache>/http/…`).
//!
//! Repeated invocations are offline-friendly: a fresh cache entry is
//! served without a network round-trip at all; a stale one is revalidated
//! with a conditional GET.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use k6box_util::hash::sha256_bytes;

use crate::error::ResolverError;

const DEFAULT_MAX_AGE_SECS: u64 = 300;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CacheMeta {
    etag: Option<String>,
    fetched_at_secs: u64,
    max_age_secs: u64,
}

/// A disk-backed cache of HTTP GET responses.
pub struct HttpCache {
    dir: PathBuf,
}

impl HttpCache {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        HttpCache {
            dir: cache_dir.into().join("http"),
        }
    }

    fn paths_for(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = sha256_bytes(url.as_bytes());
        (self.dir.join(format!("{key}.body")), self.dir.join(format!("{key}.meta.json")))
    }

    /// Fetch `url`, serving a fresh cache entry without a network call,
    /// revalidating a stale one with `If-None-Match`, and falling back to
    /// a full GET otherwise. `token`, if present, is attached as a bearer
    /// `Authorization` header.
    ///
    /// # Errors
    /// Returns [`ResolverError::RegistryFetch`] on network failure or a
    /// non-2xx/304 response, or [`ResolverError::Cache`] if the cache
    /// directory cannot be written.
    pub fn get(&self, url: &str, token: Option<&str>) -> Result<Vec<u8>, ResolverError> {
        let (body_path, meta_path) = self.paths_for(url);
        let cached_meta = read_meta(&meta_path);
        let cached_body = std::fs::read(&body_path).ok();

        if let (Some(meta), Some(body)) = (&cached_meta, &cached_body) {
            if is_fresh(meta) {
                tracing::debug!(url, "serving registry response from fresh disk cache");
                return Ok(body.clone());
            }
        }

        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_connect(Some(std::time::Duration::from_secs(10)))
                .timeout_global(Some(std::time::Duration::from_secs(30)))
                .build(),
        );

        let mut request = agent.get(url);
        if let Some(token) = token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }
        if let Some(meta) = &cached_meta {
            if let Some(etag) = &meta.etag {
                request = request.header("If-None-Match", etag);
            }
        }

        match request.call() {
            Ok(resp) if resp.status().as_u16() == 304 => {
                let Some(body) = cached_body else {
                    return Err(ResolverError::RegistryFetch {
                        url: url.to_owned(),
                        message: "304 Not Modified but no cached body present".to_owned(),
                    });
                };
                let refreshed = CacheMeta {
                    etag: cached_meta.and_then(|m| m.etag),
                    fetched_at_secs: now_secs(),
                    max_age_secs: DEFAULT_MAX_AGE_SECS,
                };
                write_meta(&meta_path, &refreshed)?;
                Ok(body)
            }
            Ok(resp) if resp.status().is_success() => {
                let etag = resp
                    .headers()
                    .get("etag")
                    .and_then(|v| v.to_str().ok())
                    .map(std::borrow::ToOwned::to_owned);
                let max_age = resp
                    .headers()
                    .get("cache-control")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_max_age)
                    .unwrap_or(DEFAULT_MAX_AGE_SECS);

                let mut body_reader = resp.into_body();
                let mut body = Vec::new();
                std::io::Read::read_to_end(&mut body_reader.as_reader(), &mut body).map_err(|e| {
                    ResolverError::RegistryFetch {
                        url: url.to_owned(),
                        message: e.to_string(),
                    }
                })?;

                ensure_dir(&self.dir)?;
                std::fs::write(&body_path, &body).map_err(|e| ResolverError::Cache {
                    path: body_path.display().to_string(),
                    message: e.to_string(),
                })?;
                write_meta(
                    &meta_path,
                    &CacheMeta {
                        etag,
                        fetched_at_secs: now_secs(),
                        max_age_secs: max_age,
                    },
                )?;
                Ok(body)
            }
            Ok(resp) => Err(ResolverError::RegistryFetch {
                url: url.to_owned(),
                message: format!("unexpected status {}", resp.status()),
            }),
            Err(e) => Err(ResolverError::RegistryFetch {
                url: url.to_owned(),
                message: e.to_string(),
            }),
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), ResolverError> {
    std::fs::create_dir_all(dir).map_err(|e| ResolverError::Cache {
        path: dir.display().to_string(),
        message: e.to_string(),
    })
}

fn read_meta(path: &Path) -> Option<CacheMeta> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_meta(path: &Path, meta: &CacheMeta) -> Result<(), ResolverError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let raw = serde_json::to_string(meta).unwrap_or_default();
    std::fs::write(path, raw).map_err(|e| ResolverError::Cache {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn is_fresh(meta: &CacheMeta) -> bool {
    now_secs().saturating_sub(meta.fetched_at_secs) < meta.max_age_secs
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("max-age=").and_then(|v| v.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_considered_fresh() {
        let meta = CacheMeta {
            etag: None,
            fetched_at_secs: now_secs(),
            max_age_secs: 300,
        };
        assert!(is_fresh(&meta));
    }

    #[test]
    fn expired_entry_is_not_fresh() {
        let meta = CacheMeta {
            etag: None,
            fetched_at_secs: now_secs().saturating_sub(1000),
            max_age_secs: 300,
        };
        assert!(!is_fresh(&meta));
    }

    #[test]
    fn parses_max_age_from_cache_control() {
        assert_eq!(parse_max_age("public, max-age=600"), Some(600));
        assert_eq!(parse_max_age("no-store"), None);
    }

    #[test]
    fn cache_dir_nests_under_http() {
        let cache = HttpCache::new("/tmp/k6box-cache");
        assert_eq!(cache.dir, Path::new("/tmp/k6box-cache/http"));
    }
}
