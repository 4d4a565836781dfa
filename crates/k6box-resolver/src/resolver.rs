//! Composes the registry client and release finder into one
//! `resolve(deps) -> modules` operation (§4.5), plus `starred()` for
//! preload's plugin discovery.

use serde::Deserialize;

use k6box_deps::Dependencies;
use k6box_version::{Module, Modules};

use crate::auth::resolve_token;
use crate::error::ResolverError;
use crate::http_cache::HttpCache;
use crate::registry::{expand, expand_unique, RegistryClient};
use crate::release::ReleaseFinder;

/// The outcome of a resolution attempt: whatever modules *did* resolve,
/// plus the first error encountered, so the launcher can report a
/// partial result per §7 rather than an all-or-nothing failure.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub modules: Modules,
    pub error: Option<ResolverError>,
}

pub struct Resolver {
    registry: RegistryClient,
    release_finder: ReleaseFinder,
    cache: HttpCache,
    token: Option<String>,
}

impl Resolver {
    #[must_use]
    pub fn new(catalog_url: impl Into<String>, filter: impl Into<String>, cache_dir: impl Into<std::path::PathBuf> + Clone) -> Self {
        let token = resolve_token();
        Resolver {
            registry: RegistryClient::new(catalog_url, filter, cache_dir.clone(), token.clone()),
            release_finder: ReleaseFinder::new(cache_dir.clone(), token.clone()),
            cache: HttpCache::new(cache_dir),
            token,
        }
    }

    /// Resolve a `Dependencies` set to concrete `Modules`.
    ///
    /// # Errors
    /// Returns the first error encountered; `k6` itself always resolves
    /// without consulting the registry (it's the host, not a plugin).
    pub fn resolve(&self, deps: &Dependencies) -> Result<Modules, ResolverError> {
        let entries = self.registry.fetch()?;
        let expanded = expand(&entries);

        let mut to_resolve = Vec::new();
        for dep in deps.iter() {
            let module = if dep.name == k6box_version::artifact::HOST_NAME {
                Module::new(dep.name.clone(), "github.com/grafana/k6")
            } else {
                let entry = expanded.get(&dep.name).ok_or_else(|| ResolverError::ModuleUnknown {
                    name: dep.name.clone(),
                })?;
                Module::new(dep.name.clone(), strip_scheme(&entry.url))
            };
            to_resolve.push((module, dep.constraint.clone()));
        }

        let resolved = self.release_finder.resolve_versions(to_resolve)?;
        Ok(resolved.into_iter().collect())
    }

    /// Best-effort variant of [`Resolver::resolve`] (§7 "partial
    /// resolution is explicit"): resolves every dependency it can and
    /// returns whatever it managed to populate alongside the first
    /// error, instead of discarding partial progress on the first
    /// failure. Used by `deps --resolve` so best-effort output is still
    /// possible when one module has no satisfying release.
    #[must_use]
    pub fn resolve_partial(&self, deps: &Dependencies) -> ResolveOutcome {
        let entries = match self.registry.fetch() {
            Ok(entries) => entries,
            Err(error) => {
                return ResolveOutcome {
                    modules: Modules::new(),
                    error: Some(error),
                }
            }
        };
        let expanded = expand(&entries);

        let mut modules = Modules::new();
        let mut first_error = None;

        for dep in deps.iter() {
            let module = if dep.name == k6box_version::artifact::HOST_NAME {
                Module::new(dep.name.clone(), "github.com/grafana/k6")
            } else {
                match expanded.get(&dep.name) {
                    Some(entry) => Module::new(dep.name.clone(), strip_scheme(&entry.url)),
                    None => {
                        first_error.get_or_insert(ResolverError::ModuleUnknown { name: dep.name.clone() });
                        continue;
                    }
                }
            };

            match self.release_finder.resolve_versions(vec![(module, dep.constraint.clone())]) {
                Ok(resolved) => {
                    for m in resolved {
                        modules.insert(m);
                    }
                }
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        ResolveOutcome {
            modules,
            error: first_error,
        }
    }

    /// Does the registry know an extension under this logical name?
    /// Used as an existence oracle by optional dependency enrichment
    /// (§4.2 "the resolver is consulted as an oracle for existence") so
    /// a `--with`-attached output that doesn't match any extension is
    /// skipped rather than forcing a hard resolution failure.
    ///
    /// Returns `false` (rather than propagating the error) if the
    /// registry itself cannot be fetched — an oracle that can't answer
    /// is not grounds to admit the name.
    #[must_use]
    pub fn knows(&self, name: &str) -> bool {
        if name == k6box_version::artifact::HOST_NAME {
            return true;
        }
        self.registry.fetch().map(|entries| expand(&entries).contains_key(name)).unwrap_or(false)
    }

    /// Discover plugins by topic search on the source host (§4.4):
    /// keeps only those above `min_stars` and not archived, intersects
    /// with the registry's unique-name expansion, then resolves each to
    /// its latest release.
    ///
    /// Candidates with no satisfying (or empty) tag list are dropped
    /// rather than failing the whole discovery, matching the original
    /// implementation's best-effort preload behaviour.
    ///
    /// # Errors
    /// Returns [`ResolverError::MissingAuthentication`] if no bearer
    /// token is available (starred search requires authentication), or
    /// a registry fetch error.
    pub fn starred(&self, min_stars: u32) -> Result<Modules, ResolverError> {
        let token = self.token.clone().ok_or(ResolverError::MissingAuthentication)?;
        let repos = search_starred_topic(&self.cache, &token, min_stars)?;

        let entries = self.registry.fetch()?;
        let unique = expand_unique(&entries);

        let mut modules = Modules::new();
        for (name, entry) in &unique {
            if !repos.iter().any(|r| entry.url.contains(r.as_str())) {
                continue;
            }
            let module = Module::new(name.clone(), strip_scheme(&entry.url));
            if let Some(resolved) = self.release_finder.resolve_latest(&module) {
                modules.insert(resolved);
            }
        }

        Ok(modules)
    }
}

fn strip_scheme(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_owned()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    full_name: String,
    stargazers_count: u32,
    archived: bool,
}

fn search_starred_topic(cache: &HttpCache, token: &str, min_stars: u32) -> Result<Vec<String>, ResolverError> {
    let url = "https://api.github.com/search/repositories?q=topic:xk6&per_page=100".to_owned();
    let raw = cache.get(&url, Some(token)).map_err(|_| ResolverError::StarredSearch {
        message: "repository search request failed".to_owned(),
    })?;
    let response: SearchResponse = serde_json::from_slice(&raw).map_err(|e| ResolverError::StarredSearch {
        message: e.to_string(),
    })?;

    Ok(response
        .items
        .into_iter()
        .filter(|item| !item.archived && item.stargazers_count > min_stars)
        .map(|item| item.full_name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_scheme_removes_https_and_trailing_slash() {
        assert_eq!(strip_scheme("https://github.com/grafana/xk6-faker/"), "github.com/grafana/xk6-faker");
    }

    #[test]
    fn strip_scheme_is_idempotent_without_scheme() {
        assert_eq!(strip_scheme("github.com/grafana/xk6-faker"), "github.com/grafana/xk6-faker");
    }

    #[test]
    fn knows_the_host_without_consulting_the_registry() {
        let resolver = Resolver::new("https://example.invalid/extensions.json", "$", std::env::temp_dir());
        assert!(resolver.knows("k6"));
    }
}
