//! Release finder (§4.4): for each module, list tags at its source and
//! pick the greatest one satisfying the module's constraint.

use rayon::prelude::*;
use serde::Deserialize;

use k6box_version::{Module, Version};

use crate::error::ResolverError;
use crate::http_cache::HttpCache;

const HOST_OWNER: &str = "grafana";
const HOST_REPO: &str = "k6";

/// Lists source tags and selects the release satisfying a constraint.
pub struct ReleaseFinder {
    cache: HttpCache,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

impl ReleaseFinder {
    #[must_use]
    pub fn new(cache_dir: impl Into<std::path::PathBuf>, token: Option<String>) -> Self {
        ReleaseFinder {
            cache: HttpCache::new(cache_dir),
            token,
        }
    }

    /// Derive `(owner, repo)` from a module path or name. The host itself
    /// is always `grafana/k6`; a plugin path of the form
    /// `github.com/<owner>/<repo>[/...]` yields its first two segments.
    ///
    /// # Errors
    /// Returns [`ResolverError::ModuleUnknown`] if a non-host module has
    /// no resolvable source path.
    pub fn owner_repo(module: &Module) -> Result<(String, String), ResolverError> {
        if module.name == k6box_version::artifact::HOST_NAME {
            return Ok((HOST_OWNER.to_owned(), HOST_REPO.to_owned()));
        }
        let trimmed = module
            .path
            .strip_prefix("github.com/")
            .unwrap_or(module.path.as_str());
        let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
        match (segments.next(), segments.next()) {
            (Some(owner), Some(repo)) => Ok((owner.to_owned(), repo.to_owned())),
            _ => Err(ResolverError::ModuleUnknown {
                name: module.name.clone(),
            }),
        }
    }

    /// List every `v`-prefixed, semver-parseable tag for `owner/repo`,
    /// newest first (the GitHub tags API's own ordering).
    ///
    /// # Errors
    /// Returns [`ResolverError::TagFetch`] on a network or parse failure.
    pub fn list_tags(&self, owner: &str, repo: &str) -> Result<Vec<Version>, ResolverError> {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/tags?per_page=100");
        let raw = self
            .cache
            .get(&url, self.token.as_deref())
            .map_err(|_| ResolverError::TagFetch {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
                message: "tag list request failed".to_owned(),
            })?;
        let tags: Vec<Tag> = serde_json::from_slice(&raw).map_err(|e| ResolverError::TagFetch {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            message: e.to_string(),
        })?;

        Ok(tags
            .into_iter()
            .filter_map(|t| Version::parse(&t.name).ok())
            .collect())
    }

    /// Pick the greatest tag satisfying `constraint`, assuming `tags` is
    /// already newest-first (callers pass [`list_tags`]'s output
    /// unmodified).
    #[must_use]
    pub fn pick(tags: &[Version], constraint: &k6box_version::Constraint) -> Option<Version> {
        tags.iter().filter(|v| constraint.accepts(v)).max().cloned()
    }

    /// Resolve every module's version concurrently, bounded by rayon's
    /// global pool.
    ///
    /// # Errors
    /// Returns the first module-level error encountered, by iteration
    /// order of `modules`.
    pub fn resolve_versions(
        &self,
        modules: Vec<(Module, k6box_version::Constraint)>,
    ) -> Result<Vec<Module>, ResolverError> {
        modules
            .into_par_iter()
            .map(|(module, constraint)| {
                let (owner, repo) = Self::owner_repo(&module)?;
                let tags = self.list_tags(&owner, &repo)?;
                let version = Self::pick(&tags, &constraint).ok_or_else(|| ResolverError::NoSatisfyingRelease {
                    name: module.name.clone(),
                    constraint: constraint.as_str().to_owned(),
                })?;
                Ok(module.with_version(version))
            })
            .collect()
    }

    /// Best-effort latest-release lookup for one module, used by starred
    /// discovery (§4.5): `None` on any failure (unresolvable owner/repo,
    /// tag fetch failure, or an empty/non-satisfying tag list) rather
    /// than an error, so one bad candidate doesn't fail the whole
    /// discovery pass.
    #[must_use]
    pub fn resolve_latest(&self, module: &Module) -> Option<Module> {
        let (owner, repo) = Self::owner_repo(module).ok()?;
        let tags = self.list_tags(&owner, &repo).ok()?;
        let version = Self::pick(&tags, &k6box_version::Constraint::any())?;
        Some(module.clone().with_version(version))
    }
}
