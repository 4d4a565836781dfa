//! Error taxonomy for registry fetch, release lookup, and composition
//! (§7 *resolver-error*).

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("cannot fetch extension registry from {url}: {message}")]
    RegistryFetch { url: String, message: String },

    #[error("registry filter `{filter}` produced no array: {message}")]
    RegistryFilter { filter: String, message: String },

    #[error("cannot parse registry response from {url}: {message}")]
    RegistryParse { url: String, message: String },

    #[error("module `{name}` is not a known extension")]
    ModuleUnknown { name: String },

    #[error("no release of `{name}` satisfies constraint `{constraint}`")]
    NoSatisfyingRelease { name: String, constraint: String },

    #[error("cannot list tags for {owner}/{repo}: {message}")]
    TagFetch {
        owner: String,
        repo: String,
        message: String,
    },

    #[error("starred-plugin search requires authentication (set GITHUB_TOKEN or an equivalent)")]
    MissingAuthentication,

    #[error("cannot search for starred extensions: {message}")]
    StarredSearch { message: String },

    #[error("cannot read HTTP cache at {path}: {message}")]
    Cache { path: String, message: String },
}
