//! Flag/env/default precedence fold (§10.3), grounded on the original
//! project's `internal/cmd/state.go`: every global flag is resolved
//! once, up front, into one immutable [`Config`] that the rest of the
//! pipeline reads instead of re-deriving precedence per use site.

use std::path::PathBuf;

use k6box_builder::EngineKind;

use crate::cli::GlobalArgs;
use crate::error::LauncherError;

const ENV_BIN_DIR: &str = "APP_BIN_DIR";
const ENV_CACHE_DIR: &str = "APP_CACHE_DIR";
const ENV_BUILDER: &str = "APP_BUILDER";
const ENV_FILTER: &str = "APP_FILTER";
const ENV_BUILDER_SERVICE: &str = "APP_BUILDER_SERVICE";

#[derive(Debug, Clone)]
pub struct Config {
    pub bin_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub builder: Option<EngineKind>,
    pub filter: String,
    pub catalog_url: Option<String>,
    pub build_service_url: Option<String>,
    pub with: Vec<String>,
    pub replace: Vec<String>,
    pub platform: Vec<String>,
    pub clean: bool,
    pub dry: bool,
    pub verbosity: i8,
    pub no_color: bool,
}

impl Config {
    /// Fold CLI flags over environment variables over built-in
    /// defaults (§10.3 "precedence is flag > env > built-in default").
    ///
    /// # Errors
    /// Returns [`LauncherError::InvalidInput`] if `--builder` names an
    /// unknown engine, or if both `--extension-catalog-url` and
    /// `--build-service-url` are set (§6 "mutually exclusive").
    pub fn resolve(args: &GlobalArgs) -> Result<Self, LauncherError> {
        if args.extension_catalog_url.is_some() && args.build_service_url.is_some() {
            return Err(LauncherError::InvalidInput {
                reason: "--extension-catalog-url and --build-service-url are mutually exclusive".to_owned(),
            });
        }

        let bin_dir = args
            .bin_dir
            .clone()
            .or_else(|| std::env::var(ENV_BIN_DIR).ok().map(PathBuf::from))
            .unwrap_or_else(default_bin_dir);

        let cache_dir = args
            .cache_dir
            .clone()
            .or_else(|| std::env::var(ENV_CACHE_DIR).ok().map(PathBuf::from))
            .unwrap_or_else(default_cache_dir);

        let builder_name = args.builder.clone().or_else(|| std::env::var(ENV_BUILDER).ok());
        let builder = builder_name.as_deref().map(parse_engine_kind).transpose()?;

        let filter = args
            .filter
            .clone()
            .or_else(|| std::env::var(ENV_FILTER).ok())
            .unwrap_or_else(|| k6box_resolver::DEFAULT_FILTER.to_owned());

        let build_service_url = args
            .build_service_url
            .clone()
            .or_else(|| std::env::var(ENV_BUILDER_SERVICE).ok());

        Ok(Config {
            bin_dir,
            cache_dir,
            builder,
            filter,
            catalog_url: args.extension_catalog_url.clone(),
            build_service_url,
            with: args.with.clone(),
            replace: args.replace.clone(),
            platform: args.platform.clone(),
            clean: args.clean,
            dry: args.dry,
            verbosity: i8::from(args.verbose) - i8::from(args.quiet),
            no_color: args.no_color,
        })
    }

    #[must_use]
    pub fn host_binary_name(&self, platform: k6box_version::Platform) -> &'static str {
        if platform.is_windows() {
            "k6.exe"
        } else {
            "k6"
        }
    }

    #[must_use]
    pub fn cached_binary_path(&self, platform: k6box_version::Platform) -> PathBuf {
        self.bin_dir.join(self.host_binary_name(platform))
    }
}

fn parse_engine_kind(raw: &str) -> Result<EngineKind, LauncherError> {
    match raw {
        "native" => Ok(EngineKind::Native),
        "container" => Ok(EngineKind::Container),
        "service" => Ok(EngineKind::Service),
        other => Err(LauncherError::InvalidInput {
            reason: format!("unknown builder `{other}`, expected native, container, or service"),
        }),
    }
}

fn default_bin_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("k6box").join("bin")
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("k6box")
}
