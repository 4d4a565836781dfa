//! The `clap`-derived command surface (§6): one `#[command(subcommand)]`
//! enum plus one flattened block of flags shared by every subcommand.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "k6box", about = "Builds and runs a load-testing binary tailored to a script's plugin imports")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags meaningful to every subcommand (§6 "Global flags").
#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Directory the built host binary is cached under.
    #[arg(long, global = true, env = "APP_BIN_DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Directory the HTTP registry/release cache is kept under.
    #[arg(long, global = true, env = "APP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Extra dependency, e.g. `--with k6/x/faker ^0.3`. Repeatable.
    #[arg(long = "with", global = true, num_args = 1..=2, value_names = ["NAME", "CONSTRAINT"])]
    pub with: Vec<String>,

    /// Developer path override, `--replace name=path`. Repeatable.
    #[arg(long = "replace", global = true)]
    pub replace: Vec<String>,

    /// JMESPath-style filter applied to the registry document.
    #[arg(long, global = true, env = "APP_FILTER")]
    pub filter: Option<String>,

    /// Force one build engine: native, container, or service.
    #[arg(long, global = true, env = "APP_BUILDER")]
    pub builder: Option<String>,

    /// Target platform(s) as `os/arch`, for `preload`. Repeatable.
    #[arg(long = "platform", global = true)]
    pub platform: Vec<String>,

    /// Delete the cached binary before doing anything else.
    #[arg(long, global = true)]
    pub clean: bool,

    /// Build (or confirm the cache) but do not execute the result.
    #[arg(long, global = true)]
    pub dry: bool,

    /// Increase log verbosity. Repeatable.
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease log verbosity. Repeatable.
    #[arg(short = 'q', long = "quiet", global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Disable ANSI colour and the interactive spinner.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Remote extension registry to resolve plugin names against.
    #[arg(long, global = true, conflicts_with = "build_service_url")]
    pub extension_catalog_url: Option<String>,

    /// Remote build service to delegate builds to, bypassing local engines.
    #[arg(long, global = true, env = "APP_BUILDER_SERVICE", conflicts_with = "extension_catalog_url")]
    pub build_service_url: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the dependency set a script declares.
    Deps {
        script: Option<PathBuf>,
        /// Resolve to concrete module versions instead of printing raw constraints.
        #[arg(long)]
        resolve: bool,
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Build the tailored host binary without running it.
    Build { script: Option<PathBuf> },
    /// Build (if needed) and execute the host binary.
    Run {
        script: Option<PathBuf>,
        /// Arguments forwarded to the host binary.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run the HTTP build service.
    Service {
        /// Address to bind, e.g. `0.0.0.0:8080`.
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,
    },
    /// Warm the build cache across one or more platforms.
    Preload {
        /// Only preload plugins with at least this many stars (requires auth).
        #[arg(long)]
        min_stars: Option<u32>,
    },
    /// Print this launcher's version and the cached host binary's version.
    Version,
    /// Anything else is forwarded verbatim to the host binary, build-if-needed first.
    #[command(external_subcommand)]
    Passthrough(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parse_deps_defaults() {
        let cli = Cli::parse_from(["k6box", "deps"]);
        match cli.command {
            Command::Deps { script, resolve, json } => {
                assert!(script.is_none());
                assert!(!resolve);
                assert!(!json);
            }
            other => panic!("expected Deps, got {other:?}"),
        }
    }

    #[test]
    fn parse_deps_with_script_and_json() {
        let cli = Cli::parse_from(["k6box", "deps", "a.js", "--json", "--resolve"]);
        match cli.command {
            Command::Deps { script, resolve, json } => {
                assert_eq!(script, Some(PathBuf::from("a.js")));
                assert!(resolve);
                assert!(json);
            }
            other => panic!("expected Deps, got {other:?}"),
        }
    }

    #[test]
    fn parse_run_with_passthrough_args() {
        let cli = Cli::parse_from(["k6box", "run", "a.js", "--", "--vus", "10"]);
        match cli.command {
            Command::Run { script, args } => {
                assert_eq!(script, Some(PathBuf::from("a.js")));
                assert_eq!(args, vec!["--vus", "10"]);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn parse_build_without_script() {
        let cli = Cli::parse_from(["k6box", "build"]);
        assert!(matches!(cli.command, Command::Build { script: None }));
    }

    #[test]
    fn parse_service_default_listen() {
        let cli = Cli::parse_from(["k6box", "service"]);
        match cli.command {
            Command::Service { listen } => assert_eq!(listen, "0.0.0.0:8080"),
            other => panic!("expected Service, got {other:?}"),
        }
    }

    #[test]
    fn parse_preload_min_stars() {
        let cli = Cli::parse_from(["k6box", "preload", "--min-stars", "50"]);
        match cli.command {
            Command::Preload { min_stars } => assert_eq!(min_stars, Some(50)),
            other => panic!("expected Preload, got {other:?}"),
        }
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["k6box", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn unknown_subcommand_is_passthrough() {
        let cli = Cli::parse_from(["k6box", "script.js", "--vus", "10"]);
        match cli.command {
            Command::Passthrough(args) => {
                assert_eq!(args, vec!["script.js", "--vus", "10"]);
            }
            other => panic!("expected Passthrough, got {other:?}"),
        }
    }

    #[test]
    fn global_with_flag_repeats() {
        let cli = Cli::parse_from(["k6box", "--with", "k6/x/faker", "^0.3", "deps"]);
        assert_eq!(cli.global.with, vec!["k6/x/faker", "^0.3"]);
    }

    #[test]
    fn global_verbose_and_quiet_are_repeatable_counts() {
        let cli = Cli::parse_from(["k6box", "-vv", "-q", "deps"]);
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.quiet, 1);
    }

    #[test]
    fn mutually_exclusive_catalog_and_service_url_rejected() {
        let result = Cli::try_parse_from([
            "k6box",
            "--extension-catalog-url",
            "https://example.com/a.json",
            "--build-service-url",
            "https://example.com/build",
            "deps",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn root_help_render_includes_every_subcommand() {
        let mut cmd = Cli::command();
        let help = cmd.render_help().to_string();
        for subcommand in ["deps", "build", "run", "service", "preload", "version"] {
            assert!(help.contains(subcommand));
        }
    }
}
