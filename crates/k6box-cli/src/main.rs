#![forbid(unsafe_code)]
//! The launcher binary (§4.9): discover -> probe -> resolve -> build -> exec.
//!
//! Every step here is a thin call into one of the library crates; this
//! file's only job is sequencing them per the pipeline and turning
//! whatever came back into an exit code and a line on stderr.

mod cli;
mod config;
mod error;

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
#[cfg(not(unix))]
use std::process::Command;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, OnceLock};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use k6box_builder::{enrich_from_probe, new_builder, probe, BuildContext, Builder, EngineSelection, Replacement};
use k6box_deps::{analyse, Dependencies, FsOpener};
use k6box_resolver::Resolver;
use k6box_version::artifact::HOST_NAME;
use k6box_version::{Constraint, Modules, Platform};

use cli::{Cli, Command as Cmd};
use config::Config;
use error::LauncherError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::resolve(&cli.global) {
        Ok(config) => config,
        Err(err) => return report(&err),
    };

    init_logging(&config);

    match run(cli.command, &config) {
        Ok(code) => to_exit_code(code),
        Err(err) => report(&err),
    }
}

fn report(err: &LauncherError) -> ExitCode {
    eprintln!("error: {err}");
    to_exit_code(err.exit_code())
}

fn to_exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::from(u8::MAX), ExitCode::from)
}

/// §5 "Non-TTY outputs bypass the spinner entirely and emit JSON
/// records": route through `tracing-subscriber`'s JSON formatter when
/// stderr isn't a terminal or colour was explicitly disabled, plain
/// compact text otherwise. `-v`/`-q` shift the filtered level.
///
/// Every event is written through [`SpinnerWriter`] rather than
/// `stderr` directly, so that whichever of `start_spinner`'s bars is
/// currently active catches the formatted line and folds it into its
/// own message instead of it being interleaved as a separate line (§5
/// "while the spinner is active, info-level messages are routed into
/// its suffix rather than appended as lines").
fn init_logging(config: &Config) {
    let level = match config.verbosity {
        i8::MIN..=-1 => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let json = config.no_color || !std::io::stderr().is_terminal();
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(SpinnerWriter);

    if json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.without_time().try_init();
    }
}

/// The spinner currently being driven by `start_spinner`, if any, shared
/// between the pipeline code that owns the `ProgressBar` and the
/// `tracing` writer that needs to know whether one is active.
fn active_spinner_slot() -> &'static Mutex<Option<ProgressBar>> {
    static ACTIVE_SPINNER: OnceLock<Mutex<Option<ProgressBar>>> = OnceLock::new();
    ACTIVE_SPINNER.get_or_init(|| Mutex::new(None))
}

fn set_active_spinner(bar: Option<ProgressBar>) {
    if let Ok(mut guard) = active_spinner_slot().lock() {
        *guard = bar;
    }
}

/// A `tracing-subscriber` writer that, while a spinner is active, folds
/// each formatted log line into that spinner's message instead of
/// emitting it as a separate stderr line; otherwise it writes straight
/// through to stderr as the default writer would.
#[derive(Clone, Copy, Default)]
struct SpinnerWriter;

impl SpinnerWriter {
    fn emit(line: &str) {
        if line.is_empty() {
            return;
        }
        let bar = active_spinner_slot().lock().ok().and_then(|guard| guard.clone());
        match bar {
            Some(bar) => bar.set_message(line.to_owned()),
            None => eprintln!("{line}"),
        }
    }
}

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::emit(String::from_utf8_lossy(buf).trim_end_matches('\n'));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SpinnerWriter {
    type Writer = SpinnerWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SpinnerWriter
    }
}

fn run(command: Cmd, config: &Config) -> Result<i32, LauncherError> {
    match command {
        Cmd::Deps { script, resolve, json } => cmd_deps(script.as_deref(), resolve, json, config),
        Cmd::Build { script } => cmd_build(script.as_deref(), config),
        Cmd::Run { script, args } => cmd_run(script.as_deref(), &args, config),
        Cmd::Service { listen } => cmd_service(&listen, config),
        Cmd::Preload { min_stars } => cmd_preload(min_stars, config),
        Cmd::Version => cmd_version(config),
        Cmd::Passthrough(args) => cmd_passthrough(&args, config),
    }
}

fn build_resolver(config: &Config) -> Resolver {
    let catalog_url = config.catalog_url.clone().unwrap_or_else(|| k6box_resolver::DEFAULT_CATALOG_URL.to_owned());
    Resolver::new(catalog_url, config.filter.clone(), config.cache_dir.clone())
}

fn engine_selection(config: &Config) -> EngineSelection {
    EngineSelection {
        preferred: config.builder,
        service_url: config.build_service_url.clone(),
    }
}

fn parse_replacements(raw: &[String]) -> Result<Vec<Replacement>, LauncherError> {
    raw.iter()
        .map(|r| {
            Replacement::parse(r).ok_or_else(|| LauncherError::InvalidInput {
                reason: format!("malformed --replace `{r}`, expected name=path"),
            })
        })
        .collect()
}

/// Reassemble the flat `--with NAME [CONSTRAINT]` value list clap hands
/// back per repeated occurrence into `(name, constraint)` pairs: a
/// token is treated as a constraint for the preceding name when it
/// opens with a semver-range or comparison character, a new name
/// otherwise.
fn parse_with_pairs(raw: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while let Some(name) = raw.get(i) {
        i += 1;
        let constraint = match raw.get(i) {
            Some(token) if looks_like_constraint(token) => {
                i += 1;
                token.clone()
            }
            _ => String::new(),
        };
        pairs.push((name.clone(), constraint));
    }
    pairs
}

fn looks_like_constraint(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit() || matches!(c, '^' | '~' | '=' | '>' | '<' | '*'))
}

/// §4.2 "optional enrichment": names not already present in `deps` are
/// admitted only if the resolver's registry already knows them, so a
/// `--with`-attached output that matches no extension is dropped with a
/// warning instead of turning into a hard resolution failure later.
fn apply_with_flags(deps: &mut Dependencies, raw: &[String], resolver: &Resolver) -> Result<(), LauncherError> {
    for (name, constraint_raw) in parse_with_pairs(raw) {
        let constraint = Constraint::parse(&constraint_raw)?;
        if deps.contains(&name) || resolver.knows(&name) {
            deps.add(&name, constraint)?;
        } else {
            tracing::warn!(name = %name, "--with names an extension the registry does not know; ignoring");
        }
    }
    Ok(())
}

fn discover_dependencies(script: Option<&Path>, config: &Config, resolver: &Resolver) -> Result<Dependencies, LauncherError> {
    let mut deps = match script {
        Some(path) => analyse(&FsOpener, path)?,
        None => {
            let mut bare = Dependencies::new();
            bare.add(HOST_NAME, Constraint::any())?;
            bare
        }
    };
    apply_with_flags(&mut deps, &config.with, resolver)?;
    Ok(deps)
}

/// §4.9 steps 1-4: delete-if-clean, probe the existing cache, otherwise
/// discover/resolve/build, atomically placing the result.
fn build_if_needed(script: Option<&Path>, config: &Config) -> Result<PathBuf, LauncherError> {
    let platform = Platform::host()?;
    let binary_path = config.cached_binary_path(platform);

    if config.clean {
        k6box_util::fs::remove_file_if_exists(&binary_path)?;
    }

    let resolver = build_resolver(config);
    let mut required = discover_dependencies(script, config, &resolver)?;

    if binary_path.exists() {
        match probe(&binary_path) {
            Ok(probed) if probed.resolves(required.iter().map(|d| (d.name.as_str(), &d.constraint))) => {
                tracing::info!(path = %binary_path.display(), "cached host binary already satisfies dependencies");
                return Ok(binary_path);
            }
            Ok(probed) => {
                enrich_from_probe(&mut required, &probed);
            }
            Err(err) => {
                tracing::debug!(%err, "cache probe failed, rebuilding");
            }
        }
    }

    let spinner = start_spinner("resolving dependencies");
    let modules = resolver.resolve(&required)?;
    finish_spinner(spinner, "resolved dependencies");

    let replacements = parse_replacements(&config.replace)?;
    let ctx = BuildContext::new().with_platform(platform).with_replacements(replacements);

    let builder = new_builder(&engine_selection(config))?;

    k6box_util::fs::ensure_dir(&config.bin_dir)?;
    let scratch_path = scratch_path_for(&binary_path);

    let spinner = start_spinner(&format!("building via {} engine", builder.engine()));
    let build_result = (|| -> Result<(), LauncherError> {
        let mut file = std::fs::File::create(&scratch_path).map_err(LauncherError::Io)?;
        builder.build(&ctx, &modules, &mut file)?;
        Ok(())
    })();

    match build_result {
        Ok(()) => {
            finish_spinner(spinner, "build complete");
            k6box_util::fs::place_atomically(&scratch_path, &binary_path)?;
            Ok(binary_path)
        }
        Err(err) => {
            set_active_spinner(None);
            if let Some(bar) = spinner {
                bar.abandon_with_message("build failed");
            }
            let _ = k6box_util::fs::remove_file_if_exists(&scratch_path);
            Err(err)
        }
    }
}

fn scratch_path_for(binary_path: &Path) -> PathBuf {
    let mut name = binary_path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn start_spinner(message: &str) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        tracing::info!("{message}");
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar.set_message(message.to_owned());
    set_active_spinner(Some(bar.clone()));
    Some(bar)
}

fn finish_spinner(bar: Option<ProgressBar>, message: &str) {
    set_active_spinner(None);
    if let Some(bar) = bar {
        bar.finish_with_message(message.to_owned());
    }
}

#[cfg(unix)]
fn exec_host_binary(path: &Path, args: &[String]) -> Result<i32, LauncherError> {
    let err = exec::Command::new(path).args(args).exec();
    Err(LauncherError::Io(err))
}

/// §4.9 step 5 "Windows: spawn and wait forwarding stdio" — there is no
/// POSIX-style `exec` on Windows, so the host binary runs as a child
/// process instead and its exit status is forwarded.
#[cfg(not(unix))]
fn exec_host_binary(path: &Path, args: &[String]) -> Result<i32, LauncherError> {
    let status = Command::new(path).args(args).status().map_err(LauncherError::Io)?;
    Ok(status.code().unwrap_or(1))
}

fn pipeline_and_exec(script: Option<&Path>, forward_args: &[String], config: &Config) -> Result<i32, LauncherError> {
    let binary_path = build_if_needed(script, config)?;
    if config.dry {
        return Ok(0);
    }
    exec_host_binary(&binary_path, forward_args)
}

fn cmd_build(script: Option<&Path>, config: &Config) -> Result<i32, LauncherError> {
    let binary_path = build_if_needed(script, config)?;
    println!("{}", binary_path.display());
    Ok(0)
}

fn cmd_run(script: Option<&Path>, args: &[String], config: &Config) -> Result<i32, LauncherError> {
    let mut forward = vec!["run".to_owned()];
    if let Some(path) = script {
        forward.push(path.display().to_string());
    }
    forward.extend(args.iter().cloned());
    pipeline_and_exec(script, &forward, config)
}

/// An unrecognised subcommand, forwarded verbatim to the host binary
/// (§6 "run [script] / (default) any passthrough subcommand"). The
/// first argument that names an existing file is taken to be the
/// script, for dependency discovery; the whole argument list is still
/// forwarded unchanged.
fn cmd_passthrough(args: &[String], config: &Config) -> Result<i32, LauncherError> {
    let script = args
        .iter()
        .find(|a| !a.starts_with('-') && Path::new(a.as_str()).is_file())
        .map(PathBuf::from);
    pipeline_and_exec(script.as_deref(), args, config)
}

fn cmd_deps(script: Option<&Path>, resolve: bool, json: bool, config: &Config) -> Result<i32, LauncherError> {
    let resolver = build_resolver(config);
    let deps = discover_dependencies(script, config, &resolver)?;

    if resolve {
        let outcome = resolver.resolve_partial(&deps);
        print_modules(&outcome.modules, json);
        if let Some(err) = outcome.error {
            return Err(err.into());
        }
    } else {
        print_dependencies(&deps, json);
    }
    Ok(0)
}

fn print_dependencies(deps: &Dependencies, json: bool) {
    if json {
        let map: std::collections::BTreeMap<&str, &str> =
            deps.iter().map(|d| (d.name.as_str(), d.constraint.as_str())).collect();
        if let Ok(text) = serde_json::to_string_pretty(&map) {
            println!("{text}");
        }
    } else {
        for dep in deps.iter() {
            println!("{}\t{}", dep.name, dep.constraint);
        }
    }
}

fn print_modules(modules: &Modules, json: bool) {
    if json {
        let map: serde_json::Map<String, serde_json::Value> = modules
            .iter()
            .map(|m| {
                let version = m.version.as_ref().map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.to_string()));
                (m.name.clone(), serde_json::json!({ "path": m.path, "version": version }))
            })
            .collect();
        if let Ok(text) = serde_json::to_string_pretty(&map) {
            println!("{text}");
        }
    } else {
        for module in modules.iter() {
            println!("{module}");
        }
    }
}

fn cmd_service(listen: &str, config: &Config) -> Result<i32, LauncherError> {
    let addr: std::net::SocketAddr = listen.parse().map_err(|_| LauncherError::InvalidInput {
        reason: format!("invalid --listen address `{listen}`"),
    })?;

    let resolver = build_resolver(config);
    let builder = new_builder(&engine_selection(config))?;
    let state = Arc::new(k6box_service::AppState::new(resolver, builder));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(LauncherError::Io)?;
    runtime.block_on(k6box_service::serve(addr, state)).map_err(LauncherError::Io)?;
    Ok(0)
}

fn cmd_preload(min_stars: Option<u32>, config: &Config) -> Result<i32, LauncherError> {
    let resolver = build_resolver(config);

    let modules = match min_stars {
        Some(stars) => resolver.starred(stars)?,
        None => {
            let mut deps = Dependencies::new();
            deps.add(HOST_NAME, Constraint::any())?;
            apply_with_flags(&mut deps, &config.with, &resolver)?;
            let outcome = resolver.resolve_partial(&deps);
            if let Some(err) = outcome.error {
                return Err(err.into());
            }
            outcome.modules
        }
    };

    let platforms = if config.platform.is_empty() {
        vec![Platform::host()?]
    } else {
        config
            .platform
            .iter()
            .map(|p| p.parse::<Platform>().map_err(LauncherError::from))
            .collect::<Result<Vec<_>, _>>()?
    };

    let builder = new_builder(&engine_selection(config))?;
    k6box_builder::preload(builder.as_ref(), &modules, &platforms)?;
    println!("preloaded {} module(s) across {} platform(s)", modules.len(), platforms.len());
    Ok(0)
}

fn cmd_version(config: &Config) -> Result<i32, LauncherError> {
    println!("k6box {}", env!("CARGO_PKG_VERSION"));

    let platform = Platform::host()?;
    let binary_path = config.cached_binary_path(platform);
    if !binary_path.exists() {
        println!("no cached host binary at {}", binary_path.display());
        return Ok(0);
    }

    match probe(&binary_path) {
        Ok(modules) => {
            if let Some(host) = modules.get(HOST_NAME) {
                println!("{host}");
            }
        }
        Err(err) => println!("cached host binary at {} could not be probed: {err}", binary_path.display()),
    }
    Ok(0)
}
