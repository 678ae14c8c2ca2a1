//! Berth - layered images and a process launcher for ASGI services
//!
//! CLI entry point that dispatches to subcommands.

use berth::cli::{commands, Cli, Commands};
use berth::config::ConfigManager;
use berth::error::{BerthError, BerthResult, ErrorClass};
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Overrides the `-v` derived log filter
const LOG_ENV: &str = "BERTH_LOG";

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            } else if e.is_retryable() {
                eprintln!("{} This may succeed if retried", style("Hint:").yellow());
            }
            if e.class() == ErrorClass::BuildFatal {
                eprintln!("{}", style("No image was tagged.").dim());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> BerthResult<()> {
    let project_dir = resolve_project_dir(cli.project.as_deref())?;
    let manager = match cli.config {
        Some(ref path) if !path.exists() => return Err(BerthError::ConfigNotFound(path.clone())),
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::for_project(&project_dir),
    };

    // The entrypoint stays single-threaded up to exec
    if let Commands::Launch(args) = cli.command {
        let config = manager.load_blocking()?;
        init_logging(cli.verbose, &config.general.log_format);
        return commands::launch(args, &config);
    }

    berth::ui::init_theme();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| BerthError::io("starting async runtime", e))?;

    runtime.block_on(dispatch(cli, manager, project_dir))
}

async fn dispatch(cli: Cli, manager: ConfigManager, project_dir: PathBuf) -> BerthResult<()> {
    // Init command doesn't need config loading
    if let Commands::Init(args) = cli.command {
        init_logging(cli.verbose, "text");
        return commands::init(args, &project_dir).await;
    }

    let config = manager.load().await?;
    init_logging(cli.verbose, &config.general.log_format);
    debug!("Project directory: {}", project_dir.display());
    debug!("Config file: {}", manager.path().display());

    match cli.command {
        Commands::Init(_) | Commands::Launch(_) => unreachable!("handled before config load"),
        Commands::Plan(args) => commands::plan(args, &config, &project_dir).await,
        Commands::Build(args) => commands::build(args, &config, &project_dir).await,
        Commands::Run(args) => commands::run(args, &config, &project_dir).await,
        Commands::Stop(args) => commands::stop(args, &config).await,
        Commands::Logs(args) => commands::logs(args, &config).await,
        Commands::List(args) => commands::list(args).await,
        Commands::Config(args) => commands::config(args, &config, &manager).await,
    }
}

fn resolve_project_dir(project: Option<&Path>) -> BerthResult<PathBuf> {
    match project {
        Some(path) => path.canonicalize().map_err(|e| {
            BerthError::io(format!("resolving project path {}", path.display()), e)
        }),
        None => std::env::current_dir().map_err(|e| BerthError::io("getting current directory", e)),
    }
}

/// Logging goes to stderr so stdout stays clean for `plan --format json`
/// and for the server after exec.
fn init_logging(verbose: u8, format: &str) {
    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("berth=warn"),
        1 => EnvFilter::new("berth=info"),
        _ => EnvFilter::new("berth=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().init(),
        other => {
            builder.without_time().init();
            if other != "text" {
                warn!("Unknown general.log_format {:?}, using text", other);
            }
        }
    }
}
