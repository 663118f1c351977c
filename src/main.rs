//! artifact-resource - CI resource for versioned artifacts
//!
//! CLI entry point that dispatches to subcommands. Also answers to the
//! names `check`, `in` and `out` when invoked through links.

use artifact_resource::cli::{normalize_args, Cli, Commands};
use artifact_resource::config::schema::Settings;
use artifact_resource::config::ConfigManager;
use artifact_resource::error::ResourceResult;
use artifact_resource::fetcher::DriverContext;
use artifact_resource::ui::UiContext;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Overrides the `-v` derived log level
const LOG_ENV: &str = "ARTIFACT_RESOURCE_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style(&e).red().bold());
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; stdout carries the protocol response
fn init_logging(verbose: u8, settings: &Settings) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("artifact_resource=info"),
        1 => EnvFilter::new("artifact_resource=debug"),
        _ => EnvFilter::new("artifact_resource=trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if settings.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

async fn run() -> ResourceResult<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os().collect()));

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let settings = config_manager
        .load()
        .await
        .map_err(|e| e.during("loading settings"))?;

    init_logging(cli.verbose, &settings);
    debug!("Settings loaded from {}", config_manager.path().display());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let ctx = DriverContext::new(settings, UiContext::detect(), cancel);

    match cli.command {
        Commands::Check => artifact_resource::cli::commands::check(&ctx.settings).await,
        Commands::In(args) => artifact_resource::cli::commands::get(args, &ctx).await,
        Commands::Out(args) => artifact_resource::cli::commands::put(args).await,
        Commands::Download(args) => artifact_resource::cli::commands::download(args, &ctx).await,
    }
}
