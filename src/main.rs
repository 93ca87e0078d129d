use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use usage_monitor::config::{ConfigSource, HostSettings};
use usage_monitor::plugin_paths::PluginPaths;
use usage_monitor::usage::{
    CacheStore, HostCommand, LoadOutcome, RefreshCoordinator, RefreshOutcome, UsageEvent,
    UsageFetcher,
};

#[derive(Parser)]
#[command(name = "usage-monitor")]
#[command(about = "Aggregates usage and quota across AI coding providers")]
#[command(version)]
struct Cli {
    /// Plugin directory holding .env, settings.json and the usage cache
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print cached usage, refreshing it when missing or stale
    Status,
    /// Fetch usage from every provider now
    Refresh,
    /// Read refresh/toggle commands from stdin and print events as JSON lines
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    let paths = PluginPaths::resolve(cli.config_dir)?;
    tracing::debug!("Plugin directory: {}", paths.root().display());

    let settings = HostSettings::load(&paths.settings_path());
    let fetcher = UsageFetcher::with_defaults(settings.fetch_timeout());
    let config = ConfigSource::load(paths.dotenv_path(), settings);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let coordinator = Arc::new(RefreshCoordinator::new(
        fetcher,
        CacheStore::new(paths.cache_path()),
        config,
        event_tx,
    ));

    match cli.command {
        Command::Status => status(&coordinator).await,
        Command::Refresh => {
            let outcome = coordinator.refresh_usage(true).await;
            print_outcome(&outcome)
        }
        Command::Listen => listen(coordinator, event_rx).await,
    }
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("usage_monitor=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("usage_monitor=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn status(coordinator: &Arc<RefreshCoordinator>) -> Result<()> {
    match coordinator.load_cache().await {
        LoadOutcome::Fresh(payload) => print_json(&payload),
        LoadOutcome::Revalidating { cached, refresh } => {
            print_json(&cached)?;
            let outcome = refresh.await.context("Background refresh failed")?;
            print_outcome(&outcome)
        }
        LoadOutcome::Fetched(outcome) => print_outcome(&outcome),
    }
}

async fn listen(
    coordinator: Arc<RefreshCoordinator>,
    mut events: mpsc::UnboundedReceiver<UsageEvent>,
) -> Result<()> {
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize event: {}", e),
            }
        }
    });

    // A stale cache keeps revalidating in the background while commands run.
    coordinator.load_cache().await;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<HostCommand>() {
            Ok(HostCommand::Refresh) => {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator.handle_command(HostCommand::Refresh).await;
                });
            }
            Ok(command) => coordinator.handle_command(command).await,
            Err(e) => tracing::warn!("{:#}", e),
        }
    }

    tracing::debug!("stdin closed, shutting down");
    printer.abort();
    Ok(())
}

fn print_outcome(outcome: &RefreshOutcome) -> Result<()> {
    match outcome {
        RefreshOutcome::Completed(payload) => print_json(payload),
        RefreshOutcome::Skipped => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize payload")?;
    println!("{}", json);
    Ok(())
}
