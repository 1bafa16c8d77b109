use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use login_attempts::{config::Settings, spawn_cleanup_task, validation, AttemptStore, CleanupMode};
use tracing_subscriber::EnvFilter;

/// Inspect and maintain recorded login failures.
#[derive(Debug, Parser)]
#[command(name = "login-attempts", version, about)]
struct Cli {
    /// Configuration file (defaults to ./login-attempts.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a failed attempt
    Record {
        address: String,
        action: String,
        /// How long the failure counts, e.g. "+5 minutes"
        #[arg(long)]
        duration: Option<String>,
    },
    /// Check whether an address is still under the limit (exit 1 if not)
    Check {
        address: String,
        action: String,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Count live attempts
    Count { address: String, action: String },
    /// Delete all attempts for an address and action
    Reset { address: String, action: String },
    /// Delete expired attempts
    Cleanup,
    /// Run periodic cleanup until interrupted
    Watch {
        /// Seconds between runs, overrides the configured interval
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("loading configuration")?;

    let filter = cli
        .log_level
        .clone()
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = settings.open_store().await.context("opening attempt store")?;
    run(cli.command, &settings, store).await
}

async fn run(command: Command, settings: &Settings, store: AttemptStore) -> anyhow::Result<ExitCode> {
    match command {
        Command::Record {
            address,
            action,
            duration,
        } => {
            let duration = match duration {
                Some(input) => validation::parse_duration(&input)?,
                None => settings.default_duration(),
            };
            store.record_failure(&address, &action, duration).await?;
            println!("recorded");
        },
        Command::Check {
            address,
            action,
            limit,
        } => {
            let limit = limit.unwrap_or(settings.default_limit);
            if store.is_under_limit(&address, &action, limit).await? {
                println!("allowed");
            } else {
                println!("denied");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Count { address, action } => {
            println!("{}", store.count(&address, &action).await?);
        },
        Command::Reset { address, action } => {
            println!("{}", store.reset(&address, &action).await?);
        },
        Command::Cleanup => {
            println!("{}", store.cleanup().await?);
        },
        Command::Watch { interval } => {
            let period = interval
                .map(std::time::Duration::from_secs)
                .or_else(|| settings.cleanup.interval())
                .unwrap_or(settings.default_duration());
            if period.is_zero() {
                anyhow::bail!("cleanup interval must be positive");
            }
            if !matches!(settings.cleanup, CleanupMode::Periodic { .. }) {
                tracing::debug!(mode = ?settings.cleanup, "watch runs periodic cleanup regardless of configured mode");
            }

            tracing::info!(backend = store.backend_name(), ?period, "running periodic cleanup");
            let task = spawn_cleanup_task(store, period);
            tokio::signal::ctrl_c().await?;
            task.stop();
            tracing::info!("stopped periodic cleanup");
        },
    }

    Ok(ExitCode::SUCCESS)
}
