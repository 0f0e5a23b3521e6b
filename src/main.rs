//! Pando provider daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ startup pipeline
//!                     │
//!                     ├─▶ network endpoint (identity + listen addr)
//!                     ├─▶ datastore ──▶ blockstore ──▶ link system
//!                     ├─▶ ingestion provider ◀── task queue ◀──┐
//!                     └─▶ monitor ── HTTP poll of data url ────┘
//!
//!   SIGINT/SIGTERM ──▶ shutdown coordinator (watchdog budget)
//!                        monitor → provider → datastore → endpoint
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use pando_provider::config::{loader, ConfigError};
use pando_provider::lifecycle::{signals, Daemon, DaemonError, Shutdown};
use pando_provider::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "pando-provider")]
#[command(about = "Pando provider daemon", long_about = None)]
struct Cli {
    /// Config root directory (defaults to $PANDO_PROVIDER_PATH or ~/.pando-provider).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and identity
    Init,
    /// Starts a pando provider
    Daemon {
        /// Log level, overrides the configured one
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Init => init_command(cli.root).await,
        Commands::Daemon { log_level } => daemon_command(cli.root, log_level).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn init_command(root: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let root = loader::config_root(root.as_deref())?;
    let config = loader::init(&root)?;
    println!(
        "Initialized pando provider at {}\npeer id: {}",
        root.display(),
        config.identity.peer_id
    );
    Ok(())
}

async fn daemon_command(
    root: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = loader::config_root(root.as_deref())?;
    let config = match loader::load(&root) {
        Ok(config) => config,
        Err(ConfigError::NotInitialized(_)) => {
            return Err(
                "pando provider is not initialized\nTo initialize, run using the \"init\" command"
                    .into(),
            );
        }
        Err(e) => return Err(format!("cannot load config file: {e}").into()),
    };

    let level = log_level.unwrap_or_else(|| config.observability.log_level.clone());
    logging::init_logging(&level, config.observability.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), root = %root.display(), "pando-provider starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let stop = Shutdown::new();
    let listener = stop.subscribe();
    signals::spawn_signal_handler(stop);

    let daemon = Daemon::start(&config, &root).await.map_err(DaemonError::from)?;
    let result = daemon.run_until_stopped(listener).await;
    result.into_result()?;
    Ok(())
}
