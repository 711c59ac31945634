#![forbid(unsafe_code)]

//! `vpar-control` command-line entry point.
//!
//! Loads configuration, opens the node database, and runs one driver
//! operation (or the background capacity monitor) against the fleet.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use vpar_control::config::GlobalConfig;
use vpar_control::driver::{ComputeDriver, VparDriver};
use vpar_control::models::request::SpawnRequest;
use vpar_control::monitor::spawn_refresh_task;
use vpar_control::persistence::db;
use vpar_control::remote::ssh::SshSession;
use vpar_control::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "vpar-control", about = "HP-UX vPar control plane", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh fleet capacity periodically until interrupted.
    Monitor,
    /// Print fleet capacity totals.
    Stats {
        /// Query every nPar instead of using the cached totals.
        #[arg(long)]
        refresh: bool,
    },
    /// List running partitions.
    List,
    /// Show the live status of one partition.
    Inspect {
        /// Partition name.
        name: String,
    },
    /// Create and network-boot a partition described by a JSON file.
    Spawn {
        /// Path to a JSON-encoded spawn request.
        #[arg(long)]
        request: PathBuf,
    },
    /// Power off and remove a partition.
    Destroy {
        /// Partition name.
        name: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    info!("configuration loaded");

    let db = Arc::new(db::connect(&config.db_path).await?);
    let executor = Arc::new(SshSession::from_config(&config.remote));
    let driver = VparDriver::from_config(&config, executor, db)?;

    match args.command {
        Command::Monitor => {
            let ct = CancellationToken::new();
            let handle = spawn_refresh_task(
                Arc::clone(driver.monitor()),
                config.monitor.refresh_interval(),
                ct.clone(),
            );
            info!(
                interval_seconds = config.monitor.refresh_interval_seconds,
                "capacity monitor running"
            );
            shutdown_signal().await;
            info!("shutdown signal received");
            ct.cancel();
            handle
                .await
                .map_err(|err| AppError::Io(format!("refresh task failed: {err}")))?;
        }
        Command::Stats { refresh } => print_json(&driver.get_host_stats(refresh).await?)?,
        Command::List => print_json(&driver.list_instances().await?)?,
        Command::Inspect { name } => print_json(&driver.inspect(&name).await?)?,
        Command::Spawn { request } => {
            let raw = std::fs::read_to_string(&request)?;
            let request: SpawnRequest = serde_json::from_str(&raw)
                .map_err(|err| AppError::InvalidRequest(format!("spawn request: {err}")))?;
            print_json(&driver.spawn(&request).await?)?;
        }
        Command::Destroy { name } => print_json(&driver.destroy(&name).await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(format!("failed to encode output: {err}")))?;
    println!("{text}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
