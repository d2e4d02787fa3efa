//! hedge-bridge: local HTTP bridge between a trading client and a hedge
//! executor.
//!
//! Usage:
//!   hedge-bridge [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>       Config file path (default: config/bridge.toml)
//!   --bind <ADDR>             Bind address (overrides config)
//!   --upstream-url <URL>      Upstream addon base URL (overrides config)
//!   --log-level <LEVEL>       Logging level (overrides config)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hedge_bridge::{
    spawn_upstream_sweep, BridgeConfig, BridgeState, ChannelEventSink, ReconnectCoordinator,
    DEFAULT_EVENT_CAPACITY,
};

/// CLI arguments for hedge-bridge.
#[derive(Parser, Debug)]
#[command(name = "hedge-bridge")]
#[command(about = "Local HTTP bridge between a trading client and a hedge executor")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/bridge.toml")]
    config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Upstream addon base URL (overrides config file)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Logging level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    // Load configuration, then layer env and CLI overrides on top.
    let mut config = if args.config.exists() {
        BridgeConfig::from_file(&args.config)
            .with_context(|| format!("failed to load config from {:?}", args.config))?
    } else {
        eprintln!(
            "Config file not found at {:?}, using defaults",
            args.config
        );
        BridgeConfig::default()
    };
    config.apply_env_overrides()?;
    config.apply_cli_overrides(args.bind, args.upstream_url, args.log_level);

    // Initialize logging
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    config.validate().context("configuration validation failed")?;

    info!("starting hedge-bridge");
    info!(bind = %config.bind_addr, upstream = %config.upstream.base_url, "configuration loaded");

    // UI event channel; the receiver is where an embedding UI attaches.
    // Without one, events are drained into the log.
    let (sink, mut event_rx) = ChannelEventSink::new(DEFAULT_EVENT_CAPACITY);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(event = event.name(), payload = ?event, "ui event");
        }
    });

    let bind_addr = config.bind_addr;
    let state = Arc::new(BridgeState::new(config, Arc::new(sink)));

    // Background liveness sweep (observes staleness, no downgrade).
    let sweep = spawn_upstream_sweep(state.clone());

    let coordinator = ReconnectCoordinator::new(state.clone(), bind_addr);
    let handle = hedge_bridge::server::start(state.clone(), bind_addr)
        .await
        .context("failed to start bridge listener")?;
    coordinator.install_server(handle).await;

    wait_for_shutdown().await?;

    info!("shutting down");
    coordinator.shutdown_server(Duration::from_secs(5)).await;
    sweep.abort();

    let status = state.status();
    if status.queue_size > 0 {
        warn!(
            queue_size = status.queue_size,
            "undelivered trades discarded at shutdown; upstream will resend on reconnect"
        );
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}
