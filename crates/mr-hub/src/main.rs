//! m-relay Hub Daemon
//!
//! The hub runs on the local machine, keeps provider sessions alive,
//! and serves the localhost HTTP API used by the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mr_core::config::{self, HubConfig};
use mr_core::traits::TransportFactory;
use mr_hub::session::supervisor::run_supervisor;
use mr_hub::transport::SimTransportFactory;
use mr_hub::{http, publish, HubState};

#[derive(Parser)]
#[command(name = "mr-hub")]
#[command(about = "m-relay hub daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("m-relay hub starting...");

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                HubConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            HubConfig::default()
        }
    };

    // Override bind address if specified
    let bind_addr = args.bind.unwrap_or_else(|| config.bind_address.clone());

    let factory = Arc::new(SimTransportFactory::new(config.transport.clone()));
    let state = HubState::new(config, factory as Arc<dyn TransportFactory>);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // Spawn the background subsystems
    tokio::spawn(run_supervisor(
        Arc::clone(&state.registry),
        state.config.reconnect_delay,
        cancel.clone(),
    ));
    tokio::spawn(publish::run_status_publisher(
        Arc::clone(&state.registry),
        Arc::clone(&state.instances),
        cancel.clone(),
    ));
    tokio::spawn(Arc::clone(&state.dispatcher).run(cancel.clone()));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP API to {}", bind_addr))?;

    http::serve(Arc::clone(&state), listener, cancel.clone()).await?;

    // Tear down every live session so transports release cleanly
    for record in state.registry.list_snapshots() {
        state.registry.remove(&record.id).await;
    }

    tracing::info!("Hub shutdown complete");
    Ok(())
}
