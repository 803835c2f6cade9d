//! tableau-hub - dashboard aggregation service
//!
//! Serves composed dashboard snapshots over HTTP, WebSocket (`/ws`) and
//! Server-Sent Events (`/events`). Default port 5740.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tableau_common::time::system_clock;
use tableau_hub::config::HubConfig;
use tableau_hub::{build_router, jobs, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tableau-hub
#[derive(Parser, Debug)]
#[command(name = "tableau-hub")]
#[command(about = "Dashboard aggregation hub")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "TABLEAU_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = HubConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tableau_hub={0},tableau_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tableau-hub v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let state = AppState::from_config(&config, system_clock()).context("Failed to initialize hub")?;
    info!(
        categories = state.rotation.categories().len(),
        modes = state.modes.registry().modes().len(),
        default_mode = %state.modes.registry().default_mode().name,
        "Hub initialized"
    );

    let refresh_period = config
        .jobs
        .pool_refresh_interval_seconds
        .unwrap_or(config.rotation.pool_ttl_seconds.max(1) as u64);
    let publisher = jobs::spawn_snapshot_publisher(
        state.clone(),
        Duration::from_secs(config.jobs.broadcast_interval_seconds),
    );
    let refresher = jobs::spawn_pool_refresher(state.rotation.clone(), Duration::from_secs(refresh_period));
    let sweeper = jobs::spawn_cache_sweeper(
        &state.rotation,
        Duration::from_secs(config.cache.sweep_interval_seconds),
    );

    let app = build_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    publisher.abort();
    refresher.abort();
    sweeper.abort();

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
