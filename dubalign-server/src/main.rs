//! dubalign-server - audio synchronization backend
//!
//! HTTP service wrapping the dubalign engine: probes and extracts audio
//! tracks, detects the offset between two sources, and muxes the
//! aligned track back into the container.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dubalign_server::config::ServiceConfig;
use dubalign_server::AppState;

/// Command-line arguments for dubalign-server
#[derive(Parser, Debug)]
#[command(name = "dubalign-server")]
#[command(about = "Audio synchronization backend")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "DUBALIGN_PORT")]
    port: Option<u16>,

    /// Directory for intermediate artifacts
    #[arg(short, long, env = "DUBALIGN_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "DUBALIGN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dubalign_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = ServiceConfig::resolve(args.config.as_deref(), args.port, args.temp_dir)
        .context("Failed to resolve configuration")?;

    info!("Starting dubalign-server on port {}", config.port);
    info!("Artifact cache: {}", config.temp_dir.display());
    info!(
        "Analysis: {} Hz, FFT {}, hop {}",
        config.analysis.sample_rate_hz, config.analysis.fft_size, config.analysis.hop_size
    );

    let state = AppState::new(config.clone()).context("Failed to initialize state")?;
    let app = dubalign_server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
