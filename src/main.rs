//! Chunk Relay Server
//!
//! Receives registered files in verified chunks and reassembles them.

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chunk_relay::config::Config;
use chunk_relay::routes;
use chunk_relay::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "chunk-relay", version, about = "Chunked file transfer receiver")]
struct Args {
    /// Address to bind (overrides SERVER_HOST)
    host: Option<String>,

    /// Port to bind (overrides SERVER_PORT)
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "chunk_relay=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    dotenvy::dotenv().ok();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Starting Chunk Relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Chunk directory: {}", config.storage.chunk_dir.display());
    tracing::info!("Output directory: {}", config.storage.output_dir.display());
    tracing::info!("Ledger: {}", config.storage.ledger_path.display());

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config);
    let reaper = state.reaper().start();

    let app = routes::app(state);

    tracing::info!("Chunk Relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    reaper.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
