//! Storefront API server
//!
//! This is the main entry point for the application.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use storefront::{
    config,
    web::{create_router, AppState},
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storefront", version)]
#[command(about = "Product catalog, reviews and account API")]
#[command(after_help = "ENVIRONMENT VARIABLES:
    STOREFRONT_PORT           Server port
    STOREFRONT_BIND_ADDRESS   Bind address
    STOREFRONT_BACKEND        memory or firebase
    STOREFRONT_PROJECT_ID     Cloud project id
    STOREFRONT_API_KEY        Web API key
    STOREFRONT_ACCESS_TOKEN   OAuth token for the document store
    STOREFRONT_SEED_FILE      JSON seed for the memory backend
    RUST_LOG                  Log filter (default: info)")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "STOREFRONT_SETTINGS_PATH", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Starting storefront v{}", storefront::VERSION);

    // Load configuration
    let settings = config::load(args.config.as_deref())?;
    info!("Backend: {:?}", settings.backend.kind);

    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);

    // Create application state
    let state = AppState::new(settings).await?;
    info!("Application state initialized");

    let app = create_router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
