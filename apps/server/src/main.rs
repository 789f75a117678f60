//! # FIFO Server
//!
//! Warehouse FIFO tracker: HTTP API plus the real-time queue hub.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           FIFO Server                                   │
//! │                                                                         │
//! │  Browser ──► HTTP (3001) ──► Handlers ──► SQLite (fifo-db)             │
//! │     ▲                           │                                       │
//! │     │                           ▼ notify_queue_changed()                │
//! │     └──── WebSocket /api/ws ◄── Hub (fifo-hub) ◄── DbSnapshotProvider  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Order
//! 1. Logging, then config (file → env overrides → validate)
//! 2. Database pool + migrations + role/admin seed
//! 3. Hub event loop
//! 4. HTTP listener until Ctrl+C / SIGTERM
//! 5. Hub shutdown (closes every observer), then the pool

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fifo_db::{AdminSeed, Database};
use fifo_hub::Hub;
use fifo_server::auth::hash_password;
use fifo_server::{build_router, AppState, DbSnapshotProvider, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "fifo_server=info,fifo_hub=info,fifo_db=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting FIFO server...");

    // Load configuration
    let config = ServerConfig::load(None).context("Failed to load configuration")?;
    let addr = config.socket_addr()?;
    info!(
        %addr,
        database = %config.database.path.display(),
        frontend_url = %config.server.frontend_url,
        "Configuration loaded"
    );

    // Open database and seed roles + first admin
    let db = Database::new(config.db_config())
        .await
        .context("Failed to open database")?;

    let admin_hash = hash_password(&config.seed.admin_password)?;
    db.seed(&AdminSeed::new(config.seed.admin_username.clone(), admin_hash))
        .await
        .context("Failed to seed database")?;
    info!("Database ready");

    // Start the hub
    let hub = Hub::spawn(DbSnapshotProvider::new(db.clone()), config.hub.clone());

    let state = AppState::new(db.clone(), hub.clone(), config);
    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening for HTTP and WebSocket connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = hub.shutdown().await {
        warn!(error = %err, "Hub was already stopped");
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
