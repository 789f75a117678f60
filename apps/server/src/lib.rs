//! # FIFO Server
//!
//! HTTP API and WebSocket endpoint for the warehouse FIFO tracker.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Route Map                                     │
//! │                                                                         │
//! │  PUBLIC                         PROTECTED (require_auth)               │
//! │  ──────                         ────────────────────────               │
//! │  POST /login                    POST /api/entry           MANAGE_FIFO  │
//! │  GET  /public/time              POST /api/exit            MANAGE_FIFO  │
//! │  GET  /public/fifo-queue        PUT  /api/package/move/:id MOVE_PACKAGE│
//! │  GET  /public/backlog-count     GET  /api/fifo-queue                   │
//! │  GET  /health                   GET  /api/backlog-count                │
//! │                                 GET  /api/buffer-counts                │
//! │                                 POST /api/qrcodes/*  GENERATE_QR_CODES │
//! │                                 GET  /api/management/*  (per route)    │
//! │                                 PUT  /api/user/change-password         │
//! │                                 GET  /api/ws  ──► fifo-hub session     │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  AppState (cloned into every handler)                            │  │
//! │  │   db: Database    hub: HubHandle    jwt    config                │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queue mutations commit first, then call [`AppState::notify_queue_changed`]
//! exactly once. A failed broadcast never fails the request that caused it.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod snapshot;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use fifo_db::Database;
use fifo_hub::HubHandle;

// Re-exports
pub use auth::JwtManager;
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use snapshot::DbSnapshotProvider;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: HubHandle,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, hub: HubHandle, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_lifetime_secs);
        AppState {
            db,
            hub,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }

    /// Pushes a fresh queue snapshot to every observer.
    ///
    /// Call after the mutation has committed. Failures are logged only.
    pub fn notify_queue_changed(&self) {
        if let Err(err) = self.hub.broadcast_queue_update() {
            warn!(error = %err, "Queue update broadcast not delivered to hub");
        }
    }
}

/// Builds the full router.
pub fn build_router(state: AppState) -> Router {
    use handlers::{management, packages, public, qrcodes, session, ws};

    let protected = Router::new()
        // Queue operations
        .route("/api/entry", post(packages::entry))
        .route("/api/exit", post(packages::exit))
        .route("/api/package/move/{id}", put(packages::move_package))
        .route("/api/fifo-queue", get(packages::queue))
        .route("/api/backlog-count", get(packages::backlog_count))
        .route("/api/buffer-counts", get(packages::buffer_counts))
        // Pre-registration
        .route("/api/qrcodes/generate-data", post(qrcodes::generate))
        .route("/api/qrcodes/confirm", post(qrcodes::confirm))
        .route("/api/qrcodes/find/{tracking_id}", get(qrcodes::find))
        // User management
        .route("/api/management/roles", get(management::list_roles))
        .route(
            "/api/management/users",
            get(management::list_users).post(management::create_user),
        )
        .route("/api/management/users/{id}", put(management::update_user))
        .route(
            "/api/management/users/{id}/reset-password",
            put(management::reset_password),
        )
        .route("/api/management/logs", get(management::list_logs))
        // Own account
        .route("/api/user/change-password", put(session::change_password))
        // Real-time
        .route("/api/ws", get(ws::upgrade))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let open = Router::new()
        .route("/login", post(session::login))
        .route("/public/time", get(public::server_time))
        .route("/public/fifo-queue", get(public::queue))
        .route("/public/backlog-count", get(public::backlog_count))
        .route("/health", get(public::health));

    open.merge(protected)
        .layer(cors_layer(&state.config.server.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if frontend_url == "*" {
        return layer.allow_origin(Any);
    }

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            warn!(frontend_url = %frontend_url, "Invalid frontend URL, CORS allows no origin");
            layer
        }
    }
}
