//! Unauthenticated endpoints: TV boards polling the queue, clock sync and
//! the health probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use serde::Serialize;
use tracing::warn;

use fifo_core::Package;

use crate::error::ApiResult;
use crate::handlers::packages::CountResponse;
use crate::handlers::DataResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    /// Embedded migrations not applied yet, `None` when the database is down.
    pub pending_migrations: Option<usize>,
    /// Connected observers, `None` when the hub is not running.
    pub online: Option<usize>,
}

/// `GET /public/time`
pub async fn server_time() -> Json<ServerTimeResponse> {
    Json(ServerTimeResponse {
        server_time: Local::now().to_rfc3339(),
    })
}

/// `GET /public/fifo-queue`
pub async fn queue(State(state): State<AppState>) -> ApiResult<Json<DataResponse<Vec<Package>>>> {
    let items = state.db.packages().list_queue().await?;
    Ok(Json(DataResponse::new(items)))
}

/// `GET /public/backlog-count`
pub async fn backlog_count(State(state): State<AppState>) -> ApiResult<Json<CountResponse>> {
    let count = state.db.packages().backlog_count().await?;
    Ok(Json(CountResponse { count }))
}

/// `GET /health`
///
/// 200 when the database answers and its schema is current, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let pending_migrations = match state.db.pending_migrations().await {
        Ok(pending) => Some(pending),
        Err(err) => {
            warn!(error = %err, "Could not read migration status");
            None
        }
    };
    let online = match state.hub.online_count().await {
        Ok(count) => Some(count),
        Err(err) => {
            warn!(error = %err, "Hub did not answer health probe");
            None
        }
    };

    let (status, label) = if database && pending_migrations == Some(0) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            database,
            pending_migrations,
            online,
        }),
    )
}
