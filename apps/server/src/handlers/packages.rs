//! Queue operations: entry, exit, move, and the read endpoints.
//!
//! Every successful mutation triggers exactly one hub broadcast, after the
//! repository has committed. A same-rua move changes nothing and broadcasts
//! nothing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use fifo_core::validation::{validate_entry_buffer, validate_rua, validate_tracking_id};
use fifo_core::{BufferCounts, Package, Permission};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::DataResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub tracking_id: String,
    pub buffer: String,
    pub rua: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    pub tracking_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub rua: String,
}

/// Result of a queue mutation.
#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub message: String,
    pub package: Package,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

/// `POST /api/entry`
pub async fn entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<EntryRequest>,
) -> ApiResult<(StatusCode, Json<PackageResponse>)> {
    auth.require(Permission::ManageFifo)?;

    let tracking_id = validate_tracking_id(&req.tracking_id)?;
    let buffer = validate_entry_buffer(&req.buffer)?;
    let rua = validate_rua(&req.rua)?;

    let package = state
        .db
        .packages()
        .enter(&tracking_id, buffer, &rua, auth.user())
        .await?;

    info!(
        tracking_id = %package.tracking_id,
        buffer = %package.buffer,
        rua = %package.rua,
        username = %auth.user().username,
        "Package entered queue"
    );
    state.notify_queue_changed();

    Ok((
        StatusCode::CREATED,
        Json(PackageResponse {
            message: "Entry registered".to_string(),
            package,
        }),
    ))
}

/// `POST /api/exit`
pub async fn exit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ExitRequest>,
) -> ApiResult<Json<PackageResponse>> {
    auth.require(Permission::ManageFifo)?;

    let tracking_id = validate_tracking_id(&req.tracking_id)?;
    let package = state.db.packages().exit(&tracking_id, auth.user()).await?;

    info!(
        tracking_id = %package.tracking_id,
        username = %auth.user().username,
        "Package left queue"
    );
    state.notify_queue_changed();

    Ok(Json(PackageResponse {
        message: "Package removed from queue".to_string(),
        package,
    }))
}

/// `PUT /api/package/move/{id}`
pub async fn move_package(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<PackageResponse>> {
    auth.require(Permission::MovePackage)?;

    let rua = validate_rua(&req.rua)?;
    let outcome = state.db.packages().move_to(id, &rua, auth.user()).await?;

    let message = if outcome.is_changed() {
        info!(package_id = id, rua = %rua, username = %auth.user().username, "Package moved");
        state.notify_queue_changed();
        "Package moved"
    } else {
        "Package already at this rua"
    };

    Ok(Json(PackageResponse {
        message: message.to_string(),
        package: outcome.package().clone(),
    }))
}

/// `GET /api/fifo-queue`
pub async fn queue(State(state): State<AppState>) -> ApiResult<Json<DataResponse<Vec<Package>>>> {
    let items = state.db.packages().list_queue().await?;
    Ok(Json(DataResponse::new(items)))
}

/// `GET /api/backlog-count`
pub async fn backlog_count(State(state): State<AppState>) -> ApiResult<Json<CountResponse>> {
    let count = state.db.packages().backlog_count().await?;
    Ok(Json(CountResponse { count }))
}

/// `GET /api/buffer-counts`
pub async fn buffer_counts(State(state): State<AppState>) -> ApiResult<Json<BufferCounts>> {
    Ok(Json(state.db.packages().buffer_counts().await?))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::{
        create_operator, login, send, test_app, ADMIN_PASSWORD, OPERATOR_PASSWORD,
    };
    use axum::extract::ws::Message;
    use axum::http::StatusCode;
    use fifo_core::{AuditLogFilter, Role};
    use fifo_hub::ObserverIdentity;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn entry(app: &axum::Router, token: &str, tracking_id: &str, buffer: &str) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            "/api/entry",
            Some(token),
            Some(json!({ "trackingId": tracking_id, "buffer": buffer, "rua": "R01" })),
        )
        .await
    }

    #[tokio::test]
    async fn test_entry_then_queue_in_fifo_order() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (status, body) = entry(&app, &token, "CAGE-1", "RTS").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["package"]["trackingId"], "CAGE-1");
        entry(&app, &token, "CAGE-2", "sal").await;

        let (status, body) = send(&app, "GET", "/api/fifo-queue", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["trackingId"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["CAGE-1", "CAGE-2"]);

        let (_, body) = send(&app, "GET", "/api/backlog-count", Some(&token), None).await;
        assert_eq!(body["count"], 2);

        let (_, body) = send(&app, "GET", "/api/buffer-counts", Some(&token), None).await;
        assert_eq!(body, json!({ "RTS": 1, "EHA": 0, "SAL": 1 }));
    }

    #[tokio::test]
    async fn test_entry_validation_and_conflict() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (status, _) = entry(&app, &token, "CAGE-1", "PENDENTE").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = entry(&app, &token, "   ", "RTS").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        entry(&app, &token, "CAGE-1", "RTS").await;
        let (status, body) = entry(&app, &token, "CAGE-1", "EHA").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_exit_statuses() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let exit = |id: &'static str| {
            let app = app.clone();
            let token = token.clone();
            async move {
                send(&app, "POST", "/api/exit", Some(&token), Some(json!({ "trackingId": id })))
                    .await
                    .0
            }
        };

        assert_eq!(exit("NOPE-1").await, StatusCode::NOT_FOUND);

        state
            .db
            .packages()
            .register_pending(&["PEND-1".to_string()])
            .await
            .unwrap();
        assert_eq!(exit("PEND-1").await, StatusCode::CONFLICT);

        entry(&app, &token, "CAGE-1", "EHA").await;
        assert_eq!(exit("CAGE-1").await, StatusCode::OK);
        assert_eq!(exit("CAGE-1").await, StatusCode::NOT_FOUND);

        let logs = state.db.audit_logs().list(&AuditLogFilter::default()).await.unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_move_same_rua_is_noop() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (_, body) = entry(&app, &token, "CAGE-1", "RTS").await;
        let id = body["package"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/package/move/{}", id),
            Some(&token),
            Some(json!({ "rua": "R01" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["package"]["rua"], "R01");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/package/move/{}", id),
            Some(&token),
            Some(json!({ "rua": "R09" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["package"]["rua"], "R09");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/package/move/9999",
            Some(&token),
            Some(json!({ "rua": "R02" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Entry + one real move.
        let logs = state.db.audit_logs().list(&AuditLogFilter::default()).await.unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_operator_permissions() {
        let (app, state) = test_app().await;
        create_operator(&state).await;
        let token = login(&app, "operator", OPERATOR_PASSWORD).await;

        let (status, _) = entry(&app, &token, "CAGE-1", "RTS").await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&app, "GET", "/api/management/logs", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "POST",
            "/api/qrcodes/generate-data",
            Some(&token),
            Some(json!({ "count": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    async fn next_frame(rx: &mut mpsc::Receiver<Message>) -> Value {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_entry_broadcasts_to_observers() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (observer, mut rx) = state.hub.observer(ObserverIdentity {
            user_id: 99,
            username: "watcher".into(),
            full_name: "Watcher".into(),
            role: Role::Fifo,
            sector: "Geral".into(),
        });
        state.hub.register(observer).unwrap();

        let initial = next_frame(&mut rx).await;
        assert_eq!(initial["backlog"], 0);

        entry(&app, &token, "CAGE-7", "EHA").await;

        let update = next_frame(&mut rx).await;
        assert_eq!(update["type"], "queue_update");
        assert_eq!(update["backlog"], 1);
        assert_eq!(update["queue"][0]["trackingId"], "CAGE-7");
        assert_eq!(update["bufferCounts"]["EHA"], 1);
    }

    #[tokio::test]
    async fn test_failed_and_unchanged_mutations_do_not_broadcast() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (_, body) = entry(&app, &token, "CAGE-1", "RTS").await;
        let id = body["package"]["id"].as_i64().unwrap();

        let (observer, mut rx) = state.hub.observer(ObserverIdentity {
            user_id: 42,
            username: "floor".into(),
            full_name: "Floor".into(),
            role: Role::Fifo,
            sector: "Geral".into(),
        });
        state.hub.register(observer).unwrap();
        assert_eq!(next_frame(&mut rx).await["backlog"], 1);

        let (status, _) = entry(&app, &token, "CAGE-1", "EHA").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/api/exit",
            Some(&token),
            Some(json!({ "trackingId": "NOPE-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/package/move/{}", id),
            Some(&token),
            Some(json!({ "rua": "R01" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The hub handles events in order, so once the roster answers any
        // broadcast queued by the requests above has been pushed.
        state.hub.roster().await.unwrap();
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Empty)));

        // A real change still goes out.
        send(
            &app,
            "POST",
            "/api/exit",
            Some(&token),
            Some(json!({ "trackingId": "CAGE-1" })),
        )
        .await;
        assert_eq!(next_frame(&mut rx).await["backlog"], 0);
    }
}
