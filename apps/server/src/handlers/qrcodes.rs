//! Label pre-registration.
//!
//! ```text
//! generate-data {count}      → fresh IDs, nothing stored
//! confirm {trackingIds}      → stored as PENDENTE (labels were printed)
//! entry scan (packages.rs)   → PENDENTE becomes RTS/EHA/SAL
//! ```
//!
//! Pending packages never show up in the queue, so none of these broadcast.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use fifo_core::validation::{validate_qr_count, validate_tracking_id};
use fifo_core::{CoreError, Package, Permission, MAX_QR_BATCH};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::DataResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub tracking_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub message: String,
    pub created: u64,
}

/// `POST /api/qrcodes/generate-data`
pub async fn generate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<DataResponse<Vec<String>>>> {
    auth.require(Permission::GenerateQrCodes)?;

    let count = validate_qr_count(req.count)?;
    let ids = state.db.packages().generate_tracking_ids(count).await?;

    info!(count, username = %auth.user().username, "Generated label IDs");
    Ok(Json(DataResponse::new(ids)))
}

/// `POST /api/qrcodes/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    auth.require(Permission::GenerateQrCodes)?;

    if req.tracking_ids.is_empty() {
        return Err(ApiError::bad_request("trackingIds is required"));
    }
    if req.tracking_ids.len() > MAX_QR_BATCH as usize {
        return Err(ApiError::bad_request(format!(
            "At most {} tracking IDs per batch",
            MAX_QR_BATCH
        )));
    }

    let ids = req
        .tracking_ids
        .iter()
        .map(|id| validate_tracking_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    let created = state.db.packages().register_pending(&ids).await?;

    info!(
        requested = ids.len(),
        created,
        username = %auth.user().username,
        "Label IDs pre-registered"
    );
    Ok(Json(ConfirmResponse {
        message: format!("{} labels registered", created),
        created,
    }))
}

/// `GET /api/qrcodes/find/{tracking_id}`
pub async fn find(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tracking_id): Path<String>,
) -> ApiResult<Json<DataResponse<Package>>> {
    auth.require(Permission::GenerateQrCodes)?;

    let tracking_id = validate_tracking_id(&tracking_id)?;
    let package = state
        .db
        .packages()
        .find_by_tracking_id(&tracking_id)
        .await?
        .ok_or(CoreError::PackageNotFound(tracking_id))?;

    Ok(Json(DataResponse::new(package)))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::{login, send, test_app, ADMIN_PASSWORD};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_confirm_find() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/qrcodes/generate-data",
            Some(&token),
            Some(json!({ "count": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<String> = serde_json::from_value(body["data"].clone()).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.starts_with("FIFO-")));

        let (status, body) = send(
            &app,
            "POST",
            "/api/qrcodes/confirm",
            Some(&token),
            Some(json!({ "trackingIds": ids })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], 3);

        // Confirming again skips existing IDs.
        let (_, body) = send(
            &app,
            "POST",
            "/api/qrcodes/confirm",
            Some(&token),
            Some(json!({ "trackingIds": ids })),
        )
        .await;
        assert_eq!(body["created"], 0);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/qrcodes/find/{}", ids[0]),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["buffer"], "PENDENTE");

        // Pending labels are not in the queue.
        let (_, body) = send(&app, "GET", "/api/backlog-count", Some(&token), None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_generate_count_bounds() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        for count in [0, 501] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/qrcodes/generate-data",
                Some(&token),
                Some(json!({ "count": count })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_find_unknown_is_404() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (status, _) = send(&app, "GET", "/api/qrcodes/find/NOPE-1", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
