//! Login and own-password change.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fifo_core::validation::validate_password;
use fifo_core::CoreError;

use crate::auth::{hash_password, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::MessageResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let users = state.db.users();

    let credentials = match users.find_credentials(username).await? {
        Some(c) if verify_password(&req.password, &c.password_hash) => c,
        _ => {
            warn!(username = %username, "Failed login attempt");
            return Err(CoreError::InvalidCredentials.into());
        }
    };

    let user = users
        .get_with_permissions(credentials.user.id)
        .await?
        .ok_or(CoreError::InvalidCredentials)?;

    let token = state.jwt.issue(&user)?;
    info!(user_id = user.user.id, username = %user.user.username, "User logged in");

    Ok(Json(LoginResponse { token }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// `PUT /api/user/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    validate_password(&req.new_password)?;

    let users = state.db.users();
    let credentials = users
        .find_credentials_by_id(auth.user().id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !verify_password(&req.old_password, &credentials.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let hash = hash_password(&req.new_password)?;
    users.set_password_hash(auth.user().id, &hash).await?;

    info!(user_id = auth.user().id, "Password changed");
    Ok(Json(MessageResponse::new("Password changed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{login, send, test_app, ADMIN_PASSWORD};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_returns_token_with_claims() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let claims = state.jwt.validate(&token).unwrap();
        assert_eq!(claims.user, "admin");
        assert_eq!(claims.role, fifo_core::Role::Admin);
        assert_eq!(claims.permissions.len(), 8);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (app, _) = test_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "admin", "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "ghost", "password": "whatever" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        let (status, _) = send(
            &app,
            "PUT",
            "/api/user/change-password",
            Some(&token),
            Some(json!({ "oldPassword": "wrong", "newPassword": "new-secret" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            "PUT",
            "/api/user/change-password",
            Some(&token),
            Some(json!({ "oldPassword": ADMIN_PASSWORD, "newPassword": "new-secret" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        login(&app, "admin", "new-secret").await;
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (app, _) = test_app().await;

        let (status, _) = send(&app, "GET", "/api/fifo-queue", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "GET", "/api/fifo-queue", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
