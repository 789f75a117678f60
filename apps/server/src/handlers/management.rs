//! User administration and the audit log.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use fifo_core::validation::{
    validate_full_name, validate_password, validate_sector, validate_username,
};
use fifo_core::{AuditAction, AuditLog, AuditLogFilter, Permission, RoleInfo, User};
use fifo_db::{NewUser, UserUpdate};

use crate::auth::{hash_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{DataResponse, MessageResponse};
use crate::AppState;

// =============================================================================
// Requests / Responses
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub full_name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub role_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role_id: Option<i64>,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// Query string of `GET /api/management/logs`. Empty values are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub username: Option<String>,
    #[serde(rename = "fullname")]
    pub full_name: Option<String>,
    pub action: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/management/roles`
pub async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<DataResponse<Vec<RoleInfo>>>> {
    auth.require(Permission::EditUser)?;
    Ok(Json(DataResponse::new(state.db.users().list_roles().await?)))
}

/// `GET /api/management/users`
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<DataResponse<Vec<User>>>> {
    auth.require(Permission::ViewUsers)?;
    Ok(Json(DataResponse::new(state.db.users().list().await?)))
}

/// `POST /api/management/users`
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    auth.require(Permission::CreateUser)?;

    let full_name = validate_full_name(&req.full_name)?;
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    let sector = match req.sector.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(validate_sector(s)?),
        _ => None,
    };

    let user = state
        .db
        .users()
        .create(&NewUser {
            full_name,
            username,
            password_hash: hash_password(&req.password)?,
            sector,
            role_id: req.role_id,
        })
        .await?;

    info!(
        user_id = user.id,
        username = %user.username,
        role = %user.role,
        created_by = %auth.user().username,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User created".to_string(),
            user,
        }),
    ))
}

/// `PUT /api/management/users/{id}`
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    auth.require(Permission::EditUser)?;

    let update = UserUpdate {
        full_name: req.full_name.as_deref().map(validate_full_name).transpose()?,
        role_id: req.role_id,
        sector: req.sector.as_deref().map(validate_sector).transpose()?,
    };

    let user = state.db.users().update(id, &update).await?;

    info!(user_id = id, updated_by = %auth.user().username, "User updated");
    Ok(Json(UserResponse {
        message: "User updated".to_string(),
        user,
    }))
}

/// `PUT /api/management/users/{id}/reset-password`
pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    auth.require(Permission::ResetPassword)?;
    validate_password(&req.new_password)?;

    let hash = hash_password(&req.new_password)?;
    state.db.users().set_password_hash(id, &hash).await?;

    info!(user_id = id, reset_by = %auth.user().username, "Password reset");
    Ok(Json(MessageResponse::new("Password reset")))
}

/// `GET /api/management/logs`
pub async fn list_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<DataResponse<Vec<AuditLog>>>> {
    auth.require(Permission::ViewLogs)?;

    let filter = query.into_filter()?;
    Ok(Json(DataResponse::new(
        state.db.audit_logs().list(&filter).await?,
    )))
}

impl LogsQuery {
    fn into_filter(self) -> ApiResult<AuditLogFilter> {
        Ok(AuditLogFilter {
            username: non_empty(self.username),
            full_name: non_empty(self.full_name),
            action: non_empty(self.action)
                .map(|a| a.parse::<AuditAction>())
                .transpose()?,
            start_date: parse_date("startDate", self.start_date)?,
            end_date: parse_date("endDate", self.end_date)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: Option<String>) -> ApiResult<Option<NaiveDate>> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request(format!("{} must be YYYY-MM-DD", field)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{create_operator, login, send, test_app, ADMIN_PASSWORD};
    use fifo_core::Role;
    use serde_json::json;

    #[test]
    fn test_logs_query_to_filter() {
        let query = LogsQuery {
            username: Some("  ".into()),
            full_name: Some("Ana".into()),
            action: Some("saida".into()),
            start_date: Some("2026-03-01".into()),
            end_date: None,
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.username, None);
        assert_eq!(filter.full_name.as_deref(), Some("Ana"));
        assert_eq!(filter.action, Some(AuditAction::Exit));
        assert!(filter.start_date.is_some());

        let bad = LogsQuery {
            start_date: Some("01/03/2026".into()),
            ..Default::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[tokio::test]
    async fn test_create_and_list_users() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;
        let fifo_role = state.db.users().role_id(Role::Fifo).await.unwrap().unwrap();

        let (status, body) = send(
            &app,
            "POST",
            "/api/management/users",
            Some(&token),
            Some(json!({
                "fullName": "Bruno Costa",
                "username": "bruno",
                "password": "bruno-pass",
                "roleId": fifo_role
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["role"], "fifo");
        assert_eq!(body["user"]["sector"], fifo_core::DEFAULT_SECTOR);

        let (status, _) = send(
            &app,
            "POST",
            "/api/management/users",
            Some(&token),
            Some(json!({
                "fullName": "Bruno Again",
                "username": "bruno",
                "password": "bruno-pass",
                "roleId": fifo_role
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/api/management/users",
            Some(&token),
            Some(json!({
                "fullName": "Nobody",
                "username": "nobody",
                "password": "nobody-pass",
                "roleId": 999
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", "/api/management/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let users = body["data"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
    }

    #[tokio::test]
    async fn test_update_and_reset_password() {
        let (app, state) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;
        let operator_id = create_operator(&state).await;
        let leader_role = state.db.users().role_id(Role::Leader).await.unwrap().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/management/users/{}", operator_id),
            Some(&token),
            Some(json!({ "roleId": leader_role, "sector": "Expedição" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "leader");
        assert_eq!(body["user"]["fullName"], "Floor Operator");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/management/users/999/reset-password",
            Some(&token),
            Some(json!({ "newPassword": "whatever" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/management/users/{}/reset-password", operator_id),
            Some(&token),
            Some(json!({ "newPassword": "fresh-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        login(&app, "operator", "fresh-pass").await;
    }

    #[tokio::test]
    async fn test_logs_newest_first_and_filtered() {
        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        for id in ["CAGE-1", "CAGE-2"] {
            send(
                &app,
                "POST",
                "/api/entry",
                Some(&token),
                Some(json!({ "trackingId": id, "buffer": "RTS", "rua": "R01" })),
            )
            .await;
        }
        send(
            &app,
            "POST",
            "/api/exit",
            Some(&token),
            Some(json!({ "trackingId": "CAGE-1" })),
        )
        .await;

        let (status, body) = send(&app, "GET", "/api/management/logs", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let logs = body["data"].as_array().unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0]["action"], "SAIDA");

        let (_, body) = send(
            &app,
            "GET",
            "/api/management/logs?action=ENTRADA&username=adm",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, _) = send(
            &app,
            "GET",
            "/api/management/logs?action=DANCE",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
