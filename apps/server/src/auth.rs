//! # Authentication
//!
//! JWT issuance and validation, password hashing, and the request guard.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Authorization: Bearer <jwt>   or   ?token=<jwt>   (WebSocket clients)  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  require_auth ── no token / bad signature / expired ──► 401            │
//! │        │                                                                │
//! │        ▼  claims.sub = user id                                          │
//! │  reload user + role permissions from the DB ── user gone ──► 401       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  request.extensions += AuthUser ──► handler                            │
//! │                                     └─ user.require(Permission) ─► 403 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Permissions in the token are informational for the frontend. The guard
//! always trusts the database, so a role change applies on the next request.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::request::Parts;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use fifo_core::{Permission, Role, User, UserWithPermissions};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

// =============================================================================
// Claims
// =============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Username
    pub user: String,

    #[serde(rename = "fullName")]
    pub full_name: String,

    pub role: Role,

    pub permissions: Vec<Permission>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// JWT token manager.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Issues a session token for a user.
    pub fn issue(&self, user: &UserWithPermissions) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.user.id.to_string(),
            user: user.user.username.clone(),
            full_name: user.user.full_name.clone(),
            role: user.user.role,
            permissions: user.permissions.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(ApiError::internal)
    }

    /// Validates signature and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected token");
                ApiError::unauthorized("Invalid or expired token")
            })
    }
}

// =============================================================================
// Passwords
// =============================================================================

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> ApiResult<String> {
    // A v4 uuid is 122 bits from the OS RNG.
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ApiError::internal(format!("Failed to build salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Checks a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// AuthUser
// =============================================================================

/// The authenticated user, with the current permissions of their role.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserWithPermissions);

impl AuthUser {
    pub fn user(&self) -> &User {
        &self.0.user
    }

    /// Fails with 403 unless the user's role grants `permission`.
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        if self.0.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Missing permission {}",
                permission
            )))
        }
    }
}

/// Extract AuthUser from request extensions (set by `require_auth`).
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

// =============================================================================
// Middleware
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Rejects the request with 401 unless it carries a valid token for an
/// existing user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Read the token before awaiting: the body is not Sync.
    let token = token_from_request(&request);

    match authenticate(&state, token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

async fn authenticate(state: &AppState, token: Option<String>) -> ApiResult<AuthUser> {
    let token = token.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let claims = state.jwt.validate(&token)?;
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    state
        .db
        .users()
        .get_with_permissions(user_id)
        .await?
        .map(AuthUser)
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))
}

/// Bearer header first, then the `token` query parameter.
fn token_from_request(request: &Request<Body>) -> Option<String> {
    let from_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string);

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty())
    })
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, permissions: Vec<Permission>) -> UserWithPermissions {
        UserWithPermissions {
            user: User {
                id: 7,
                full_name: "Ana Lima".into(),
                username: "ana".into(),
                sector: "Geral".into(),
                role_id: 2,
                role,
                created_at: Utc::now(),
            },
            permissions,
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 3600);
        let token = manager
            .issue(&user(Role::Leader, vec![Permission::ViewLogs]))
            .unwrap();

        let claims = manager.validate(&token).unwrap();
        assert_eq!(claims.user_id(), Some(7));
        assert_eq!(claims.user, "ana");
        assert_eq!(claims.full_name, "Ana Lima");
        assert_eq!(claims.role, Role::Leader);
        assert_eq!(claims.permissions, vec![Permission::ViewLogs]);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("one", 3600)
            .issue(&user(Role::Fifo, vec![]))
            .unwrap();
        assert!(JwtManager::new("two", 3600).validate(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway.
        let token = JwtManager::new("secret", -600)
            .issue(&user(Role::Fifo, vec![]))
            .unwrap();
        assert!(JwtManager::new("secret", 3600).validate(&token).is_err());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));

        // Fresh salt per hash.
        assert_ne!(hash, hash_password("correct horse").unwrap());
    }

    #[test]
    fn test_require_permission() {
        let auth = AuthUser(user(Role::Fifo, vec![Permission::ManageFifo]));
        assert!(auth.require(Permission::ManageFifo).is_ok());

        let err = auth.require(Permission::ViewLogs).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Forbidden);
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_token_from_query() {
        let request = Request::builder()
            .uri("/api/ws?token=abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_request(&request).as_deref(), Some("abc.def.ghi"));

        let request = Request::builder()
            .uri("/api/ws?token=from-query")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_request(&request).as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_guard_runs_on_spawned_task() {
        use crate::handlers::testing::{login, test_app, ADMIN_PASSWORD};
        use tower::ServiceExt;

        let (app, _) = test_app().await;
        let token = login(&app, "admin", ADMIN_PASSWORD).await;

        // The guarded router must be Send to be driven from another task.
        let request = Request::builder()
            .uri(format!("/api/backlog-count?token={}", token))
            .body(Body::empty())
            .unwrap();
        let status = tokio::spawn(app.clone().oneshot(request))
            .await
            .unwrap()
            .unwrap()
            .status();
        assert_eq!(status, axum::http::StatusCode::OK);

        let request = Request::builder()
            .uri("/api/backlog-count")
            .body(Body::empty())
            .unwrap();
        let status = tokio::spawn(app.oneshot(request))
            .await
            .unwrap()
            .unwrap()
            .status();
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    }
}
