//! # User Repository
//!
//! Accounts, roles and role permissions.
//!
//! Every user query joins `roles` so the returned [`User`] carries its
//! role name. Password hashes only leave this module inside
//! [`UserCredentials`].

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use fifo_core::{CoreError, Permission, Role, RoleInfo, User, UserWithPermissions};

const USER_SELECT: &str = "SELECT u.id, u.full_name, u.username, u.sector, u.role_id, \
     r.name AS role, u.created_at \
     FROM users u JOIN roles r ON r.id = u.role_id";

const CREDENTIALS_SELECT: &str = "SELECT u.id, u.full_name, u.username, u.sector, u.role_id, \
     r.name AS role, u.created_at, u.password_hash \
     FROM users u JOIN roles r ON r.id = u.role_id";

/// A user together with the stored password hash, for login checks.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Fields for creating a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub password_hash: String,
    /// `None` falls back to the default sector.
    pub sector: Option<String>,
    pub role_id: i64,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role_id: Option<i64>,
    pub sector: Option<String>,
}

/// Repository for user and role database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("{} WHERE u.id = ?1", USER_SELECT);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Loads a user and their password hash by username.
    pub async fn find_credentials(&self, username: &str) -> DbResult<Option<UserCredentials>> {
        let sql = format!("{} WHERE u.username = ?1", CREDENTIALS_SELECT);
        let creds = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(creds)
    }

    /// Loads a user and their password hash by ID.
    pub async fn find_credentials_by_id(&self, id: i64) -> DbResult<Option<UserCredentials>> {
        let sql = format!("{} WHERE u.id = ?1", CREDENTIALS_SELECT);
        let creds = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(creds)
    }

    /// Loads a user with the permissions of their role.
    ///
    /// Used by the auth middleware on every request, so role changes take
    /// effect without re-issuing tokens.
    pub async fn get_with_permissions(&self, id: i64) -> DbResult<Option<UserWithPermissions>> {
        let Some(user) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let permissions = self.permissions_for_role(user.role_id).await?;

        Ok(Some(UserWithPermissions { user, permissions }))
    }

    /// Permissions granted to a role.
    pub async fn permissions_for_role(&self, role_id: i64) -> DbResult<Vec<Permission>> {
        let permissions = sqlx::query_scalar::<_, Permission>(
            r#"
            SELECT p.name FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = ?1
            ORDER BY p.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    /// Lists all users ordered by full name.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("{} ORDER BY u.full_name, u.id", USER_SELECT);
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Creates a user.
    ///
    /// ## Errors
    /// - `Domain(UnknownRole)` if `role_id` does not exist
    /// - `UniqueViolation` if the username is taken
    pub async fn create(&self, new_user: &NewUser) -> DbResult<User> {
        debug!(username = %new_user.username, role_id = new_user.role_id, "Creating user");

        if !self.role_exists(new_user.role_id).await? {
            return Err(CoreError::UnknownRole(new_user.role_id.to_string()).into());
        }

        let now = Utc::now();
        let sector = new_user
            .sector
            .clone()
            .unwrap_or_else(|| fifo_core::DEFAULT_SECTOR.to_string());

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users
                (full_name, username, password_hash, sector, role_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id
            "#,
        )
        .bind(&new_user.full_name)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&sector)
        .bind(new_user.role_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        let id = match inserted {
            Ok(id) => id,
            Err(err) => {
                return Err(match DbError::from(err) {
                    DbError::UniqueViolation { .. } => {
                        DbError::duplicate("username", new_user.username.clone())
                    }
                    other => other,
                })
            }
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id.to_string()))
    }

    /// Applies a partial update to a user.
    ///
    /// ## Errors
    /// - `Domain(UserNotFound)` if the user does not exist
    /// - `Domain(UnknownRole)` if a new `role_id` does not exist
    pub async fn update(&self, id: i64, update: &UserUpdate) -> DbResult<User> {
        debug!(id, "Updating user");

        if let Some(role_id) = update.role_id {
            if !self.role_exists(role_id).await? {
                return Err(CoreError::UnknownRole(role_id.to_string()).into());
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE users SET
                full_name = COALESCE(?2, full_name),
                role_id = COALESCE(?3, role_id),
                sector = COALESCE(?4, sector),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.full_name.as_deref())
        .bind(update.role_id)
        .bind(update.sector.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::UserNotFound(id.to_string()).into());
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(id.to_string()).into())
    }

    /// Replaces a user's password hash.
    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> DbResult<()> {
        debug!(id, "Setting password hash");

        let result = sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::UserNotFound(id.to_string()).into());
        }

        Ok(())
    }

    /// Lists roles with their permissions.
    pub async fn list_roles(&self) -> DbResult<Vec<RoleInfo>> {
        let rows = sqlx::query_as::<_, (i64, Role)>("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for (id, name) in rows {
            let permissions = self.permissions_for_role(id).await?;
            roles.push(RoleInfo {
                id,
                name,
                permissions,
            });
        }

        Ok(roles)
    }

    /// Row ID of a named role, if seeded.
    pub async fn role_id(&self, role: Role) -> DbResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM roles WHERE name = ?1")
            .bind(role)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id)
    }

    async fn role_exists(&self, role_id: i64) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE id = ?1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }
}
