//! # Default Data
//!
//! Idempotent seeding of permissions, roles and the initial admin account.
//!
//! ```text
//!  permissions ──► roles ──► role_permissions ──► admin user (if missing)
//! ```
//!
//! Every statement uses `INSERT OR IGNORE`, so running the seed on every
//! startup is safe. The admin password arrives already hashed; hashing
//! belongs to the server's auth module.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use fifo_core::{Permission, Role};

/// Initial administrator account.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub sector: String,
}

impl AdminSeed {
    /// Creates a seed with the default display name and sector.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        AdminSeed {
            username: username.into(),
            password_hash: password_hash.into(),
            full_name: "System Administrator".to_string(),
            sector: "Administration".to_string(),
        }
    }
}

/// Inserts any missing permissions, roles, grants and the admin user.
pub(crate) async fn seed_defaults(pool: &SqlitePool, admin: &AdminSeed) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    for permission in Permission::ALL {
        sqlx::query("INSERT OR IGNORE INTO permissions (name) VALUES (?1)")
            .bind(permission)
            .execute(&mut *tx)
            .await?;
    }

    for role in Role::ALL {
        sqlx::query("INSERT OR IGNORE INTO roles (name) VALUES (?1)")
            .bind(role)
            .execute(&mut *tx)
            .await?;

        for permission in role.default_permissions() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
                SELECT r.id, p.id FROM roles r, permissions p
                WHERE r.name = ?1 AND p.name = ?2
                "#,
            )
            .bind(role)
            .bind(*permission)
            .execute(&mut *tx)
            .await?;
        }
        debug!(role = %role, "Seeded role");
    }

    let now = Utc::now();
    let created = sqlx::query(
        r#"
        INSERT OR IGNORE INTO users
            (full_name, username, password_hash, sector, role_id, created_at, updated_at)
        SELECT ?1, ?2, ?3, ?4, id, ?5, ?5 FROM roles WHERE name = ?6
        "#,
    )
    .bind(&admin.full_name)
    .bind(&admin.username)
    .bind(&admin.password_hash)
    .bind(&admin.sector)
    .bind(now)
    .bind(Role::Admin)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    if created > 0 {
        info!(username = %admin.username, "Created initial admin user");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{AdminSeed, Database, DbConfig};
    use fifo_core::{Permission, Role};

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.seed(&AdminSeed::new("admin", "h1")).await.unwrap();
        db.seed(&AdminSeed::new("admin", "h2")).await.unwrap();

        let users = db.users().list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);

        // The second run must not overwrite the stored hash.
        let creds = db.users().find_credentials("admin").await.unwrap().unwrap();
        assert_eq!(creds.password_hash, "h1");
    }

    #[tokio::test]
    async fn test_roles_get_default_permissions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.seed(&AdminSeed::new("admin", "h")).await.unwrap();

        let roles = db.users().list_roles().await.unwrap();
        assert_eq!(roles.len(), 3);

        let fifo = roles.iter().find(|r| r.name == Role::Fifo).unwrap();
        assert!(fifo.permissions.contains(&Permission::ManageFifo));
        assert!(!fifo.permissions.contains(&Permission::ViewLogs));

        let admin = roles.iter().find(|r| r.name == Role::Admin).unwrap();
        assert_eq!(admin.permissions.len(), Permission::ALL.len());
    }
}
