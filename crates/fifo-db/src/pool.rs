//! # Database Handle
//!
//! One SQLite pool shared by two kinds of callers:
//!
//! ```text
//!   HTTP handlers ── entry / exit / move ──► write tx (package + audit row)
//!                                                │ commit
//!                                                ▼
//!                                     hub.broadcast_queue_update()
//!                                                │
//!   hub event loop ── DbSnapshotProvider ──► read: queue + counts
//! ```
//!
//! WAL journaling lets a snapshot read run while a handler holds the write
//! lock, so a slow broadcast never stalls a scan at the dock.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::AuditRepository;
use crate::repository::package::PackageRepository;
use crate::repository::user::UserRepository;
use crate::seed::{self, AdminSeed};

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first start. `:memory:` for tests.
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a request waits for a free connection before
    /// [`DbError::PoolExhausted`].
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// A private database living in a single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Cloneable handle; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening database");

        let base = if config.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::Connect(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        let options = base.foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout);

        // Dropping the only connection would drop an in-memory database.
        if config.is_memory() {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        migrations::run_migrations(&pool).await?;

        info!(max_connections = config.max_connections, "Database ready");
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn packages(&self) -> PackageRepository {
        PackageRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn audit_logs(&self) -> AuditRepository {
        AuditRepository::new(self.pool.clone())
    }

    /// Seeds permissions, roles and the first admin. Existing rows are
    /// left untouched.
    pub async fn seed(&self, admin: &AdminSeed) -> DbResult<()> {
        seed::seed_defaults(&self.pool, admin).await
    }

    /// Number of embedded migrations not yet recorded as applied.
    pub async fn pending_migrations(&self) -> DbResult<usize> {
        let (total, applied) = migrations::migration_status(&self.pool).await?;
        Ok(total.saturating_sub(applied))
    }

    /// Closes the pool. Later queries fail with [`DbError::Closed`].
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
