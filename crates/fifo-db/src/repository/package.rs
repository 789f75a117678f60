//! # Package Repository
//!
//! Queue mutations, queue reads and QR pre-registration.
//!
//! ## Mutation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       enter / exit / move_to                            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├── SELECT current row                                               │
//! │    ├── rules::plan_entry / check_exit / plan_move   (fifo-core)         │
//! │    │        │                                                           │
//! │    │        └── Err ──► drop tx (ROLLBACK) ──► DbError::Domain          │
//! │    ├── INSERT / UPDATE / DELETE packages                                │
//! │    ├── INSERT audit_logs                                                │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queue order is `entry_timestamp ASC, id ASC`. The `id` tiebreak keeps
//! two scans in the same instant in insertion order.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit;
use fifo_core::rules::{self, EntryPlan, MovePlan};
use fifo_core::{AuditAction, Buffer, BufferCounts, CoreError, Package, QueueSnapshot, User};

/// Result of a move request.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The rua changed; the change was audited.
    Moved(Package),
    /// The package was already at the requested rua. Nothing was written.
    Unchanged(Package),
}

impl MoveOutcome {
    pub fn package(&self) -> &Package {
        match self {
            MoveOutcome::Moved(p) | MoveOutcome::Unchanged(p) => p,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, MoveOutcome::Moved(_))
    }
}

/// Repository for package database operations.
#[derive(Debug, Clone)]
pub struct PackageRepository {
    pool: SqlitePool,
}

impl PackageRepository {
    /// Creates a new PackageRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PackageRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Finds a package (queued or pending) by tracking ID.
    pub async fn find_by_tracking_id(&self, tracking_id: &str) -> DbResult<Option<Package>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_tracking_id(&mut conn, tracking_id).await
    }

    /// Gets a package by row ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Package>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Active packages in FIFO order.
    pub async fn list_queue(&self) -> DbResult<Vec<Package>> {
        let mut conn = self.pool.acquire().await?;
        fetch_queue(&mut conn).await
    }

    /// Number of active packages.
    pub async fn backlog_count(&self) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        count_active(&mut conn).await
    }

    /// Active packages per buffer. Buffers with no packages report zero.
    pub async fn buffer_counts(&self) -> DbResult<BufferCounts> {
        let mut conn = self.pool.acquire().await?;
        count_by_buffer(&mut conn).await
    }

    /// Reads items, backlog and per-buffer counts in one transaction so the
    /// three figures agree with each other.
    pub async fn queue_snapshot(&self) -> DbResult<QueueSnapshot> {
        let mut tx = self.pool.begin().await?;

        let items = fetch_queue(&mut tx).await?;
        let backlog = count_active(&mut tx).await?;
        let buffer_counts = count_by_buffer(&mut tx).await?;

        tx.commit().await?;

        Ok(QueueSnapshot {
            items,
            backlog,
            buffer_counts,
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Records an entry scan.
    ///
    /// ## Arguments
    /// * `tracking_id` - Validated tracking ID
    /// * `buffer` - One of the active buffers
    /// * `rua` - Aisle the package was placed in
    /// * `actor` - Authenticated user, written to the audit trail
    ///
    /// ## Returns
    /// The package as stored after the scan.
    ///
    /// ## Errors
    /// - `Domain(AlreadyInQueue)` if the package is already queued
    pub async fn enter(
        &self,
        tracking_id: &str,
        buffer: Buffer,
        rua: &str,
        actor: &User,
    ) -> DbResult<Package> {
        debug!(tracking_id = %tracking_id, buffer = %buffer, rua = %rua, "Entry scan");

        let mut tx = self.pool.begin().await?;
        let existing = fetch_by_tracking_id(&mut tx, tracking_id).await?;
        let now = Utc::now();

        let id = match rules::plan_entry(existing.as_ref())? {
            EntryPlan::Insert => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO packages
                        (tracking_id, buffer, rua, entry_timestamp, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4, ?4)
                    RETURNING id
                    "#,
                )
                .bind(tracking_id)
                .bind(buffer)
                .bind(rua)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
            EntryPlan::Activate { id } => {
                sqlx::query(
                    r#"
                    UPDATE packages
                    SET buffer = ?2, rua = ?3, entry_timestamp = ?4, updated_at = ?4
                    WHERE id = ?1
                    "#,
                )
                .bind(id)
                .bind(buffer)
                .bind(rua)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        let details = rules::audit_details(AuditAction::Entry, tracking_id, buffer, rua, None);
        audit::record(&mut tx, actor, AuditAction::Entry, &details).await?;

        let package = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Package", tracking_id))?;

        tx.commit().await?;

        info!(tracking_id = %tracking_id, buffer = %buffer, rua = %rua, "Package entered queue");
        Ok(package)
    }

    /// Records an exit scan and removes the package.
    ///
    /// ## Returns
    /// The package as it was before removal.
    ///
    /// ## Errors
    /// - `Domain(PackageNotFound)` if the tracking ID is unknown
    /// - `Domain(NotYetQueued)` if the package is still pending
    pub async fn exit(&self, tracking_id: &str, actor: &User) -> DbResult<Package> {
        debug!(tracking_id = %tracking_id, "Exit scan");

        let mut tx = self.pool.begin().await?;
        let existing = fetch_by_tracking_id(&mut tx, tracking_id).await?;
        let package = rules::check_exit(tracking_id, existing)?;

        sqlx::query("DELETE FROM packages WHERE id = ?1")
            .bind(package.id)
            .execute(&mut *tx)
            .await?;

        let details = rules::audit_details(
            AuditAction::Exit,
            &package.tracking_id,
            package.buffer,
            &package.rua,
            None,
        );
        audit::record(&mut tx, actor, AuditAction::Exit, &details).await?;

        tx.commit().await?;

        info!(tracking_id = %tracking_id, buffer = %package.buffer, "Package left queue");
        Ok(package)
    }

    /// Moves a package to another rua. Queue position is unchanged.
    ///
    /// ## Errors
    /// - `Domain(PackageNotFound)` if no package has this ID
    pub async fn move_to(&self, id: i64, rua: &str, actor: &User) -> DbResult<MoveOutcome> {
        debug!(id, rua = %rua, "Move request");

        let mut tx = self.pool.begin().await?;
        let package = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::PackageNotFound(id.to_string()))?;

        let from = match rules::plan_move(&package, rua) {
            MovePlan::Unchanged => {
                tx.rollback().await?;
                return Ok(MoveOutcome::Unchanged(package));
            }
            MovePlan::Relocate { from } => from,
        };

        sqlx::query("UPDATE packages SET rua = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(rua)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let details = rules::audit_details(
            AuditAction::Move,
            &package.tracking_id,
            package.buffer,
            rua,
            Some(&from),
        );
        audit::record(&mut tx, actor, AuditAction::Move, &details).await?;

        let moved = fetch_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::PackageNotFound(id.to_string()))?;

        tx.commit().await?;

        info!(tracking_id = %moved.tracking_id, from = %from, to = %rua, "Package moved");
        Ok(MoveOutcome::Moved(moved))
    }

    // =========================================================================
    // QR Pre-registration
    // =========================================================================

    /// Generates `count` tracking IDs not present in the database.
    ///
    /// Nothing is written; the IDs are reserved only by
    /// [`register_pending`](Self::register_pending).
    pub async fn generate_tracking_ids(&self, count: u32) -> DbResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let mut ids: Vec<String> = Vec::with_capacity(count as usize);

        while ids.len() < count as usize {
            let candidate = generate_tracking_id();
            if ids.contains(&candidate) {
                continue;
            }

            let taken: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM packages WHERE tracking_id = ?1")
                    .bind(&candidate)
                    .fetch_one(&mut *conn)
                    .await?;

            if taken == 0 {
                ids.push(candidate);
            }
        }

        Ok(ids)
    }

    /// Stores tracking IDs as `PENDENTE` packages.
    ///
    /// IDs that already exist are skipped.
    ///
    /// ## Returns
    /// The number of rows created.
    pub async fn register_pending(&self, tracking_ids: &[String]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut created = 0;

        for tracking_id in tracking_ids {
            created += sqlx::query(
                r#"
                INSERT OR IGNORE INTO packages
                    (tracking_id, buffer, rua, entry_timestamp, created_at, updated_at)
                VALUES (?1, ?2, '', ?3, ?3, ?3)
                "#,
            )
            .bind(tracking_id)
            .bind(Buffer::Pending)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        info!(requested = tracking_ids.len(), created, "Registered pending packages");
        Ok(created)
    }
}

// =============================================================================
// Connection-level helpers (usable on a pool connection or a transaction)
// =============================================================================

async fn fetch_by_tracking_id(
    conn: &mut SqliteConnection,
    tracking_id: &str,
) -> DbResult<Option<Package>> {
    let package = sqlx::query_as::<_, Package>(
        r#"
        SELECT id, tracking_id, buffer, rua, entry_timestamp, created_at, updated_at
        FROM packages WHERE tracking_id = ?1
        "#,
    )
    .bind(tracking_id)
    .fetch_optional(conn)
    .await?;

    Ok(package)
}

async fn fetch_by_id(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Package>> {
    let package = sqlx::query_as::<_, Package>(
        r#"
        SELECT id, tracking_id, buffer, rua, entry_timestamp, created_at, updated_at
        FROM packages WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(package)
}

async fn fetch_queue(conn: &mut SqliteConnection) -> DbResult<Vec<Package>> {
    let items = sqlx::query_as::<_, Package>(
        r#"
        SELECT id, tracking_id, buffer, rua, entry_timestamp, created_at, updated_at
        FROM packages
        WHERE buffer <> ?1
        ORDER BY entry_timestamp ASC, id ASC
        "#,
    )
    .bind(Buffer::Pending)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

async fn count_active(conn: &mut SqliteConnection) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packages WHERE buffer <> ?1")
        .bind(Buffer::Pending)
        .fetch_one(conn)
        .await?;

    Ok(count)
}

async fn count_by_buffer(conn: &mut SqliteConnection) -> DbResult<BufferCounts> {
    let rows = sqlx::query_as::<_, (Buffer, i64)>(
        "SELECT buffer, COUNT(*) FROM packages WHERE buffer <> ?1 GROUP BY buffer",
    )
    .bind(Buffer::Pending)
    .fetch_all(conn)
    .await?;

    let mut counts = BufferCounts::default();
    for (buffer, count) in rows {
        counts.set(buffer, count);
    }

    Ok(counts)
}

/// Generates a printable tracking ID, e.g. `FIFO-3F9A1C07B2D4`.
pub fn generate_tracking_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("FIFO-{}", hex[..12].to_uppercase())
}
