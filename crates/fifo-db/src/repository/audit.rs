//! # Audit Repository
//!
//! Append-only trail of package operations.
//!
//! Rows are written by [`record`] from inside the same transaction as the
//! package change they describe, so a rolled-back change never leaves an
//! audit line behind. Reads go through [`AuditRepository::list`].

use chrono::{Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use fifo_core::{AuditAction, AuditLog, AuditLogFilter, User};

/// Writes one audit row on an open connection or transaction.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    actor: &User,
    action: AuditAction,
    details: &str,
) -> DbResult<()> {
    debug!(username = %actor.username, action = %action, "Recording audit entry");

    sqlx::query(
        r#"
        INSERT INTO audit_logs (username, user_full_name, action, details, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&actor.username)
    .bind(&actor.full_name)
    .bind(action)
    .bind(details)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

/// Repository for audit log queries.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Lists audit rows matching the filter, newest first.
    ///
    /// ## Filter Semantics
    /// - `username` / `full_name`: substring match (SQLite `LIKE` is
    ///   case-insensitive for ASCII)
    /// - `action`: exact match
    /// - `start_date` + `end_date`: inclusive day range, applied only when
    ///   both are present
    pub async fn list(&self, filter: &AuditLogFilter) -> DbResult<Vec<AuditLog>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, username, user_full_name, action, details, created_at \
             FROM audit_logs WHERE 1 = 1",
        );

        if let Some(username) = non_blank(filter.username.as_deref()) {
            query
                .push(" AND username LIKE ")
                .push_bind(format!("%{}%", username));
        }

        if let Some(full_name) = non_blank(filter.full_name.as_deref()) {
            query
                .push(" AND user_full_name LIKE ")
                .push_bind(format!("%{}%", full_name));
        }

        if let Some(action) = filter.action {
            query.push(" AND action = ").push_bind(action);
        }

        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            // created_at is RFC 3339 text, so a bare date compares as the
            // start of that day.
            let end_exclusive = end + Duration::days(1);
            query
                .push(" AND created_at >= ")
                .push_bind(start.format("%Y-%m-%d").to_string())
                .push(" AND created_at < ")
                .push_bind(end_exclusive.format("%Y-%m-%d").to_string());
        }

        query.push(" ORDER BY created_at DESC, id DESC");

        let logs = query
            .build_query_as::<AuditLog>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = logs.len(), "Listed audit logs");
        Ok(logs)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
