//! # Database Errors
//!
//! ```text
//! sqlx::Error ──► DbError ──► ApiError (server)
//!                    │
//!                    └── Domain(CoreError): a rule rejected the change,
//!                        the transaction was rolled back
//! ```
//!
//! Constraint failures are classified with [`sqlx::error::ErrorKind`], so
//! callers can tell a taken username or tracking ID apart from a broken
//! query.

use fifo_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` is the column, `value` what the caller tried to store when
    /// the repository knows it.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Every connection is busy with another handler or a hub snapshot.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// The pool was closed during shutdown.
    #[error("Database is closed")]
    Closed,

    #[error("Could not open database: {0}")]
    Connect(String),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::Closed,
            sqlx::Error::Database(db_err) => match db_err.kind() {
                // SQLite reports "UNIQUE constraint failed: users.username".
                ErrorKind::UniqueViolation => {
                    let column = db_err
                        .message()
                        .rsplit(['.', ' '])
                        .next()
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::duplicate(column, "unknown")
                }
                ErrorKind::ForeignKeyViolation => {
                    DbError::ForeignKeyViolation(db_err.message().to_string())
                }
                _ => DbError::Query(db_err.message().to_string()),
            },
            other => DbError::Query(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
