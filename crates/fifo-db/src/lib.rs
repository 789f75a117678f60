//! # fifo-db: Database Layer for the FIFO Queue Tracker
//!
//! This crate provides database access for the tracker.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FIFO Tracker Data Flow                           │
//! │                                                                         │
//! │  HTTP handler (POST /api/entry)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     fifo-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ PackageRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ UserRepo      │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ AuditRepo     │    │              │  │   │
//! │  │   │ Management    │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (fifo.db)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`seed`] - Roles, permissions and the initial admin user
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (package, user, audit)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fifo_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./fifo.db")).await?;
//!
//! let snapshot = db.packages().queue_snapshot().await?;
//! println!("{} cages in the queue", snapshot.backlog);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use seed::AdminSeed;

// Repository re-exports for convenience
pub use repository::audit::AuditRepository;
pub use repository::package::{MoveOutcome, PackageRepository};
pub use repository::user::{NewUser, UserCredentials, UserRepository, UserUpdate};
