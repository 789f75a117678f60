//! # Repository Module
//!
//! Database repository implementations for the tracker.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.packages().enter("CAGE-0042", Buffer::Rts, "R01", &user)   │
//! │       ▼                                                                 │
//! │  PackageRepository                                                     │
//! │  ├── BEGIN                                                             │
//! │  ├── load row ──► rules::plan_entry() (fifo-core)                      │
//! │  ├── INSERT / UPDATE packages                                          │
//! │  ├── INSERT audit_logs   (audit::record, same transaction)             │
//! │  └── COMMIT                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Handler triggers the hub broadcast after COMMIT returns               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`PackageRepository`](package::PackageRepository) - Queue mutations and snapshots
//! - [`UserRepository`](user::UserRepository) - Accounts, roles, permissions
//! - [`AuditRepository`](audit::AuditRepository) - Audit trail queries

pub mod audit;
pub mod package;
pub mod user;

