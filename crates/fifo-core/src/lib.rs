//! # fifo-core: Pure Domain Model for the FIFO Queue Tracker
//!
//! This crate holds the domain types and rules shared by the database layer,
//! the real-time hub and the HTTP server. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      FIFO Tracker Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Frontend (operators / supervisors)              │   │
//! │  │       Queue board ──► Entry scan ──► Exit scan ──► Logs         │   │
//! │  └──────────────┬──────────────────────────────▲───────────────────┘   │
//! │                 │ HTTP                         │ WebSocket push         │
//! │  ┌──────────────▼──────────────────────────────┴───────────────────┐   │
//! │  │              apps/server (axum) + fifo-hub (fan-out)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fifo-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   rules   │  │   error   │  │ validation│  │   │
//! │  │   │  Package  │  │ entry/exit│  │ CoreError │  │   input   │  │   │
//! │  │   │  Role     │  │   /move   │  │           │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    fifo-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Package, Buffer, Role, QueueSnapshot, ...)
//! - [`rules`] - Package state transitions (entry, exit, move)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use fifo_core::{Buffer, Role, RoleTier};
//!
//! assert_eq!("RTS".parse::<Buffer>().unwrap(), Buffer::Rts);
//! assert_eq!(Role::Leader.tier(), RoleTier::Elevated);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod rules;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Sector assigned to users created without one.
pub const DEFAULT_SECTOR: &str = "Geral";

/// Maximum number of tracking IDs generated in one QR batch.
///
/// ## Business Reason
/// A print run of labels rarely exceeds a few hundred sheets; larger
/// requests are almost always a typo.
pub const MAX_QR_BATCH: u32 = 500;

/// Maximum length of a tracking ID.
pub const MAX_TRACKING_ID_LEN: usize = 64;
