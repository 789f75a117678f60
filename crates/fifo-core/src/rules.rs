//! # Package Lifecycle Rules
//!
//! Pure decision functions for the three queue mutations. The database
//! layer loads the current row, asks these functions what to do, then
//! applies the answer inside one transaction.
//!
//! ## Decision Table
//! ```text
//! ┌──────────────┬──────────────────────┬──────────────────────────────────┐
//! │  Operation   │  Current state       │  Outcome                         │
//! ├──────────────┼──────────────────────┼──────────────────────────────────┤
//! │  entry       │  unknown             │  Insert                          │
//! │  entry       │  PENDENTE            │  Activate                        │
//! │  entry       │  RTS / EHA / SAL     │  AlreadyInQueue                  │
//! │  exit        │  unknown             │  PackageNotFound                 │
//! │  exit        │  PENDENTE            │  NotYetQueued                    │
//! │  exit        │  RTS / EHA / SAL     │  Remove                          │
//! │  move        │  unknown             │  PackageNotFound                 │
//! │  move        │  same rua            │  Unchanged (no audit, no push)   │
//! │  move        │  other rua           │  Relocate                        │
//! └──────────────┴──────────────────────┴──────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{AuditAction, Buffer, Package};

/// What an entry scan should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPlan {
    /// No row exists for the tracking ID.
    Insert,
    /// A pre-registered row exists; move it into the queue.
    Activate { id: i64 },
}

/// What a move request should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    Unchanged,
    Relocate { from: String },
}

/// Decides the outcome of an entry scan.
pub fn plan_entry(existing: Option<&Package>) -> CoreResult<EntryPlan> {
    match existing {
        None => Ok(EntryPlan::Insert),
        Some(pkg) if pkg.buffer.is_pending() => Ok(EntryPlan::Activate { id: pkg.id }),
        Some(pkg) => Err(CoreError::AlreadyInQueue {
            tracking_id: pkg.tracking_id.clone(),
            buffer: pkg.buffer,
            rua: pkg.rua.clone(),
        }),
    }
}

/// Checks that a package may leave the queue and hands it back.
pub fn check_exit(tracking_id: &str, existing: Option<Package>) -> CoreResult<Package> {
    match existing {
        None => Err(CoreError::PackageNotFound(tracking_id.to_string())),
        Some(pkg) if pkg.buffer.is_pending() => Err(CoreError::NotYetQueued(pkg.tracking_id)),
        Some(pkg) => Ok(pkg),
    }
}

/// Decides the outcome of a move request.
pub fn plan_move(package: &Package, new_rua: &str) -> MovePlan {
    if package.rua == new_rua {
        MovePlan::Unchanged
    } else {
        MovePlan::Relocate {
            from: package.rua.clone(),
        }
    }
}

// =============================================================================
// Audit Details
// =============================================================================

/// Human-readable audit line for each action.
pub fn audit_details(
    action: AuditAction,
    tracking_id: &str,
    buffer: Buffer,
    rua: &str,
    from_rua: Option<&str>,
) -> String {
    match action {
        AuditAction::Entry => format!(
            "Cage {} entered buffer {} at rua {}",
            tracking_id, buffer, rua
        ),
        AuditAction::Exit => format!(
            "Cage {} left buffer {} at rua {}",
            tracking_id, buffer, rua
        ),
        AuditAction::Move => format!(
            "Cage {} moved from rua {} to {}",
            tracking_id,
            from_rua.unwrap_or("?"),
            rua
        ),
    }
}
