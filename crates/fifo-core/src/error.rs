//! # Error Types
//!
//! Domain-specific error types for fifo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fifo-core errors (this file)                                          │
//! │  ├── CoreError        - Package/user rule violations                   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  fifo-db errors (separate crate)                                       │
//! │  └── DbError          - Database failures (wraps CoreError)            │
//! │                                                                         │
//! │  Server errors (in app)                                                │
//! │  └── ApiError         - What the frontend sees (JSON)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Frontend     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::Buffer;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// These represent rule violations in the package lifecycle or in user
/// management. The server maps each one to an HTTP status.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Package cannot be found.
    ///
    /// ## When This Occurs
    /// - Exit scan for a tracking ID that was never registered
    /// - Move request for a package that already left the queue
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// Package is already sitting in the queue.
    ///
    /// ## When This Occurs
    /// - Entry scan for a cage that is already in RTS/EHA/SAL
    ///
    /// ## User Workflow
    /// ```text
    /// Entry scan (CAGE-0042, RTS, R01)
    ///      │
    ///      ▼
    /// Lookup: CAGE-0042 is in EHA at R07
    ///      │
    ///      ▼
    /// AlreadyInQueue { tracking_id: "CAGE-0042", buffer: Eha, rua: "R07" }
    ///      │
    ///      ▼
    /// UI shows: "CAGE-0042 is already in the queue (EHA, R07)"
    /// ```
    #[error("Package {tracking_id} is already in the queue (buffer {buffer}, rua {rua})")]
    AlreadyInQueue {
        tracking_id: String,
        buffer: Buffer,
        rua: String,
    },

    /// Package was pre-registered but never entered the queue.
    ///
    /// ## When This Occurs
    /// - Exit scan for a label that was printed but never scanned in
    #[error("Package {0} exists but has not entered the queue yet")]
    NotYetQueued(String),

    /// User cannot be found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Username/password pair does not match.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Role name or ID is unknown.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any database work.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., bad date, illegal characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
