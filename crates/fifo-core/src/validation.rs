//! # Validation Module
//!
//! Input validation for scans, user management and QR batches.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend                                                     │
//! │  ├── Scanner input, form checks                                        │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler (Rust)                                          │
//! │  ├── JSON deserialization                                              │
//! │  └── THIS MODULE: field rules                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE(tracking_id), UNIQUE(username)                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fifo_core::validation::{validate_tracking_id, validate_entry_buffer};
//!
//! let id = validate_tracking_id("  CAGE-0042 ").unwrap();
//! assert_eq!(id, "CAGE-0042");
//! assert!(validate_entry_buffer("PENDENTE").is_err());
//! ```

use crate::error::ValidationError;
use crate::types::Buffer;
use crate::{MAX_QR_BATCH, MAX_TRACKING_ID_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trims and checks a required string field.
fn required(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

// =============================================================================
// Package Validators
// =============================================================================

/// Validates a tracking ID.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Returns
/// The trimmed tracking ID.
pub fn validate_tracking_id(tracking_id: &str) -> ValidationResult<String> {
    let tracking_id = required("trackingId", tracking_id, MAX_TRACKING_ID_LEN)?;

    if !tracking_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "trackingId".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(tracking_id)
}

/// Validates a rua (street/lane) label.
pub fn validate_rua(rua: &str) -> ValidationResult<String> {
    required("rua", rua, 20)
}

/// Validates the buffer of an entry scan.
///
/// ## Rules
/// - Must be one of RTS, EHA, SAL (case-insensitive)
/// - PENDENTE is never a valid entry target
pub fn validate_entry_buffer(buffer: &str) -> ValidationResult<Buffer> {
    let not_allowed = || ValidationError::NotAllowed {
        field: "buffer".to_string(),
        allowed: Buffer::ACTIVE.iter().map(|b| b.to_string()).collect(),
    };

    match buffer.parse::<Buffer>() {
        Ok(Buffer::Pending) | Err(_) => Err(not_allowed()),
        Ok(active) => Ok(active),
    }
}

/// Validates the size of a QR label batch.
pub fn validate_qr_count(count: u32) -> ValidationResult<u32> {
    if count == 0 || count > MAX_QR_BATCH {
        return Err(ValidationError::OutOfRange {
            field: "count".to_string(),
            min: 1,
            max: MAX_QR_BATCH as i64,
        });
    }

    Ok(count)
}

// =============================================================================
// User Validators
// =============================================================================

/// Validates a username.
///
/// ## Rules
/// - 3 to 50 characters after trimming
/// - No whitespace inside
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = required("username", username, 50)?;

    if username.chars().count() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(username)
}

/// Validates a display name.
pub fn validate_full_name(full_name: &str) -> ValidationResult<String> {
    required("fullName", full_name, 120)
}

/// Validates a sector label.
pub fn validate_sector(sector: &str) -> ValidationResult<String> {
    required("sector", sector, 60)
}

/// Validates a new password.
///
/// ## Rules
/// - 4 to 128 characters (not trimmed)
pub fn validate_password(password: &str) -> ValidationResult<()> {
    let len = password.chars().count();

    if len < 4 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 4,
        });
    }

    if len > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
