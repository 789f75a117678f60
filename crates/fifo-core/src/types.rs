//! # Domain Types
//!
//! Core domain types used throughout the FIFO tracker.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Package      │   │      User       │   │    AuditLog     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  id (i64)       │   │  id (i64)       │       │
//! │  │  tracking_id    │   │  username       │   │  username       │       │
//! │  │  buffer         │   │  full_name      │   │  action         │       │
//! │  │  rua            │   │  role, sector   │   │  details        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Buffer      │   │  Role / Tier    │   │  QueueSnapshot  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  RTS, EHA, SAL  │   │  admin  ─┐      │   │  items (FIFO)   │       │
//! │  │  PENDENTE       │   │  leader ─┴► Elev│   │  backlog        │       │
//! │  │                 │   │  fifo   ──► Oper│   │  buffer_counts  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Packages have:
//! - `id`: integer row ID, used by the move endpoint
//! - `tracking_id`: the printed label, used by entry/exit scans

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Buffer
// =============================================================================

/// Queue category a package sits in.
///
/// ## Lifecycle
/// ```text
///   QR confirm           entry scan                exit scan
///  ───────────► PENDENTE ──────────► RTS|EHA|SAL ────────────► (deleted)
///                                       │   ▲
///                                       └───┘ move (rua only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum Buffer {
    #[serde(rename = "RTS")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "RTS"))]
    Rts,
    #[serde(rename = "EHA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "EHA"))]
    Eha,
    #[serde(rename = "SAL")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "SAL"))]
    Sal,
    /// Pre-registered label, not in the queue yet.
    #[serde(rename = "PENDENTE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PENDENTE"))]
    Pending,
}

impl Buffer {
    /// Buffers that count as "in the queue".
    pub const ACTIVE: [Buffer; 3] = [Buffer::Rts, Buffer::Eha, Buffer::Sal];

    /// Wire/storage name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Buffer::Rts => "RTS",
            Buffer::Eha => "EHA",
            Buffer::Sal => "SAL",
            Buffer::Pending => "PENDENTE",
        }
    }

    #[inline]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Buffer::Pending)
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Buffer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RTS" => Ok(Buffer::Rts),
            "EHA" => Ok(Buffer::Eha),
            "SAL" => Ok(Buffer::Sal),
            "PENDENTE" => Ok(Buffer::Pending),
            other => Err(CoreError::Validation(
                crate::error::ValidationError::NotAllowed {
                    field: format!("buffer '{}'", other),
                    allowed: Buffer::ACTIVE.iter().map(|b| b.to_string()).collect(),
                },
            )),
        }
    }
}

// =============================================================================
// Package
// =============================================================================

/// A cage tracked by the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Package {
    /// Row identifier.
    pub id: i64,

    /// Printed label, unique across all packages.
    pub tracking_id: String,

    /// Current queue category.
    pub buffer: Buffer,

    /// Street/lane where the cage physically sits.
    pub rua: String,

    /// When the package entered the queue (creation time while pending).
    #[ts(as = "String")]
    pub entry_timestamp: DateTime<Utc>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Returns true if the package counts towards the backlog.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.buffer.is_pending()
    }
}

// =============================================================================
// Queue Snapshot
// =============================================================================

/// Per-buffer subtotals of the active queue.
///
/// Every active buffer is always present, so a consumer never has to treat
/// a missing key as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BufferCounts {
    #[serde(rename = "RTS")]
    pub rts: i64,
    #[serde(rename = "EHA")]
    pub eha: i64,
    #[serde(rename = "SAL")]
    pub sal: i64,
}

impl BufferCounts {
    /// Sets the count for one buffer. Pending is ignored.
    pub fn set(&mut self, buffer: Buffer, count: i64) {
        match buffer {
            Buffer::Rts => self.rts = count,
            Buffer::Eha => self.eha = count,
            Buffer::Sal => self.sal = count,
            Buffer::Pending => {}
        }
    }

    pub fn get(&self, buffer: Buffer) -> i64 {
        match buffer {
            Buffer::Rts => self.rts,
            Buffer::Eha => self.eha,
            Buffer::Sal => self.sal,
            Buffer::Pending => 0,
        }
    }

    pub fn total(&self) -> i64 {
        self.rts + self.eha + self.sal
    }
}

/// Point-in-time view of the active queue.
///
/// Produced fresh for each broadcast and never cached. Items are ordered by
/// entry timestamp, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QueueSnapshot {
    pub items: Vec<Package>,
    pub backlog: i64,
    pub buffer_counts: BufferCounts,
}

impl QueueSnapshot {
    /// Snapshot broadcast when the provider fails: no items, all counts zero.
    pub fn empty() -> Self {
        QueueSnapshot::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Roles & Permissions
// =============================================================================

/// Presence-visibility tier derived from a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTier {
    /// Sees the queue only.
    Operator,
    /// Sees the queue and the online roster.
    Elevated,
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Leader,
    /// Floor operator scanning cages in and out.
    Fifo,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Leader, Role::Fifo];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Leader => "leader",
            Role::Fifo => "fifo",
        }
    }

    /// Presence tier for this role.
    pub const fn tier(&self) -> RoleTier {
        match self {
            Role::Admin | Role::Leader => RoleTier::Elevated,
            Role::Fifo => RoleTier::Operator,
        }
    }

    /// Permissions granted to this role when the database is first seeded.
    pub fn default_permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin | Role::Leader => &Permission::ALL,
            Role::Fifo => &[Permission::ManageFifo, Permission::MovePackage],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "leader" => Ok(Role::Leader),
            "fifo" => Ok(Role::Fifo),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// Capability checked by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Permission {
    ManageFifo,
    ViewLogs,
    ViewUsers,
    CreateUser,
    EditUser,
    ResetPassword,
    MovePackage,
    GenerateQrCodes,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::ManageFifo,
        Permission::ViewLogs,
        Permission::ViewUsers,
        Permission::CreateUser,
        Permission::EditUser,
        Permission::ResetPassword,
        Permission::MovePackage,
        Permission::GenerateQrCodes,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageFifo => "MANAGE_FIFO",
            Permission::ViewLogs => "VIEW_LOGS",
            Permission::ViewUsers => "VIEW_USERS",
            Permission::CreateUser => "CREATE_USER",
            Permission::EditUser => "EDIT_USER",
            Permission::ResetPassword => "RESET_PASSWORD",
            Permission::MovePackage => "MOVE_PACKAGE",
            Permission::GenerateQrCodes => "GENERATE_QR_CODES",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role row with its granted permissions.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoleInfo {
    pub id: i64,
    pub name: Role,
    pub permissions: Vec<Permission>,
}

// =============================================================================
// User
// =============================================================================

/// A user account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub sector: String,
    pub role_id: i64,
    pub role: Role,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An authenticated user together with the permissions of their role.
#[derive(Debug, Clone, PartialEq)]
pub struct UserWithPermissions {
    pub user: User,
    pub permissions: Vec<Permission>,
}

impl UserWithPermissions {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// Audited package operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum AuditAction {
    #[serde(rename = "ENTRADA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ENTRADA"))]
    Entry,
    #[serde(rename = "SAIDA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "SAIDA"))]
    Exit,
    #[serde(rename = "MOVIMENTACAO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "MOVIMENTACAO"))]
    Move,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Entry => "ENTRADA",
            AuditAction::Exit => "SAIDA",
            AuditAction::Move => "MOVIMENTACAO",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ENTRADA" => Ok(AuditAction::Entry),
            "SAIDA" => Ok(AuditAction::Exit),
            "MOVIMENTACAO" => Ok(AuditAction::Move),
            _ => Err(CoreError::Validation(
                crate::error::ValidationError::NotAllowed {
                    field: "action".to_string(),
                    allowed: vec!["ENTRADA".into(), "SAIDA".into(), "MOVIMENTACAO".into()],
                },
            )),
        }
    }
}

/// An immutable audit record written in the same transaction as the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuditLog {
    pub id: i64,
    pub username: String,
    pub user_full_name: String,
    pub action: AuditAction,
    pub details: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Filters for the audit log listing. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLogFilter {
    /// Case-insensitive substring of the username.
    pub username: Option<String>,
    /// Case-insensitive substring of the full name.
    pub full_name: Option<String>,
    pub action: Option<AuditAction>,
    /// Inclusive day range; both ends must be set to apply.
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

// =============================================================================
// Unit Tests
// =============================================================================
