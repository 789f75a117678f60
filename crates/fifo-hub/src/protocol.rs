//! # Outbound Protocol Messages
//!
//! Messages the hub pushes to observers. Observers never send application
//! messages; their only inbound traffic is control frames.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Hub → Observer Messages                          │
//! │                                                                         │
//! │  QUEUE UPDATE (every observer)                                         │
//! │  ─────────────────────────────                                         │
//! │  on register (to the new observer only)                                │
//! │  on every committed entry / exit / move (to everyone)                  │
//! │  HUB ───► { type: "queue_update", queue, backlog, bufferCounts }       │
//! │                                                                         │
//! │  ONLINE USERS (elevated tier only)                                     │
//! │  ─────────────────────────────────                                     │
//! │  on every register and unregister                                      │
//! │  HUB ───► { type: "online_users", data: [ {id, username, ...} ] }      │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  HUB ───► Ping (protocol frame, empty payload)                         │
//! │  HUB ◄─── Pong                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Internally tagged JSON text frames:
//! ```json
//! { "type": "queue_update", "queue": [...], "backlog": 3,
//!   "bufferCounts": { "RTS": 2, "EHA": 1, "SAL": 0 } }
//! ```

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use fifo_core::{BufferCounts, Package, QueueSnapshot, Role};

use crate::error::HubResult;
use crate::observer::ObserverIdentity;

/// All messages pushed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Full queue state. Sent whole every time, never as a delta.
    QueueUpdate {
        queue: Vec<Package>,
        backlog: i64,
        #[serde(rename = "bufferCounts")]
        buffer_counts: BufferCounts,
    },

    /// Presence roster of every registered observer.
    OnlineUsers { data: Vec<PresenceEntry> },
}

impl OutboundMessage {
    pub fn queue_update(snapshot: QueueSnapshot) -> Self {
        OutboundMessage::QueueUpdate {
            queue: snapshot.items,
            backlog: snapshot.backlog,
            buffer_counts: snapshot.buffer_counts,
        }
    }

    pub fn online_users(data: Vec<PresenceEntry>) -> Self {
        OutboundMessage::OnlineUsers { data }
    }

    /// Serializes into a WebSocket text frame.
    pub fn to_frame(&self) -> HubResult<Message> {
        let json = serde_json::to_string(self)?;
        Ok(Message::Text(json.into()))
    }
}

/// One row of the presence roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub sector: String,
}

impl From<&ObserverIdentity> for PresenceEntry {
    fn from(identity: &ObserverIdentity) -> Self {
        PresenceEntry {
            id: identity.user_id,
            username: identity.username.clone(),
            full_name: identity.full_name.clone(),
            role: identity.role,
            sector: identity.sector.clone(),
        }
    }
}
