//! # fifo-hub: Real-time Queue Synchronization Hub
//!
//! Keeps every connected observer's view of the FIFO queue identical to the
//! committed database state, and tells supervisors who is online.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Queue Sync Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Hub (serialized event loop)                 │  │
//! │  │                                                                  │  │
//! │  │  Spawned once at server start, driven through HubHandle         │  │
//! │  │  Owns the Registry, asks the SnapshotProvider for fresh state   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   Registry     │  │   Protocol     │  │  Session               │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Live observers │  │ queue_update   │  │ One per socket         │    │
//! │  │ Elevated tier  │  │ online_users   │  │ Writer: frames, pings  │    │
//! │  │ Presence       │  │ JSON frames    │  │ Reader: liveness only  │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  TRIGGERS:                                                             │
//! │  • register      → snapshot to newcomer, roster to elevated observers  │
//! │  • unregister    → roster to elevated observers                        │
//! │  • entry/exit/move committed → snapshot to everyone                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Session timings and buffer sizes
//! - [`error`] - Hub error types
//! - [`hub`] - The event loop and its handle
//! - [`observer`] - One connection's identity and outbound buffer
//! - [`protocol`] - Outbound message types
//! - [`registry`] - The live observer set
//! - [`session`] - Per-socket reader/writer driver
//! - [`snapshot`] - Where queue state comes from
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fifo_hub::{Hub, HubSettings, ObserverIdentity, run_session};
//!
//! let hub = Hub::spawn(provider, HubSettings::default());
//!
//! // In the WebSocket upgrade handler:
//! let (observer, outbound) = hub.observer(ObserverIdentity::from(&user));
//! let (sink, stream) = socket.split();
//! run_session(hub.clone(), observer, outbound, sink, stream).await;
//!
//! // After committing a queue mutation:
//! hub.broadcast_queue_update()?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod hub;
pub mod observer;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod snapshot;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::HubSettings;
pub use error::{HubError, HubResult};
pub use hub::{Hub, HubHandle};
pub use observer::{Observer, ObserverId, ObserverIdentity};
pub use protocol::{OutboundMessage, PresenceEntry};
pub use registry::Registry;
pub use session::run_session;
pub use snapshot::SnapshotProvider;
