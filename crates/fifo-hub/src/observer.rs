//! # Observer
//!
//! One connected client watching the queue.
//!
//! ```text
//!        hub event loop                         observer session
//!   ┌──────────────────────┐   outbound    ┌──────────────────────────┐
//!   │ Observer (clone)     │ ─── mpsc ───► │ writer: frames + pings   │──► peer
//!   │  .push(frame)        │               │                          │
//!   │  .close() ───────────┼── token ────► │ reader: liveness watch   │◄── peer
//!   └──────────────────────┘               └──────────────────────────┘
//! ```
//!
//! The hub never touches the transport itself. It only queues frames on the
//! bounded outbound channel and cancels the shared token. The session owns
//! the socket halves and reacts to both.

use std::fmt;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use fifo_core::{Role, RoleTier, User};

use crate::error::{HubError, HubResult};

/// Unique ID of one connection. A user with two tabs has two observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Uuid);

impl ObserverId {
    pub fn new() -> Self {
        ObserverId(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity copied from the authenticated user at connection time.
///
/// Immutable for the life of the connection: a role change takes effect on
/// the next connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverIdentity {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub sector: String,
}

impl ObserverIdentity {
    pub fn tier(&self) -> RoleTier {
        self.role.tier()
    }

    /// Returns true if this observer receives presence rosters.
    pub fn sees_presence(&self) -> bool {
        self.tier() == RoleTier::Elevated
    }
}

impl From<&User> for ObserverIdentity {
    fn from(user: &User) -> Self {
        ObserverIdentity {
            user_id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            sector: user.sector.clone(),
        }
    }
}

/// Hub-side handle to one connection.
///
/// Cloning is cheap; clones share the outbound channel and the close token.
#[derive(Debug, Clone)]
pub struct Observer {
    id: ObserverId,
    identity: ObserverIdentity,
    outbound: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl Observer {
    /// Creates an observer and the receiving end of its outbound buffer.
    ///
    /// ## Arguments
    /// * `identity` - Who is connected
    /// * `buffer` - Frames that may queue before the observer counts as stalled
    pub fn new(identity: ObserverIdentity, buffer: usize) -> (Self, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let observer = Observer {
            id: ObserverId::new(),
            identity,
            outbound,
            closed: CancellationToken::new(),
        };
        (observer, rx)
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn identity(&self) -> &ObserverIdentity {
        &self.identity
    }

    /// Token cancelled when the observer is closed by either side.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Queues a frame without waiting.
    ///
    /// Never blocks the caller: a full buffer means the peer is not keeping
    /// up, and is reported as an error like any other transport failure.
    pub fn push(&self, frame: Message) -> HubResult<()> {
        if self.is_closed() {
            return Err(HubError::Transport("observer closed".into()));
        }

        self.outbound.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => HubError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => {
                HubError::Transport("session writer has stopped".into())
            }
        })
    }

    /// Signals the session to tear down. Safe to call any number of times.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!(observer_id = %self.id, username = %self.identity.username, "Closing observer");
        }
        self.closed.cancel();
    }
}
