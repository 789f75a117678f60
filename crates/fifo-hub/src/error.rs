//! # Hub Error Types
//!
//! Error types for the broadcast hub and observer sessions.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Hub Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Hub                 │ │
//! │  │                 │  │  (one session)  │  │                         │ │
//! │  │  Config         │  │  Transport      │  │  ChannelClosed          │ │
//! │  │                 │  │  WriteTimeout   │  │  Snapshot               │ │
//! │  │                 │  │  ReadTimeout    │  │  Serialization          │ │
//! │  │                 │  │  FrameTooLarge  │  │                         │ │
//! │  │                 │  │  Backpressure   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport errors end exactly one session. None of these errors stop the
//! hub's event loop.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Hub error type.
#[derive(Debug, Error)]
pub enum HubError {
    // =========================================================================
    // Hub Errors
    // =========================================================================
    /// The hub's event loop is no longer running.
    ///
    /// ## When This Occurs
    /// - After `HubHandle::shutdown()`
    /// - A session unregisters while the server is stopping
    #[error("Hub event loop has stopped")]
    ChannelClosed,

    /// The snapshot provider failed to read the queue.
    #[error("Snapshot provider failed: {0}")]
    Snapshot(String),

    /// An outbound message could not be serialized.
    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Reading from or writing to the peer failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single frame write did not finish within the write deadline.
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Nothing arrived from the peer within the read window.
    #[error("No traffic from peer within {0:?}")]
    ReadTimeout(Duration),

    /// The peer sent a frame above the inbound size cap.
    #[error("Inbound frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    /// The observer's outbound buffer is full (the peer is not draining).
    #[error("Outbound buffer full")]
    Backpressure,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid hub timing or size settings.
    #[error("Invalid hub configuration: {0}")]
    Config(String),
}

impl HubError {
    /// Returns true if the error belongs to a single observer's connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HubError::Transport(_)
                | HubError::WriteTimeout(_)
                | HubError::ReadTimeout(_)
                | HubError::FrameTooLarge { .. }
                | HubError::Backpressure
        )
    }
}
