//! # Snapshot Provider
//!
//! The hub's only view of persisted state. The server implements this over
//! the database; tests implement it over an in-memory value.

use std::future::Future;
use std::sync::Arc;

use fifo_core::QueueSnapshot;

use crate::error::HubResult;

/// Produces a fresh, immutable queue snapshot.
///
/// Called once per broadcast and once per registration. Implementations must
/// be side-effect free and must not cache: each call reflects the state
/// committed at the time of the call.
pub trait SnapshotProvider: Send + Sync + 'static {
    fn snapshot(&self) -> impl Future<Output = HubResult<QueueSnapshot>> + Send;
}

impl<P: SnapshotProvider> SnapshotProvider for Arc<P> {
    fn snapshot(&self) -> impl Future<Output = HubResult<QueueSnapshot>> + Send {
        (**self).snapshot()
    }
}
