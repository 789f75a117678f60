//! Database-backed snapshot provider for the hub.

use std::future::Future;

use fifo_core::QueueSnapshot;
use fifo_db::Database;
use fifo_hub::{HubError, HubResult, SnapshotProvider};

/// Reads a fresh snapshot from SQLite on every call.
#[derive(Debug, Clone)]
pub struct DbSnapshotProvider {
    db: Database,
}

impl DbSnapshotProvider {
    pub fn new(db: Database) -> Self {
        DbSnapshotProvider { db }
    }
}

impl SnapshotProvider for DbSnapshotProvider {
    fn snapshot(&self) -> impl Future<Output = HubResult<QueueSnapshot>> + Send {
        let packages = self.db.packages();
        async move {
            packages
                .queue_snapshot()
                .await
                .map_err(|e| HubError::Snapshot(e.to_string()))
        }
    }
}
