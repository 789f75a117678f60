//! # Broadcast Hub
//!
//! The single coordinating task that owns the observer registry and fans out
//! queue snapshots and presence rosters.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Broadcast Hub                                    │
//! │                                                                         │
//! │  HTTP handlers         sessions                                        │
//! │  (entry/exit/move)     (one per socket)                                │
//! │       │                   │     │                                       │
//! │       │ broadcast_queue   │     │ register / unregister                 │
//! │       │ _update()         │     │                                       │
//! │       ▼                   ▼     ▼                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           unbounded, ordered event channel (HubEvent)           │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Hub::run  (one event fully processed before the next)          │   │
//! │  │                                                                 │   │
//! │  │   Register   → insert → snapshot to newcomer → roster to elev.  │   │
//! │  │   Unregister → remove (no-op if absent) → close → roster        │   │
//! │  │   Broadcast  → fresh snapshot → every observer                  │   │
//! │  └───────┬──────────────────────────────────────┬──────────────────┘   │
//! │          │ read lock: copy handles, release     │ provider.snapshot()  │
//! │          ▼                                      ▼                       │
//! │   Registry (RwLock)                      SnapshotProvider (DB)         │
//! │          │                                                              │
//! │          ▼  Observer::push (try_send, never blocks)                     │
//! │   per-observer outbound buffers ──► session writers ──► sockets        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//! - Broadcasts triggered A then B are delivered A then B to every observer.
//! - A newly registered observer always gets a snapshot taken after it was
//!   inserted, then the roster (if elevated).
//! - A failed push closes only that observer; the rest still receive the frame.
//! - Unregistering an absent observer does nothing, including no roster push.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use fifo_core::QueueSnapshot;

use crate::config::HubSettings;
use crate::error::{HubError, HubResult};
use crate::observer::{Observer, ObserverId, ObserverIdentity};
use crate::protocol::{OutboundMessage, PresenceEntry};
use crate::registry::Registry;
use crate::snapshot::SnapshotProvider;

// =============================================================================
// Events
// =============================================================================

/// Requests processed by the hub loop, in arrival order.
#[derive(Debug)]
enum HubEvent {
    Register(Observer),
    Unregister(ObserverId),
    BroadcastQueue,
    Roster(oneshot::Sender<Vec<PresenceEntry>>),
    Shutdown(oneshot::Sender<()>),
}

// =============================================================================
// Hub Handle
// =============================================================================

/// Cloneable handle to a running hub.
///
/// Held by the server's `AppState` and by every session. All methods only
/// enqueue events; none wait for network I/O.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<HubEvent>,
    settings: Arc<HubSettings>,
}

impl HubHandle {
    /// Session timing and size settings.
    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    /// Creates an observer sized with this hub's outbound buffer.
    pub fn observer(&self, identity: ObserverIdentity) -> (Observer, mpsc::Receiver<Message>) {
        Observer::new(identity, self.settings.outbound_buffer)
    }

    /// Admits an observer.
    pub fn register(&self, observer: Observer) -> HubResult<()> {
        self.send(HubEvent::Register(observer))
    }

    /// Removes an observer and closes it. Idempotent.
    pub fn unregister(&self, id: ObserverId) -> HubResult<()> {
        self.send(HubEvent::Unregister(id))
    }

    /// Pushes a fresh queue snapshot to every observer.
    ///
    /// Call once per committed mutation, after the commit.
    pub fn broadcast_queue_update(&self) -> HubResult<()> {
        self.send(HubEvent::BroadcastQueue)
    }

    /// Current presence roster, consistent with every event sent before.
    pub async fn roster(&self) -> HubResult<Vec<PresenceEntry>> {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::Roster(tx))?;
        rx.await.map_err(|_| HubError::ChannelClosed)
    }

    /// Number of registered observers.
    pub async fn online_count(&self) -> HubResult<usize> {
        Ok(self.roster().await?.len())
    }

    /// Closes every observer and stops the event loop.
    ///
    /// Waits until the loop has processed everything queued before it.
    pub async fn shutdown(&self) -> HubResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::Shutdown(tx))?;
        rx.await.map_err(|_| HubError::ChannelClosed)
    }

    /// Returns true while the event loop accepts events.
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }

    fn send(&self, event: HubEvent) -> HubResult<()> {
        self.events.send(event).map_err(|_| HubError::ChannelClosed)
    }
}

// =============================================================================
// Hub
// =============================================================================

/// The hub task. Construct with [`Hub::spawn`].
pub struct Hub<P> {
    provider: P,
    registry: Arc<RwLock<Registry>>,
    events: mpsc::UnboundedReceiver<HubEvent>,
}

impl<P: SnapshotProvider> Hub<P> {
    /// Starts the event loop on the current runtime and returns its handle.
    ///
    /// The loop runs until [`HubHandle::shutdown`] or until every handle is
    /// dropped.
    pub fn spawn(provider: P, settings: HubSettings) -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Hub {
            provider,
            registry: Arc::new(RwLock::new(Registry::new())),
            events: rx,
        };
        tokio::spawn(hub.run());

        HubHandle {
            events: tx,
            settings: Arc::new(settings),
        }
    }

    async fn run(mut self) {
        info!("Hub event loop started");

        while let Some(event) = self.events.recv().await {
            match event {
                HubEvent::Register(observer) => self.handle_register(observer).await,
                HubEvent::Unregister(id) => self.handle_unregister(id).await,
                HubEvent::BroadcastQueue => self.handle_broadcast().await,
                HubEvent::Roster(reply) => {
                    let roster = self.registry.read().await.roster();
                    let _ = reply.send(roster);
                }
                HubEvent::Shutdown(ack) => {
                    self.close_all().await;
                    let _ = ack.send(());
                    info!("Hub event loop stopped");
                    return;
                }
            }
        }

        // Every handle was dropped.
        self.close_all().await;
        info!("Hub event loop stopped (all handles dropped)");
    }

    // =========================================================================
    // Event Handlers
    // =========================================================================

    async fn handle_register(&self, observer: Observer) {
        let inserted = self.registry.write().await.insert(observer.clone());
        if !inserted {
            warn!(observer_id = %observer.id(), "Observer already registered");
            return;
        }

        info!(
            observer_id = %observer.id(),
            username = %observer.identity().username,
            role = %observer.identity().role,
            "Observer registered"
        );

        // Snapshot first, so the newcomer never renders presence over an
        // empty queue.
        let snapshot = self.fetch_snapshot().await;
        match OutboundMessage::queue_update(snapshot).to_frame() {
            Ok(frame) => {
                deliver(std::slice::from_ref(&observer), frame);
            }
            Err(err) => error!(error = %err, "Failed to serialize initial snapshot"),
        }

        self.broadcast_presence().await;
    }

    async fn handle_unregister(&self, id: ObserverId) {
        let removed = self.registry.write().await.remove(&id);

        let Some(observer) = removed else {
            debug!(observer_id = %id, "Observer already unregistered");
            return;
        };

        observer.close();
        info!(
            observer_id = %id,
            username = %observer.identity().username,
            "Observer unregistered"
        );

        self.broadcast_presence().await;
    }

    async fn handle_broadcast(&self) {
        let snapshot = self.fetch_snapshot().await;
        let backlog = snapshot.backlog;

        let frame = match OutboundMessage::queue_update(snapshot).to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                error!(error = %err, "Failed to serialize queue update, skipping broadcast");
                return;
            }
        };

        let targets = self.registry.read().await.observers();
        let delivered = deliver(&targets, frame);

        debug!(observers = targets.len(), delivered, backlog, "Queue update broadcast");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Pushes the roster to every elevated observer.
    async fn broadcast_presence(&self) {
        let (targets, roster) = {
            let registry = self.registry.read().await;
            (registry.elevated(), registry.roster())
        };

        if targets.is_empty() {
            return;
        }

        let online = roster.len();
        match OutboundMessage::online_users(roster).to_frame() {
            Ok(frame) => {
                let delivered = deliver(&targets, frame);
                debug!(online, delivered, "Presence roster broadcast");
            }
            Err(err) => error!(error = %err, "Failed to serialize presence roster"),
        }
    }

    /// Reads the queue, degrading to an empty snapshot on failure.
    async fn fetch_snapshot(&self) -> QueueSnapshot {
        match self.provider.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(error = %err, "Snapshot provider failed, sending empty queue");
                QueueSnapshot::empty()
            }
        }
    }

    async fn close_all(&self) {
        let observers = self.registry.write().await.drain();
        for observer in &observers {
            observer.close();
        }
        if !observers.is_empty() {
            info!(count = observers.len(), "Closed all observers");
        }
    }
}

/// Pushes one frame to each target. A failure closes that observer only.
///
/// Returns how many pushes succeeded.
fn deliver(targets: &[Observer], frame: Message) -> usize {
    let mut delivered = 0;

    for observer in targets {
        match observer.push(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(err) => {
                warn!(
                    observer_id = %observer.id(),
                    username = %observer.identity().username,
                    error = %err,
                    "Push failed, closing observer"
                );
                observer.close();
            }
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fifo_core::{Buffer, BufferCounts, Package, Role};
    use serde_json::Value;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // =========================================================================
    // Fixtures
    // =========================================================================

    #[derive(Default)]
    struct FakeProvider {
        items: Mutex<Vec<Package>>,
        calls: AtomicI64,
        failing: AtomicBool,
        count_calls: bool,
    }

    impl FakeProvider {
        /// Backlog reports the call number, which makes ordering observable.
        fn counting() -> Self {
            FakeProvider {
                count_calls: true,
                ..Default::default()
            }
        }

        fn push_item(&self, tracking_id: &str, buffer: Buffer) {
            let mut items = self.items.lock().unwrap();
            let now = Utc::now();
            let id = items.len() as i64 + 1;
            items.push(Package {
                id,
                tracking_id: tracking_id.to_string(),
                buffer,
                rua: "R01".to_string(),
                entry_timestamp: now,
                created_at: now,
                updated_at: now,
            });
        }
    }

    impl SnapshotProvider for FakeProvider {
        fn snapshot(&self) -> impl Future<Output = HubResult<QueueSnapshot>> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let result = if self.failing.load(Ordering::SeqCst) {
                Err(HubError::Snapshot("database is locked".into()))
            } else {
                let items = self.items.lock().unwrap().clone();
                let mut counts = BufferCounts::default();
                for buffer in Buffer::ACTIVE {
                    let n = items.iter().filter(|p| p.buffer == buffer).count() as i64;
                    counts.set(buffer, n);
                }
                let backlog = if self.count_calls {
                    call
                } else {
                    items.len() as i64
                };
                Ok(QueueSnapshot {
                    items,
                    backlog,
                    buffer_counts: counts,
                })
            };
            async move { result }
        }
    }

    fn identity(id: i64, name: &str, role: Role) -> ObserverIdentity {
        ObserverIdentity {
            user_id: id,
            username: name.to_lowercase(),
            full_name: name.to_string(),
            role,
            sector: "Geral".into(),
        }
    }

    async fn recv_json(rx: &mut mpsc::Receiver<Message>) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("outbound channel closed");
        match frame {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    fn assert_drained(rx: &mut mpsc::Receiver<Message>) {
        assert!(rx.try_recv().is_err(), "unexpected extra frame");
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[tokio::test]
    async fn test_register_sends_snapshot_then_presence() {
        let provider = Arc::new(FakeProvider::default());
        provider.push_item("CAGE-1", Buffer::Rts);
        let hub = Hub::spawn(provider, HubSettings::default());

        let (obs, mut rx) = hub.observer(identity(1, "Ana", Role::Leader));
        hub.register(obs).unwrap();

        let first = recv_json(&mut rx).await;
        assert_eq!(first["type"], "queue_update");
        assert_eq!(first["queue"][0]["trackingId"], "CAGE-1");
        assert_eq!(first["bufferCounts"]["RTS"], 1);

        let second = recv_json(&mut rx).await;
        assert_eq!(second["type"], "online_users");
        assert_eq!(second["data"].as_array().unwrap().len(), 1);
        assert_eq!(second["data"][0]["username"], "ana");

        assert_eq!(hub.online_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_current() {
        let provider = Arc::new(FakeProvider::default());
        let hub = Hub::spawn(provider.clone(), HubSettings::default());

        provider.push_item("CAGE-9", Buffer::Sal);
        let (obs, mut rx) = hub.observer(identity(1, "Op", Role::Fifo));
        hub.register(obs).unwrap();

        let first = recv_json(&mut rx).await;
        assert_eq!(first["backlog"], 1);
        assert_eq!(first["queue"][0]["trackingId"], "CAGE-9");
    }

    #[tokio::test]
    async fn test_broadcasts_arrive_in_trigger_order() {
        let provider = Arc::new(FakeProvider::counting());
        let hub = Hub::spawn(provider, HubSettings::default());

        let (obs, mut rx) = hub.observer(identity(1, "Op", Role::Fifo));
        hub.register(obs).unwrap();
        for _ in 0..5 {
            hub.broadcast_queue_update().unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..6 {
            let msg = recv_json(&mut rx).await;
            assert_eq!(msg["type"], "queue_update");
            seen.push(msg["backlog"].as_i64().unwrap());
        }
        assert_eq!(seen, [1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_failed_push_is_isolated() {
        let hub = Hub::spawn(Arc::new(FakeProvider::default()), HubSettings::default());

        let (broken, broken_rx) = hub.observer(identity(1, "Broken", Role::Fifo));
        let broken_handle = broken.clone();
        let (healthy, mut healthy_rx) = hub.observer(identity(2, "Healthy", Role::Fifo));

        hub.register(broken).unwrap();
        hub.register(healthy).unwrap();
        recv_json(&mut healthy_rx).await;

        drop(broken_rx);
        hub.broadcast_queue_update().unwrap();

        let update = recv_json(&mut healthy_rx).await;
        assert_eq!(update["type"], "queue_update");

        hub.roster().await.unwrap();
        assert!(broken_handle.is_closed());
    }

    #[tokio::test]
    async fn test_slow_observer_is_closed_not_awaited() {
        let settings = HubSettings {
            outbound_buffer: 1,
            ..Default::default()
        };
        let hub = Hub::spawn(Arc::new(FakeProvider::default()), settings);

        // Never drained: the initial snapshot fills its single slot.
        let (stalled, _stalled_rx) = hub.observer(identity(1, "Stalled", Role::Fifo));
        let stalled_handle = stalled.clone();
        let (other, mut other_rx) = hub.observer(identity(2, "Other", Role::Fifo));

        hub.register(stalled).unwrap();
        hub.register(other).unwrap();
        recv_json(&mut other_rx).await;

        hub.broadcast_queue_update().unwrap();
        recv_json(&mut other_rx).await;

        hub.roster().await.unwrap();
        assert!(stalled_handle.is_closed());
    }

    #[tokio::test]
    async fn test_double_unregister_sends_one_roster() {
        let hub = Hub::spawn(Arc::new(FakeProvider::default()), HubSettings::default());

        let (sup, mut sup_rx) = hub.observer(identity(1, "Sup", Role::Admin));
        let (op, mut op_rx) = hub.observer(identity(2, "Op", Role::Fifo));
        let op_id = op.id();
        let op_handle = op.clone();

        hub.register(sup).unwrap();
        hub.register(op).unwrap();
        recv_json(&mut sup_rx).await; // snapshot
        recv_json(&mut sup_rx).await; // roster of 1
        recv_json(&mut sup_rx).await; // roster of 2

        hub.unregister(op_id).unwrap();
        hub.unregister(op_id).unwrap();
        hub.broadcast_queue_update().unwrap();

        let roster = recv_json(&mut sup_rx).await;
        assert_eq!(roster["type"], "online_users");
        assert_eq!(roster["data"].as_array().unwrap().len(), 1);

        // The next frame is the broadcast, not a second roster.
        let next = recv_json(&mut sup_rx).await;
        assert_eq!(next["type"], "queue_update");

        assert!(op_handle.is_closed());
        recv_json(&mut op_rx).await; // its initial snapshot
        assert_drained(&mut op_rx);
    }

    #[tokio::test]
    async fn test_provider_failure_sends_empty_snapshot() {
        let provider = Arc::new(FakeProvider::default());
        provider.push_item("CAGE-1", Buffer::Eha);
        provider.failing.store(true, Ordering::SeqCst);
        let hub = Hub::spawn(provider.clone(), HubSettings::default());

        let (obs, mut rx) = hub.observer(identity(1, "Op", Role::Fifo));
        hub.register(obs).unwrap();

        let msg = recv_json(&mut rx).await;
        assert_eq!(msg["backlog"], 0);
        assert!(msg["queue"].as_array().unwrap().is_empty());
        assert_eq!(msg["bufferCounts"]["EHA"], 0);

        // Next trigger self-heals.
        provider.failing.store(false, Ordering::SeqCst);
        hub.broadcast_queue_update().unwrap();
        let healed = recv_json(&mut rx).await;
        assert_eq!(healed["backlog"], 1);
    }

    #[tokio::test]
    async fn test_three_observer_scenario() {
        let provider = Arc::new(FakeProvider::default());
        provider.push_item("CAGE-1", Buffer::Rts);
        let hub = Hub::spawn(provider.clone(), HubSettings::default());

        let (op, mut op_rx) = hub.observer(identity(1, "Operator", Role::Fifo));
        let (sup_a, mut a_rx) = hub.observer(identity(2, "Sup A", Role::Leader));
        let (sup_b, mut b_rx) = hub.observer(identity(3, "Sup B", Role::Admin));
        let sup_a_id = sup_a.id();

        hub.register(op).unwrap();
        hub.register(sup_a).unwrap();
        hub.register(sup_b).unwrap();

        // Operator: snapshot only.
        assert_eq!(recv_json(&mut op_rx).await["type"], "queue_update");

        // Sup A: snapshot, roster(2), roster(3).
        assert_eq!(recv_json(&mut a_rx).await["type"], "queue_update");
        assert_eq!(recv_json(&mut a_rx).await["data"].as_array().unwrap().len(), 2);
        assert_eq!(recv_json(&mut a_rx).await["data"].as_array().unwrap().len(), 3);

        // Sup B: snapshot, roster(3).
        assert_eq!(recv_json(&mut b_rx).await["type"], "queue_update");
        assert_eq!(recv_json(&mut b_rx).await["data"].as_array().unwrap().len(), 3);

        // An entry commits, then the handler triggers one broadcast.
        provider.push_item("CAGE-2", Buffer::Eha);
        hub.broadcast_queue_update().unwrap();

        let from_op = recv_json(&mut op_rx).await;
        let from_a = recv_json(&mut a_rx).await;
        let from_b = recv_json(&mut b_rx).await;
        assert_eq!(from_op, from_a);
        assert_eq!(from_a, from_b);
        assert_eq!(from_op["backlog"], 2);
        assert_eq!(from_op["queue"][1]["trackingId"], "CAGE-2");

        // Sup A leaves.
        hub.unregister(sup_a_id).unwrap();
        let roster = recv_json(&mut b_rx).await;
        assert_eq!(roster["type"], "online_users");
        assert_eq!(roster["data"].as_array().unwrap().len(), 2);

        hub.roster().await.unwrap();
        assert_drained(&mut op_rx);
        assert_drained(&mut b_rx);
    }

    #[tokio::test]
    async fn test_shutdown_closes_observers() {
        let hub = Hub::spawn(Arc::new(FakeProvider::default()), HubSettings::default());

        let (obs, _rx) = hub.observer(identity(1, "Op", Role::Fifo));
        let handle = obs.clone();
        hub.register(obs).unwrap();

        hub.shutdown().await.unwrap();

        assert!(handle.is_closed());
        assert!(!hub.is_running());
        assert!(matches!(
            hub.broadcast_queue_update(),
            Err(HubError::ChannelClosed)
        ));
    }
}
