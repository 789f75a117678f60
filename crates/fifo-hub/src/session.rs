//! # Observer Session
//!
//! Drives one WebSocket connection from registration to teardown.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        run_session()                                    │
//! │                                                                         │
//! │  1. hub.register(observer)                                             │
//! │                                                                         │
//! │  2. spawn writer                       3. run reader inline            │
//! │     ┌────────────────────────────┐        ┌─────────────────────────┐  │
//! │     │ select! (biased)           │        │ loop:                   │  │
//! │     │  close token   → stop      │        │  timeout(pong_wait,     │  │
//! │     │  outbound frame → send     │        │          next frame)    │  │
//! │     │  ping tick     → Ping      │        │  any frame → reset      │  │
//! │     │ each send under write_wait │        │  Close / EOF → stop     │  │
//! │     └────────────┬───────────────┘        │  too large → stop       │  │
//! │                  │                         └───────────┬─────────────┘  │
//! │                  └──────── shared CancellationToken ───┘                │
//! │                                                                         │
//! │  4. cancel token → hub.unregister(id) → await writer                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Whichever half fails first cancels the token and the other half follows.
//! The hub closing the observer (failed push, shutdown) cancels the same
//! token. Unregistering is idempotent in the hub, so teardown racing a hub
//! side close is harmless.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{HubError, HubResult};
use crate::hub::HubHandle;
use crate::observer::Observer;

/// Runs an observer connection until either side ends it.
///
/// ## Arguments
/// * `hub` - Hub to register with
/// * `observer` - The connection's hub-side handle
/// * `outbound` - Receiving end of the observer's outbound buffer
/// * `sink` - Write half of the socket
/// * `stream` - Read half of the socket
///
/// ## Returns
/// Why the session ended. `Ok` means an orderly close by either side.
pub async fn run_session<W, R, E>(
    hub: HubHandle,
    observer: Observer,
    outbound: mpsc::Receiver<Message>,
    sink: W,
    stream: R,
) -> HubResult<()>
where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
    R: Stream<Item = Result<Message, E>>,
    E: fmt::Display,
{
    let id = observer.id();
    let username = observer.identity().username.clone();
    let token = observer.close_token();
    let settings = hub.settings().clone();

    hub.register(observer)?;

    let writer = tokio::spawn(write_loop(
        sink,
        outbound,
        token.clone(),
        settings.ping_period(),
        settings.write_wait(),
    ));

    let read_result = read_loop(
        stream,
        &token,
        settings.pong_wait(),
        settings.max_message_size,
    )
    .await;

    token.cancel();
    if let Err(err) = hub.unregister(id) {
        debug!(observer_id = %id, error = %err, "Unregister after hub stopped");
    }

    let write_result = match writer.await {
        Ok(result) => result,
        Err(err) => {
            warn!(observer_id = %id, error = %err, "Session writer task failed");
            Ok(())
        }
    };

    // The reader's reason wins; a writer failure only shows when the reader
    // stopped because of it.
    let result = read_result.and(write_result);

    match &result {
        Ok(()) => info!(observer_id = %id, username = %username, "Observer session closed"),
        Err(err) if err.is_transport() => {
            info!(observer_id = %id, username = %username, reason = %err, "Observer session ended")
        }
        Err(err) => warn!(observer_id = %id, username = %username, error = %err, "Observer session failed"),
    }

    result
}

// =============================================================================
// Writer
// =============================================================================

async fn write_loop<W>(
    mut sink: W,
    mut outbound: mpsc::Receiver<Message>,
    token: CancellationToken,
    ping_period: Duration,
    write_wait: Duration,
) -> HubResult<()>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let mut ping = interval_at(Instant::now() + ping_period, ping_period);

    let result = loop {
        let frame = tokio::select! {
            biased;

            _ = token.cancelled() => break Ok(()),

            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break Ok(()),
            },

            _ = ping.tick() => {
                trace!("Sending keepalive ping");
                Message::Ping(Bytes::new())
            }
        };

        if let Err(err) = write_frame(&mut sink, frame, write_wait).await {
            token.cancel();
            break Err(err);
        }
    };

    // Best effort: the peer may already be gone.
    let _ = timeout(write_wait, sink.send(Message::Close(None))).await;
    let _ = timeout(write_wait, sink.close()).await;

    result
}

async fn write_frame<W>(sink: &mut W, frame: Message, write_wait: Duration) -> HubResult<()>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match timeout(write_wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(HubError::Transport(err.to_string())),
        Err(_) => Err(HubError::WriteTimeout(write_wait)),
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Watches the peer for liveness. Inbound content is never interpreted.
async fn read_loop<R, E>(
    stream: R,
    token: &CancellationToken,
    pong_wait: Duration,
    max_message_size: usize,
) -> HubResult<()>
where
    R: Stream<Item = Result<Message, E>>,
    E: fmt::Display,
{
    let mut stream = std::pin::pin!(stream);

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            next = timeout(pong_wait, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => return Err(HubError::ReadTimeout(pong_wait)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(err))) => return Err(HubError::Transport(err.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        if let Message::Close(_) = frame {
            return Ok(());
        }

        let size = frame_len(&frame);
        if size > max_message_size {
            return Err(HubError::FrameTooLarge {
                size,
                limit: max_message_size,
            });
        }

        trace!(size, "Inbound frame, read window reset");
    }
}

fn frame_len(frame: &Message) -> usize {
    match frame {
        Message::Text(text) => text.as_str().len(),
        Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data.len(),
        Message::Close(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubSettings;
    use crate::hub::Hub;
    use crate::observer::ObserverIdentity;
    use crate::snapshot::SnapshotProvider;
    use fifo_core::{QueueSnapshot, Role};
    use futures_util::stream;
    use std::future::Future;
    use tokio_util::sync::PollSender;

    struct EmptyProvider;

    impl SnapshotProvider for EmptyProvider {
        fn snapshot(&self) -> impl Future<Output = HubResult<QueueSnapshot>> + Send {
            async { Ok(QueueSnapshot::empty()) }
        }
    }

    type PeerFrame = Result<Message, String>;

    /// A fake socket: frames the session writes land in `wire`, frames the
    /// test sends on `peer` are what the session reads.
    struct Harness {
        hub: HubHandle,
        peer: mpsc::Sender<PeerFrame>,
        wire: mpsc::Receiver<Message>,
        session: tokio::task::JoinHandle<HubResult<()>>,
    }

    fn start(role: Role) -> Harness {
        let hub = Hub::spawn(EmptyProvider, HubSettings::default());
        let (observer, outbound) = hub.observer(ObserverIdentity {
            user_id: 1,
            username: "op".into(),
            full_name: "Operator".into(),
            role,
            sector: "Geral".into(),
        });

        let (peer, peer_rx) = mpsc::channel::<PeerFrame>(16);
        let (wire_tx, wire) = mpsc::channel::<Message>(16);

        let inbound = stream::unfold(peer_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });

        let session = tokio::spawn(run_session(
            hub.clone(),
            observer,
            outbound,
            PollSender::new(wire_tx),
            inbound,
        ));

        Harness {
            hub,
            peer,
            wire,
            session,
        }
    }

    fn is_text_of_type(frame: &Message, kind: &str) -> bool {
        match frame {
            Message::Text(text) => text.as_str().contains(&format!("\"type\":\"{kind}\"")),
            _ => false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_receives_initial_snapshot() {
        let mut h = start(Role::Fifo);

        let first = h.wire.recv().await.unwrap();
        assert!(is_text_of_type(&first, "queue_update"));
        assert_eq!(h.hub.online_count().await.unwrap(), 1);

        drop(h.peer);
        assert!(h.session.await.unwrap().is_ok());
        assert_eq!(h.hub.online_count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let h = start(Role::Leader);
        let started = Instant::now();

        let result = h.session.await.unwrap();

        assert!(matches!(result, Err(HubError::ReadTimeout(_))));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(h.hub.online_count().await.unwrap(), 0);
        drop(h.peer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_written_before_read_window_closes() {
        let mut h = start(Role::Fifo);
        let started = Instant::now();

        let first = h.wire.recv().await.unwrap();
        assert!(is_text_of_type(&first, "queue_update"));

        let second = h.wire.recv().await.unwrap();
        assert!(matches!(second, Message::Ping(_)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(54));
        assert!(elapsed < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pongs_keep_session_alive() {
        let Harness {
            hub,
            peer,
            mut wire,
            session,
        } = start(Role::Fifo);

        let responder = tokio::spawn(async move {
            while let Some(frame) = wire.recv().await {
                if let Message::Ping(payload) = frame {
                    if peer.send(Ok(Message::Pong(payload))).await.is_err() {
                        break;
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(hub.online_count().await.unwrap(), 1);
        assert!(!session.is_finished());

        responder.abort();
        let _ = session.await.unwrap();
        assert_eq!(hub.online_count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_frame_ends_session() {
        let h = start(Role::Fifo);

        let big = "x".repeat(600);
        h.peer.send(Ok(Message::Text(big.into()))).await.unwrap();

        let result = h.session.await.unwrap();
        assert!(matches!(
            result,
            Err(HubError::FrameTooLarge { size: 600, limit: 512 })
        ));
        assert_eq!(h.hub.online_count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_frame_ends_session() {
        let h = start(Role::Admin);

        h.peer.send(Ok(Message::Close(None))).await.unwrap();

        assert!(h.session.await.unwrap().is_ok());
        assert_eq!(h.hub.online_count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hub_shutdown_closes_session() {
        let mut h = start(Role::Fifo);
        assert!(is_text_of_type(&h.wire.recv().await.unwrap(), "queue_update"));

        h.hub.shutdown().await.unwrap();

        assert!(h.session.await.unwrap().is_ok());
        let last = h.wire.recv().await.unwrap();
        assert!(matches!(last, Message::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_write_half_ends_session() {
        let h = start(Role::Fifo);
        drop(h.wire);

        let result = h.session.await.unwrap();
        assert!(matches!(result, Err(HubError::Transport(_))));
        assert_eq!(h.hub.online_count().await.unwrap(), 0);
        drop(h.peer);
    }
}
