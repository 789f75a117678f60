//! `GET /api/ws`: upgrades an authenticated request into a hub session.
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token may
//! also arrive as `?token=` (handled by `require_auth`).

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use futures_util::StreamExt;
use tracing::debug;

use fifo_hub::{run_session, ObserverIdentity};

use crate::auth::AuthUser;
use crate::AppState;

/// `GET /api/ws`
pub async fn upgrade(
    State(state): State<AppState>,
    auth: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    let identity = ObserverIdentity::from(auth.user());
    let (observer, outbound) = hub.observer(identity);
    let max_message_size = hub.settings().max_message_size;

    debug!(
        observer_id = %observer.id(),
        username = %auth.user().username,
        "Upgrading WebSocket connection"
    );

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            // The session logs its own outcome.
            let _ = run_session(hub, observer, outbound, sink, stream).await;
        })
}
