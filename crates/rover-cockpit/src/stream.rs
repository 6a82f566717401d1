//! `GET /ws`: live stream of bus events.
//!
//! Every [`Topic::Telemetry`] and [`Topic::SystemAlerts`] event is forwarded
//! as one JSON text frame.  Client frames other than `Close` are ignored.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use rover_middleware::{Topic, TopicReceiver};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::routes::AppContext;

/// Subscribe first, then complete the handshake, so nothing published after
/// the `101` reply is missed.
pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    let telemetry = ctx.bus.subscribe_to(Topic::Telemetry);
    let alerts = ctx.bus.subscribe_to(Topic::SystemAlerts);
    ws.on_upgrade(move |socket| forward(socket, telemetry, alerts))
}

async fn forward(socket: WebSocket, mut telemetry: TopicReceiver, mut alerts: TopicReceiver) {
    info!("telemetry stream opened");
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        let next = tokio::select! {
            event = telemetry.recv() => event,
            event = alerts.recv() => event,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => continue,
            },
        };
        match next {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize bus event"),
            },
            Err(RecvError::Lagged(n)) => debug!(skipped = n, "stream client lagged"),
            Err(RecvError::Closed) => break,
        }
    }

    info!("telemetry stream closed");
}
