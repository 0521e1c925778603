use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use integrisense_core::event_names::EVENT_PING;
use integrisense_events::{BroadcastHub, LiveEvent, Outbound};

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the socket is registered with the hub and managed by
/// a sender task plus the receive loop below.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Subscribes to the hub (which queues the `status` acknowledgment).
///   2. Spawns a sender task that maps hub messages onto frames.
///   3. Answers `ping` events from the client with a `pong` to it alone.
///   4. Ends the connection when either the client goes away or the hub
///      drops the subscriber, then unsubscribes.
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let subscription = hub.subscribe().await;
    let id = subscription.id;
    let mut rx = subscription.receiver;
    tracing::info!(subscriber_id = %id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let (frame, last) = match outbound {
                Outbound::Event(text) => (Message::Text(text.into()), false),
                Outbound::Ping => (Message::Ping(Bytes::new()), false),
                Outbound::Close => (Message::Close(None), true),
            };
            if sink.send(frame).await.is_err() {
                tracing::debug!(subscriber_id = %id, "WebSocket sink closed");
                return;
            }
            if last {
                return;
            }
        }
        // The hub dropped this subscriber.
        tracing::info!(subscriber_id = %id, "Subscriber evicted, closing WebSocket");
        let _ = sink.send(Message::Close(None)).await;
    });

    let recv_hub = Arc::clone(&hub);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {
                    tracing::trace!(subscriber_id = %id, "Pong received");
                }
                Ok(Message::Text(text)) => {
                    if is_ping(text.as_str()) {
                        recv_hub.send_to(id, &LiveEvent::pong()).await;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(subscriber_id = %id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Whichever side finishes first ends the connection.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unsubscribe(id).await;
    tracing::info!(subscriber_id = %id, "WebSocket disconnected");
}

/// A client liveness ping: `{"event": "ping"}` or the bare word `ping`.
fn is_ping(text: &str) -> bool {
    let text = text.trim();
    if text == EVENT_PING {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(|e| e == EVENT_PING))
        .unwrap_or(false)
}
