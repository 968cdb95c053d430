//! `§6.2` live stream WebSocket: a single `/ws/tests` endpoint where one connection manages
//! subscriptions to any number of test runs via `subscribe`/`unsubscribe`/`ping` messages.
//! Grounded on `hi-youichi-loom`'s `connection.rs`: a single recv loop dispatching by message
//! tag, generalised here to race that recv loop against a forwarding loop that fans
//! [`DomainEvent`]s from every subscribed test into one outgoing stream, since (unlike loom's
//! single in-flight run) a subscriber can be listening to several tests at once.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use mta_contracts::events::DomainEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::routes::ApiState;

/// Sized for a handful of concurrently subscribed tests forwarding into one connection;
/// the per-test bound already lives in `EventBus`, so this only needs to outrun this
/// socket's own write speed.
const AGGREGATE_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientMessage {
    Subscribe { test_id: Uuid },
    Unsubscribe { test_id: Uuid },
    Ping,
}

/// Control messages the server originates itself. Published [`DomainEvent`]s are sent as-is
/// — they already carry their own `{type, testId, ...}` tag (`§4.6`) — rather than nested
/// inside this enum, so the two are serialised through separate `send_*` helpers below.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ControlMessage {
    Subscribed { test_id: Uuid },
    Pong,
}

pub async fn test_stream(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    let event_bus = state.runner.event_bus();
    let (agg_tx, mut agg_rx) = mpsc::channel::<DomainEvent>(AGGREGATE_QUEUE_CAPACITY);
    let mut subscriptions: HashMap<Uuid, Uuid> = HashMap::new();

    loop {
        tokio::select! {
            event = agg_rx.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            frame = socket.recv() => {
                let Some(Ok(frame)) = frame else { break };
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Subscribe { test_id }) => {
                        if !subscriptions.contains_key(&test_id) {
                            let (subscriber_id, rx, _dropped) = event_bus.subscribe(test_id).await;
                            tokio::spawn(forward(rx, agg_tx.clone()));
                            subscriptions.insert(test_id, subscriber_id);
                        }
                        if send_control(&mut socket, &ControlMessage::Subscribed { test_id }).await.is_err() {
                            break;
                        }
                    }
                    Ok(ClientMessage::Unsubscribe { test_id }) => {
                        if let Some(subscriber_id) = subscriptions.remove(&test_id) {
                            event_bus.unsubscribe(test_id, subscriber_id).await;
                        }
                    }
                    Ok(ClientMessage::Ping) => {
                        if send_control(&mut socket, &ControlMessage::Pong).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unparseable websocket message");
                    }
                }
            }
        }
    }

    for (test_id, subscriber_id) in subscriptions {
        event_bus.unsubscribe(test_id, subscriber_id).await;
    }
}

/// Relays one test's events into the connection's aggregate channel until the bus-side
/// sender is dropped (`unsubscribe` ran) or the socket's own receiver has gone away.
async fn forward(mut rx: mpsc::Receiver<DomainEvent>, agg_tx: mpsc::Sender<DomainEvent>) {
    while let Some(event) = rx.recv().await {
        if agg_tx.send(event).await.is_err() {
            break;
        }
    }
}

async fn send_control(socket: &mut WebSocket, message: &ControlMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_default();
    socket.send(Message::Text(text)).await
}

async fn send_event(socket: &mut WebSocket, event: &DomainEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap_or_default();
    socket.send(Message::Text(text)).await
}
