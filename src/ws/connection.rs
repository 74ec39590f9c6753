//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single live-feed connection,
//! dispatching subscription commands and forwarding filtered events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{Selection, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::RaceEvent;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads subscription commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<RaceEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(race_event) => {
                        if !subs.matches(&race_event) {
                            continue;
                        }
                        let Some(json) = event_json(&race_event) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn event_json(event: &RaceEvent) -> Option<String> {
    let payload = serde_json::to_value(event).ok()?;
    let msg = WsMessage::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload);
    serde_json::to_string(&msg).ok()
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };

    let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::Subscribe { baton_ids }) => {
            let selection = Selection::from_selectors(baton_ids);
            subs.subscribe(&selection.ids, selection.wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": selection.ids,
                    "rejected": selection.rejected,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Ok(WsCommand::Unsubscribe { baton_ids }) => {
            let selection = Selection::from_selectors(baton_ids);
            subs.unsubscribe(&selection.ids, selection.wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": selection.ids,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&reply).ok()
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::BatonId;

    fn command(payload: serde_json::Value) -> String {
        serde_json::json!({
            "id": "req-1",
            "type": "command",
            "timestamp": "2024-03-01T10:00:00Z",
            "payload": payload,
        })
        .to_string()
    }

    fn reply(text: &str, subs: &mut SubscriptionManager) -> WsMessage {
        let Some(json) = handle_text_message(text, subs) else {
            panic!("expected a reply");
        };
        let Ok(msg) = serde_json::from_str::<WsMessage>(&json) else {
            panic!("reply is not an envelope: {json}");
        };
        msg
    }

    #[test]
    fn subscribe_then_unsubscribe() {
        let mut subs = SubscriptionManager::new();
        let msg = reply(
            &command(serde_json::json!({ "command": "subscribe", "baton_ids": [4, 5] })),
            &mut subs,
        );
        assert_eq!(msg.id, "req-1");
        assert_eq!(msg.msg_type, WsMessageType::Response);
        assert_eq!(msg.payload["count"], 2);
        assert_eq!(subs.count(), 2);

        let msg = reply(
            &command(serde_json::json!({ "command": "unsubscribe", "baton_ids": ["4"] })),
            &mut subs,
        );
        assert_eq!(msg.payload["remaining_count"], 1);
        let event = RaceEvent::DetectionRecorded {
            baton_id: BatonId::new(5),
            beacon_id: crate::domain::BeaconId::new(1),
            timestamp: chrono::Utc::now(),
        };
        assert!(subs.matches(&event));
    }

    #[test]
    fn malformed_json_gets_error() {
        let mut subs = SubscriptionManager::new();
        let msg = reply("{not json", &mut subs);
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 400);
    }

    #[test]
    fn unknown_command_gets_error() {
        let mut subs = SubscriptionManager::new();
        let msg = reply(&command(serde_json::json!({ "command": "reset" })), &mut subs);
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 404);
    }
}
