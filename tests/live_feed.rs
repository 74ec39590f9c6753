//! Live lap feed over WebSocket.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn subscriber_receives_lap_for_followed_baton() {
    let h = common::start().await;
    let url = format!("ws://{}/ws", h.http_addr);
    let Ok((mut ws, _)) = tokio_tungstenite::connect_async(url).await else {
        panic!("websocket handshake failed");
    };

    let subscribe = serde_json::json!({
        "id": "sub-1",
        "type": "command",
        "timestamp": "2024-03-01T10:00:00Z",
        "payload": { "command": "subscribe", "baton_ids": [1] },
    });
    let Ok(()) = ws.send(Message::text(subscribe.to_string())).await else {
        panic!("failed to send subscribe");
    };
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["payload"]["count"], 1);

    let mut link = common::beacon_link(h.beacon_addr).await;
    common::send_detection(&mut link, "AA:00:00:00:00:01", "BB:00:00:00:00:0X", 0).await;
    common::send_detection(&mut link, "AA:00:00:00:00:01", "BB:00:00:00:00:0X", 20_000).await;

    let lap = loop {
        let msg = next_json(&mut ws).await;
        if msg["payload"]["event_type"] == "lap_completed" {
            break msg;
        }
    };
    assert_eq!(lap["type"], "event");
    assert_eq!(lap["payload"]["baton_id"], 1);
    assert_eq!(lap["payload"]["source_name"], "simple-lapper");

    h.aggregator.shutdown(Duration::from_secs(1)).await;
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(2), ws.next()).await else {
        panic!("no message within two seconds");
    };
    let Ok(text) = msg.into_text() else {
        panic!("expected a text frame");
    };
    let Ok(value) = serde_json::from_str(text.as_str()) else {
        panic!("frame is not JSON");
    };
    value
}
