// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler bridging socket frames to the delivery pipeline.
//!
//! Client -> Server (JSON, tagged by `event`):
//! ```json
//! {"event": "message", "ref": "c-1", "sender": {...}, "receiver": {...}, "payload": "...", "timestamp": 0}
//! {"event": "ack", "message_id": "..."}
//! {"event": "activity_status", "recipient_id": "...", "status": "typing"}
//! {"event": "error", "recipient_id": "...", "detail": {...}}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"event": "message", "message_id": "...", "is_queued": false, "sender": {...}, ...}
//! {"event": "receipt", "ref": "c-1", "code": 200, "status": "DELIVERED", ...}
//! {"event": "presence", "user_id": "...", "status": true, "timestamp": 0}
//! {"event": "activity_status", ...}
//! {"event": "error", "detail": {...}}
//! ```
//!
//! Every outbound `message` frame carries a server-generated `message_id`;
//! the client answers with an `ack` frame, which resolves the pipeline's
//! bounded delivery wait (unanswered acks time out and read as offline).

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use shroud_core::SendAck;
use shroud_core::types::{ActivityStatus, ActivityStatusEvent, MessagePayload, PresenceUpdate};
use shroud_delivery::{ConnectionHandle, OutboundEvent};

use crate::server::GatewayState;

/// WebSocket handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// The already-verified identity of the connecting user.
    pub user_id: String,
}

/// Frame from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientFrame {
    /// A send attempt. `ref` is echoed back on the receipt.
    Message {
        #[serde(rename = "ref", default)]
        client_ref: Option<String>,
        #[serde(flatten)]
        payload: MessagePayload,
    },
    /// Acknowledges receipt of an outbound `message` frame.
    Ack { message_id: String },
    /// A transient activity indicator for one recipient.
    ActivityStatus {
        recipient_id: String,
        status: ActivityStatus,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// A client-side error to relay verbatim to an online peer.
    Error {
        recipient_id: String,
        detail: serde_json::Value,
    },
}

/// Frame from server to client.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ServerFrame {
    Message {
        message_id: String,
        is_queued: bool,
        #[serde(flatten)]
        payload: MessagePayload,
    },
    Receipt {
        #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
        #[serde(flatten)]
        ack: SendAck,
    },
    Presence {
        #[serde(flatten)]
        update: PresenceUpdate,
    },
    ActivityStatus {
        // `event` is the tag; the flattened payload needs another name.
        #[serde(flatten)]
        activity: ActivityStatusEvent,
    },
    Error { detail: serde_json::Value },
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

/// Handle an individual WebSocket connection.
///
/// Spawns a sender task that serializes outbound events and receipt
/// frames onto the socket, registers the connection with the pipeline
/// (replaying any backlog), then reads client frames until the socket
/// closes.
async fn handle_socket(socket: WebSocket, state: GatewayState, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (event_tx, mut event_rx) = mpsc::channel::<OutboundEvent>(64);
    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(64);
    let handle = ConnectionHandle::new(event_tx);
    let connection_id = handle.id().to_string();

    // message_id -> the pipeline's delivery-ack resolver.
    let pending_acks: Arc<DashMap<String, oneshot::Sender<bool>>> = Arc::new(DashMap::new());

    let sender_acks = pending_acks.clone();
    let sender_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => outbound_frame(event, &sender_acks),
                    None => break,
                },
                frame = frame_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
        // Flush receipts still buffered when the event channel closed.
        while let Ok(frame) = frame_rx.try_recv() {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
    });

    // The local handle keeps the event channel open until this function
    // returns, so receipts queued below cannot race the sender task's exit.
    if !state.pipeline.handle_connect(&user_id, handle.clone()).await {
        // Rejected duplicate: tell the client why, then drop the socket
        // without touching the first connection's registration.
        let receipt = ServerFrame::Receipt {
            client_ref: None,
            ack: SendAck::error("user already has an active connection"),
        };
        if let Ok(frame) = serde_json::to_string(&receipt) {
            let _ = frame_tx.send(frame).await;
        }
        return;
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(user_id, error = %e, "invalid WebSocket frame");
                        continue;
                    }
                };
                handle_frame(frame, &state, &user_id, &frame_tx, &pending_acks).await;
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary; ping/pong handled by the ws layer.
        }
    }

    state.pipeline.handle_disconnect(&user_id, &connection_id).await;
    // Dropping unresolved ack senders settles any in-flight delivery
    // waits as not-delivered.
    pending_acks.clear();
    sender_task.abort();
}

/// Serialize one outbound event, parking its ack resolver if present.
fn outbound_frame(
    event: OutboundEvent,
    pending_acks: &DashMap<String, oneshot::Sender<bool>>,
) -> String {
    let frame = match event {
        OutboundEvent::Message {
            payload,
            is_queued,
            ack,
        } => {
            let message_id = uuid::Uuid::new_v4().to_string();
            if let Some(ack) = ack {
                pending_acks.insert(message_id.clone(), ack);
            }
            ServerFrame::Message {
                message_id,
                is_queued,
                payload,
            }
        }
        OutboundEvent::Presence(update) => ServerFrame::Presence { update },
        OutboundEvent::Activity(event) => ServerFrame::ActivityStatus { activity: event },
        OutboundEvent::ErrorRelay(detail) => ServerFrame::Error { detail },
    };
    // The frame types serialize infallibly; an empty object is the
    // unreachable fallback.
    serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string())
}

async fn handle_frame(
    frame: ClientFrame,
    state: &GatewayState,
    user_id: &str,
    frame_tx: &mpsc::Sender<String>,
    pending_acks: &DashMap<String, oneshot::Sender<bool>>,
) {
    match frame {
        ClientFrame::Message {
            client_ref,
            payload,
        } => {
            let ack = if payload.sender.id != user_id {
                warn!(user_id, declared = %payload.sender.id, "sender spoof rejected");
                SendAck::error("sender does not match connection identity")
            } else {
                match state.pipeline.send(&payload).await {
                    Ok(ack) => ack,
                    Err(e) => {
                        tracing::error!(user_id, error = %e, "send failed");
                        SendAck::error("internal delivery failure")
                    }
                }
            };
            let receipt = ServerFrame::Receipt { client_ref, ack };
            if let Ok(frame) = serde_json::to_string(&receipt)
                && frame_tx.send(frame).await.is_err()
            {
                debug!(user_id, "receipt dropped, connection closing");
            }
        }
        ClientFrame::Ack { message_id } => {
            if let Some((_, resolver)) = pending_acks.remove(&message_id) {
                let _ = resolver.send(true);
            } else {
                debug!(user_id, message_id, "ack for unknown or expired message");
            }
        }
        ClientFrame::ActivityStatus {
            recipient_id,
            status,
            timestamp,
        } => {
            let event = ActivityStatusEvent {
                user_id: user_id.to_string(),
                recipient_id,
                status,
                timestamp: timestamp.unwrap_or_else(shroud_delivery::now_millis),
            };
            state.pipeline.forward_activity(&event).await;
        }
        ClientFrame::Error {
            recipient_id,
            detail,
        } => {
            state.pipeline.relay_error(&recipient_id, detail).await;
        }
    }
}
