// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted mock connection for deterministic delivery testing.
//!
//! `TestConnection` stands in for a live transport: it drains the
//! outbound channel behind a [`ConnectionHandle`], captures every event
//! for assertions, and answers delivery acks according to a scripted
//! [`AckBehavior`]. A declined ack is modelled by dropping the ack sender,
//! which the pipeline reads as not-delivered without waiting out the full
//! timeout.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use shroud_core::types::{ActivityStatusEvent, MessagePayload, PresenceUpdate};
use shroud_delivery::{ConnectionHandle, OutboundEvent};

/// How a connection answers delivery acknowledgements.
#[derive(Debug, Clone, Copy)]
pub enum AckBehavior {
    /// Acknowledge every message.
    AckAll,
    /// Acknowledge nothing.
    AckNone,
    /// Acknowledge the first `n` messages, then stop acknowledging.
    FailAfter(usize),
}

/// An outbound event as seen by the client, with the ack plumbing removed.
#[derive(Debug, Clone)]
pub enum CapturedEvent {
    Message {
        payload: MessagePayload,
        is_queued: bool,
    },
    Presence(PresenceUpdate),
    Activity(ActivityStatusEvent),
    ErrorRelay(serde_json::Value),
}

/// A scripted live connection.
pub struct TestConnection {
    handle: ConnectionHandle,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    task: JoinHandle<()>,
}

impl TestConnection {
    /// Spawn a connection task draining its outbound channel with the
    /// given ack script.
    pub fn spawn(behavior: AckBehavior) -> Self {
        let (tx, mut rx) = mpsc::channel::<OutboundEvent>(64);
        let handle = ConnectionHandle::new(tx);
        let events: Arc<Mutex<Vec<CapturedEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let captured = events.clone();
        let task = tokio::spawn(async move {
            let mut messages_seen = 0usize;
            while let Some(event) = rx.recv().await {
                match event {
                    OutboundEvent::Message {
                        payload,
                        is_queued,
                        ack,
                    } => {
                        messages_seen += 1;
                        captured
                            .lock()
                            .await
                            .push(CapturedEvent::Message { payload, is_queued });
                        let should_ack = match behavior {
                            AckBehavior::AckAll => true,
                            AckBehavior::AckNone => false,
                            AckBehavior::FailAfter(n) => messages_seen <= n,
                        };
                        if let Some(ack) = ack
                            && should_ack
                        {
                            let _ = ack.send(true);
                        }
                        // A withheld ack is dropped here, resolving the
                        // pipeline's wait immediately as not-delivered.
                    }
                    OutboundEvent::Presence(update) => {
                        captured.lock().await.push(CapturedEvent::Presence(update));
                    }
                    OutboundEvent::Activity(event) => {
                        captured.lock().await.push(CapturedEvent::Activity(event));
                    }
                    OutboundEvent::ErrorRelay(body) => {
                        captured.lock().await.push(CapturedEvent::ErrorRelay(body));
                    }
                }
            }
        });

        Self {
            handle,
            events,
            task,
        }
    }

    /// The handle to register with the pipeline.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn connection_id(&self) -> &str {
        self.handle.id()
    }

    /// Everything this connection has received so far.
    pub async fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().await.clone()
    }

    /// The message events received, as `(payload, is_queued)` pairs.
    pub async fn messages(&self) -> Vec<(MessagePayload, bool)> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                CapturedEvent::Message { payload, is_queued } => {
                    Some((payload.clone(), *is_queued))
                }
                _ => None,
            })
            .collect()
    }

    /// The presence updates received.
    pub async fn presence_events(&self) -> Vec<PresenceUpdate> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                CapturedEvent::Presence(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    /// Kill the transport: the drain task stops and every subsequent emit
    /// to this connection fails, simulating a socket that died without a
    /// clean disconnect.
    pub fn kill(&self) {
        self.task.abort();
    }
}

impl Drop for TestConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
