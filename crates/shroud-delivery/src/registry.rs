// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process connection registry: the liveness truth for this process.
//!
//! One live connection per user. Registration is atomic with respect to
//! concurrent connects for the same user (dashmap entry API); a duplicate
//! is rejected without displacing the first connection. Registration and
//! unregistration also toggle the `online_users` set in the cache tier,
//! best-effort, so presence can be queried outside this process.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use shroud_core::CacheStore;
use shroud_core::ShroudError;
use shroud_core::types::{ActivityStatusEvent, MessagePayload, PresenceUpdate};

/// Cache set tracking users with a live connection anywhere.
const ONLINE_USERS_KEY: &str = "online_users";

/// An event bound for a single live connection's transport.
#[derive(Debug)]
pub enum OutboundEvent {
    /// An encrypted message. `ack` resolves when the client acknowledges
    /// receipt; dropping it counts as not-acknowledged.
    Message {
        payload: MessagePayload,
        is_queued: bool,
        ack: Option<oneshot::Sender<bool>>,
    },
    /// A partner's presence transition.
    Presence(PresenceUpdate),
    /// A transient activity indicator (typing, recording, ...).
    Activity(ActivityStatusEvent),
    /// A peer-reported error relayed verbatim.
    ErrorRelay(serde_json::Value),
}

/// Handle to one live connection: an id plus the outbound channel the
/// transport task drains.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: String,
    sender: mpsc::Sender<OutboundEvent>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<OutboundEvent>) -> Self {
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.connection_id
    }

    /// Queue an event for the transport. Fails if the connection is gone.
    pub async fn emit(&self, event: OutboundEvent) -> Result<(), ShroudError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| ShroudError::Transport {
                message: "connection closed".to_string(),
                source: None,
            })
    }

    /// Deliver a message and wait up to `timeout` for the client's
    /// application-level acknowledgement. Always resolves to a definite
    /// outcome: `true` only on an explicit ack.
    pub async fn deliver_acked(
        &self,
        payload: MessagePayload,
        is_queued: bool,
        timeout: Duration,
    ) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        let event = OutboundEvent::Message {
            payload,
            is_queued,
            ack: Some(ack_tx),
        };
        if self.emit(event).await.is_err() {
            return false;
        }
        match tokio::time::timeout(timeout, ack_rx).await {
            Ok(Ok(acked)) => acked,
            // Ack sender dropped or timer fired: treat as offline.
            Ok(Err(_)) | Err(_) => false,
        }
    }
}

/// Map from user id to the single live [`ConnectionHandle`] for this process.
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
    cache: Arc<dyn CacheStore>,
}

impl ConnectionRegistry {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            connections: DashMap::new(),
            cache,
        }
    }

    /// Register a connection for `user_id`. Returns `false` without
    /// replacing anything if the user already has a live connection.
    pub async fn register(&self, user_id: &str, handle: ConnectionHandle) -> bool {
        match self.connections.entry(user_id.to_string()) {
            Entry::Occupied(existing) => {
                warn!(
                    user_id,
                    existing_connection = existing.get().id(),
                    rejected_connection = handle.id(),
                    "duplicate connection rejected"
                );
                false
            }
            Entry::Vacant(slot) => {
                debug!(user_id, connection_id = handle.id(), "connection registered");
                slot.insert(handle);
                if let Err(e) = self
                    .cache
                    .sadd(ONLINE_USERS_KEY, &[user_id.to_string()])
                    .await
                {
                    warn!(user_id, error = %e, "failed to mark user online in cache");
                }
                true
            }
        }
    }

    /// Remove the connection for `user_id`, but only if `connection_id`
    /// matches the registered handle. Returns whether a removal happened.
    ///
    /// The handle match prevents a slow disconnect of an old connection
    /// from evicting a newer one.
    pub async fn unregister(&self, user_id: &str, connection_id: &str) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, handle| handle.id() == connection_id)
            .is_some();
        if removed {
            debug!(user_id, connection_id, "connection unregistered");
            if let Err(e) = self.cache.srem(ONLINE_USERS_KEY, user_id).await {
                warn!(user_id, error = %e, "failed to mark user offline in cache");
            }
        }
        removed
    }

    /// The live handle for `user_id`, if any.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(user_id).map(|h| h.clone())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// Number of live connections in this process.
    pub fn online_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_core::types::Peer;

    fn cache() -> Arc<dyn CacheStore> {
        Arc::new(shroud_cache::MemoryCache::new())
    }

    fn handle() -> (ConnectionHandle, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (ConnectionHandle::new(tx), rx)
    }

    fn payload() -> MessagePayload {
        MessagePayload {
            sender: Peer {
                id: "alice".into(),
                device_id: "dev-a".into(),
            },
            receiver: Peer {
                id: "bob".into(),
                device_id: "dev-b".into(),
            },
            payload: "ciphertext".into(),
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn second_register_is_rejected_and_first_survives() {
        let registry = ConnectionRegistry::new(cache());
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();
        let first_id = h1.id().to_string();

        assert!(registry.register("alice", h1).await);
        assert!(!registry.register("alice", h2).await);
        assert_eq!(registry.lookup("alice").unwrap().id(), first_id);
    }

    #[tokio::test]
    async fn unregister_requires_matching_connection_id() {
        let registry = ConnectionRegistry::new(cache());
        let (h1, _rx) = handle();
        let id = h1.id().to_string();
        registry.register("alice", h1).await;

        assert!(!registry.unregister("alice", "some-other-id").await);
        assert!(registry.is_online("alice"));

        assert!(registry.unregister("alice", &id).await);
        assert!(!registry.is_online("alice"));
    }

    #[tokio::test]
    async fn register_toggles_online_users_set() {
        let mem = Arc::new(shroud_cache::MemoryCache::new());
        let registry = ConnectionRegistry::new(mem.clone());
        let (h1, _rx) = handle();
        let id = h1.id().to_string();

        registry.register("alice", h1).await;
        assert!(mem.sismember(ONLINE_USERS_KEY, "alice").await.unwrap());

        registry.unregister("alice", &id).await;
        assert!(!mem.sismember(ONLINE_USERS_KEY, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn deliver_acked_true_on_ack() {
        let (h, mut rx) = handle();
        let deliver = h.deliver_acked(payload(), false, Duration::from_secs(1));
        let answer = async {
            match rx.recv().await {
                Some(OutboundEvent::Message { ack: Some(ack), .. }) => {
                    ack.send(true).unwrap();
                }
                other => panic!("unexpected event: {other:?}"),
            }
        };
        let (delivered, ()) = tokio::join!(deliver, answer);
        assert!(delivered);
    }

    #[tokio::test]
    async fn deliver_acked_false_when_ack_dropped() {
        let (h, mut rx) = handle();
        let deliver = h.deliver_acked(payload(), false, Duration::from_secs(5));
        let answer = async {
            // Receiving and dropping the event drops the ack sender.
            let _ = rx.recv().await;
        };
        let (delivered, ()) = tokio::join!(deliver, answer);
        assert!(!delivered, "dropped ack must read as not delivered");
    }

    #[tokio::test]
    async fn deliver_acked_false_on_closed_connection() {
        let (h, rx) = handle();
        drop(rx);
        assert!(!h.deliver_acked(payload(), false, Duration::from_secs(1)).await);
    }
}
