// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The delivery pipeline: every send, connect, and disconnect flows
//! through here.
//!
//! A send resolves to exactly one [`SendAck`]; delivery rejections
//! (self-message, locked session, device mismatch) are acknowledgements,
//! not errors. Infrastructure failures propagate as `ShroudError` and the
//! transport layer folds them into an ERROR ack.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use shroud_core::types::{ActivityStatusEvent, MessagePayload, NewQueuedMessage, QueuedMessage};
use shroud_core::{ProfileProvider, SendAck, ShroudError};

use crate::directory::ConversationDirectory;
use crate::lock::SessionLockManager;
use crate::presence::PresenceBroadcaster;
use crate::queue::OfflineQueue;
use crate::registry::{ConnectionHandle, ConnectionRegistry, OutboundEvent};

/// Orchestrates registry, directory, locks, queue, and presence on every
/// transport event.
pub struct DeliveryPipeline {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<ConversationDirectory>,
    locks: Arc<SessionLockManager>,
    queue: Arc<OfflineQueue>,
    presence: Arc<PresenceBroadcaster>,
    profiles: Arc<dyn ProfileProvider>,
    ack_timeout: Duration,
    replay_pacing: Duration,
}

impl DeliveryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<ConversationDirectory>,
        locks: Arc<SessionLockManager>,
        queue: Arc<OfflineQueue>,
        presence: Arc<PresenceBroadcaster>,
        profiles: Arc<dyn ProfileProvider>,
        ack_timeout: Duration,
        replay_pacing: Duration,
    ) -> Self {
        Self {
            registry,
            directory,
            locks,
            queue,
            presence,
            profiles,
            ack_timeout,
            replay_pacing,
        }
    }

    /// Process one send attempt end to end.
    ///
    /// State machine: self-message reject → resolve conversation → lock
    /// gate → live delivery with bounded ack wait (device check before
    /// emit) → defer (lock + queue) when the recipient is unreachable.
    pub async fn send(&self, message: &MessagePayload) -> Result<SendAck, ShroudError> {
        let sender_id = message.sender.id.as_str();
        let receiver_id = message.receiver.id.as_str();

        if sender_id == receiver_id {
            debug!(sender_id, "self-message rejected");
            return Ok(SendAck::self_messaging());
        }

        let conversation = self.directory.resolve(sender_id, receiver_id).await?;

        if let Some(lock) = self.locks.status(&conversation.id).await
            && lock.locked_by != sender_id
        {
            let depth = self.queue.count_for_conversation(&conversation.id).await;
            warn!(conversation_id = %conversation.id, sender_id,
                  locked_by = %lock.locked_by, depth, "send rejected, session locked");
            return Ok(SendAck::session_locked(&lock.locked_by, depth));
        }

        if let Some(handle) = self.registry.lookup(receiver_id) {
            // Device check runs only on the live path: a stale declared
            // device must never poison the queue.
            if let Some(profile) = self.profiles.get_user(receiver_id).await?
                && profile.device_id != message.receiver.device_id
            {
                warn!(receiver_id, expected = %profile.device_id,
                      received = %message.receiver.device_id, "device id mismatch");
                return Ok(SendAck::device_mismatch(
                    &profile.device_id,
                    &message.receiver.device_id,
                ));
            }

            if handle
                .deliver_acked(message.clone(), false, self.ack_timeout)
                .await
            {
                self.directory.touch(sender_id, receiver_id).await;
                debug!(conversation_id = %conversation.id, receiver_id, "message delivered");
                return Ok(SendAck::delivered());
            }
            debug!(receiver_id, "live delivery not acknowledged, deferring");
        }

        self.defer(&conversation.id, message).await
    }

    /// Lock the conversation for the sender and queue the message.
    /// Re-queueing under one's own existing lock is allowed. When another
    /// sender's acquire raced past the lock gate first, the message is
    /// rejected as locked rather than queued under a foreign lock.
    async fn defer(
        &self,
        conversation_id: &str,
        message: &MessagePayload,
    ) -> Result<SendAck, ShroudError> {
        let sender_id = message.sender.id.as_str();
        let receiver_id = message.receiver.id.as_str();

        if let Some(held) = self.locks.acquire(conversation_id, sender_id).await? {
            let depth = self.queue.count_for_conversation(conversation_id).await;
            warn!(conversation_id, sender_id, locked_by = %held.locked_by, depth,
                  "deferral lost the lock race, session locked");
            return Ok(SendAck::session_locked(&held.locked_by, depth));
        }
        self.queue
            .enqueue(&NewQueuedMessage {
                conversation_id: conversation_id.to_string(),
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                receiver_device_id: message.receiver.device_id.clone(),
                payload: message.payload.clone(),
                timestamp: message.timestamp,
            })
            .await?;
        self.directory.touch(sender_id, receiver_id).await;

        info!(conversation_id, sender_id, receiver_id, "message queued for offline recipient");
        Ok(SendAck::queued())
    }

    /// Register a new connection, replay its queued backlog, and announce
    /// the user online. Returns `false` (and does nothing else) when the
    /// user already has a live connection.
    pub async fn handle_connect(&self, user_id: &str, handle: ConnectionHandle) -> bool {
        if !self.registry.register(user_id, handle.clone()).await {
            return false;
        }
        self.replay_queued(user_id, &handle).await;
        self.presence.broadcast(user_id, true).await;
        true
    }

    /// Unregister (only if the connection id matches) and announce the
    /// user offline.
    pub async fn handle_disconnect(&self, user_id: &str, connection_id: &str) {
        if self.registry.unregister(user_id, connection_id).await {
            self.presence.broadcast(user_id, false).await;
        }
    }

    /// Redeliver the queued backlog to a freshly connected user.
    ///
    /// Messages are grouped by conversation, preserving enqueue order, and
    /// redelivered through the same acked path as live sends, tagged
    /// `is_queued`. Replay skips the lock gate (the lock belongs to this
    /// flow) and does not re-validate device identity. Each acknowledged
    /// message's durable row is removed immediately, so a later reconnect
    /// never redelivers it; the lock is released only once a conversation
    /// is fully acknowledged, and the first failure short-circuits the
    /// rest of the batch, leaving the undelivered rows and their locks
    /// intact for the next reconnect.
    pub async fn replay_queued(&self, user_id: &str, handle: &ConnectionHandle) {
        let messages = match self.queue.drain(user_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(user_id, error = %e, "replay skipped, queue drain failed");
                return;
            }
        };
        if messages.is_empty() {
            debug!(user_id, "no queued messages to replay");
            return;
        }

        let total = messages.len();
        let groups = group_by_conversation(messages);
        let mut delivered_total = 0usize;
        let mut any_failure = false;

        'conversations: for (conversation_id, batch) in groups {
            let batch_len = batch.len();
            let mut delivered = 0usize;

            for (i, queued) in batch.iter().enumerate() {
                if i > 0 && !self.replay_pacing.is_zero() {
                    tokio::time::sleep(self.replay_pacing).await;
                }
                if handle
                    .deliver_acked(queued.to_payload(), true, self.ack_timeout)
                    .await
                {
                    self.queue.remove_delivered(queued).await;
                    delivered += 1;
                } else {
                    warn!(user_id, conversation_id = %conversation_id,
                          delivered, batch_len, "replay failed mid-conversation");
                    any_failure = true;
                    delivered_total += delivered;
                    break 'conversations;
                }
            }

            delivered_total += delivered;
            if let Err(e) = self.locks.release(&conversation_id).await {
                warn!(conversation_id = %conversation_id, error = %e,
                      "lock release after replay failed");
            }
            self.queue.clear_for_conversation(&conversation_id).await;
        }

        if any_failure {
            // Some conversations may already be cleared; dropping the
            // cache tier forces the next drain to rebuild from the durable
            // rows that actually remain, so nothing is redelivered twice.
            self.queue.invalidate_cache_for_user(user_id).await;
            warn!(user_id, delivered = delivered_total, total, "replay incomplete");
        } else {
            self.queue.clear_for_user(user_id).await;
            info!(user_id, delivered = delivered_total, total, "replay complete");
        }
    }

    /// Forward a transient activity indicator to its recipient, if online.
    /// Never queued; an offline recipient simply misses it.
    pub async fn forward_activity(&self, event: &ActivityStatusEvent) {
        match self.registry.lookup(&event.recipient_id) {
            Some(handle) => {
                if let Err(e) = handle.emit(OutboundEvent::Activity(event.clone())).await {
                    debug!(recipient_id = %event.recipient_id, error = %e,
                           "activity forward failed");
                }
            }
            None => debug!(recipient_id = %event.recipient_id,
                           "activity dropped, recipient offline"),
        }
    }

    /// Relay a peer-reported error frame verbatim to an online recipient.
    pub async fn relay_error(&self, recipient_id: &str, body: serde_json::Value) {
        match self.registry.lookup(recipient_id) {
            Some(handle) => {
                if let Err(e) = handle.emit(OutboundEvent::ErrorRelay(body)).await {
                    debug!(recipient_id, error = %e, "error relay failed");
                }
            }
            None => debug!(recipient_id, "error relay dropped, recipient offline"),
        }
    }

    /// Live-connection count for this process.
    pub fn online_count(&self) -> usize {
        self.registry.online_count()
    }
}

/// Group messages by conversation, preserving both the first-seen order of
/// conversations and the enqueue order within each.
fn group_by_conversation(messages: Vec<QueuedMessage>) -> Vec<(String, Vec<QueuedMessage>)> {
    let mut groups: Vec<(String, Vec<QueuedMessage>)> = Vec::new();
    for message in messages {
        match groups
            .iter_mut()
            .find(|(id, _)| *id == message.conversation_id)
        {
            Some((_, batch)) => batch.push(message),
            None => groups.push((message.conversation_id.clone(), vec![message])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(conversation_id: &str, n: i64) -> QueuedMessage {
        QueuedMessage {
            id: n,
            conversation_id: conversation_id.to_string(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            receiver_device_id: "dev-b".to_string(),
            payload: format!("m{n}"),
            timestamp: n,
            created_at: format!("2026-01-01T00:00:0{n}.000Z"),
        }
    }

    #[test]
    fn grouping_preserves_order_within_and_across_conversations() {
        let groups = group_by_conversation(vec![
            queued("c1", 1),
            queued("c2", 2),
            queued("c1", 3),
            queued("c2", 4),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "c1");
        assert_eq!(groups[0].1.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 3]);
        assert_eq!(groups[1].0, "c2");
        assert_eq!(groups[1].1.iter().map(|m| m.id).collect::<Vec<_>>(), [2, 4]);
    }
}
