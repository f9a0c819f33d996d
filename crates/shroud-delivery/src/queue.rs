// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dual-tier offline queue: a TTL'd cache list per receiver for fast
//! drains, backed by durable rows that survive cache eviction and process
//! restarts.
//!
//! Contract per operation: the durable write in `enqueue` is fatal on
//! failure (losing the backstop means an unrecoverable message) and runs
//! first so cache rows always carry their durable row id; the cache
//! append is best-effort. Clears and counts are best-effort; `drain`
//! propagates durable failures so replay can bail out safely.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use shroud_core::types::{NewQueuedMessage, QueuedMessage};
use shroud_core::{CacheStore, ShroudError, StorageAdapter};

fn queue_key(receiver_id: &str) -> String {
    format!("message_queue:{receiver_id}")
}

/// FIFO per-recipient buffer of undelivered payloads.
pub struct OfflineQueue {
    cache: Arc<dyn CacheStore>,
    storage: Arc<dyn StorageAdapter>,
    queue_ttl: Duration,
}

impl OfflineQueue {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        storage: Arc<dyn StorageAdapter>,
        queue_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            storage,
            queue_ttl,
        }
    }

    /// Defer a message: insert the durable row, then append the full
    /// record to the cache list (fast tier, TTL'd). Returns the durable
    /// row id.
    pub async fn enqueue(&self, message: &NewQueuedMessage) -> Result<i64, ShroudError> {
        let id = self.storage.insert_queued(message).await?;

        // Cache rows carry the full record, id included, so a drain served
        // from the cache can group by conversation and replay can delete
        // each delivered row individually.
        let key = queue_key(&message.receiver_id);
        let cache_row = QueuedMessage {
            id,
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            receiver_device_id: message.receiver_device_id.clone(),
            payload: message.payload.clone(),
            timestamp: message.timestamp,
            created_at: crate::now_rfc3339(),
        };
        match serde_json::to_string(&cache_row) {
            Ok(json) => {
                if let Err(e) = self.cache.rpush(&key, &json).await {
                    warn!(receiver_id = %message.receiver_id, error = %e,
                          "queue cache write failed");
                } else if let Err(e) = self.cache.expire(&key, self.queue_ttl).await {
                    warn!(receiver_id = %message.receiver_id, error = %e,
                          "queue cache expire failed");
                }
            }
            Err(e) => warn!(receiver_id = %message.receiver_id, error = %e,
                            "queued message serialization failed"),
        }

        debug!(receiver_id = %message.receiver_id,
               conversation_id = %message.conversation_id,
               queued_id = id, "message queued");
        Ok(id)
    }

    /// Remove one delivered message's durable row. Best-effort: a missed
    /// delete risks a one-off redelivery, which the receiving client
    /// deduplicates, while the stale cache tier is handled by the caller
    /// invalidating or clearing the user's list after replay.
    pub async fn remove_delivered(&self, message: &QueuedMessage) {
        match self.storage.delete_queued_by_id(message.id).await {
            Ok(true) => {}
            Ok(false) => debug!(queued_id = message.id, "delivered row already removed"),
            Err(e) => warn!(queued_id = message.id, error = %e,
                            "failed to remove delivered row"),
        }
    }

    /// All queued messages for a user in enqueue order.
    ///
    /// Serves from the cache list when it is intact; otherwise rebuilds
    /// from the durable store and, only when non-empty, rehydrates the
    /// cache for future fast reads.
    pub async fn drain(&self, user_id: &str) -> Result<Vec<QueuedMessage>, ShroudError> {
        let key = queue_key(user_id);

        match self.cache.lrange(&key).await {
            Ok(rows) if !rows.is_empty() => {
                let mut messages = Vec::with_capacity(rows.len());
                let mut intact = true;
                for row in &rows {
                    match serde_json::from_str::<QueuedMessage>(row) {
                        Ok(message) => messages.push(message),
                        Err(e) => {
                            warn!(user_id, error = %e,
                                  "corrupt cached queue row, rebuilding from durable store");
                            intact = false;
                            break;
                        }
                    }
                }
                if intact {
                    debug!(user_id, count = messages.len(), "queue drained from cache");
                    return Ok(messages);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "queue cache read failed"),
        }

        let messages = self.storage.queued_for_receiver(user_id).await?;
        if !messages.is_empty() {
            debug!(user_id, count = messages.len(), "queue rebuilt from durable store");
            // Rehydrate so a second drain before replay completes is fast.
            if let Err(e) = self.cache.del(&key).await {
                warn!(user_id, error = %e, "queue cache reset failed");
            }
            for message in &messages {
                if let Ok(json) = serde_json::to_string(message)
                    && let Err(e) = self.cache.rpush(&key, &json).await
                {
                    warn!(user_id, error = %e, "queue cache rehydrate failed");
                    break;
                }
            }
            if let Err(e) = self.cache.expire(&key, self.queue_ttl).await {
                warn!(user_id, error = %e, "queue cache expire failed");
            }
        }
        Ok(messages)
    }

    /// Remove the durable rows for a fully replayed conversation.
    /// Best-effort: failures are logged, the retention sweep is the backstop.
    pub async fn clear_for_conversation(&self, conversation_id: &str) {
        match self.storage.delete_queued_for_conversation(conversation_id).await {
            Ok(removed) => debug!(conversation_id, removed, "conversation queue cleared"),
            Err(e) => warn!(conversation_id, error = %e, "conversation queue clear failed"),
        }
    }

    /// Remove everything queued for a user: the cache list and any durable
    /// leftovers. Best-effort.
    pub async fn clear_for_user(&self, user_id: &str) {
        if let Err(e) = self.cache.del(&queue_key(user_id)).await {
            warn!(user_id, error = %e, "queue cache clear failed");
        }
        match self.storage.delete_queued_for_receiver(user_id).await {
            Ok(removed) => debug!(user_id, removed, "user queue cleared"),
            Err(e) => warn!(user_id, error = %e, "user queue clear failed"),
        }
    }

    /// Drop only the cache tier for a user, forcing the next drain to
    /// rebuild from the durable store. Used after a partial replay, where
    /// some conversations' durable rows were cleared and redelivering the
    /// stale cache list would duplicate them.
    pub async fn invalidate_cache_for_user(&self, user_id: &str) {
        if let Err(e) = self.cache.del(&queue_key(user_id)).await {
            warn!(user_id, error = %e, "queue cache invalidation failed");
        }
    }

    /// Queue depth for one conversation. Best-effort: failures read as zero.
    pub async fn count_for_conversation(&self, conversation_id: &str) -> i64 {
        match self.storage.count_queued_for_conversation(conversation_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(conversation_id, error = %e, "queue count failed");
                0
            }
        }
    }

    /// Queue depth for a user, preferring the cheap cache path.
    pub async fn count_for_user(&self, user_id: &str) -> i64 {
        match self.cache.llen(&queue_key(user_id)).await {
            Ok(len) if len > 0 => return len,
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "queue cache count failed"),
        }
        match self.storage.count_queued_for_receiver(user_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(user_id, error = %e, "queue durable count failed");
                0
            }
        }
    }

    /// Retention sweep: delete durable rows older than the queue TTL,
    /// regardless of delivery state. Returns rows removed.
    pub async fn cleanup_old_messages(&self) -> Result<usize, ShroudError> {
        let cutoff = (chrono::Utc::now()
            - chrono::Duration::from_std(self.queue_ttl).unwrap_or(chrono::Duration::hours(24)))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
        let removed = self.storage.delete_queued_older_than(&cutoff).await?;
        if removed > 0 {
            debug!(removed, %cutoff, "expired queued messages purged");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_key_is_per_receiver() {
        assert_eq!(queue_key("bob"), "message_queue:bob");
    }
}
