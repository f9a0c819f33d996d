// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation session locks, write-through across both tiers.
//!
//! A lock exists while messages are queued for an offline recipient and
//! gates delivery from every sender except its owner. Acquire goes to the
//! durable store first: its primary key decides races, first writer wins,
//! and the cache is then written with whichever lock actually holds.
//! `status` read-repairs the cache from the durable store on a miss.

use std::sync::Arc;

use tracing::{debug, warn};

use shroud_core::types::{LockReason, SessionLock};
use shroud_core::{CacheStore, ShroudError, StorageAdapter};

fn lock_key(conversation_id: &str) -> String {
    format!("session_lock:{conversation_id}")
}

/// Manages the UNLOCKED → LOCKED(owner) → UNLOCKED transitions for
/// conversations.
pub struct SessionLockManager {
    cache: Arc<dyn CacheStore>,
    storage: Arc<dyn StorageAdapter>,
}

impl SessionLockManager {
    pub fn new(cache: Arc<dyn CacheStore>, storage: Arc<dyn StorageAdapter>) -> Self {
        Self { cache, storage }
    }

    /// Lock a conversation for `owner`.
    ///
    /// Returns `None` when the lock is held by `owner` afterwards, either
    /// freshly acquired or already theirs; re-acquiring one's own lock is
    /// a no-op, not a refresh. Returns the holding lock when another owner
    /// got there first, leaving that lock intact.
    ///
    /// The durable insert is authoritative and its failure propagates; a
    /// failed cache write only degrades read latency.
    pub async fn acquire(
        &self,
        conversation_id: &str,
        owner: &str,
    ) -> Result<Option<SessionLock>, ShroudError> {
        let candidate = SessionLock {
            conversation_id: conversation_id.to_string(),
            locked_by: owner.to_string(),
            reason: LockReason::OfflineRecipient.to_string(),
            locked_at: crate::now_rfc3339(),
        };

        let (held_by_other, lock) = match self.storage.insert_lock(&candidate).await? {
            None => (false, candidate),
            Some(existing) => (existing.locked_by != owner, existing),
        };

        // Cache whichever lock actually holds, win or lose.
        match serde_json::to_string(&lock) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&lock_key(conversation_id), &json).await {
                    warn!(conversation_id, error = %e, "lock cache write failed");
                }
            }
            Err(e) => warn!(conversation_id, error = %e, "lock serialization failed"),
        }

        if held_by_other {
            debug!(conversation_id, owner, locked_by = %lock.locked_by,
                   "acquire lost, conversation already locked");
            return Ok(Some(lock));
        }
        debug!(conversation_id, owner, "session lock acquired");
        Ok(None)
    }

    /// Unlock a conversation. Tolerates an already-released lock.
    pub async fn release(&self, conversation_id: &str) -> Result<(), ShroudError> {
        if let Err(e) = self.cache.del(&lock_key(conversation_id)).await {
            warn!(conversation_id, error = %e, "lock cache delete failed");
        }
        let existed = self.storage.delete_lock(conversation_id).await?;
        debug!(conversation_id, existed, "session lock released");
        Ok(())
    }

    /// The current lock for a conversation, or `None` if unlocked.
    ///
    /// Cache first; on miss the durable row wins and repopulates the
    /// cache. A durable read failure is logged and reads as unlocked so a
    /// store outage degrades to direct-delivery attempts rather than
    /// blocking every send.
    pub async fn status(&self, conversation_id: &str) -> Option<SessionLock> {
        let key = lock_key(conversation_id);
        match self.cache.get(&key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(lock) => return Some(lock),
                Err(e) => warn!(conversation_id, error = %e, "corrupt cached lock, ignoring"),
            },
            Ok(None) => {}
            Err(e) => warn!(conversation_id, error = %e, "lock cache read failed"),
        }

        match self.storage.get_lock(conversation_id).await {
            Ok(Some(lock)) => {
                if let Ok(json) = serde_json::to_string(&lock)
                    && let Err(e) = self.cache.set(&key, &json).await
                {
                    warn!(conversation_id, error = %e, "lock cache repopulate failed");
                }
                Some(lock)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(conversation_id, error = %e, "lock durable read failed, treating as unlocked");
                None
            }
        }
    }
}
