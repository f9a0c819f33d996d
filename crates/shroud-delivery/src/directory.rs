// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation directory: canonical pair resolution and partner recency.
//!
//! A conversation is keyed by the lexicographically sorted participant
//! pair, so `resolve(a, b) == resolve(b, a)`. Partner lists are served
//! from a TTL'd cache set and read-repaired from the durable store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use shroud_core::types::Conversation;
use shroud_core::{CacheStore, ShroudError, StorageAdapter};

fn partners_key(user_id: &str) -> String {
    format!("partners:{user_id}")
}

/// Sort a participant pair into its canonical order.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Resolves user pairs to conversations and ranks recent partners.
pub struct ConversationDirectory {
    storage: Arc<dyn StorageAdapter>,
    cache: Arc<dyn CacheStore>,
    partner_ttl: Duration,
    partner_limit: i64,
}

impl ConversationDirectory {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        cache: Arc<dyn CacheStore>,
        partner_ttl: Duration,
        partner_limit: i64,
    ) -> Self {
        Self {
            storage,
            cache,
            partner_ttl,
            partner_limit,
        }
    }

    /// Resolve the conversation for a pair, creating it on first contact.
    pub async fn resolve(&self, user_a: &str, user_b: &str) -> Result<Conversation, ShroudError> {
        let (first, second) = canonical_pair(user_a, user_b);

        if let Some(conversation) = self.storage.conversation_by_pair(first, second).await? {
            return Ok(conversation);
        }

        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_a: first.to_string(),
            user_b: second.to_string(),
            last_activity_at: crate::now_rfc3339(),
        };
        match self.storage.create_conversation(&conversation).await {
            Ok(()) => {
                debug!(conversation_id = %conversation.id, user_a = first, user_b = second,
                       "conversation created");
                Ok(conversation)
            }
            // A concurrent resolve for the same pair can win the insert race;
            // the unique key makes the loser's insert fail, so re-read.
            Err(insert_err) => match self.storage.conversation_by_pair(first, second).await? {
                Some(existing) => Ok(existing),
                None => Err(insert_err),
            },
        }
    }

    /// Bump the pair's recency and invalidate both partner caches.
    /// Failures are logged and swallowed: a missed recency bump must never
    /// abort message delivery.
    pub async fn touch(&self, user_a: &str, user_b: &str) {
        let (first, second) = canonical_pair(user_a, user_b);
        if let Err(e) = self
            .storage
            .touch_conversation(first, second, &crate::now_rfc3339())
            .await
        {
            warn!(user_a = first, user_b = second, error = %e, "conversation touch failed");
        }
        for user in [user_a, user_b] {
            if let Err(e) = self.cache.del(&partners_key(user)).await {
                warn!(user_id = user, error = %e, "partner cache invalidation failed");
            }
        }
    }

    /// A user's most recent conversation partners, capped at the configured
    /// limit. Cache hit returns the cached set; miss rebuilds from the
    /// durable store and repopulates the cache with a fixed TTL.
    pub async fn recent_partners(&self, user_id: &str) -> Result<Vec<String>, ShroudError> {
        let key = partners_key(user_id);
        match self.cache.smembers(&key).await {
            Ok(partners) if !partners.is_empty() => {
                debug!(user_id, count = partners.len(), "partner cache hit");
                return Ok(partners);
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "partner cache read failed"),
        }

        let partners = self.storage.partners_for(user_id, self.partner_limit).await?;
        if !partners.is_empty() {
            if let Err(e) = self.cache.sadd(&key, &partners).await {
                warn!(user_id, error = %e, "partner cache repopulate failed");
            } else if let Err(e) = self.cache.expire(&key, self.partner_ttl).await {
                warn!(user_id, error = %e, "partner cache expire failed");
            }
            debug!(user_id, count = partners.len(), "partner cache rebuilt");
        }
        Ok(partners)
    }
}
