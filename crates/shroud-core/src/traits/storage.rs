// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable-store trait: the authoritative tier for conversations, session
//! locks, and queued messages.
//!
//! On any divergence between the cache and this store, this store wins; read
//! paths repopulate the cache from here (read-repair).

use async_trait::async_trait;

use crate::error::ShroudError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::{Conversation, NewQueuedMessage, QueuedMessage, SessionLock, UserProfile};

/// Adapter for the durable persistence backend.
#[async_trait]
pub trait StorageAdapter: ServiceAdapter {
    /// Initializes the storage backend (migrations, connection, PRAGMAs).
    async fn initialize(&self) -> Result<(), ShroudError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ShroudError>;

    // --- Conversations ---

    /// Look up a conversation by its canonical (sorted) participant pair.
    async fn conversation_by_pair(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>, ShroudError>;

    /// Insert a new conversation row. Fails on a duplicate pair.
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), ShroudError>;

    /// Upsert the pair's recency: create on first contact, otherwise bump
    /// `last_activity_at`.
    async fn touch_conversation(
        &self,
        user_a: &str,
        user_b: &str,
        last_activity_at: &str,
    ) -> Result<(), ShroudError>;

    /// The other participant of every conversation involving `user_id`,
    /// most recent first, capped at `limit`.
    async fn partners_for(&self, user_id: &str, limit: i64) -> Result<Vec<String>, ShroudError>;

    // --- Session locks ---

    /// Insert the lock row for a conversation if none exists. Returns the
    /// existing row when the conversation is already locked: concurrent
    /// acquires are resolved by the primary key, first writer wins, and the
    /// loser sees the winner's lock. Never replaces a held lock.
    async fn insert_lock(&self, lock: &SessionLock) -> Result<Option<SessionLock>, ShroudError>;

    /// Delete a lock row. Returns `false` if it was already gone.
    async fn delete_lock(&self, conversation_id: &str) -> Result<bool, ShroudError>;

    /// Read a lock row, if any.
    async fn get_lock(&self, conversation_id: &str) -> Result<Option<SessionLock>, ShroudError>;

    // --- Offline queue ---

    /// Insert a deferred message. Returns the assigned row id.
    async fn insert_queued(&self, message: &NewQueuedMessage) -> Result<i64, ShroudError>;

    /// All queued messages for a receiver in enqueue order.
    async fn queued_for_receiver(
        &self,
        receiver_id: &str,
    ) -> Result<Vec<QueuedMessage>, ShroudError>;

    /// Delete a single queued row once it has been redelivered and
    /// acknowledged. Returns `false` if the row was already gone.
    async fn delete_queued_by_id(&self, id: i64) -> Result<bool, ShroudError>;

    /// Delete every queued row for one conversation. Returns rows removed.
    async fn delete_queued_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<usize, ShroudError>;

    /// Delete every queued row addressed to a receiver. Returns rows removed.
    async fn delete_queued_for_receiver(&self, receiver_id: &str) -> Result<usize, ShroudError>;

    /// Queue depth for one conversation.
    async fn count_queued_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<i64, ShroudError>;

    /// Queue depth for one receiver across all conversations.
    async fn count_queued_for_receiver(&self, receiver_id: &str) -> Result<i64, ShroudError>;

    /// Retention sweep: delete queued rows created before `cutoff` (RFC 3339)
    /// regardless of delivery state. Returns rows removed.
    async fn delete_queued_older_than(&self, cutoff: &str) -> Result<usize, ShroudError>;

    // --- User profiles ---

    /// Read a user's profile (device binding), if known.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ShroudError>;

    /// Create or update a user's device binding.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), ShroudError>;
}
