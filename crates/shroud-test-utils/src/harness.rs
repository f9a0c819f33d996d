// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling the complete delivery stack.
//!
//! Builds the full component graph (temp SQLite durable store, in-process
//! cache, registry, directory, locks, queue, presence, pipeline) the same
//! way the serve command wires it, with test-friendly timings: a short
//! ack timeout and no replay pacing delay.

use std::sync::Arc;
use std::time::Duration;

use shroud_cache::MemoryCache;
use shroud_config::model::StorageConfig;
use shroud_core::types::{MessagePayload, Peer, UserProfile};
use shroud_core::{CacheStore, ProfileProvider, ShroudError, StorageAdapter};
use shroud_delivery::{
    ConnectionRegistry, ConversationDirectory, DeliveryPipeline, OfflineQueue,
    PresenceBroadcaster, SessionLockManager,
};
use shroud_storage::SqliteStore;

use crate::mock_connection::{AckBehavior, TestConnection};

/// The full delivery stack over a temp database.
///
/// Component fields are public so tests can drive any layer directly.
pub struct TestHarness {
    pub cache: Arc<MemoryCache>,
    pub storage: Arc<SqliteStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub directory: Arc<ConversationDirectory>,
    pub locks: Arc<SessionLockManager>,
    pub queue: Arc<OfflineQueue>,
    pub presence: Arc<PresenceBroadcaster>,
    pub pipeline: Arc<DeliveryPipeline>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Result<Self, ShroudError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ShroudError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = Arc::new(SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await?;

        let cache = Arc::new(MemoryCache::new());
        let cache_dyn: Arc<dyn CacheStore> = cache.clone();
        let storage_dyn: Arc<dyn StorageAdapter> = storage.clone();
        let profiles: Arc<dyn ProfileProvider> = storage.clone();

        let registry = Arc::new(ConnectionRegistry::new(cache_dyn.clone()));
        let directory = Arc::new(ConversationDirectory::new(
            storage_dyn.clone(),
            cache_dyn.clone(),
            Duration::from_secs(3600),
            50,
        ));
        let locks = Arc::new(SessionLockManager::new(cache_dyn.clone(), storage_dyn.clone()));
        let queue = Arc::new(OfflineQueue::new(
            cache_dyn,
            storage_dyn,
            Duration::from_secs(86_400),
        ));
        let presence = Arc::new(PresenceBroadcaster::new(registry.clone(), directory.clone()));
        let pipeline = Arc::new(DeliveryPipeline::new(
            registry.clone(),
            directory.clone(),
            locks.clone(),
            queue.clone(),
            presence.clone(),
            profiles,
            Duration::from_secs(1),
            Duration::ZERO,
        ));

        Ok(Self {
            cache,
            storage,
            registry,
            directory,
            locks,
            queue,
            presence,
            pipeline,
            _temp_dir: temp_dir,
        })
    }

    /// Register a device binding so the pipeline's device check has a
    /// profile to compare against.
    pub async fn bind_device(&self, user_id: &str, device_id: &str) -> Result<(), ShroudError> {
        self.storage
            .upsert_profile(&UserProfile {
                user_id: user_id.to_string(),
                device_id: device_id.to_string(),
                display_name: None,
            })
            .await
    }

    /// Connect a user through the full pipeline (register, replay,
    /// presence). Panics on a duplicate connection; use [`Self::try_connect`]
    /// to assert rejection.
    pub async fn connect(&self, user_id: &str, behavior: AckBehavior) -> TestConnection {
        let (connection, accepted) = self.try_connect(user_id, behavior).await;
        assert!(accepted, "connect for `{user_id}` was rejected as a duplicate");
        connection
    }

    /// Connect a user, returning whether the registration was accepted.
    pub async fn try_connect(
        &self,
        user_id: &str,
        behavior: AckBehavior,
    ) -> (TestConnection, bool) {
        let connection = TestConnection::spawn(behavior);
        let accepted = self
            .pipeline
            .handle_connect(user_id, connection.handle())
            .await;
        (connection, accepted)
    }

    /// Disconnect a user through the full pipeline.
    pub async fn disconnect(&self, user_id: &str, connection: &TestConnection) {
        self.pipeline
            .handle_disconnect(user_id, connection.connection_id())
            .await;
    }

    /// Build a wire payload with the current time as its timestamp.
    pub fn payload(
        sender: (&str, &str),
        receiver: (&str, &str),
        ciphertext: &str,
    ) -> MessagePayload {
        MessagePayload {
            sender: Peer {
                id: sender.0.to_string(),
                device_id: sender.1.to_string(),
            },
            receiver: Peer {
                id: receiver.0.to_string(),
                device_id: receiver.1.to_string(),
            },
            payload: ciphertext.to_string(),
            timestamp: shroud_delivery::now_millis(),
        }
    }
}
