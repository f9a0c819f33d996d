// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use shroud_config::model::StorageConfig;
use shroud_core::types::{AdapterType, HealthStatus};
use shroud_core::{ProfileProvider, ServiceAdapter, ShroudError, StorageAdapter};
use shroud_core::types::{Conversation, NewQueuedMessage, QueuedMessage, SessionLock, UserProfile};

use crate::database::Database;
use crate::queries;

/// SQLite-backed durable store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`]
    /// is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ShroudError> {
        self.db.get().ok_or_else(|| ShroudError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl ServiceAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ShroudError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ShroudError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<(), ShroudError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| ShroudError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ShroudError> {
        self.db()?.close().await
    }

    // --- Conversations ---

    async fn conversation_by_pair(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>, ShroudError> {
        queries::conversations::get_by_pair(self.db()?, user_a, user_b).await
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), ShroudError> {
        queries::conversations::create(self.db()?, conversation).await
    }

    async fn touch_conversation(
        &self,
        user_a: &str,
        user_b: &str,
        last_activity_at: &str,
    ) -> Result<(), ShroudError> {
        queries::conversations::touch(self.db()?, user_a, user_b, last_activity_at).await
    }

    async fn partners_for(&self, user_id: &str, limit: i64) -> Result<Vec<String>, ShroudError> {
        queries::conversations::partners_for(self.db()?, user_id, limit).await
    }

    // --- Session locks ---

    async fn insert_lock(
        &self,
        lock: &SessionLock,
    ) -> Result<Option<SessionLock>, ShroudError> {
        queries::locks::insert(self.db()?, lock).await
    }

    async fn delete_lock(&self, conversation_id: &str) -> Result<bool, ShroudError> {
        queries::locks::delete(self.db()?, conversation_id).await
    }

    async fn get_lock(&self, conversation_id: &str) -> Result<Option<SessionLock>, ShroudError> {
        queries::locks::get(self.db()?, conversation_id).await
    }

    // --- Offline queue ---

    async fn insert_queued(&self, message: &NewQueuedMessage) -> Result<i64, ShroudError> {
        queries::queue::insert(self.db()?, message).await
    }

    async fn queued_for_receiver(
        &self,
        receiver_id: &str,
    ) -> Result<Vec<QueuedMessage>, ShroudError> {
        queries::queue::for_receiver(self.db()?, receiver_id).await
    }

    async fn delete_queued_by_id(&self, id: i64) -> Result<bool, ShroudError> {
        queries::queue::delete_by_id(self.db()?, id).await
    }

    async fn delete_queued_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<usize, ShroudError> {
        queries::queue::delete_for_conversation(self.db()?, conversation_id).await
    }

    async fn delete_queued_for_receiver(&self, receiver_id: &str) -> Result<usize, ShroudError> {
        queries::queue::delete_for_receiver(self.db()?, receiver_id).await
    }

    async fn count_queued_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<i64, ShroudError> {
        queries::queue::count_for_conversation(self.db()?, conversation_id).await
    }

    async fn count_queued_for_receiver(&self, receiver_id: &str) -> Result<i64, ShroudError> {
        queries::queue::count_for_receiver(self.db()?, receiver_id).await
    }

    async fn delete_queued_older_than(&self, cutoff: &str) -> Result<usize, ShroudError> {
        queries::queue::delete_older_than(self.db()?, cutoff).await
    }

    // --- User profiles ---

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ShroudError> {
        queries::profiles::get(self.db()?, user_id).await
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), ShroudError> {
        queries::profiles::upsert(self.db()?, profile).await
    }
}

/// The durable store doubles as the identity collaborator: device bindings
/// live in the same database.
#[async_trait]
impl ProfileProvider for SqliteStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, ShroudError> {
        self.get_profile(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_store_reports_its_identity() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert!(store.health_check().await.is_err());
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn full_delivery_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        // Conversation created on first contact.
        let conv = Conversation {
            id: "c1".to_string(),
            user_a: "alice".to_string(),
            user_b: "bob".to_string(),
            last_activity_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        store.create_conversation(&conv).await.unwrap();
        let found = store
            .conversation_by_pair("alice", "bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "c1");

        // Lock it for alice while bob is offline.
        let existing = store
            .insert_lock(&SessionLock {
                conversation_id: "c1".to_string(),
                locked_by: "alice".to_string(),
                reason: "OFFLINE_RECIPIENT".to_string(),
                locked_at: "2026-01-01T00:00:01.000Z".to_string(),
            })
            .await
            .unwrap();
        assert!(existing.is_none());
        assert!(store.get_lock("c1").await.unwrap().is_some());

        // Queue two messages for bob.
        for n in 1..=2 {
            store
                .insert_queued(&NewQueuedMessage {
                    conversation_id: "c1".to_string(),
                    sender_id: "alice".to_string(),
                    receiver_id: "bob".to_string(),
                    receiver_device_id: "dev-b".to_string(),
                    payload: format!("ciphertext-{n}"),
                    timestamp: n,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.count_queued_for_conversation("c1").await.unwrap(), 2);

        // Replay complete: queue and lock are cleared.
        assert_eq!(store.delete_queued_for_conversation("c1").await.unwrap(), 2);
        assert!(store.delete_lock("c1").await.unwrap());
        assert_eq!(store.count_queued_for_receiver("bob").await.unwrap(), 0);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn profile_provider_reads_device_bindings() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("profiles.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        store
            .upsert_profile(&UserProfile {
                user_id: "bob".to_string(),
                device_id: "dev-b".to_string(),
                display_name: None,
            })
            .await
            .unwrap();

        let profile = ProfileProvider::get_user(&store, "bob").await.unwrap();
        assert_eq!(profile.unwrap().device_id, "dev-b");
        assert!(ProfileProvider::get_user(&store, "ghost")
            .await
            .unwrap()
            .is_none());

        store.close().await.unwrap();
    }
}
