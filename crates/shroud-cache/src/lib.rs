// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process implementation of the fast-cache tier.
//!
//! `MemoryCache` backs the [`CacheStore`] trait with a dashmap of typed
//! entries (string, list, set) carrying optional expiries. It is ephemeral
//! by contract: nothing here is authoritative, and every consumer must
//! tolerate a flushed or cold cache by read-repairing from the durable
//! store.
//!
//! Expiry is lazy (checked on access) plus an explicit [`MemoryCache::purge_expired`]
//! hook the daemon calls on a timer.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use shroud_core::types::{AdapterType, HealthStatus};
use shroud_core::{CacheStore, ServiceAdapter, ShroudError};

/// Value kinds a cache key can hold.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Set(HashSet<String>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Dashmap-backed ephemeral key/value store with per-key TTL.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop every expired entry. Called periodically by the daemon so keys
    /// that are never read again do not accumulate.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired());
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }

    /// Drop everything. Tests use this to simulate a cache-tier flush.
    pub fn flush_all(&self) {
        self.entries.clear();
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an entry, removing it if expired.
    fn live_entry(&self, key: &str) -> Option<Entry> {
        match self.entries.get(key) {
            Some(entry) if entry.expired() => {
                drop(entry);
                self.entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    fn wrong_kind(key: &str, expected: &'static str, found: &'static str) -> ShroudError {
        ShroudError::Cache {
            message: format!("key `{key}` holds a {found} value, expected {expected}"),
            source: None,
        }
    }
}

#[async_trait]
impl ServiceAdapter for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Cache
    }

    async fn health_check(&self) -> Result<HealthStatus, ShroudError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ShroudError> {
        self.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ShroudError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s)),
            Some(entry) => Err(Self::wrong_kind(key, "string", entry.value.kind())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ShroudError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ShroudError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), ShroudError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), ShroudError> {
        if let Some(mut entry) = self.entries.get_mut(key)
            && !entry.expired()
        {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ShroudError> {
        Ok(self.live_entry(key).is_some())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<i64, ShroudError> {
        // Entry API holds the shard lock, making push atomic across tasks.
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: Value::List(Vec::new()),
            expires_at: None,
        });
        if entry.expired() {
            *entry = Entry {
                value: Value::List(Vec::new()),
                expires_at: None,
            };
        }
        match &mut entry.value {
            Value::List(items) => {
                items.push(value.to_string());
                Ok(items.len() as i64)
            }
            other => Err(Self::wrong_kind(key, "list", other.kind())),
        }
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, ShroudError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(items),
            Some(entry) => Err(Self::wrong_kind(key, "list", entry.value.kind())),
            None => Ok(Vec::new()),
        }
    }

    async fn llen(&self, key: &str) -> Result<i64, ShroudError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(items.len() as i64),
            Some(entry) => Err(Self::wrong_kind(key, "list", entry.value.kind())),
            None => Ok(0),
        }
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), ShroudError> {
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        if entry.expired() {
            *entry = Entry {
                value: Value::Set(HashSet::new()),
                expires_at: None,
            };
        }
        match &mut entry.value {
            Value::Set(set) => {
                set.extend(members.iter().cloned());
                Ok(())
            }
            other => Err(Self::wrong_kind(key, "set", other.kind())),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), ShroudError> {
        if let Some(mut entry) = self.entries.get_mut(key)
            && let Value::Set(set) = &mut entry.value
        {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, ShroudError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.into_iter().collect()),
            Some(entry) => Err(Self::wrong_kind(key, "set", entry.value.kind())),
            None => Ok(Vec::new()),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, ShroudError> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(entry) => Err(Self::wrong_kind(key, "set", entry.value.kind())),
            None => Ok(false),
        }
    }
}
