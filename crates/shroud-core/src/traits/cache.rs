// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fast-cache tier trait.
//!
//! The cache is a hint, never the truth: presence flags, session-lock
//! mirrors, the hot tier of the offline queue, and partner sets all live
//! here with TTLs, and every consumer must survive a cold or flushed cache
//! by falling back to the durable store (read-repair).
//!
//! The surface deliberately mirrors the small slice of the Redis command
//! set the delivery core needs: string keys, list keys, and set keys.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ShroudError;
use crate::traits::adapter::ServiceAdapter;

/// Ephemeral key/value store with per-key TTL and list/set operations.
///
/// A key holds at most one value kind (string, list, or set); writing a
/// different kind to an existing key is a `ShroudError::Cache`.
#[async_trait]
pub trait CacheStore: ServiceAdapter {
    // --- String keys ---

    /// Get a string value, or `None` if the key is missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, ShroudError>;

    /// Set a string value with no expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), ShroudError>;

    /// Set a string value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ShroudError>;

    /// Delete a key of any kind. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<(), ShroudError>;

    /// Set or replace the TTL on an existing key. No-op if the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), ShroudError>;

    /// Whether the key exists (and has not expired).
    async fn exists(&self, key: &str) -> Result<bool, ShroudError>;

    // --- List keys ---

    /// Append to the tail of a list, creating it if missing.
    /// Returns the new list length.
    async fn rpush(&self, key: &str, value: &str) -> Result<i64, ShroudError>;

    /// The full contents of a list, head first. Missing key reads as empty.
    async fn lrange(&self, key: &str) -> Result<Vec<String>, ShroudError>;

    /// List length. Missing key reads as zero.
    async fn llen(&self, key: &str) -> Result<i64, ShroudError>;

    // --- Set keys ---

    /// Add members to a set, creating it if missing.
    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), ShroudError>;

    /// Remove a member from a set. Missing key or member is not an error.
    async fn srem(&self, key: &str, member: &str) -> Result<(), ShroudError>;

    /// All members of a set. Missing key reads as empty.
    async fn smembers(&self, key: &str) -> Result<Vec<String>, ShroudError>;

    /// Whether `member` is in the set at `key`.
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, ShroudError>;
}
