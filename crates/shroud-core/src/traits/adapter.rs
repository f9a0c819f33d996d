// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait for the cache and storage backends.

use async_trait::async_trait;

use crate::error::ShroudError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for shroud backend adapters.
///
/// Both store tiers (fast cache, durable store) implement this trait, which
/// provides identity, health check, and shutdown hooks for the daemon's
/// lifecycle management.
#[async_trait]
pub trait ServiceAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the type of adapter (cache or storage).
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, ShroudError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), ShroudError>;
}
