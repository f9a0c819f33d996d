// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the shroud delivery core.
//!
//! This crate provides the foundational trait definitions, error type, and
//! domain types used throughout the shroud workspace: the opaque message
//! payload, acknowledgement statuses, session locks, queued messages, and
//! the adapter traits the cache and storage backends implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ShroudError;
pub use types::{AckStatus, AdapterType, HealthStatus, LockReason, SendAck};

pub use traits::{CacheStore, ProfileProvider, ServiceAdapter, StorageAdapter};
