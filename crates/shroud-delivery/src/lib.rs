// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time delivery core: connection registry, conversation directory,
//! session locks, dual-tier offline queue, presence fan-out, and the
//! delivery pipeline that orchestrates them.
//!
//! The consistency model throughout is "cache is a hint, durable store is
//! truth": every read path heals a cold or evicted cache entry from the
//! durable store, and no transaction spans the two tiers.

pub mod directory;
pub mod lock;
pub mod pipeline;
pub mod presence;
pub mod queue;
pub mod registry;

pub use directory::ConversationDirectory;
pub use lock::SessionLockManager;
pub use pipeline::DeliveryPipeline;
pub use presence::PresenceBroadcaster;
pub use queue::OfflineQueue;
pub use registry::{ConnectionHandle, ConnectionRegistry, OutboundEvent};

/// Current instant as an RFC 3339 string with millisecond precision,
/// matching the durable store's column format.
pub fn now_rfc3339() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Current instant as unix milliseconds, the wire timestamp format.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
