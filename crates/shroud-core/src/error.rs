// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the shroud delivery core.
//!
//! Delivery rejections (self-messaging, locked sessions, device mismatches)
//! are NOT errors -- they are structured acknowledgements returned to the
//! sender (see [`crate::types::SendAck`]). This enum covers infrastructure
//! failures only.

use thiserror::Error;

/// The primary error type used across all shroud adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ShroudError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable-store errors (database connection, query failure, migration failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Fast-cache tier errors (unavailable backend, type conflict on a key).
    #[error("cache error: {message}")]
    Cache {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport errors (bind failure, closed connection, codec failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
