// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the durable store.
//!
//! These are the shared domain types from `shroud-core`; the column layouts
//! in `migrations/` mirror their fields one-to-one.

pub use shroud_core::types::{
    Conversation, NewQueuedMessage, QueuedMessage, SessionLock, UserProfile,
};
