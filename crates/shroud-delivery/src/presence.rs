// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence fan-out to a user's recent conversation partners.
//!
//! Presence is advisory and time-decaying: notifications go only to
//! partners with a live connection in this process, are never queued, and
//! require no acknowledgement.

use std::sync::Arc;

use tracing::{debug, warn};

use shroud_core::types::PresenceUpdate;

use crate::directory::ConversationDirectory;
use crate::registry::{ConnectionRegistry, OutboundEvent};

/// Broadcasts online/offline transitions to recent partners.
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<ConversationDirectory>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, directory: Arc<ConversationDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Notify the user's recent partners of a presence transition.
    /// `last_seen` is attached only on the offline transition. Partners
    /// without a live connection are silently skipped.
    pub async fn broadcast(&self, user_id: &str, online: bool) {
        let partners = match self.directory.recent_partners(user_id).await {
            Ok(partners) => partners,
            Err(e) => {
                warn!(user_id, error = %e, "presence broadcast skipped, partner lookup failed");
                return;
            }
        };

        let timestamp = crate::now_millis();
        let update = PresenceUpdate {
            user_id: user_id.to_string(),
            status: online,
            timestamp,
            last_seen: (!online).then_some(timestamp),
        };

        let total = partners.len();
        let mut delivered = 0usize;
        for partner in &partners {
            let Some(handle) = self.registry.lookup(partner) else {
                continue;
            };
            if handle
                .emit(OutboundEvent::Presence(update.clone()))
                .await
                .is_ok()
            {
                delivered += 1;
            }
        }
        debug!(user_id, online, delivered, total, "presence broadcast");
    }
}
