// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the shroud workspace.
//!
//! Payloads are opaque: the core routes ciphertext between devices and never
//! inspects it. Wire timestamps are unix milliseconds; store timestamps are
//! RFC 3339 strings, matching the SQLite column format used by shroud-storage.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One side of a message: a user identity bound to the device the sender
/// believes it is talking to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: String,
    pub device_id: String,
}

/// An end-to-end-encrypted message in flight.
///
/// `payload` is the ciphertext envelope produced by the client; the server
/// treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub sender: Peer,
    pub receiver: Peer,
    pub payload: String,
    /// Client-side send time, unix milliseconds.
    pub timestamp: i64,
}

/// Acknowledgement statuses for a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Delivered,
    Queued,
    SessionLocked,
    DeviceIdMismatch,
    SelfMessage,
    Error,
}

/// The structured acknowledgement returned for every send attempt.
///
/// Every rejection carries enough context for the sender to act: a locked
/// session names its owner and queue depth, a device mismatch names both
/// device ids in `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    pub code: u16,
    pub status: AckStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_count: Option<i64>,
}

impl SendAck {
    /// 200: the message reached a live connection and was acknowledged.
    pub fn delivered() -> Self {
        Self {
            code: 200,
            status: AckStatus::Delivered,
            reason: "Message delivered successfully".to_string(),
            locked_by: None,
            queued_count: None,
        }
    }

    /// 202: the recipient is offline; the message is queued for delivery.
    pub fn queued() -> Self {
        Self {
            code: 202,
            status: AckStatus::Queued,
            reason: "Recipient is offline. Message queued for delivery.".to_string(),
            locked_by: None,
            queued_count: None,
        }
    }

    /// 400: sender and receiver are the same user.
    pub fn self_messaging() -> Self {
        Self {
            code: 400,
            status: AckStatus::SelfMessage,
            reason: "Cannot send message to yourself".to_string(),
            locked_by: None,
            queued_count: None,
        }
    }

    /// 409: the declared receiver device does not match the registered one.
    pub fn device_mismatch(expected: &str, received: &str) -> Self {
        Self {
            code: 409,
            status: AckStatus::DeviceIdMismatch,
            reason: format!(
                "Device ID mismatch: expected {expected}, got {received}"
            ),
            locked_by: None,
            queued_count: None,
        }
    }

    /// 423: the conversation is gated by another sender's lock.
    pub fn session_locked(locked_by: &str, queued_count: i64) -> Self {
        Self {
            code: 423,
            status: AckStatus::SessionLocked,
            reason: "Session is locked. Wait for queued messages to be delivered.".to_string(),
            locked_by: Some(locked_by.to_string()),
            queued_count: Some(queued_count),
        }
    }

    /// 500: an infrastructure failure aborted the send attempt.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            code: 500,
            status: AckStatus::Error,
            reason: reason.into(),
            locked_by: None,
            queued_count: None,
        }
    }
}

/// Presence transition broadcast to a user's recent conversation partners.
///
/// `last_seen` is included only on the offline transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub user_id: String,
    pub status: bool,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
}

/// Transient activity indicators forwarded verbatim to online recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityStatus {
    InChat,
    Typing,
    SendingMedia,
    RecordingAudio,
}

/// An activity-status event addressed to a single recipient. Never queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStatusEvent {
    pub user_id: String,
    pub recipient_id: String,
    pub status: ActivityStatus,
    pub timestamp: i64,
}

/// The canonical, order-independent pairing of two users.
///
/// `user_a` and `user_b` are the lexicographically sorted participant ids, so
/// `(user_a, user_b)` is a unique key regardless of who messaged first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    /// RFC 3339; bumped on every delivered or queued message.
    pub last_activity_at: String,
}

/// Why a conversation was locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LockReason {
    OfflineRecipient,
}

/// A per-conversation exclusivity flag.
///
/// Existence means delivery in this conversation is suspended for every
/// sender except `locked_by` until the queued backlog is replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLock {
    pub conversation_id: String,
    pub locked_by: String,
    pub reason: String,
    /// RFC 3339.
    pub locked_at: String,
}

/// A message deferred for an offline recipient, as stored durably.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub receiver_device_id: String,
    pub payload: String,
    /// Client-side send time, unix milliseconds.
    pub timestamp: i64,
    /// RFC 3339 enqueue time; replay order is ascending on this column.
    pub created_at: String,
}

impl QueuedMessage {
    /// Reconstruct the wire payload for redelivery.
    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            sender: Peer {
                id: self.sender_id.clone(),
                device_id: self.receiver_device_id.clone(),
            },
            receiver: Peer {
                id: self.receiver_id.clone(),
                device_id: self.receiver_device_id.clone(),
            },
            payload: self.payload.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// A message to defer, before the durable store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueuedMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub receiver_device_id: String,
    pub payload: String,
    pub timestamp: i64,
}

/// The identity collaborator's view of a user, consumed for device checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub device_id: String,
    pub display_name: Option<String>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a [`crate::traits::ServiceAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Cache,
    Storage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_statuses_serialize_screaming_snake() {
        let json = serde_json::to_string(&AckStatus::DeviceIdMismatch).unwrap();
        assert_eq!(json, r#""DEVICE_ID_MISMATCH""#);
        let json = serde_json::to_string(&AckStatus::SessionLocked).unwrap();
        assert_eq!(json, r#""SESSION_LOCKED""#);
    }

    #[test]
    fn send_ack_constructors_carry_wire_codes() {
        assert_eq!(SendAck::delivered().code, 200);
        assert_eq!(SendAck::queued().code, 202);
        assert_eq!(SendAck::self_messaging().code, 400);
        assert_eq!(SendAck::device_mismatch("a", "b").code, 409);
        assert_eq!(SendAck::session_locked("alice", 3).code, 423);
        assert_eq!(SendAck::error("boom").code, 500);
    }

    #[test]
    fn session_locked_ack_surfaces_owner_and_depth() {
        let ack = SendAck::session_locked("alice", 7);
        assert_eq!(ack.locked_by.as_deref(), Some("alice"));
        assert_eq!(ack.queued_count, Some(7));
    }

    #[test]
    fn send_ack_omits_empty_optionals_on_the_wire() {
        let json = serde_json::to_value(SendAck::delivered()).unwrap();
        assert!(json.get("locked_by").is_none());
        assert!(json.get("queued_count").is_none());
    }

    #[test]
    fn presence_update_last_seen_only_when_present() {
        let online = PresenceUpdate {
            user_id: "u1".into(),
            status: true,
            timestamp: 1,
            last_seen: None,
        };
        let json = serde_json::to_value(&online).unwrap();
        assert!(json.get("last_seen").is_none());

        let offline = PresenceUpdate {
            user_id: "u1".into(),
            status: false,
            timestamp: 2,
            last_seen: Some(2),
        };
        let json = serde_json::to_value(&offline).unwrap();
        assert_eq!(json["last_seen"], 2);
    }

    #[test]
    fn activity_status_round_trips() {
        use std::str::FromStr;
        for status in [
            ActivityStatus::InChat,
            ActivityStatus::Typing,
            ActivityStatus::SendingMedia,
            ActivityStatus::RecordingAudio,
        ] {
            let s = status.to_string();
            assert_eq!(ActivityStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(ActivityStatus::Typing.to_string(), "typing");
    }

    #[test]
    fn lock_reason_matches_stored_string() {
        assert_eq!(LockReason::OfflineRecipient.to_string(), "OFFLINE_RECIPIENT");
    }

    #[test]
    fn queued_message_rebuilds_wire_payload() {
        let queued = QueuedMessage {
            id: 1,
            conversation_id: "c1".into(),
            sender_id: "alice".into(),
            receiver_id: "bob".into(),
            receiver_device_id: "dev-b".into(),
            payload: "ciphertext".into(),
            timestamp: 42,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let payload = queued.to_payload();
        assert_eq!(payload.sender.id, "alice");
        assert_eq!(payload.receiver.id, "bob");
        assert_eq!(payload.receiver.device_id, "dev-b");
        assert_eq!(payload.payload, "ciphertext");
        assert_eq!(payload.timestamp, 42);
    }

    #[test]
    fn message_payload_round_trips_json() {
        let msg = MessagePayload {
            sender: Peer { id: "a".into(), device_id: "da".into() },
            receiver: Peer { id: "b".into(), device_id: "db".into() },
            payload: "opaque".into(),
            timestamp: 1700000000000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: MessagePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
