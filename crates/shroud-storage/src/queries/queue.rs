// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable offline-queue operations.
//!
//! This table is the tier of record: cache-side queue state can vanish at
//! any time, and replay falls back to these rows. Deletion happens per
//! conversation after a fully acknowledged replay, per receiver as a final
//! sweep, and by age during retention cleanup.

use rusqlite::params;

use shroud_core::ShroudError;

use crate::database::Database;
use crate::models::{NewQueuedMessage, QueuedMessage};

fn row_to_queued(row: &rusqlite::Row<'_>) -> Result<QueuedMessage, rusqlite::Error> {
    Ok(QueuedMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        receiver_device_id: row.get(4)?,
        payload: row.get(5)?,
        timestamp: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a deferred message. Returns the assigned row id.
pub async fn insert(db: &Database, message: &NewQueuedMessage) -> Result<i64, ShroudError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queued_messages
                 (conversation_id, sender_id, receiver_id, receiver_device_id, payload, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.conversation_id,
                    message.sender_id,
                    message.receiver_id,
                    message.receiver_device_id,
                    message.payload,
                    message.timestamp
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All queued messages for a receiver in enqueue order.
pub async fn for_receiver(
    db: &Database,
    receiver_id: &str,
) -> Result<Vec<QueuedMessage>, ShroudError> {
    let receiver_id = receiver_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, receiver_id, receiver_device_id,
                        payload, timestamp, created_at
                 FROM queued_messages
                 WHERE receiver_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![receiver_id], |row| row_to_queued(row))?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a single queued row by id. Returns `false` if already gone.
pub async fn delete_by_id(db: &Database, id: i64) -> Result<bool, ShroudError> {
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM queued_messages WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every queued row for one conversation. Returns rows removed.
pub async fn delete_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<usize, ShroudError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM queued_messages WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every queued row addressed to a receiver. Returns rows removed.
pub async fn delete_for_receiver(db: &Database, receiver_id: &str) -> Result<usize, ShroudError> {
    let receiver_id = receiver_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM queued_messages WHERE receiver_id = ?1",
                params![receiver_id],
            )?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Queue depth for one conversation.
pub async fn count_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<i64, ShroudError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM queued_messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Queue depth for one receiver across all conversations.
pub async fn count_for_receiver(db: &Database, receiver_id: &str) -> Result<i64, ShroudError> {
    let receiver_id = receiver_id.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM queued_messages WHERE receiver_id = ?1",
                params![receiver_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Retention sweep: delete queued rows created before `cutoff` (RFC 3339).
/// Returns rows removed.
pub async fn delete_older_than(db: &Database, cutoff: &str) -> Result<usize, ShroudError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM queued_messages WHERE created_at < ?1",
                params![cutoff],
            )?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
