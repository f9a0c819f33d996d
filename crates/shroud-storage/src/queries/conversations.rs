// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation directory operations.
//!
//! A conversation row is keyed by the sorted participant pair, so callers
//! must canonicalize `(user_a, user_b)` before hitting these queries.

use rusqlite::params;

use shroud_core::ShroudError;

use crate::database::Database;
use crate::models::Conversation;

/// Look up a conversation by its canonical participant pair.
pub async fn get_by_pair(
    db: &Database,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Conversation>, ShroudError> {
    let user_a = user_a.to_string();
    let user_b = user_b.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_a, user_b, last_activity_at
                 FROM conversations
                 WHERE user_a = ?1 AND user_b = ?2",
            )?;
            let result = stmt.query_row(params![user_a, user_b], |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    user_a: row.get(1)?,
                    user_b: row.get(2)?,
                    last_activity_at: row.get(3)?,
                })
            });
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a new conversation row. Fails on a duplicate pair.
pub async fn create(db: &Database, conversation: &Conversation) -> Result<(), ShroudError> {
    let conversation = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_a, user_b, last_activity_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    conversation.id,
                    conversation.user_a,
                    conversation.user_b,
                    conversation.last_activity_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Upsert the pair's recency: create on first contact, otherwise bump
/// `last_activity_at`.
///
/// First-contact rows get a random hex id; callers that need a stable id
/// up front should `create` explicitly.
pub async fn touch(
    db: &Database,
    user_a: &str,
    user_b: &str,
    last_activity_at: &str,
) -> Result<(), ShroudError> {
    let user_a = user_a.to_string();
    let user_b = user_b.to_string();
    let last_activity_at = last_activity_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_a, user_b, last_activity_at)
                 VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3)
                 ON CONFLICT (user_a, user_b)
                 DO UPDATE SET last_activity_at = excluded.last_activity_at",
                params![user_a, user_b, last_activity_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The other participant of every conversation involving `user_id`, most
/// recent first, capped at `limit`.
pub async fn partners_for(
    db: &Database,
    user_id: &str,
    limit: i64,
) -> Result<Vec<String>, ShroudError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT CASE WHEN user_a = ?1 THEN user_b ELSE user_a END
                 FROM conversations
                 WHERE user_a = ?1 OR user_b = ?1
                 ORDER BY last_activity_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user_id, limit], |row| row.get(0))?;
            let mut partners = Vec::new();
            for row in rows {
                partners.push(row?);
            }
            Ok(partners)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
