// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lock rows: the durable side of the per-conversation gate.
//!
//! The primary key on `conversation_id` resolves concurrent acquires;
//! whichever insert lands second loses and reads back the winner's row.

use rusqlite::params;

use shroud_core::ShroudError;

use crate::database::Database;
use crate::models::SessionLock;

/// Insert the lock row if the conversation is unlocked. Returns the
/// existing row when it is already locked, leaving that row untouched.
pub async fn insert(
    db: &Database,
    lock: &SessionLock,
) -> Result<Option<SessionLock>, ShroudError> {
    let lock = lock.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO session_locks (conversation_id, locked_by, reason, locked_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (conversation_id) DO NOTHING",
                params![lock.conversation_id, lock.locked_by, lock.reason, lock.locked_at],
            )?;
            if inserted > 0 {
                return Ok(None);
            }
            let mut stmt = conn.prepare(
                "SELECT conversation_id, locked_by, reason, locked_at
                 FROM session_locks
                 WHERE conversation_id = ?1",
            )?;
            let existing = stmt.query_row(params![lock.conversation_id], |row| {
                Ok(SessionLock {
                    conversation_id: row.get(0)?,
                    locked_by: row.get(1)?,
                    reason: row.get(2)?,
                    locked_at: row.get(3)?,
                })
            })?;
            Ok(Some(existing))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a lock row. Returns `false` if it was already gone.
pub async fn delete(db: &Database, conversation_id: &str) -> Result<bool, ShroudError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM session_locks WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Read a lock row, if any.
pub async fn get(db: &Database, conversation_id: &str) -> Result<Option<SessionLock>, ShroudError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, locked_by, reason, locked_at
                 FROM session_locks
                 WHERE conversation_id = ?1",
            )?;
            let result = stmt.query_row(params![conversation_id], |row| {
                Ok(SessionLock {
                    conversation_id: row.get(0)?,
                    locked_by: row.get(1)?,
                    reason: row.get(2)?,
                    locked_at: row.get(3)?,
                })
            });
            match result {
                Ok(lock) => Ok(Some(lock)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
