// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User device bindings, consulted for the device-id check on every send.

use rusqlite::params;

use shroud_core::ShroudError;

use crate::database::Database;
use crate::models::UserProfile;

/// Read a user's profile, if known.
pub async fn get(db: &Database, user_id: &str) -> Result<Option<UserProfile>, ShroudError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, device_id, display_name
                 FROM user_profiles
                 WHERE user_id = ?1",
            )?;
            let result = stmt.query_row(params![user_id], |row| {
                Ok(UserProfile {
                    user_id: row.get(0)?,
                    device_id: row.get(1)?,
                    display_name: row.get(2)?,
                })
            });
            match result {
                Ok(profile) => Ok(Some(profile)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Create or update a user's device binding.
pub async fn upsert(db: &Database, profile: &UserProfile) -> Result<(), ShroudError> {
    let profile = profile.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_profiles (user_id, device_id, display_name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id)
                 DO UPDATE SET device_id = excluded.device_id,
                               display_name = excluded.display_name",
                params![profile.user_id, profile.device_id, profile.display_name],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
