// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrow boundary to the identity/profile collaborator.
//!
//! Identity issuance, key bundles, and profile CRUD are external systems;
//! the delivery core only needs the currently-registered device for a user
//! to run the device-mismatch check.

use async_trait::async_trait;

use crate::error::ShroudError;
use crate::types::UserProfile;

/// Resolves a user id to its registered profile.
#[async_trait]
pub trait ProfileProvider: Send + Sync + 'static {
    /// Returns the profile for `user_id`, or `None` for an unknown user.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, ShroudError>;
}
