// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./shroud.toml` > `~/.config/shroud/shroud.toml` >
//! `/etc/shroud/shroud.toml` with environment variable overrides via the
//! `SHROUD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ShroudConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/shroud/shroud.toml` (system-wide)
/// 3. `~/.config/shroud/shroud.toml` (user XDG config)
/// 4. `./shroud.toml` (local directory)
/// 5. `SHROUD_*` environment variables
pub fn load_config() -> Result<ShroudConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ShroudConfig::default()))
        .merge(Toml::file("/etc/shroud/shroud.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("shroud/shroud.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("shroud.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ShroudConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ShroudConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ShroudConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ShroudConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SHROUD_DELIVERY_ACK_TIMEOUT_SECS` must
/// map to `delivery.ack_timeout_secs`, not `delivery.ack.timeout.secs`.
fn env_provider() -> Env {
    Env::prefixed("SHROUD_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("delivery_", "delivery.", 1);
        mapped.into()
    })
}
