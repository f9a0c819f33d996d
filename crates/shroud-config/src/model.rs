// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the shroud delivery daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level shroud configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShroudConfig {
    /// Gateway bind and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable-store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Delivery-pipeline timing and retention settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Gateway bind and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4870
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Durable-store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("shroud").join("shroud.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("shroud.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Delivery-pipeline configuration: acknowledgement timeout, replay pacing,
/// queue retention, and partner-cache tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// How long a direct delivery waits for the recipient's acknowledgement
    /// before the message is treated as undeliverable and queued.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    /// Delay between consecutive replayed messages on reconnect.
    #[serde(default = "default_replay_pacing_ms")]
    pub replay_pacing_ms: u64,

    /// TTL for the cache tier of the offline queue, and the retention bound
    /// for durable queued rows (messages older than this are purged).
    #[serde(default = "default_queue_ttl_secs")]
    pub queue_ttl_secs: u64,

    /// TTL for cached partner sets.
    #[serde(default = "default_partner_cache_ttl_secs")]
    pub partner_cache_ttl_secs: u64,

    /// Maximum number of recent partners notified on a presence transition.
    #[serde(default = "default_partner_limit")]
    pub partner_limit: i64,

    /// Cadence of the queued-message retention sweep.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: default_ack_timeout_secs(),
            replay_pacing_ms: default_replay_pacing_ms(),
            queue_ttl_secs: default_queue_ttl_secs(),
            partner_cache_ttl_secs: default_partner_cache_ttl_secs(),
            partner_limit: default_partner_limit(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_ack_timeout_secs() -> u64 {
    3
}

fn default_replay_pacing_ms() -> u64 {
    50
}

fn default_queue_ttl_secs() -> u64 {
    86_400
}

fn default_partner_cache_ttl_secs() -> u64 {
    3_600
}

fn default_partner_limit() -> i64 {
    50
}

fn default_cleanup_interval_secs() -> u64 {
    3_600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_timings() {
        let config = ShroudConfig::default();
        assert_eq!(config.delivery.ack_timeout_secs, 3);
        assert_eq!(config.delivery.replay_pacing_ms, 50);
        assert_eq!(config.delivery.queue_ttl_secs, 86_400);
        assert_eq!(config.delivery.partner_cache_ttl_secs, 3_600);
        assert_eq!(config.delivery.partner_limit, 50);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[server]
port = 9000
"#;
        let config: ShroudConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.delivery.ack_timeout_secs, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[delivery]
ack_timeout_secs = 5
retry_budget = 10
"#;
        assert!(toml::from_str::<ShroudConfig>(toml_str).is_err());
    }
}
