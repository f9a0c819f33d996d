// SPDX-FileCopyrightText: 2026 Shroud Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `shroud serve` command implementation.
//!
//! Wires the full delivery stack (SQLite durable store, in-process cache,
//! connection registry, conversation directory, session locks, offline
//! queue, presence, pipeline) and runs the WebSocket gateway on top of it.
//! A background sweep purges expired queued messages and cache entries.
//! Supports graceful shutdown via signal handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shroud_cache::MemoryCache;
use shroud_config::model::ShroudConfig;
use shroud_core::error::ShroudError;
use shroud_core::{CacheStore, ProfileProvider, ServiceAdapter, StorageAdapter};
use shroud_delivery::{
    ConnectionRegistry, ConversationDirectory, DeliveryPipeline, OfflineQueue,
    PresenceBroadcaster, SessionLockManager,
};
use shroud_gateway::{GatewayState, HealthState};
use shroud_storage::SqliteStore;

/// Runs the `shroud serve` command.
///
/// Initializes storage, assembles the delivery pipeline, spawns the
/// retention sweep, and serves the gateway until a shutdown signal.
pub async fn run_serve(config: ShroudConfig) -> Result<(), ShroudError> {
    init_tracing(&config.server.log_level);

    info!("starting shroud serve");

    // Initialize storage.
    let storage = Arc::new(SqliteStore::new(config.storage.clone()));
    storage.initialize().await?;

    // Assemble the delivery stack. The cache is a hint tier; every
    // component falls back to the durable store when it misses.
    let cache = Arc::new(MemoryCache::new());
    let cache_dyn: Arc<dyn CacheStore> = cache.clone();
    let storage_dyn: Arc<dyn StorageAdapter> = storage.clone();
    let profiles: Arc<dyn ProfileProvider> = storage.clone();

    let registry = Arc::new(ConnectionRegistry::new(cache_dyn.clone()));
    let directory = Arc::new(ConversationDirectory::new(
        storage_dyn.clone(),
        cache_dyn.clone(),
        Duration::from_secs(config.delivery.partner_cache_ttl_secs),
        config.delivery.partner_limit,
    ));
    let locks = Arc::new(SessionLockManager::new(cache_dyn.clone(), storage_dyn.clone()));
    let queue = Arc::new(OfflineQueue::new(
        cache_dyn,
        storage_dyn,
        Duration::from_secs(config.delivery.queue_ttl_secs),
    ));
    let presence = Arc::new(PresenceBroadcaster::new(registry.clone(), directory.clone()));
    let pipeline = Arc::new(DeliveryPipeline::new(
        registry,
        directory,
        locks,
        queue.clone(),
        presence,
        profiles,
        Duration::from_secs(config.delivery.ack_timeout_secs),
        Duration::from_millis(config.delivery.replay_pacing_ms),
    ));

    info!(
        ack_timeout_secs = config.delivery.ack_timeout_secs,
        replay_pacing_ms = config.delivery.replay_pacing_ms,
        queue_ttl_secs = config.delivery.queue_ttl_secs,
        "delivery pipeline assembled"
    );

    // Install signal handler.
    let cancel = install_signal_handler();

    // Spawn the retention sweep background task.
    {
        let sweep_queue = queue.clone();
        let sweep_cache = cache.clone();
        let sweep_cancel = cancel.clone();
        let sweep_interval = Duration::from_secs(config.delivery.cleanup_interval_secs);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            // Skip the first immediate tick.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match sweep_queue.cleanup_old_messages().await {
                            Ok(0) => debug!("retention sweep: nothing to purge"),
                            Ok(purged) => info!(purged, "retention sweep purged expired queued messages"),
                            Err(e) => warn!(error = %e, "retention sweep failed (non-fatal)"),
                        }
                        let dropped = sweep_cache.purge_expired();
                        if dropped > 0 {
                            debug!(dropped, "expired cache entries dropped");
                        }
                    }
                    _ = sweep_cancel.cancelled() => {
                        info!("retention sweep shutting down");
                        break;
                    }
                }
            }
        });
        info!(
            interval_secs = config.delivery.cleanup_interval_secs,
            "retention sweep started"
        );
    }

    // Run the gateway until a shutdown signal arrives or it fails.
    let server_config = shroud_gateway::ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let state = GatewayState {
        pipeline,
        health: HealthState {
            start_time: Instant::now(),
        },
    };

    let result = tokio::select! {
        result = shroud_gateway::start_server(&server_config, state) => result,
        _ = cancel.cancelled() => Ok(()),
    };

    // Stop background tasks before the storage checkpoint.
    cancel.cancel();
    storage.shutdown().await?;

    info!("shroud serve shutdown complete");
    result
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received. The signal handler task runs in the background until then.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shroud={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
