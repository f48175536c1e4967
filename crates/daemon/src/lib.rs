// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Motifd: motion-triggered music-playback orchestration daemon.
//!
//! Sensors publish motion over MQTT; the daemon admits events (enabled,
//! quiet hours, debounce), maintains per-sensor playback sessions, closes
//! idle sessions on a timer, keeps music-service tokens fresh, and
//! provisions device identities with client certificates.

pub mod config;
pub mod error;
pub mod ingress;
pub mod model;
pub mod mqtt;
pub mod music;
pub mod orchestrator;
pub mod provision;
pub mod quiet;
pub mod reaper;
pub mod registry;
pub mod retry;
pub mod secret;
pub mod state;
pub mod store;
pub mod test_support;
pub mod token;
pub mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;
use crate::music::http::MusicHttp;
use crate::registry::local::LocalRegistry;
use crate::secret::SecretVault;
use crate::state::{AppState, Services};
use crate::store::{persist, Store};
use crate::transport::build_router;

/// Run the daemon until shutdown.
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    // reqwest is built with rustls-no-provider; install ring once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let state_dir = config.resolved_state_dir();
    let snapshot_path = state_dir.join("store.json");

    let store = Arc::new(Store::new());
    if snapshot_path.exists() {
        match persist::load(&snapshot_path) {
            Ok(snapshot) => store.restore(snapshot).await,
            Err(e) => tracing::warn!(err = %e, "failed to load store snapshot; starting empty"),
        }
    }

    let vault = Arc::new(SecretVault::open(&state_dir.join("secrets.json"))?);
    let registry = Arc::new(LocalRegistry::open(&state_dir)?);
    let music = Arc::new(MusicHttp::new(
        &config.music_api_base,
        &config.music_token_url,
        &config.music_client_id,
    ));

    let shutdown = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(256);
    let state = Arc::new(AppState::new(
        config.clone(),
        Services { store, vault, registry, music },
        outbound_tx,
        shutdown.clone(),
    ));

    mqtt::spawn_mqtt(Arc::clone(&state), outbound_rx)?;
    reaper::spawn_reaper(Arc::clone(&state));
    token::warden::spawn_warden(Arc::clone(&state));
    spawn_flush(Arc::clone(&state), snapshot_path.clone());

    // Ctrl-C / SIGTERM drives the shared cancellation token.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let addr = format!("{}:{}", config.host, config.port);
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("motifd listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    // Final snapshot on the way out.
    persist::save(&snapshot_path, &state.store.snapshot().await)?;
    Ok(())
}

/// Periodically snapshot the store to disk.
fn spawn_flush(state: Arc<AppState>, path: PathBuf) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.flush_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let snapshot = state.store.snapshot().await;
            if let Err(e) = persist::save(&path, &snapshot) {
                tracing::warn!(err = %e, "store snapshot flush failed");
            }
        }
    });
}
