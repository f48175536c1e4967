// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;
use crate::mqtt::Outbound;
use crate::music::MusicService;
use crate::registry::DeviceRegistry;
use crate::secret::SecretVault;
use crate::store::Store;
use crate::token::TokenCache;

/// Shared daemon state.
pub struct AppState {
    pub config: DaemonConfig,
    pub store: Arc<Store>,
    pub vault: Arc<SecretVault>,
    pub registry: Arc<dyn DeviceRegistry>,
    pub music: Arc<dyn MusicService>,
    pub token_cache: TokenCache,
    pub counters: Counters,
    pub shutdown: CancellationToken,
    /// Config/command publishes destined for devices, drained by the MQTT task.
    pub outbound_tx: mpsc::Sender<Outbound>,
}

/// External collaborators wired into [`AppState`].
pub struct Services {
    pub store: Arc<Store>,
    pub vault: Arc<SecretVault>,
    pub registry: Arc<dyn DeviceRegistry>,
    pub music: Arc<dyn MusicService>,
}

impl AppState {
    pub fn new(
        config: DaemonConfig,
        services: Services,
        outbound_tx: mpsc::Sender<Outbound>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            store: services.store,
            vault: services.vault,
            registry: services.registry,
            music: services.music,
            token_cache: TokenCache::new(),
            counters: Counters::default(),
            shutdown,
            outbound_tx,
        }
    }
}

/// Monotonic operational counters, surfaced on the health endpoint.
#[derive(Debug, Default)]
pub struct Counters {
    pub motion_received: AtomicU64,
    pub registration_received: AtomicU64,
    pub status_received: AtomicU64,
    pub dropped_malformed: AtomicU64,
    pub dropped_topic_mismatch: AtomicU64,
    pub dropped_unknown_type: AtomicU64,
    pub dropped_unknown_sensor: AtomicU64,
    pub sessions_opened: AtomicU64,
    pub sessions_extended: AtomicU64,
    pub motions_debounced: AtomicU64,
    pub motions_quiet_suppressed: AtomicU64,
    pub motions_disabled_suppressed: AtomicU64,
    pub playback_starts: AtomicU64,
    pub playback_start_failures: AtomicU64,
    pub sessions_closed: AtomicU64,
    pub pause_failures: AtomicU64,
    pub refreshes_ok: AtomicU64,
    pub refreshes_skipped: AtomicU64,
    pub refreshes_failed: AtomicU64,
    pub users_disconnected: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            motion_received: self.motion_received.load(Ordering::Relaxed),
            registration_received: self.registration_received.load(Ordering::Relaxed),
            status_received: self.status_received.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_topic_mismatch: self.dropped_topic_mismatch.load(Ordering::Relaxed),
            dropped_unknown_type: self.dropped_unknown_type.load(Ordering::Relaxed),
            dropped_unknown_sensor: self.dropped_unknown_sensor.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_extended: self.sessions_extended.load(Ordering::Relaxed),
            motions_debounced: self.motions_debounced.load(Ordering::Relaxed),
            motions_quiet_suppressed: self.motions_quiet_suppressed.load(Ordering::Relaxed),
            motions_disabled_suppressed: self.motions_disabled_suppressed.load(Ordering::Relaxed),
            playback_starts: self.playback_starts.load(Ordering::Relaxed),
            playback_start_failures: self.playback_start_failures.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            pause_failures: self.pause_failures.load(Ordering::Relaxed),
            refreshes_ok: self.refreshes_ok.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            users_disconnected: self.users_disconnected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Serialize)]
pub struct CountersSnapshot {
    pub motion_received: u64,
    pub registration_received: u64,
    pub status_received: u64,
    pub dropped_malformed: u64,
    pub dropped_topic_mismatch: u64,
    pub dropped_unknown_type: u64,
    pub dropped_unknown_sensor: u64,
    pub sessions_opened: u64,
    pub sessions_extended: u64,
    pub motions_debounced: u64,
    pub motions_quiet_suppressed: u64,
    pub motions_disabled_suppressed: u64,
    pub playback_starts: u64,
    pub playback_start_failures: u64,
    pub sessions_closed: u64,
    pub pause_failures: u64,
    pub refreshes_ok: u64,
    pub refreshes_skipped: u64,
    pub refreshes_failed: u64,
    pub users_disconnected: u64,
}

/// Bump a counter by one.
pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}
