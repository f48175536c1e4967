// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process daemon core with a mock music
//! service, used by unit tests and the scenario suite.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;
use crate::model::{Sensor, SensorStatus, User};
use crate::mqtt::Outbound;
use crate::music::mock::MockMusic;
use crate::registry::local::LocalRegistry;
use crate::secret::{SecretVault, TokenRecord};
use crate::state::{AppState, Services};
use crate::store::Store;

/// Daemon config with fast timers and no external endpoints.
pub fn test_config() -> DaemonConfig {
    DaemonConfig {
        host: "127.0.0.1".into(),
        port: 0,
        auth_token: None,
        state_dir: None,
        mqtt_url: None,
        mqtt_client_id: "motifd-test".into(),
        mqtt_ca_path: None,
        mqtt_cert_path: None,
        mqtt_key_path: None,
        broker_endpoint: "mqtts://localhost:8883".into(),
        region: "local".into(),
        reaper_tick_secs: 60,
        warden_tick_secs: 1800,
        refresh_margin_secs: 300,
        lease_ttl_secs: 120,
        tick_workers: 10,
        handler_deadline_secs: 30,
        flush_secs: 30,
        music_api_base: "http://127.0.0.1:0".into(),
        music_token_url: "http://127.0.0.1:0/token".into(),
        music_client_id: "test-client".into(),
    }
}

/// An assembled core with hooks into its collaborators.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub music: Arc<MockMusic>,
    pub registry: Arc<LocalRegistry>,
    /// Outbound device messages captured instead of published.
    pub outbound_rx: Mutex<mpsc::Receiver<Outbound>>,
}

impl TestHarness {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: DaemonConfig) -> anyhow::Result<Self> {
        let music = Arc::new(MockMusic::new());
        let registry = Arc::new(LocalRegistry::in_memory()?);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let state = Arc::new(AppState::new(
            config,
            Services {
                store: Arc::new(Store::new()),
                vault: Arc::new(SecretVault::in_memory()),
                registry: Arc::clone(&registry) as Arc<dyn crate::registry::DeviceRegistry>,
                music: Arc::clone(&music) as Arc<dyn crate::music::MusicService>,
            },
            outbound_tx,
            CancellationToken::new(),
        ));
        Ok(Self { state, music, registry, outbound_rx: Mutex::new(outbound_rx) })
    }

    /// Add a user with a connected music account whose access token expires
    /// at `expires_at`. Returns the vault token ref.
    pub async fn connect_user(&self, user_id: &str, expires_at: u64) -> anyhow::Result<String> {
        let token_ref = SecretVault::new_token_ref(user_id);
        self.state
            .vault
            .put(
                &token_ref,
                TokenRecord {
                    access_token: "access-0".into(),
                    refresh_token: "refresh-0".into(),
                    expires_at,
                },
            )
            .await?;
        let mut user = User::new(user_id);
        user.music_connected = true;
        user.token_ref = Some(token_ref.clone());
        self.state.store.put_user(user).await;
        Ok(token_ref)
    }

    /// Add an enabled sensor owned by `user_id` with standard timings.
    pub async fn add_sensor(&self, sensor_id: &str, user_id: &str) -> Sensor {
        let sensor = sensor_fixture(sensor_id, user_id);
        self.state.store.put_sensor(sensor.clone()).await;
        sensor
    }
}

/// A registered, enabled sensor: debounce 120 s, timeout 300 s, no quiet
/// hours, playback target `D1`, context `playlist:P`.
pub fn sensor_fixture(sensor_id: &str, user_id: &str) -> Sensor {
    Sensor {
        sensor_id: sensor_id.to_owned(),
        user_id: user_id.to_owned(),
        enabled: true,
        motion_debounce_secs: 120,
        inactivity_timeout_secs: 300,
        quiet_hours: None,
        playback_target_id: "D1".to_owned(),
        playback_context_ref: "playlist:P".to_owned(),
        last_motion_at: None,
        status: SensorStatus::Registered,
        thing_handle: Some("thing:fixture".to_owned()),
        certificate_handle: Some("cert:fixture".to_owned()),
        location_label: None,
        health: None,
    }
}
