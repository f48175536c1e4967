// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the motif orchestration daemon.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "motifd", version, about)]
pub struct DaemonConfig {
    /// Host to bind the admin API on.
    #[arg(long, default_value = "127.0.0.1", env = "MOTIFD_HOST")]
    pub host: String,

    /// Port for the admin API.
    #[arg(long, default_value_t = 9700, env = "MOTIFD_PORT")]
    pub port: u16,

    /// Bearer token for admin API auth. If unset, auth is disabled.
    #[arg(long, env = "MOTIFD_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// State directory override (store, secrets, CA material).
    #[arg(long, env = "MOTIFD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// MQTT broker URL (e.g. mqtts://broker:8883). Unset disables ingestion.
    #[arg(long, env = "MOTIFD_MQTT_URL")]
    pub mqtt_url: Option<String>,

    /// MQTT client identifier for the daemon's own connection.
    #[arg(long, default_value = "motifd", env = "MOTIFD_MQTT_CLIENT_ID")]
    pub mqtt_client_id: String,

    /// PEM CA certificate for broker TLS.
    #[arg(long, env = "MOTIFD_MQTT_CA")]
    pub mqtt_ca_path: Option<PathBuf>,

    /// PEM client certificate for broker mutual TLS.
    #[arg(long, env = "MOTIFD_MQTT_CERT")]
    pub mqtt_cert_path: Option<PathBuf>,

    /// PEM client key for broker mutual TLS.
    #[arg(long, env = "MOTIFD_MQTT_KEY")]
    pub mqtt_key_path: Option<PathBuf>,

    /// Broker endpoint advertised to provisioned devices.
    #[arg(long, default_value = "mqtts://localhost:8883", env = "MOTIFD_BROKER_ENDPOINT")]
    pub broker_endpoint: String,

    /// Deployment region echoed in provisioning results.
    #[arg(long, default_value = "local", env = "MOTIFD_REGION")]
    pub region: String,

    /// Timeout-reaper tick interval in seconds. Must not exceed the smallest
    /// configured inactivity timeout.
    #[arg(long, default_value_t = 60, env = "MOTIFD_REAPER_TICK_SECS")]
    pub reaper_tick_secs: u64,

    /// Token-warden tick interval in seconds.
    #[arg(long, default_value_t = 1800, env = "MOTIFD_WARDEN_TICK_SECS")]
    pub warden_tick_secs: u64,

    /// Refresh tokens expiring within this margin (seconds).
    #[arg(long, default_value_t = 300, env = "MOTIFD_REFRESH_MARGIN_SECS")]
    pub refresh_margin_secs: u64,

    /// Per-user refresh lease duration in seconds.
    #[arg(long, default_value_t = 120, env = "MOTIFD_LEASE_TTL_SECS")]
    pub lease_ttl_secs: u64,

    /// Max concurrent downstream calls per reaper/warden tick.
    #[arg(long, default_value_t = 10, env = "MOTIFD_TICK_WORKERS")]
    pub tick_workers: usize,

    /// Overall deadline for one motion-event handler invocation, seconds.
    #[arg(long, default_value_t = 30, env = "MOTIFD_HANDLER_DEADLINE_SECS")]
    pub handler_deadline_secs: u64,

    /// Store snapshot flush interval in seconds.
    #[arg(long, default_value_t = 30, env = "MOTIFD_FLUSH_SECS")]
    pub flush_secs: u64,

    /// Music-service API base URL.
    #[arg(long, default_value = "https://api.spotify.com", env = "MOTIFD_MUSIC_API")]
    pub music_api_base: String,

    /// Music-service OAuth token endpoint.
    #[arg(
        long,
        default_value = "https://accounts.spotify.com/api/token",
        env = "MOTIFD_MUSIC_TOKEN_URL"
    )]
    pub music_token_url: String,

    /// OAuth client id registered with the music service.
    #[arg(long, default_value = "", env = "MOTIFD_MUSIC_CLIENT_ID")]
    pub music_client_id: String,
}

impl DaemonConfig {
    pub fn reaper_tick(&self) -> Duration {
        Duration::from_secs(self.reaper_tick_secs)
    }

    pub fn warden_tick(&self) -> Duration {
        Duration::from_secs(self.warden_tick_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_secs)
    }

    pub fn handler_deadline(&self) -> Duration {
        Duration::from_secs(self.handler_deadline_secs)
    }

    /// Resolve the state dir: explicit flag, else the XDG-style default.
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::store::persist::state_dir)
    }
}
