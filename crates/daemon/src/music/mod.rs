// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Music-service adapter: the thin, mockable seam in front of the external
//! playback HTTP API.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Result of a successful OAuth refresh. `expires_at` is absolute epoch
/// seconds; `refresh_token` is present only when the service rotated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Current playback snapshot for a user's account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_ref: Option<String>,
}

impl PlaybackState {
    /// Whether this state means "already playing on the given target".
    pub fn playing_on(&self, device_id: &str) -> bool {
        self.is_playing && self.device_id.as_deref() == Some(device_id)
    }
}

/// A playback-capable device on the user's account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDevice {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// The external music-playback API, reduced to the five calls the core
/// needs. Implementations classify responses into the error-kind taxonomy
/// (401 -> AuthExpired, 429 -> RateLimited with Retry-After, 5xx ->
/// Transient).
#[async_trait]
pub trait MusicService: Send + Sync {
    async fn refresh_access_token(&self, refresh_token: &str) -> CoreResult<RefreshedToken>;

    async fn get_playback_state(&self, access_token: &str) -> CoreResult<PlaybackState>;

    async fn start_playback(
        &self,
        access_token: &str,
        device_id: &str,
        context_ref: &str,
    ) -> CoreResult<()>;

    async fn pause_playback(&self, access_token: &str, device_id: &str) -> CoreResult<()>;

    async fn list_devices(&self, access_token: &str) -> CoreResult<Vec<PlayerDevice>>;
}
