// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording mock of the music service, shared by unit tests and the
//! end-to-end scenario suite.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::music::{MusicService, PlaybackState, PlayerDevice, RefreshedToken};

/// One adapter call, as observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCall {
    Refresh { refresh_token: String },
    GetState,
    Start { device_id: String, context_ref: String },
    Pause { device_id: String },
    ListDevices,
}

#[derive(Debug, Default)]
struct MockBehavior {
    playback: PlaybackState,
    devices: Vec<PlayerDevice>,
    /// Error returned by the next matching call, then cleared.
    fail_next: Option<CoreError>,
    /// When set, every refresh fails with this error.
    refresh_error: Option<CoreError>,
    /// When set, every start fails with this error.
    start_error: Option<CoreError>,
    /// When set, every pause fails with this error.
    pause_error: Option<CoreError>,
    /// Lifetime stamped onto refreshed tokens.
    token_ttl_secs: u64,
    /// Base for `expires_at` on refreshed tokens ("now" in tests).
    now: u64,
}

/// Mock music service that records calls and plays back configured state.
#[derive(Debug)]
pub struct MockMusic {
    calls: Mutex<Vec<MusicCall>>,
    behavior: Mutex<MockBehavior>,
    refresh_seq: AtomicU64,
}

impl Default for MockMusic {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMusic {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            behavior: Mutex::new(MockBehavior {
                token_ttl_secs: 3600,
                ..MockBehavior::default()
            }),
            refresh_seq: AtomicU64::new(0),
        }
    }

    pub async fn calls(&self) -> Vec<MusicCall> {
        self.calls.lock().await.clone()
    }

    pub async fn start_calls(&self) -> Vec<MusicCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, MusicCall::Start { .. }))
            .cloned()
            .collect()
    }

    pub async fn pause_calls(&self) -> Vec<MusicCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, MusicCall::Pause { .. }))
            .cloned()
            .collect()
    }

    pub async fn refresh_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, MusicCall::Refresh { .. }))
            .count()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Set the playback snapshot returned by `get_playback_state`.
    pub async fn set_playback(&self, playback: PlaybackState) {
        self.behavior.lock().await.playback = playback;
    }

    pub async fn set_devices(&self, devices: Vec<PlayerDevice>) {
        self.behavior.lock().await.devices = devices;
    }

    /// Fail the next adapter call with `err`, then recover.
    pub async fn fail_next(&self, err: CoreError) {
        self.behavior.lock().await.fail_next = Some(err);
    }

    /// Make every refresh fail with `err` until cleared.
    pub async fn set_refresh_error(&self, err: Option<CoreError>) {
        self.behavior.lock().await.refresh_error = err;
    }

    /// Make every start fail with `err` until cleared.
    pub async fn set_start_error(&self, err: Option<CoreError>) {
        self.behavior.lock().await.start_error = err;
    }

    /// Make every pause fail with `err` until cleared.
    pub async fn set_pause_error(&self, err: Option<CoreError>) {
        self.behavior.lock().await.pause_error = err;
    }

    /// Control the clock and TTL stamped onto refreshed tokens.
    pub async fn set_token_clock(&self, now: u64, ttl_secs: u64) {
        let mut behavior = self.behavior.lock().await;
        behavior.now = now;
        behavior.token_ttl_secs = ttl_secs;
    }

    async fn take_failure(&self) -> Option<CoreError> {
        self.behavior.lock().await.fail_next.take()
    }
}

#[async_trait]
impl MusicService for MockMusic {
    async fn refresh_access_token(&self, refresh_token: &str) -> CoreResult<RefreshedToken> {
        self.calls
            .lock()
            .await
            .push(MusicCall::Refresh { refresh_token: refresh_token.to_owned() });
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        let behavior = self.behavior.lock().await;
        if let Some(ref err) = behavior.refresh_error {
            return Err(err.clone());
        }
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RefreshedToken {
            access_token: format!("access-{seq}"),
            expires_at: behavior.now + behavior.token_ttl_secs,
            refresh_token: None,
        })
    }

    async fn get_playback_state(&self, _access_token: &str) -> CoreResult<PlaybackState> {
        self.calls.lock().await.push(MusicCall::GetState);
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        Ok(self.behavior.lock().await.playback.clone())
    }

    async fn start_playback(
        &self,
        _access_token: &str,
        device_id: &str,
        context_ref: &str,
    ) -> CoreResult<()> {
        self.calls.lock().await.push(MusicCall::Start {
            device_id: device_id.to_owned(),
            context_ref: context_ref.to_owned(),
        });
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        if let Some(ref err) = self.behavior.lock().await.start_error {
            return Err(err.clone());
        }
        // Starting playback makes the target the active device.
        let mut behavior = self.behavior.lock().await;
        behavior.playback = PlaybackState {
            is_playing: true,
            device_id: Some(device_id.to_owned()),
            context_ref: Some(context_ref.to_owned()),
        };
        Ok(())
    }

    async fn pause_playback(&self, _access_token: &str, device_id: &str) -> CoreResult<()> {
        self.calls.lock().await.push(MusicCall::Pause { device_id: device_id.to_owned() });
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        let mut behavior = self.behavior.lock().await;
        if let Some(ref err) = behavior.pause_error {
            return Err(err.clone());
        }
        behavior.playback.is_playing = false;
        Ok(())
    }

    async fn list_devices(&self, _access_token: &str) -> CoreResult<Vec<PlayerDevice>> {
        self.calls.lock().await.push(MusicCall::ListDevices);
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        Ok(self.behavior.lock().await.devices.clone())
    }
}
