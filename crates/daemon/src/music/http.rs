// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP implementation of the music-service adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{classify_status, CoreError, CoreResult, ErrorKind};
use crate::model::epoch_secs;
use crate::music::{MusicService, PlaybackState, PlayerDevice, RefreshedToken};

/// Music service reachable over HTTP: a player API plus an OAuth token
/// endpoint.
pub struct MusicHttp {
    http: reqwest::Client,
    api_base: String,
    token_url: String,
    client_id: String,
}

impl MusicHttp {
    pub fn new(api_base: &str, token_url: &str, client_id: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_base: api_base.trim_end_matches('/').to_owned(),
            token_url: token_url.to_owned(),
            client_id: client_id.to_owned(),
        }
    }

    fn player_url(&self, path: &str) -> String {
        format!("{}/v1/me/player{path}", self.api_base)
    }
}

/// Convert a non-success player-API response into a classified error.
async fn classify_response(resp: reqwest::Response, op: &str) -> CoreError {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    let kind = classify_status(status);
    let mut err = CoreError::new(kind, format!("{op} failed ({status}): {body}"));
    if kind == ErrorKind::RateLimited {
        err.retry_after = retry_after;
    }
    err
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    device: Option<DeviceJson>,
    #[serde(default)]
    context: Option<ContextJson>,
}

#[derive(Debug, Deserialize)]
struct DeviceJson {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct ContextJson {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<DeviceJson>,
}

#[async_trait]
impl MusicService for MusicHttp {
    async fn refresh_access_token(&self, refresh_token: &str) -> CoreResult<RefreshedToken> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            // A revoked refresh token is an auth failure, not a transient one.
            if body.contains("invalid_grant") {
                return Err(CoreError::auth_expired(format!(
                    "refresh rejected ({status}): invalid_grant"
                )));
            }
            let kind = classify_status(status);
            return Err(CoreError::new(kind, format!("refresh failed ({status}): {body}")));
        }

        let token: TokenResponse = resp.json().await.map_err(CoreError::from)?;
        Ok(RefreshedToken {
            access_token: token.access_token,
            expires_at: epoch_secs() + token.expires_in,
            refresh_token: token.refresh_token,
        })
    }

    async fn get_playback_state(&self, access_token: &str) -> CoreResult<PlaybackState> {
        let resp = self
            .http
            .get(self.player_url(""))
            .bearer_auth(access_token)
            .send()
            .await?;

        // 204: nothing is playing anywhere.
        if resp.status().as_u16() == 204 {
            return Ok(PlaybackState::default());
        }
        if !resp.status().is_success() {
            return Err(classify_response(resp, "playback state").await);
        }

        let player: PlayerResponse = resp.json().await.map_err(CoreError::from)?;
        Ok(PlaybackState {
            is_playing: player.is_playing,
            device_id: player.device.map(|d| d.id),
            context_ref: player.context.map(|c| c.uri),
        })
    }

    async fn start_playback(
        &self,
        access_token: &str,
        device_id: &str,
        context_ref: &str,
    ) -> CoreResult<()> {
        let url = format!("{}?device_id={device_id}", self.player_url("/play"));
        let resp = self
            .http
            .put(url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "context_uri": context_ref }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_response(resp, "start playback").await);
        }
        Ok(())
    }

    async fn pause_playback(&self, access_token: &str, device_id: &str) -> CoreResult<()> {
        let url = format!("{}?device_id={device_id}", self.player_url("/pause"));
        let resp = self.http.put(url).bearer_auth(access_token).send().await?;

        if !resp.status().is_success() {
            return Err(classify_response(resp, "pause playback").await);
        }
        Ok(())
    }

    async fn list_devices(&self, access_token: &str) -> CoreResult<Vec<PlayerDevice>> {
        let resp = self
            .http
            .get(self.player_url("/devices"))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_response(resp, "list devices").await);
        }

        let devices: DevicesResponse = resp.json().await.map_err(CoreError::from)?;
        Ok(devices
            .devices
            .into_iter()
            .map(|d| PlayerDevice { id: d.id, name: d.name, is_active: d.is_active })
            .collect())
    }
}
