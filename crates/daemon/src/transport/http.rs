// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the admin API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{epoch_secs, QuietHours, User};
use crate::mqtt::{self, Outbound};
use crate::provision::{self, ProvisionRequest};
use crate::quiet;
use crate::secret::{SecretVault, TokenRecord};
use crate::state::{AppState, CountersSnapshot};

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_sessions: usize,
    pub counters: CountersSnapshot,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub sensor_id: String,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub motion_debounce_secs: Option<u64>,
    #[serde(default)]
    pub inactivity_timeout_secs: Option<u64>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
    /// Clears the quiet-hours window when true.
    #[serde(default)]
    pub clear_quiet_hours: bool,
    #[serde(default)]
    pub playback_target_id: Option<String>,
    #[serde(default)]
    pub playback_context_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub sensor_id: String,
    pub command: String,
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectMusicRequest {
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Expiry of `access_token`, epoch seconds. Zero forces a refresh on
    /// first use.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_events_limit")]
    pub limit: usize,
}

fn default_events_limit() -> usize {
    50
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let active = s.store.list_active_sessions().await.len();
    Json(HealthResponse {
        status: "running".to_owned(),
        active_sessions: active,
        counters: s.counters.snapshot(),
    })
}

/// `POST /api/v1/devices` — provision a device, returning the one-time
/// credential bundle.
pub async fn provision_device(
    State(s): State<Arc<AppState>>,
    Json(req): Json<ProvisionRequest>,
) -> impl IntoResponse {
    match provision::provision(&s, req).await {
        Ok(bundle) => (StatusCode::CREATED, Json(bundle)).into_response(),
        Err(err) => err.to_http_response().into_response(),
    }
}

/// `DELETE /api/v1/devices/{sensor_id}` — deprovision.
pub async fn deprovision_device(
    State(s): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
) -> impl IntoResponse {
    match provision::deprovision(&s, &sensor_id).await {
        Ok(()) => Json(RemovedResponse { sensor_id, removed: true }).into_response(),
        Err(err) => err.to_http_response().into_response(),
    }
}

/// `GET /api/v1/sensors`
pub async fn list_sensors(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.store.list_sensors().await)
}

/// `GET /api/v1/sensors/{sensor_id}`
pub async fn get_sensor(
    State(s): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
) -> impl IntoResponse {
    match s.store.get_sensor(&sensor_id).await {
        Some(sensor) => Json(sensor).into_response(),
        None => CoreError::not_found(format!("no such sensor: {sensor_id}"))
            .to_http_response()
            .into_response(),
    }
}

/// `PATCH /api/v1/sensors/{sensor_id}/config` — update configuration and
/// push it to the device.
pub async fn patch_sensor_config(
    State(s): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    Json(patch): Json<ConfigPatch>,
) -> impl IntoResponse {
    // Reject unusable quiet-hours windows before they reach the store.
    if let Some(ref window) = patch.quiet_hours {
        if let Err(err) = validate_quiet_hours(window) {
            return err.to_http_response().into_response();
        }
    }

    let updated = s
        .store
        .update_sensor(&sensor_id, |sensor| {
            if let Some(enabled) = patch.enabled {
                sensor.enabled = enabled;
            }
            if let Some(debounce) = patch.motion_debounce_secs {
                sensor.motion_debounce_secs = debounce;
            }
            if let Some(timeout) = patch.inactivity_timeout_secs {
                sensor.inactivity_timeout_secs = timeout;
            }
            if patch.clear_quiet_hours {
                sensor.quiet_hours = None;
            } else if let Some(ref window) = patch.quiet_hours {
                sensor.quiet_hours = Some(window.clone());
            }
            if let Some(ref target) = patch.playback_target_id {
                sensor.playback_target_id = target.clone();
            }
            if let Some(ref context) = patch.playback_context_ref {
                sensor.playback_context_ref = context.clone();
            }
        })
        .await;

    let Some(sensor) = updated else {
        return CoreError::not_found(format!("no such sensor: {sensor_id}"))
            .to_http_response()
            .into_response();
    };

    let outbound =
        Outbound::Config { sensor_id: sensor_id.clone(), payload: mqtt::config_payload(&sensor) };
    if let Err(e) = s.outbound_tx.send(outbound).await {
        tracing::warn!(sensor_id = %sensor_id, err = %e, "config publish channel closed");
    }
    Json(sensor).into_response()
}

fn validate_quiet_hours(window: &QuietHours) -> Result<(), CoreError> {
    quiet::parse_hhmm(&window.start)?;
    quiet::parse_hhmm(&window.end)?;
    window
        .timezone
        .parse::<chrono_tz::Tz>()
        .map_err(|_| CoreError::validation(format!("unknown timezone: {}", window.timezone)))?;
    Ok(())
}

/// `POST /api/v1/sensors/{sensor_id}/commands` — publish a device command.
pub async fn send_command(
    State(s): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    if !mqtt::is_known_command(&req.command) {
        return CoreError::validation(format!("unknown command: {}", req.command))
            .to_http_response()
            .into_response();
    }
    if !s.store.sensor_exists(&sensor_id).await {
        return CoreError::not_found(format!("no such sensor: {sensor_id}"))
            .to_http_response()
            .into_response();
    }

    let outbound = Outbound::Command {
        sensor_id: sensor_id.clone(),
        payload: serde_json::json!({ "command": req.command, "timestamp": epoch_secs() }),
    };
    let published = s.outbound_tx.send(outbound).await.is_ok();
    Json(CommandResponse { sensor_id, command: req.command, published }).into_response()
}

/// `GET /api/v1/sensors/{sensor_id}/events` — recent audit rows.
pub async fn sensor_events(
    State(s): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    Json(s.store.events_for_sensor(&sensor_id, query.limit.min(500)).await)
}

/// `GET /api/v1/users/{user_id}`
pub async fn get_user(
    State(s): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match s.store.get_user(&user_id).await {
        Some(user) => Json(user).into_response(),
        None => CoreError::not_found(format!("no such user: {user_id}"))
            .to_http_response()
            .into_response(),
    }
}

/// `POST /api/v1/users/{user_id}/music` — store a refresh token and mark
/// the user's music connection live.
pub async fn connect_music(
    State(s): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<ConnectMusicRequest>,
) -> impl IntoResponse {
    if req.refresh_token.is_empty() {
        return CoreError::validation("refresh_token is required")
            .to_http_response()
            .into_response();
    }

    if s.store.get_user(&user_id).await.is_none() {
        s.store.put_user(User::new(&user_id)).await;
    }

    let token_ref = SecretVault::new_token_ref(&user_id);
    let record = TokenRecord {
        access_token: req.access_token.unwrap_or_default(),
        refresh_token: req.refresh_token,
        expires_at: req.expires_at.unwrap_or(0),
    };
    if let Err(e) = s.vault.put(&token_ref, record).await {
        return CoreError::transient(format!("secret write failed: {e}"))
            .to_http_response()
            .into_response();
    }

    s.token_cache.invalidate(&user_id).await;
    match s.store.set_music_connection(&user_id, true, Some(token_ref)).await {
        Some(user) => Json(user).into_response(),
        None => CoreError::not_found(format!("no such user: {user_id}"))
            .to_http_response()
            .into_response(),
    }
}

/// `DELETE /api/v1/users/{user_id}/music` — drop the connection and its
/// secret.
pub async fn disconnect_music(
    State(s): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let Some(user) = s.store.get_user(&user_id).await else {
        return CoreError::not_found(format!("no such user: {user_id}"))
            .to_http_response()
            .into_response();
    };

    if let Some(ref token_ref) = user.token_ref {
        if let Err(e) = s.vault.delete(token_ref).await {
            tracing::warn!(user_id = %user_id, err = %e, "secret delete failed");
        }
    }
    s.token_cache.invalidate(&user_id).await;
    match s.store.set_music_connection(&user_id, false, None).await {
        Some(user) => Json(user).into_response(),
        None => CoreError::not_found(format!("no such user: {user_id}"))
            .to_http_response()
            .into_response(),
    }
}

/// `GET /api/v1/sessions` — currently active sessions.
pub async fn list_sessions(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.store.list_active_sessions().await)
}

/// `GET /api/v1/sessions/{session_id}`
pub async fn get_session(
    State(s): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match s.store.get_session(&session_id).await {
        Some(session) => Json(session).into_response(),
        None => CoreError::not_found(format!("no such session: {session_id}"))
            .to_http_response()
            .into_response(),
    }
}
