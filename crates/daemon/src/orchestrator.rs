// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Motion orchestrator: turns admitted motion into playback sessions.
//!
//! Admission (enabled, quiet hours, debounce) is decided from persisted
//! state, so re-ordered or re-delivered events converge on the same audit
//! outcome. The active session is a store row, not process memory; opening
//! one is a conditional create that adopts the existing row on conflict.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::model::{
    action, MotionEvent, MotionEventType, MotionMetadata, Sensor, SensorStatus, Session, User,
};
use crate::quiet;
use crate::retry::{with_retries, RetryPolicy};
use crate::state::{bump, AppState};
use crate::store::OpenOutcome;
use crate::token::warden;

/// What one motion event did, for callers and tests.
#[derive(Debug, Clone)]
pub struct MotionOutcome {
    pub event_type: MotionEventType,
    pub action: String,
    pub session_id: Option<String>,
    /// Whether a start command was issued to the music service.
    pub playback_started: bool,
}

/// Handle one decoded motion event for `sensor_id` at `occurred_at`.
///
/// Exactly one audit row is written per call, whatever the admission
/// outcome. Downstream playback failures never roll back the session or the
/// audit write.
pub async fn handle_motion(
    state: &Arc<AppState>,
    sensor_id: &str,
    occurred_at: u64,
    metadata: MotionMetadata,
) -> CoreResult<MotionOutcome> {
    // 1. Resolve sensor and owner.
    let sensor = state
        .store
        .get_sensor(sensor_id)
        .await
        .ok_or_else(|| CoreError::not_found(format!("no such sensor: {sensor_id}")))?;
    let user = state
        .store
        .get_user(&sensor.user_id)
        .await
        .ok_or_else(|| CoreError::not_found(format!("no such user: {}", sensor.user_id)))?;

    // 2. Admission checks, each with its own audit tag.
    if let Some(suppressed) = check_admission(state, &sensor, &user, occurred_at).await {
        let event = MotionEvent::record(sensor_id, &sensor.user_id, occurred_at, suppressed, action::SUPPRESSED)
            .with_metadata(metadata);
        state.store.append_event(event).await;
        return Ok(MotionOutcome {
            event_type: suppressed,
            action: action::SUPPRESSED.to_owned(),
            session_id: None,
            playback_started: false,
        });
    }

    // 3. Session resolve-or-open.
    let (session, opened) = resolve_or_open_session(state, &sensor, occurred_at).await;
    let action_tag = if opened { action::SESSION_OPENED } else { action::SESSION_EXTENDED };
    if opened {
        bump(&state.counters.sessions_opened);
    } else {
        bump(&state.counters.sessions_extended);
    }

    // 4. Playback state check + command. Failures are logged, not fatal:
    //    "we saw motion but couldn't play" must stay observable.
    let playback_started = ensure_playback(state, &user, &sensor, &session, occurred_at).await;

    // 5. Persist: sensor anchor (max-merge), audit row.
    state
        .store
        .update_sensor(sensor_id, |s| {
            s.last_motion_at =
                Some(s.last_motion_at.map_or(occurred_at, |prev| prev.max(occurred_at)));
            if s.status == SensorStatus::Registered {
                s.status = SensorStatus::Active;
            }
        })
        .await;
    let event =
        MotionEvent::record(sensor_id, &sensor.user_id, occurred_at, MotionEventType::Detected, action_tag)
            .with_session(&session.session_id)
            .with_metadata(metadata);
    state.store.append_event(event).await;

    Ok(MotionOutcome {
        event_type: MotionEventType::Detected,
        action: action_tag.to_owned(),
        session_id: Some(session.session_id),
        playback_started,
    })
}

/// Run the admission checks in order; `Some(tag)` means suppressed.
async fn check_admission(
    state: &Arc<AppState>,
    sensor: &Sensor,
    user: &User,
    occurred_at: u64,
) -> Option<MotionEventType> {
    if !sensor.enabled {
        bump(&state.counters.motions_disabled_suppressed);
        return Some(MotionEventType::DisabledSuppressed);
    }

    // Quiet hours: sensor-level window, else the user's default.
    let window = sensor.quiet_hours.as_ref().or(user.preferences.default_quiet_hours.as_ref());
    if let Some(window) = window {
        match quiet::in_quiet_hours(occurred_at, window) {
            Ok(true) => {
                bump(&state.counters.motions_quiet_suppressed);
                return Some(MotionEventType::QuietHoursSuppressed);
            }
            Ok(false) => {}
            Err(err) => {
                // A broken window config must not silence the sensor.
                tracing::warn!(sensor_id = %sensor.sensor_id, err = %err, "quiet-hours config unusable; admitting");
            }
        }
    }

    // Debounce against the persisted anchor. A straggler that arrives with a
    // timestamp before the anchor lands inside the window by definition.
    if let Some(last) = sensor.last_motion_at {
        if (occurred_at as i64 - last as i64) < sensor.motion_debounce_secs as i64 {
            bump(&state.counters.motions_debounced);
            return Some(MotionEventType::Debounced);
        }
    }

    None
}

/// Find the active session or open a fresh one. Returns `(session, opened)`.
async fn resolve_or_open_session(
    state: &Arc<AppState>,
    sensor: &Sensor,
    occurred_at: u64,
) -> (Session, bool) {
    if let Some(existing) = state.store.active_session(&sensor.sensor_id).await {
        match state.store.record_session_motion(&existing.session_id, occurred_at).await {
            Ok(updated) => return (updated, false),
            Err(err) if err.kind == ErrorKind::Conflict => {
                // Closed between read and write; fall through and open fresh.
            }
            Err(err) => {
                tracing::warn!(session_id = %existing.session_id, err = %err, "session update failed");
                return (existing, false);
            }
        }
    }

    match state
        .store
        .open_session(Session::open(&sensor.sensor_id, &sensor.user_id, occurred_at))
        .await
    {
        OpenOutcome::Opened(session) => (session, true),
        OpenOutcome::Adopted(session) => {
            // Lost the create race; converge on the winner's row.
            let updated = state
                .store
                .record_session_motion(&session.session_id, occurred_at)
                .await
                .unwrap_or(session);
            (updated, false)
        }
    }
}

/// Make sure the sensor's target device is playing, idempotently.
///
/// Queries playback state first and only commands the service when the
/// target is not already the active playback device.
async fn ensure_playback(
    state: &Arc<AppState>,
    user: &User,
    sensor: &Sensor,
    session: &Session,
    now: u64,
) -> bool {
    let token = match warden::access_token(state, user, now).await {
        Ok(token) => token,
        Err(err) => {
            bump(&state.counters.playback_start_failures);
            tracing::warn!(sensor_id = %sensor.sensor_id, err = %err, "no usable access token; motion logged without playback");
            return false;
        }
    };

    let target = &sensor.playback_target_id;
    let already_playing = match state.music.get_playback_state(&token).await {
        Ok(playback) => playback.playing_on(target),
        Err(err) => {
            tracing::warn!(sensor_id = %sensor.sensor_id, err = %err, "playback state query failed; assuming idle");
            false
        }
    };

    if already_playing {
        if !session.playback_started {
            let _ = state.store.mark_playback_started(&session.session_id).await;
        }
        return false;
    }

    let start = with_retries(RetryPolicy::default(), "start playback", || {
        state.music.start_playback(&token, target, &sensor.playback_context_ref)
    })
    .await;

    match start {
        Ok(()) => {
            bump(&state.counters.playback_starts);
            if let Err(err) = state.store.mark_playback_started(&session.session_id).await {
                tracing::debug!(session_id = %session.session_id, err = %err, "session closed before playback mark");
            }
            true
        }
        Err(err) => {
            bump(&state.counters.playback_start_failures);
            tracing::warn!(sensor_id = %sensor.sensor_id, err = %err, "start playback failed; motion still recorded");
            false
        }
    }
}

/// Record an informational registration announce. Never creates sensors:
/// provisioning (C5) is the only authoritative path.
pub async fn record_registration(
    state: &Arc<AppState>,
    sensor_id: &str,
    payload: serde_json::Value,
    seen_at: u64,
) {
    let updated = state
        .store
        .update_sensor(sensor_id, |sensor| {
            let health = sensor.health.get_or_insert_with(Default::default);
            if health.status.is_empty() {
                health.status = "online".to_owned();
            }
            health.reported_at = health.reported_at.max(seen_at);
        })
        .await;
    match updated {
        Some(_) => tracing::info!(sensor_id, payload = %payload, "registration announce"),
        None => tracing::info!(sensor_id, "registration announce from unprovisioned device"),
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
