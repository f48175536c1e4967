// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout reaper: closes active sessions whose last motion is older than
//! the owning sensor's inactivity timeout.
//!
//! Closing is a conditional `active -> completed` write, so concurrent
//! reapers (or a racing orchestrator) cannot double-close. A failed pause
//! never blocks the transition: a stuck-active session is a worse failure
//! mode than an un-paused device.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ErrorKind;
use crate::model::{action, epoch_secs, MotionEvent, MotionEventType, Session};
use crate::retry::{with_retries, RetryPolicy};
use crate::state::{bump, AppState};
use crate::token::warden;

/// Aggregate outcome of one reaper pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapSummary {
    pub examined: usize,
    pub closed: usize,
    pub pause_failures: usize,
    pub purged_sessions: usize,
    pub purged_events: usize,
}

/// Spawn the reaper loop as a background task.
pub fn spawn_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.reaper_tick());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let summary = run_tick(&state, epoch_secs()).await;
            if summary.closed > 0 || summary.pause_failures > 0 {
                tracing::info!(
                    examined = summary.examined,
                    closed = summary.closed,
                    pause_failures = summary.pause_failures,
                    "reaper tick complete"
                );
            }
        }
    });
}

/// Run one reaper pass at `now`. Scans only the active-session index, never
/// the whole session table.
pub async fn run_tick(state: &Arc<AppState>, now: u64) -> ReapSummary {
    let sessions = state.store.list_active_sessions().await;
    let semaphore = Arc::new(Semaphore::new(state.config.tick_workers.max(1)));
    let mut join_set = JoinSet::new();
    let examined = sessions.len();

    for session in sessions {
        let state = Arc::clone(state);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = semaphore.acquire().await;
            close_if_idle(&state, session, now).await
        });
    }

    let mut summary = ReapSummary { examined, ..ReapSummary::default() };
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(CloseOutcome::Closed { pause_failed }) => {
                summary.closed += 1;
                if pause_failed {
                    summary.pause_failures += 1;
                }
            }
            Ok(CloseOutcome::StillActive | CloseOutcome::Lost) => {}
            Err(e) => tracing::error!(err = %e, "reaper worker panicked"),
        }
    }

    let (purged_sessions, purged_events) = state.store.purge_expired(now).await;
    summary.purged_sessions = purged_sessions;
    summary.purged_events = purged_events;
    summary
}

#[derive(Debug, Clone, Copy)]
enum CloseOutcome {
    StillActive,
    /// Another writer closed it first.
    Lost,
    Closed { pause_failed: bool },
}

async fn close_if_idle(state: &Arc<AppState>, session: Session, now: u64) -> CloseOutcome {
    // The owning sensor is authoritative for the timeout. A session whose
    // sensor was deleted has nothing keeping it alive.
    let timeout = state
        .store
        .get_sensor(&session.sensor_id)
        .await
        .map(|s| s.inactivity_timeout_secs)
        .unwrap_or(0);

    if now.saturating_sub(session.last_motion_at) < timeout {
        return CloseOutcome::StillActive;
    }

    let pause_failed = !pause_playback(state, &session, now).await;

    let Some(closed) = state.store.close_session(&session.session_id, now).await else {
        return CloseOutcome::Lost;
    };
    bump(&state.counters.sessions_closed);

    let event = MotionEvent::record(
        &closed.sensor_id,
        &closed.user_id,
        now,
        MotionEventType::SessionClosed,
        action::SESSION_CLOSED,
    )
    .with_session(&closed.session_id);
    state.store.append_event(event).await;

    tracing::info!(
        session_id = %closed.session_id,
        sensor_id = %closed.sensor_id,
        duration_secs = closed.duration_secs.unwrap_or(0),
        motion_count = closed.motion_count,
        "session closed on inactivity"
    );
    CloseOutcome::Closed { pause_failed }
}

/// Pause the user's target device. `NotFound` (no active device, already
/// paused) counts as success; other failures are logged and absorbed.
async fn pause_playback(state: &Arc<AppState>, session: &Session, now: u64) -> bool {
    let Some(user) = state.store.get_user(&session.user_id).await else {
        tracing::warn!(session_id = %session.session_id, "session user missing; skipping pause");
        return true;
    };
    let Some(sensor) = state.store.get_sensor(&session.sensor_id).await else {
        return true;
    };

    let token = match warden::access_token(state, &user, now).await {
        Ok(token) => token,
        Err(err) => {
            bump(&state.counters.pause_failures);
            tracing::warn!(session_id = %session.session_id, err = %err, "no usable token for pause");
            return false;
        }
    };

    let result = with_retries(RetryPolicy::default(), "pause playback", || {
        state.music.pause_playback(&token, &sensor.playback_target_id)
    })
    .await;

    match result {
        Ok(()) => true,
        Err(err) if err.kind == ErrorKind::NotFound => true,
        Err(err) => {
            bump(&state.counters.pause_failures);
            tracing::warn!(session_id = %session.session_id, err = %err, "pause failed; closing session anyway");
            false
        }
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
