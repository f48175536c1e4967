// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token warden: keeps every connected user's access token fresh.
//!
//! Each tick walks the music-connected users. Per user it takes the store
//! lease (at most one refresher per user across the deployment), skips tokens
//! still comfortably inside their lifetime, and refreshes the rest. A failure
//! for one user never aborts the tick for the others.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::model::{epoch_secs, User};
use crate::retry::{with_retries, RetryPolicy};
use crate::secret::TokenRecord;
use crate::state::{bump, AppState};

/// Per-user outcome of one warden pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Token still has more lifetime than the safety margin.
    Skipped,
    /// Another holder owns the refresh lease; nothing to do this tick.
    LeaseHeld,
    /// Refresh token revoked; the user's music connection was disabled.
    Disconnected,
    /// Transient failure; will be retried on a later tick.
    Failed,
}

/// Aggregate outcome of a tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub refreshed: usize,
    pub skipped: usize,
    pub lease_held: usize,
    pub disconnected: usize,
    pub failed: usize,
}

impl TickSummary {
    fn absorb(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Refreshed => self.refreshed += 1,
            RefreshOutcome::Skipped => self.skipped += 1,
            RefreshOutcome::LeaseHeld => self.lease_held += 1,
            RefreshOutcome::Disconnected => self.disconnected += 1,
            RefreshOutcome::Failed => self.failed += 1,
        }
    }
}

/// Spawn the warden loop as a background task.
pub fn spawn_warden(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.warden_tick());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let summary = run_tick(&state, epoch_secs()).await;
            tracing::debug!(
                refreshed = summary.refreshed,
                skipped = summary.skipped,
                failed = summary.failed,
                "warden tick complete"
            );
        }
    });
}

/// Run one warden pass over all connected users at `now`.
pub async fn run_tick(state: &Arc<AppState>, now: u64) -> TickSummary {
    let users = state.store.list_music_connected_users().await;
    let semaphore = Arc::new(Semaphore::new(state.config.tick_workers.max(1)));
    let mut join_set = JoinSet::new();

    for user in users {
        let state = Arc::clone(state);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = semaphore.acquire().await;
            refresh_user(&state, &user, now).await
        });
    }

    let mut summary = TickSummary::default();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => summary.absorb(outcome),
            Err(e) => {
                tracing::error!(err = %e, "warden worker panicked");
                summary.failed += 1;
            }
        }
    }
    summary
}

/// Refresh a single user's token under the per-user lease.
pub async fn refresh_user(state: &AppState, user: &User, now: u64) -> RefreshOutcome {
    let Some(lease) = state
        .store
        .acquire_refresh_lease(&user.user_id, now, state.config.lease_ttl_secs)
        .await
    else {
        return RefreshOutcome::LeaseHeld;
    };

    let outcome = refresh_under_lease(state, user, now).await;
    state.store.release_refresh_lease(&lease).await;
    outcome
}

async fn refresh_under_lease(state: &AppState, user: &User, now: u64) -> RefreshOutcome {
    let Some(ref token_ref) = user.token_ref else {
        tracing::error!(user_id = %user.user_id, "connected user has no token ref; disconnecting");
        disconnect(state, user).await;
        return RefreshOutcome::Disconnected;
    };

    let Some(record) = state.vault.get(token_ref).await else {
        tracing::error!(user_id = %user.user_id, "token ref points at an empty secret; disconnecting");
        disconnect(state, user).await;
        return RefreshOutcome::Disconnected;
    };

    if record.expires_at.saturating_sub(now) > state.config.refresh_margin_secs {
        bump(&state.counters.refreshes_skipped);
        return RefreshOutcome::Skipped;
    }

    match refresh_record(state, user, token_ref, &record).await {
        Ok(_) => {
            bump(&state.counters.refreshes_ok);
            tracing::info!(user_id = %user.user_id, "access token refreshed");
            RefreshOutcome::Refreshed
        }
        Err(err) if err.kind == ErrorKind::AuthExpired => {
            // Operator alert: the refresh token itself was revoked.
            tracing::error!(user_id = %user.user_id, err = %err, "refresh token revoked; disabling music connection");
            disconnect(state, user).await;
            RefreshOutcome::Disconnected
        }
        Err(err) => {
            bump(&state.counters.refreshes_failed);
            tracing::warn!(user_id = %user.user_id, err = %err, "token refresh failed; will retry next tick");
            RefreshOutcome::Failed
        }
    }
}

/// Call the refresh endpoint under the in-process singleflight gate and
/// write the result back to the vault.
async fn refresh_record(
    state: &AppState,
    user: &User,
    token_ref: &str,
    record: &TokenRecord,
) -> CoreResult<TokenRecord> {
    let gate = state.token_cache.refresh_gate(&user.user_id).await;
    let _flight = gate.lock().await;

    // Whoever lost the gate race finds the winner's write here and stops.
    if let Some(current) = state.vault.get(token_ref).await {
        if current.expires_at > record.expires_at {
            return Ok(current);
        }
    }

    let refreshed = with_retries(RetryPolicy::default(), "token refresh", || {
        state.music.refresh_access_token(&record.refresh_token)
    })
    .await?;

    let updated = TokenRecord {
        access_token: refreshed.access_token,
        // Preserve the refresh token unless the service rotated it.
        refresh_token: refreshed.refresh_token.unwrap_or_else(|| record.refresh_token.clone()),
        expires_at: refreshed.expires_at,
    };
    state
        .vault
        .put(token_ref, updated.clone())
        .await
        .map_err(|e| CoreError::transient(format!("secret write failed: {e}")))?;
    state.token_cache.invalidate(&user.user_id).await;
    Ok(updated)
}

async fn disconnect(state: &AppState, user: &User) {
    state
        .store
        .set_music_connection(&user.user_id, false, user.token_ref.clone())
        .await;
    state.token_cache.invalidate(&user.user_id).await;
    bump(&state.counters.users_disconnected);
}

/// Read-through token fetch for playback consumers.
///
/// Serves from the cache when possible; otherwise reads the vault. A token
/// observed already expired triggers a synchronous refresh rather than
/// waiting for the next warden tick.
pub async fn access_token(state: &AppState, user: &User, now: u64) -> CoreResult<String> {
    if !user.music_connected {
        return Err(CoreError::auth_expired(format!(
            "user {} has no music connection",
            user.user_id
        )));
    }
    if let Some(record) = state.token_cache.get(&user.user_id, now).await {
        return Ok(record.access_token);
    }

    let token_ref = user.token_ref.as_deref().ok_or_else(|| {
        CoreError::fatal(format!("connected user {} has no token ref", user.user_id))
    })?;
    let record = state.vault.get(token_ref).await.ok_or_else(|| {
        CoreError::fatal(format!("token ref for {} points at an empty secret", user.user_id))
    })?;

    if record.expires_at > now {
        state.token_cache.insert(&user.user_id, record.clone(), now).await;
        return Ok(record.access_token);
    }

    // Expired on read: refresh now. The gate inside refresh_record collapses
    // concurrent callers; whoever loses re-reads the fresh vault record.
    let updated = refresh_record(state, user, token_ref, &record).await.map_err(|err| {
        if err.kind == ErrorKind::AuthExpired {
            CoreError::auth_expired(format!(
                "refresh token for {} rejected: {}",
                user.user_id, err.message
            ))
        } else {
            err
        }
    })?;
    state.token_cache.insert(&user.user_id, updated.clone(), now).await;
    Ok(updated.access_token)
}

#[cfg(test)]
#[path = "warden_tests.rs"]
mod tests;
