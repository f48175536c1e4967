// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::Ordering;

use super::{access_token, refresh_user, run_tick, RefreshOutcome};
use crate::error::CoreError;
use crate::secret::TokenRecord;
use crate::test_support::TestHarness;

const NOW: u64 = 1_700_000_000;

#[tokio::test]
async fn fresh_token_is_skipped() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", NOW + 3600).await?;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    let outcome = refresh_user(&h.state, &user, NOW).await;
    assert_eq!(outcome, RefreshOutcome::Skipped);
    assert_eq!(h.music.refresh_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn token_inside_margin_is_refreshed() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let token_ref = h.connect_user("u-1", NOW + 100).await?;
    h.music.set_token_clock(NOW, 3600).await;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    let outcome = refresh_user(&h.state, &user, NOW).await;
    assert_eq!(outcome, RefreshOutcome::Refreshed);

    let stored = h.state.vault.get(&token_ref).await.ok_or_else(|| anyhow::anyhow!("no record"))?;
    // Token monotonicity: new access token, expiry beyond "now".
    assert_ne!(stored.access_token, "access-0");
    assert!(stored.expires_at > NOW);
    // Refresh token preserved: the service did not rotate it.
    assert_eq!(stored.refresh_token, "refresh-0");
    assert_eq!(h.state.counters.refreshes_ok.load(Ordering::Relaxed), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_grant_disconnects_the_user() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", NOW + 100).await?;
    h.music.set_refresh_error(Some(CoreError::auth_expired("invalid_grant"))).await;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    let outcome = refresh_user(&h.state, &user, NOW).await;
    assert_eq!(outcome, RefreshOutcome::Disconnected);

    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;
    assert!(!user.music_connected);
    assert_eq!(h.state.counters.users_disconnected.load(Ordering::Relaxed), 1);
    // No retry storm on a revoked token: one refresh attempt only.
    assert_eq!(h.music.refresh_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn transient_failure_is_isolated_per_user() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", NOW + 100).await?;
    h.connect_user("u-2", NOW + 100).await?;
    h.music.set_token_clock(NOW, 3600).await;

    let a = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;
    h.music.set_refresh_error(Some(CoreError::transient("down"))).await;
    assert_eq!(refresh_user(&h.state, &a, NOW).await, RefreshOutcome::Failed);

    // Service recovers; the other user is unaffected by A's failure.
    h.music.set_refresh_error(None).await;
    let b = h.state.store.get_user("u-2").await.ok_or_else(|| anyhow::anyhow!("no user"))?;
    assert_eq!(refresh_user(&h.state, &b, NOW).await, RefreshOutcome::Refreshed);
    Ok(())
}

#[tokio::test]
async fn held_lease_skips_the_user() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", NOW + 100).await?;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    let _lease = h
        .state
        .store
        .acquire_refresh_lease("u-1", NOW, 120)
        .await
        .ok_or_else(|| anyhow::anyhow!("lease acquire failed"))?;
    assert_eq!(refresh_user(&h.state, &user, NOW).await, RefreshOutcome::LeaseHeld);
    assert_eq!(h.music.refresh_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn lease_is_released_after_refresh() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", NOW + 100).await?;
    h.music.set_token_clock(NOW, 3600).await;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    assert_eq!(refresh_user(&h.state, &user, NOW).await, RefreshOutcome::Refreshed);
    // Second pass can take the lease again (and now skips on freshness).
    assert_eq!(refresh_user(&h.state, &user, NOW).await, RefreshOutcome::Skipped);
    Ok(())
}

#[tokio::test]
async fn tick_handles_mixed_users() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-fresh", NOW + 3600).await?;
    h.connect_user("u-stale", NOW + 100).await?;
    h.music.set_token_clock(NOW, 3600).await;

    let summary = run_tick(&h.state, NOW).await;
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.failed, 0);
    Ok(())
}

#[tokio::test]
async fn disconnected_users_are_not_ticked() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", NOW + 100).await?;
    h.state.store.set_music_connection("u-1", false, None).await;

    let summary = run_tick(&h.state, NOW).await;
    assert_eq!(summary, super::TickSummary::default());
    assert_eq!(h.music.refresh_count().await, 0);
    Ok(())
}

// ── access_token read-through ─────────────────────────────────────────────

#[tokio::test]
async fn access_token_serves_vault_record_and_caches_it() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let token_ref = h.connect_user("u-1", NOW + 3600).await?;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    assert_eq!(access_token(&h.state, &user, NOW).await?, "access-0");

    // Mutate the vault behind the cache: the cached value still wins.
    h.state
        .vault
        .put(
            &token_ref,
            TokenRecord {
                access_token: "changed".into(),
                refresh_token: "refresh-0".into(),
                expires_at: NOW + 3600,
            },
        )
        .await?;
    assert_eq!(access_token(&h.state, &user, NOW).await?, "access-0");
    Ok(())
}

#[tokio::test]
async fn expired_token_triggers_synchronous_refresh() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let token_ref = h.connect_user("u-1", NOW - 10).await?;
    h.music.set_token_clock(NOW, 3600).await;
    let user = h.state.store.get_user("u-1").await.ok_or_else(|| anyhow::anyhow!("no user"))?;

    let token = access_token(&h.state, &user, NOW).await?;
    assert_ne!(token, "access-0");
    assert_eq!(h.music.refresh_count().await, 1);

    let stored = h.state.vault.get(&token_ref).await.ok_or_else(|| anyhow::anyhow!("no record"))?;
    assert_eq!(stored.access_token, token);
    assert!(stored.expires_at > NOW);
    Ok(())
}

#[tokio::test]
async fn access_token_fails_for_disconnected_user() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let user = crate::model::User::new("u-1");
    h.state.store.put_user(user.clone()).await;

    let err = access_token(&h.state, &user, NOW).await;
    assert!(err.is_err());
    assert_eq!(h.music.refresh_count().await, 0);
    Ok(())
}
