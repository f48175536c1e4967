// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios: broker payload in, sessions and playback out.

use motif_specs::SpecCore;
use motifd::model::{MotionEventType, SessionStatus};
use motifd::music::mock::MusicCall;
use motifd::registry::DeviceRegistry;

#[tokio::test]
async fn first_motion_opens_session_and_starts_playback() -> anyhow::Result<()> {
    let core = SpecCore::with_standard_fixture().await?;

    core.deliver_motion("bathroom-main", 1000).await;

    let session = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected an active session"))?;
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.start_at, 1000);
    assert_eq!(session.motion_count, 1);
    assert!(session.playback_started);

    let starts = core.h.music.start_calls().await;
    assert_eq!(
        starts,
        vec![MusicCall::Start { device_id: "D1".into(), context_ref: "playlist:P".into() }]
    );

    let events = core.h.state.store.events_for_sensor("bathroom-main", 10).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, MotionEventType::Detected);
    assert_eq!(events[0].action_taken, "session-opened");
    assert_eq!(events[0].metadata.battery_level, Some(80));
    Ok(())
}

#[tokio::test]
async fn second_motion_inside_debounce_is_suppressed() -> anyhow::Result<()> {
    let core = SpecCore::with_standard_fixture().await?;
    core.deliver_motion("bathroom-main", 1000).await;
    core.h.music.clear_calls().await;

    core.deliver_motion("bathroom-main", 1030).await;

    // Suppressed before any session update: count and anchor unchanged.
    let session = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected an active session"))?;
    assert_eq!(session.motion_count, 1);
    assert_eq!(session.last_motion_at, 1000);
    let sensor = core
        .h
        .state
        .store
        .get_sensor("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("sensor missing"))?;
    assert_eq!(sensor.last_motion_at, Some(1000));

    let events = core.h.state.store.events_for_sensor("bathroom-main", 10).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, MotionEventType::Debounced);
    assert!(core.h.music.calls().await.is_empty(), "no playback traffic");
    Ok(())
}

#[tokio::test]
async fn second_motion_outside_debounce_extends_session() -> anyhow::Result<()> {
    let core = SpecCore::with_standard_fixture().await?;
    core.deliver_motion("bathroom-main", 1000).await;
    let first = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected an active session"))?;
    core.h.music.clear_calls().await;

    core.deliver_motion("bathroom-main", 1150).await;

    let session = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected an active session"))?;
    assert_eq!(session.session_id, first.session_id, "same session extended");
    assert_eq!(session.motion_count, 2);
    assert_eq!(session.last_motion_at, 1150);

    // The mock reports already-playing on D1, so no second start command.
    assert!(core.h.music.start_calls().await.is_empty());

    let events = core.h.state.store.events_for_sensor("bathroom-main", 10).await;
    assert_eq!(events[0].event_type, MotionEventType::Detected);
    assert_eq!(events[0].action_taken, "session-extended");
    Ok(())
}

#[tokio::test]
async fn timeout_closes_session_and_pauses() -> anyhow::Result<()> {
    let core = SpecCore::with_standard_fixture().await?;
    core.deliver_motion("bathroom-main", 1000).await;
    core.deliver_motion("bathroom-main", 1150).await;
    let session = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected an active session"))?;
    core.h.music.clear_calls().await;

    // Clock advances past last motion + timeout.
    let summary = core.reap_at(1451).await;
    assert_eq!(summary.closed, 1);

    let closed = core
        .h
        .state
        .store
        .get_session(&session.session_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("session missing"))?;
    assert_eq!(closed.status, SessionStatus::Completed);
    assert_eq!(closed.end_at, Some(1451));
    assert_eq!(closed.duration_secs, Some(451));

    let pauses = core.h.music.pause_calls().await;
    assert_eq!(pauses, vec![MusicCall::Pause { device_id: "D1".into() }]);

    let events = core.h.state.store.events_for_sensor("bathroom-main", 1).await;
    assert_eq!(events[0].action_taken, "session-closed");
    Ok(())
}

#[tokio::test]
async fn quiet_hours_suppress_across_midnight() -> anyhow::Result<()> {
    let core = SpecCore::with_standard_fixture().await?;
    core.h
        .state
        .store
        .update_sensor("bathroom-main", |sensor| {
            sensor.quiet_hours = Some(motifd::model::QuietHours {
                start: "22:00".into(),
                end: "07:00".into(),
                timezone: "Europe/London".into(),
            });
        })
        .await;

    // 2021-01-15 03:15 local time in London (GMT in January).
    let at_0315_local = 1_610_668_800 + 3 * 3600 + 15 * 60;
    core.deliver_motion("bathroom-main", at_0315_local).await;

    assert!(core.active_session("bathroom-main").await.is_none(), "no session");
    assert!(core.h.music.calls().await.is_empty(), "no playback");

    let events = core.h.state.store.events_for_sensor("bathroom-main", 10).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, MotionEventType::QuietHoursSuppressed);
    Ok(())
}

#[tokio::test]
async fn provision_then_deprovision_round_trip() -> anyhow::Result<()> {
    let core = SpecCore::new()?;

    let bundle = core.provision("bedroom-01", "U").await?;
    assert!(bundle.certificate_pem.contains("BEGIN CERTIFICATE"));
    assert!(bundle.private_key_pem.contains("PRIVATE KEY"));
    assert!(!bundle.broker_endpoint.is_empty());

    // Duplicate provisioning conflicts.
    let conflict = core.provision("bedroom-01", "U").await;
    match conflict {
        Err(e) => assert_eq!(e.kind, motifd::error::ErrorKind::Conflict),
        Ok(_) => anyhow::bail!("expected Conflict"),
    }

    core.deprovision("bedroom-01").await?;

    // Second teardown reports NotFound.
    let missing = core.deprovision("bedroom-01").await;
    match missing {
        Err(e) => assert_eq!(e.kind, motifd::error::ErrorKind::NotFound),
        Ok(_) => anyhow::bail!("expected NotFound"),
    }

    // Post-conditions: no identity, no certificate, no sensor record.
    assert!(!core.h.registry.thing_exists(&bundle.thing_handle).await);
    assert!(!core.h.registry.certificate_exists(&bundle.certificate_handle).await);
    assert!(!core.h.state.store.sensor_exists("bedroom-01").await);
    Ok(())
}

#[tokio::test]
async fn closed_sessions_never_reopen_for_late_motion() -> anyhow::Result<()> {
    let core = SpecCore::with_standard_fixture().await?;
    core.deliver_motion("bathroom-main", 1000).await;
    let first = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected an active session"))?;
    core.reap_at(1000 + 301).await;

    core.deliver_motion("bathroom-main", 2000).await;
    let second = core
        .active_session("bathroom-main")
        .await
        .ok_or_else(|| anyhow::anyhow!("expected a new active session"))?;
    assert_ne!(second.session_id, first.session_id);
    assert_eq!(second.motion_count, 1);

    let reloaded = core
        .h
        .state
        .store
        .get_session(&first.session_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("first session should still exist"))?;
    assert_eq!(reloaded.status, SessionStatus::Completed);
    Ok(())
}
