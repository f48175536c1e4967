// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain = { "bathroom-main", true },
    underscores = { "bedroom_01", true },
    minimum_len = { "abc", true },
    digits = { "s01", true },
    too_short = { "ab", false },
    whitespace = { "bath room", false },
    dot = { "sensor.1", false },
    slash = { "a/b/c", false },
    empty = { "", false },
    unicode = { "café-sensor", false },
)]
fn sensor_id_shape(id: &str, ok: bool) {
    assert_eq!(is_valid_sensor_id(id), ok);
}

#[test]
fn sensor_id_length_cap() {
    let max = "x".repeat(128);
    let over = "x".repeat(129);
    assert!(is_valid_sensor_id(&max));
    assert!(!is_valid_sensor_id(&over));
}

#[test]
fn open_session_starts_with_one_motion() {
    let session = Session::open("bathroom-main", "u-1", 1000);
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.start_at, 1000);
    assert_eq!(session.last_motion_at, 1000);
    assert_eq!(session.motion_count, 1);
    assert!(!session.playback_started);
    assert!(session.end_at.is_none());
    assert_eq!(session.expires_at, 1000 + RECORD_TTL_SECS);
}

#[test]
fn session_ids_embed_sensor_and_start_and_differ() {
    let a = new_session_id("bathroom-main", 1000);
    let b = new_session_id("bathroom-main", 1000);
    assert!(a.starts_with("bathroom-main-1000-"));
    assert!(b.starts_with("bathroom-main-1000-"));
    assert_ne!(a, b, "random suffix should differ");
}

#[test]
fn motion_event_types_use_kebab_tags() -> anyhow::Result<()> {
    let json = serde_json::to_value(MotionEventType::QuietHoursSuppressed)?;
    assert_eq!(json, "quiet-hours-suppressed");
    let json = serde_json::to_value(MotionEventType::DisabledSuppressed)?;
    assert_eq!(json, "disabled-suppressed");
    let back: MotionEventType = serde_json::from_value(serde_json::json!("debounced"))?;
    assert_eq!(back, MotionEventType::Debounced);
    Ok(())
}

#[test]
fn event_type_as_str_matches_serde() -> anyhow::Result<()> {
    for ty in [
        MotionEventType::Detected,
        MotionEventType::Debounced,
        MotionEventType::QuietHoursSuppressed,
        MotionEventType::DisabledSuppressed,
        MotionEventType::SessionClosed,
    ] {
        let json = serde_json::to_value(ty)?;
        assert_eq!(json, ty.as_str());
    }
    Ok(())
}

#[test]
fn motion_event_record_sets_ttl_and_id() {
    let ev = MotionEvent::record("s-1", "u-1", 5000, MotionEventType::Detected, action::SESSION_OPENED)
        .with_session("s-1-5000-abc123");
    assert_eq!(ev.expires_at, 5000 + RECORD_TTL_SECS);
    assert_eq!(ev.session_id.as_deref(), Some("s-1-5000-abc123"));
    assert!(!ev.event_id.is_empty());
}

#[test]
fn sensor_roundtrips_through_json() -> anyhow::Result<()> {
    let sensor = Sensor {
        sensor_id: "bathroom-main".into(),
        user_id: "u-1".into(),
        enabled: true,
        motion_debounce_secs: 120,
        inactivity_timeout_secs: 300,
        quiet_hours: Some(QuietHours {
            start: "22:00".into(),
            end: "07:00".into(),
            timezone: "Europe/London".into(),
        }),
        playback_target_id: "D1".into(),
        playback_context_ref: "playlist:P".into(),
        last_motion_at: Some(1000),
        status: SensorStatus::Registered,
        thing_handle: Some("thing-1".into()),
        certificate_handle: Some("cert-1".into()),
        location_label: None,
        health: None,
    };
    let json = serde_json::to_string(&sensor)?;
    let back: Sensor = serde_json::from_str(&json)?;
    assert_eq!(back.sensor_id, "bathroom-main");
    assert_eq!(back.quiet_hours, sensor.quiet_hours);
    assert_eq!(back.status, SensorStatus::Registered);
    Ok(())
}

#[test]
fn user_defaults_are_disconnected() {
    let user = User::new("u-1");
    assert!(!user.music_connected);
    assert!(user.token_ref.is_none());
    assert_eq!(user.preferences.default_debounce_secs, 120);
    assert_eq!(user.preferences.default_timeout_secs, 300);
}
