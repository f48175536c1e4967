// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum_test::TestServer;

use crate::mqtt::Outbound;
use crate::test_support::{test_config, TestHarness};
use crate::transport::build_router;

fn server(h: &TestHarness) -> anyhow::Result<TestServer> {
    TestServer::new(build_router(h.state.clone())).map_err(|e| anyhow::anyhow!("{e}"))
}

fn provision_body(sensor_id: &str) -> serde_json::Value {
    serde_json::json!({
        "sensor_id": sensor_id,
        "user_id": "u-1",
        "playback_target_id": "D1",
        "playback_context_ref": "playlist:P"
    })
}

#[tokio::test]
async fn health_is_open_and_reports_counters() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let server = server(&h)?;

    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["active_sessions"], 0);
    assert_eq!(body["counters"]["motion_received"], 0);
    Ok(())
}

#[tokio::test]
async fn auth_guards_everything_but_health() -> anyhow::Result<()> {
    let mut config = test_config();
    config.auth_token = Some("sekrit".into());
    let h = TestHarness::with_config(config)?;
    let server = server(&h)?;

    server.get("/api/v1/health").await.assert_status_ok();
    let denied = server.get("/api/v1/sensors").await;
    assert_eq!(denied.status_code(), 401);

    let allowed =
        server.get("/api/v1/sensors").authorization_bearer("sekrit").await;
    allowed.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn provision_then_conflict_then_deprovision() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let server = server(&h)?;

    let created = server.post("/api/v1/devices").json(&provision_body("bedroom-01")).await;
    assert_eq!(created.status_code(), 201);
    let bundle: serde_json::Value = created.json();
    assert!(bundle["certificate_pem"].as_str().is_some_and(|s| s.contains("BEGIN CERTIFICATE")));
    assert!(bundle["private_key_pem"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(bundle["mqtt_topics"]["motion"], "sensors/bedroom-01/motion");

    let conflict = server.post("/api/v1/devices").json(&provision_body("bedroom-01")).await;
    assert_eq!(conflict.status_code(), 409);
    let err: serde_json::Value = conflict.json();
    assert_eq!(err["error"]["code"], "CONFLICT");

    let removed = server.delete("/api/v1/devices/bedroom-01").await;
    removed.assert_status_ok();
    let again = server.delete("/api/v1/devices/bedroom-01").await;
    assert_eq!(again.status_code(), 404);
    Ok(())
}

#[tokio::test]
async fn invalid_provision_request_is_400() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let server = server(&h)?;

    let resp = server.post("/api/v1/devices").json(&provision_body("bad id!")).await;
    assert_eq!(resp.status_code(), 400);
    let err: serde_json::Value = resp.json();
    assert_eq!(err["error"]["code"], "VALIDATION");
    Ok(())
}

#[tokio::test]
async fn config_patch_updates_store_and_pushes_to_device() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.add_sensor("bedroom-01", "u-1").await;
    let server = server(&h)?;

    let resp = server
        .patch("/api/v1/sensors/bedroom-01/config")
        .json(&serde_json::json!({ "enabled": false, "motion_debounce_secs": 60 }))
        .await;
    resp.assert_status_ok();

    let sensor = h
        .state
        .store
        .get_sensor("bedroom-01")
        .await
        .ok_or_else(|| anyhow::anyhow!("sensor missing"))?;
    assert!(!sensor.enabled);
    assert_eq!(sensor.motion_debounce_secs, 60);

    let outbound = h.outbound_rx.lock().await.try_recv();
    match outbound {
        Ok(Outbound::Config { sensor_id, payload }) => {
            assert_eq!(sensor_id, "bedroom-01");
            assert_eq!(payload["enabled"], false);
            assert_eq!(payload["motionDebounceSeconds"], 60);
        }
        other => anyhow::bail!("expected outbound config, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn config_patch_rejects_bad_quiet_hours() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.add_sensor("bedroom-01", "u-1").await;
    let server = server(&h)?;

    let resp = server
        .patch("/api/v1/sensors/bedroom-01/config")
        .json(&serde_json::json!({
            "quiet_hours": { "start": "25:00", "end": "07:00", "timezone": "Europe/London" }
        }))
        .await;
    assert_eq!(resp.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn device_commands_are_validated_and_published() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.add_sensor("bedroom-01", "u-1").await;
    let server = server(&h)?;

    let bad = server
        .post("/api/v1/sensors/bedroom-01/commands")
        .json(&serde_json::json!({ "command": "self_destruct" }))
        .await;
    assert_eq!(bad.status_code(), 400);

    let missing = server
        .post("/api/v1/sensors/ghost/commands")
        .json(&serde_json::json!({ "command": "restart" }))
        .await;
    assert_eq!(missing.status_code(), 404);

    let ok = server
        .post("/api/v1/sensors/bedroom-01/commands")
        .json(&serde_json::json!({ "command": "restart" }))
        .await;
    ok.assert_status_ok();

    let outbound = h.outbound_rx.lock().await.try_recv();
    match outbound {
        Ok(Outbound::Command { sensor_id, payload }) => {
            assert_eq!(sensor_id, "bedroom-01");
            assert_eq!(payload["command"], "restart");
        }
        other => anyhow::bail!("expected outbound command, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn music_connect_and_disconnect() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let server = server(&h)?;

    let resp = server
        .post("/api/v1/users/u-1/music")
        .json(&serde_json::json!({ "refresh_token": "refresh-xyz" }))
        .await;
    resp.assert_status_ok();
    let user: serde_json::Value = resp.json();
    assert_eq!(user["music_connected"], true);

    let token_ref = user["token_ref"].as_str().map(str::to_owned);
    let token_ref = token_ref.ok_or_else(|| anyhow::anyhow!("token_ref missing"))?;
    let record = h
        .state
        .vault
        .get(&token_ref)
        .await
        .ok_or_else(|| anyhow::anyhow!("secret missing"))?;
    assert_eq!(record.refresh_token, "refresh-xyz");

    let resp = server.delete("/api/v1/users/u-1/music").await;
    resp.assert_status_ok();
    let user: serde_json::Value = resp.json();
    assert_eq!(user["music_connected"], false);
    assert!(h.state.vault.get(&token_ref).await.is_none(), "secret deleted");
    Ok(())
}

#[tokio::test]
async fn empty_refresh_token_is_rejected() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    let server = server(&h)?;

    let resp = server
        .post("/api/v1/users/u-1/music")
        .json(&serde_json::json!({ "refresh_token": "" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn sessions_and_events_are_exposed() -> anyhow::Result<()> {
    let h = TestHarness::new()?;
    h.connect_user("u-1", u64::MAX / 2).await?;
    h.add_sensor("bedroom-01", "u-1").await;
    crate::orchestrator::handle_motion(
        &h.state,
        "bedroom-01",
        1_700_000_000,
        crate::model::MotionMetadata::default(),
    )
    .await?;
    let server = server(&h)?;

    let sessions: serde_json::Value = server.get("/api/v1/sessions").await.json();
    let list = sessions.as_array().ok_or_else(|| anyhow::anyhow!("expected array"))?;
    assert_eq!(list.len(), 1);
    let session_id =
        list[0]["session_id"].as_str().ok_or_else(|| anyhow::anyhow!("no session id"))?;

    let one = server.get(&format!("/api/v1/sessions/{session_id}")).await;
    one.assert_status_ok();

    let events: serde_json::Value =
        server.get("/api/v1/sensors/bedroom-01/events").await.json();
    let rows = events.as_array().ok_or_else(|| anyhow::anyhow!("expected array"))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["event_type"], "detected");
    Ok(())
}
