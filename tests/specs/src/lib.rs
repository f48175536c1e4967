// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end scenario tests.
//!
//! Drives an in-process daemon core through the same path broker traffic
//! takes: raw topic + JSON payload into the ingress router, then the
//! orchestrator, with the reaper ticked at chosen instants. The music
//! service is the recording mock.

use bytes::Bytes;

use motifd::ingress::{self, RawEvent};
use motifd::model::Session;
use motifd::provision::{CredentialBundle, ProvisionRequest};
use motifd::reaper::{self, ReapSummary};
use motifd::test_support::TestHarness;

/// An in-process core plus scenario-level helpers.
pub struct SpecCore {
    pub h: TestHarness,
}

impl SpecCore {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { h: TestHarness::new()? })
    }

    /// Wire up the standard fixture: connected user `U`, enabled sensor
    /// `bathroom-main` (debounce 120 s, timeout 300 s, target `D1`,
    /// context `playlist:P`).
    pub async fn with_standard_fixture() -> anyhow::Result<Self> {
        let core = Self::new()?;
        core.h.connect_user("U", u64::MAX / 2).await?;
        core.h.add_sensor("bathroom-main", "U").await;
        Ok(core)
    }

    /// Deliver a motion publish the way the broker would.
    pub async fn deliver_motion(&self, sensor_id: &str, at: u64) {
        let payload = serde_json::json!({
            "event": "motion_detected",
            "sensorId": sensor_id,
            "timestamp": at,
            "metadata": { "batteryLevel": 80 }
        });
        ingress::handle_event(
            &self.h.state,
            RawEvent {
                topic: format!("sensors/{sensor_id}/motion"),
                payload: Bytes::from(payload.to_string()),
                broker_timestamp: at,
            },
        )
        .await;
    }

    /// Run one reaper pass at `now`.
    pub async fn reap_at(&self, now: u64) -> ReapSummary {
        reaper::run_tick(&self.h.state, now).await
    }

    pub async fn active_session(&self, sensor_id: &str) -> Option<Session> {
        self.h.state.store.active_session(sensor_id).await
    }

    pub async fn provision(
        &self,
        sensor_id: &str,
        user_id: &str,
    ) -> Result<CredentialBundle, motifd::error::CoreError> {
        motifd::provision::provision(
            &self.h.state,
            ProvisionRequest {
                sensor_id: sensor_id.to_owned(),
                user_id: user_id.to_owned(),
                location_label: None,
                playback_target_id: "D1".to_owned(),
                playback_context_ref: "playlist:P".to_owned(),
                motion_debounce_secs: None,
                inactivity_timeout_secs: None,
                quiet_hours: None,
            },
        )
        .await
    }

    pub async fn deprovision(&self, sensor_id: &str) -> Result<(), motifd::error::CoreError> {
        motifd::provision::deprovision(&self.h.state, sensor_id).await
    }
}
