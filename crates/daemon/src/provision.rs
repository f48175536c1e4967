// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device provisioner: binds a physical sensor to a broker identity, a
//! client certificate, a topic-scoped policy, and a registry record.
//!
//! Provisioning is a linear script that records an undo step after each
//! side effect; on failure the steps run in reverse, best-effort. The Sensor
//! record is written last, so its presence is the authoritative signal of a
//! completed provision. The private key is returned exactly once and is
//! never read back from anywhere.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::{is_valid_sensor_id, QuietHours, Sensor, SensorStatus, User};
use crate::registry::{DeviceRegistry, PolicyDoc};
use crate::state::AppState;

/// Provisioning input. Timing fields fall back to the owner's preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub sensor_id: String,
    pub user_id: String,
    #[serde(default)]
    pub location_label: Option<String>,
    pub playback_target_id: String,
    pub playback_context_ref: String,
    #[serde(default)]
    pub motion_debounce_secs: Option<u64>,
    #[serde(default)]
    pub inactivity_timeout_secs: Option<u64>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
}

/// Topic strings echoed back to the installer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttTopics {
    pub motion: String,
    pub status: String,
    pub register: String,
    pub config: String,
    pub commands: String,
}

impl MqttTopics {
    pub fn for_sensor(sensor_id: &str) -> Self {
        Self {
            motion: format!("sensors/{sensor_id}/motion"),
            status: format!("sensors/{sensor_id}/status"),
            register: format!("sensors/{sensor_id}/register"),
            config: format!("sensors/{sensor_id}/config"),
            commands: format!("sensors/{sensor_id}/commands"),
        }
    }
}

/// One-time provisioning result. `private_key_pem` exists only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub sensor_id: String,
    pub thing_handle: String,
    pub certificate_handle: String,
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub broker_endpoint: String,
    pub policy_name: String,
    pub region: String,
    pub mqtt_topics: MqttTopics,
    pub warning: String,
}

const KEY_WARNING: &str = "STORE THE PRIVATE KEY NOW. It is returned exactly once and cannot \
     be recovered; losing it means deprovisioning and reprovisioning the device.";

/// Undo steps recorded as provisioning progresses, executed in reverse on
/// failure.
enum UndoStep {
    DetachPolicy { cert: String },
    DetachCertificate { thing: String, cert: String },
    RemoveCertificate { cert: String },
    RemoveThing { thing: String },
}

/// Provision a device end to end.
pub async fn provision(
    state: &Arc<AppState>,
    req: ProvisionRequest,
) -> CoreResult<CredentialBundle> {
    // 1. Validate the identity name against broker naming constraints.
    if !is_valid_sensor_id(&req.sensor_id) {
        return Err(CoreError::validation(format!(
            "sensor id must match [A-Za-z0-9_-]{{3,128}}: {:?}",
            req.sensor_id
        )));
    }
    if req.playback_target_id.is_empty() || req.playback_context_ref.is_empty() {
        return Err(CoreError::validation("playback target and context are required"));
    }

    // 2. The id space is global: any existing record is a conflict.
    if state.store.sensor_exists(&req.sensor_id).await {
        return Err(CoreError::conflict(format!("sensor already exists: {}", req.sensor_id)));
    }

    // Resolve the owner, creating a stub on first contact.
    let user = match state.store.get_user(&req.user_id).await {
        Some(user) => user,
        None => {
            let user = User::new(&req.user_id);
            state.store.put_user(user.clone()).await;
            user
        }
    };

    let mut undo: Vec<UndoStep> = Vec::new();
    let result = run_script(state, &req, &user, &mut undo).await;
    match result {
        Ok(bundle) => Ok(bundle),
        Err(err) => {
            unwind(state.registry.as_ref(), undo).await;
            Err(err)
        }
    }
}

async fn run_script(
    state: &Arc<AppState>,
    req: &ProvisionRequest,
    user: &User,
    undo: &mut Vec<UndoStep>,
) -> CoreResult<CredentialBundle> {
    let registry = state.registry.as_ref();

    // 3. Broker identity.
    let thing_handle = registry.create_thing(&req.sensor_id).await?;
    undo.push(UndoStep::RemoveThing { thing: thing_handle.clone() });

    // 4. Key pair + certificate. The key lives in `issued` only.
    let issued = registry.mint_certificate(&thing_handle).await?;
    undo.push(UndoStep::RemoveCertificate { cert: issued.certificate_handle.clone() });

    // 5. Certificate becomes a principal of the identity.
    registry.attach_certificate(&thing_handle, &issued.certificate_handle).await?;
    undo.push(UndoStep::DetachCertificate {
        thing: thing_handle.clone(),
        cert: issued.certificate_handle.clone(),
    });

    // 6. Topic-scoped authorization.
    let policy = PolicyDoc::for_sensor(&req.sensor_id);
    let policy_name = policy.policy_name.clone();
    registry.attach_policy(&issued.certificate_handle, policy).await?;
    undo.push(UndoStep::DetachPolicy { cert: issued.certificate_handle.clone() });

    // 7. Registry record, written last.
    let sensor = Sensor {
        sensor_id: req.sensor_id.clone(),
        user_id: req.user_id.clone(),
        enabled: true,
        motion_debounce_secs: req
            .motion_debounce_secs
            .unwrap_or(user.preferences.default_debounce_secs),
        inactivity_timeout_secs: req
            .inactivity_timeout_secs
            .unwrap_or(user.preferences.default_timeout_secs),
        quiet_hours: req.quiet_hours.clone(),
        playback_target_id: req.playback_target_id.clone(),
        playback_context_ref: req.playback_context_ref.clone(),
        last_motion_at: None,
        status: SensorStatus::Registered,
        thing_handle: Some(thing_handle.clone()),
        certificate_handle: Some(issued.certificate_handle.clone()),
        location_label: req.location_label.clone(),
        health: None,
    };
    state.store.create_sensor_if_absent(sensor).await?;

    // 8. One-time credential bundle.
    Ok(CredentialBundle {
        sensor_id: req.sensor_id.clone(),
        thing_handle,
        certificate_handle: issued.certificate_handle,
        certificate_pem: issued.certificate_pem,
        private_key_pem: issued.private_key_pem,
        broker_endpoint: state.config.broker_endpoint.clone(),
        policy_name,
        region: state.config.region.clone(),
        mqtt_topics: MqttTopics::for_sensor(&req.sensor_id),
        warning: KEY_WARNING.to_owned(),
    })
}

/// Walk the undo list in reverse, best-effort.
async fn unwind(registry: &dyn DeviceRegistry, undo: Vec<UndoStep>) {
    for step in undo.into_iter().rev() {
        let result = match &step {
            UndoStep::DetachPolicy { cert } => registry.detach_policy(cert).await,
            UndoStep::DetachCertificate { thing, cert } => {
                registry.detach_certificate(thing, cert).await
            }
            UndoStep::RemoveCertificate { cert } => {
                let deactivated = registry.deactivate_certificate(cert).await;
                match deactivated {
                    Ok(()) => registry.delete_certificate(cert).await,
                    err => err,
                }
            }
            UndoStep::RemoveThing { thing } => registry.delete_thing(thing).await,
        };
        if let Err(err) = result {
            tracing::warn!(err = %err, "provisioning compensation step failed");
        }
    }
}

/// Tear down a provisioned device. Idempotent: a second call reports
/// `NotFound` once the sensor record is gone, and a partial prior teardown
/// is completed rather than repeated.
pub async fn deprovision(state: &Arc<AppState>, sensor_id: &str) -> CoreResult<()> {
    let registry = state.registry.as_ref();

    // 1. The sensor record is the authoritative provisioning marker.
    let sensor = state
        .store
        .get_sensor(sensor_id)
        .await
        .ok_or_else(|| CoreError::not_found(format!("no such sensor: {sensor_id}")))?;

    // 2. All principals of the identity, plus the recorded certificate in
    //    case an earlier partial teardown already dropped the identity.
    let mut certs: Vec<String> = Vec::new();
    if let Some(ref thing_handle) = sensor.thing_handle {
        certs = registry.list_principals(thing_handle).await.unwrap_or_default();
    }
    if let Some(ref cert) = sensor.certificate_handle {
        if !certs.contains(cert) {
            certs.push(cert.clone());
        }
    }

    // 3. Certificates: detach policy, detach from identity, deactivate,
    //    delete. Every step tolerates "already gone".
    for cert in &certs {
        log_cleanup(registry.detach_policy(cert).await, "detach policy");
        if let Some(ref thing_handle) = sensor.thing_handle {
            log_cleanup(
                registry.detach_certificate(thing_handle, cert).await,
                "detach certificate",
            );
        }
        log_cleanup(registry.deactivate_certificate(cert).await, "deactivate certificate");
        log_cleanup(registry.delete_certificate(cert).await, "delete certificate");
    }

    // 4. Identity.
    if let Some(ref thing_handle) = sensor.thing_handle {
        log_cleanup(registry.delete_thing(thing_handle).await, "delete thing");
    }

    // 5. Registry record last.
    state.store.delete_sensor(sensor_id).await;
    tracing::info!(sensor_id, certificates = certs.len(), "device deprovisioned");
    Ok(())
}

fn log_cleanup(result: CoreResult<()>, step: &str) {
    if let Err(err) = result {
        tracing::warn!(err = %err, step, "deprovision step failed; continuing");
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
