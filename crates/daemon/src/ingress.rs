// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingress router: validates decoded broker events and dispatches them.
//!
//! Topics follow `sensors/{sensorId}/{motion|register|status}`. The sensor id
//! is taken from the topic; a payload that carries a different id is a
//! validation failure, never trusted. Malformed input is dropped with a
//! counter and the handler never crashes on hostile payloads.

use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;

use crate::model::{MotionMetadata, SensorHealth};
use crate::orchestrator;
use crate::state::{bump, AppState};

/// A decoded event as delivered by the broker transport.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub topic: String,
    pub payload: Bytes,
    /// Broker receive time, epoch seconds. Fallback when the device clock
    /// produced garbage.
    pub broker_timestamp: u64,
}

/// Tagged sum of everything a device can publish.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    MotionDetected { sensor_id: String, occurred_at: u64, metadata: MotionMetadata },
    Registration { sensor_id: String, payload: serde_json::Value },
    StatusReport { sensor_id: String, health: SensorHealth },
}

/// Why an event was dropped instead of dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    UnknownTopic,
    Malformed(String),
    /// Payload sensor id disagrees with the topic segment.
    TopicMismatch,
    UnknownEventType(String),
}

/// Timestamps arrive as epoch seconds or ISO-8601 strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimestampValue {
    Seconds(i64),
    Text(String),
}

impl TimestampValue {
    fn to_epoch(&self) -> Option<u64> {
        match self {
            Self::Seconds(s) if *s >= 0 => Some(*s as u64),
            Self::Seconds(_) => None,
            Self::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp().max(0) as u64),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MotionPayload {
    event: String,
    #[serde(rename = "sensorId")]
    sensor_id: String,
    #[serde(default)]
    timestamp: Option<TimestampValue>,
    #[serde(default)]
    metadata: MotionMetadataJson,
}

#[derive(Debug, Default, Deserialize)]
struct MotionMetadataJson {
    #[serde(rename = "batteryLevel")]
    battery_level: Option<u8>,
    #[serde(rename = "signalStrength")]
    signal_strength: Option<i32>,
    #[serde(rename = "firmwareVersion")]
    firmware_version: Option<String>,
    uptime: Option<u64>,
    #[serde(rename = "freeHeap")]
    free_heap: Option<u64>,
}

impl From<MotionMetadataJson> for MotionMetadata {
    fn from(json: MotionMetadataJson) -> Self {
        Self {
            battery_level: json.battery_level,
            signal_strength: json.signal_strength,
            firmware_version: json.firmware_version,
            uptime: json.uptime,
            free_heap: json.free_heap,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
    #[serde(default)]
    timestamp: Option<TimestampValue>,
    #[serde(rename = "batteryLevel")]
    battery_level: Option<u8>,
    #[serde(rename = "ipAddress")]
    ip_address: Option<String>,
    #[serde(default)]
    uptime: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    #[serde(rename = "sensorId", default)]
    sensor_id: Option<String>,
}

/// Decode a raw broker event into a [`DeviceEvent`].
pub fn decode_event(raw: &RawEvent) -> Result<DeviceEvent, DropReason> {
    let (sensor_id, kind) = parse_topic(&raw.topic).ok_or(DropReason::UnknownTopic)?;

    match kind {
        "motion" => {
            let payload: MotionPayload = serde_json::from_slice(&raw.payload)
                .map_err(|e| DropReason::Malformed(e.to_string()))?;
            if payload.event != "motion_detected" {
                return Err(DropReason::UnknownEventType(payload.event));
            }
            if payload.sensor_id != sensor_id {
                return Err(DropReason::TopicMismatch);
            }
            // Re-derive from broker time when the device clock is garbage.
            let occurred_at = payload
                .timestamp
                .as_ref()
                .and_then(TimestampValue::to_epoch)
                .unwrap_or(raw.broker_timestamp);
            Ok(DeviceEvent::MotionDetected {
                sensor_id: sensor_id.to_owned(),
                occurred_at,
                metadata: payload.metadata.into(),
            })
        }
        "register" => {
            let payload: RegisterPayload = serde_json::from_slice(&raw.payload)
                .map_err(|e| DropReason::Malformed(e.to_string()))?;
            if payload.sensor_id.as_deref().is_some_and(|id| id != sensor_id) {
                return Err(DropReason::TopicMismatch);
            }
            let value: serde_json::Value =
                serde_json::from_slice(&raw.payload).unwrap_or(serde_json::Value::Null);
            Ok(DeviceEvent::Registration { sensor_id: sensor_id.to_owned(), payload: value })
        }
        "status" => {
            let payload: StatusPayload = serde_json::from_slice(&raw.payload)
                .map_err(|e| DropReason::Malformed(e.to_string()))?;
            let reported_at = payload
                .timestamp
                .as_ref()
                .and_then(TimestampValue::to_epoch)
                .unwrap_or(raw.broker_timestamp);
            Ok(DeviceEvent::StatusReport {
                sensor_id: sensor_id.to_owned(),
                health: SensorHealth {
                    status: payload.status,
                    battery_level: payload.battery_level,
                    ip_address: payload.ip_address,
                    uptime_secs: payload.uptime,
                    reported_at,
                },
            })
        }
        _ => Err(DropReason::UnknownTopic),
    }
}

/// Split `sensors/{id}/{leaf}` into its parts.
fn parse_topic(topic: &str) -> Option<(&str, &str)> {
    let mut parts = topic.splitn(3, '/');
    if parts.next()? != "sensors" {
        return None;
    }
    let sensor_id = parts.next()?;
    let leaf = parts.next()?;
    if sensor_id.is_empty() || leaf.contains('/') {
        return None;
    }
    Some((sensor_id, leaf))
}

/// Decode and dispatch one broker event. Never fails: all error paths drop
/// with a counter and a warn-level log line.
pub async fn handle_event(state: &Arc<AppState>, raw: RawEvent) {
    let event = match decode_event(&raw) {
        Ok(event) => event,
        Err(reason) => {
            let counter = match &reason {
                DropReason::UnknownTopic => &state.counters.dropped_unknown_type,
                DropReason::Malformed(_) => &state.counters.dropped_malformed,
                DropReason::TopicMismatch => &state.counters.dropped_topic_mismatch,
                DropReason::UnknownEventType(_) => &state.counters.dropped_unknown_type,
            };
            bump(counter);
            tracing::warn!(topic = %raw.topic, reason = ?reason, "dropping broker event");
            return;
        }
    };

    match event {
        DeviceEvent::MotionDetected { sensor_id, occurred_at, metadata } => {
            bump(&state.counters.motion_received);
            let handled = tokio::time::timeout(
                state.config.handler_deadline(),
                orchestrator::handle_motion(state, &sensor_id, occurred_at, metadata),
            )
            .await
            .unwrap_or_else(|_| {
                Err(crate::error::CoreError::transient("motion handler deadline exceeded"))
            });
            match handled {
                Ok(outcome) => {
                    tracing::debug!(
                        sensor_id = %sensor_id,
                        occurred_at,
                        event_type = outcome.event_type.as_str(),
                        action = %outcome.action,
                        "motion handled"
                    );
                }
                Err(err) if err.kind == crate::error::ErrorKind::NotFound => {
                    bump(&state.counters.dropped_unknown_sensor);
                    tracing::warn!(sensor_id = %sensor_id, err = %err, "motion for unknown sensor dropped");
                }
                Err(err) => {
                    tracing::error!(sensor_id = %sensor_id, err = %err, "motion handling failed");
                }
            }
        }
        DeviceEvent::Registration { sensor_id, payload } => {
            bump(&state.counters.registration_received);
            // Announces are recorded, never authoritative: provisioning (C5)
            // is the only path that creates sensors.
            orchestrator::record_registration(state, &sensor_id, payload, raw.broker_timestamp)
                .await;
        }
        DeviceEvent::StatusReport { sensor_id, health } => {
            bump(&state.counters.status_received);
            let updated = state
                .store
                .update_sensor(&sensor_id, |sensor| sensor.health = Some(health.clone()))
                .await;
            if updated.is_none() {
                bump(&state.counters.dropped_unknown_sensor);
                tracing::debug!(sensor_id = %sensor_id, "status report for unknown sensor");
            }
        }
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
