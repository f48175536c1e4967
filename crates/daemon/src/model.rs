// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core records: sensors, users, sessions, and the motion audit log.

use std::sync::OnceLock;

use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Retention horizon for sessions and motion events (30 days from start).
pub const RECORD_TTL_SECS: u64 = 30 * 24 * 3600;

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn sensor_id_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{3,128}$").ok()).as_ref()
}

/// Whether `id` satisfies the broker-side identity naming constraints
/// (no whitespace, nothing that would need URL encoding).
pub fn is_valid_sensor_id(id: &str) -> bool {
    sensor_id_pattern().is_some_and(|re| re.is_match(id))
}

// -- Sensor -------------------------------------------------------------------

/// Daily recurring suppression window in the sensor's local time.
///
/// `start`/`end` are `HH:MM` wall-clock strings; `timezone` is an IANA name
/// (UTC offsets would drift across DST).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Registered,
    Active,
    Disabled,
    Error,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Error => "error",
        }
    }
}

/// Most recent device-reported health, from the status topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
    pub reported_at: u64,
}

/// A provisioned motion sensor bound to a broker identity and a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub sensor_id: String,
    pub user_id: String,
    pub enabled: bool,
    pub motion_debounce_secs: u64,
    pub inactivity_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
    pub playback_target_id: String,
    /// Opaque context reference (playlist, album, ...) started on motion.
    pub playback_context_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_motion_at: Option<u64>,
    pub status: SensorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thing_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<SensorHealth>,
}

// -- User ---------------------------------------------------------------------

/// Per-user defaults applied when a sensor omits its own configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub default_debounce_secs: u64,
    pub default_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_quiet_hours: Option<QuietHours>,
    pub notify_on_low_battery: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_debounce_secs: 120,
            default_timeout_secs: 300,
            default_quiet_hours: None,
            notify_on_low_battery: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub music_connected: bool,
    /// Opaque pointer into the secret vault. Non-empty iff `music_connected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ref: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_handle: Option<String>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            music_connected: false,
            token_ref: None,
            preferences: Preferences::default(),
            contact_handle: None,
        }
    }
}

// -- Session ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// A time-bounded interval of sensor activity.
///
/// Invariants: at most one active session per sensor; `end_at >=
/// last_motion_at >= start_at`; `motion_count` never decreases while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub sensor_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub start_at: u64,
    pub last_motion_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<u64>,
    pub motion_count: u32,
    pub playback_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// TTL attribute: the row is purged once this instant passes.
    pub expires_at: u64,
}

impl Session {
    /// Open a fresh active session for a sensor at `start_at`.
    pub fn open(sensor_id: &str, user_id: &str, start_at: u64) -> Self {
        Self {
            session_id: new_session_id(sensor_id, start_at),
            sensor_id: sensor_id.to_owned(),
            user_id: user_id.to_owned(),
            status: SessionStatus::Active,
            start_at,
            last_motion_at: start_at,
            end_at: None,
            motion_count: 1,
            playback_started: false,
            duration_secs: None,
            expires_at: start_at + RECORD_TTL_SECS,
        }
    }
}

/// Session ids embed the sensor and start instant plus a random suffix, so
/// collisions across rapid reopen cycles are impossible to construct.
pub fn new_session_id(sensor_id: &str, start_at: u64) -> String {
    let suffix: String =
        rand::rng().sample_iter(Alphanumeric).take(6).map(char::from).collect();
    format!("{sensor_id}-{start_at}-{suffix}")
}

// -- Motion audit log ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionEventType {
    Detected,
    Debounced,
    QuietHoursSuppressed,
    DisabledSuppressed,
    /// Reaper-written row marking the end of a session.
    SessionClosed,
}

impl MotionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Debounced => "debounced",
            Self::QuietHoursSuppressed => "quiet-hours-suppressed",
            Self::DisabledSuppressed => "disabled-suppressed",
            Self::SessionClosed => "session-closed",
        }
    }
}

/// Short action tags recorded on audit rows.
pub mod action {
    pub const SESSION_OPENED: &str = "session-opened";
    pub const SESSION_EXTENDED: &str = "session-extended";
    pub const SESSION_CLOSED: &str = "session-closed";
    pub const SUPPRESSED: &str = "suppressed";
}

/// Device-reported extras carried on a motion event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_heap: Option<u64>,
}

/// Append-only audit row: one per motion event delivered to the orchestrator,
/// whatever the admission outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionEvent {
    pub event_id: String,
    pub sensor_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub occurred_at: u64,
    pub event_type: MotionEventType,
    pub action_taken: String,
    #[serde(default)]
    pub metadata: MotionMetadata,
    pub expires_at: u64,
}

impl MotionEvent {
    pub fn record(
        sensor_id: &str,
        user_id: &str,
        occurred_at: u64,
        event_type: MotionEventType,
        action_taken: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            sensor_id: sensor_id.to_owned(),
            user_id: user_id.to_owned(),
            session_id: None,
            occurred_at,
            event_type,
            action_taken: action_taken.to_owned(),
            metadata: MotionMetadata::default(),
            expires_at: occurred_at + RECORD_TTL_SECS,
        }
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_owned());
        self
    }

    pub fn with_metadata(mut self, metadata: MotionMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
