// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conditional-write data store for sensors, users, sessions, and the audit
//! log.
//!
//! Every update path that could race goes through a compare-and-set style
//! operation under one write lock: session opening is create-if-absent with
//! adoption on conflict, motion recording is a conditional increment, session
//! close is a conditional `active -> completed` transition, and sensor
//! `last_motion_at` merges with `max` rather than overwriting. The active
//! session per sensor is tracked in a dedicated index, which is the
//! uniqueness witness the session invariants rest on.

pub mod persist;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::model::{MotionEvent, Sensor, Session, SessionStatus, User};

/// A per-user token-refresh lease. Held by at most one warden tick at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub user_id: String,
    pub lease_id: String,
    pub lease_until: u64,
}

/// Outcome of a conditional session open.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// No active session existed; the given one was created.
    Opened(Session),
    /// An active session already existed and was adopted instead.
    Adopted(Session),
}

impl OpenOutcome {
    pub fn session(&self) -> &Session {
        match self {
            Self::Opened(s) | Self::Adopted(s) => s,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    sensors: HashMap<String, Sensor>,
    users: HashMap<String, User>,
    sessions: HashMap<String, Session>,
    /// `sensor_id -> session_id` for sessions with status `active`.
    active_index: HashMap<String, String>,
    events: Vec<MotionEvent>,
    leases: HashMap<String, Lease>,
}

/// In-process store with the conditional-write API the orchestration core
/// requires. Persisted via [`persist`] snapshots.
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Sensors --------------------------------------------------------------

    pub async fn get_sensor(&self, sensor_id: &str) -> Option<Sensor> {
        self.tables.read().await.sensors.get(sensor_id).cloned()
    }

    pub async fn sensor_exists(&self, sensor_id: &str) -> bool {
        self.tables.read().await.sensors.contains_key(sensor_id)
    }

    /// Unconditional upsert; used for config updates through the admin API.
    pub async fn put_sensor(&self, sensor: Sensor) {
        self.tables.write().await.sensors.insert(sensor.sensor_id.clone(), sensor);
    }

    /// Create only if no sensor with this id exists anywhere (the id space is
    /// global, not per user).
    pub async fn create_sensor_if_absent(&self, sensor: Sensor) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.sensors.contains_key(&sensor.sensor_id) {
            return Err(CoreError::conflict(format!(
                "sensor already exists: {}",
                sensor.sensor_id
            )));
        }
        tables.sensors.insert(sensor.sensor_id.clone(), sensor);
        Ok(())
    }

    pub async fn delete_sensor(&self, sensor_id: &str) -> bool {
        self.tables.write().await.sensors.remove(sensor_id).is_some()
    }

    pub async fn list_sensors(&self) -> Vec<Sensor> {
        let tables = self.tables.read().await;
        let mut sensors: Vec<Sensor> = tables.sensors.values().cloned().collect();
        sensors.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));
        sensors
    }

    pub async fn list_sensors_by_user(&self, user_id: &str) -> Vec<Sensor> {
        let tables = self.tables.read().await;
        let mut sensors: Vec<Sensor> =
            tables.sensors.values().filter(|s| s.user_id == user_id).cloned().collect();
        sensors.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));
        sensors
    }

    /// Apply `f` to the sensor record, if present, and return the result.
    pub async fn update_sensor<F>(&self, sensor_id: &str, f: F) -> Option<Sensor>
    where
        F: FnOnce(&mut Sensor),
    {
        let mut tables = self.tables.write().await;
        let sensor = tables.sensors.get_mut(sensor_id)?;
        f(sensor);
        Some(sensor.clone())
    }

    /// Merge a motion timestamp into the sensor record.
    ///
    /// Uses `max(stored, occurred_at)`, never a plain overwrite, so re-ordered
    /// arrivals cannot move the debounce anchor backwards.
    pub async fn merge_last_motion(&self, sensor_id: &str, occurred_at: u64) -> Option<Sensor> {
        self.update_sensor(sensor_id, |sensor| {
            sensor.last_motion_at =
                Some(sensor.last_motion_at.map_or(occurred_at, |prev| prev.max(occurred_at)));
        })
        .await
    }

    // -- Users ----------------------------------------------------------------

    pub async fn get_user(&self, user_id: &str) -> Option<User> {
        self.tables.read().await.users.get(user_id).cloned()
    }

    pub async fn put_user(&self, user: User) {
        self.tables.write().await.users.insert(user.user_id.clone(), user);
    }

    pub async fn list_music_connected_users(&self) -> Vec<User> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> =
            tables.users.values().filter(|u| u.music_connected).cloned().collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    pub async fn set_music_connection(
        &self,
        user_id: &str,
        connected: bool,
        token_ref: Option<String>,
    ) -> Option<User> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(user_id)?;
        user.music_connected = connected;
        user.token_ref = token_ref;
        Some(user.clone())
    }

    // -- Sessions -------------------------------------------------------------

    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        self.tables.read().await.sessions.get(session_id).cloned()
    }

    /// The active session for a sensor, if one exists.
    pub async fn active_session(&self, sensor_id: &str) -> Option<Session> {
        let tables = self.tables.read().await;
        let session_id = tables.active_index.get(sensor_id)?;
        tables.sessions.get(session_id).cloned()
    }

    /// Conditional open: create the session only if no row with
    /// `(sensor_id, status=active)` exists; on conflict, adopt the existing
    /// session instead.
    pub async fn open_session(&self, session: Session) -> OpenOutcome {
        let mut tables = self.tables.write().await;
        if let Some(existing_id) = tables.active_index.get(&session.sensor_id).cloned() {
            if let Some(existing) = tables.sessions.get(&existing_id) {
                if existing.status == SessionStatus::Active {
                    return OpenOutcome::Adopted(existing.clone());
                }
            }
            // Stale index entry; fall through and replace it.
            tables.active_index.remove(&session.sensor_id);
        }
        tables.active_index.insert(session.sensor_id.clone(), session.session_id.clone());
        tables.sessions.insert(session.session_id.clone(), session.clone());
        OpenOutcome::Opened(session)
    }

    /// Conditional motion update: increments `motion_count` by one and merges
    /// `last_motion_at` only while the session is still active.
    pub async fn record_session_motion(
        &self,
        session_id: &str,
        occurred_at: u64,
    ) -> CoreResult<Session> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CoreError::not_found(format!("no such session: {session_id}")))?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::conflict(format!("session no longer active: {session_id}")));
        }
        session.motion_count += 1;
        session.last_motion_at = session.last_motion_at.max(occurred_at);
        Ok(session.clone())
    }

    /// Mark playback started on an active session.
    pub async fn mark_playback_started(&self, session_id: &str) -> CoreResult<Session> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CoreError::not_found(format!("no such session: {session_id}")))?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::conflict(format!("session no longer active: {session_id}")));
        }
        session.playback_started = true;
        Ok(session.clone())
    }

    /// Conditional close: `active -> completed` only if the row is still
    /// active. Returns `None` when another writer got there first.
    pub async fn close_session(&self, session_id: &str, end_at: u64) -> Option<Session> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.get_mut(session_id)?;
        if session.status != SessionStatus::Active {
            return None;
        }
        session.status = SessionStatus::Completed;
        let end_at = end_at.max(session.last_motion_at);
        session.end_at = Some(end_at);
        session.duration_secs = Some(end_at.saturating_sub(session.start_at));
        let closed = session.clone();
        tables.active_index.remove(&closed.sensor_id);
        Some(closed)
    }

    /// All active sessions, via the status index (no full-table scan).
    pub async fn list_active_sessions(&self) -> Vec<Session> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .active_index
            .values()
            .filter_map(|id| tables.sessions.get(id))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    pub async fn list_sessions_for_sensor(&self, sensor_id: &str) -> Vec<Session> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> =
            tables.sessions.values().filter(|s| s.sensor_id == sensor_id).cloned().collect();
        sessions.sort_by(|a, b| b.start_at.cmp(&a.start_at));
        sessions
    }

    // -- Audit log ------------------------------------------------------------

    pub async fn append_event(&self, event: MotionEvent) {
        self.tables.write().await.events.push(event);
    }

    /// Recent audit rows for a sensor, newest first.
    pub async fn events_for_sensor(&self, sensor_id: &str, limit: usize) -> Vec<MotionEvent> {
        let tables = self.tables.read().await;
        let mut events: Vec<MotionEvent> =
            tables.events.iter().filter(|e| e.sensor_id == sensor_id).cloned().collect();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit);
        events
    }

    pub async fn event_count(&self) -> usize {
        self.tables.read().await.events.len()
    }

    /// Drop sessions and audit rows whose TTL has passed. Active sessions are
    /// never purged, whatever their age.
    pub async fn purge_expired(&self, now: u64) -> (usize, usize) {
        let mut tables = self.tables.write().await;
        let before_sessions = tables.sessions.len();
        let active: std::collections::HashSet<String> =
            tables.active_index.values().cloned().collect();
        tables.sessions.retain(|id, s| s.expires_at > now || active.contains(id));
        let before_events = tables.events.len();
        tables.events.retain(|e| e.expires_at > now);
        (before_sessions - tables.sessions.len(), before_events - tables.events.len())
    }

    // -- Refresh leases -------------------------------------------------------

    /// Acquire the per-user refresh lease via conditional write.
    ///
    /// Fails (returns `None`) while another holder's unexpired lease exists.
    /// A lease whose `lease_until` has passed is treated as free.
    pub async fn acquire_refresh_lease(
        &self,
        user_id: &str,
        now: u64,
        ttl_secs: u64,
    ) -> Option<Lease> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.leases.get(user_id) {
            if existing.lease_until > now {
                return None;
            }
        }
        let lease = Lease {
            user_id: user_id.to_owned(),
            lease_id: uuid::Uuid::new_v4().to_string(),
            lease_until: now + ttl_secs,
        };
        tables.leases.insert(user_id.to_owned(), lease.clone());
        Some(lease)
    }

    /// Release a lease; a no-op unless the lease id still matches (a later
    /// holder's lease is never clobbered).
    pub async fn release_refresh_lease(&self, lease: &Lease) {
        let mut tables = self.tables.write().await;
        if tables.leases.get(&lease.user_id).is_some_and(|l| l.lease_id == lease.lease_id) {
            tables.leases.remove(&lease.user_id);
        }
    }

    // -- Snapshots ------------------------------------------------------------

    pub async fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read().await;
        StoreSnapshot {
            sensors: tables.sensors.clone(),
            users: tables.users.clone(),
            sessions: tables.sessions.clone(),
            events: tables.events.clone(),
        }
    }

    /// Replace all tables from a snapshot. The active-session index is
    /// rebuilt from session status; leases are ephemeral and start empty.
    pub async fn restore(&self, snapshot: StoreSnapshot) {
        let mut tables = self.tables.write().await;
        tables.active_index = snapshot
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| (s.sensor_id.clone(), s.session_id.clone()))
            .collect();
        tables.sensors = snapshot.sensors;
        tables.users = snapshot.users;
        tables.sessions = snapshot.sessions;
        tables.events = snapshot.events;
        tables.leases.clear();
    }
}

/// Serializable snapshot of the persistent tables.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub sensors: HashMap<String, Sensor>,
    #[serde(default)]
    pub users: HashMap<String, User>,
    #[serde(default)]
    pub sessions: HashMap<String, Session>,
    #[serde(default)]
    pub events: Vec<MotionEvent>,
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
