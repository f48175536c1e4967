// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process read-through cache for access tokens.
//!
//! Entries live for at most five minutes and never outlive the token they
//! hold. Writers invalidate explicitly; concurrent refreshes for one user are
//! collapsed through a per-user gate (the second caller re-reads the cache
//! after the first releases).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::secret::TokenRecord;

/// Upper bound on cache-entry lifetime, seconds.
pub const MAX_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone)]
struct CacheEntry {
    record: TokenRecord,
    cached_until: u64,
}

#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached record, provided both the entry and the token itself are
    /// still live at `now`.
    pub async fn get(&self, user_id: &str, now: u64) -> Option<TokenRecord> {
        let entries = self.entries.read().await;
        let entry = entries.get(user_id)?;
        if entry.cached_until <= now || entry.record.expires_at <= now {
            return None;
        }
        Some(entry.record.clone())
    }

    /// Cache a record with TTL `min(expires_at - now, 300s)`.
    pub async fn insert(&self, user_id: &str, record: TokenRecord, now: u64) {
        let ttl = record.expires_at.saturating_sub(now).min(MAX_CACHE_TTL_SECS);
        if ttl == 0 {
            return;
        }
        self.entries
            .write()
            .await
            .insert(user_id.to_owned(), CacheEntry { record, cached_until: now + ttl });
    }

    pub async fn invalidate(&self, user_id: &str) {
        self.entries.write().await.remove(user_id);
    }

    /// Per-user singleflight gate. Callers hold the gate across a refresh;
    /// anyone queued behind re-checks the cache before refreshing again.
    pub async fn refresh_gate(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(user_id.to_owned()).or_default())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
