// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retries with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{CoreError, CoreResult};

/// Backoff policy for transient downstream failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
    /// Ceiling applied to server-requested `Retry-After` delays.
    pub rate_limit_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(2),
            rate_limit_cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, without jitter.
    ///
    /// A rate-limited error with a server-requested delay overrides the
    /// exponential schedule, capped at `rate_limit_cap`.
    pub fn delay_for(&self, attempt: u32, err: &CoreError) -> Duration {
        if let Some(after) = err.retry_after {
            return after.min(self.rate_limit_cap);
        }
        let exp = self.base.saturating_mul(1u32 << attempt.min(16));
        exp.min(self.cap)
    }
}

/// Add up to 50% random jitter to a delay.
fn jittered(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::rng().random_range(0..=millis / 2))
}

/// Run `op` with bounded retries on retryable error kinds.
///
/// Non-retryable kinds (Validation, NotFound, Conflict, AuthExpired, Fatal)
/// surface immediately.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = jittered(policy.delay_for(attempt, &err));
                tracing::debug!(op = op_name, attempt, err = %err, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
