// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quiet-hours window evaluation in the sensor's local timezone.

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;

use crate::error::{CoreError, CoreResult};
use crate::model::QuietHours;

/// Whether `occurred_at` (epoch seconds) falls inside the quiet window.
///
/// The window is interpreted in the configured IANA timezone. Windows that
/// cross midnight (`start > end`) match iff `now >= start || now < end`;
/// same-day windows match iff `start <= now < end`. An equal start and end
/// is an empty window.
pub fn in_quiet_hours(occurred_at: u64, quiet: &QuietHours) -> CoreResult<bool> {
    let tz: Tz = quiet
        .timezone
        .parse()
        .map_err(|_| CoreError::validation(format!("unknown timezone: {}", quiet.timezone)))?;
    let start = parse_hhmm(&quiet.start)?;
    let end = parse_hhmm(&quiet.end)?;

    let utc = DateTime::from_timestamp(occurred_at as i64, 0)
        .ok_or_else(|| CoreError::validation(format!("timestamp out of range: {occurred_at}")))?;
    let local = utc.with_timezone(&tz);
    let now = local.hour() * 60 + local.minute();

    Ok(if start > end { now >= start || now < end } else { start <= now && now < end })
}

/// Parse a wall-clock `HH:MM` (or bare `HHMM`) string into minutes past midnight.
pub fn parse_hhmm(value: &str) -> CoreResult<u32> {
    let (h, m) = match value.split_once(':') {
        Some((h, m)) => (h, m),
        None if value.len() == 4 => value.split_at(2),
        None => return Err(CoreError::validation(format!("bad time of day: {value:?}"))),
    };
    let hours: u32 = h
        .parse()
        .map_err(|_| CoreError::validation(format!("bad hour in {value:?}")))?;
    let minutes: u32 = m
        .parse()
        .map_err(|_| CoreError::validation(format!("bad minute in {value:?}")))?;
    if hours > 23 || minutes > 59 {
        return Err(CoreError::validation(format!("time of day out of range: {value:?}")));
    }
    Ok(hours * 60 + minutes)
}

#[cfg(test)]
#[path = "quiet_tests.rs"]
mod tests;
