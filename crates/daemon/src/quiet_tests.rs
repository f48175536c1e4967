// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{in_quiet_hours, parse_hhmm};
use crate::model::QuietHours;

fn window(start: &str, end: &str, tz: &str) -> QuietHours {
    QuietHours { start: start.into(), end: end.into(), timezone: tz.into() }
}

#[yare::parameterized(
    with_colon = { "22:00", 22 * 60 },
    bare = { "2200", 22 * 60 },
    midnight = { "00:00", 0 },
    last_minute = { "23:59", 23 * 60 + 59 },
    half_past = { "07:30", 7 * 60 + 30 },
)]
fn parses_time_of_day(value: &str, expected: u32) {
    assert_eq!(parse_hhmm(value).ok(), Some(expected));
}

#[yare::parameterized(
    bad_hour = { "25:00" },
    bad_minute = { "10:75" },
    garbage = { "noon" },
    too_short = { "220" },
    negative = { "-1:00" },
)]
fn rejects_bad_time_of_day(value: &str) {
    assert!(parse_hhmm(value).is_err());
}

// 2021-01-15 is well inside GMT (UTC+0) for Europe/London.
const JAN_15_MIDNIGHT_UTC: u64 = 1_610_668_800;

fn at_london_winter(hh: u64, mm: u64) -> u64 {
    JAN_15_MIDNIGHT_UTC + hh * 3600 + mm * 60
}

#[test]
fn cross_midnight_window_matches_early_morning() -> anyhow::Result<()> {
    let q = window("22:00", "07:00", "Europe/London");
    // 03:15 local is inside 22:00-07:00.
    assert!(in_quiet_hours(at_london_winter(3, 15), &q)?);
    Ok(())
}

#[test]
fn cross_midnight_window_matches_late_evening() -> anyhow::Result<()> {
    let q = window("22:00", "07:00", "Europe/London");
    assert!(in_quiet_hours(at_london_winter(23, 30), &q)?);
    assert!(in_quiet_hours(at_london_winter(22, 0), &q)?, "start is inclusive");
    Ok(())
}

#[test]
fn cross_midnight_window_excludes_daytime() -> anyhow::Result<()> {
    let q = window("22:00", "07:00", "Europe/London");
    assert!(!in_quiet_hours(at_london_winter(12, 0), &q)?);
    assert!(!in_quiet_hours(at_london_winter(7, 0), &q)?, "end is exclusive");
    assert!(!in_quiet_hours(at_london_winter(21, 59), &q)?);
    Ok(())
}

#[test]
fn same_day_window() -> anyhow::Result<()> {
    let q = window("09:00", "17:00", "Europe/London");
    assert!(in_quiet_hours(at_london_winter(9, 0), &q)?);
    assert!(in_quiet_hours(at_london_winter(12, 30), &q)?);
    assert!(!in_quiet_hours(at_london_winter(17, 0), &q)?);
    assert!(!in_quiet_hours(at_london_winter(8, 59), &q)?);
    Ok(())
}

#[test]
fn empty_window_never_matches() -> anyhow::Result<()> {
    let q = window("10:00", "10:00", "Europe/London");
    assert!(!in_quiet_hours(at_london_winter(10, 0), &q)?);
    assert!(!in_quiet_hours(at_london_winter(9, 59), &q)?);
    Ok(())
}

#[test]
fn window_is_evaluated_in_sensor_timezone() -> anyhow::Result<()> {
    // 04:15 UTC is 22:15 the previous evening in America/Chicago (UTC-6 in
    // January), inside a 22:00-07:00 local window.
    let q = window("22:00", "07:00", "America/Chicago");
    assert!(in_quiet_hours(at_london_winter(4, 15), &q)?);
    // 12:00 UTC is 06:00 in Chicago, still inside.
    assert!(in_quiet_hours(at_london_winter(12, 0), &q)?);
    // 14:00 UTC is 08:00 in Chicago, outside.
    assert!(!in_quiet_hours(at_london_winter(14, 0), &q)?);
    Ok(())
}

#[test]
fn unknown_timezone_is_a_validation_error() {
    let q = window("22:00", "07:00", "Mars/Olympus_Mons");
    let err = in_quiet_hours(1_610_668_800, &q);
    assert!(err.is_err());
}
