//! Wall-clock helpers for the lights schedule.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Timelike};

/// Wall-clock times before this are treated as an unset clock (2020-09-13).
const EARLIEST_VALID_EPOCH: i64 = 1_600_000_000;

/// Seconds since local midnight, [`None`] if the system clock has not been set.
pub fn local_time_of_day() -> Option<u32> {
    time_of_day(&Local::now())
}

/// Seconds since midnight of `at` in its own time zone.
pub fn time_of_day<Tz: TimeZone>(at: &DateTime<Tz>) -> Option<u32> {
    (at.timestamp() >= EARLIEST_VALID_EPOCH).then(|| at.num_seconds_from_midnight())
}

/// Parses `"HH:MM"` into seconds since midnight.
pub fn parse_time_of_day(s: &str) -> Option<u32> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .ok()
        .map(|t| t.num_seconds_from_midnight())
}

/// Formats seconds since midnight as `"HH:MM"`.
pub fn format_time_of_day(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60)
}
