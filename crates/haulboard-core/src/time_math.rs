//! Clock-time arithmetic on a fixed 24-hour axis.
//!
//! Converts between `HH:MM[:SS]` strings, minute offsets from midnight and
//! percentage positions along the rendered day axis. Out-of-range numeric
//! input clamps into `[0, 24h)`; only malformed strings fail.

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::{Error, Result};

/// Minutes in one calendar day.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Seconds in one calendar day.
pub const SECONDS_PER_DAY: i64 = MINUTES_PER_DAY * 60;

/// Default snapping grid for drag and keyboard moves.
pub const DEFAULT_GRID_MINUTES: u32 = 15;

/// Last representable instant of a day, used to close the first segment of a
/// multi-day schedule.
pub const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(time) => time,
    None => NaiveTime::MIN,
};

/// Split a clock string into numeric fields without range checks.
fn clock_fields(value: &str) -> Result<(u32, u32, u32)> {
    let trimmed = value.trim();
    let parts: Vec<&str> = trimmed.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(Error::Format(format!(
            "expected HH:MM or HH:MM:SS, got '{trimmed}'"
        )));
    }

    let mut fields = [0u32; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Format(format!("invalid clock field in '{trimmed}'")));
        }
        *slot = part
            .parse()
            .map_err(|_| Error::Format(format!("invalid clock field in '{trimmed}'")))?;
    }

    Ok((fields[0], fields[1], fields[2]))
}

/// Convert a clock string to minutes since midnight.
///
/// Values past the end of the day clamp to `23:59`.
///
/// # Examples
///
/// ```
/// use haulboard_core::time_math::time_to_minutes;
///
/// assert_eq!(time_to_minutes("09:30").unwrap(), 570);
/// assert_eq!(time_to_minutes("26:00").unwrap(), 1439);
/// ```
pub fn time_to_minutes(value: &str) -> Result<u32> {
    let (hours, minutes, _seconds) = clock_fields(value)?;
    let total = i64::from(hours) * 60 + i64::from(minutes.min(59));
    Ok(clamp_minutes(total))
}

/// Convert minutes since midnight to an `HH:MM` string, clamping into the day.
pub fn minutes_to_time(minutes: i64) -> String {
    let minutes = clamp_minutes(minutes);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Round `minutes` to the nearest multiple of `grid`. Halves round up.
pub fn snap_to_grid(minutes: i64, grid: u32) -> i64 {
    if grid == 0 {
        return minutes;
    }
    let grid = i64::from(grid);
    minutes.saturating_add(grid / 2).div_euclid(grid) * grid
}

/// Map a percentage along an axis covering `day_range_hours` to a clock time.
pub fn position_to_time(percent: f64, day_range_hours: f64) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let range_minutes = day_range_hours.clamp(0.0, 24.0) * 60.0;
    #[allow(clippy::cast_possible_truncation)]
    let minutes = (percent / 100.0 * range_minutes).floor() as i64;
    minutes_to_time(minutes)
}

/// Map a clock time to its percentage along an axis covering `day_range_hours`.
pub fn time_to_position(value: &str, day_range_hours: f64) -> Result<f64> {
    let minutes = f64::from(time_to_minutes(value)?);
    let range_minutes = day_range_hours.clamp(0.0, 24.0) * 60.0;
    if range_minutes <= 0.0 {
        return Ok(0.0);
    }
    Ok((minutes / range_minutes * 100.0).clamp(0.0, 100.0))
}

/// Minutes since midnight of a typed time (seconds truncated).
pub fn minutes_of(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Seconds since midnight of a typed time.
pub fn seconds_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

/// Typed time for a minute offset, clamped into the day.
pub fn time_from_minutes(minutes: i64) -> NaiveTime {
    time_from_seconds(minutes.saturating_mul(60))
}

/// Typed time for a second offset, clamped into the day.
pub fn time_from_seconds(seconds: i64) -> NaiveTime {
    let seconds = seconds.clamp(0, SECONDS_PER_DAY - 1);
    u32::try_from(seconds)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
        .unwrap_or(END_OF_DAY)
}

/// Parse a strict `HH:MM` or `HH:MM:SS` time. Out-of-range fields fail.
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let (hours, minutes, seconds) = clock_fields(value)?;
    NaiveTime::from_hms_opt(hours, minutes, seconds)
        .ok_or_else(|| Error::Format(format!("time out of range: '{}'", value.trim())))
}

/// Parse a day-bound clock value where `24:00` means end of day.
///
/// Returns minutes since midnight in `[0, 1440]`.
pub fn parse_day_bound(value: &str) -> Result<i64> {
    let (hours, minutes, seconds) = clock_fields(value)?;
    if hours == 24 && minutes == 0 && seconds == 0 {
        return Ok(MINUTES_PER_DAY);
    }
    parse_time(value).map(minutes_of)
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| Error::Format(format!("invalid date '{}': {error}", value.trim())))
}

/// Format a typed time as `HH:MM:SS`.
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Format a typed time as `HH:MM`, the short form used in summaries.
pub fn format_short_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn clamp_minutes(minutes: i64) -> u32 {
    u32::try_from(minutes.clamp(0, MINUTES_PER_DAY - 1)).unwrap_or(0)
}
