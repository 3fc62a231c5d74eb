//! Candidate placements and resource axes

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::schedule::Schedule;
use crate::time_math::{seconds_of, time_from_seconds, SECONDS_PER_DAY};

/// One of the bindings checked independently for double-booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceAxis {
    Driver,
    Vehicle,
}

impl ResourceAxis {
    /// Every conflict-relevant axis, in checking order.
    pub const ALL: [Self; 2] = [Self::Driver, Self::Vehicle];

    /// The resource bound on this axis, if any.
    pub fn resource_of(self, schedule: &Schedule) -> Option<&str> {
        let bound = match self {
            Self::Driver => schedule.driver_id.as_deref(),
            Self::Vehicle => schedule.vehicle_id.as_deref(),
        };
        bound.filter(|id| !id.trim().is_empty())
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Vehicle => "vehicle",
        }
    }
}

impl fmt::Display for ResourceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A proposed position for a schedule on the timeline.
///
/// `day_span` is carried over from the schedule being moved so that a
/// multi-day schedule keeps its length; `end` then falls on
/// `date + day_span`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default)]
    pub day_span: u32,
}

impl Placement {
    /// Current placement of a schedule.
    pub fn of(schedule: &Schedule) -> Self {
        Self {
            date: schedule.loading_date(),
            start: schedule.loading_at.time(),
            end: schedule.delivery_at.time(),
            day_span: schedule.day_span(),
        }
    }

    /// A placement starting and ending on `date`.
    pub const fn single_day(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            date,
            start,
            end,
            day_span: 0,
        }
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn end_date(&self) -> NaiveDate {
        shift_date(self.date, i64::from(self.day_span))
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.end_date().and_time(self.end)
    }

    pub const fn is_multi_day(&self) -> bool {
        self.day_span > 0
    }

    /// Copy of `schedule` moved to this placement; every other field is kept.
    pub fn apply_to(&self, schedule: &Schedule) -> Schedule {
        let mut moved = schedule.clone();
        moved.loading_at = self.start_at();
        moved.delivery_at = self.end_at();
        moved
    }

    /// Same times, `days` calendar days later (or earlier when negative).
    #[must_use]
    pub fn shifted_days(&self, days: i64) -> Self {
        Self {
            date: shift_date(self.date, days),
            ..*self
        }
    }

    /// Shift both ends by `minutes`, keeping the duration.
    ///
    /// A single-day placement is clamped so it stays within its date; a
    /// multi-day placement moves freely across midnight and is returned
    /// unchanged when the shift leaves the calendar range.
    #[must_use]
    pub fn shifted_minutes(&self, minutes: i64) -> Self {
        let delta = minutes.saturating_mul(60);
        if self.day_span == 0 {
            let start = seconds_of(self.start);
            let end = seconds_of(self.end).max(start);
            let latest_start = (SECONDS_PER_DAY - 1) - (end - start);
            let new_start = start.saturating_add(delta).clamp(0, latest_start.max(0));
            return Self {
                start: time_from_seconds(new_start),
                end: time_from_seconds(new_start + (end - start)),
                ..*self
            };
        }

        let shifted = TimeDelta::try_seconds(delta).and_then(|offset| {
            Some((
                self.start_at().checked_add_signed(offset)?,
                self.end_at().checked_add_signed(offset)?,
            ))
        });
        let Some((start_at, end_at)) = shifted else {
            return *self;
        };
        let day_span = (end_at.date() - start_at.date()).num_days();
        Self {
            date: start_at.date(),
            start: start_at.time(),
            end: end_at.time(),
            day_span: u32::try_from(day_span).unwrap_or(0),
        }
    }
}

/// `date` moved by `days`, saturating at the calendar limits.
pub fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    TimeDelta::try_days(days)
        .and_then(|offset| date.checked_add_signed(offset))
        .unwrap_or(date)
}
