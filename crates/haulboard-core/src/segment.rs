//! Per-day segmentation of schedules.
//!
//! A schedule that crosses midnight is rendered as one block per calendar
//! day: the start day runs to `23:59:59`, the end day starts at `00:00:00`
//! and any day in between covers the whole day. Single-day schedules yield
//! exactly one segment flagged as both start and end.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{Schedule, ScheduleId};
use crate::time_math::END_OF_DAY;

/// A per-calendar-day rendering slice of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSegment {
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    /// Segment holds the schedule's real start
    pub is_start: bool,
    /// Segment holds the schedule's real end
    pub is_end: bool,
    /// Segment covers a whole day strictly between start and end
    pub is_continuation: bool,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleSegment {
    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    /// Length rounded up to whole minutes, so a segment closed at
    /// `23:59:59` counts its final minute.
    pub fn duration_minutes(&self) -> i64 {
        let seconds = (self.end_at() - self.start_at()).num_seconds().max(0);
        (seconds + 59) / 60
    }
}

/// Split a schedule into its per-day segments, ordered by date.
pub fn split_by_date(schedule: &Schedule) -> Vec<ScheduleSegment> {
    let start_date = schedule.loading_date();
    let end_date = schedule.delivery_date();

    if start_date >= end_date {
        return vec![single_segment(schedule)];
    }

    start_date
        .iter_days()
        .take_while(|date| *date <= end_date)
        .map(|date| segment_on(schedule, date, start_date, end_date))
        .collect()
}

/// The segment a schedule occupies on `date`, if any.
pub fn segment_for_date(schedule: &Schedule, date: NaiveDate) -> Option<ScheduleSegment> {
    let start_date = schedule.loading_date();
    let end_date = schedule.delivery_date();

    if date < start_date || date > end_date {
        return None;
    }
    if start_date >= end_date {
        return Some(single_segment(schedule));
    }
    Some(segment_on(schedule, date, start_date, end_date))
}

/// Segments of every schedule that occupies `date`, in input order.
pub fn segments_for_date(schedules: &[Schedule], date: NaiveDate) -> Vec<ScheduleSegment> {
    schedules
        .iter()
        .filter_map(|schedule| segment_for_date(schedule, date))
        .collect()
}

fn single_segment(schedule: &Schedule) -> ScheduleSegment {
    ScheduleSegment {
        schedule_id: schedule.id.clone(),
        date: schedule.loading_date(),
        is_start: true,
        is_end: true,
        is_continuation: false,
        start_time: schedule.loading_at.time(),
        end_time: schedule.delivery_at.time(),
    }
}

fn segment_on(
    schedule: &Schedule,
    date: NaiveDate,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> ScheduleSegment {
    let is_start = date == start_date;
    let is_end = date == end_date;

    ScheduleSegment {
        schedule_id: schedule.id.clone(),
        date,
        is_start,
        is_end,
        is_continuation: !is_start && !is_end,
        start_time: if is_start {
            schedule.loading_at.time()
        } else {
            NaiveTime::MIN
        },
        end_time: if is_end {
            schedule.delivery_at.time()
        } else {
            END_OF_DAY
        },
    }
}
