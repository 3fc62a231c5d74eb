//! Resource double-booking detection.
//!
//! Two schedules conflict when they share a driver (or vehicle) and their
//! time ranges overlap on the same calendar day. Ranges are half-open, so a
//! delivery ending at 11:00 does not clash with a loading starting at 11:00.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::SeverityThresholds;
use crate::models::{Placement, ResourceAxis, Schedule, ScheduleId};
use crate::segment::{segment_for_date, split_by_date};

/// Conflict severity derived from overlap length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor = 1,
    Moderate = 2,
    Severe = 3,
}

impl Severity {
    /// Classify an overlap of `minutes`.
    pub const fn from_minutes(minutes: i64, thresholds: &SeverityThresholds) -> Self {
        if minutes >= thresholds.severe_minutes {
            Self::Severe
        } else if minutes >= thresholds.moderate_minutes {
            Self::Moderate
        } else {
            Self::Minor
        }
    }

    /// Numeric level, 1 (minor) to 3 (severe).
    pub const fn level(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

/// Whether `[start1, end1)` and `[start2, end2)` overlap.
pub fn ranges_overlap<T: PartialOrd>(start1: T, end1: T, start2: T, end2: T) -> bool {
    start1 < end2 && start2 < end1
}

/// One overlap between the checked schedule and another schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetail {
    /// The other schedule
    pub schedule_id: ScheduleId,
    pub axis: ResourceAxis,
    pub resource_id: String,
    pub date: NaiveDate,
    pub overlap_start: NaiveTime,
    pub overlap_end: NaiveTime,
    pub overlap_minutes: i64,
    pub severity: Severity,
}

/// Aggregate result of a conflict check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    /// Distinct schedules involved, in discovery order
    pub conflicting: Vec<Schedule>,
    pub details: Vec<ConflictDetail>,
    pub summary: String,
}

impl ConflictCheck {
    /// A check that found nothing.
    pub fn none() -> Self {
        Self {
            summary: summarize(0),
            ..Self::default()
        }
    }

    fn from_parts(conflicting: Vec<Schedule>, details: Vec<ConflictDetail>) -> Self {
        Self {
            has_conflict: !details.is_empty(),
            summary: summarize(conflicting.len()),
            conflicting,
            details,
        }
    }

    /// Ids of every conflicting schedule.
    pub fn conflicting_ids(&self) -> impl Iterator<Item = &ScheduleId> {
        self.conflicting.iter().map(|schedule| &schedule.id)
    }

    /// Worst severity found, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.details.iter().map(|detail| detail.severity).max()
    }

    /// Fold another check into this one, keeping schedules distinct.
    pub fn merge(&mut self, other: Self) {
        for schedule in other.conflicting {
            if !self.conflicting.iter().any(|known| known.id == schedule.id) {
                self.conflicting.push(schedule);
            }
        }
        self.details.extend(other.details);
        self.has_conflict = !self.details.is_empty();
        self.summary = summarize(self.conflicting.len());
    }
}

fn summarize(count: usize) -> String {
    match count {
        0 => "No conflicts".to_string(),
        1 => "1 conflicting schedule".to_string(),
        n => format!("{n} conflicting schedules"),
    }
}

/// Detects overlapping assignments of the same driver or vehicle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    thresholds: SeverityThresholds,
}

impl ConflictDetector {
    pub const fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    pub const fn thresholds(&self) -> &SeverityThresholds {
        &self.thresholds
    }

    /// Check `schedule` placed on `date` from `start` to `end` against
    /// `all` on one resource axis.
    ///
    /// Schedules without a resource on `axis` never conflict. Other
    /// schedules are compared through the segment they occupy on `date`, so
    /// an overnight run still blocks the early hours of its second day.
    pub fn check_conflict(
        &self,
        schedule: &Schedule,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        all: &[Schedule],
        axis: ResourceAxis,
    ) -> ConflictCheck {
        let Some(resource) = axis.resource_of(schedule) else {
            return ConflictCheck::none();
        };

        let mut conflicting = Vec::new();
        let mut details = Vec::new();

        for other in all {
            if other.id == schedule.id || axis.resource_of(other) != Some(resource) {
                continue;
            }
            let Some(segment) = segment_for_date(other, date) else {
                continue;
            };
            if !ranges_overlap(start, end, segment.start_time, segment.end_time) {
                continue;
            }

            let overlap_start = start.max(segment.start_time);
            let overlap_end = end.min(segment.end_time);
            let overlap_seconds = (overlap_end - overlap_start).num_seconds().max(0);
            let overlap_minutes = (overlap_seconds + 59) / 60;

            details.push(ConflictDetail {
                schedule_id: other.id.clone(),
                axis,
                resource_id: resource.to_string(),
                date,
                overlap_start,
                overlap_end,
                overlap_minutes,
                severity: Severity::from_minutes(overlap_minutes, &self.thresholds),
            });
            if !conflicting.iter().any(|known: &Schedule| known.id == other.id) {
                conflicting.push(other.clone());
            }
        }

        if !details.is_empty() {
            tracing::debug!(
                "Schedule {} has {} {} conflict(s) on {}",
                schedule.id,
                details.len(),
                axis,
                date
            );
        }

        ConflictCheck::from_parts(conflicting, details)
    }

    /// Check a full placement (every day it covers) on each of `axes`.
    pub fn check_placement(
        &self,
        schedule: &Schedule,
        placement: &Placement,
        all: &[Schedule],
        axes: &[ResourceAxis],
    ) -> ConflictCheck {
        let moved = placement.apply_to(schedule);
        let mut check = ConflictCheck::none();

        for segment in split_by_date(&moved) {
            for axis in axes {
                check.merge(self.check_conflict(
                    &moved,
                    segment.date,
                    segment.start_time,
                    segment.end_time,
                    all,
                    *axis,
                ));
            }
        }

        check
    }
}
