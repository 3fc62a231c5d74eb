//! Structural validation of proposed moves.
//!
//! Checks, in order:
//! 1. The date is a real calendar date
//! 2. Start and end parse as clock times (`24:00` is accepted as an end)
//! 3. Start is before end
//! 4. The duration meets the configured minimum
//! 5. The placement lies within business hours
//!
//! Every failing rule contributes one message; nothing is mutated.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::config::ValidationPolicy;
use crate::error::{Error, Result};
use crate::models::Placement;
use crate::time_math::{
    minutes_to_time, parse_date, parse_day_bound, parse_time, seconds_of, END_OF_DAY,
    MINUTES_PER_DAY, SECONDS_PER_DAY,
};

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    InvalidDate,
    InvalidTime,
    StartNotBeforeEnd,
    TooShort,
    OutsideBusinessHours,
}

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of validating one proposed placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Whether a rule of `kind` failed.
    pub fn has(&self, kind: ValidationErrorKind) -> bool {
        self.errors.iter().any(|error| error.kind == kind)
    }

    /// All messages joined for display.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `Ok(())` when valid, otherwise `Error::Validation`.
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

/// Validates proposed dates and times against a `ValidationPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveValidator {
    min_duration_minutes: i64,
    business_start: i64,
    business_end: i64,
}

impl MoveValidator {
    pub fn new(policy: &ValidationPolicy) -> Result<Self> {
        let (business_start, business_end) = policy.business_bounds()?;
        Ok(Self {
            min_duration_minutes: policy.min_duration_minutes,
            business_start,
            business_end,
        })
    }

    /// Validate raw `YYYY-MM-DD` / `HH:MM[:SS]` input for a same-day move.
    pub fn validate(&self, date: &str, start: &str, end: &str) -> ValidationReport {
        let mut errors = Vec::new();

        let parsed_date = parse_date(date);
        if parsed_date.is_err() {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidDate,
                format!("'{}' is not a valid date", date.trim()),
            ));
        }

        let parsed_start = parse_clock(start, "start", &mut errors);
        let parsed_end = parse_end_clock(end, &mut errors);

        if let (Ok(date), Some(start), Some(end_seconds)) = (parsed_date, parsed_start, parsed_end)
        {
            let end_at = TimeDelta::try_seconds(end_seconds)
                .and_then(|offset| date.and_time(NaiveTime::MIN).checked_add_signed(offset))
                .unwrap_or_else(|| date.and_time(END_OF_DAY));
            self.check_range(date.and_time(start), end_at, &mut errors);
            self.check_business_hours(start, Some(end_seconds), &mut errors);
        }

        ValidationReport::from_errors(errors)
    }

    /// Validate a typed placement.
    ///
    /// A multi-day placement is ordered and measured on its full instants;
    /// only its start is held to business hours.
    pub fn validate_placement(&self, placement: &Placement) -> ValidationReport {
        let mut errors = Vec::new();
        self.check_range(placement.start_at(), placement.end_at(), &mut errors);
        let end = (!placement.is_multi_day()).then(|| seconds_of(placement.end));
        self.check_business_hours(placement.start, end, &mut errors);
        ValidationReport::from_errors(errors)
    }

    fn check_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        errors: &mut Vec<ValidationError>,
    ) {
        if start >= end {
            errors.push(ValidationError::new(
                ValidationErrorKind::StartNotBeforeEnd,
                "start time must be before end time",
            ));
        }

        let duration_seconds = (end - start).num_seconds();
        if duration_seconds < self.min_duration_minutes * 60 {
            errors.push(ValidationError::new(
                ValidationErrorKind::TooShort,
                format!(
                    "schedule must last at least {} minutes",
                    self.min_duration_minutes
                ),
            ));
        }
    }

    /// `end_seconds` counts from midnight and may equal a full day.
    fn check_business_hours(
        &self,
        start: NaiveTime,
        end_seconds: Option<i64>,
        errors: &mut Vec<ValidationError>,
    ) {
        let starts_too_early = seconds_of(start) < self.business_start * 60;
        let ends_too_late = end_seconds.is_some_and(|end| end > self.business_end * 60);

        if starts_too_early || ends_too_late {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutsideBusinessHours,
                format!(
                    "schedule must fall within business hours ({}-{})",
                    minutes_to_time(self.business_start),
                    format_bound(self.business_end)
                ),
            ));
        }
    }
}

fn parse_clock(value: &str, label: &str, errors: &mut Vec<ValidationError>) -> Option<NaiveTime> {
    match parse_time(value) {
        Ok(time) => Some(time),
        Err(_) => {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTime,
                format!("{label} time '{}' is not a valid HH:MM:SS time", value.trim()),
            ));
            None
        }
    }
}

/// End clock as seconds since midnight; `24:00` is the close of the day.
fn parse_end_clock(value: &str, errors: &mut Vec<ValidationError>) -> Option<i64> {
    if parse_day_bound(value).is_ok_and(|minutes| minutes == MINUTES_PER_DAY) {
        return Some(SECONDS_PER_DAY);
    }
    parse_clock(value, "end", errors).map(seconds_of)
}

fn format_bound(minutes: i64) -> String {
    if minutes >= MINUTES_PER_DAY {
        "24:00".to_string()
    } else {
        minutes_to_time(minutes)
    }
}
