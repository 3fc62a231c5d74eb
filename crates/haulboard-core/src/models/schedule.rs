//! Schedule model

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque schedule identifier.
///
/// Identifiers minted locally are UUID v7 strings (time-sortable); identifiers
/// coming from the remote store are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(String);

impl ScheduleId {
    /// Create a new unique schedule ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScheduleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Schedule ID cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for ScheduleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScheduleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A time-boxed delivery assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique identifier
    pub id: ScheduleId,
    /// When loading starts
    pub loading_at: NaiveDateTime,
    /// When delivery completes; never before `loading_at`
    pub delivery_at: NaiveDateTime,
    /// Bound client, if any
    #[serde(default)]
    pub client_id: Option<String>,
    /// Bound driver, if any
    #[serde(default)]
    pub driver_id: Option<String>,
    /// Bound vehicle, if any
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub loading_location: Option<String>,
    #[serde(default)]
    pub loading_address: Option<String>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub cargo: Option<String>,
    #[serde(default)]
    pub billing_date: Option<NaiveDate>,
    /// Fare in the smallest currency unit
    #[serde(default)]
    pub fare: Option<u64>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Schedule {
    /// Create an unassigned schedule covering `[loading_at, delivery_at]`.
    pub fn new(loading_at: NaiveDateTime, delivery_at: NaiveDateTime) -> Result<Self> {
        if delivery_at < loading_at {
            return Err(Error::InvalidInput(format!(
                "delivery {delivery_at} is before loading {loading_at}"
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Self {
            id: ScheduleId::new(),
            loading_at,
            delivery_at,
            client_id: None,
            driver_id: None,
            vehicle_id: None,
            route_name: None,
            loading_location: None,
            loading_address: None,
            delivery_location: None,
            delivery_address: None,
            cargo: None,
            billing_date: None,
            fare: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ScheduleId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_driver(mut self, driver_id: impl Into<String>) -> Self {
        self.driver_id = Some(driver_id.into());
        self
    }

    #[must_use]
    pub fn with_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Calendar date loading starts on
    pub fn loading_date(&self) -> NaiveDate {
        self.loading_at.date()
    }

    /// Calendar date delivery completes on
    pub fn delivery_date(&self) -> NaiveDate {
        self.delivery_at.date()
    }

    /// Whether the schedule crosses at least one midnight
    pub fn is_multi_day(&self) -> bool {
        self.loading_date() != self.delivery_date()
    }

    /// Number of midnights between loading and delivery
    pub fn day_span(&self) -> u32 {
        let days = (self.delivery_date() - self.loading_date()).num_days();
        u32::try_from(days).unwrap_or(0)
    }

    /// Duration in whole minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.delivery_at - self.loading_at).num_minutes()
    }

    /// Whether the schedule has any segment on `date`
    pub fn occupies(&self, date: NaiveDate) -> bool {
        self.loading_date() <= date && date <= self.delivery_date()
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// Partial field update sent to the persistence collaborator.
///
/// `None` leaves a field untouched; `Some(None)` clears a resource binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Option<String>>,
}

impl SchedulePatch {
    /// Minimal patch turning `before` into `after` on the fields a patch carries.
    pub fn between(before: &Schedule, after: &Schedule) -> Self {
        fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
            (before != after).then(|| after.clone())
        }

        Self {
            loading_at: changed(&before.loading_at, &after.loading_at),
            delivery_at: changed(&before.delivery_at, &after.delivery_at),
            client_id: changed(&before.client_id, &after.client_id),
            driver_id: changed(&before.driver_id, &after.driver_id),
            vehicle_id: changed(&before.vehicle_id, &after.vehicle_id),
        }
    }

    /// Whether the patch changes nothing
    pub const fn is_empty(&self) -> bool {
        self.loading_at.is_none()
            && self.delivery_at.is_none()
            && self.client_id.is_none()
            && self.driver_id.is_none()
            && self.vehicle_id.is_none()
    }

    /// Apply the patch, rejecting a result whose delivery precedes loading.
    pub fn apply(&self, schedule: &mut Schedule) -> Result<()> {
        let loading_at = self.loading_at.unwrap_or(schedule.loading_at);
        let delivery_at = self.delivery_at.unwrap_or(schedule.delivery_at);
        if delivery_at < loading_at {
            return Err(Error::InvalidInput(format!(
                "delivery {delivery_at} is before loading {loading_at}"
            )));
        }

        schedule.loading_at = loading_at;
        schedule.delivery_at = delivery_at;
        if let Some(client_id) = &self.client_id {
            schedule.client_id.clone_from(client_id);
        }
        if let Some(driver_id) = &self.driver_id {
            schedule.driver_id.clone_from(driver_id);
        }
        if let Some(vehicle_id) = &self.vehicle_id {
            schedule.vehicle_id.clone_from(vehicle_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_schedule_id_unique() {
        assert_ne!(ScheduleId::new(), ScheduleId::new());
    }

    #[test]
    fn test_schedule_id_parse() {
        let id: ScheduleId = " sched-1 ".parse().unwrap();
        assert_eq!(id.as_str(), "sched-1");
        assert!("   ".parse::<ScheduleId>().is_err());
    }

    #[test]
    fn test_schedule_new_rejects_reversed_range() {
        assert!(Schedule::new(at("2025-01-10 11:00"), at("2025-01-10 09:00")).is_err());
        let zero = Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 09:00")).unwrap();
        assert_eq!(zero.duration_minutes(), 0);
    }

    #[test]
    fn test_multi_day_is_derived() {
        let single = Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 17:00")).unwrap();
        assert!(!single.is_multi_day());
        assert_eq!(single.day_span(), 0);

        let overnight = Schedule::new(at("2025-01-10 22:00"), at("2025-01-12 02:00")).unwrap();
        assert!(overnight.is_multi_day());
        assert_eq!(overnight.day_span(), 2);
        assert!(overnight.occupies(at("2025-01-11 00:00").date()));
        assert!(!overnight.occupies(at("2025-01-13 00:00").date()));
    }

    #[test]
    fn test_patch_between_only_carries_changes() {
        let before = Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 11:00"))
            .unwrap()
            .with_driver("D1");
        let mut after = before.clone();
        after.loading_at = at("2025-01-10 10:00");
        after.delivery_at = at("2025-01-10 12:00");

        let patch = SchedulePatch::between(&before, &after);
        assert_eq!(patch.loading_at, Some(at("2025-01-10 10:00")));
        assert_eq!(patch.driver_id, None);
        assert!(!patch.is_empty());

        let mut applied = before;
        patch.apply(&mut applied).unwrap();
        assert_eq!(applied, after);
    }

    #[test]
    fn test_patch_can_clear_binding() {
        let mut schedule = Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 11:00"))
            .unwrap()
            .with_vehicle("V1");
        let patch = SchedulePatch {
            vehicle_id: Some(None),
            ..SchedulePatch::default()
        };
        patch.apply(&mut schedule).unwrap();
        assert_eq!(schedule.vehicle_id, None);
    }

    #[test]
    fn test_patch_rejects_reversed_result() {
        let mut schedule = Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 11:00")).unwrap();
        let patch = SchedulePatch {
            loading_at: Some(at("2025-01-10 12:00")),
            ..SchedulePatch::default()
        };
        assert!(patch.apply(&mut schedule).is_err());
        assert_eq!(schedule.loading_at, at("2025-01-10 09:00"));
    }
}
