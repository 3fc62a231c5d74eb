//! Scheduling policy configuration.
//!
//! Every value has a default matching the behaviour the board ships with, so
//! an empty JSON object (or a missing file) yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::time_math::{parse_day_bound, DEFAULT_GRID_MINUTES, MINUTES_PER_DAY};

/// Conflict severity thresholds, in overlap minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SeverityThresholds {
    /// Overlaps at least this long are moderate
    pub moderate_minutes: i64,
    /// Overlaps at least this long are severe
    pub severe_minutes: i64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            moderate_minutes: 30,
            severe_minutes: 60,
        }
    }
}

/// Structural rules a proposed move must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidationPolicy {
    pub min_duration_minutes: i64,
    /// Earliest allowed start, `HH:MM`
    pub business_start: String,
    /// Latest allowed end, `HH:MM`; `24:00` means midnight
    pub business_end: String,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            business_start: "09:00".to_string(),
            business_end: "24:00".to_string(),
        }
    }
}

impl ValidationPolicy {
    /// Business hours as minute offsets `(start, end)`.
    pub fn business_bounds(&self) -> Result<(i64, i64)> {
        let start = parse_day_bound(&self.business_start)
            .map_err(|error| Error::Config(format!("business_start: {error}")))?;
        let end = parse_day_bound(&self.business_end)
            .map_err(|error| Error::Config(format!("business_end: {error}")))?;
        Ok((start, end))
    }
}

/// Core configuration shared by the controller and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CoreConfig {
    /// Snapping grid for drag and arrow-key moves
    pub grid_minutes: u32,
    /// Hours covered by the rendered time axis
    pub day_range_hours: f64,
    /// Pointer travel before a press becomes a drag
    pub drag_threshold_px: f64,
    /// Rendered height of the time axis
    pub axis_height_px: f64,
    /// Rendered width of one day column
    pub day_width_px: f64,
    /// How long a local write suppresses its own echo
    pub echo_window_ms: u64,
    /// Undo history length
    pub undo_capacity: usize,
    pub validation: ValidationPolicy,
    pub severity: SeverityThresholds,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            grid_minutes: DEFAULT_GRID_MINUTES,
            day_range_hours: 24.0,
            drag_threshold_px: 4.0,
            axis_height_px: 960.0,
            day_width_px: 160.0,
            echo_window_ms: 3_000,
            undo_capacity: 10,
            validation: ValidationPolicy::default(),
            severity: SeverityThresholds::default(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))
    }

    /// Echo suppression window as a `Duration`.
    pub const fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    /// Minutes per pixel along the time axis.
    pub fn minutes_per_px(&self) -> f64 {
        if self.axis_height_px <= 0.0 {
            return 0.0;
        }
        self.day_range_hours * 60.0 / self.axis_height_px
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_minutes == 0 || i64::from(self.grid_minutes) > MINUTES_PER_DAY {
            return Err(Error::Config(format!(
                "grid_minutes must be within 1..=1440, got {}",
                self.grid_minutes
            )));
        }
        if !(self.day_range_hours > 0.0 && self.day_range_hours <= 24.0) {
            return Err(Error::Config(
                "day_range_hours must be within (0, 24]".to_string(),
            ));
        }
        if self.axis_height_px <= 0.0 || self.day_width_px <= 0.0 {
            return Err(Error::Config(
                "axis_height_px and day_width_px must be positive".to_string(),
            ));
        }
        if self.drag_threshold_px < 0.0 {
            return Err(Error::Config(
                "drag_threshold_px cannot be negative".to_string(),
            ));
        }
        if self.undo_capacity == 0 {
            return Err(Error::Config("undo_capacity must be at least 1".to_string()));
        }
        if self.severity.moderate_minutes <= 0
            || self.severity.severe_minutes < self.severity.moderate_minutes
        {
            return Err(Error::Config(
                "severity thresholds must satisfy 0 < moderate <= severe".to_string(),
            ));
        }
        if self.validation.min_duration_minutes < 0 {
            return Err(Error::Config(
                "min_duration_minutes cannot be negative".to_string(),
            ));
        }
        let (start, end) = self.validation.business_bounds()?;
        if start >= end {
            return Err(Error::Config(
                "business_start must be before business_end".to_string(),
            ));
        }
        Ok(())
    }
}
