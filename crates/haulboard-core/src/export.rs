//! Schedule export helpers for the CLI.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::Schedule;
use crate::segment::split_by_date;
use crate::time_math::format_short_time;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Flat schedule record used in exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSchedule {
    pub id: String,
    pub loading_at: String,
    pub delivery_at: String,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub client_id: Option<String>,
    pub route_name: Option<String>,
    pub cargo: Option<String>,
    pub fare: Option<u64>,
    /// Calendar days the schedule is drawn on
    pub days: Vec<String>,
}

#[must_use]
pub fn schedule_to_export_item(schedule: &Schedule) -> ExportSchedule {
    ExportSchedule {
        id: schedule.id.to_string(),
        loading_at: schedule.loading_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        delivery_at: schedule.delivery_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        driver_id: schedule.driver_id.clone(),
        vehicle_id: schedule.vehicle_id.clone(),
        client_id: schedule.client_id.clone(),
        route_name: schedule.route_name.clone(),
        cargo: schedule.cargo.clone(),
        fare: schedule.fare,
        days: split_by_date(schedule)
            .iter()
            .map(|segment| {
                format!(
                    "{} {}-{}",
                    segment.date,
                    format_short_time(segment.start_time),
                    format_short_time(segment.end_time)
                )
            })
            .collect(),
    }
}

/// Render schedules as pretty-printed JSON.
pub fn render_json_export(schedules: &[Schedule]) -> serde_json::Result<String> {
    let items = schedules
        .iter()
        .map(schedule_to_export_item)
        .collect::<Vec<ExportSchedule>>();
    serde_json::to_string_pretty(&items)
}

/// Render schedules as CSV with a header row.
#[must_use]
pub fn render_csv_export(schedules: &[Schedule]) -> String {
    let mut output =
        String::from("id,loading_at,delivery_at,driver_id,vehicle_id,client_id,route_name,cargo,fare\n");

    for schedule in schedules {
        let item = schedule_to_export_item(schedule);
        let fields = [
            item.id,
            item.loading_at,
            item.delivery_at,
            item.driver_id.unwrap_or_default(),
            item.vehicle_id.unwrap_or_default(),
            item.client_id.unwrap_or_default(),
            item.route_name.unwrap_or_default(),
            item.cargo.unwrap_or_default(),
            item.fare.map(|fare| fare.to_string()).unwrap_or_default(),
        ];
        let line = fields
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(output, "{line}");
    }

    output
}

/// Render schedules in the selected format.
pub fn render_schedules_export(
    schedules: &[Schedule],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(schedules),
        ExportFormat::Csv => Ok(render_csv_export(schedules)),
    }
}

#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("haulboard-export-{timestamp_ms}.{}", format.extension())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    fn overnight() -> Schedule {
        let mut schedule = Schedule::new(at("2025-01-10 22:00"), at("2025-01-11 02:00"))
            .unwrap()
            .with_id("night")
            .with_driver("D1");
        schedule.cargo = Some("steel, coiled".to_string());
        schedule.fare = Some(42_000);
        schedule
    }

    #[test]
    fn export_item_lists_each_day() {
        let item = schedule_to_export_item(&overnight());
        assert_eq!(item.loading_at, "2025-01-10T22:00:00");
        assert_eq!(
            item.days,
            vec!["2025-01-10 22:00-23:59", "2025-01-11 00:00-02:00"]
        );
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let csv = render_csv_export(&[overnight()]);
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,loading_at"));
        assert_eq!(
            lines.next().unwrap(),
            "night,2025-01-10T22:00:00,2025-01-11T02:00:00,D1,,,,\"steel, coiled\",42000"
        );
    }

    #[test]
    fn json_export_is_an_array() {
        let json = render_schedules_export(&[overnight()], ExportFormat::Json).unwrap();
        let parsed: Vec<ExportSchedule> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].driver_id.as_deref(), Some("D1"));
    }

    #[test]
    fn suggested_name_uses_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Csv, 7),
            "haulboard-export-7.csv"
        );
    }
}
