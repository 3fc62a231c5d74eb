use std::path::Path;

use haulboard_core::segment::split_by_date;
use haulboard_core::time_math::format_short_time;
use haulboard_core::{Schedule, ScheduleSegment};
use serde::Serialize;

use crate::commands::common::{
    format_datetime, normalize_schedule_identifier, open_database, resolve_schedule,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ScheduleDetails<'a> {
    schedule: &'a Schedule,
    segments: Vec<ScheduleSegment>,
}

pub fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_schedule_identifier(id)?;
    let db = open_database(db_path)?;
    let schedule = resolve_schedule(&normalized_id, &db)?;
    let segments = split_by_date(&schedule);

    if as_json {
        let details = ScheduleDetails {
            schedule: &schedule,
            segments,
        };
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    for line in format_details(&schedule, &segments) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_details(schedule: &Schedule, segments: &[ScheduleSegment]) -> Vec<String> {
    let field = |label: &str, value: Option<&str>| format!("{label:<10} {}", value.unwrap_or("-"));

    let mut lines = vec![
        format!("{:<10} {}", "id", schedule.id),
        format!("{:<10} {}", "loading", format_datetime(schedule.loading_at)),
        format!("{:<10} {}", "delivery", format_datetime(schedule.delivery_at)),
        field("driver", schedule.driver_id.as_deref()),
        field("vehicle", schedule.vehicle_id.as_deref()),
        field("client", schedule.client_id.as_deref()),
        field("route", schedule.route_name.as_deref()),
        field("cargo", schedule.cargo.as_deref()),
    ];
    if let Some(fare) = schedule.fare {
        lines.push(format!("{:<10} {fare}", "fare"));
    }

    if segments.len() > 1 {
        lines.push(String::new());
        for segment in segments {
            let marker = if segment.is_start {
                "start"
            } else if segment.is_end {
                "end"
            } else {
                "through"
            };
            lines.push(format!(
                "  {}  {}-{}  {marker}",
                segment.date,
                format_short_time(segment.start_time),
                format_short_time(segment.end_time)
            ));
        }
    }

    lines
}
