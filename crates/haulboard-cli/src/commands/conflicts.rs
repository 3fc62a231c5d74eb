use std::path::Path;

use haulboard_core::db::ScheduleRepository;
use haulboard_core::time_math::{format_short_time, parse_time};
use haulboard_core::{ConflictCheck, ConflictDetector, CoreConfig};

use crate::cli::AxisArg;
use crate::commands::common::{
    normalize_schedule_identifier, open_database, parse_date_arg, resolve_schedule,
};
use crate::error::CliError;

pub fn check_conflicts(
    id: &str,
    date: &str,
    start: &str,
    end: &str,
    axis: AxisArg,
    config: &CoreConfig,
    db_path: &Path,
) -> Result<ConflictCheck, CliError> {
    let normalized_id = normalize_schedule_identifier(id)?;
    let date = parse_date_arg(date)?;
    let start = parse_time(start).map_err(|error| CliError::InvalidArgument(error.to_string()))?;
    let end = parse_time(end).map_err(|error| CliError::InvalidArgument(error.to_string()))?;
    if end <= start {
        return Err(CliError::InvalidArgument(format!(
            "end {} must be after start {}",
            format_short_time(end),
            format_short_time(start)
        )));
    }

    let db = open_database(db_path)?;
    let schedule = resolve_schedule(&normalized_id, &db)?;
    let others = db.schedules().list_between(date, date)?;

    let detector = ConflictDetector::new(config.severity);
    let mut check = ConflictCheck::none();
    for axis in axis.axes() {
        check.merge(detector.check_conflict(&schedule, date, start, end, &others, *axis));
    }
    Ok(check)
}

#[allow(clippy::too_many_arguments)]
pub fn run_conflicts(
    id: &str,
    date: &str,
    start: &str,
    end: &str,
    axis: AxisArg,
    as_json: bool,
    config: &CoreConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let check = check_conflicts(id, date, start, end, axis, config, db_path)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else {
        for line in format_conflict_lines(&check) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_conflict_lines(check: &ConflictCheck) -> Vec<String> {
    let mut lines = vec![check.summary.clone()];
    for detail in &check.details {
        lines.push(format!(
            "  {} {}  {}  {}-{}  {} min  {}",
            detail.axis,
            detail.resource_id,
            detail.schedule_id,
            format_short_time(detail.overlap_start),
            format_short_time(detail.overlap_end),
            detail.overlap_minutes,
            detail.severity.label()
        ));
    }
    lines
}
