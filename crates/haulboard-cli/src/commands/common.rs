use std::env;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use haulboard_core::db::{Database, ScheduleRepository};
use haulboard_core::time_math::{parse_date, parse_day_bound, parse_time, MINUTES_PER_DAY};
use haulboard_core::util::{short_id, truncate_text, SHORT_ID_LEN};
use haulboard_core::{CoreConfig, Placement, Schedule, ScheduleId};
use serde::Serialize;

use crate::error::CliError;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const ROUTE_PREVIEW_LEN: usize = 32;

#[derive(Debug, Serialize)]
pub struct ScheduleListItem {
    pub id: String,
    pub loading_at: String,
    pub delivery_at: String,
    pub day_span: u32,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub client_id: Option<String>,
    pub route_name: Option<String>,
}

pub fn schedule_to_list_item(schedule: &Schedule) -> ScheduleListItem {
    ScheduleListItem {
        id: schedule.id.to_string(),
        loading_at: format_datetime(schedule.loading_at),
        delivery_at: format_datetime(schedule.delivery_at),
        day_span: schedule.day_span(),
        driver_id: schedule.driver_id.clone(),
        vehicle_id: schedule.vehicle_id.clone(),
        client_id: schedule.client_id.clone(),
        route_name: schedule.route_name.clone(),
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("HAULBOARD_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haulboard")
        .join("haulboard.db")
}

pub fn resolve_config_path(cli_config: Option<PathBuf>) -> PathBuf {
    cli_config
        .or_else(|| env::var_os("HAULBOARD_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haulboard")
        .join("config.json")
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<CoreConfig, CliError> {
    Ok(CoreConfig::load_from_path(path)?)
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(Database::open(path)?)
}

pub fn normalize_schedule_identifier(raw_id: &str) -> Result<String, CliError> {
    let normalized = raw_id.trim();
    if normalized.is_empty() {
        return Err(CliError::EmptyScheduleId);
    }
    Ok(normalized.to_string())
}

/// Find a schedule by exact id or by a unique id prefix.
pub fn resolve_schedule(query: &str, db: &Database) -> Result<Schedule, CliError> {
    let repo = db.schedules();

    if let Some(schedule) = repo.get(&ScheduleId::from(query))? {
        return Ok(schedule);
    }

    let matching_ids = repo.list_ids_by_prefix(query, 3)?;
    match matching_ids.as_slice() {
        [] => Err(CliError::ScheduleNotFound(query.to_string())),
        [id] => repo
            .get(id)?
            .ok_or_else(|| CliError::ScheduleNotFound(query.to_string())),
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| short_id(id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousScheduleId(format!(
                "Schedule ID prefix '{query}' is ambiguous. Use at least {SHORT_ID_LEN} characters. Matches: {options}"
            )))
        }
    }
}

/// Parse `YYYY-MM-DD HH:MM` (a `T` separator and seconds are accepted too).
pub fn parse_datetime_arg(value: &str) -> Result<NaiveDateTime, CliError> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "'{value}' is not a date-time, expected YYYY-MM-DD HH:MM"
            ))
        })
}

pub fn parse_date_arg(value: &str) -> Result<NaiveDate, CliError> {
    parse_date(value).map_err(|error| CliError::InvalidArgument(error.to_string()))
}

/// Build the placement a `move` asks for.
///
/// Without an end the schedule keeps its duration. An end earlier than the
/// start lands on the following day, and `24:00` closes the date.
pub fn build_placement(
    date: &str,
    start: &str,
    end: Option<&str>,
    current: &Schedule,
) -> Result<Placement, CliError> {
    let date = parse_date_arg(date)?;
    let start = parse_time(start).map_err(|error| CliError::InvalidArgument(error.to_string()))?;

    let start_at = date.and_time(start);
    let end_at = match end {
        Some(end) if parse_day_bound(end).is_ok_and(|minutes| minutes == MINUTES_PER_DAY) => {
            next_day(date.and_time(NaiveTime::MIN))
        }
        Some(end) => {
            let end =
                parse_time(end).map_err(|error| CliError::InvalidArgument(error.to_string()))?;
            if end < start {
                next_day(date.and_time(end))
            } else {
                Some(date.and_time(end))
            }
        }
        None => TimeDelta::try_minutes(current.duration_minutes())
            .and_then(|duration| start_at.checked_add_signed(duration)),
    }
    .ok_or_else(|| CliError::InvalidArgument("end is outside the calendar".to_string()))?;

    let day_span = u32::try_from((end_at.date() - date).num_days())
        .map_err(|_| CliError::InvalidArgument("end is before start".to_string()))?;

    Ok(Placement {
        date,
        start,
        end: end_at.time(),
        day_span,
    })
}

fn next_day(at: NaiveDateTime) -> Option<NaiveDateTime> {
    at.checked_add_signed(TimeDelta::days(1))
}

pub fn format_datetime(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

fn format_resource(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub fn format_schedule_lines(schedules: &[Schedule]) -> Vec<String> {
    if schedules.is_empty() {
        return vec!["No schedules found.".to_string()];
    }

    schedules
        .iter()
        .map(|schedule| {
            format!(
                "{}  {} -> {}  driver:{}  vehicle:{}  {}",
                short_id(schedule.id.as_str()),
                format_datetime(schedule.loading_at),
                format_datetime(schedule.delivery_at),
                format_resource(schedule.driver_id.as_deref()),
                format_resource(schedule.vehicle_id.as_deref()),
                truncate_text(
                    schedule.route_name.as_deref().unwrap_or_default(),
                    ROUTE_PREVIEW_LEN
                ),
            )
            .trim_end()
            .to_string()
        })
        .collect()
}
