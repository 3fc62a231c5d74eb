use std::path::Path;

use haulboard_core::db::ScheduleRepository;
use haulboard_core::models::shift_date;
use haulboard_core::Schedule;

use crate::commands::common::{
    format_schedule_lines, open_database, parse_date_arg, schedule_to_list_item, ScheduleListItem,
};
use crate::error::CliError;

pub fn list_schedules(
    date: Option<&str>,
    days: u32,
    db_path: &Path,
) -> Result<Vec<Schedule>, CliError> {
    let db = open_database(db_path)?;
    let repo = db.schedules();

    match date {
        Some(date) => {
            let from = parse_date_arg(date)?;
            let to = shift_date(from, i64::from(days.max(1)) - 1);
            Ok(repo.list_between(from, to)?)
        }
        None => Ok(repo.list()?),
    }
}

pub fn run_list(
    date: Option<&str>,
    days: u32,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let schedules = list_schedules(date, days, db_path)?;

    if as_json {
        let json_items = schedules
            .iter()
            .map(schedule_to_list_item)
            .collect::<Vec<ScheduleListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_schedule_lines(&schedules) {
            println!("{line}");
        }
    }

    Ok(())
}
