use std::path::Path;

use haulboard_core::db::ScheduleRepository;
use haulboard_core::layout::assign_layout_for_date;
use haulboard_core::segment::segments_for_date;
use haulboard_core::time_math::format_short_time;
use haulboard_core::util::short_id;
use serde::Serialize;

use crate::commands::common::{open_database, parse_date_arg};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LaneItem {
    pub id: String,
    pub start: String,
    pub end: String,
    pub column: usize,
    pub total_columns: usize,
    pub continuation: bool,
}

pub fn day_lanes(
    date: &str,
    driver: Option<&str>,
    vehicle: Option<&str>,
    db_path: &Path,
) -> Result<Vec<LaneItem>, CliError> {
    let date = parse_date_arg(date)?;
    let db = open_database(db_path)?;

    let schedules = db
        .schedules()
        .list_between(date, date)?
        .into_iter()
        .filter(|schedule| driver.is_none() || schedule.driver_id.as_deref() == driver)
        .filter(|schedule| vehicle.is_none() || schedule.vehicle_id.as_deref() == vehicle)
        .collect::<Vec<_>>();

    let lanes = assign_layout_for_date(&schedules, date);
    let mut items = segments_for_date(&schedules, date)
        .into_iter()
        .filter_map(|segment| {
            let lane = lanes.get(&segment.schedule_id)?;
            Some(LaneItem {
                id: segment.schedule_id.to_string(),
                start: format_short_time(segment.start_time),
                end: format_short_time(segment.end_time),
                column: lane.column,
                total_columns: lane.total_columns,
                continuation: segment.is_continuation,
            })
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| a.start.cmp(&b.start).then(a.column.cmp(&b.column)));

    Ok(items)
}

pub fn run_layout(
    date: &str,
    driver: Option<&str>,
    vehicle: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let items = day_lanes(date, driver, vehicle, db_path)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No schedules on {date}.");
    } else {
        for item in &items {
            println!(
                "[{}/{}]  {}-{}  {}{}",
                item.column + 1,
                item.total_columns,
                item.start,
                item.end,
                short_id(&item.id),
                if item.continuation { "  (cont.)" } else { "" }
            );
        }
    }
    Ok(())
}
