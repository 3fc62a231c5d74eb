use std::path::Path;

use haulboard_core::db::ScheduleRepository;
use haulboard_core::ScheduleId;

use crate::commands::common::{normalize_schedule_identifier, open_database, resolve_schedule};
use crate::error::CliError;

pub fn run_delete(id: &str, db_path: &Path) -> Result<ScheduleId, CliError> {
    let normalized_id = normalize_schedule_identifier(id)?;
    let db = open_database(db_path)?;
    let schedule = resolve_schedule(&normalized_id, &db)?;

    db.schedules().delete(&schedule.id)?;
    tracing::info!("Deleted schedule {}", schedule.id);
    println!("{}", schedule.id);
    Ok(schedule.id)
}
