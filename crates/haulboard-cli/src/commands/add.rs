use std::path::Path;

use haulboard_core::db::ScheduleRepository;
use haulboard_core::util::normalize_text_option;
use haulboard_core::{
    ConflictDetector, CoreConfig, MoveValidator, Placement, ResourceAxis, Schedule, ScheduleId,
};

use crate::cli::AddArgs;
use crate::commands::common::{normalize_schedule_identifier, open_database, parse_datetime_arg};
use crate::error::CliError;

pub fn run_add(args: &AddArgs, config: &CoreConfig, db_path: &Path) -> Result<ScheduleId, CliError> {
    let schedule = schedule_from_args(args)?;

    MoveValidator::new(&config.validation)?
        .validate_placement(&Placement::of(&schedule))
        .into_result()?;

    let db = open_database(db_path)?;
    let repo = db.schedules();

    let existing = repo.list_between(schedule.loading_date(), schedule.delivery_date())?;
    let check = ConflictDetector::new(config.severity).check_placement(
        &schedule,
        &Placement::of(&schedule),
        &existing,
        &ResourceAxis::ALL,
    );
    if check.has_conflict {
        eprintln!("Warning: {}", check.summary);
        for detail in &check.details {
            eprintln!(
                "  {} {} overlaps {} on {} for {} min ({})",
                detail.axis,
                detail.resource_id,
                detail.schedule_id,
                detail.date,
                detail.overlap_minutes,
                detail.severity.label()
            );
        }
    }

    let created = repo.create(&schedule)?;
    tracing::info!("Created schedule {}", created.id);
    println!("{}", created.id);
    Ok(created.id)
}

fn schedule_from_args(args: &AddArgs) -> Result<Schedule, CliError> {
    let loading_at = parse_datetime_arg(&args.loading)?;
    let delivery_at = parse_datetime_arg(&args.delivery)?;
    let mut schedule = Schedule::new(loading_at, delivery_at)?;

    if let Some(id) = &args.id {
        schedule = schedule.with_id(normalize_schedule_identifier(id)?);
    }
    schedule.driver_id = normalize_text_option(args.driver.clone());
    schedule.vehicle_id = normalize_text_option(args.vehicle.clone());
    schedule.client_id = normalize_text_option(args.client.clone());
    schedule.route_name = normalize_text_option(args.route.clone());
    schedule.cargo = normalize_text_option(args.cargo.clone());
    schedule.fare = args.fare;

    Ok(schedule)
}
