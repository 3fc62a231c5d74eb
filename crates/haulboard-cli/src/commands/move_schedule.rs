use std::path::Path;
use std::time::Instant;

use haulboard_core::db::{Database, ScheduleRepository, SqliteChangeFeed, SqlitePersistence};
use haulboard_core::util::short_id;
use haulboard_core::{
    CommitOutcome, ConflictCheck, CoreConfig, MoveController, MoveStep, RemoteOutcome, Schedule,
};

use crate::cli::MoveArgs;
use crate::commands::common::{
    build_placement, format_datetime, normalize_schedule_identifier, open_database,
    resolve_schedule,
};
use crate::commands::conflicts::format_conflict_lines;
use crate::error::CliError;

const FEED_BATCH: usize = 100;

pub async fn run_move(
    args: &MoveArgs,
    config: &CoreConfig,
    db_path: &Path,
) -> Result<Schedule, CliError> {
    let normalized_id = normalize_schedule_identifier(&args.id)?;
    let db = open_database(db_path)?;
    let current = resolve_schedule(&normalized_id, &db)?;
    let placement = build_placement(&args.date, &args.start, args.end.as_deref(), &current)?;

    let mut controller = MoveController::from_config(config.clone())?;
    controller.store_mut().load(db.schedules().list()?);
    let mut feed = SqliteChangeFeed::from_latest(&db)?;

    let now = Instant::now();
    let step = controller.propose(&current.id, placement, now);
    let step = match step {
        MoveStep::NeedsConfirmation(check) if args.force => {
            for line in format_conflict_lines(&check) {
                eprintln!("Warning: {line}");
            }
            controller.confirm(now)
        }
        MoveStep::NeedsConfirmation(check) => {
            for line in format_conflict_lines(&check) {
                eprintln!("{line}");
            }
            controller.cancel();
            return Err(CliError::Conflict(describe_conflicts(&check)));
        }
        step => step,
    };

    let moved = match step {
        MoveStep::ReadyToCommit => commit(&mut controller, &db).await?,
        MoveStep::NoOp => {
            tracing::info!("Schedule {} is already at the requested placement", current.id);
            current
        }
        MoveStep::Invalid(report) => {
            return Err(haulboard_core::Error::Validation(report).into());
        }
        other => return Err(CliError::NotCommitted(format!("{other:?}"))),
    };

    drain_echoes(&mut controller, &mut feed)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&moved)?);
    } else {
        println!(
            "{}  {} -> {}",
            short_id(moved.id.as_str()),
            format_datetime(moved.loading_at),
            format_datetime(moved.delivery_at)
        );
    }
    Ok(moved)
}

async fn commit(controller: &mut MoveController, db: &Database) -> Result<Schedule, CliError> {
    let persistence = SqlitePersistence::new(db);
    match controller.commit(&persistence).await? {
        CommitOutcome::Committed { schedule, .. } => Ok(schedule),
        other => Err(CliError::NotCommitted(format!("{other:?}"))),
    }
}

/// Feed our own writes back through the store so they are recognised as
/// echoes; anything else that arrived meanwhile is applied.
fn drain_echoes(
    controller: &mut MoveController,
    feed: &mut SqliteChangeFeed<'_>,
) -> Result<(), CliError> {
    for (seq, change) in feed.poll(FEED_BATCH)? {
        let schedule_id = change.schedule_id().clone();
        match controller.handle_remote(change, Instant::now()) {
            RemoteOutcome::Suppressed => {
                tracing::debug!("Change {seq} on {schedule_id} is our own echo");
            }
            outcome => tracing::debug!("Change {seq} on {schedule_id}: {outcome:?}"),
        }
    }
    Ok(())
}

fn describe_conflicts(check: &ConflictCheck) -> String {
    check
        .conflicting_ids()
        .map(|id| short_id(id.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
