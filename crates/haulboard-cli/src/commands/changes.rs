use std::path::Path;

use chrono::DateTime;
use haulboard_core::db::ChangeRecord;
use serde::Serialize;

use crate::commands::common::open_database;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ChangeItem {
    pub seq: i64,
    pub kind: String,
    pub schedule_id: String,
    pub changed_at: i64,
}

impl From<ChangeRecord> for ChangeItem {
    fn from(record: ChangeRecord) -> Self {
        Self {
            seq: record.seq,
            kind: record.kind.to_string(),
            schedule_id: record.schedule_id.to_string(),
            changed_at: record.changed_at,
        }
    }
}

pub fn list_changes(since: i64, limit: usize, db_path: &Path) -> Result<Vec<ChangeItem>, CliError> {
    let db = open_database(db_path)?;
    let records = db.schedules().changes_since(since, limit)?;
    Ok(records.into_iter().map(ChangeItem::from).collect())
}

pub fn run_changes(since: i64, limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let changes = list_changes(since, limit, db_path)?;

    for change in &changes {
        if as_json {
            println!("{}", serde_json::to_string(change)?);
        } else {
            let when = DateTime::from_timestamp_millis(change.changed_at)
                .map_or_else(|| change.changed_at.to_string(), |at| at.to_rfc3339());
            println!(
                "{:>6}  {:<6}  {}  {when}",
                change.seq, change.kind, change.schedule_id
            );
        }
    }

    Ok(())
}
