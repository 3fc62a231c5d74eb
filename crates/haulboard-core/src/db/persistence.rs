//! `SQLite`-backed persistence collaborator and change feed

use rusqlite::ErrorCode;

use crate::error::{CommitError, Error, Result};
use crate::feed::{ChangeKind, RemoteChange};
use crate::models::{Schedule, ScheduleId, SchedulePatch};
use crate::persistence::{CommitResult, Persistence};

use super::connection::Database;
use super::repository::{ScheduleRepository, SqliteScheduleRepository};

/// Commits controller mutations to a local database
pub struct SqlitePersistence<'a> {
    db: &'a Database,
}

impl<'a> SqlitePersistence<'a> {
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

impl Persistence for SqlitePersistence<'_> {
    async fn commit_create(&self, schedule: &Schedule) -> CommitResult<Schedule> {
        self.db.schedules().create(schedule).map_err(to_commit_error)
    }

    async fn commit_update(
        &self,
        id: &ScheduleId,
        patch: &SchedulePatch,
    ) -> CommitResult<Schedule> {
        self.db.schedules().update(id, patch).map_err(to_commit_error)
    }

    async fn commit_delete(&self, id: &ScheduleId) -> CommitResult<()> {
        self.db.schedules().delete(id).map_err(to_commit_error)
    }
}

fn to_commit_error(error: Error) -> CommitError {
    match error {
        Error::NotFound(id) => CommitError::NotFound(id),
        Error::InvalidInput(message) => CommitError::Constraint(message),
        Error::Database(rusqlite::Error::SqliteFailure(failure, message))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            CommitError::Constraint(message.unwrap_or_else(|| failure.to_string()))
        }
        other => CommitError::Transport(other.to_string()),
    }
}

/// Turns the change log into [`RemoteChange`] events.
///
/// Insert and update entries carry the row as it is when polled. An entry
/// whose row is already gone is skipped; the delete that removed it follows
/// later in the log.
pub struct SqliteChangeFeed<'a> {
    repo: SqliteScheduleRepository<'a>,
    cursor: i64,
}

impl<'a> SqliteChangeFeed<'a> {
    /// Feed starting after change `cursor`.
    pub const fn new(db: &'a Database, cursor: i64) -> Self {
        Self {
            repo: db.schedules(),
            cursor,
        }
    }

    /// Feed starting after the newest logged change.
    pub fn from_latest(db: &'a Database) -> Result<Self> {
        let cursor = db.schedules().latest_change_seq()?;
        Ok(Self::new(db, cursor))
    }

    pub const fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Next batch of events, advancing the cursor past them.
    pub fn poll(&mut self, limit: usize) -> Result<Vec<(i64, RemoteChange)>> {
        let records = self.repo.changes_since(self.cursor, limit)?;
        let mut events = Vec::with_capacity(records.len());

        for record in records {
            self.cursor = record.seq;
            let change = match record.kind {
                ChangeKind::Delete => Some(RemoteChange::Delete {
                    id: record.schedule_id.clone(),
                }),
                ChangeKind::Insert => self
                    .repo
                    .get(&record.schedule_id)?
                    .map(|schedule| RemoteChange::Insert { schedule }),
                ChangeKind::Update => self
                    .repo
                    .get(&record.schedule_id)?
                    .map(|schedule| RemoteChange::Update { schedule }),
            };
            match change {
                Some(change) => events.push((record.seq, change)),
                None => tracing::debug!(
                    "Skipping change {} for removed schedule {}",
                    record.seq,
                    record.schedule_id
                ),
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    fn schedule(id: &str) -> Schedule {
        Schedule::new(at("2025-01-10 09:00"), at("2025-01-10 11:00"))
            .unwrap()
            .with_id(id)
    }

    #[tokio::test]
    async fn commits_reach_the_database() {
        let db = Database::open_in_memory().unwrap();
        let persistence = SqlitePersistence::new(&db);

        persistence.commit_create(&schedule("s1")).await.unwrap();
        let patch = SchedulePatch {
            driver_id: Some(Some("D2".to_string())),
            ..SchedulePatch::default()
        };
        let updated = persistence
            .commit_update(&ScheduleId::from("s1"), &patch)
            .await
            .unwrap();
        assert_eq!(updated.driver_id.as_deref(), Some("D2"));

        persistence
            .commit_delete(&ScheduleId::from("s1"))
            .await
            .unwrap();
        assert_eq!(db.schedules().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn failures_map_to_commit_errors() {
        let db = Database::open_in_memory().unwrap();
        let persistence = SqlitePersistence::new(&db);
        persistence.commit_create(&schedule("s1")).await.unwrap();

        let duplicate = persistence.commit_create(&schedule("s1")).await;
        assert!(matches!(duplicate, Err(CommitError::Constraint(_))));

        let missing = persistence.commit_delete(&ScheduleId::from("nope")).await;
        assert_eq!(missing, Err(CommitError::NotFound("nope".to_string())));

        let reversed = SchedulePatch {
            delivery_at: Some(at("2025-01-10 08:00")),
            ..SchedulePatch::default()
        };
        let rejected = persistence
            .commit_update(&ScheduleId::from("s1"), &reversed)
            .await;
        assert!(matches!(rejected, Err(CommitError::Constraint(_))));
    }

    #[test]
    fn feed_replays_changes_after_cursor() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.schedules();
        repo.create(&schedule("old")).unwrap();

        let mut feed = SqliteChangeFeed::from_latest(&db).unwrap();
        repo.create(&schedule("new")).unwrap();
        repo.update(
            &ScheduleId::from("old"),
            &SchedulePatch {
                vehicle_id: Some(Some("V1".to_string())),
                ..SchedulePatch::default()
            },
        )
        .unwrap();
        repo.delete(&ScheduleId::from("new")).unwrap();

        let events: Vec<RemoteChange> = feed.poll(10).unwrap().into_iter().map(|(_, e)| e).collect();
        // the insert of "new" is skipped: its row is gone by poll time
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RemoteChange::Update { schedule } if schedule.vehicle_id.as_deref() == Some("V1")));
        assert_eq!(events[1], RemoteChange::Delete { id: ScheduleId::from("new") });
        assert!(feed.poll(10).unwrap().is_empty());
    }

    #[test]
    fn feed_reports_delete_of_existing_schedule() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.schedules();
        repo.create(&schedule("gone")).unwrap();

        let mut feed = SqliteChangeFeed::from_latest(&db).unwrap();
        repo.delete(&ScheduleId::from("gone")).unwrap();

        let events = feed.poll(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, RemoteChange::Delete { id: ScheduleId::from("gone") });
        assert_eq!(feed.cursor(), events[0].0);
    }
}
