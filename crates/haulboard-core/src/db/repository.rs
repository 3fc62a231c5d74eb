//! Schedule repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::feed::ChangeKind;
use crate::models::{Schedule, ScheduleId, SchedulePatch};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str = "SELECT id, loading_at, delivery_at, client_id, driver_id, vehicle_id,
        route_name, loading_location, loading_address, delivery_location, delivery_address,
        cargo, billing_date, fare, created_at, updated_at
     FROM schedules";

/// Trait for schedule storage operations
pub trait ScheduleRepository {
    /// Insert a new schedule
    fn create(&self, schedule: &Schedule) -> Result<Schedule>;

    /// Get a schedule by ID
    fn get(&self, id: &ScheduleId) -> Result<Option<Schedule>>;

    /// All schedules ordered by loading time
    fn list(&self) -> Result<Vec<Schedule>>;

    /// Schedules with at least one segment in `[from, to]`
    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Schedule>>;

    /// Apply a partial update and return the stored row
    fn update(&self, id: &ScheduleId, patch: &SchedulePatch) -> Result<Schedule>;

    /// Delete a schedule
    fn delete(&self, id: &ScheduleId) -> Result<()>;

    /// Number of stored schedules
    fn count(&self) -> Result<usize>;

    /// IDs starting with `prefix`, at most `limit`
    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ScheduleId>>;
}

/// One row of the change log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub seq: i64,
    pub kind: ChangeKind,
    pub schedule_id: ScheduleId,
    pub changed_at: i64,
}

/// `SQLite` implementation of `ScheduleRepository`
pub struct SqliteScheduleRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteScheduleRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Change-log entries after `seq`, oldest first
    pub fn changes_since(&self, seq: i64, limit: usize) -> Result<Vec<ChangeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, kind, schedule_id, changed_at
             FROM schedule_changes
             WHERE seq > ?
             ORDER BY seq ASC
             LIMIT ?",
        )?;

        let records = stmt
            .query_map(params![seq, limit as i64], |row| {
                let kind: String = row.get(1)?;
                let id: String = row.get(2)?;
                Ok(ChangeRecord {
                    seq: row.get(0)?,
                    kind: parse_change_kind(&kind).map_err(|error| conversion_error(1, error))?,
                    schedule_id: ScheduleId::from(id),
                    changed_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Highest change-log sequence number, 0 when empty
    pub fn latest_change_seq(&self) -> Result<i64> {
        let seq = self.conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM schedule_changes",
            [],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    fn write(&self, sql: &str, schedule: &Schedule) -> rusqlite::Result<usize> {
        let fare = schedule
            .fare
            .map(i64::try_from)
            .transpose()
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;

        self.conn.execute(
            sql,
            params![
                schedule.id.as_str(),
                schedule.loading_at.format(DATETIME_FORMAT).to_string(),
                schedule.delivery_at.format(DATETIME_FORMAT).to_string(),
                schedule.client_id,
                schedule.driver_id,
                schedule.vehicle_id,
                schedule.route_name,
                schedule.loading_location,
                schedule.loading_address,
                schedule.delivery_location,
                schedule.delivery_address,
                schedule.cargo,
                schedule
                    .billing_date
                    .map(|date| date.format(DATE_FORMAT).to_string()),
                fare,
                schedule.created_at,
                schedule.updated_at,
            ],
        )
    }

    /// Parse a schedule from a database row
    fn parse_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
        let id: String = row.get(0)?;
        let billing_date: Option<String> = row.get(12)?;
        let fare: Option<i64> = row.get(13)?;

        Ok(Schedule {
            id: ScheduleId::from(id),
            loading_at: parse_datetime(row, 1)?,
            delivery_at: parse_datetime(row, 2)?,
            client_id: row.get(3)?,
            driver_id: row.get(4)?,
            vehicle_id: row.get(5)?,
            route_name: row.get(6)?,
            loading_location: row.get(7)?,
            loading_address: row.get(8)?,
            delivery_location: row.get(9)?,
            delivery_address: row.get(10)?,
            cargo: row.get(11)?,
            billing_date: billing_date
                .map(|value| NaiveDate::parse_from_str(&value, DATE_FORMAT))
                .transpose()
                .map_err(|error| conversion_error(12, error))?,
            fare: fare
                .map(u64::try_from)
                .transpose()
                .map_err(|error| conversion_error(13, error))?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn create(&self, schedule: &Schedule) -> Result<Schedule> {
        self.write(
            "INSERT INTO schedules (id, loading_at, delivery_at, client_id, driver_id, vehicle_id,
                route_name, loading_location, loading_address, delivery_location, delivery_address,
                cargo, billing_date, fare, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            schedule,
        )?;
        tracing::debug!("Created schedule {}", schedule.id);
        Ok(schedule.clone())
    }

    fn get(&self, id: &ScheduleId) -> Result<Option<Schedule>> {
        let schedule = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?"),
                params![id.as_str()],
                Self::parse_schedule,
            )
            .optional()?;
        Ok(schedule)
    }

    fn list(&self) -> Result<Vec<Schedule>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY loading_at ASC, id ASC"))?;

        let schedules = stmt
            .query_map([], Self::parse_schedule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(schedules)
    }

    fn list_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Schedule>> {
        let window_start = from.and_hms_opt(0, 0, 0).unwrap_or_default();
        let window_end = to.succ_opt().unwrap_or(to).and_hms_opt(0, 0, 0).unwrap_or_default();

        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE loading_at < ? AND delivery_at >= ?
             ORDER BY loading_at ASC, id ASC"
        ))?;

        let schedules = stmt
            .query_map(
                params![
                    window_end.format(DATETIME_FORMAT).to_string(),
                    window_start.format(DATETIME_FORMAT).to_string()
                ],
                Self::parse_schedule,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(schedules)
    }

    fn update(&self, id: &ScheduleId, patch: &SchedulePatch) -> Result<Schedule> {
        let mut schedule = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        patch.apply(&mut schedule)?;
        schedule.touch();

        let rows = self.write(
            "UPDATE schedules SET loading_at = ?2, delivery_at = ?3, client_id = ?4,
                driver_id = ?5, vehicle_id = ?6, route_name = ?7, loading_location = ?8,
                loading_address = ?9, delivery_location = ?10, delivery_address = ?11,
                cargo = ?12, billing_date = ?13, fare = ?14, created_at = ?15, updated_at = ?16
             WHERE id = ?1",
            &schedule,
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(schedule)
    }

    fn delete(&self, id: &ScheduleId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM schedules WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))?;
        Ok(count)
    }

    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ScheduleId>> {
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let mut stmt = self.conn.prepare(
            "SELECT id FROM schedules WHERE id LIKE ? ESCAPE '\\' ORDER BY id ASC LIMIT ?",
        )?;

        let ids = stmt
            .query_map(params![format!("{escaped}%"), limit as i64], |row| {
                row.get::<_, String>(0)
            })?
            .map(|id| id.map(ScheduleId::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }
}

fn parse_datetime(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<NaiveDateTime> {
    let value: String = row.get(index)?;
    NaiveDateTime::parse_from_str(&value, DATETIME_FORMAT)
        .map_err(|error| conversion_error(index, error))
}

fn parse_change_kind(value: &str) -> std::result::Result<ChangeKind, Error> {
    match value {
        "insert" => Ok(ChangeKind::Insert),
        "update" => Ok(ChangeKind::Update),
        "delete" => Ok(ChangeKind::Delete),
        other => Err(Error::Format(format!("unknown change kind '{other}'"))),
    }
}

fn conversion_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn schedule(id: &str, from: &str, to: &str) -> Schedule {
        Schedule::new(at(from), at(to)).unwrap().with_id(id)
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = db.schedules();

        let mut original = schedule("s1", "2025-01-10 09:00", "2025-01-10 11:00").with_driver("D1");
        original.billing_date = Some(date("2025-01-31"));
        original.fare = Some(18_500);
        original.cargo = Some("pallets".to_string());
        repo.create(&original).unwrap();

        let fetched = repo.get(&original.id).unwrap().unwrap();
        assert_eq!(fetched, original);
        assert!(repo.get(&ScheduleId::from("missing")).unwrap().is_none());
    }

    #[test]
    fn test_list_is_ordered_by_loading_time() {
        let db = setup();
        let repo = db.schedules();

        repo.create(&schedule("late", "2025-01-10 15:00", "2025-01-10 16:00")).unwrap();
        repo.create(&schedule("early", "2025-01-10 09:00", "2025-01-10 10:00")).unwrap();

        let ids: Vec<String> = repo.list().unwrap().iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_list_between_includes_running_multi_day() {
        let db = setup();
        let repo = db.schedules();

        repo.create(&schedule("night", "2025-01-09 22:00", "2025-01-10 02:00")).unwrap();
        repo.create(&schedule("day", "2025-01-10 09:00", "2025-01-10 10:00")).unwrap();
        repo.create(&schedule("next", "2025-01-11 09:00", "2025-01-11 10:00")).unwrap();

        let ids: Vec<String> = repo
            .list_between(date("2025-01-10"), date("2025-01-10"))
            .unwrap()
            .iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["night", "day"]);
    }

    #[test]
    fn test_update_applies_patch() {
        let db = setup();
        let repo = db.schedules();
        let original = schedule("s1", "2025-01-10 09:00", "2025-01-10 11:00");
        repo.create(&original).unwrap();

        let patch = SchedulePatch {
            loading_at: Some(at("2025-01-10 13:00")),
            delivery_at: Some(at("2025-01-10 15:00")),
            vehicle_id: Some(Some("V7".to_string())),
            ..SchedulePatch::default()
        };
        let updated = repo.update(&original.id, &patch).unwrap();

        assert_eq!(updated.loading_at, at("2025-01-10 13:00"));
        assert_eq!(updated.vehicle_id.as_deref(), Some("V7"));
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(repo.get(&original.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_update_and_delete_missing() {
        let db = setup();
        let repo = db.schedules();
        let id = ScheduleId::from("missing");

        assert!(matches!(
            repo.update(&id, &SchedulePatch::default()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(repo.delete(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let repo = db.schedules();
        let original = schedule("s1", "2025-01-10 09:00", "2025-01-10 11:00");
        repo.create(&original).unwrap();

        repo.delete(&original.id).unwrap();
        assert!(repo.get(&original.id).unwrap().is_none());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_prefix_lookup_escapes_wildcards() {
        let db = setup();
        let repo = db.schedules();
        repo.create(&schedule("abc-1", "2025-01-10 09:00", "2025-01-10 10:00")).unwrap();
        repo.create(&schedule("abc-2", "2025-01-10 09:00", "2025-01-10 10:00")).unwrap();
        repo.create(&schedule("a_x", "2025-01-10 09:00", "2025-01-10 10:00")).unwrap();

        assert_eq!(repo.list_ids_by_prefix("abc", 5).unwrap().len(), 2);
        assert_eq!(repo.list_ids_by_prefix("abc-2", 5).unwrap(), vec![ScheduleId::from("abc-2")]);
        assert_eq!(repo.list_ids_by_prefix("a_", 5).unwrap(), vec![ScheduleId::from("a_x")]);
    }

    #[test]
    fn test_changes_since() {
        let db = setup();
        let repo = db.schedules();
        let original = schedule("s1", "2025-01-10 09:00", "2025-01-10 11:00");
        repo.create(&original).unwrap();
        let cursor = repo.latest_change_seq().unwrap();
        repo.delete(&original.id).unwrap();

        let changes = repo.changes_since(cursor, 10).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Delete);
        assert_eq!(changes[0].schedule_id, original.id);
        assert_eq!(repo.changes_since(0, 10).unwrap().len(), 2);
    }
}
