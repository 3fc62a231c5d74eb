//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate(conn, 1, MIGRATION_V1)?;
    }
    if version < 2 {
        migrate(conn, 2, MIGRATION_V2)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Version 1: schedule table
const MIGRATION_V1: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS schedules (
        id TEXT PRIMARY KEY,
        loading_at TEXT NOT NULL,
        delivery_at TEXT NOT NULL,
        client_id TEXT,
        driver_id TEXT,
        vehicle_id TEXT,
        route_name TEXT,
        loading_location TEXT,
        loading_address TEXT,
        delivery_location TEXT,
        delivery_address TEXT,
        cargo TEXT,
        billing_date TEXT,
        fare INTEGER CHECK (fare IS NULL OR fare >= 0),
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        CHECK (delivery_at >= loading_at)
    );
    CREATE INDEX IF NOT EXISTS idx_schedules_loading ON schedules(loading_at);
    CREATE INDEX IF NOT EXISTS idx_schedules_delivery ON schedules(delivery_at);
    CREATE INDEX IF NOT EXISTS idx_schedules_driver ON schedules(driver_id);
    CREATE INDEX IF NOT EXISTS idx_schedules_vehicle ON schedules(vehicle_id);
";

/// Version 2: append-only change log feeding remote listeners
const MIGRATION_V2: &str = "
    CREATE TABLE IF NOT EXISTS schedule_changes (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL CHECK (kind IN ('insert', 'update', 'delete')),
        schedule_id TEXT NOT NULL,
        changed_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_schedule_changes_schedule ON schedule_changes(schedule_id);
    CREATE TRIGGER IF NOT EXISTS schedules_ai AFTER INSERT ON schedules BEGIN
        INSERT INTO schedule_changes (kind, schedule_id, changed_at)
        VALUES ('insert', NEW.id, CAST(strftime('%s','now') AS INTEGER) * 1000);
    END;
    CREATE TRIGGER IF NOT EXISTS schedules_au AFTER UPDATE ON schedules BEGIN
        INSERT INTO schedule_changes (kind, schedule_id, changed_at)
        VALUES ('update', NEW.id, CAST(strftime('%s','now') AS INTEGER) * 1000);
    END;
    CREATE TRIGGER IF NOT EXISTS schedules_ad AFTER DELETE ON schedules BEGIN
        INSERT INTO schedule_changes (kind, schedule_id, changed_at)
        VALUES ('delete', OLD.id, CAST(strftime('%s','now') AS INTEGER) * 1000);
    END;
";

/// Apply one migration script and record its version atomically
fn migrate(conn: &Connection, version: i32, script: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(script)?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version} of {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(table_exists(&conn, "schedules"));
        assert!(table_exists(&conn, "schedule_changes"));
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_reversed_range_violates_check() {
        let conn = setup();
        run(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO schedules (id, loading_at, delivery_at, created_at, updated_at)
             VALUES ('bad', '2025-01-10T10:00:00', '2025-01-10T09:00:00', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_triggers_log_changes() {
        let conn = setup();
        run(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO schedules (id, loading_at, delivery_at, created_at, updated_at)
                 VALUES ('s1', '2025-01-10T09:00:00', '2025-01-10T10:00:00', 0, 0);
             UPDATE schedules SET driver_id = 'D1' WHERE id = 's1';
             DELETE FROM schedules WHERE id = 's1';",
        )
        .unwrap();

        let mut stmt = conn
            .prepare("SELECT kind FROM schedule_changes ORDER BY seq")
            .unwrap();
        let kinds = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(kinds, vec!["insert", "update", "delete"]);
    }
}
