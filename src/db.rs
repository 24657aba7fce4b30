// 🗄️ Storage - SQLite schema, connections and column helpers
//
// Every operation in this crate receives its Connection (or an open
// Transaction) explicitly; nothing here holds global state.

use crate::error::{FleetError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Storage format for event timestamps and `created_at` columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for ledger dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where the database lives, resolved from a `DATABASE_URL`-style string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

impl DatabaseLocation {
    /// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db`,
    /// `sqlite://path.db`, `:memory:` or a bare file path.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();

        if url.is_empty() {
            return Err(FleetError::InvalidInput("empty database URL".to_string()));
        }

        if url == ":memory:" || url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(DatabaseLocation::InMemory);
        }

        if let Some(path) = url.strip_prefix("sqlite:///") {
            return Ok(DatabaseLocation::File(PathBuf::from(path)));
        }

        if let Some(path) = url.strip_prefix("sqlite://") {
            return Ok(DatabaseLocation::File(PathBuf::from(path)));
        }

        if url.contains("://") {
            return Err(FleetError::InvalidInput(format!(
                "unsupported database URL '{}': only SQLite is supported",
                url
            )));
        }

        Ok(DatabaseLocation::File(PathBuf::from(url)))
    }

    pub fn open(&self) -> Result<Connection> {
        let conn = match self {
            DatabaseLocation::File(path) => open_database(path)?,
            DatabaseLocation::InMemory => {
                let conn = Connection::open_in_memory()?;
                setup_database(&conn)?;
                conn
            }
        };
        Ok(conn)
    }
}

/// Open (or create) a database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    info!(path = %path.display(), "Database opened");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases silently keep "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            year INTEGER NOT NULL,
            engine_volume REAL,
            vin_code TEXT UNIQUE NOT NULL,
            license_plate TEXT UNIQUE NOT NULL,
            call_sign TEXT UNIQUE NOT NULL,
            mileage INTEGER NOT NULL DEFAULT 0,
            cost INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contractors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contractor_type TEXT NOT NULL,
            subtype TEXT,
            name TEXT NOT NULL,
            phone TEXT,
            location TEXT,
            notes TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            event_type TEXT NOT NULL,
            subtype TEXT NOT NULL,
            vehicle_id INTEGER REFERENCES vehicles(id),
            contractor_id INTEGER REFERENCES contractors(id),
            amount INTEGER NOT NULL DEFAULT 0,
            description TEXT NOT NULL DEFAULT '',
            created_by INTEGER REFERENCES users(id),
            created_at TEXT NOT NULL
        );

        -- One ledger row per calendar date
        CREATE TABLE IF NOT EXISTS cashflow (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT UNIQUE NOT NULL,
            income INTEGER NOT NULL DEFAULT 0,
            expenses INTEGER NOT NULL DEFAULT 0,
            credit_load INTEGER NOT NULL DEFAULT 0,
            balance INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
        CREATE INDEX IF NOT EXISTS idx_events_vehicle ON events(vehicle_id);
        CREATE INDEX IF NOT EXISTS idx_events_contractor ON events(contractor_id);",
    )?;

    debug!("Schema ready");
    Ok(())
}

/// Start a write transaction that takes the SQLite write lock up front,
/// so read-modify-write of a ledger row cannot interleave with another writer.
pub fn write_transaction(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Read a timestamp column written by `format_timestamp`
pub fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a date column written by `format_date`
pub fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        for table in ["users", "vehicles", "contractors", "events", "cashflow"] {
            assert_eq!(count_rows(&conn, table).unwrap(), 0, "{} should be empty", table);
        }
    }

    #[test]
    fn test_cashflow_date_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        conn.execute(
            "INSERT INTO cashflow (date, created_at) VALUES ('2024-01-01', '2024-01-01 00:00:00')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO cashflow (date, created_at) VALUES ('2024-01-01', '2024-01-01 00:00:00')",
            [],
        );

        let err = second.unwrap_err();
        assert!(crate::error::is_constraint_violation(&err));
    }

    #[test]
    fn test_database_location_from_url() {
        assert_eq!(
            DatabaseLocation::from_url("sqlite:///fleet.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("fleet.db"))
        );
        assert_eq!(
            DatabaseLocation::from_url("sqlite:////var/lib/fleet.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/fleet.db"))
        );
        assert_eq!(
            DatabaseLocation::from_url("data/fleet.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("data/fleet.db"))
        );
        assert_eq!(DatabaseLocation::from_url(":memory:").unwrap(), DatabaseLocation::InMemory);
        assert!(DatabaseLocation::from_url("postgresql://localhost/fleet").is_err());
        assert!(DatabaseLocation::from_url("  ").is_err());
    }

    #[test]
    fn test_open_database_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fleet.db");

        let conn = open_database(&path).unwrap();
        assert!(path.exists());
        assert_eq!(count_rows(&conn, "events").unwrap(), 0);

        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_timestamp_round_trip_through_column() {
        let conn = Connection::open_in_memory().unwrap();
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();

        let parsed = conn
            .query_row("SELECT ?1", [format_timestamp(&ts)], |row| timestamp_column(row, 0))
            .unwrap();
        assert_eq!(parsed, ts);
    }
}
