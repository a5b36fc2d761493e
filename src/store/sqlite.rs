// =============================================================================
// store/sqlite.rs — INSERT OR IGNORE, THREE TIMES
// =============================================================================
//
// SQLite gives us insert-if-absent natively: `INSERT OR IGNORE` on a primary
// key is a no-op when the key exists, and `execute` tells us how many rows
// changed. One changed row means Inserted, zero means AlreadyPresent.
//
// Every statement runs in autocommit mode, so each row is durable the moment
// the call returns. Foreign keys are on, so a Performance can never point at
// an Athlete or Meet that was not written first.
// =============================================================================

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::info;

use super::{InsertOutcome, RecordStore};
use crate::error::StoreError;
use crate::models::{AthleteRow, MeetRow, PerformanceRow};
use crate::stats::{SampleSource, StatsQuery};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS Athletes (
        athleteID TEXT PRIMARY KEY,
        firstName TEXT NOT NULL,
        lastName  TEXT NOT NULL,
        gender    TEXT NOT NULL,
        birthYear INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS Meets (
        meetID    TEXT PRIMARY KEY,
        season    TEXT NOT NULL,
        year      INTEGER NOT NULL,
        startDate TEXT NOT NULL,
        endDate   TEXT,
        city      TEXT NOT NULL,
        state     TEXT,
        country   TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS Performances (
        meetID      TEXT NOT NULL REFERENCES Meets(meetID),
        athleteID   TEXT NOT NULL REFERENCES Athletes(athleteID),
        ageGroup    TEXT NOT NULL,
        event       TEXT NOT NULL,
        performance REAL NOT NULL,
        wind        TEXT,
        PRIMARY KEY (meetID, athleteID, ageGroup, event)
    );

    CREATE INDEX IF NOT EXISTS idx_performances_slice
        ON Performances (event, ageGroup);
"#;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "database opened");
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn outcome(changed: usize) -> InsertOutcome {
        if changed == 0 {
            InsertOutcome::AlreadyPresent
        } else {
            InsertOutcome::Inserted
        }
    }

    /// Row counts per table, in (athletes, meets, performances) order.
    pub fn counts(&self) -> Result<(u64, u64, u64), StoreError> {
        let count = |table: &str| -> Result<u64, StoreError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok((count("Athletes")?, count("Meets")?, count("Performances")?))
    }
}

impl RecordStore for SqliteStore {
    fn insert_athlete(&self, row: &AthleteRow) -> Result<InsertOutcome, StoreError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO Athletes (athleteID, firstName, lastName, gender, birthYear)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.athlete_id,
                row.first_name,
                row.last_name,
                row.gender.as_str(),
                row.birth_year,
            ],
        )?;
        Ok(Self::outcome(changed))
    }

    fn insert_meet(&self, row: &MeetRow) -> Result<InsertOutcome, StoreError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO Meets (meetID, season, year, startDate, endDate, city, state, country)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.meet_id,
                row.season.as_str(),
                row.year,
                row.start_date,
                row.end_date,
                row.city,
                row.state,
                row.country,
            ],
        )?;
        Ok(Self::outcome(changed))
    }

    fn insert_performance(&self, row: &PerformanceRow) -> Result<InsertOutcome, StoreError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO Performances (meetID, athleteID, ageGroup, event, performance, wind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.meet_id,
                row.athlete_id,
                row.age_group,
                row.event,
                row.performance,
                row.wind,
            ],
        )?;
        Ok(Self::outcome(changed))
    }
}

impl SampleSource for SqliteStore {
    fn samples(&self, query: &StatsQuery) -> Result<Vec<(i32, f64)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT Meets.year, Performances.performance
             FROM Performances
             JOIN Meets ON Performances.meetID = Meets.meetID
             WHERE Meets.year BETWEEN ?1 AND ?2
               AND Meets.season = ?3
               AND Performances.event = ?4
               AND Performances.ageGroup = ?5",
        )?;

        let rows = stmt.query_map(
            params![
                query.first_year,
                query.last_year,
                query.season.as_str(),
                query.event,
                query.age_group,
            ],
            |row| Ok((row.get::<_, i32>(0)?, row.get::<_, f64>(1)?)),
        )?;

        let samples = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }
}
