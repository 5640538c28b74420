//! The execution repository as seen by the bridge.
//!
//! The poller reads "observations modified in `[start, end)`", the inbound
//! listener writes whole records. Implementations serialize their own
//! writes; the bridge never retries a failed call internally.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::RepositoryError;
use crate::model::{split_angle_times, ObservationRecord};

pub trait Repository: Send + Sync {
    /// Observations whose last-modified time falls in the half-open window
    /// `[start, end)`, oldest first.
    fn query_changed_since(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ObservationRecord>, RepositoryError>;

    fn store(&self, record: &ObservationRecord) -> Result<(), RepositoryError>;
}

// ---------------------------------------------------------------------------
// SqliteRepository
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS observations (
    mom2_id       INTEGER PRIMARY KEY,
    record        TEXT    NOT NULL,
    angle_times   TEXT,
    last_modified INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS observations_last_modified
    ON observations (last_modified);
";

/// SQLite-backed execution repository keyed by `mom2Id`.
///
/// `last_modified` is stored as milliseconds since the epoch; a record
/// without one is stamped with the time of the write, taken while the
/// connection lock is held.
///
/// Angle times are execution-side data kept in their own column: a stored
/// record without any keeps the ones already present.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RepositoryError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn.lock().map_err(|_| RepositoryError::Poisoned)
    }

    pub fn get(&self, mom2_id: i64) -> Result<Option<ObservationRecord>, RepositoryError> {
        let conn = self.lock()?;
        let row: Option<(String, Option<String>, i64)> = conn
            .query_row(
                "SELECT record, angle_times, last_modified FROM observations WHERE mom2_id = ?1",
                params![mom2_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(|(json, angles, ms)| decode_row(&json, angles.as_deref(), ms))
            .transpose()
    }

    /// Record the per-beam angle-time list (`[+0,+3600]`) of a stored
    /// observation and mark it modified. Returns `false` when no
    /// observation has that `mom2Id`.
    pub fn set_angle_times(&self, mom2_id: i64, list: &str) -> Result<bool, RepositoryError> {
        let angles = format!("[{}]", split_angle_times(list).join(","));
        let conn = self.lock()?;
        let now = Utc::now();
        let changed = conn.execute(
            "UPDATE observations SET angle_times = ?1, last_modified = ?2 WHERE mom2_id = ?3",
            params![angles, now.timestamp_millis(), mom2_id],
        )?;
        tracing::debug!(mom2_id, %angles, "stored angle times");
        Ok(changed > 0)
    }

    pub fn count(&self) -> Result<usize, RepositoryError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

fn decode_row(
    json: &str,
    angle_times: Option<&str>,
    last_modified_ms: i64,
) -> Result<ObservationRecord, RepositoryError> {
    let mut record: ObservationRecord = serde_json::from_str(json)?;
    if let Some(list) = angle_times {
        record.angle_times = split_angle_times(list);
    }
    record.last_modified = Utc.timestamp_millis_opt(last_modified_ms).single();
    Ok(record)
}

impl Repository for SqliteRepository {
    fn query_changed_since(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ObservationRecord>, RepositoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT record, angle_times, last_modified FROM observations
             WHERE last_modified >= ?1 AND last_modified < ?2
             ORDER BY last_modified, mom2_id",
        )?;
        let rows = stmt.query_map(
            params![start.timestamp_millis(), end.timestamp_millis()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        let mut records = Vec::new();
        for row in rows {
            let (json, angles, ms) = row?;
            records.push(decode_row(&json, angles.as_deref(), ms)?);
        }
        Ok(records)
    }

    fn store(&self, record: &ObservationRecord) -> Result<(), RepositoryError> {
        let mom2_id = record.mom2_id.ok_or(RepositoryError::MissingId)?;
        let angles = (!record.angle_times.is_empty())
            .then(|| format!("[{}]", record.angle_times.join(",")));
        let mut stored = record.clone();
        stored.last_modified = None;
        stored.angle_times.clear();
        let json = serde_json::to_string(&stored)?;

        // Stamped under the lock the window query also takes.
        let conn = self.lock()?;
        let last_modified = record.last_modified.unwrap_or_else(Utc::now);
        conn.execute(
            "INSERT INTO observations (mom2_id, record, angle_times, last_modified)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (mom2_id) DO UPDATE SET
                 record = excluded.record,
                 angle_times = COALESCE(excluded.angle_times, observations.angle_times),
                 last_modified = excluded.last_modified",
            params![mom2_id, json, angles, last_modified.timestamp_millis()],
        )?;
        tracing::debug!(mom2_id, "stored observation");
        Ok(())
    }
}
