//! Persisted telemetry.
//!
//! # Storage layout
//!
//! A single table `telemetry` is created if it does not already exist:
//!
//! | column          | type    | description                          |
//! |-----------------|---------|--------------------------------------|
//! | id              | INTEGER | row id, insertion order              |
//! | ts              | REAL    | Unix time in seconds                 |
//! | vehicle_id      | TEXT    | which rover wrote the row            |
//! | speed           | REAL    | smoothed display speed               |
//! | raw_speed       | REAL    | unsmoothed speed                     |
//! | distance        | REAL    | ultrasonic distance (cm)             |
//! | line_l/m/r      | INTEGER | line sensor triplet                  |
//! | motion          | TEXT    | motion label                         |
//! | line_state      | TEXT    | line-follow state label              |
//! | obstacle        | INTEGER | obstacle flag                        |
//! | cpu_temp        | REAL    | SoC temperature (°C)                 |
//! | line_track …    | INTEGER | the five mode toggles                |
//!
//! Rows are never updated or deleted.
//!
//! # Example
//!
//! ```rust
//! use rover_memory::telemetry_store::{TelemetryLog, TelemetryRow, TelemetryStore};
//! use rover_types::TelemetrySnapshot;
//!
//! let store = TelemetryStore::open_in_memory().unwrap();
//! let snap = TelemetrySnapshot { timestamp: 100.0, speed: 12, ..Default::default() };
//! store.append(&TelemetryRow::from_snapshot("rover-01", &snap)).unwrap();
//!
//! let rows = store.since(50.0, None).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].speed, 12.0);
//! ```

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rover_types::{LineState, ModeToggles, MotionLabel, RoverError, TelemetrySnapshot};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

const SELECT_COLUMNS: &str = "ts, vehicle_id, speed, raw_speed, distance,
       line_l, line_m, line_r, motion, line_state, obstacle, cpu_temp,
       line_track, avoid_obstacles, color_follow, color_detect, face_detect";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from telemetry storage.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt telemetry row: {0}")]
    CorruptRow(String),
}

impl From<StoreError> for RoverError {
    fn from(e: StoreError) -> Self {
        RoverError::Storage(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TelemetryRow
// ─────────────────────────────────────────────────────────────────────────────

/// One persisted telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRow {
    /// Unix time in seconds.
    pub ts: f64,
    pub vehicle_id: String,
    pub speed: f64,
    pub raw_speed: f64,
    pub distance: f64,
    pub line: [u8; 3],
    pub motion: MotionLabel,
    pub line_state: LineState,
    pub obstacle: bool,
    pub cpu_temp: f64,
    pub modes: ModeToggles,
}

impl TelemetryRow {
    /// Flatten a snapshot into a row for `vehicle_id`.
    pub fn from_snapshot(vehicle_id: &str, snap: &TelemetrySnapshot) -> Self {
        Self {
            ts: snap.timestamp,
            vehicle_id: vehicle_id.to_string(),
            speed: f64::from(snap.speed),
            raw_speed: f64::from(snap.raw_speed),
            distance: f64::from(snap.distance),
            line: snap.line,
            motion: snap.motion,
            line_state: snap.line_state,
            obstacle: snap.obstacle_detected,
            cpu_temp: snap.cpu_temp,
            modes: snap.modes,
        }
    }

    fn from_sql(row: &Row<'_>) -> Result<Self, StoreError> {
        let motion: String = row.get(8)?;
        let line_state: String = row.get(9)?;
        Ok(Self {
            ts: row.get(0)?,
            vehicle_id: row.get(1)?,
            speed: row.get(2)?,
            raw_speed: row.get(3)?,
            distance: row.get(4)?,
            line: [row.get(5)?, row.get(6)?, row.get(7)?],
            motion: MotionLabel::parse(&motion)
                .ok_or_else(|| StoreError::CorruptRow(format!("unknown motion {motion:?}")))?,
            line_state: LineState::parse(&line_state).ok_or_else(|| {
                StoreError::CorruptRow(format!("unknown line_state {line_state:?}"))
            })?,
            obstacle: row.get(10)?,
            cpu_temp: row.get(11)?,
            modes: ModeToggles {
                line_track: row.get(12)?,
                avoid_obstacles: row.get(13)?,
                color_follow: row.get(14)?,
                color_detect: row.get(15)?,
                face_detect: row.get(16)?,
            },
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TelemetryLog
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only telemetry storage.
///
/// Implementations must tolerate concurrent callers: the recorder appends
/// from the control thread while request handlers query.
pub trait TelemetryLog: Send + Sync {
    /// Persist one row.
    fn append(&self, row: &TelemetryRow) -> Result<(), StoreError>;

    /// Every row with `ts >= cutoff`, oldest first, optionally limited to one
    /// vehicle.
    fn since(&self, cutoff: f64, vehicle_id: Option<&str>) -> Result<Vec<TelemetryRow>, StoreError>;

    /// The newest row of every vehicle, ordered by vehicle id.
    fn latest_per_vehicle(&self) -> Result<Vec<TelemetryRow>, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// TelemetryStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed [`TelemetryLog`].  The connection mutex serializes writers
/// inside the process; SQLite's busy timeout covers other processes.
pub struct TelemetryStore {
    conn: Mutex<Connection>,
}

impl TelemetryStore {
    /// Open (or create) a persistent database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init(conn)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS telemetry (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                ts              REAL    NOT NULL,
                vehicle_id      TEXT    NOT NULL,
                speed           REAL    NOT NULL,
                raw_speed       REAL    NOT NULL,
                distance        REAL    NOT NULL,
                line_l          INTEGER NOT NULL,
                line_m          INTEGER NOT NULL,
                line_r          INTEGER NOT NULL,
                motion          TEXT    NOT NULL,
                line_state      TEXT    NOT NULL,
                obstacle        INTEGER NOT NULL,
                cpu_temp        REAL    NOT NULL,
                line_track      INTEGER NOT NULL,
                avoid_obstacles INTEGER NOT NULL,
                color_follow    INTEGER NOT NULL,
                color_detect    INTEGER NOT NULL,
                face_detect     INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS telemetry_vehicle_ts ON telemetry (vehicle_id, ts);
            CREATE INDEX IF NOT EXISTS telemetry_ts ON telemetry (ts);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn collect<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<TelemetryRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(TelemetryRow::from_sql(row)?);
        }
        Ok(out)
    }
}

impl TelemetryLog for TelemetryStore {
    fn append(&self, row: &TelemetryRow) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO telemetry (
                 ts, vehicle_id, speed, raw_speed, distance,
                 line_l, line_m, line_r, motion, line_state, obstacle, cpu_temp,
                 line_track, avoid_obstacles, color_follow, color_detect, face_detect)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                row.ts,
                row.vehicle_id,
                row.speed,
                row.raw_speed,
                row.distance,
                row.line[0],
                row.line[1],
                row.line[2],
                row.motion.as_str(),
                row.line_state.as_str(),
                row.obstacle,
                row.cpu_temp,
                row.modes.line_track,
                row.modes.avoid_obstacles,
                row.modes.color_follow,
                row.modes.color_detect,
                row.modes.face_detect,
            ],
        )?;
        Ok(())
    }

    fn since(
        &self,
        cutoff: f64,
        vehicle_id: Option<&str>,
    ) -> Result<Vec<TelemetryRow>, StoreError> {
        match vehicle_id {
            Some(id) => self.collect(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM telemetry
                     WHERE vehicle_id = ?1 AND ts >= ?2
                     ORDER BY ts ASC, id ASC"
                ),
                params![id, cutoff],
            ),
            None => self.collect(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM telemetry
                     WHERE ts >= ?1
                     ORDER BY ts ASC, id ASC"
                ),
                params![cutoff],
            ),
        }
    }

    fn latest_per_vehicle(&self) -> Result<Vec<TelemetryRow>, StoreError> {
        self.collect(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM telemetry AS t
                 WHERE t.id = (
                     SELECT id FROM telemetry
                     WHERE vehicle_id = t.vehicle_id
                     ORDER BY ts DESC, id DESC
                     LIMIT 1)
                 ORDER BY t.vehicle_id ASC"
            ),
            [],
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
