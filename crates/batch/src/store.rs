//! SQLite-backed persistence for batches, results, and the geocode cache.
//!
//! One file holds everything a restart needs: the batch rows, their
//! per-connote results in input order, a per-run summary for history views,
//! and the durable geocode cache shared across runs.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use veriroute_engine::model::{
    AccuracyCategory, ComparisonResult, DashboardStats, GeocodeStatus,
};
use veriroute_engine::stats::compute_stats;
use veriroute_geocode::{CachedHit, GeocodeCache};

use crate::session::{Batch, BatchStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS batches (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    status      TEXT NOT NULL,
    run_id      TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS batch_items (
    batch_id        TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    connote         TEXT NOT NULL,
    recipient_name  TEXT NOT NULL DEFAULT '',
    system_address  TEXT NOT NULL DEFAULT '',
    system_lat      REAL,
    system_lng      REAL,
    field_lat       REAL,
    field_lng       REAL,
    distance_meters REAL,
    category        TEXT NOT NULL,
    geocode_status  TEXT NOT NULL,
    provider        TEXT,
    PRIMARY KEY (batch_id, connote)
);

CREATE TABLE IF NOT EXISTS run_summaries (
    batch_id        TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    total           INTEGER NOT NULL,
    accurate        INTEGER NOT NULL,
    fairly_accurate INTEGER NOT NULL,
    inaccurate      INTEGER NOT NULL,
    pending         INTEGER NOT NULL,
    error           INTEGER NOT NULL,
    finished_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS geocode_cache (
    query_key    TEXT PRIMARY KEY,
    query        TEXT NOT NULL,
    lat          REAL NOT NULL,
    lng          REAL NOT NULL,
    display_name TEXT NOT NULL,
    provider     TEXT NOT NULL,
    cached_at    TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    Sqlite(String),
    /// Stored value no longer maps onto a known enum/uuid.
    Corrupt(String),
    NotFound(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(msg) => write!(f, "store error: {msg}"),
            Self::Corrupt(msg) => write!(f, "corrupt store: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Owns the connection. Single-writer by design: the run consumer applies
/// results, everything else reads.
pub struct SessionStore {
    conn: Connection,
}

/// One row of run history.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub batch_id: Uuid,
    pub name: String,
    pub stats: DashboardStats,
    pub finished_at: DateTime<Utc>,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn save_batch(&self, batch: &Batch) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO batches (id, name, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            params![
                batch.id.to_string(),
                batch.name,
                batch.status.as_str(),
                batch.created_at.to_rfc3339(),
                batch.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_batch(&self, batch_id: Uuid) -> Result<Batch, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name, status, created_at, updated_at FROM batches WHERE id = ?1",
                params![batch_id.to_string()],
                row_to_batch,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id}")))
    }

    /// The most recently updated batch, if any — what a dashboard resumes
    /// into after a restart.
    pub fn latest_batch(&self) -> Result<Option<Batch>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, status, created_at, updated_at FROM batches
                 ORDER BY updated_at DESC LIMIT 1",
                [],
                row_to_batch,
            )
            .optional()?)
    }

    /// Mark a new run as the batch's current one and clear previous items.
    /// Results are only applied while their run is still current.
    pub fn begin_run(&self, batch: &Batch, run_id: Uuid) -> Result<(), StoreError> {
        self.save_batch(batch)?;
        self.conn.execute(
            "UPDATE batches SET run_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                batch.id.to_string(),
                run_id.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        self.conn.execute(
            "DELETE FROM batch_items WHERE batch_id = ?1",
            params![batch.id.to_string()],
        )?;
        Ok(())
    }

    /// Apply one result if `run_id` is still the batch's current run.
    /// Returns false (and writes nothing) for a superseded run.
    pub fn apply_result(
        &self,
        batch_id: Uuid,
        run_id: Uuid,
        seq: usize,
        result: &ComparisonResult,
    ) -> Result<bool, StoreError> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT run_id FROM batches WHERE id = ?1",
                params![batch_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        if current.as_deref() != Some(run_id.to_string().as_str()) {
            log::debug!("discarding result for superseded run {run_id}");
            return Ok(false);
        }

        self.conn.execute(
            "INSERT OR REPLACE INTO batch_items
                 (batch_id, seq, connote, recipient_name, system_address,
                  system_lat, system_lng, field_lat, field_lng,
                  distance_meters, category, geocode_status, provider)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                batch_id.to_string(),
                seq as i64,
                result.connote,
                result.recipient_name,
                result.system_address,
                result.system_lat,
                result.system_lng,
                result.field_lat,
                result.field_lng,
                result.distance_meters,
                result.category.as_str(),
                result.geocode_status.as_str(),
                result.provider,
            ],
        )?;
        Ok(true)
    }

    /// All results of a batch, in pipeline emission (input) order.
    pub fn results(&self, batch_id: Uuid) -> Result<Vec<ComparisonResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT connote, recipient_name, system_address,
                    system_lat, system_lng, field_lat, field_lng,
                    distance_meters, category, geocode_status, provider
             FROM batch_items WHERE batch_id = ?1 ORDER BY seq",
        )?;

        let rows = stmt.query_map(params![batch_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
                row.get::<_, Option<f64>>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, Option<String>>(10)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (
                connote,
                recipient_name,
                system_address,
                system_lat,
                system_lng,
                field_lat,
                field_lng,
                distance_meters,
                category,
                geocode_status,
                provider,
            ) = row?;

            results.push(ComparisonResult {
                connote,
                recipient_name,
                system_address,
                system_lat,
                system_lng,
                field_lat,
                field_lng,
                distance_meters,
                category: AccuracyCategory::from_wire(&category)
                    .ok_or_else(|| StoreError::Corrupt(format!("category '{category}'")))?,
                geocode_status: GeocodeStatus::from_wire(&geocode_status).ok_or_else(|| {
                    StoreError::Corrupt(format!("geocode status '{geocode_status}'"))
                })?,
                provider,
            });
        }
        Ok(results)
    }

    /// Aggregate over the stored results — recomputed, never stored
    /// alongside the items.
    pub fn stats(&self, batch_id: Uuid) -> Result<DashboardStats, StoreError> {
        Ok(compute_stats(&self.results(batch_id)?))
    }

    /// Record a finished run for the history view.
    pub fn save_summary(&self, batch: &Batch, stats: &DashboardStats) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO run_summaries
                 (batch_id, name, total, accurate, fairly_accurate,
                  inaccurate, pending, error, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                batch.id.to_string(),
                batch.name,
                stats.total as i64,
                stats.accurate as i64,
                stats.fairly_accurate as i64,
                stats.inaccurate as i64,
                stats.pending as i64,
                stats.error as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Finished runs, newest first.
    pub fn history(&self) -> Result<Vec<RunSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT batch_id, name, total, accurate, fairly_accurate,
                    inaccurate, pending, error, finished_at
             FROM run_summaries ORDER BY finished_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, name, total, accurate, fairly, inaccurate, pending, error, finished_at) =
                row?;
            summaries.push(RunSummary {
                batch_id: parse_uuid(&id)?,
                name,
                stats: DashboardStats {
                    total: total as usize,
                    accurate: accurate as usize,
                    fairly_accurate: fairly as usize,
                    inaccurate: inaccurate as usize,
                    pending: pending as usize,
                    error: error as usize,
                },
                finished_at: parse_timestamp(&finished_at)?,
            });
        }
        Ok(summaries)
    }
}

fn row_to_batch(row: &rusqlite::Row<'_>) -> rusqlite::Result<Batch> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let status: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;

    // Map decode failures through sqlite's error type so query_row stays
    // composable; callers see them as store errors.
    let decode =
        |msg: String| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, msg.into());

    Ok(Batch {
        id: Uuid::parse_str(&id).map_err(|e| decode(format!("batch id: {e}")))?,
        name,
        status: BatchStatus::from_wire(&status)
            .ok_or_else(|| decode(format!("batch status '{status}'")))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| decode(format!("created_at: {e}")))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| decode(format!("updated_at: {e}")))?
            .with_timezone(&Utc),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Corrupt(format!("uuid '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{s}': {e}")))
}

// ---------------------------------------------------------------------------
// Durable geocode cache
// ---------------------------------------------------------------------------

/// `GeocodeCache` backed by the same SQLite file, so identical addresses
/// cost nothing across runs. Owns its own connection: the orchestrator
/// calls from a worker thread.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GeocodeCache for SqliteCache {
    fn get(&self, key: &str) -> Option<CachedHit> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row(
            "SELECT lat, lng, display_name, provider FROM geocode_cache WHERE query_key = ?1",
            params![key],
            |row| {
                Ok(CachedHit {
                    lat: row.get(0)?,
                    lng: row.get(1)?,
                    display_name: row.get(2)?,
                    provider: row.get(3)?,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn put(&self, key: &str, query: &str, hit: &CachedHit) {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = conn.execute(
            "INSERT OR REPLACE INTO geocode_cache
                 (query_key, query, lat, lng, display_name, provider, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key,
                query,
                hit.lat,
                hit.lng,
                hit.display_name,
                hit.provider,
                Utc::now().to_rfc3339(),
            ],
        );
        if let Err(e) = outcome {
            // A cache write failure costs a future provider call, nothing more.
            log::warn!("geocode cache write failed: {e}");
        }
    }
}
