use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);
pub const BATCH_BUSY_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database contention persisted through {attempts} attempts: {last}")]
    Contention { attempts: u32, last: String },
}

/// True for the error classes worth retrying: lock contention, busy
/// handlers timing out, and transient disk I/O.
fn is_transient(error: &rusqlite::Error) -> bool {
    match error {
        rusqlite::Error::SqliteFailure(inner, message) => {
            matches!(
                inner.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
            ) || message
                .as_deref()
                .map(|m| {
                    let m = m.to_lowercase();
                    m.contains("locked") || m.contains("busy") || m.contains("timeout")
                        || m.contains("disk i/o")
                })
                .unwrap_or(false)
        }
        _ => false,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub forecast_id: String,
    pub created_at: DateTime<Utc>,
    pub bundle_id: String,
    pub model_version: String,
    pub total_tokens: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub model_cost_usd: f64,
    pub generation_time_sec: f64,
    pub status: String,
    pub confidence_report: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Option<i64>,
    pub forecast_id: String,
    pub shore: String,
    pub forecast_time: DateTime<Utc>,
    pub valid_time: DateTime<Utc>,
    pub predicted_height: f64,
    pub predicted_period: Option<f64>,
    pub predicted_direction: Option<f64>,
    pub predicted_category: Option<String>,
    pub confidence: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActualRecord {
    pub id: Option<i64>,
    pub buoy_id: String,
    pub observation_time: DateTime<Utc>,
    pub wave_height: f64,
    pub dominant_period: Option<f64>,
    pub direction: Option<f64>,
    pub source: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: Option<i64>,
    pub forecast_id: String,
    pub prediction_id: i64,
    pub actual_id: i64,
    pub validated_at: DateTime<Utc>,
    pub height_error: f64,
    pub period_error: Option<f64>,
    pub direction_error: Option<f64>,
    pub category_match: bool,
    pub mae: f64,
    pub rmse: f64,
}

/// Single-file SQLite store for the validation loop. Every connection runs
/// WAL with foreign keys on; writes serialize through IMMEDIATE
/// transactions and transient contention is retried with backoff.
pub struct ValidationStore {
    conn: Connection,
}

impl ValidationStore {
    pub fn open(path: &Path) -> Result<ValidationStore, StoreError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(
        path: &Path,
        busy_timeout: Duration,
    ) -> Result<ValidationStore, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let mut store = ValidationStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<ValidationStore, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let mut store = ValidationStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Schema changes run under an EXCLUSIVE transaction.
    fn init_schema(&mut self) -> Result<(), StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS forecasts (
                forecast_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                bundle_id TEXT NOT NULL,
                model_version TEXT NOT NULL DEFAULT '',
                total_tokens INTEGER NOT NULL DEFAULT 0,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                model_cost_usd REAL NOT NULL DEFAULT 0.0,
                generation_time_sec REAL NOT NULL DEFAULT 0.0,
                status TEXT NOT NULL DEFAULT 'pending',
                confidence_report TEXT
            );
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                forecast_id TEXT NOT NULL REFERENCES forecasts(forecast_id),
                shore TEXT NOT NULL,
                forecast_time TEXT NOT NULL,
                valid_time TEXT NOT NULL,
                predicted_height REAL NOT NULL,
                predicted_period REAL,
                predicted_direction REAL,
                predicted_category TEXT,
                confidence REAL NOT NULL DEFAULT 0.5
            );
            CREATE TABLE IF NOT EXISTS actuals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                buoy_id TEXT NOT NULL,
                observation_time TEXT NOT NULL,
                wave_height REAL NOT NULL,
                dominant_period REAL,
                direction REAL,
                source TEXT NOT NULL DEFAULT 'NDBC'
            );
            CREATE TABLE IF NOT EXISTS validations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                forecast_id TEXT NOT NULL REFERENCES forecasts(forecast_id),
                prediction_id INTEGER NOT NULL REFERENCES predictions(id),
                actual_id INTEGER NOT NULL REFERENCES actuals(id),
                validated_at TEXT NOT NULL,
                height_error REAL NOT NULL,
                period_error REAL,
                direction_error REAL,
                category_match INTEGER NOT NULL DEFAULT 0,
                mae REAL NOT NULL,
                rmse REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_predictions_shore_valid
                ON predictions(shore, valid_time);
            CREATE INDEX IF NOT EXISTS idx_validations_validated_at
                ON validations(validated_at);
            CREATE INDEX IF NOT EXISTS idx_actuals_buoy_time
                ON actuals(buoy_id, observation_time);
            CREATE INDEX IF NOT EXISTS idx_forecasts_created_at
                ON forecasts(created_at);
            CREATE INDEX IF NOT EXISTS idx_forecasts_bundle
                ON forecasts(bundle_id);",
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Runs a write closure inside a retried IMMEDIATE transaction. The
    /// transaction rolls back when the closure errors; only transient
    /// contention is retried.
    pub fn with_immediate_tx<T>(
        &mut self,
        mut work: impl FnMut(&rusqlite::Transaction) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let mut last = String::new();

        for attempt in 0..RETRY_ATTEMPTS {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                warn!(attempt, ?backoff, "retrying contended transaction");
                std::thread::sleep(backoff);
            }

            let tx = match self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
            {
                Ok(tx) => tx,
                Err(e) if is_transient(&e) => {
                    last = e.to_string();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match work(&tx) {
                Ok(value) => {
                    tx.commit()?;
                    return Ok(value);
                }
                Err(e) if is_transient(&e) => {
                    last = e.to_string();
                    // tx rolls back on drop
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Contention {
            attempts: RETRY_ATTEMPTS,
            last,
        })
    }

    pub fn insert_forecast(&mut self, record: &ForecastRecord) -> Result<(), StoreError> {
        let confidence = record
            .confidence_report
            .as_ref()
            .map(|v| v.to_string());
        self.with_immediate_tx(|tx| {
            tx.execute(
                "INSERT INTO forecasts (forecast_id, created_at, bundle_id, model_version,
                    total_tokens, input_tokens, output_tokens, model_cost_usd,
                    generation_time_sec, status, confidence_report)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.forecast_id,
                    record.created_at,
                    record.bundle_id,
                    record.model_version,
                    record.total_tokens,
                    record.input_tokens,
                    record.output_tokens,
                    record.model_cost_usd,
                    record.generation_time_sec,
                    record.status,
                    confidence,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_forecast_status(
        &mut self,
        forecast_id: &str,
        status: &str,
    ) -> Result<(), StoreError> {
        self.with_immediate_tx(|tx| {
            tx.execute(
                "UPDATE forecasts SET status = ?1 WHERE forecast_id = ?2",
                params![status, forecast_id],
            )?;
            Ok(())
        })
    }

    /// Batch operations hold the write lock longer, so they run under the
    /// extended busy timeout.
    fn with_batch_tx<T>(
        &mut self,
        work: impl FnMut(&rusqlite::Transaction) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        self.conn.busy_timeout(BATCH_BUSY_TIMEOUT)?;
        let result = self.with_immediate_tx(work);
        self.conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        result
    }

    /// All rows land in one IMMEDIATE transaction; any failure rolls the
    /// whole batch back.
    pub fn insert_predictions(
        &mut self,
        records: &[PredictionRecord],
    ) -> Result<usize, StoreError> {
        let inserted = self.with_batch_tx(|tx| {
            let mut statement = tx.prepare_cached(
                "INSERT INTO predictions (forecast_id, shore, forecast_time, valid_time,
                    predicted_height, predicted_period, predicted_direction,
                    predicted_category, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                statement.execute(params![
                    record.forecast_id,
                    record.shore,
                    record.forecast_time,
                    record.valid_time,
                    record.predicted_height,
                    record.predicted_period,
                    record.predicted_direction,
                    record.predicted_category,
                    record.confidence,
                ])?;
            }
            Ok(records.len())
        })?;

        debug!(inserted, "prediction batch committed");
        Ok(inserted)
    }

    pub fn insert_actuals(&mut self, records: &[ActualRecord]) -> Result<usize, StoreError> {
        self.with_batch_tx(|tx| {
            let mut statement = tx.prepare_cached(
                "INSERT INTO actuals (buoy_id, observation_time, wave_height,
                    dominant_period, direction, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                statement.execute(params![
                    record.buoy_id,
                    record.observation_time,
                    record.wave_height,
                    record.dominant_period,
                    record.direction,
                    record.source,
                ])?;
            }
            Ok(records.len())
        })
    }

    pub fn insert_validations(
        &mut self,
        records: &[ValidationRecord],
    ) -> Result<usize, StoreError> {
        self.with_batch_tx(|tx| {
            let mut statement = tx.prepare_cached(
                "INSERT INTO validations (forecast_id, prediction_id, actual_id,
                    validated_at, height_error, period_error, direction_error,
                    category_match, mae, rmse)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for record in records {
                statement.execute(params![
                    record.forecast_id,
                    record.prediction_id,
                    record.actual_id,
                    record.validated_at,
                    record.height_error,
                    record.period_error,
                    record.direction_error,
                    record.category_match,
                    record.mae,
                    record.rmse,
                ])?;
            }
            Ok(records.len())
        })
    }

    pub fn count(&self, table: &str) -> Result<i64, StoreError> {
        // table names come from code, never from input
        let sql = format!("SELECT COUNT(*) FROM {table}");
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Predictions without a validation row whose valid time has passed,
    /// ready to pair with buoy actuals.
    pub fn unvalidated_predictions(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>, StoreError> {
        let mut statement = self.conn.prepare(
            "SELECT p.id, p.forecast_id, p.shore, p.forecast_time, p.valid_time,
                    p.predicted_height, p.predicted_period, p.predicted_direction,
                    p.predicted_category, p.confidence
             FROM predictions p
             LEFT JOIN validations v ON v.prediction_id = p.id
             WHERE v.id IS NULL AND p.valid_time <= ?1
             ORDER BY p.valid_time",
        )?;

        let rows = statement.query_map(params![before], |row| {
            Ok(PredictionRecord {
                id: row.get(0)?,
                forecast_id: row.get(1)?,
                shore: row.get(2)?,
                forecast_time: row.get(3)?,
                valid_time: row.get(4)?,
                predicted_height: row.get(5)?,
                predicted_period: row.get(6)?,
                predicted_direction: row.get(7)?,
                predicted_category: row.get(8)?,
                confidence: row.get(9)?,
            })
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
