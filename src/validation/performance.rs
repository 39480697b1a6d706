use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{StoreError, ValidationStore};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub lookback_days: i64,
    /// Floor for the adaptive window: below this many total samples the
    /// window doubles.
    pub min_samples: i64,
    /// Floor for emitting a per-shore bias alert.
    pub min_alert_samples: i64,
    pub outlier_threshold_ft: f64,
    pub window_cap_days: i64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            lookback_days: 7,
            min_samples: 10,
            min_alert_samples: 3,
            outlier_threshold_ft: 10.0,
            window_cap_days: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShorePerformance {
    pub shore: String,
    pub sample_count: i64,
    pub mae: f64,
    pub rmse: f64,
    /// Signed mean height error; positive means overprediction.
    pub avg_bias: f64,
    pub categorical_accuracy: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BiasCategory {
    Overpredicting,
    Underpredicting,
    Balanced,
}

impl BiasCategory {
    fn classify(avg_bias: f64) -> BiasCategory {
        if avg_bias > 1.0 {
            BiasCategory::Overpredicting
        } else if avg_bias < -1.0 {
            BiasCategory::Underpredicting
        } else {
            BiasCategory::Balanced
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BiasAlert {
    pub shore: String,
    pub category: BiasCategory,
    pub avg_bias: f64,
    pub sample_size: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub has_data: bool,
    pub window_days: i64,
    pub total_samples: i64,
    pub overall_mae: f64,
    pub overall_rmse: f64,
    pub overall_bias: f64,
    pub overall_categorical_accuracy: f64,
    pub shores: Vec<ShorePerformance>,
    pub bias_alerts: Vec<BiasAlert>,
}

impl PerformanceReport {
    fn empty(window_days: i64) -> PerformanceReport {
        PerformanceReport {
            has_data: false,
            window_days,
            total_samples: 0,
            overall_mae: 0.0,
            overall_rmse: 0.0,
            overall_bias: 0.0,
            overall_categorical_accuracy: 0.0,
            shores: vec![],
            bias_alerts: vec![],
        }
    }
}

/// Time-windowed accuracy queries over the validations/predictions join.
/// Outlier errors are excluded everywhere; a sparse window widens itself
/// before giving up.
pub struct PerformanceAnalyzer {
    config: PerformanceConfig,
}

impl PerformanceAnalyzer {
    pub fn new(config: PerformanceConfig) -> PerformanceAnalyzer {
        PerformanceAnalyzer { config }
    }

    pub fn analyze(
        &self,
        store: &ValidationStore,
        now: DateTime<Utc>,
    ) -> Result<PerformanceReport, StoreError> {
        let mut window = self.config.lookback_days;

        loop {
            let samples = self.sample_count(store, now, window)?;
            if samples >= self.config.min_samples {
                break;
            }
            if window > 14 || window >= self.config.window_cap_days {
                debug!(window, samples, "insufficient validation history");
                return Ok(PerformanceReport::empty(window));
            }
            let widened = (window * 2).min(self.config.window_cap_days);
            debug!(from = window, to = widened, samples, "widening analysis window");
            window = widened;
        }

        let cutoff = now - Duration::days(window);
        let report = self.build_report(store, cutoff, window)?;
        info!(
            window_days = window,
            samples = report.total_samples,
            mae = report.overall_mae,
            "forecast performance analyzed"
        );
        Ok(report)
    }

    fn sample_count(
        &self,
        store: &ValidationStore,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<i64, StoreError> {
        let cutoff = now - Duration::days(window_days);
        let count = store.connection().query_row(
            "SELECT COUNT(*) FROM validations v
             WHERE v.validated_at >= ?1 AND ABS(v.height_error) < ?2",
            params![cutoff, self.config.outlier_threshold_ft],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn build_report(
        &self,
        store: &ValidationStore,
        cutoff: DateTime<Utc>,
        window_days: i64,
    ) -> Result<PerformanceReport, StoreError> {
        let conn = store.connection();

        let (total, mae, rmse, bias, categorical) = conn.query_row(
            "SELECT COUNT(*), AVG(v.mae), AVG(v.rmse), AVG(v.height_error),
                    AVG(v.category_match)
             FROM validations v
             WHERE v.validated_at >= ?1 AND ABS(v.height_error) < ?2",
            params![cutoff, self.config.outlier_threshold_ft],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                ))
            },
        )?;

        let mut shores = vec![];
        {
            let mut statement = conn.prepare(
                "SELECT p.shore, COUNT(*), AVG(v.mae), AVG(v.rmse),
                        AVG(v.height_error), AVG(v.category_match)
                 FROM validations v
                 JOIN predictions p ON p.id = v.prediction_id
                 WHERE v.validated_at >= ?1 AND ABS(v.height_error) < ?2
                 GROUP BY p.shore
                 ORDER BY p.shore",
            )?;
            let rows = statement.query_map(
                params![cutoff, self.config.outlier_threshold_ft],
                |row| {
                    Ok(ShorePerformance {
                        shore: row.get(0)?,
                        sample_count: row.get(1)?,
                        mae: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                        rmse: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                        avg_bias: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                        categorical_accuracy: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    })
                },
            )?;
            shores.extend(rows.filter_map(|r| r.ok()));
        }

        let mut bias_alerts = vec![];
        {
            let mut statement = conn.prepare(
                "SELECT p.shore, AVG(v.height_error), COUNT(*)
                 FROM validations v
                 JOIN predictions p ON p.id = v.prediction_id
                 WHERE v.validated_at >= ?1 AND ABS(v.height_error) < ?2
                 GROUP BY p.shore
                 HAVING COUNT(*) >= ?3
                 ORDER BY p.shore",
            )?;
            let rows = statement.query_map(
                params![
                    cutoff,
                    self.config.outlier_threshold_ft,
                    self.config.min_alert_samples
                ],
                |row| {
                    let avg_bias: f64 = row.get::<_, Option<f64>>(1)?.unwrap_or(0.0);
                    Ok(BiasAlert {
                        shore: row.get(0)?,
                        category: BiasCategory::classify(avg_bias),
                        avg_bias,
                        sample_size: row.get(2)?,
                    })
                },
            )?;
            bias_alerts.extend(rows.filter_map(|r| r.ok()));
        }

        Ok(PerformanceReport {
            has_data: total > 0,
            window_days,
            total_samples: total,
            overall_mae: mae,
            overall_rmse: rmse,
            overall_bias: bias,
            overall_categorical_accuracy: categorical,
            shores,
            bias_alerts,
        })
    }
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        PerformanceAnalyzer::new(PerformanceConfig::default())
    }
}
