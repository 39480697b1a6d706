use serde::{Deserialize, Serialize};

use super::source::{SourceKind, SourceScore, DEFAULT_HISTORICAL_ACCURACY};

pub const CONSENSUS_WEIGHT: f64 = 0.30;
pub const RELIABILITY_WEIGHT: f64 = 0.25;
pub const COMPLETENESS_WEIGHT: f64 = 0.20;
pub const HORIZON_WEIGHT: f64 = 0.15;
pub const ACCURACY_WEIGHT: f64 = 0.10;

/// Source types the pipeline expects in a healthy collection run.
pub const EXPECTED_SOURCE_KINDS: [SourceKind; 5] = [
    SourceKind::Buoy,
    SourceKind::Model,
    SourceKind::Pressure,
    SourceKind::Altimetry,
    SourceKind::MarineForecast,
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceCategory {
    High,
    Medium,
    Low,
}

impl ConfidenceCategory {
    pub fn from_overall(overall: f64) -> ConfidenceCategory {
        if overall >= 0.7 {
            ConfidenceCategory::High
        } else if overall >= 0.4 {
            ConfidenceCategory::Medium
        } else {
            ConfidenceCategory::Low
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceFactors {
    pub model_consensus: f64,
    pub source_reliability: f64,
    pub data_completeness: f64,
    pub forecast_horizon: f64,
    pub historical_accuracy: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceBreakdown {
    pub buoy_confidence: f64,
    pub pressure_confidence: f64,
    pub model_confidence: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceReport {
    pub overall: f64,
    pub category: ConfidenceCategory,
    pub factors: ConfidenceFactors,
    pub breakdown: ConfidenceBreakdown,
    pub warnings: Vec<String>,
}

/// Everything the scorer needs about one fusion run.
#[derive(Clone, Debug, Default)]
pub struct ConfidenceInput {
    /// Primary-component heights reported by each model-class source.
    pub model_heights: Vec<f64>,
    /// Scores of every source that contributed data.
    pub source_scores: Vec<SourceScore>,
    /// Kinds of sources actually present in the bundle.
    pub present_kinds: Vec<SourceKind>,
    pub buoy_count: usize,
    pub horizon_days: f64,
    /// Per-source detection confidences from the pressure analysis.
    pub storm_confidences: Vec<f64>,
    /// Validation-loop accuracy, when the store has enough history.
    pub historical_accuracy: Option<f64>,
    /// Mean per-kind source score, for the breakdown section.
    pub buoy_score_mean: Option<f64>,
    pub model_score_mean: Option<f64>,
}

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn score(input: &ConfidenceInput) -> ConfidenceReport {
        let model_consensus = consensus(&input.model_heights);

        let source_reliability = if input.source_scores.is_empty() {
            0.0
        } else {
            input.source_scores.iter().map(|s| s.overall_score).sum::<f64>()
                / input.source_scores.len() as f64
        };

        let present = EXPECTED_SOURCE_KINDS
            .iter()
            .filter(|kind| input.present_kinds.contains(kind))
            .count();
        let data_completeness = present as f64 / EXPECTED_SOURCE_KINDS.len() as f64;

        let forecast_horizon = (1.0 - input.horizon_days * 0.1).max(0.5);

        let historical_accuracy = input
            .historical_accuracy
            .unwrap_or(DEFAULT_HISTORICAL_ACCURACY);

        let overall = CONSENSUS_WEIGHT * model_consensus
            + RELIABILITY_WEIGHT * source_reliability
            + COMPLETENESS_WEIGHT * data_completeness
            + HORIZON_WEIGHT * forecast_horizon
            + ACCURACY_WEIGHT * historical_accuracy;

        let mut warnings = vec![];
        if overall < 0.4 {
            warnings.push("very low confidence".to_string());
        }
        if data_completeness < 0.5 {
            warnings.push("limited data sources".to_string());
        }
        if model_consensus < 0.5 {
            warnings.push("significant disagreement between models".to_string());
        }
        if input.buoy_count == 0 {
            warnings.push("no buoy data".to_string());
        }
        if input.horizon_days > 5.0 {
            warnings.push("long forecast horizon".to_string());
        }

        let pressure_confidence = if input.storm_confidences.is_empty() {
            0.0
        } else {
            input.storm_confidences.iter().sum::<f64>() / input.storm_confidences.len() as f64
        };

        ConfidenceReport {
            overall,
            category: ConfidenceCategory::from_overall(overall),
            factors: ConfidenceFactors {
                model_consensus,
                source_reliability,
                data_completeness,
                forecast_horizon,
                historical_accuracy,
            },
            breakdown: ConfidenceBreakdown {
                buoy_confidence: input.buoy_score_mean.unwrap_or(0.0),
                pressure_confidence,
                model_confidence: input.model_score_mean.unwrap_or(0.0),
            },
            warnings,
        }
    }
}

/// Agreement between model-class sources: 1 − normalized height spread.
/// A single source cannot corroborate itself; none at all is worse.
fn consensus(heights: &[f64]) -> f64 {
    match heights.len() {
        0 => 0.5,
        1 => 0.7,
        n => {
            let mean = heights.iter().sum::<f64>() / n as f64;
            if mean.abs() < f64::EPSILON {
                return 0.5;
            }
            let variance =
                heights.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / n as f64;
            let normalized = (variance.sqrt() / mean).clamp(0.0, 1.0);
            1.0 - normalized
        }
    }
}
