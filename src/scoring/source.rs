use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const TIER_WEIGHT: f64 = 0.50;
pub const FRESHNESS_WEIGHT: f64 = 0.20;
pub const COMPLETENESS_WEIGHT: f64 = 0.20;
pub const ACCURACY_WEIGHT: f64 = 0.10;

pub const DEFAULT_HISTORICAL_ACCURACY: f64 = 0.70;

/// Kind of payload a source delivers; selects the completeness template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Buoy,
    Model,
    Weather,
    Pressure,
    Altimetry,
    MarineForecast,
    Other,
}

impl SourceKind {
    fn required_fields(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Buoy => &["wave_height", "period", "direction", "timestamp"],
            SourceKind::Model => &["height", "period", "direction"],
            SourceKind::Weather => &["wind_speed", "wind_direction"],
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceScore {
    pub source_id: String,
    pub tier: u8,
    pub tier_score: f64,
    pub freshness_score: f64,
    pub completeness_score: f64,
    pub accuracy_score: f64,
    pub overall_score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Curated provider registry: substring match against the source id,
/// most trusted tier wins.
const TIER_REGISTRY: [(&str, u8); 19] = [
    ("ndbc", 1),
    ("nws", 1),
    ("opc", 1),
    ("nhc", 1),
    ("noaa", 1),
    ("spc", 1),
    ("pacioos", 2),
    ("cdip", 2),
    ("swan", 2),
    ("ww3", 2),
    ("wavewatch", 2),
    ("ecmwf", 3),
    ("bom", 3),
    ("ukmo", 3),
    ("jma", 3),
    ("open-meteo", 4),
    ("stormglass", 4),
    ("surfline", 5),
    ("magicseaweed", 5),
];

pub fn tier_score(tier: u8) -> f64 {
    match tier {
        1 => 1.0,
        2 => 0.9,
        3 => 0.7,
        4 => 0.5,
        _ => 0.3,
    }
}

/// Assigns reliability scores to every source seen by the fusion layer.
/// Historical accuracy is a cache fed by the validation loop.
pub struct SourceScorer {
    accuracy_cache: HashMap<String, f64>,
}

impl SourceScorer {
    pub fn new() -> SourceScorer {
        SourceScorer {
            accuracy_cache: HashMap::new(),
        }
    }

    pub fn set_historical_accuracy(&mut self, source_id: &str, accuracy: f64) {
        self.accuracy_cache
            .insert(source_id.to_lowercase(), accuracy.clamp(0.0, 1.0));
    }

    pub fn score(
        &self,
        source_id: &str,
        kind: SourceKind,
        latest_observation: Option<DateTime<Utc>>,
        present_fields: &[&str],
        now: DateTime<Utc>,
    ) -> SourceScore {
        let tier = self.resolve_tier(source_id);
        let tier_score = tier_score(tier);

        let freshness_score = match latest_observation {
            Some(observed) => {
                // forecast-valid timestamps in the future count as fresh
                let age_hours = ((now - observed).num_seconds() as f64 / 3600.0).max(0.0);
                (1.0 - age_hours / 24.0).max(0.0)
            }
            None => 0.0,
        };

        let required = kind.required_fields();
        let completeness_score = if required.is_empty() {
            1.0
        } else {
            let present = required
                .iter()
                .filter(|field| present_fields.contains(field))
                .count();
            present as f64 / required.len() as f64
        };

        let accuracy_score = self
            .accuracy_cache
            .get(&source_id.to_lowercase())
            .copied()
            .unwrap_or(DEFAULT_HISTORICAL_ACCURACY);

        let overall_score = (TIER_WEIGHT * tier_score
            + FRESHNESS_WEIGHT * freshness_score
            + COMPLETENESS_WEIGHT * completeness_score
            + ACCURACY_WEIGHT * accuracy_score)
            .clamp(0.0, 1.0);

        SourceScore {
            source_id: source_id.into(),
            tier,
            tier_score,
            freshness_score,
            completeness_score,
            accuracy_score,
            overall_score,
            timestamp: now,
        }
    }

    fn resolve_tier(&self, source_id: &str) -> u8 {
        let lowered = source_id.to_lowercase();
        let tier = TIER_REGISTRY
            .iter()
            .filter(|(needle, _)| lowered.contains(needle))
            .map(|(_, tier)| *tier)
            .min();

        match tier {
            Some(tier) => tier,
            None => {
                warn!(source_id, "unknown data source, scoring at lowest tier");
                5
            }
        }
    }
}

impl Default for SourceScorer {
    fn default() -> Self {
        SourceScorer::new()
    }
}
