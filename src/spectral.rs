use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::wave_data_record::{WaveDataRecord, WaveDataRecordCollection};
use crate::swell::{ComponentType, Metadata, SpectralPeak, SwellComponent};
use crate::tools::waves::spectral_energy_density;
use crate::units::direction::angular_difference;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpectralConfig {
    pub max_components: usize,
    pub min_period_s: f64,
    pub max_period_s: f64,
    pub min_separation_period_s: f64,
    pub min_separation_direction_deg: f64,
    pub frequency_bandwidth_hz: f64,
    /// How many of the newest summary rows feed one analysis.
    pub max_rows: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        SpectralConfig {
            max_components: 5,
            min_period_s: 8.0,
            max_period_s: 25.0,
            min_separation_period_s: 3.0,
            min_separation_direction_deg: 30.0,
            frequency_bandwidth_hz: 0.03,
            max_rows: 24,
        }
    }
}

/// Decomposition of a buoy's wave summary into distinct wave trains,
/// ordered by descending energy. `dominant_peak` mirrors `peaks[0]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpectralAnalysisResult {
    pub buoy_id: String,
    pub timestamp: DateTime<Utc>,
    pub peaks: Vec<SpectralPeak>,
    pub total_energy: f64,
    pub dominant_peak: Option<SpectralPeak>,
    #[serde(default)]
    pub metadata: Metadata,
}

pub struct SpectralAnalyzer {
    config: SpectralConfig,
}

impl SpectralAnalyzer {
    pub fn new(config: SpectralConfig) -> SpectralAnalyzer {
        SpectralAnalyzer { config }
    }

    /// Reads and analyzes an NDBC `.spec` summary file. Missing or
    /// unreadable files analyze to `None` so a flaky download degrades
    /// confidence instead of failing the run.
    pub fn analyze_file(&self, path: &Path, buoy_id: &str) -> Option<SpectralAnalysisResult> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(buoy_id, path = %path.display(), error = %e, "unable to read wave summary");
                return None;
            }
        };

        self.analyze_data(buoy_id, &data)
    }

    pub fn analyze_data(&self, buoy_id: &str, data: &str) -> Option<SpectralAnalysisResult> {
        let mut collection = WaveDataRecordCollection::from_data(data);
        let records: Vec<WaveDataRecord> =
            collection.records().take(self.config.max_rows).collect();

        if records.is_empty() {
            warn!(buoy_id, "no parseable rows in wave summary");
            return None;
        }

        let timestamp = records[0].date;
        let mut candidates: Vec<SpectralPeak> = vec![];
        for record in &records {
            candidates.extend(self.candidate_peaks(buoy_id, record));
        }

        candidates.sort_by(|a, b| {
            b.energy_density
                .partial_cmp(&a.energy_density)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut peaks: Vec<SpectralPeak> = vec![];
        for candidate in candidates {
            if peaks.len() >= self.config.max_components {
                break;
            }
            if peaks.iter().all(|kept| self.well_separated(kept, &candidate)) {
                peaks.push(candidate);
            }
        }

        let total_energy = peaks.iter().map(|p| p.energy_density).sum();
        let dominant_peak = peaks.first().cloned();

        debug!(buoy_id, peaks = peaks.len(), total_energy, "spectral analysis complete");

        Some(SpectralAnalysisResult {
            buoy_id: buoy_id.into(),
            timestamp,
            peaks,
            total_energy,
            dominant_peak,
            metadata: Metadata::new(),
        })
    }

    /// Up to two candidates per row: the swell train and the wind-wave
    /// train, each gated on period bounds, positive height, and a usable
    /// direction.
    fn candidate_peaks(&self, buoy_id: &str, record: &WaveDataRecord) -> Vec<SpectralPeak> {
        let mut candidates = vec![];

        let mut push = |height: Option<f64>,
                        period: Option<f64>,
                        direction: Option<f64>,
                        component_type: ComponentType| {
            let (Some(height), Some(period), Some(direction)) = (height, period, direction) else {
                return;
            };
            if height <= 0.0
                || period < self.config.min_period_s
                || period > self.config.max_period_s
            {
                return;
            }

            let (confidence, spread) = match component_type {
                ComponentType::Swell => (0.85, 30.0),
                ComponentType::WindWave => (0.75, 60.0),
            };

            let component = SwellComponent::new(height, period, direction, confidence, buoy_id);
            let energy = spectral_energy_density(height, self.config.frequency_bandwidth_hz);
            candidates.push(SpectralPeak::new(component, energy, spread, component_type));
        };

        push(
            record.swell_wave_height.value,
            record.swell_wave_period.value,
            record.swell_wave_direction.value.as_ref().map(|d| d.degrees),
            ComponentType::Swell,
        );
        push(
            record.wind_wave_height.value,
            record.wind_wave_period.value,
            record.wind_wave_direction.value.as_ref().map(|d| d.degrees),
            ComponentType::WindWave,
        );

        candidates
    }

    fn well_separated(&self, a: &SpectralPeak, b: &SpectralPeak) -> bool {
        let period_gap = (a.component.period_s - b.component.period_s).abs();
        let direction_gap =
            angular_difference(a.component.direction_deg, b.component.direction_deg);

        period_gap >= self.config.min_separation_period_s
            && direction_gap >= self.config.min_separation_direction_deg
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        SpectralAnalyzer::new(SpectralConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // WVHT SwH SwP WWH WWP SwD WWD STEEPNESS APD MWD
    const NORTH_SHORE_ROW: &str =
        "2024 11 14 00 43  3.0  2.5 14.0  1.0  8.0 330 060 AVERAGE  9.2 330";

    #[test]
    fn test_two_peak_decomposition() {
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_data("51201", NORTH_SHORE_ROW).unwrap();

        assert_eq!(result.peaks.len(), 2);
        let dominant = result.dominant_peak.as_ref().unwrap();
        assert_eq!(dominant.component_type, ComponentType::Swell);
        assert!((dominant.component.height_m - 2.5).abs() < 1e-9);
        assert!((dominant.component.period_s - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_dominant_is_first_and_energy_ordered() {
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_data("51201", NORTH_SHORE_ROW).unwrap();

        let dominant = result.dominant_peak.clone().unwrap();
        assert_eq!(dominant, result.peaks[0]);
        for pair in result.peaks.windows(2) {
            assert!(pair[0].energy_density >= pair[1].energy_density);
        }
    }

    #[test]
    fn test_separation_criteria() {
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_data("51201", NORTH_SHORE_ROW).unwrap();

        for (i, a) in result.peaks.iter().enumerate() {
            for b in result.peaks.iter().skip(i + 1) {
                let period_gap = (a.component.period_s - b.component.period_s).abs();
                let dir_gap =
                    angular_difference(a.component.direction_deg, b.component.direction_deg);
                assert!(period_gap >= 3.0 || dir_gap >= 30.0);
            }
        }
    }

    #[test]
    fn test_near_duplicate_rows_collapse() {
        let data = "2024 11 14 00 43  3.0  2.5 14.0  1.0  8.0 330 060 AVERAGE  9.2 330\n\
                    2024 11 13 23 43  3.0  2.4 14.5  1.1  8.0 332 062 AVERAGE  9.2 331\n";
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_data("51201", data).unwrap();

        // four candidates, but the second row's trains are not separated
        // from the first row's
        assert_eq!(result.peaks.len(), 2);
    }

    #[test]
    fn test_short_period_wind_wave_filtered() {
        // 6 s wind wave sits under the default 8 s floor
        let data = "2024 11 14 00 43  2.0  1.8 12.0  0.8  6.0 200 080 AVERAGE  8.0 200";
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_data("51202", data).unwrap();

        assert_eq!(result.peaks.len(), 1);
        assert_eq!(result.peaks[0].component_type, ComponentType::Swell);
    }

    #[test]
    fn test_all_rows_filtered_yields_empty_peaks() {
        let data = "2024 11 14 00 43  0.5   MM   MM  0.5  3.0  MM 080 AVERAGE  4.0 090";
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_data("51000", data).unwrap();

        assert!(result.peaks.is_empty());
        assert!(result.dominant_peak.is_none());
        assert_eq!(result.total_energy, 0.0);
    }

    #[test]
    fn test_corrupt_data_returns_none() {
        let analyzer = SpectralAnalyzer::default();
        assert!(analyzer.analyze_data("51000", "not a spec file at all").is_none());
    }

    #[test]
    fn test_missing_file_returns_none() {
        let analyzer = SpectralAnalyzer::default();
        let result = analyzer.analyze_file(Path::new("/nonexistent/51201.spec"), "51201");
        assert!(result.is_none());
    }
}
