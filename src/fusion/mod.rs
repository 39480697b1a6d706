pub mod shore;

pub use shore::{legacy_back_height_ft, Shore, ShoreScaling, Trend};

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data::erddap_wave_data_record::ModelTimeStep;
use crate::data::marine_forecast_data_record::MarineForecastRecord;
use crate::data::meteorological_data_record::MeteorologicalDataRecord;
use crate::propagation::SwellArrival;
use crate::scoring::confidence::{ConfidenceInput, ConfidenceReport, ConfidenceScorer};
use crate::scoring::source::{SourceKind, SourceScore, SourceScorer};
use crate::spectral::SpectralAnalysisResult;
use crate::swell::{
    ComponentType, EventSource, Metadata, SwellComponent, SwellEvent, SwellProvider,
};
use crate::units::METERS_TO_FEET;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionConfig {
    pub shore_scaling: ShoreScaling,
    /// Buoy/model height disagreement, meters, above which the blend is
    /// recorded as a conflict.
    pub conflict_threshold_m: f64,
    pub horizon_days: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            shore_scaling: ShoreScaling::default(),
            conflict_threshold_m: 0.75,
            horizon_days: 3,
        }
    }
}

/// Everything one buoy contributed to the bundle.
#[derive(Clone, Debug, Default)]
pub struct BuoyInput {
    pub station_id: String,
    pub latest: Option<MeteorologicalDataRecord>,
    pub spectral: Option<SpectralAnalysisResult>,
}

#[derive(Clone, Debug)]
pub struct ModelInput {
    pub source_id: String,
    pub time_steps: Vec<ModelTimeStep>,
}

#[derive(Clone, Debug)]
pub struct MarineForecastInput {
    pub source_id: String,
    pub location_name: String,
    pub records: Vec<MarineForecastRecord>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WindInput {
    pub speed_kt: f64,
    pub direction_deg: f64,
}

#[derive(Clone, Debug, Default)]
pub struct FusionInput {
    pub bundle_id: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub buoys: Vec<BuoyInput>,
    pub models: Vec<ModelInput>,
    pub marine_forecasts: Vec<MarineForecastInput>,
    pub storm_arrivals: Vec<SwellArrival>,
    pub wind: Option<WindInput>,
    pub historical_accuracy: Option<f64>,
    /// Source kinds present in the bundle beyond what fusion reads
    /// directly (altimetry imagery and the like).
    pub extra_present_kinds: Vec<SourceKind>,
}

/// One time-windowed prediction in a shore's forecast sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShoreWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub face_height_ft_h13: f64,
    pub face_height_ft_h110: f64,
    pub primary_direction_deg: f64,
    pub primary_period_s: f64,
    pub trend: Trend,
    pub wind_speed_kt: Option<f64>,
    pub wind_direction_deg: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShoreForecast {
    pub shore: Shore,
    pub windows: Vec<ShoreWindow>,
}

/// The fused artifact handed to the narrative layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusedForecast {
    pub forecast_id: String,
    pub generated_at: DateTime<Utc>,
    pub bundle_id: String,
    pub swell_events: Vec<SwellEvent>,
    pub shore_forecasts: Vec<ShoreForecast>,
    pub storm_arrivals: Vec<SwellArrival>,
    pub confidence_report: ConfidenceReport,
    pub source_scores: BTreeMap<String, SourceScore>,
    pub metadata: Metadata,
}

pub struct FusionEngine {
    config: FusionConfig,
    scorer: SourceScorer,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, scorer: SourceScorer) -> FusionEngine {
        FusionEngine { config, scorer }
    }

    /// Merges every bundle input into per-shore forecasts. The pipeline is
    /// sequential and deterministic for a given input set.
    pub fn fuse(&self, input: &FusionInput) -> FusedForecast {
        let generated_at = input.generated_at.unwrap_or_else(Utc::now);

        let mut metadata = Metadata::new();
        let source_scores = self.score_sources(input, generated_at);
        let mut events = self.extract_events(input, &source_scores);

        events.sort_by_key(|e| e.peak_time);
        info!(events = events.len(), bundle_id = %input.bundle_id, "swell events extracted");

        let mut conflicts: Vec<serde_json::Value> = vec![];
        let shore_forecasts = Shore::all()
            .into_iter()
            .map(|shore| {
                self.build_shore_forecast(
                    shore,
                    generated_at,
                    &events,
                    &source_scores,
                    input.wind,
                    &mut conflicts,
                )
            })
            .collect();

        if !conflicts.is_empty() {
            metadata.insert("conflicts".into(), serde_json::Value::Array(conflicts));
        }

        let confidence_report = self.score_confidence(input, &source_scores);

        FusedForecast {
            forecast_id: Uuid::new_v4().to_string(),
            generated_at,
            bundle_id: input.bundle_id.clone(),
            swell_events: events,
            shore_forecasts,
            storm_arrivals: input.storm_arrivals.clone(),
            confidence_report,
            source_scores,
            metadata,
        }
    }

    fn score_sources(
        &self,
        input: &FusionInput,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, SourceScore> {
        let mut scores = BTreeMap::new();

        for buoy in &input.buoys {
            let source_id = format!("ndbc_{}", buoy.station_id);
            let mut fields: Vec<&str> = vec![];
            let mut latest = None;

            if let Some(spectral) = &buoy.spectral {
                latest = Some(spectral.timestamp);
                if !spectral.peaks.is_empty() {
                    fields = vec!["wave_height", "period", "direction", "timestamp"];
                }
            }
            if let Some(met) = &buoy.latest {
                latest = Some(latest.map_or(met.date, |t: DateTime<Utc>| t.max(met.date)));
                if met.wave_height.value.is_some() {
                    fields.push("wave_height");
                }
                if met.dominant_wave_period.value.is_some() {
                    fields.push("period");
                }
                if met.mean_wave_direction.value.is_some() {
                    fields.push("direction");
                }
                fields.push("timestamp");
            }
            fields.dedup();

            let score = self
                .scorer
                .score(&source_id, SourceKind::Buoy, latest, &fields, now);
            scores.insert(source_id, score);
        }

        for model in &input.models {
            let latest = model.time_steps.iter().map(|s| s.time).max();
            let fields: Vec<&str> = if model.time_steps.is_empty() {
                vec![]
            } else {
                vec!["height", "period", "direction"]
            };
            let score = self
                .scorer
                .score(&model.source_id, SourceKind::Model, latest, &fields, now);
            scores.insert(model.source_id.clone(), score);
        }

        for marine in &input.marine_forecasts {
            let latest = marine.records.iter().map(|r| r.time).max();
            let fields: Vec<&str> = if marine.records.is_empty() {
                vec![]
            } else {
                vec!["height", "period", "direction"]
            };
            let score = self
                .scorer
                .score(&marine.source_id, SourceKind::Model, latest, &fields, now);
            scores.insert(marine.source_id.clone(), score);
        }

        if !input.storm_arrivals.is_empty() {
            let score =
                self.scorer
                    .score("opc_pressure_analysis", SourceKind::Pressure, Some(now), &[], now);
            scores.insert("opc_pressure_analysis".into(), score);
        }

        scores
    }

    fn extract_events(
        &self,
        input: &FusionInput,
        scores: &BTreeMap<String, SourceScore>,
    ) -> Vec<SwellEvent> {
        let mut events = vec![];

        for buoy in &input.buoys {
            match self.buoy_event(buoy) {
                Some(mut event) => {
                    let source_id = format!("ndbc_{}", buoy.station_id);
                    attach_weight(&mut event, scores.get(&source_id));
                    events.push(event);
                }
                None => {
                    debug!(station = %buoy.station_id, "buoy contributed no usable event");
                }
            }
        }

        for model in &input.models {
            for (i, step) in model.time_steps.iter().enumerate() {
                let component = SwellComponent::new(
                    step.wave_height_mean,
                    step.peak_period_mean,
                    step.mean_direction,
                    0.8,
                    &model.source_id,
                );
                let event = SwellEvent::from_components(
                    format!("model-{}-{}", model.source_id, i),
                    step.time,
                    step.time,
                    EventSource::Model,
                    vec![component],
                    vec![],
                    legacy_back_height_ft(step.wave_height_mean),
                );
                if let Ok(mut event) = event {
                    event.metadata.insert(
                        "grid_points".into(),
                        serde_json::Value::from(step.grid_points),
                    );
                    event.metadata.insert(
                        "height_range_m".into(),
                        serde_json::json!([step.wave_height_min, step.wave_height_max]),
                    );
                    attach_weight(&mut event, scores.get(&model.source_id));
                    events.push(event);
                }
            }
        }

        for marine in &input.marine_forecasts {
            for (i, record) in marine.records.iter().enumerate() {
                let primary = SwellComponent::new(
                    record.wave_height,
                    record.wave_period,
                    record.wave_direction,
                    0.7,
                    &marine.source_id,
                );
                let mut secondary = vec![];
                if let (Some(h), Some(p), Some(d)) = (
                    record.swell_wave_height,
                    record.swell_wave_period,
                    record.swell_wave_direction,
                ) {
                    secondary.push(SwellComponent::new(h, p, d, 0.7, &marine.source_id));
                }

                let event = SwellEvent::from_components(
                    format!("marine-{}-{}-{}", marine.source_id, marine.location_name, i),
                    record.time,
                    record.time,
                    EventSource::MarineForecast,
                    vec![primary],
                    secondary,
                    legacy_back_height_ft(record.wave_height),
                );
                if let Ok(mut event) = event {
                    event
                        .metadata
                        .insert("location".into(), serde_json::Value::from(marine.location_name.clone()));
                    attach_weight(&mut event, scores.get(&marine.source_id));
                    events.push(event);
                }
            }
        }

        for arrival in &input.storm_arrivals {
            let height_m = arrival.height_ft / METERS_TO_FEET;
            let component = SwellComponent::new(
                height_m,
                arrival.period_s,
                arrival.direction_deg,
                arrival.confidence,
                &arrival.storm_id,
            );
            let event = SwellEvent::from_components(
                format!("storm-{}", arrival.storm_id),
                arrival.arrival_time - Duration::hours(12),
                arrival.arrival_time,
                EventSource::PressureChart,
                vec![component],
                vec![],
                legacy_back_height_ft(height_m),
            );
            if let Ok(mut event) = event {
                event.metadata.insert(
                    "distance_nm".into(),
                    serde_json::Value::from(arrival.distance_nm),
                );
                event.metadata.insert(
                    "travel_time_hours".into(),
                    serde_json::Value::from(arrival.travel_time_hours),
                );
                attach_weight(&mut event, scores.get("opc_pressure_analysis"));
                events.push(event);
            }
        }

        events
    }

    /// A buoy prefers its spectral decomposition; the plain summary is the
    /// fallback when the `.spec` parse produced nothing.
    fn buoy_event(&self, buoy: &BuoyInput) -> Option<SwellEvent> {
        if let Some(spectral) = &buoy.spectral {
            if !spectral.peaks.is_empty() {
                let mut primary = vec![];
                let mut secondary = vec![];
                for peak in &spectral.peaks {
                    match peak.component_type {
                        ComponentType::Swell => primary.push(peak.component.clone()),
                        ComponentType::WindWave => secondary.push(peak.component.clone()),
                    }
                }
                // wind-wave only seas still make an event
                if primary.is_empty() {
                    std::mem::swap(&mut primary, &mut secondary);
                }

                let reference_height = primary
                    .first()
                    .map(|c| c.height_m)
                    .unwrap_or(0.0);

                return SwellEvent::from_components(
                    format!("buoy-{}-{}", buoy.station_id, spectral.timestamp.timestamp()),
                    spectral.timestamp,
                    spectral.timestamp,
                    EventSource::BuoySpectral,
                    primary,
                    secondary,
                    legacy_back_height_ft(reference_height),
                )
                .ok();
            }
        }

        let met = buoy.latest.as_ref()?;
        let summary = met.swell_data().ok()?;

        SwellEvent::from_components(
            format!("buoy-{}-{}", buoy.station_id, met.date.timestamp()),
            met.date,
            met.date,
            EventSource::Buoy,
            vec![summary.summary.clone()],
            summary.components,
            legacy_back_height_ft(summary.summary.height_m),
        )
        .ok()
    }

    fn build_shore_forecast(
        &self,
        shore: Shore,
        generated_at: DateTime<Utc>,
        events: &[SwellEvent],
        scores: &BTreeMap<String, SourceScore>,
        wind: Option<WindInput>,
        conflicts: &mut Vec<serde_json::Value>,
    ) -> ShoreForecast {
        let scaling = &self.config.shore_scaling;
        let mut windows: Vec<ShoreWindow> = vec![];

        for day in 0..self.config.horizon_days {
            let window_start = generated_at + Duration::hours(24 * day as i64);
            let window_end = window_start + Duration::hours(24);
            // current observations land just before the run starts
            let candidate_start = if day == 0 {
                window_start - Duration::hours(24)
            } else {
                window_start
            };

            let candidates: Vec<&SwellEvent> = events
                .iter()
                .filter(|e| e.peak_time >= candidate_start && e.peak_time < window_end)
                .filter(|e| shore.accepts_direction(e.primary_direction))
                .collect();

            if candidates.is_empty() {
                continue;
            }

            let face = |event: &SwellEvent| -> Option<(f64, f64, f64)> {
                let c = event.dominant_component()?;
                Some((
                    scaling.face_height_ft(shore, c.height_m, c.period_s),
                    c.period_s,
                    c.direction_deg,
                ))
            };

            let best_of = |class: &[EventSource]| -> Option<&SwellEvent> {
                candidates
                    .iter()
                    .filter(|e| class.contains(&e.source))
                    .max_by(|a, b| {
                        let ha = face(a).map(|f| f.0).unwrap_or(0.0);
                        let hb = face(b).map(|f| f.0).unwrap_or(0.0);
                        ha.partial_cmp(&hb).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .copied()
            };

            let buoy_rep = best_of(&[EventSource::Buoy, EventSource::BuoySpectral]);
            let model_rep = best_of(&[EventSource::Model, EventSource::MarineForecast]);
            let storm_rep = best_of(&[EventSource::PressureChart]);

            let chosen = [buoy_rep, model_rep, storm_rep]
                .into_iter()
                .flatten()
                .max_by(|a, b| {
                    let ha = face(a).map(|f| f.0).unwrap_or(0.0);
                    let hb = face(b).map(|f| f.0).unwrap_or(0.0);
                    ha.partial_cmp(&hb).unwrap_or(std::cmp::Ordering::Equal)
                });

            let Some(chosen) = chosen else { continue };
            let Some((mut h13, period, direction)) = face(chosen) else {
                continue;
            };

            // Disagreement between the buoy and model streams is blended by
            // source weight and always recorded, never silently resolved.
            if let (Some(buoy_event), Some(model_event)) = (buoy_rep, model_rep) {
                let bh = buoy_event.dominant_component().map(|c| c.height_m);
                let mh = model_event.dominant_component().map(|c| c.height_m);
                if let (Some(bh), Some(mh)) = (bh, mh) {
                    if (bh - mh).abs() > self.config.conflict_threshold_m {
                        let bw = event_weight(buoy_event, scores).max(0.05);
                        let mw = event_weight(model_event, scores).max(0.05);
                        let blended_m = (bh * bw + mh * mw) / (bw + mw);
                        h13 = scaling.face_height_ft(shore, blended_m, period);

                        warn!(
                            shore = %shore,
                            buoy_height_m = bh,
                            model_height_m = mh,
                            "buoy/model height conflict, blending by source weight"
                        );
                        conflicts.push(serde_json::json!({
                            "shore": shore.name(),
                            "window_start": window_start.to_rfc3339(),
                            "buoy_height_m": bh,
                            "model_height_m": mh,
                            "buoy_weight": bw,
                            "model_weight": mw,
                            "blended_height_m": blended_m,
                        }));
                    }
                }
            }

            windows.push(ShoreWindow {
                window_start,
                window_end,
                face_height_ft_h13: h13,
                face_height_ft_h110: 1.5 * h13,
                primary_direction_deg: direction,
                primary_period_s: period,
                trend: Trend::Steady,
                wind_speed_kt: wind.map(|w| w.speed_kt),
                wind_direction_deg: wind.map(|w| w.direction_deg),
            });
        }

        label_trends(&mut windows);

        ShoreForecast { shore, windows }
    }

    fn score_confidence(
        &self,
        input: &FusionInput,
        scores: &BTreeMap<String, SourceScore>,
    ) -> ConfidenceReport {
        let mut model_heights = vec![];
        for model in &input.models {
            if !model.time_steps.is_empty() {
                let mean = model
                    .time_steps
                    .iter()
                    .map(|s| s.wave_height_mean)
                    .sum::<f64>()
                    / model.time_steps.len() as f64;
                model_heights.push(mean);
            }
        }
        for marine in &input.marine_forecasts {
            if !marine.records.is_empty() {
                let mean = marine.records.iter().map(|r| r.wave_height).sum::<f64>()
                    / marine.records.len() as f64;
                model_heights.push(mean);
            }
        }

        let buoy_count = input
            .buoys
            .iter()
            .filter(|b| b.latest.is_some() || b.spectral.is_some())
            .count();

        let mut present_kinds = input.extra_present_kinds.clone();
        if buoy_count > 0 {
            present_kinds.push(SourceKind::Buoy);
        }
        if input.models.iter().any(|m| !m.time_steps.is_empty()) {
            present_kinds.push(SourceKind::Model);
        }
        if !input.storm_arrivals.is_empty() {
            present_kinds.push(SourceKind::Pressure);
        }
        if input.marine_forecasts.iter().any(|m| !m.records.is_empty()) {
            present_kinds.push(SourceKind::MarineForecast);
        }

        let kind_mean = |prefix: &str| -> Option<f64> {
            let values: Vec<f64> = scores
                .iter()
                .filter(|(id, _)| id.starts_with(prefix))
                .map(|(_, s)| s.overall_score)
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        ConfidenceScorer::score(&ConfidenceInput {
            model_heights,
            source_scores: scores.values().cloned().collect(),
            present_kinds,
            buoy_count,
            horizon_days: self.config.horizon_days as f64,
            storm_confidences: input.storm_arrivals.iter().map(|a| a.confidence).collect(),
            historical_accuracy: input.historical_accuracy,
            buoy_score_mean: kind_mean("ndbc"),
            model_score_mean: scores
                .iter()
                .filter(|(id, _)| !id.starts_with("ndbc") && *id != "opc_pressure_analysis")
                .map(|(_, s)| s.overall_score)
                .fold(None, |acc: Option<(f64, usize)>, v| {
                    Some(match acc {
                        Some((sum, n)) => (sum + v, n + 1),
                        None => (v, 1),
                    })
                })
                .map(|(sum, n)| sum / n as f64),
        })
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        FusionEngine::new(FusionConfig::default(), SourceScorer::default())
    }
}

fn attach_weight(event: &mut SwellEvent, score: Option<&SourceScore>) {
    if let Some(score) = score {
        event
            .metadata
            .insert("weight".into(), serde_json::Value::from(score.overall_score));
    }
}

fn event_weight(event: &SwellEvent, scores: &BTreeMap<String, SourceScore>) -> f64 {
    event
        .metadata
        .get("weight")
        .and_then(|v| v.as_f64())
        .or_else(|| {
            event
                .dominant_component()
                .and_then(|c| scores.get(&c.source_tag).map(|s| s.overall_score))
        })
        .unwrap_or(0.5)
}

/// Second pass over a shore timeline: label each window against its
/// neighbors by height movement.
fn label_trends(windows: &mut [ShoreWindow]) {
    let heights: Vec<f64> = windows.iter().map(|w| w.face_height_ft_h13).collect();

    for i in 0..windows.len() {
        let prev = if i > 0 { Some(heights[i - 1]) } else { None };
        let next = heights.get(i + 1).copied();

        let trend = match (prev, next) {
            (Some(p), Some(n)) if heights[i] > p && heights[i] > n => Trend::Peak,
            (Some(p), None) if heights[i] > p * 1.05 => Trend::Peak,
            (Some(p), _) if heights[i] > p * 1.05 => Trend::Rising,
            (Some(p), _) if heights[i] < p * 0.95 => Trend::Falling,
            (Some(_), _) => Trend::Steady,
            (None, Some(n)) if n > heights[i] * 1.05 => Trend::Rising,
            (None, Some(n)) if n < heights[i] * 0.95 => Trend::Peak,
            (None, _) => Trend::Steady,
        };

        windows[i].trend = trend;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::SpectralAnalyzer;
    use chrono::TimeZone;

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 14, 6, 0, 0).single().unwrap()
    }

    fn north_swell_buoy() -> BuoyInput {
        // 2.5 m @ 14 s from 330° with 1 m of 8 s windswell from 060°
        let data = "2024 11 14 00 43  3.0  2.5 14.0  1.0  8.0 330 060 AVERAGE  9.2 330";
        let spectral = SpectralAnalyzer::default().analyze_data("51201", data);
        BuoyInput {
            station_id: "51201".into(),
            latest: None,
            spectral,
        }
    }

    fn north_model() -> ModelInput {
        ModelInput {
            source_id: "pacioos_ww3_hawaii".into(),
            time_steps: vec![ModelTimeStep {
                time: run_time() + Duration::hours(6),
                wave_height_mean: 2.4,
                wave_height_max: 2.8,
                wave_height_min: 2.0,
                peak_period_mean: 14.0,
                mean_direction: 325.0,
                grid_points: 24,
            }],
        }
    }

    #[test]
    fn test_buoy_spectral_event_preferred() {
        let engine = FusionEngine::default();
        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            buoys: vec![north_swell_buoy()],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        assert_eq!(forecast.swell_events.len(), 1);

        let event = &forecast.swell_events[0];
        assert_eq!(event.source, EventSource::BuoySpectral);
        assert!(!event.primary_components.is_empty());
        assert!((event.primary_direction - 330.0).abs() < 1e-9);
        assert!(!event.secondary_components.is_empty());
    }

    #[test]
    fn test_north_shore_scaled_window() {
        let engine = FusionEngine::default();
        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            buoys: vec![north_swell_buoy()],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        let north = forecast
            .shore_forecasts
            .iter()
            .find(|s| s.shore == Shore::North)
            .unwrap();

        assert!(!north.windows.is_empty());
        let window = &north.windows[0];
        // 2.5 m @ 14 s scales to ~13.3 ft faces on the north shore
        assert!((window.face_height_ft_h13 - 13.29).abs() < 0.2, "got {}", window.face_height_ft_h13);
        assert!((window.face_height_ft_h110 - 1.5 * window.face_height_ft_h13).abs() < 1e-9);
    }

    #[test]
    fn test_off_band_event_excluded_from_shores_but_kept() {
        let engine = FusionEngine::default();
        // pure east windswell: in no band but East; check South excludes it
        let data = "2024 11 14 00 43  2.0  1.8 12.0  0.8  8.0 075 080 AVERAGE  8.0 075";
        let spectral = SpectralAnalyzer::default().analyze_data("51202", data);
        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            buoys: vec![BuoyInput {
                station_id: "51202".into(),
                latest: None,
                spectral,
            }],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        assert_eq!(forecast.swell_events.len(), 1);

        let south = forecast
            .shore_forecasts
            .iter()
            .find(|s| s.shore == Shore::South)
            .unwrap();
        assert!(south.windows.is_empty());

        let east = forecast
            .shore_forecasts
            .iter()
            .find(|s| s.shore == Shore::East)
            .unwrap();
        assert!(!east.windows.is_empty());
    }

    #[test]
    fn test_conflict_recorded_and_blended() {
        let mut config = FusionConfig::default();
        config.conflict_threshold_m = 0.5;
        let engine = FusionEngine::new(config, SourceScorer::default());

        // buoy says 2.5 m, model says 4.0 m
        let mut model = north_model();
        model.time_steps[0].wave_height_mean = 4.0;

        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            buoys: vec![north_swell_buoy()],
            models: vec![model],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        let conflicts = forecast
            .metadata
            .get("conflicts")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        assert!(!conflicts.is_empty(), "conflict should be recorded");

        let north = forecast
            .shore_forecasts
            .iter()
            .find(|s| s.shore == Shore::North)
            .unwrap();
        let h = north.windows[0].face_height_ft_h13;
        let buoy_only = ShoreScaling::default().face_height_ft(Shore::North, 2.5, 14.0);
        let model_only = ShoreScaling::default().face_height_ft(Shore::North, 4.0, 14.0);
        assert!(h > buoy_only && h < model_only, "blend {h} outside [{buoy_only}, {model_only}]");
    }

    #[test]
    fn test_storm_arrival_becomes_future_event() {
        let engine = FusionEngine::default();
        let arrival = SwellArrival {
            storm_id: "kamchatka_20241114_1".into(),
            arrival_time: run_time() + Duration::hours(30),
            travel_time_hours: 108.0,
            distance_nm: 2719.0,
            period_s: 16.0,
            height_ft: 19.0,
            group_velocity_kt: 25.0,
            direction_deg: 320.0,
            confidence: 1.0,
        };
        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            storm_arrivals: vec![arrival],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        assert_eq!(forecast.swell_events.len(), 1);
        assert_eq!(forecast.swell_events[0].source, EventSource::PressureChart);
        assert_eq!(forecast.storm_arrivals.len(), 1);

        // lands in the day-1 window on the north shore
        let north = forecast
            .shore_forecasts
            .iter()
            .find(|s| s.shore == Shore::North)
            .unwrap();
        assert!(!north.windows.is_empty());
    }

    #[test]
    fn test_trend_labeling() {
        let start = run_time();
        let mut windows: Vec<ShoreWindow> = [4.0, 6.0, 9.0, 7.0]
            .iter()
            .enumerate()
            .map(|(i, h)| ShoreWindow {
                window_start: start + Duration::hours(24 * i as i64),
                window_end: start + Duration::hours(24 * (i as i64 + 1)),
                face_height_ft_h13: *h,
                face_height_ft_h110: 1.5 * h,
                primary_direction_deg: 320.0,
                primary_period_s: 14.0,
                trend: Trend::Steady,
                wind_speed_kt: None,
                wind_direction_deg: None,
            })
            .collect();

        label_trends(&mut windows);
        assert_eq!(windows[1].trend, Trend::Rising);
        assert_eq!(windows[2].trend, Trend::Peak);
        assert_eq!(windows[3].trend, Trend::Falling);
    }

    #[test]
    fn test_serialization_round_trip_stable() {
        let engine = FusionEngine::default();
        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            buoys: vec![north_swell_buoy()],
            models: vec![north_model()],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        let first = serde_json::to_string(&forecast).ok().unwrap();
        let parsed: FusedForecast = serde_json::from_str(&first).ok().unwrap();
        let second = serde_json::to_string(&parsed).ok().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_confidence_report_attached() {
        let engine = FusionEngine::default();
        let input = FusionInput {
            bundle_id: "test-bundle".into(),
            generated_at: Some(run_time()),
            buoys: vec![north_swell_buoy()],
            models: vec![north_model()],
            ..Default::default()
        };

        let forecast = engine.fuse(&input);
        let report = &forecast.confidence_report;
        let f = &report.factors;
        let expected = 0.30 * f.model_consensus
            + 0.25 * f.source_reliability
            + 0.20 * f.data_completeness
            + 0.15 * f.forecast_horizon
            + 0.10 * f.historical_accuracy;
        assert!((report.overall - expected).abs() < 1e-6);
    }
}
