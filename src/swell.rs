use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::units::direction::normalize_degrees;
use crate::units::METERS_TO_FEET;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

pub const MIN_PERIOD_SECONDS: f64 = 4.0;
pub const MAX_PERIOD_SECONDS: f64 = 30.0;

/// A single scalar wave train. Values are validated and normalized at
/// construction and the struct carries no mutating API afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SwellComponent {
    pub height_m: f64,
    pub period_s: f64,
    pub direction_deg: f64,
    pub confidence: f64,
    pub source_tag: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SwellComponent {
    pub fn new(
        height_m: f64,
        period_s: f64,
        direction_deg: f64,
        confidence: f64,
        source_tag: &str,
    ) -> SwellComponent {
        SwellComponent {
            height_m: height_m.max(0.0),
            period_s: period_s.clamp(MIN_PERIOD_SECONDS, MAX_PERIOD_SECONDS),
            direction_deg: normalize_degrees(direction_deg),
            confidence: confidence.clamp(0.0, 1.0),
            source_tag: source_tag.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn height_ft(&self) -> f64 {
        self.height_m * METERS_TO_FEET
    }
}

impl fmt::Display for SwellComponent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.1} m @ {:.0} s from {:.0}°",
            self.height_m, self.period_s, self.direction_deg
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Swell,
    WindWave,
}

/// A swell component resolved from the frequency-direction spectrum,
/// carrying the spectral quantities the bare component lacks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpectralPeak {
    #[serde(flatten)]
    pub component: SwellComponent,
    pub frequency_hz: f64,
    pub energy_density: f64,
    pub directional_spread_deg: f64,
    pub component_type: ComponentType,
}

impl SpectralPeak {
    /// Frequency is derived from the component period so the
    /// `1/period ≈ frequency` invariant holds by construction.
    pub fn new(
        component: SwellComponent,
        energy_density: f64,
        directional_spread_deg: f64,
        component_type: ComponentType,
    ) -> SpectralPeak {
        let frequency_hz = 1.0 / component.period_s;
        SpectralPeak {
            component,
            frequency_hz,
            energy_density,
            directional_spread_deg,
            component_type,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Buoy,
    BuoySpectral,
    Model,
    PressureChart,
    MarineForecast,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EventSource::Buoy => "buoy",
            EventSource::BuoySpectral => "buoy_spectral",
            EventSource::Model => "model",
            EventSource::PressureChart => "pressure_chart",
            EventSource::MarineForecast => "marine_forecast",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug)]
pub enum SwellError {
    NoComponents,
    InsufficientData(String),
}

impl fmt::Display for SwellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SwellError::NoComponents => write!(f, "swell event requires at least one component"),
            SwellError::InsufficientData(msg) => write!(f, "insufficient swell data: {msg}"),
        }
    }
}

impl std::error::Error for SwellError {}

/// The overall sea state and its decomposition into distinct wave trains.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SwellSummary {
    pub summary: SwellComponent,
    pub components: Vec<SwellComponent>,
}

/// Seam between raw data records and the fusion layer. Any record type
/// that can describe the sea state implements this.
pub trait SwellProvider {
    fn swell_data(&self) -> Result<SwellSummary, SwellError>;
}

/// One distinct wave event observed or predicted at the islands.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SwellEvent {
    pub event_id: String,
    pub start_time: DateTime<Utc>,
    pub peak_time: DateTime<Utc>,
    pub primary_direction: f64,
    pub significance: f64,
    pub hawaii_scale_height_ft: f64,
    pub source: EventSource,
    pub primary_components: Vec<SwellComponent>,
    pub secondary_components: Vec<SwellComponent>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SwellEvent {
    /// Builds an event from decomposed components. The primary direction is
    /// taken from the largest primary component, which must exist.
    pub fn from_components(
        event_id: String,
        start_time: DateTime<Utc>,
        peak_time: DateTime<Utc>,
        source: EventSource,
        primary_components: Vec<SwellComponent>,
        secondary_components: Vec<SwellComponent>,
        hawaii_scale_height_ft: f64,
    ) -> Result<SwellEvent, SwellError> {
        let dominant = primary_components
            .iter()
            .max_by(|a, b| {
                let ea = a.height_m.powi(2) * a.period_s;
                let eb = b.height_m.powi(2) * b.period_s;
                ea.partial_cmp(&eb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or(SwellError::NoComponents)?;

        let primary_direction = dominant.direction_deg;
        let significance = dominant.height_m.powi(2) * dominant.period_s;

        Ok(SwellEvent {
            event_id,
            start_time,
            peak_time,
            primary_direction,
            significance,
            hawaii_scale_height_ft,
            source,
            primary_components,
            secondary_components,
            metadata: Metadata::new(),
        })
    }

    pub fn dominant_component(&self) -> Option<&SwellComponent> {
        self.primary_components.iter().max_by(|a, b| {
            let ea = a.height_m.powi(2) * a.period_s;
            let eb = b.height_m.powi(2) * b.period_s;
            ea.partial_cmp(&eb).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_normalization() {
        let c = SwellComponent::new(-1.0, 45.0, 370.0, 1.5, "test");
        assert_eq!(c.height_m, 0.0);
        assert_eq!(c.period_s, MAX_PERIOD_SECONDS);
        assert!((c.direction_deg - 10.0).abs() < 1e-9);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_spectral_peak_frequency_invariant() {
        let c = SwellComponent::new(2.5, 14.0, 330.0, 0.85, "51201");
        let peak = SpectralPeak::new(c, 12.0, 30.0, ComponentType::Swell);
        assert!((peak.frequency_hz * peak.component.period_s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_event_requires_components() {
        let now = Utc::now();
        let result = SwellEvent::from_components(
            "evt".into(),
            now,
            now,
            EventSource::Buoy,
            vec![],
            vec![],
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_event_primary_direction_from_dominant() {
        let now = Utc::now();
        let big = SwellComponent::new(2.5, 14.0, 330.0, 0.85, "51201");
        let small = SwellComponent::new(1.0, 7.0, 60.0, 0.75, "51201");
        let event = SwellEvent::from_components(
            "evt".into(),
            now,
            now,
            EventSource::BuoySpectral,
            vec![big, small],
            vec![],
            12.0,
        )
        .ok()
        .unwrap();
        assert!((event.primary_direction - 330.0).abs() < 1e-9);
    }
}
