use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::location::Location;

/// A storm system extracted from a pressure-chart analysis narrative.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StormInfo {
    pub storm_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub wind_speed_kt: f64,
    pub central_pressure_mb: Option<f64>,
    pub fetch_nm: Option<f64>,
    pub duration_hours: Option<f64>,
    pub detection_time: DateTime<Utc>,
    pub source: String,
    pub confidence: f64,
}

impl StormInfo {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude, self.storm_id.clone())
    }
}

struct RegionEntry {
    name: &'static str,
    slug: &'static str,
    latitude: f64,
    longitude: f64,
}

/// Canonical generation areas referenced by name when an analysis omits
/// numeric coordinates.
const REGIONS: [RegionEntry; 7] = [
    RegionEntry { name: "kamchatka", slug: "kamchatka", latitude: 50.0, longitude: 157.0 },
    RegionEntry { name: "kuril", slug: "kuril", latitude: 46.0, longitude: 152.0 },
    RegionEntry { name: "aleutian", slug: "aleutian", latitude: 52.0, longitude: -175.0 },
    RegionEntry { name: "gulf of alaska", slug: "gulf_of_alaska", latitude: 55.0, longitude: -145.0 },
    RegionEntry { name: "tasman", slug: "tasman", latitude: -40.0, longitude: 160.0 },
    RegionEntry { name: "southern ocean", slug: "southern_ocean", latitude: -55.0, longitude: 140.0 },
    RegionEntry { name: "new zealand", slug: "new_zealand", latitude: -45.0, longitude: 170.0 },
];

struct Patterns {
    coords_compass: Regex,
    coords_decimal: Regex,
    coords_labeled: Regex,
    wind_explicit: Regex,
    wind_leading: Regex,
    pressure: Regex,
    fetch: Regex,
    fetch_leading: Regex,
    duration: Regex,
}

impl Patterns {
    fn compile() -> Patterns {
        Patterns {
            // 50°N 157°E / 50N, 157E / 50.5 N 162.3 W
            coords_compass: Regex::new(
                r"(?i)(\d{1,2}(?:\.\d+)?)\s*°?\s*([NS])[,\s]+(\d{1,3}(?:\.\d+)?)\s*°?\s*([EW])",
            )
            .unwrap(),
            // bare decimal pair: 50.25, 157.5
            coords_decimal: Regex::new(r"(-?\d{1,2}\.\d+)\s*,\s*(-?\d{1,3}\.\d+)").unwrap(),
            coords_labeled: Regex::new(
                r"(?i)latitude\s+(-?\d{1,2}(?:\.\d+)?)\D{1,20}longitude\s+(-?\d{1,3}(?:\.\d+)?)",
            )
            .unwrap(),
            wind_explicit: Regex::new(r"(?i)winds?\s+(?:of\s+|to\s+|near\s+)?(\d{2,3})\s*(?:kt|kts|knots)")
                .unwrap(),
            wind_leading: Regex::new(r"(?i)(\d{2,3})\s*(?:kt|kts|knot)\s+winds?").unwrap(),
            pressure: Regex::new(
                r"(?i)(?:central\s+pressure\s+(?:of\s+|near\s+)?|pressure\s+(?:of\s+|near\s+)?)(\d{3,4})\s*(?:mb|hpa|millibars)?|(\d{3,4})\s*(?:mb|hpa)\s+low",
            )
            .unwrap(),
            fetch: Regex::new(r"(?i)fetch\s+(?:of\s+|near\s+|exceeding\s+)?(\d{2,4})\s*(?:nm|nmi|nautical\s+miles)")
                .unwrap(),
            fetch_leading: Regex::new(r"(?i)(\d{2,4})\s*(?:nm|nmi|nautical[\s-]mile)\s+fetch").unwrap(),
            duration: Regex::new(
                r"(?i)(?:for|over|lasting|duration\s+of|persisting\s+(?:for\s+)?)\s*(\d{1,3})\s*(?:hours|hrs|hour|h\b)|(\d{1,3})-hour",
            )
            .unwrap(),
        }
    }
}

/// Layered extraction of storm records from free-form analysis prose.
/// Each pass pulls one parameter class; a final normalization pass infers
/// missing fetch and duration and scores the record.
pub struct StormDetector {
    patterns: Patterns,
}

impl StormDetector {
    pub fn new() -> StormDetector {
        StormDetector {
            patterns: Patterns::compile(),
        }
    }

    /// Extracts every storm the narrative describes. Paragraphs and bullet
    /// items are treated as independent candidate blocks.
    pub fn detect(&self, text: &str, detection_time: DateTime<Utc>) -> Vec<StormInfo> {
        let mut storms = vec![];
        let mut region_sequence: std::collections::HashMap<String, u32> =
            std::collections::HashMap::new();

        for block in split_blocks(text) {
            let Some(candidate) = self.parse_block(&block, detection_time, &mut region_sequence)
            else {
                continue;
            };
            storms.push(candidate);
        }

        debug!(count = storms.len(), "storm detection complete");
        storms
    }

    fn parse_block(
        &self,
        block: &str,
        detection_time: DateTime<Utc>,
        region_sequence: &mut std::collections::HashMap<String, u32>,
    ) -> Option<StormInfo> {
        let region = REGIONS
            .iter()
            .find(|r| block.to_lowercase().contains(r.name));

        let explicit_coords = self.extract_coords(block);
        let (latitude, longitude) = match (&explicit_coords, region) {
            (Some(coords), _) => *coords,
            (None, Some(region)) => (region.latitude, region.longitude),
            (None, None) => return None,
        };

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            warn!(latitude, longitude, "discarding storm with out-of-range coordinates");
            return None;
        }

        let wind_speed_kt = self.extract_wind(block)?;

        let central_pressure_mb = self
            .extract_pressure(block)
            .filter(|p| (900.0..=1100.0).contains(p));

        let explicit_fetch = self.extract_fetch(block);
        let explicit_duration = self.extract_duration(block);

        // Missing parameters are inferred from storm intensity, at a
        // confidence penalty relative to explicit values.
        let fetch_nm = explicit_fetch.or(Some(infer_fetch(wind_speed_kt)));
        let duration_hours =
            explicit_duration.or(Some(infer_duration(central_pressure_mb)));

        let confidence = 0.5
            + if explicit_coords.is_some() { 0.2 } else { 0.0 }
            + if central_pressure_mb.is_some() { 0.15 } else { 0.0 }
            + if explicit_fetch.is_some() { 0.10 } else { 0.0 }
            + if explicit_duration.is_some() { 0.05 } else { 0.0 };

        let slug = match region {
            Some(region) => region.slug.to_string(),
            None if latitude >= 0.0 => "north_pacific".to_string(),
            None => "south_pacific".to_string(),
        };
        let seq = region_sequence.entry(slug.clone()).or_insert(0);
        *seq += 1;
        let storm_id = format!("{}_{}_{}", slug, detection_time.format("%Y%m%d"), seq);

        Some(StormInfo {
            storm_id,
            latitude,
            longitude,
            wind_speed_kt,
            central_pressure_mb,
            fetch_nm,
            duration_hours,
            detection_time,
            source: "pressure_analysis".into(),
            confidence,
        })
    }

    fn extract_coords(&self, block: &str) -> Option<(f64, f64)> {
        if let Some(caps) = self.patterns.coords_compass.captures(block) {
            let lat: f64 = caps[1].parse().ok()?;
            let lon: f64 = caps[3].parse().ok()?;
            let lat = if caps[2].eq_ignore_ascii_case("s") { -lat } else { lat };
            let lon = if caps[4].eq_ignore_ascii_case("w") { -lon } else { lon };
            return Some((lat, lon));
        }

        if let Some(caps) = self.patterns.coords_labeled.captures(block) {
            return Some((caps[1].parse().ok()?, caps[2].parse().ok()?));
        }

        if let Some(caps) = self.patterns.coords_decimal.captures(block) {
            let lat: f64 = caps[1].parse().ok()?;
            let lon: f64 = caps[2].parse().ok()?;
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
                return Some((lat, lon));
            }
        }

        None
    }

    fn extract_wind(&self, block: &str) -> Option<f64> {
        if let Some(caps) = self.patterns.wind_explicit.captures(block) {
            return caps[1].parse().ok();
        }
        if let Some(caps) = self.patterns.wind_leading.captures(block) {
            return caps[1].parse().ok();
        }

        let lowered = block.to_lowercase();
        if lowered.contains("hurricane-force") || lowered.contains("hurricane force") {
            return Some(65.0);
        }
        if lowered.contains("storm-force") || lowered.contains("storm force") {
            return Some(50.0);
        }
        if lowered.contains("gale-force") || lowered.contains("gale force") {
            return Some(40.0);
        }

        None
    }

    fn extract_pressure(&self, block: &str) -> Option<f64> {
        let caps = self.patterns.pressure.captures(block)?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn extract_fetch(&self, block: &str) -> Option<f64> {
        if let Some(caps) = self.patterns.fetch.captures(block) {
            return caps[1].parse().ok();
        }
        self.patterns
            .fetch_leading
            .captures(block)
            .and_then(|caps| caps[1].parse().ok())
    }

    fn extract_duration(&self, block: &str) -> Option<f64> {
        let caps = self.patterns.duration.captures(block)?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl Default for StormDetector {
    fn default() -> Self {
        StormDetector::new()
    }
}

fn split_blocks(text: &str) -> Vec<String> {
    text.split("\n\n")
        .flat_map(|paragraph| {
            if paragraph.trim_start().starts_with('-') || paragraph.trim_start().starts_with('*') {
                paragraph
                    .lines()
                    .map(|l| l.trim_start_matches(['-', '*', ' ']).to_string())
                    .collect::<Vec<_>>()
            } else {
                vec![paragraph.to_string()]
            }
        })
        .filter(|block| !block.trim().is_empty())
        .collect()
}

fn infer_fetch(wind_speed_kt: f64) -> f64 {
    if wind_speed_kt >= 50.0 {
        600.0
    } else if wind_speed_kt >= 40.0 {
        400.0
    } else {
        250.0
    }
}

fn infer_duration(central_pressure_mb: Option<f64>) -> f64 {
    match central_pressure_mb {
        Some(p) if p < 970.0 => 72.0,
        Some(p) if p > 990.0 => 36.0,
        _ => 48.0,
    }
}
