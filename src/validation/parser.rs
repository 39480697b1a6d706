use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fusion::Shore;
use crate::units::CardinalDirection;

/// One structured prediction recovered from narrative markdown.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForecastPrediction {
    pub shore: Shore,
    /// 1-based forecast day within the narrative.
    pub day: u32,
    pub height_min_ft: f64,
    pub height_max_ft: f64,
    pub period_min_s: Option<f64>,
    pub period_max_s: Option<f64>,
    pub direction_deg: Option<f64>,
    pub category: Option<String>,
    pub confidence: f64,
}

impl ForecastPrediction {
    pub fn height_mid_ft(&self) -> f64 {
        (self.height_min_ft + self.height_max_ft) / 2.0
    }
}

const SIZE_CATEGORIES: [&str; 7] = [
    "flat", "small", "waist", "head", "overhead", "double overhead", "giant",
];

pub struct ForecastParser {
    section: Regex,
    day_marker: Regex,
    month_day: Regex,
    height_range: Regex,
    height_single: Regex,
    period_range: Regex,
    compass: Regex,
    degrees: Regex,
}

impl ForecastParser {
    pub fn new() -> ForecastParser {
        ForecastParser {
            section: Regex::new(r"(?im)^#{1,3}\s*(north|south|east|west)\s+shore[^\n]*$").unwrap(),
            day_marker: Regex::new(r"(?i)\bday\s+(\d{1,2})\b").unwrap(),
            month_day: Regex::new(
                r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})\b",
            )
            .unwrap(),
            height_range: Regex::new(
                r"(\d+(?:\.\d+)?)\s*(?:-|–|to)\s*(\d+(?:\.\d+)?)\s*(?:ft|feet|foot)\b",
            )
            .unwrap(),
            height_single: Regex::new(r"(\d+(?:\.\d+)?)\s*(?:ft|feet|foot)\b").unwrap(),
            period_range: Regex::new(
                r"(\d+(?:\.\d+)?)(?:\s*(?:-|–|to)\s*(\d+(?:\.\d+)?))?\s*(?:s\b|sec\b|secs\b|seconds?\b)",
            )
            .unwrap(),
            compass: Regex::new(r"\b(NNE|NNW|ENE|ESE|SSE|SSW|WNW|WSW|NE|NW|SE|SW|N|S|E|W)\b")
                .unwrap(),
            degrees: Regex::new(r"(\d{2,3})\s*°").unwrap(),
        }
    }

    /// Splits the narrative by shore section headers, then by day markers,
    /// and extracts one prediction per (shore, day) with anything the text
    /// yields. Deduplicated on (shore, day, height range).
    pub fn parse(&self, narrative: &str) -> Vec<ForecastPrediction> {
        let mut predictions = vec![];
        let mut seen: HashSet<(String, u32, i64, i64)> = HashSet::new();

        for (shore, section_text) in self.sections(narrative) {
            for (day, segment) in self.day_segments(&section_text) {
                let Some(prediction) = self.extract(shore, day, &segment) else {
                    continue;
                };

                let key = (
                    prediction.shore.name().to_string(),
                    prediction.day,
                    (prediction.height_min_ft * 10.0) as i64,
                    (prediction.height_max_ft * 10.0) as i64,
                );
                if seen.insert(key) {
                    predictions.push(prediction);
                }
            }
        }

        debug!(count = predictions.len(), "narrative parsed");
        predictions
    }

    fn sections(&self, narrative: &str) -> Vec<(Shore, String)> {
        let matches: Vec<(Shore, usize, usize)> = self
            .section
            .captures_iter(narrative)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let shore = Shore::from_name(&caps[1])?;
                Some((shore, whole.start(), whole.end()))
            })
            .collect();

        matches
            .iter()
            .enumerate()
            .map(|(i, (shore, _, body_start))| {
                let body_end = matches
                    .get(i + 1)
                    .map(|(_, next_start, _)| *next_start)
                    .unwrap_or(narrative.len());
                (*shore, narrative[*body_start..body_end].to_string())
            })
            .collect()
    }

    fn day_segments(&self, section: &str) -> Vec<(u32, String)> {
        let mut markers: Vec<(u32, usize)> = self
            .day_marker
            .captures_iter(section)
            .filter_map(|caps| {
                let day: u32 = caps[1].parse().ok()?;
                Some((day, caps.get(0)?.start()))
            })
            .collect();

        if markers.is_empty() {
            // fall back to calendar-style markers, numbering them in order
            markers = self
                .month_day
                .captures_iter(section)
                .enumerate()
                .filter_map(|(i, caps)| Some((i as u32 + 1, caps.get(0)?.start())))
                .collect();
        }

        if markers.is_empty() {
            return vec![(1, section.to_string())];
        }

        markers
            .iter()
            .enumerate()
            .map(|(i, (day, start))| {
                let end = markers
                    .get(i + 1)
                    .map(|(_, next)| *next)
                    .unwrap_or(section.len());
                (*day, section[*start..end].to_string())
            })
            .collect()
    }

    fn extract(&self, shore: Shore, day: u32, segment: &str) -> Option<ForecastPrediction> {
        let (height_min, height_max, has_height) =
            if let Some(caps) = self.height_range.captures(segment) {
                let min: f64 = caps[1].parse().ok()?;
                let max: f64 = caps[2].parse().ok()?;
                (min.min(max), min.max(max), true)
            } else if let Some(caps) = self.height_single.captures(segment) {
                let h: f64 = caps[1].parse().ok()?;
                (h, h, true)
            } else {
                return None;
            };

        let (period_min, period_max) = match self.period_range.captures(segment) {
            Some(caps) => {
                let lo: Option<f64> = caps[1].parse().ok();
                let hi: Option<f64> = caps.get(2).and_then(|m| m.as_str().parse().ok());
                (lo, hi.or(lo))
            }
            None => (None, None),
        };

        let direction_deg = self
            .compass
            .captures(segment)
            .and_then(|caps| caps[1].parse::<CardinalDirection>().ok())
            .map(|dir| dir.to_degrees())
            .or_else(|| {
                self.degrees
                    .captures(segment)
                    .and_then(|caps| caps[1].parse::<f64>().ok())
            });

        let lowered = segment.to_lowercase();
        let category = SIZE_CATEGORIES
            .iter()
            .rev()
            .find(|c| lowered.contains(*c))
            .map(|c| c.replace(' ', "_"));

        let confidence = 0.5
            + if has_height { 0.2 } else { 0.0 }
            + if period_min.is_some() { 0.15 } else { 0.0 }
            + if direction_deg.is_some() { 0.10 } else { 0.0 }
            + if category.is_some() { 0.05 } else { 0.0 };

        Some(ForecastPrediction {
            shore,
            day,
            height_min_ft: height_min,
            height_max_ft: height_max,
            period_min_s: period_min,
            period_max_s: period_max,
            direction_deg,
            category,
            confidence,
        })
    }
}

impl Default for ForecastParser {
    fn default() -> Self {
        ForecastParser::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NARRATIVE: &str = "\
# Hawaii Surf Forecast

## North Shore Forecast

Day 1: Overhead surf at 12-15 ft faces from a 14-16 second NW swell.
Day 2: Falling to 8-10 ft, still NW at 315° with 13 seconds.

## South Shore Forecast

Day 1: Small background energy, 2-3 ft at 14 s from the S.

## East Shore Forecast

Day 1: Choppy windswell around 4 ft, short 7 second period from the E.
";

    #[test]
    fn test_parses_all_sections() {
        let predictions = ForecastParser::new().parse(NARRATIVE);

        let north: Vec<_> = predictions.iter().filter(|p| p.shore == Shore::North).collect();
        let south: Vec<_> = predictions.iter().filter(|p| p.shore == Shore::South).collect();
        let east: Vec<_> = predictions.iter().filter(|p| p.shore == Shore::East).collect();

        assert_eq!(north.len(), 2);
        assert_eq!(south.len(), 1);
        assert_eq!(east.len(), 1);
    }

    #[test]
    fn test_north_day_one_fields() {
        let predictions = ForecastParser::new().parse(NARRATIVE);
        let p = predictions
            .iter()
            .find(|p| p.shore == Shore::North && p.day == 1)
            .unwrap();

        assert_eq!(p.height_min_ft, 12.0);
        assert_eq!(p.height_max_ft, 15.0);
        assert_eq!(p.period_min_s, Some(14.0));
        assert_eq!(p.period_max_s, Some(16.0));
        assert_eq!(p.direction_deg, Some(315.0));
        // height + period + direction + category ("overhead")
        assert!((p.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degree_direction_fallback() {
        let predictions = ForecastParser::new().parse(NARRATIVE);
        let p = predictions
            .iter()
            .find(|p| p.shore == Shore::North && p.day == 2)
            .unwrap();
        assert_eq!(p.height_min_ft, 8.0);
        assert_eq!(p.direction_deg, Some(315.0));
    }

    #[test]
    fn test_deduplicates_repeats() {
        let doubled = format!("{NARRATIVE}\n{NARRATIVE}");
        let once = ForecastParser::new().parse(NARRATIVE).len();
        let twice = ForecastParser::new().parse(&doubled).len();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_section_without_heights_skipped() {
        let narrative = "## West Shore Forecast\n\nDay 1: Clean conditions, light winds.\n";
        let predictions = ForecastParser::new().parse(narrative);
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_month_day_markers() {
        let narrative = "\
## South Shore Forecast

Oct 12: Building S swell, 3-5 ft at 15 seconds.
Oct 13: Peak of the event, 5-7 ft.
";
        let predictions = ForecastParser::new().parse(narrative);
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].day, 1);
        assert_eq!(predictions[1].day, 2);
        assert_eq!(predictions[1].height_max_ft, 7.0);
    }
}
