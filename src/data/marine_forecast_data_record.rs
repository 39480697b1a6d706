use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parseable_data_record::DataRecordParsingError;
use crate::units::direction::normalize_degrees;

/// Hourly marine-forecast API payload: parallel arrays keyed by timestamp.
#[derive(Clone, Debug, Deserialize)]
pub struct MarineForecastPayload {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub hourly: MarineForecastHourly,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MarineForecastHourly {
    pub time: Vec<String>,
    #[serde(default)]
    pub wave_height: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_direction: Vec<Option<f64>>,
    #[serde(default)]
    pub wave_period: Vec<Option<f64>>,
    #[serde(default)]
    pub swell_wave_height: Vec<Option<f64>>,
    #[serde(default)]
    pub swell_wave_direction: Vec<Option<f64>>,
    #[serde(default)]
    pub swell_wave_period: Vec<Option<f64>>,
}

/// One fully populated hour extracted from the parallel arrays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarineForecastRecord {
    pub time: DateTime<Utc>,
    pub wave_height: f64,
    pub wave_period: f64,
    pub wave_direction: f64,
    pub swell_wave_height: Option<f64>,
    pub swell_wave_period: Option<f64>,
    pub swell_wave_direction: Option<f64>,
}

pub struct MarineForecastDataRecordCollection {
    payload: MarineForecastPayload,
}

impl MarineForecastDataRecordCollection {
    pub fn from_json(data: &str) -> Result<Self, DataRecordParsingError> {
        let payload: MarineForecastPayload = serde_json::from_str(data)
            .map_err(|e| DataRecordParsingError::ParseFailure(e.to_string()))?;
        Ok(MarineForecastDataRecordCollection { payload })
    }

    /// Hours where the primary wave fields are all present. Nulls in the
    /// source arrays drop the hour rather than defaulting to zero.
    pub fn records(&self) -> Vec<MarineForecastRecord> {
        let hourly = &self.payload.hourly;
        let mut records = vec![];

        for (i, raw_time) in hourly.time.iter().enumerate() {
            let Some(time) = parse_api_time(raw_time) else {
                continue;
            };

            let at = |values: &Vec<Option<f64>>| values.get(i).copied().flatten();

            let (Some(wave_height), Some(wave_period), Some(wave_direction)) = (
                at(&hourly.wave_height),
                at(&hourly.wave_period),
                at(&hourly.wave_direction),
            ) else {
                continue;
            };

            records.push(MarineForecastRecord {
                time,
                wave_height,
                wave_period,
                wave_direction: normalize_degrees(wave_direction),
                swell_wave_height: at(&hourly.swell_wave_height),
                swell_wave_period: at(&hourly.swell_wave_period),
                swell_wave_direction: at(&hourly.swell_wave_direction).map(normalize_degrees),
            });
        }

        records
    }
}

/// Marine APIs emit either full RFC3339 or the shortened `YYYY-MM-DDTHH:MM`.
fn parse_api_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = raw.parse::<DateTime<Utc>>() {
        return Some(t);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "latitude": 21.3,
        "longitude": -158.1,
        "hourly": {
            "time": ["2024-11-14T00:00", "2024-11-14T01:00", "2024-11-14T02:00"],
            "wave_height": [2.1, null, 2.3],
            "wave_direction": [315.0, 312.0, 310.0],
            "wave_period": [13.0, 13.2, 13.5],
            "swell_wave_height": [1.9, 1.9, 2.0],
            "swell_wave_direction": [318.0, 316.0, 314.0],
            "swell_wave_period": [14.0, 14.0, 14.2]
        }
    }"#;

    #[test]
    fn test_parses_hourly_arrays() {
        let collection = MarineForecastDataRecordCollection::from_json(PAYLOAD).ok().unwrap();
        let records = collection.records();
        // hour with null wave_height dropped
        assert_eq!(records.len(), 2);
        assert!((records[0].wave_height - 2.1).abs() < 1e-9);
        assert_eq!(records[0].swell_wave_period, Some(14.0));
    }

    #[test]
    fn test_shortened_timestamps() {
        let t = parse_api_time("2024-11-14T03:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-11-14T03:00:00+00:00");
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(MarineForecastDataRecordCollection::from_json("{not json").is_err());
    }
}
