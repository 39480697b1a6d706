use chrono::{DateTime, TimeZone, Utc};
use csv::Reader;
use serde::{Deserialize, Serialize};

use super::parseable_data_record::{DataRecordParsingError, ParseableDataRecord};
use crate::dimensional_data::DimensionalData;
use crate::swell::{SwellComponent, SwellProvider, SwellSummary};
use crate::units::*;

/// One row of an NDBC `.spec` wave summary file: total significant height
/// plus the swell / wind-wave split with compass directions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaveDataRecord {
    pub date: DateTime<Utc>,
    pub wave_height: DimensionalData<f64>,
    pub swell_wave_height: DimensionalData<f64>,
    pub swell_wave_period: DimensionalData<f64>,
    pub wind_wave_height: DimensionalData<f64>,
    pub wind_wave_period: DimensionalData<f64>,
    pub swell_wave_direction: DimensionalData<Direction>,
    pub wind_wave_direction: DimensionalData<Direction>,
    pub steepness: Option<String>,
    pub average_wave_period: DimensionalData<f64>,
    pub mean_wave_direction: DimensionalData<Direction>,
}

impl ParseableDataRecord for WaveDataRecord {
    type Metadata = ();

    fn from_data_row(
        _: Option<&Self::Metadata>,
        row: &[&str],
    ) -> Result<WaveDataRecord, DataRecordParsingError> {
        if row.len() < 15 {
            return Err(DataRecordParsingError::ParseFailure(
                "wave summary record too short".into(),
            ));
        }

        let date = Utc
            .with_ymd_and_hms(
                row[0].parse().map_err(DataRecordParsingError::from)?,
                row[1].parse().map_err(DataRecordParsingError::from)?,
                row[2].parse().map_err(DataRecordParsingError::from)?,
                row[3].parse().map_err(DataRecordParsingError::from)?,
                row[4].parse().map_err(DataRecordParsingError::from)?,
                0,
            )
            .single()
            .ok_or(DataRecordParsingError::InvalidData)?;

        let steepness = match row[12] {
            "N/A" | "NA" | "MM" => None,
            other => Some(other.to_string()),
        };

        Ok(WaveDataRecord {
            date,
            wave_height: DimensionalData::from_raw_data(row[5], "wave height", Unit::Meters),
            swell_wave_height: DimensionalData::from_raw_data(
                row[6],
                "swell wave height",
                Unit::Meters,
            ),
            swell_wave_period: DimensionalData::from_raw_data(row[7], "swell period", Unit::Seconds),
            wind_wave_height: DimensionalData::from_raw_data(
                row[8],
                "wind wave height",
                Unit::Meters,
            ),
            wind_wave_period: DimensionalData::from_raw_data(row[9], "wind period", Unit::Seconds),
            swell_wave_direction: DimensionalData::from_raw_data(
                row[10],
                "swell wave direction",
                Unit::Degrees,
            ),
            wind_wave_direction: DimensionalData::from_raw_data(
                row[11],
                "wind wave direction",
                Unit::Degrees,
            ),
            steepness,
            average_wave_period: DimensionalData::from_raw_data(
                row[13],
                "average wave period",
                Unit::Seconds,
            ),
            mean_wave_direction: DimensionalData::from_raw_data(
                row[14],
                "mean wave direction",
                Unit::Degrees,
            ),
        })
    }
}

impl SwellProvider for WaveDataRecord {
    fn swell_data(&self) -> Result<SwellSummary, crate::swell::SwellError> {
        let height = self
            .wave_height
            .value
            .ok_or_else(|| crate::swell::SwellError::InsufficientData("wave height".into()))?;
        let period = self
            .average_wave_period
            .value
            .ok_or_else(|| crate::swell::SwellError::InsufficientData("average period".into()))?;
        let direction = self
            .mean_wave_direction
            .value
            .as_ref()
            .ok_or_else(|| crate::swell::SwellError::InsufficientData("mean direction".into()))?;

        let mut components = vec![];
        if let (Some(h), Some(p), Some(d)) = (
            self.swell_wave_height.value,
            self.swell_wave_period.value,
            self.swell_wave_direction.value.as_ref(),
        ) {
            components.push(SwellComponent::new(h, p, d.degrees, 0.85, "ndbc_swell"));
        }
        if let (Some(h), Some(p), Some(d)) = (
            self.wind_wave_height.value,
            self.wind_wave_period.value,
            self.wind_wave_direction.value.as_ref(),
        ) {
            components.push(SwellComponent::new(h, p, d.degrees, 0.75, "ndbc_wind_wave"));
        }

        Ok(SwellSummary {
            summary: SwellComponent::new(height, period, direction.degrees, 0.9, "ndbc"),
            components,
        })
    }
}

pub struct WaveDataRecordCollection<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> WaveDataRecordCollection<'a> {
    pub fn from_data(data: &'a str) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());

        WaveDataRecordCollection { reader }
    }

    pub fn records(&'a mut self) -> impl Iterator<Item = WaveDataRecord> + 'a {
        self.reader
            .records()
            .map(|result| -> Result<WaveDataRecord, DataRecordParsingError> {
                if let Ok(record) = result {
                    let filtered_record: Vec<&str> =
                        record.iter().filter(|data| !data.is_empty()).collect();
                    return WaveDataRecord::from_data_row(None, &filtered_record);
                }
                Err(DataRecordParsingError::InvalidData)
            })
            .filter_map(|d| d.ok())
    }
}
