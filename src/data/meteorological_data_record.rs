use chrono::prelude::*;
use chrono::Utc;
use csv::Reader;
use serde::{Deserialize, Serialize};

use crate::dimensional_data::DimensionalData;
use crate::swell::{SwellComponent, SwellProvider, SwellSummary};
use crate::units::*;

use super::parseable_data_record::{DataRecordParsingError, ParseableDataRecord};

/// One row of an NDBC realtime2 standard meteorological file.
/// Missing observations (`MM`, `99.0`, `999.0`) parse as absent values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeteorologicalDataRecord {
    pub date: chrono::DateTime<Utc>,
    pub wind_direction: DimensionalData<Direction>,
    pub wind_speed: DimensionalData<f64>,
    pub wind_gust_speed: DimensionalData<f64>,
    pub wave_height: DimensionalData<f64>,
    pub dominant_wave_period: DimensionalData<f64>,
    pub average_wave_period: DimensionalData<f64>,
    pub mean_wave_direction: DimensionalData<Direction>,
    pub air_pressure: DimensionalData<f64>,
    pub air_temperature: DimensionalData<f64>,
    pub water_temperature: DimensionalData<f64>,
}

impl ParseableDataRecord for MeteorologicalDataRecord {
    type Metadata = ();

    fn from_data_row(
        _: Option<&Self::Metadata>,
        row: &[&str],
    ) -> Result<MeteorologicalDataRecord, DataRecordParsingError> {
        if row.len() < 15 {
            return Err(DataRecordParsingError::ParseFailure(
                "meteorological record too short".into(),
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

        Ok(MeteorologicalDataRecord {
            date,
            wind_direction: DimensionalData::from_raw_data(row[5], "wind direction", Unit::Degrees),
            wind_speed: DimensionalData::from_raw_data(
                row[6],
                "wind speed",
                Unit::MetersPerSecond,
            ),
            wind_gust_speed: DimensionalData::from_raw_data(
                row[7],
                "wind gust speed",
                Unit::MetersPerSecond,
            ),
            wave_height: DimensionalData::from_raw_data(row[8], "wave height", Unit::Meters),
            dominant_wave_period: DimensionalData::from_raw_data(
                row[9],
                "dominant wave period",
                Unit::Seconds,
            ),
            average_wave_period: DimensionalData::from_raw_data(
                row[10],
                "average wave period",
                Unit::Seconds,
            ),
            mean_wave_direction: DimensionalData::from_raw_data(
                row[11],
                "mean wave direction",
                Unit::Degrees,
            ),
            air_pressure: DimensionalData::from_raw_data(row[12], "air pressure", Unit::HectaPascal),
            air_temperature: DimensionalData::from_raw_data(
                row[13],
                "air temperature",
                Unit::Celsius,
            ),
            water_temperature: DimensionalData::from_raw_data(
                row[14],
                "water temperature",
                Unit::Celsius,
            ),
        })
    }
}

impl SwellProvider for MeteorologicalDataRecord {
    fn swell_data(&self) -> Result<SwellSummary, crate::swell::SwellError> {
        let height = self
            .wave_height
            .value
            .ok_or_else(|| crate::swell::SwellError::InsufficientData("wave height".into()))?;
        let period = self
            .dominant_wave_period
            .value
            .ok_or_else(|| crate::swell::SwellError::InsufficientData("dominant period".into()))?;
        let direction = self
            .mean_wave_direction
            .value
            .as_ref()
            .ok_or_else(|| crate::swell::SwellError::InsufficientData("wave direction".into()))?;

        Ok(SwellSummary {
            summary: SwellComponent::new(height, period, direction.degrees, 0.9, "ndbc"),
            components: vec![],
        })
    }
}

pub struct MeteorologicalDataRecordCollection<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> MeteorologicalDataRecordCollection<'a> {
    pub fn from_data(data: &'a str) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());

        MeteorologicalDataRecordCollection { reader }
    }

    pub fn records(&'a mut self) -> impl Iterator<Item = MeteorologicalDataRecord> + 'a {
        self.reader
            .records()
            .map(
                |result| -> Result<MeteorologicalDataRecord, DataRecordParsingError> {
                    match result {
                        Ok(record) => {
                            let filtered_record: Vec<&str> =
                                record.iter().filter(|data| !data.is_empty()).collect();
                            MeteorologicalDataRecord::from_data_row(None, &filtered_record)
                        }
                        Err(e) => Err(DataRecordParsingError::ParseFailure(e.to_string())),
                    }
                },
            )
            .filter_map(|d| d.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_met_data_row_parse() {
        let raw_data = "2024 11 14 00 50  80 12.0 14.0   2.2     7   5.4 101 1032.4  16.5  19.4  12.9   MM +0.3    MM";
        let data_row: Vec<&str> = raw_data.split_whitespace().collect();

        let met_data = MeteorologicalDataRecord::from_data_row(None, &data_row).ok().unwrap();

        assert_eq!(met_data.date.year(), 2024);
        assert_eq!(met_data.wind_speed.value, Some(12.0));
        assert_eq!(met_data.wave_height.value, Some(2.2));
        assert_eq!(met_data.dominant_wave_period.value, Some(7.0));
    }

    #[test]
    fn test_missing_wave_height_stays_missing() {
        let raw_data = "2024 11 14 00 50  80 12.0 14.0    MM    MM    MM  MM 1032.4  16.5  19.4";
        let data_row: Vec<&str> = raw_data.split_whitespace().collect();

        let met_data = MeteorologicalDataRecord::from_data_row(None, &data_row).ok().unwrap();
        assert!(met_data.wave_height.value.is_none());
        assert!(met_data.swell_data().is_err());
    }

    #[test]
    fn test_collection_skips_header_comments() {
        let raw = "#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE\n\
                   #yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft\n\
                   2024 11 14 00 50  80 12.0 14.0   2.2     7   5.4 101 1032.4  16.5  19.4  12.9   MM +0.3    MM\n\
                   2024 11 13 23 50  85 11.0 13.0   2.1     8   5.5 100 1031.0  16.4  19.4  12.8   MM +0.2    MM\n";
        let mut collection = MeteorologicalDataRecordCollection::from_data(raw);
        assert_eq!(collection.records().count(), 2);
    }
}
