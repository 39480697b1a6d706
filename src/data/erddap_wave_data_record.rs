use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::parseable_data_record::DataRecordParsingError;
use crate::units::direction::normalize_degrees;

/// Wave model CSV shapes this parser understands, detected from the
/// header row. ERDDAP gridded aggregations carry a second row of units;
/// legacy NOMADS point extracts use the raw model variable names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelCsvShape {
    ErddapGridded,
    NomadsPoint,
}

/// A single parsed grid sample.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelGridRow {
    pub time: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub wave_height: f64,
    pub peak_period: f64,
    pub mean_direction: f64,
}

/// Per-timestep spatial aggregate over all grid samples.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelTimeStep {
    pub time: DateTime<Utc>,
    pub wave_height_mean: f64,
    pub wave_height_max: f64,
    pub wave_height_min: f64,
    pub peak_period_mean: f64,
    pub mean_direction: f64,
    pub grid_points: usize,
}

pub struct ErddapWaveDataRecordCollection {
    pub shape: ModelCsvShape,
    rows: Vec<ModelGridRow>,
}

impl ErddapWaveDataRecordCollection {
    pub fn from_data(data: &str) -> Result<Self, DataRecordParsingError> {
        let mut lines = data.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or(DataRecordParsingError::EOF)?
            .to_lowercase();

        let shape = if header.contains("thgt") || header.contains("latitude") {
            ModelCsvShape::ErddapGridded
        } else if header.contains("htsgwsfc") {
            ModelCsvShape::NomadsPoint
        } else {
            return Err(DataRecordParsingError::ParseFailure(format!(
                "unrecognized wave model header: {header}"
            )));
        };

        let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
        let find = |name: &str| columns.iter().position(|c| c.starts_with(name));

        let (time_ix, lat_ix, lon_ix, hgt_ix, per_ix, dir_ix) = match shape {
            ModelCsvShape::ErddapGridded => (
                find("time").ok_or(DataRecordParsingError::InvalidData)?,
                find("latitude"),
                find("longitude"),
                find("thgt").ok_or(DataRecordParsingError::InvalidData)?,
                find("tper").ok_or(DataRecordParsingError::InvalidData)?,
                find("tdir").ok_or(DataRecordParsingError::InvalidData)?,
            ),
            ModelCsvShape::NomadsPoint => (
                find("time").ok_or(DataRecordParsingError::InvalidData)?,
                None,
                None,
                find("htsgwsfc").ok_or(DataRecordParsingError::InvalidData)?,
                find("perpwsfc").ok_or(DataRecordParsingError::InvalidData)?,
                find("dirpwsfc").ok_or(DataRecordParsingError::InvalidData)?,
            ),
        };

        let mut rows = vec![];
        for line in lines {
            let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
            if fields.len() <= dir_ix.max(per_ix).max(hgt_ix).max(time_ix) {
                continue;
            }

            // ERDDAP emits a units row directly under the header
            let time = match fields[time_ix].parse::<DateTime<Utc>>() {
                Ok(t) => t,
                Err(_) => continue,
            };

            let parse_f64 = |raw: &str| -> Option<f64> {
                let v: f64 = raw.parse().ok()?;
                if v.is_nan() {
                    None
                } else {
                    Some(v)
                }
            };

            let (Some(wave_height), Some(peak_period), Some(mean_direction)) = (
                parse_f64(fields[hgt_ix]),
                parse_f64(fields[per_ix]),
                parse_f64(fields[dir_ix]),
            ) else {
                continue;
            };

            rows.push(ModelGridRow {
                time,
                latitude: lat_ix.and_then(|i| parse_f64(fields[i])),
                longitude: lon_ix.and_then(|i| parse_f64(fields[i])),
                wave_height,
                peak_period,
                mean_direction: normalize_degrees(mean_direction),
            });
        }

        Ok(ErddapWaveDataRecordCollection { shape, rows })
    }

    pub fn rows(&self) -> &[ModelGridRow] {
        &self.rows
    }

    /// Collapses the grid to one record per model time. Heights aggregate
    /// as mean/max/min, periods as mean, directions as a circular mean.
    pub fn time_steps(&self) -> Vec<ModelTimeStep> {
        let grouped = self.rows.iter().group_by(|r| r.time);
        grouped
            .into_iter()
            .map(|(time, group)| {
                let group: Vec<&ModelGridRow> = group.collect();
                let n = group.len() as f64;

                let heights: Vec<f64> = group.iter().map(|r| r.wave_height).collect();
                let mean = heights.iter().sum::<f64>() / n;
                let max = heights.iter().cloned().fold(f64::MIN, f64::max);
                let min = heights.iter().cloned().fold(f64::MAX, f64::min);

                let period = group.iter().map(|r| r.peak_period).sum::<f64>() / n;

                let sin_sum: f64 = group.iter().map(|r| r.mean_direction.to_radians().sin()).sum();
                let cos_sum: f64 = group.iter().map(|r| r.mean_direction.to_radians().cos()).sum();
                let direction = normalize_degrees(sin_sum.atan2(cos_sum).to_degrees());

                ModelTimeStep {
                    time,
                    wave_height_mean: mean,
                    wave_height_max: max,
                    wave_height_min: min,
                    peak_period_mean: period,
                    mean_direction: direction,
                    grid_points: group.len(),
                }
            })
            .collect()
    }
}
