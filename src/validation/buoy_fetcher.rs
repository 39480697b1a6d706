use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::store::ActualRecord;
use crate::data::meteorological_data_record::MeteorologicalDataRecordCollection;
use crate::units::{UnitConvertible, UnitSystem};

/// NDBC courtesy limit for the validation path: one request every two
/// seconds.
pub const REQUEST_SPACING: Duration = Duration::from_secs(2);

/// Ground-truth ingestion for the validation loop. Deliberately separate
/// from the collection agents so validation never couples production
/// bundles to scoring.
pub struct ValidationBuoyFetcher {
    client: reqwest::Client,
    request_spacing: Duration,
}

impl ValidationBuoyFetcher {
    pub fn new() -> Result<ValidationBuoyFetcher, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("surfcast-validation/0.1")
            .build()?;
        Ok(ValidationBuoyFetcher {
            client,
            request_spacing: REQUEST_SPACING,
        })
    }

    /// Observed wave records for the requested stations within the window,
    /// heights converted to feet. Unreachable stations are skipped.
    pub async fn fetch_actuals(
        &self,
        buoy_ids: &[String],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<ActualRecord> {
        let mut actuals = vec![];

        for (i, buoy_id) in buoy_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.request_spacing).await;
            }

            let url = format!("https://www.ndbc.noaa.gov/data/realtime2/{buoy_id}.txt");
            let text = match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%buoy_id, error = %e, "actuals body read failed");
                        continue;
                    }
                },
                Ok(response) => {
                    warn!(%buoy_id, status = %response.status(), "actuals fetch refused");
                    continue;
                }
                Err(e) => {
                    warn!(%buoy_id, error = %e, "actuals fetch failed");
                    continue;
                }
            };

            actuals.extend(actuals_from_text(buoy_id, &text, window_start, window_end));
        }

        info!(count = actuals.len(), "buoy actuals ingested");
        actuals
    }
}

/// Parses realtime2 text into actual records, filtered to the window.
/// Heights arrive in meters and are stored in feet to match predictions.
pub fn actuals_from_text(
    buoy_id: &str,
    text: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<ActualRecord> {
    let mut collection = MeteorologicalDataRecordCollection::from_data(text);

    collection
        .records()
        .filter(|r| r.date >= window_start && r.date <= window_end)
        .filter_map(|mut r| {
            let height_ft = r.wave_height.to_units(&UnitSystem::English).value?;
            Some(ActualRecord {
                id: None,
                buoy_id: buoy_id.to_string(),
                observation_time: r.date,
                wave_height: height_ft,
                dominant_period: r.dominant_wave_period.value,
                direction: r.mean_wave_direction.value.as_ref().map(|d| d.degrees),
                source: "NDBC".into(),
            })
        })
        .collect()
}
