use async_trait::async_trait;
use tracing::info;

use super::{download_to_file, CollectionAgent, CollectionContext, CollectionResult};
use crate::data::station::{hawaiian_stations, BuoyStation};
use crate::fetch::FetchOptions;

/// Pulls NDBC realtime2 observations for the Hawaiian station network:
/// standard meteorological text per station, plus the wave summary and raw
/// spectral-density files for wave-capable buoys.
pub struct BuoyAgent {
    stations: Vec<BuoyStation>,
    include_spectra: bool,
}

impl BuoyAgent {
    pub fn new(stations: Vec<BuoyStation>, include_spectra: bool) -> BuoyAgent {
        BuoyAgent {
            stations,
            include_spectra,
        }
    }

    /// Builds the station set from a cached NDBC roster instead of the
    /// built-in Hawaiian list.
    pub fn from_roster(
        roster: &crate::data::station::BuoyStations,
        center: &crate::location::Location,
        radius_nm: f64,
    ) -> BuoyAgent {
        let stations = roster
            .stations_near(center, radius_nm)
            .into_iter()
            .cloned()
            .collect();
        BuoyAgent::new(stations, true)
    }
}

impl Default for BuoyAgent {
    fn default() -> Self {
        BuoyAgent::new(hawaiian_stations(), true)
    }
}

#[async_trait]
impl CollectionAgent for BuoyAgent {
    fn name(&self) -> &'static str {
        "buoys"
    }

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult {
        let mut result = CollectionResult::new(self.name());
        let options = FetchOptions::default();

        for station in &self.stations {
            let met = download_to_file(
                ctx,
                &station.meteorological_data_url(),
                &format!("{}.txt", station.station_id),
                &format!("standard meteorological data for {}", station.name),
                "ndbc",
                "text",
                &options,
            )
            .await;
            result.push(met);

            if self.include_spectra {
                let summary = download_to_file(
                    ctx,
                    &station.wave_summary_url(),
                    &format!("{}.spec", station.station_id),
                    &format!("wave summary for {}", station.name),
                    "ndbc",
                    "spec",
                    &options,
                )
                .await;
                result.push(summary);

                let spectra = download_to_file(
                    ctx,
                    &station.spectral_energy_url(),
                    &format!("{}.data_spec", station.station_id),
                    &format!("raw spectral density for {}", station.name),
                    "ndbc",
                    "data_spec",
                    &options,
                )
                .await;
                result.push(spectra);
            }
        }

        info!(
            agent = self.name(),
            successful = result.successful,
            failed = result.failed,
            "buoy collection finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::station::BuoyStations;
    use crate::location::Location;

    #[test]
    fn test_from_roster_selects_nearby_wave_buoys() {
        let roster = BuoyStations {
            stations: vec![
                BuoyStation::new("51201", "Waimea Bay", 21.67, -158.12),
                BuoyStation::new("44097", "Block Island", 40.97, -71.13),
            ],
        };

        let agent = BuoyAgent::from_roster(&roster, &Location::hawaii(), 300.0);
        assert_eq!(agent.stations.len(), 1);
        assert_eq!(agent.stations[0].station_id, "51201");
    }
}
