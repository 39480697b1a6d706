use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};

use crate::location::Location;
use crate::units::UnitSystem;

/// One station entry from the NDBC active-stations roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "station")]
pub struct BuoyStation {
    #[serde(rename = "@id")]
    pub station_id: String,

    #[serde(rename = "@name", default)]
    pub name: String,

    #[serde(rename = "@owner", default)]
    pub owner: String,

    #[serde(rename = "@lat", default)]
    pub latitude: f64,

    #[serde(rename = "@lon", default)]
    pub longitude: f64,

    #[serde(rename = "@met", default)]
    pub met: String,
}

impl BuoyStation {
    pub fn new(station_id: &str, name: &str, latitude: f64, longitude: f64) -> BuoyStation {
        BuoyStation {
            station_id: station_id.into(),
            name: name.into(),
            owner: String::new(),
            latitude,
            longitude,
            met: "y".into(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude, self.name.clone())
    }

    pub fn has_meteorological_data(&self) -> bool {
        self.met.eq_ignore_ascii_case("y")
    }

    pub fn meteorological_data_url(&self) -> String {
        format!(
            "https://www.ndbc.noaa.gov/data/realtime2/{}.txt",
            self.station_id
        )
    }

    pub fn wave_summary_url(&self) -> String {
        format!(
            "https://www.ndbc.noaa.gov/data/realtime2/{}.spec",
            self.station_id
        )
    }

    pub fn spectral_energy_url(&self) -> String {
        format!(
            "https://www.ndbc.noaa.gov/data/realtime2/{}.data_spec",
            self.station_id
        )
    }
}

/// Parsed `activestations.xml` roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "stations")]
pub struct BuoyStations {
    #[serde(rename = "station", default)]
    pub stations: Vec<BuoyStation>,
}

impl BuoyStations {
    pub fn active_stations_url() -> &'static str {
        "https://www.ndbc.noaa.gov/activestations.xml"
    }

    pub fn from_raw_data(raw_data: &str) -> Option<BuoyStations> {
        from_str(raw_data).ok()
    }

    /// Stations within a radius of a reference point, nearest first.
    pub fn stations_near(&self, center: &Location, radius_nm: f64) -> Vec<&BuoyStation> {
        let mut nearby: Vec<(&BuoyStation, f64)> = self
            .stations
            .iter()
            .map(|s| (s, s.location().distance(center, &UnitSystem::English)))
            .filter(|(_, d)| *d <= radius_nm)
            .collect();
        nearby.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        nearby.into_iter().map(|(s, _)| s).collect()
    }
}

/// The offshore and nearshore NDBC stations the collection layer polls when
/// no roster has been cached. Offshore 51000-series buoys ring the
/// archipelago; 512xx are nearshore wave buoys.
pub fn hawaiian_stations() -> Vec<BuoyStation> {
    vec![
        BuoyStation::new("51001", "NW Hawaii", 24.45, -162.0),
        BuoyStation::new("51002", "SW Hawaii", 17.06, -157.75),
        BuoyStation::new("51003", "W Hawaii", 19.17, -160.63),
        BuoyStation::new("51004", "SE Hawaii", 17.53, -152.26),
        BuoyStation::new("51101", "NW Kauai", 24.36, -162.08),
        BuoyStation::new("51201", "Waimea Bay", 21.67, -158.12),
        BuoyStation::new("51202", "Mokapu Point", 21.42, -157.68),
        BuoyStation::new("51208", "Hanalei", 22.29, -159.57),
    ]
}
