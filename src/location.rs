use crate::units::UnitSystem;
use serde::{Deserialize, Serialize};

pub fn normalize_latitude(latitude: f64) -> f64 {
    if latitude > 90.0 {
        latitude - 180.0
    } else {
        latitude
    }
}

pub fn normalize_longitude(longitude: f64) -> f64 {
    if longitude > 180.0 {
        longitude - 360.0
    } else {
        longitude
    }
}

pub fn absolute_longitude(longitude: f64) -> f64 {
    if longitude < 0.0 {
        360.0 + longitude
    } else {
        longitude
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64, name: String) -> Location {
        Location {
            name,
            latitude: lat,
            longitude: lon,
        }
    }

    /// Centroid of the main Hawaiian islands, the default swell destination.
    pub fn hawaii() -> Location {
        Location::new(21.5, -158.0, "Hawaiian Islands".into())
    }

    pub fn absolute_latitude(&self) -> f64 {
        if self.latitude < 0.0 {
            self.latitude + 180.0
        } else {
            self.latitude
        }
    }

    pub fn absolute_longitude(&self) -> f64 {
        absolute_longitude(self.longitude)
    }

    /// Great-circle distance computed with the haversine formula.
    /// `UnitSystem::English` yields nautical miles, `Metric` kilometers.
    pub fn distance(&self, other: &Location, unit: &UnitSystem) -> f64 {
        let source_lat = self.latitude.to_radians();
        let source_lon = self.absolute_longitude().to_radians();
        let dest_lat = other.latitude.to_radians();
        let dest_lon = other.absolute_longitude().to_radians();

        let d_lat = dest_lat - source_lat;
        let d_lon = dest_lon - source_lon;

        let a = (d_lat * 0.5).sin().powi(2)
            + source_lat.cos() * dest_lat.cos() * (d_lon * 0.5).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        let r = unit.earths_radius();

        c * r
    }

    pub fn within_bbox(&self, bbox: &(f64, f64, f64, f64)) -> bool {
        let within_lng = absolute_longitude(bbox.0) <= self.absolute_longitude()
            && self.absolute_longitude() <= absolute_longitude(bbox.2);
        let within_lat = normalize_latitude(bbox.1) <= self.latitude
            && self.latitude <= normalize_latitude(bbox.3);
        within_lng && within_lat
    }
}
