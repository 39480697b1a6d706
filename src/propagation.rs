use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::location::Location;
use crate::storm::StormInfo;
use crate::tools::waves;
use crate::units::direction::{normalize_degrees, DirectionConvention};
use crate::units::{UnitSystem, METERS_TO_FEET};

/// Near-field box around the islands. Lows inside it drive local seas the
/// buoys already see; they are not treated as propagating swell sources.
const NEAR_FIELD_BBOX: (f64, f64, f64, f64) = (195.0, 15.0, 210.0, 27.0);

/// Predicted arrival of storm-generated swell at the destination.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SwellArrival {
    pub storm_id: String,
    pub arrival_time: DateTime<Utc>,
    pub travel_time_hours: f64,
    pub distance_nm: f64,
    pub period_s: f64,
    /// Deep-water significant height on arrival, feet. Shore-specific face
    /// scaling happens downstream in fusion.
    pub height_ft: f64,
    pub group_velocity_kt: f64,
    /// Direction the swell arrives from, degrees true.
    pub direction_deg: f64,
    pub confidence: f64,
}

#[derive(Clone, Debug)]
pub struct SwellPropagator {
    destination: Location,
}

impl SwellPropagator {
    pub fn new(destination: Location) -> SwellPropagator {
        SwellPropagator { destination }
    }

    /// Great-circle travel of the storm's dominant swell train to the
    /// destination, using the deep-water group velocity c_g = gT/4π.
    pub fn calculate_arrival(&self, storm: &StormInfo) -> Option<SwellArrival> {
        let fetch_nm = storm.fetch_nm?;
        let duration_hours = storm.duration_hours?;

        if storm.location().within_bbox(&NEAR_FIELD_BBOX) {
            return None;
        }

        let distance_nm = storm
            .location()
            .distance(&self.destination, &UnitSystem::English);

        let period_s = waves::peak_period_from_fetch(storm.wind_speed_kt, fetch_nm);
        if period_s <= 0.0 {
            return None;
        }

        let group_velocity_kt = waves::deep_water_group_velocity_kt(period_s);
        let travel_time_hours = distance_nm / group_velocity_kt;

        let initial_seas_m =
            waves::fetch_limited_seas(storm.wind_speed_kt, fetch_nm, duration_hours);
        let arrival_height_m = waves::propagation_decay(initial_seas_m, fetch_nm, distance_nm);

        let arrival_time =
            storm.detection_time + Duration::seconds((travel_time_hours * 3600.0) as i64);

        Some(SwellArrival {
            storm_id: storm.storm_id.clone(),
            arrival_time,
            travel_time_hours,
            distance_nm,
            period_s,
            height_ft: arrival_height_m * METERS_TO_FEET,
            group_velocity_kt,
            direction_deg: arrival_direction(&storm.location(), &self.destination),
            confidence: storm.confidence,
        })
    }
}

/// Direction the swell arrives from. The incoming ray's travel bearing at
/// the destination is the reciprocal of the destination→storm great-circle
/// bearing; converting it out of the towards convention yields the
/// meteorological from-direction.
fn arrival_direction(storm: &Location, destination: &Location) -> f64 {
    let travel_bearing_at_arrival = normalize_degrees(bearing(destination, storm) + 180.0);
    DirectionConvention::Towards.normalize(travel_bearing_at_arrival)
}

impl Default for SwellPropagator {
    fn default() -> Self {
        SwellPropagator::new(Location::hawaii())
    }
}

/// Initial great-circle bearing from one point toward another, degrees true.
fn bearing(from: &Location, to: &Location) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kamchatka_low() -> StormInfo {
        StormInfo {
            storm_id: "kamchatka_20241114_1".into(),
            latitude: 50.0,
            longitude: 157.0,
            wind_speed_kt: 50.0,
            central_pressure_mb: Some(970.0),
            fetch_nm: Some(600.0),
            duration_hours: Some(72.0),
            detection_time: Utc.with_ymd_and_hms(2024, 11, 14, 0, 0, 0).single().unwrap(),
            source: "pressure_analysis".into(),
            confidence: 1.0,
        }
    }

    #[test]
    fn test_kamchatka_arrival() {
        let arrival = SwellPropagator::default()
            .calculate_arrival(&kamchatka_low())
            .unwrap();

        assert!((2650.0..2850.0).contains(&arrival.distance_nm), "distance {}", arrival.distance_nm);
        assert!((14.0..18.0).contains(&arrival.period_s), "period {}", arrival.period_s);
        // roughly four days in transit at ~25 kt
        assert!((85.0..120.0).contains(&arrival.travel_time_hours), "travel {}", arrival.travel_time_hours);
        assert!(arrival.arrival_time > kamchatka_low().detection_time);
        assert_eq!(arrival.confidence, 1.0);
        // Kamchatka sits to the NW of the islands
        assert!((300.0..340.0).contains(&arrival.direction_deg), "direction {}", arrival.direction_deg);
        assert!(arrival.height_ft > 10.0 && arrival.height_ft < 30.0, "height {}", arrival.height_ft);
    }

    #[test]
    fn test_longer_period_travels_faster() {
        let mut strong = kamchatka_low();
        strong.wind_speed_kt = 60.0;
        strong.fetch_nm = Some(900.0);

        let weak_arrival = SwellPropagator::default().calculate_arrival(&kamchatka_low()).unwrap();
        let strong_arrival = SwellPropagator::default().calculate_arrival(&strong).unwrap();

        assert!(strong_arrival.period_s >= weak_arrival.period_s);
        assert!(strong_arrival.travel_time_hours <= weak_arrival.travel_time_hours);
    }

    #[test]
    fn test_near_field_low_is_not_a_swell_source() {
        let mut local = kamchatka_low();
        local.latitude = 22.0;
        local.longitude = -157.0;

        assert!(SwellPropagator::default().calculate_arrival(&local).is_none());
    }

    #[test]
    fn test_southern_hemisphere_bearing() {
        let mut tasman = kamchatka_low();
        tasman.latitude = -40.0;
        tasman.longitude = 160.0;

        let arrival = SwellPropagator::default().calculate_arrival(&tasman).unwrap();
        // south swell window
        assert!((180.0..240.0).contains(&arrival.direction_deg), "direction {}", arrival.direction_deg);
    }
}
