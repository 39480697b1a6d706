use std::f64::consts::PI;

use crate::units::{METERS_PER_SECOND_TO_KNOTS, NAUTICAL_MILES_TO_METERS};

const GRAVITY: f64 = 9.81;

/// Peak periods above this are not physically sustained by wind seas.
pub const MAX_PEAK_PERIOD_SECONDS: f64 = 20.0;

/// Deep-water group velocity c_g = g·T / 4π, in meters per second.
pub fn deep_water_group_velocity(period_s: f64) -> f64 {
    GRAVITY * period_s / (4.0 * PI)
}

/// Deep-water group velocity in knots, the propagation bookkeeping unit.
pub fn deep_water_group_velocity_kt(period_s: f64) -> f64 {
    deep_water_group_velocity(period_s) * METERS_PER_SECOND_TO_KNOTS
}

/// Spectral peak period for a fetch-limited wind sea.
///
/// JONSWAP-shaped relation T_p ∝ (g·F/U²)^(1/3) · U/g. The 0.25 coefficient
/// is empirical, tuned against north-Pacific winter lows (a 50 kt / 600 nm
/// fetch yields ≈ 16 s), with a hard ceiling at 20 s.
pub fn peak_period_from_fetch(wind_speed_kt: f64, fetch_nm: f64) -> f64 {
    if wind_speed_kt <= 0.0 || fetch_nm <= 0.0 {
        return 0.0;
    }

    let u = wind_speed_kt / METERS_PER_SECOND_TO_KNOTS;
    let fetch_m = fetch_nm * NAUTICAL_MILES_TO_METERS;
    let nondimensional_fetch = GRAVITY * fetch_m / u.powi(2);
    let period = 0.25 * (u / GRAVITY) * nondimensional_fetch.powf(1.0 / 3.0);

    period.min(MAX_PEAK_PERIOD_SECONDS)
}

/// Significant height of fetch-limited seas in the generation area, meters.
///
/// SMB-style growth H ∝ (g·F/U²)^(1/2) · U²/g, limited by the fully
/// developed ceiling and scaled down when the wind has not blown long
/// enough for the fetch to saturate.
pub fn fetch_limited_seas(wind_speed_kt: f64, fetch_nm: f64, duration_hours: f64) -> f64 {
    if wind_speed_kt <= 0.0 || fetch_nm <= 0.0 {
        return 0.0;
    }

    let u = wind_speed_kt / METERS_PER_SECOND_TO_KNOTS;
    let fetch_m = fetch_nm * NAUTICAL_MILES_TO_METERS;
    let nondimensional_fetch = GRAVITY * fetch_m / u.powi(2);

    let fetch_limited = 0.0016 * nondimensional_fetch.sqrt() * u.powi(2) / GRAVITY;
    let fully_developed = 0.243 * u.powi(2) / GRAVITY;

    // 72 h saturates any realistic north-Pacific fetch
    let duration_factor = (duration_hours / 72.0).clamp(0.25, 1.0).sqrt();

    fetch_limited.min(fully_developed) * duration_factor
}

/// Height remaining after deep-water propagation away from the source.
///
/// Radial spreading decays the seas roughly with the square root of the
/// ratio of fetch length to total travel distance.
pub fn propagation_decay(initial_height_m: f64, fetch_nm: f64, distance_nm: f64) -> f64 {
    if distance_nm <= 0.0 || fetch_nm <= 0.0 {
        return initial_height_m;
    }

    let retained = (fetch_nm / (fetch_nm + distance_nm)).sqrt();
    initial_height_m * retained
}

/// Energy density estimated from significant height over a single
/// frequency band: E ≈ Hs² / (16·Δf).
pub fn spectral_energy_density(significant_height_m: f64, bandwidth_hz: f64) -> f64 {
    if bandwidth_hz <= 0.0 {
        return 0.0;
    }
    significant_height_m.powi(2) / (16.0 * bandwidth_hz)
}

/// Calculates the zero moment of a wave spectra point given energy and bandwidth
pub fn zero_spectral_moment(energy: f64, bandwidth: f64) -> f64 {
    energy * bandwidth
}

/// Significant wave height from the zeroth spectral moment.
pub fn significant_height_from_moment(zero_moment: f64) -> f64 {
    4.0 * zero_moment.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_velocity() {
        // 16 s swell moves at ~24 kt in deep water
        let cg = deep_water_group_velocity_kt(16.0);
        assert!((cg - 24.3).abs() < 0.5, "got {cg}");
    }

    #[test]
    fn test_peak_period_kamchatka_low() {
        let period = peak_period_from_fetch(50.0, 600.0);
        assert!((14.0..18.0).contains(&period), "got {period}");
    }

    #[test]
    fn test_peak_period_ceiling() {
        let period = peak_period_from_fetch(80.0, 2000.0);
        assert!(period <= MAX_PEAK_PERIOD_SECONDS);
    }

    #[test]
    fn test_seas_grow_with_wind() {
        let gale = fetch_limited_seas(40.0, 400.0, 48.0);
        let storm = fetch_limited_seas(50.0, 600.0, 72.0);
        assert!(storm > gale);
        assert!(storm > 8.0 && storm < 20.0, "got {storm}");
    }

    #[test]
    fn test_decay_reduces_height() {
        let decayed = propagation_decay(10.0, 600.0, 2700.0);
        assert!(decayed < 10.0);
        assert!(decayed > 2.0);
    }

    #[test]
    fn test_energy_density() {
        let e = spectral_energy_density(2.5, 0.03);
        assert!((e - 13.02).abs() < 0.01, "got {e}");
    }
}
