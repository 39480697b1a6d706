use chrono::{Duration, TimeZone, Utc};

use surfcast::data::erddap_wave_data_record::ErddapWaveDataRecordCollection;
use surfcast::fusion::{
    BuoyInput, FusedForecast, FusionEngine, FusionInput, ModelInput, Shore, ShoreScaling,
};
use surfcast::scoring::confidence::ConfidenceCategory;
use surfcast::spectral::SpectralAnalyzer;
use surfcast::swell::EventSource;

fn run_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 14, 6, 0, 0).single().unwrap()
}

// WVHT SwH SwP WWH WWP SwD WWD STEEPNESS APD MWD
const WAIMEA_SPEC: &str = "2024 11 14 00 43  3.0  2.5 14.0  1.0  8.0 330 060 AVERAGE  9.2 330";
const EAST_SPEC: &str = "2024 11 14 00 43  2.2  2.13 9.0  0.5  7.0 080 085 STEEP  7.5 080";

const MODEL_CSV: &str = "\
time,latitude,longitude,Thgt,Tper,Tdir
UTC,degrees_north,degrees_east,m,s,degrees_true
2024-11-14T12:00:00Z,21.0,200.0,2.4,14.0,325.0
2024-11-14T12:00:00Z,21.5,200.5,2.6,14.0,330.0
2024-11-15T12:00:00Z,21.0,200.0,3.0,15.0,320.0
2024-11-15T12:00:00Z,21.5,200.5,3.2,15.0,325.0
";

fn buoy(station: &str, spec: &str) -> BuoyInput {
    BuoyInput {
        station_id: station.into(),
        latest: None,
        spectral: SpectralAnalyzer::default().analyze_data(station, spec),
    }
}

fn model() -> ModelInput {
    let collection = ErddapWaveDataRecordCollection::from_data(MODEL_CSV).unwrap();
    ModelInput {
        source_id: "pacioos_ww3".into(),
        time_steps: collection.time_steps(),
    }
}

fn fuse(input: FusionInput) -> FusedForecast {
    FusionEngine::default().fuse(&input)
}

#[test]
fn north_shore_spectral_decomposition_scales_to_faces() {
    let forecast = fuse(FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        buoys: vec![buoy("51201", WAIMEA_SPEC)],
        ..Default::default()
    });

    let event = forecast
        .swell_events
        .iter()
        .find(|e| e.source == EventSource::BuoySpectral)
        .expect("spectral event");
    assert!(!event.primary_components.is_empty());

    let north = forecast
        .shore_forecasts
        .iter()
        .find(|s| s.shore == Shore::North)
        .unwrap();
    let window = &north.windows[0];

    // 2.5 m of 14 s NW energy ≈ 13.3 ft Hawaiian faces
    assert!(
        (12.5..14.0).contains(&window.face_height_ft_h13),
        "h13 {}",
        window.face_height_ft_h13
    );
    assert!((window.face_height_ft_h110 - 1.5 * window.face_height_ft_h13).abs() < 1e-9);
}

#[test]
fn east_shore_windswell_attenuates() {
    let forecast = fuse(FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        buoys: vec![buoy("51202", EAST_SPEC)],
        ..Default::default()
    });

    let east = forecast
        .shore_forecasts
        .iter()
        .find(|s| s.shore == Shore::East)
        .unwrap();
    let window = &east.windows[0];

    // 2.13 m of short-period east energy holds near 4 ft on east facing reefs
    let expected = ShoreScaling::default().face_height_ft(Shore::East, 2.13, 9.0);
    assert!((window.face_height_ft_h13 - expected).abs() < 0.01);
    assert!(
        (3.2..4.5).contains(&window.face_height_ft_h13),
        "h13 {}",
        window.face_height_ft_h13
    );
}

#[test]
fn model_stream_produces_daily_windows_with_trends() {
    let forecast = fuse(FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        buoys: vec![buoy("51201", WAIMEA_SPEC)],
        models: vec![model()],
        ..Default::default()
    });

    let north = forecast
        .shore_forecasts
        .iter()
        .find(|s| s.shore == Shore::North)
        .unwrap();
    assert!(north.windows.len() >= 2);

    // model day two is bigger than day one
    assert!(north.windows[1].face_height_ft_h13 > north.windows[0].face_height_ft_h13);
    for pair in north.windows.windows(2) {
        assert!(pair[1].window_start >= pair[0].window_start);
    }
}

#[test]
fn artifact_serialization_is_stable() {
    let forecast = fuse(FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        buoys: vec![buoy("51201", WAIMEA_SPEC), buoy("51202", EAST_SPEC)],
        models: vec![model()],
        ..Default::default()
    });

    let first = serde_json::to_string(&forecast).unwrap();
    let reparsed: FusedForecast = serde_json::from_str(&first).unwrap();
    let second = serde_json::to_string(&reparsed).unwrap();
    assert_eq!(first, second, "serialize → deserialize → serialize must be stable");
}

#[test]
fn confidence_tracks_available_sources() {
    let sparse = fuse(FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        ..Default::default()
    });
    let rich = fuse(FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        buoys: vec![buoy("51201", WAIMEA_SPEC)],
        models: vec![model()],
        ..Default::default()
    });

    assert!(rich.confidence_report.overall > sparse.confidence_report.overall);
    assert_eq!(sparse.confidence_report.category, ConfidenceCategory::Low);
    assert!(sparse
        .confidence_report
        .warnings
        .iter()
        .any(|w| w.contains("no buoy data")));
}

#[test]
fn future_events_land_in_later_windows() {
    let mut input = FusionInput {
        bundle_id: "b1".into(),
        generated_at: Some(run_time()),
        buoys: vec![buoy("51201", WAIMEA_SPEC)],
        ..Default::default()
    };
    input.storm_arrivals = vec![surfcast::propagation::SwellArrival {
        storm_id: "kamchatka_20241114_1".into(),
        arrival_time: run_time() + Duration::hours(50),
        travel_time_hours: 100.0,
        distance_nm: 2700.0,
        period_s: 17.0,
        height_ft: 18.0,
        group_velocity_kt: 26.0,
        direction_deg: 315.0,
        confidence: 0.85,
    }];

    let forecast = fuse(input);
    let north = forecast
        .shore_forecasts
        .iter()
        .find(|s| s.shore == Shore::North)
        .unwrap();

    // day-0 buoy window plus the storm's day-2 window
    assert!(north.windows.len() >= 2);
    let last = north.windows.last().unwrap();
    assert!(last.primary_period_s >= 16.0);
}
