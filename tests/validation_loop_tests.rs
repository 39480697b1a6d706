use chrono::{Duration, Utc};

use surfcast::validation::feedback::build_adaptive_context;
use surfcast::validation::parser::ForecastParser;
use surfcast::validation::performance::{BiasCategory, PerformanceAnalyzer};
use surfcast::validation::store::{
    ActualRecord, ForecastRecord, PredictionRecord, ValidationRecord, ValidationStore,
};

fn forecast_row(id: &str) -> ForecastRecord {
    ForecastRecord {
        forecast_id: id.into(),
        created_at: Utc::now(),
        bundle_id: "bundle".into(),
        model_version: "v1".into(),
        total_tokens: 0,
        input_tokens: 0,
        output_tokens: 0,
        model_cost_usd: 0.0,
        generation_time_sec: 0.0,
        status: "complete".into(),
        confidence_report: None,
    }
}

fn seed_biased_validations(store: &mut ValidationStore, shore: &str, bias_ft: f64, count: usize) {
    let now = Utc::now();
    for _ in 0..count {
        store
            .insert_predictions(&[PredictionRecord {
                id: None,
                forecast_id: "f1".into(),
                shore: shore.into(),
                forecast_time: now,
                valid_time: now,
                predicted_height: 10.0,
                predicted_period: Some(14.0),
                predicted_direction: Some(320.0),
                predicted_category: Some("overhead".into()),
                confidence: 0.8,
            }])
            .unwrap();
        store
            .insert_actuals(&[ActualRecord {
                id: None,
                buoy_id: "51201".into(),
                observation_time: now,
                wave_height: 10.0 - bias_ft,
                dominant_period: Some(13.0),
                direction: Some(318.0),
                source: "NDBC".into(),
            }])
            .unwrap();

        let prediction_id = store.count("predictions").unwrap();
        let actual_id = store.count("actuals").unwrap();
        store
            .insert_validations(&[ValidationRecord {
                id: None,
                forecast_id: "f1".into(),
                prediction_id,
                actual_id,
                validated_at: now - Duration::days(2),
                height_error: bias_ft,
                period_error: Some(1.0),
                direction_error: Some(2.0),
                category_match: true,
                mae: bias_ft.abs(),
                rmse: bias_ft.abs(),
            }])
            .unwrap();
    }
}

#[test]
fn empty_database_yields_no_data_and_no_guidance() {
    let store = ValidationStore::open_in_memory().unwrap();
    let report = PerformanceAnalyzer::default().analyze(&store, Utc::now()).unwrap();

    assert!(!report.has_data);
    assert_eq!(build_adaptive_context(&report), "");
}

#[test]
fn systematic_north_overprediction_reaches_the_prompt_context() {
    let mut store = ValidationStore::open_in_memory().unwrap();
    store.insert_forecast(&forecast_row("f1")).unwrap();
    seed_biased_validations(&mut store, "north", 1.2, 15);

    let report = PerformanceAnalyzer::default().analyze(&store, Utc::now()).unwrap();
    assert!(report.has_data);
    assert_eq!(report.total_samples, 15);

    let alert = report.bias_alerts.iter().find(|a| a.shore == "north").unwrap();
    assert_eq!(alert.category, BiasCategory::Overpredicting);
    assert!((alert.avg_bias - 1.2).abs() < 1e-9);
    assert_eq!(alert.sample_size, 15);

    let context = build_adaptive_context(&report);
    assert!(context.to_lowercase().contains("north"));
    assert!(context.contains("overpredicting"));
}

#[test]
fn narrative_round_trip_recovers_predictions() {
    let narrative = "\
## North Shore Forecast

Day 1: Solid overhead NW swell, 10-14 ft faces at 15 seconds.
Day 2: Easing to 7-9 ft, NW at 320°, 13 second intervals.

## South Shore Forecast

Day 1: Knee to waist high, 1-2 ft at 13 s from the SSW.
";

    let predictions = ForecastParser::new().parse(narrative);
    assert_eq!(predictions.len(), 3);

    let north_day1 = predictions
        .iter()
        .find(|p| p.shore == surfcast::fusion::Shore::North && p.day == 1)
        .unwrap();
    assert_eq!(north_day1.height_min_ft, 10.0);
    assert_eq!(north_day1.height_max_ft, 14.0);
    assert_eq!(north_day1.period_min_s, Some(15.0));
    assert!(north_day1.direction_deg.is_some());
    assert!(north_day1.confidence >= 0.95);

    // parsed predictions persist cleanly as prediction rows
    let mut store = ValidationStore::open_in_memory().unwrap();
    store.insert_forecast(&forecast_row("f1")).unwrap();
    let now = Utc::now();
    let rows: Vec<PredictionRecord> = predictions
        .iter()
        .map(|p| PredictionRecord {
            id: None,
            forecast_id: "f1".into(),
            shore: p.shore.name().into(),
            forecast_time: now,
            valid_time: now + Duration::days(p.day as i64),
            predicted_height: p.height_mid_ft(),
            predicted_period: p.period_min_s,
            predicted_direction: p.direction_deg,
            predicted_category: p.category.clone(),
            confidence: p.confidence,
        })
        .collect();
    assert_eq!(store.insert_predictions(&rows).unwrap(), 3);
}

#[test]
fn well_calibrated_history_reports_maintenance_guidance() {
    let mut store = ValidationStore::open_in_memory().unwrap();
    store.insert_forecast(&forecast_row("f1")).unwrap();
    seed_biased_validations(&mut store, "south", 0.1, 12);

    let report = PerformanceAnalyzer::default().analyze(&store, Utc::now()).unwrap();
    let context = build_adaptive_context(&report);
    assert!(context.contains("South shore predictions are well-calibrated"));
}
