use std::fs;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use surfcast::config::SurfcastConfig;
use surfcast::fusion::Shore;
use surfcast::orchestrator::{ForecastOptions, Orchestrator};

const PRESSURE_ANALYSIS: &str = "\
A deep low near 50°N 157°E east of Kamchatka with winds of 50 knots, central \
pressure 970 mb and a fetch of 600 nm aimed at Hawaii, persisting for 72 hours.
";

/// Realtime2 and model fixtures stamped relative to now, so the run's
/// day-zero window picks them up.
fn fixtures() -> (String, String, String) {
    let observed = Utc::now() - Duration::hours(2);
    let stamp = observed.format("%Y %m %d %H %M");

    let buoy_txt = format!(
        "#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE\n\
         {stamp} 340  6.0  8.0   3.0    14   9.5 330 1020.0  23.0  25.0  19.0   MM  0.0    MM\n"
    );
    let buoy_spec = format!(
        "#YY  MM DD hh mm WVHT  SwH  SwP  WWH  WWP SwD WWD  STEEPNESS  APD MWD\n\
         {stamp}  3.0  2.5 14.0  1.0  8.0 330 060    AVERAGE  9.2 330\n"
    );

    let step1 = (Utc::now() + Duration::hours(6)).format("%Y-%m-%dT%H:00:00Z");
    let step2 = (Utc::now() + Duration::hours(30)).format("%Y-%m-%dT%H:00:00Z");
    let model_csv = format!(
        "time,latitude,longitude,Thgt,Tper,Tdir\n\
         UTC,degrees_north,degrees_east,m,s,degrees_true\n\
         {step1},21.0,200.0,2.4,14.0,325.0\n\
         {step1},21.5,200.5,2.6,14.0,330.0\n\
         {step2},21.0,200.0,3.0,15.0,320.0\n\
         {step2},21.5,200.5,3.2,15.0,325.0\n"
    );

    (buoy_txt, buoy_spec, model_csv)
}

fn orchestrator_with_bundle() -> (tempfile::TempDir, Orchestrator, String) {
    let root = tempfile::tempdir().unwrap();

    let mut config = SurfcastConfig::default();
    config.collection.data_root = root.path().join("bundles");
    config.validation.db_path = root.path().join("validation.db");

    let bundle_id = "run-0001";
    let bundle_dir = config.collection.data_root.join(bundle_id);
    let (buoy_txt, buoy_spec, model_csv) = fixtures();
    fs::create_dir_all(bundle_dir.join("buoys")).unwrap();
    fs::create_dir_all(bundle_dir.join("wave_model")).unwrap();
    fs::create_dir_all(bundle_dir.join("altimetry")).unwrap();
    fs::write(bundle_dir.join("buoys/51201.txt"), buoy_txt).unwrap();
    fs::write(bundle_dir.join("buoys/51201.spec"), buoy_spec).unwrap();
    fs::write(bundle_dir.join("wave_model/ww3_hawaii.csv"), model_csv).unwrap();
    fs::write(bundle_dir.join("pressure_analysis.txt"), PRESSURE_ANALYSIS).unwrap();

    let orchestrator = Orchestrator::new(config, CancellationToken::new()).unwrap();
    (root, orchestrator, bundle_id.to_string())
}

#[tokio::test]
async fn forecast_from_existing_bundle_emits_and_persists() {
    let (root, mut orchestrator, bundle_id) = orchestrator_with_bundle();

    let fused = orchestrator
        .forecast(ForecastOptions {
            skip_collection: true,
            bundle_id: Some(bundle_id.clone()),
        })
        .await
        .unwrap();

    assert_eq!(fused.bundle_id, bundle_id);
    assert!(!fused.swell_events.is_empty());
    assert_eq!(fused.storm_arrivals.len(), 1);

    let north = fused
        .shore_forecasts
        .iter()
        .find(|s| s.shore == Shore::North)
        .unwrap();
    assert!(!north.windows.is_empty());

    // artifact written into the bundle
    let artifact = root
        .path()
        .join("bundles")
        .join(&bundle_id)
        .join("forecast.json");
    let raw = fs::read_to_string(artifact).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["bundle_id"], bundle_id.as_str());
    assert!(parsed["metadata"]["token_budget"]["budget"].is_number());
    assert!(parsed["confidence_report"]["overall"].is_number());
}

#[tokio::test]
async fn persisted_rows_are_ordered_and_linked() {
    let (root, mut orchestrator, bundle_id) = orchestrator_with_bundle();

    let fused = orchestrator
        .forecast(ForecastOptions {
            skip_collection: true,
            bundle_id: Some(bundle_id),
        })
        .await
        .unwrap();

    // reopen the store independently and confirm the transaction landed
    let store =
        surfcast::validation::store::ValidationStore::open(&root.path().join("validation.db"))
            .unwrap();
    assert_eq!(store.count("forecasts").unwrap(), 1);
    let predictions = store.count("predictions").unwrap();
    assert!(predictions > 0, "forecast persisted without predictions");

    let linked: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM predictions WHERE forecast_id = ?1",
            [&fused.forecast_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(linked, predictions);
}

#[tokio::test]
async fn skip_collection_without_bundle_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let mut config = SurfcastConfig::default();
    config.collection.data_root = root.path().join("bundles");
    config.validation.db_path = root.path().join("validation.db");

    let mut orchestrator = Orchestrator::new(config, CancellationToken::new()).unwrap();
    let result = orchestrator
        .forecast(ForecastOptions {
            skip_collection: true,
            bundle_id: None,
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn validate_with_no_due_predictions_returns_empty_context() {
    let (_root, mut orchestrator, _bundle_id) = orchestrator_with_bundle();
    let context = orchestrator.validate().await.unwrap();
    assert_eq!(context, "");
}
