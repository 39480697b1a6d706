use std::sync::Arc;

use chrono::{Duration, Utc};
use rusqlite::params;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agents::buoy::BuoyAgent;
use crate::agents::endpoints::StaticEndpointAgent;
use crate::agents::model::WaveModelAgent;
use crate::agents::nearshore::NearshoreAgent;
use crate::agents::upper_air::UpperAirAgent;
use crate::agents::{altimetry::AltimetryAgent, CollectionAgent, CollectionContext, CollectionResult};
use crate::bundle::{Bundle, BundleError, BundleManager};
use crate::config::{ConfigError, SurfcastConfig};
use crate::data::erddap_wave_data_record::ErddapWaveDataRecordCollection;
use crate::data::marine_forecast_data_record::MarineForecastDataRecordCollection;
use crate::data::meteorological_data_record::MeteorologicalDataRecordCollection;
use crate::fetch::{FetchError, Fetcher, HostRateLimiter, RateLimit};
use crate::fusion::{
    BuoyInput, FusedForecast, FusionEngine, FusionInput, MarineForecastInput, ModelInput,
};
use crate::propagation::SwellPropagator;
use crate::scoring::source::{SourceKind, SourceScorer};
use crate::spectral::SpectralAnalyzer;
use crate::storm::StormDetector;
use crate::validation::buoy_fetcher::ValidationBuoyFetcher;
use crate::validation::feedback::build_adaptive_context;
use crate::validation::performance::PerformanceAnalyzer;
use crate::validation::store::{
    ForecastRecord, StoreError, ValidationRecord, ValidationStore,
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("validation fetcher unavailable: {0}")]
    ValidationFetcher(String),
}

/// Reference buoy per shore for pairing predictions with observations.
fn reference_buoy(shore: &str) -> &'static str {
    match shore {
        "north" => "51201",
        "east" => "51202",
        "west" => "51003",
        _ => "51002",
    }
}

fn size_category(face_height_ft: f64) -> &'static str {
    if face_height_ft < 2.0 {
        "flat"
    } else if face_height_ft < 4.0 {
        "small"
    } else if face_height_ft < 8.0 {
        "head_high"
    } else if face_height_ft < 15.0 {
        "overhead"
    } else {
        "giant"
    }
}

pub struct ForecastOptions {
    pub skip_collection: bool,
    /// Reuse an existing bundle when collection is skipped.
    pub bundle_id: Option<String>,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        ForecastOptions {
            skip_collection: false,
            bundle_id: None,
        }
    }
}

/// Everything the processing stage pulled out of a bundle.
#[derive(Default)]
pub struct ProcessedBundle {
    pub buoys: Vec<BuoyInput>,
    pub models: Vec<ModelInput>,
    pub marine_forecasts: Vec<MarineForecastInput>,
    pub storms: Vec<crate::storm::StormInfo>,
    pub extra_present_kinds: Vec<SourceKind>,
}

/// Drives the full pipeline: collect → process → fuse → emit → persist.
/// Dependencies are injected at construction; there is no global state
/// beyond the rate limiter the fetcher owns.
pub struct Orchestrator {
    config: SurfcastConfig,
    fetcher: Arc<Fetcher>,
    bundle_manager: BundleManager,
    agents: Vec<Box<dyn CollectionAgent>>,
    store: ValidationStore,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: SurfcastConfig,
        cancel: CancellationToken,
    ) -> Result<Orchestrator, OrchestratorError> {
        config.validate()?;

        let limiter = HostRateLimiter::new(RateLimit::default(), config.rate_limits.clone());
        let fetcher = Arc::new(Fetcher::new(
            limiter,
            config.collection.max_concurrent,
            config.security.allowed_data_domains.clone(),
            cancel.clone(),
        )?);

        let bundle_manager = BundleManager::new(
            config.collection.data_root.clone(),
            config.security.archive_limits(),
        );

        let agents: Vec<Box<dyn CollectionAgent>> = vec![
            Box::new(BuoyAgent::default()),
            Box::new(NearshoreAgent::default()),
            Box::new(WaveModelAgent::default()),
            Box::new(AltimetryAgent::default()),
            Box::new(UpperAirAgent::default()),
            Box::new(StaticEndpointAgent::weather()),
            Box::new(StaticEndpointAgent::tides()),
            Box::new(StaticEndpointAgent::tropical()),
            Box::new(StaticEndpointAgent::charts()),
            Box::new(StaticEndpointAgent::satellite()),
            Box::new(StaticEndpointAgent::climatology()),
        ];

        let store = ValidationStore::open(&config.validation.db_path)?;

        Ok(Orchestrator {
            config,
            fetcher,
            bundle_manager,
            agents,
            store,
            cancel,
        })
    }

    pub fn bundle_manager(&self) -> &BundleManager {
        &self.bundle_manager
    }

    /// Runs every agent against a fresh bundle. Agents already in flight
    /// finish their current download on cancellation; the partial counts
    /// land in the bundle metadata either way.
    pub async fn collect(&self) -> Result<(Bundle, Vec<CollectionResult>), OrchestratorError> {
        let bundle = self.bundle_manager.create_bundle()?;
        let now = Utc::now();

        let mut prepared = vec![];
        for agent in &self.agents {
            let agent_dir = self.bundle_manager.agent_dir(&bundle, agent.name())?;
            prepared.push((agent, agent_dir));
        }

        // agents run as independent tasks; the fetcher's pool bounds the
        // actual network parallelism
        let results: Vec<CollectionResult> =
            futures::future::join_all(prepared.into_iter().map(|(agent, agent_dir)| {
                let ctx = CollectionContext {
                    fetcher: &self.fetcher,
                    bundle: &bundle,
                    agent_dir,
                    now,
                };
                async move {
                    if self.cancel.is_cancelled() {
                        warn!(agent = agent.name(), "collection cancelled before agent start");
                        return CollectionResult::new(agent.name());
                    }
                    let result = agent.collect(&ctx).await;
                    info!(
                        agent = agent.name(),
                        successful = result.successful,
                        failed = result.failed,
                        "agent finished"
                    );
                    result
                }
            }))
            .await;

        let metadata = serde_json::json!({
            "bundle_id": bundle.bundle_id,
            "collected_at": now.to_rfc3339(),
            "cancelled": self.cancel.is_cancelled(),
            "agents": results,
        });
        self.bundle_manager.write_metadata(&bundle, &metadata)?;
        self.bundle_manager
            .apply_retention(self.config.collection.keep_bundles)?;

        Ok((bundle, results))
    }

    /// Parses the bundle's raw files into fusion inputs. Sources that fail
    /// to parse are treated as absent; the confidence machinery accounts
    /// for them downstream.
    pub fn process(&self, bundle: &Bundle) -> Result<ProcessedBundle, OrchestratorError> {
        let mut processed = ProcessedBundle::default();
        let analyzer = SpectralAnalyzer::new(self.config.spectral.clone());

        let buoy_dir = bundle.path.join("buoys");
        if buoy_dir.is_dir() {
            for entry in std::fs::read_dir(&buoy_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                let Some(station_id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };

                let latest = std::fs::read_to_string(&path).ok().and_then(|text| {
                    let mut collection = MeteorologicalDataRecordCollection::from_data(&text);
                    let record = collection.records().next();
                    record
                });

                let spec_path = buoy_dir.join(format!("{station_id}.spec"));
                let spectral = if spec_path.is_file() {
                    analyzer.analyze_file(&spec_path, station_id)
                } else {
                    None
                };

                processed.buoys.push(BuoyInput {
                    station_id: station_id.to_string(),
                    latest,
                    spectral,
                });
            }
        }

        let model_dir = bundle.path.join("wave_model");
        if model_dir.is_dir() {
            for name in ["ww3_hawaii.csv", "ww3_global.csv"] {
                let path = model_dir.join(name);
                if !path.is_file() {
                    continue;
                }
                match std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|data| ErddapWaveDataRecordCollection::from_data(&data).ok())
                {
                    Some(collection) => {
                        processed.models.push(ModelInput {
                            source_id: "pacioos_ww3".into(),
                            time_steps: collection.time_steps(),
                        });
                        break;
                    }
                    None => warn!(file = name, "wave model csv unusable"),
                }
            }
        }

        let marine_path = bundle.path.join("weather").join("marine_forecast.json");
        if marine_path.is_file() {
            match std::fs::read_to_string(&marine_path)
                .ok()
                .and_then(|data| MarineForecastDataRecordCollection::from_json(&data).ok())
            {
                Some(collection) => processed.marine_forecasts.push(MarineForecastInput {
                    source_id: "open-meteo_marine".into(),
                    location_name: "south_shore".into(),
                    records: collection.records(),
                }),
                None => warn!("marine forecast payload unusable"),
            }
        }

        for candidate in [
            bundle.path.join("pressure_analysis.txt"),
            bundle.path.join("charts").join("pressure_analysis.txt"),
        ] {
            if candidate.is_file() {
                if let Ok(text) = std::fs::read_to_string(&candidate) {
                    processed.storms = StormDetector::new().detect(&text, Utc::now());
                }
                break;
            }
        }

        if bundle.path.join("altimetry").is_dir() {
            processed.extra_present_kinds.push(SourceKind::Altimetry);
        }

        info!(
            buoys = processed.buoys.len(),
            models = processed.models.len(),
            storms = processed.storms.len(),
            "bundle processed"
        );
        Ok(processed)
    }

    /// The full forecast command: collect (unless skipped), process, fuse,
    /// emit the artifact into the bundle, persist the persistence rows in
    /// one IMMEDIATE transaction.
    pub async fn forecast(
        &mut self,
        options: ForecastOptions,
    ) -> Result<FusedForecast, OrchestratorError> {
        let bundle = if options.skip_collection {
            match &options.bundle_id {
                Some(id) => self.bundle_manager.open_bundle(id)?,
                None => {
                    let latest = self
                        .bundle_manager
                        .list_bundles()?
                        .into_iter()
                        .next()
                        .ok_or_else(|| {
                            OrchestratorError::Bundle(BundleError::Io(std::io::Error::new(
                                std::io::ErrorKind::NotFound,
                                "no bundle available; run collection first",
                            )))
                        })?;
                    self.bundle_manager.open_bundle(&latest)?
                }
            }
        } else {
            self.collect().await?.0
        };

        let processed = self.process(&bundle)?;

        let propagator = SwellPropagator::default();
        let storm_arrivals = processed
            .storms
            .iter()
            .filter_map(|storm| propagator.calculate_arrival(storm))
            .collect();

        let historical_accuracy = PerformanceAnalyzer::new(
            self.config.validation.performance_config(),
        )
        .analyze(&self.store, Utc::now())
        .ok()
        .filter(|report| report.has_data)
        .map(|report| (1.0 - report.overall_mae / 10.0).clamp(0.0, 1.0));

        let mut scorer = SourceScorer::new();
        if let Some(accuracy) = historical_accuracy {
            scorer.set_historical_accuracy("pacioos_ww3", accuracy);
        }

        let engine = FusionEngine::new(self.config.fusion.clone(), scorer);
        let input = FusionInput {
            bundle_id: bundle.bundle_id.clone(),
            generated_at: Some(Utc::now()),
            buoys: processed.buoys,
            models: processed.models,
            marine_forecasts: processed.marine_forecasts,
            storm_arrivals,
            wind: None,
            historical_accuracy,
            extra_present_kinds: processed.extra_present_kinds,
        };
        let mut fused = engine.fuse(&input);

        fused.metadata.insert(
            "token_budget".into(),
            serde_json::json!({
                "budget": self.config.forecast.token_budget,
                "warn_threshold": self.config.forecast.warn_threshold,
                "enforced": self.config.forecast.enable_budget_enforcement,
            }),
        );

        let artifact = serde_json::to_string_pretty(&fused)?;
        std::fs::write(bundle.path.join("forecast.json"), artifact)?;

        self.persist_forecast(&fused)?;
        info!(forecast_id = %fused.forecast_id, bundle_id = %fused.bundle_id, "forecast emitted");

        Ok(fused)
    }

    /// One IMMEDIATE transaction writes the forecast row and all of its
    /// predictions, so a forecast can never appear without its rows or
    /// vice versa.
    fn persist_forecast(&mut self, fused: &FusedForecast) -> Result<(), OrchestratorError> {
        let forecast = ForecastRecord {
            forecast_id: fused.forecast_id.clone(),
            created_at: fused.generated_at,
            bundle_id: fused.bundle_id.clone(),
            model_version: String::new(),
            total_tokens: 0,
            input_tokens: 0,
            output_tokens: 0,
            model_cost_usd: 0.0,
            generation_time_sec: 0.0,
            status: "complete".into(),
            confidence_report: Some(serde_json::to_value(&fused.confidence_report)?),
        };

        let confidence = fused.confidence_report.overall;
        let shore_windows: Vec<(String, crate::fusion::ShoreWindow)> = fused
            .shore_forecasts
            .iter()
            .flat_map(|sf| {
                sf.windows
                    .iter()
                    .map(|w| (sf.shore.name().to_string(), w.clone()))
            })
            .collect();

        self.store.with_immediate_tx(|tx| {
            tx.execute(
                "INSERT INTO forecasts (forecast_id, created_at, bundle_id, model_version,
                    total_tokens, input_tokens, output_tokens, model_cost_usd,
                    generation_time_sec, status, confidence_report)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    forecast.forecast_id,
                    forecast.created_at,
                    forecast.bundle_id,
                    forecast.model_version,
                    forecast.total_tokens,
                    forecast.input_tokens,
                    forecast.output_tokens,
                    forecast.model_cost_usd,
                    forecast.generation_time_sec,
                    forecast.status,
                    forecast.confidence_report.as_ref().map(|v| v.to_string()),
                ],
            )?;

            let mut statement = tx.prepare_cached(
                "INSERT INTO predictions (forecast_id, shore, forecast_time, valid_time,
                    predicted_height, predicted_period, predicted_direction,
                    predicted_category, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (shore, window) in &shore_windows {
                let valid_time = window.window_start + Duration::hours(12);
                statement.execute(params![
                    forecast.forecast_id,
                    shore,
                    forecast.created_at,
                    valid_time,
                    window.face_height_ft_h13,
                    window.primary_period_s,
                    window.primary_direction_deg,
                    size_category(window.face_height_ft_h13),
                    confidence,
                ])?;
            }

            Ok(())
        })?;

        Ok(())
    }

    /// The validate command: pull buoy actuals for every due prediction,
    /// pair each with the closest observation from its shore's reference
    /// buoy, write the validation rows, and return the adaptive context.
    pub async fn validate(&mut self) -> Result<String, OrchestratorError> {
        let now = Utc::now();
        let due = self.store.unvalidated_predictions(now)?;
        if due.is_empty() {
            info!("no predictions due for validation");
        } else {
            let buoy_ids: Vec<String> = {
                let mut ids: Vec<String> = due
                    .iter()
                    .map(|p| reference_buoy(&p.shore).to_string())
                    .collect();
                ids.sort();
                ids.dedup();
                ids
            };

            let window_start = due
                .iter()
                .map(|p| p.valid_time)
                .min()
                .unwrap_or(now)
                - Duration::hours(12);

            let fetcher = ValidationBuoyFetcher::new()
                .map_err(|e| OrchestratorError::ValidationFetcher(e.to_string()))?;
            let actuals = fetcher.fetch_actuals(&buoy_ids, window_start, now).await;

            if !actuals.is_empty() {
                let inserted = self.store.insert_actuals(&actuals)?;
                info!(inserted, "actuals stored");

                let mut validations = vec![];
                for prediction in &due {
                    let buoy_id = reference_buoy(&prediction.shore);
                    let nearest = actuals
                        .iter()
                        .enumerate()
                        .filter(|(_, a)| a.buoy_id == buoy_id)
                        .min_by_key(|(_, a)| {
                            (a.observation_time - prediction.valid_time)
                                .num_seconds()
                                .abs()
                        });

                    let Some((offset, actual)) = nearest else {
                        continue;
                    };
                    // ids are assigned sequentially within the batch insert
                    let actual_id =
                        self.store.count("actuals")? - actuals.len() as i64 + offset as i64 + 1;

                    let height_error = prediction.predicted_height - actual.wave_height;
                    let period_error = match (prediction.predicted_period, actual.dominant_period)
                    {
                        (Some(p), Some(a)) => Some(p - a),
                        _ => None,
                    };
                    let direction_error =
                        match (prediction.predicted_direction, actual.direction) {
                            (Some(p), Some(a)) => {
                                Some(crate::units::direction::angular_difference(p, a))
                            }
                            _ => None,
                        };
                    let category_match = prediction
                        .predicted_category
                        .as_deref()
                        .map(|c| c == size_category(actual.wave_height))
                        .unwrap_or(false);

                    validations.push(ValidationRecord {
                        id: None,
                        forecast_id: prediction.forecast_id.clone(),
                        prediction_id: prediction.id.unwrap_or_default(),
                        actual_id,
                        validated_at: now,
                        height_error,
                        period_error,
                        direction_error,
                        category_match,
                        mae: height_error.abs(),
                        rmse: height_error.abs(),
                    });
                }

                if !validations.is_empty() {
                    let inserted = self.store.insert_validations(&validations)?;
                    info!(inserted, "validations stored");
                }
            }
        }

        if !self.config.validation.enable_adaptive_prompts {
            return Ok(String::new());
        }

        let report = PerformanceAnalyzer::new(self.config.validation.performance_config())
            .analyze(&self.store, now)?;
        Ok(build_adaptive_context(&report))
    }
}
