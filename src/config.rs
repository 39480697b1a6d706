use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::bundle::ArchiveLimits;
use crate::fetch::rate_limit::RateLimit;
use crate::fusion::FusionConfig;
use crate::spectral::SpectralConfig;
use crate::validation::performance::PerformanceConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unreadable config {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Malformed(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub data_root: PathBuf,
    pub max_concurrent: usize,
    pub keep_bundles: usize,
    /// Extra URL templates per agent name, expanded with `{date}`/`{hour}`
    /// placeholders at collection time.
    pub data_sources: HashMap<String, Vec<String>>,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        CollectionSettings {
            data_root: PathBuf::from("data/bundles"),
            max_concurrent: 10,
            keep_bundles: 10,
            data_sources: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecuritySettings {
    /// Optional allow-list applied to every outbound fetch.
    pub allowed_data_domains: Option<Vec<String>>,
    pub max_archive_member_mb: Option<u64>,
    pub max_archive_total_mb: Option<u64>,
    pub max_archive_compression_ratio: Option<f64>,
}

impl SecuritySettings {
    pub fn archive_limits(&self) -> ArchiveLimits {
        let defaults = ArchiveLimits::default();
        ArchiveLimits {
            max_member_bytes: self
                .max_archive_member_mb
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_member_bytes),
            max_total_bytes: self
                .max_archive_total_mb
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.max_total_bytes),
            max_compression_ratio: self
                .max_archive_compression_ratio
                .unwrap_or(defaults.max_compression_ratio),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    /// Budget gate for the downstream narrative layer, enforced at the
    /// handoff boundary.
    pub token_budget: u64,
    pub warn_threshold: f64,
    pub enable_budget_enforcement: bool,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        ForecastSettings {
            token_budget: 60_000,
            warn_threshold: 0.8,
            enable_budget_enforcement: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub db_path: PathBuf,
    pub lookback_days: i64,
    pub min_samples: i64,
    pub outlier_threshold: f64,
    pub enable_adaptive_prompts: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        ValidationSettings {
            db_path: PathBuf::from("data/validation.db"),
            lookback_days: 7,
            min_samples: 10,
            outlier_threshold: 10.0,
            enable_adaptive_prompts: true,
        }
    }
}

impl ValidationSettings {
    pub fn performance_config(&self) -> PerformanceConfig {
        PerformanceConfig {
            lookback_days: self.lookback_days,
            min_samples: self.min_samples,
            outlier_threshold_ft: self.outlier_threshold,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SurfcastConfig {
    pub collection: CollectionSettings,
    pub rate_limits: HashMap<String, RateLimit>,
    pub security: SecuritySettings,
    pub forecast: ForecastSettings,
    pub validation: ValidationSettings,
    pub fusion: FusionConfig,
    pub spectral: SpectralConfig,
}

impl SurfcastConfig {
    /// Loads and validates a TOML config. A missing file is a startup
    /// error, not a silent fallback.
    pub fn load(path: &Path) -> Result<SurfcastConfig, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SurfcastConfig = toml::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Startup validation: the process refuses to run on a bad config
    /// rather than failing mid-collection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (host, limit) in &self.rate_limits {
            if limit.requests_per_second <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "rate limit for {host} must be positive"
                )));
            }
            if limit.burst_size < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "burst size for {host} must be at least 1"
                )));
            }
        }

        for (agent, urls) in &self.collection.data_sources {
            for url in urls {
                let candidate = url.replace("{date}", "20240101").replace("{hour}", "00");
                let parsed = reqwest::Url::parse(&candidate).map_err(|_| {
                    ConfigError::Invalid(format!("data source url for {agent} is malformed: {url}"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid(format!(
                        "data source url for {agent} must be http(s): {url}"
                    )));
                }
            }
        }

        if self.collection.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be nonzero".into()));
        }
        if self.validation.outlier_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "validation outlier threshold must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.forecast.warn_threshold) {
            return Err(ConfigError::Invalid(
                "forecast warn threshold must be within [0, 1]".into(),
            ));
        }

        Ok(())
    }

    /// API keys come only from the environment, never from config files,
    /// and are never persisted.
    pub fn api_key(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}
