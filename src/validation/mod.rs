pub mod buoy_fetcher;
pub mod feedback;
pub mod parser;
pub mod performance;
pub mod store;

pub use buoy_fetcher::ValidationBuoyFetcher;
pub use parser::{ForecastParser, ForecastPrediction};
pub use performance::{PerformanceAnalyzer, PerformanceConfig, PerformanceReport};
pub use store::{
    ActualRecord, ForecastRecord, PredictionRecord, StoreError, ValidationRecord, ValidationStore,
};
