use async_trait::async_trait;
use tracing::{info, warn};

use super::{download_to_file, CollectionAgent, CollectionContext, CollectionResult, FileStatus};
use crate::fetch::FetchOptions;

/// Hawaiian regional WW3 bbox: 18-23°N, 199-206°E.
pub const HAWAII_BBOX: (f64, f64, f64, f64) = (199.0, 18.0, 206.0, 23.0);

/// WaveWatch III gridded forecast via ERDDAP CSV. The regional Hawaiian
/// aggregation is preferred; the global grid subset is the fallback when
/// the regional dataset is lagging or down.
pub struct WaveModelAgent {
    regional_url: String,
    global_url: String,
}

impl WaveModelAgent {
    pub fn new(regional_url: String, global_url: String) -> WaveModelAgent {
        WaveModelAgent {
            regional_url,
            global_url,
        }
    }

    /// ERDDAP griddap query for the most recent run constrained to a bbox:
    /// `?Thgt[(last)][(lat_min):(lat_max)][(lon_min):(lon_max)],...`
    pub fn erddap_query(dataset_url: &str, bbox: (f64, f64, f64, f64)) -> String {
        let (lon_min, lat_min, lon_max, lat_max) = bbox;
        let constraint = format!("[(last)][({lat_min}):({lat_max})][({lon_min}):({lon_max})]");
        format!("{dataset_url}.csv?Thgt{constraint},Tper{constraint},Tdir{constraint}")
    }
}

impl Default for WaveModelAgent {
    fn default() -> Self {
        WaveModelAgent::new(
            Self::erddap_query(
                "https://pae-paha.pacioos.hawaii.edu/erddap/griddap/ww3_hawaii",
                HAWAII_BBOX,
            ),
            Self::erddap_query(
                "https://pae-paha.pacioos.hawaii.edu/erddap/griddap/ww3_global",
                HAWAII_BBOX,
            ),
        )
    }
}

#[async_trait]
impl CollectionAgent for WaveModelAgent {
    fn name(&self) -> &'static str {
        "wave_model"
    }

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult {
        let mut result = CollectionResult::new(self.name());
        let options = FetchOptions::default();

        let mut regional = download_to_file(
            ctx,
            &self.regional_url,
            "ww3_hawaii.csv",
            "WW3 Hawaiian regional gridded forecast",
            "pacioos_ww3",
            "csv",
            &options,
        )
        .await;
        regional
            .extra
            .insert("grid".into(), serde_json::Value::from("regional"));

        if regional.status == FileStatus::Success {
            result.push(regional);
            info!(agent = self.name(), "regional grid collected");
            return result;
        }

        warn!(agent = self.name(), "regional grid unavailable, trying global");
        result.push(regional);

        let mut global = download_to_file(
            ctx,
            &self.global_url,
            "ww3_global.csv",
            "WW3 global grid, Hawaiian subset",
            "pacioos_ww3",
            "csv",
            &options,
        )
        .await;
        global
            .extra
            .insert("grid".into(), serde_json::Value::from("global"));
        result.push(global);

        result
    }
}
