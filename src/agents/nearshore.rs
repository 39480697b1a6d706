use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{download_to_file, CollectionAgent, CollectionContext, CollectionResult, FileStatus};
use crate::fetch::FetchOptions;

/// One nearshore wave buoy: a CDIP station id, and the NDBC id the same
/// mooring reports under when the THREDDS path is down.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NearshoreStation {
    pub cdip_id: String,
    pub ndbc_id: Option<String>,
    pub name: String,
}

/// CDIP nearshore collection. The primary payload is the realtime THREDDS
/// NetCDF, which runs 30-75 MB and routinely times out; a timeout is a
/// normal reason to fall back to the mapped NDBC text feed, not a failure
/// of the run.
pub struct NearshoreAgent {
    stations: Vec<NearshoreStation>,
    netcdf_timeout: Duration,
}

impl NearshoreAgent {
    pub fn new(stations: Vec<NearshoreStation>, netcdf_timeout: Duration) -> NearshoreAgent {
        NearshoreAgent {
            stations,
            netcdf_timeout,
        }
    }

    fn thredds_url(station: &NearshoreStation) -> String {
        format!(
            "https://thredds.cdip.ucsd.edu/thredds/fileServer/cdip/realtime/{}p1_rt.nc",
            station.cdip_id
        )
    }

    fn ndbc_url(ndbc_id: &str) -> String {
        format!("https://www.ndbc.noaa.gov/data/realtime2/{ndbc_id}.txt")
    }
}

impl Default for NearshoreAgent {
    fn default() -> Self {
        NearshoreAgent::new(
            vec![
                NearshoreStation {
                    cdip_id: "106".into(),
                    ndbc_id: Some("51201".into()),
                    name: "Waimea Bay".into(),
                },
                NearshoreStation {
                    cdip_id: "098".into(),
                    ndbc_id: Some("51202".into()),
                    name: "Mokapu Point".into(),
                },
                NearshoreStation {
                    cdip_id: "225".into(),
                    ndbc_id: Some("51208".into()),
                    name: "Hanalei".into(),
                },
            ],
            Duration::from_secs(60),
        )
    }
}

#[async_trait]
impl CollectionAgent for NearshoreAgent {
    fn name(&self) -> &'static str {
        "nearshore"
    }

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult {
        let mut result = CollectionResult::new(self.name());

        for station in &self.stations {
            let netcdf_options = FetchOptions {
                timeout: self.netcdf_timeout,
                ..Default::default()
            };

            let mut record = download_to_file(
                ctx,
                &Self::thredds_url(station),
                &format!("{}p1_rt.nc", station.cdip_id),
                &format!("CDIP realtime spectra for {}", station.name),
                "cdip",
                "netcdf",
                &netcdf_options,
            )
            .await;
            record
                .extra
                .insert("fallback_used".into(), serde_json::Value::from(false));

            if record.status == FileStatus::Success {
                result.push(record);
                continue;
            }

            let Some(ndbc_id) = &station.ndbc_id else {
                warn!(station = %station.cdip_id, "no NDBC fallback mapped");
                result.push(record);
                continue;
            };

            info!(
                station = %station.cdip_id,
                ndbc_id = %ndbc_id,
                "THREDDS unavailable, falling back to NDBC text"
            );
            let mut fallback = download_to_file(
                ctx,
                &Self::ndbc_url(ndbc_id),
                &format!("{ndbc_id}.txt"),
                &format!("NDBC fallback for {}", station.name),
                "ndbc",
                "text",
                &FetchOptions::default(),
            )
            .await;
            fallback
                .extra
                .insert("fallback_used".into(), serde_json::Value::from(true));
            fallback.extra.insert(
                "cdip_station".into(),
                serde_json::Value::from(station.cdip_id.clone()),
            );
            result.push(fallback);
        }

        result
    }
}
