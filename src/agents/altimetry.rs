use async_trait::async_trait;
use tracing::{info, warn};

use super::{CollectionAgent, CollectionContext, CollectionResult, FileRecord, FileStatus};
use crate::fetch::FetchOptions;
use crate::swell::Metadata;

/// Sea-surface-height altimetry. Modern ERDDAP `.graph?` URLs return a
/// rendered PNG directly; legacy endpoints ship zip/netCDF payloads that
/// the processing layer unpacks. Two mirrors, first success wins.
pub struct AltimetryAgent {
    mirrors: Vec<String>,
}

impl AltimetryAgent {
    pub fn new(mirrors: Vec<String>) -> AltimetryAgent {
        AltimetryAgent { mirrors }
    }

    fn is_graph_url(url: &str) -> bool {
        url.contains(".graph?")
    }

    fn file_name_for(url: &str) -> (&'static str, &'static str) {
        if Self::is_graph_url(url) {
            ("altimetry.png", "png")
        } else if url.ends_with(".zip") {
            ("altimetry.zip", "zip")
        } else {
            ("altimetry.nc", "netcdf")
        }
    }
}

impl Default for AltimetryAgent {
    fn default() -> Self {
        AltimetryAgent::new(vec![
            "https://coastwatch.pfeg.noaa.gov/erddap/griddap/nesdisSSH1day.graph?ssh[(last)][(15):(30)][(190):(210)]&.draw=surface".into(),
            "https://upwell.pfeg.noaa.gov/erddap/griddap/nesdisSSH1day.graph?ssh[(last)][(15):(30)][(190):(210)]&.draw=surface".into(),
        ])
    }
}

#[async_trait]
impl CollectionAgent for AltimetryAgent {
    fn name(&self) -> &'static str {
        "altimetry"
    }

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult {
        let mut result = CollectionResult::new(self.name());
        let options = FetchOptions::default();

        for (mirror_index, url) in self.mirrors.iter().enumerate() {
            let (file_name, file_type) = Self::file_name_for(url);

            let mut record = FileRecord {
                name: file_name.to_string(),
                description: "sea surface height altimetry".into(),
                source: "noaa_erddap".into(),
                status: FileStatus::Failed,
                timestamp: ctx.now,
                source_url: url.clone(),
                file_path: None,
                size_bytes: 0,
                file_type: file_type.to_string(),
                extra: Metadata::new(),
            };
            record
                .extra
                .insert("mirror".into(), serde_json::Value::from(mirror_index));

            let bytes = match ctx.fetcher.fetch(url, &options).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(%url, error = %e, "altimetry mirror failed");
                    record
                        .extra
                        .insert("error".into(), serde_json::Value::from(e.to_string()));
                    result.push(record);
                    continue;
                }
            };

            // a mirror error page is not a raster; reject it here instead
            // of poisoning the bundle
            if Self::is_graph_url(url) && image::guess_format(&bytes).is_err() {
                warn!(%url, "altimetry payload is not an image");
                record.extra.insert(
                    "error".into(),
                    serde_json::Value::from("response was not an image"),
                );
                result.push(record);
                continue;
            }

            let path = ctx.agent_dir.join(file_name);
            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => {
                    record.status = FileStatus::Success;
                    record.size_bytes = bytes.len() as u64;
                    record.file_path = Some(path);
                    result.push(record);
                    info!(agent = self.name(), mirror = mirror_index, "altimetry collected");
                    return result;
                }
                Err(e) => {
                    record
                        .extra
                        .insert("error".into(), serde_json::Value::from(e.to_string()));
                    result.push(record);
                }
            }
        }

        result
    }
}
