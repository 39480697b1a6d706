pub mod altimetry;
pub mod buoy;
pub mod endpoints;
pub mod model;
pub mod nearshore;
pub mod upper_air;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::bundle::Bundle;
use crate::fetch::{FetchOptions, Fetcher};
use crate::swell::Metadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    Failed,
}

/// Metadata record for one collected file, successful or not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub description: String,
    pub source: String,
    pub status: FileStatus,
    pub timestamp: DateTime<Utc>,
    pub source_url: String,
    pub file_path: Option<PathBuf>,
    pub size_bytes: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub extra: Metadata,
}

/// Aggregate counts are the agent contract; per-file ordering is not.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollectionResult {
    pub agent: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub files: Vec<FileRecord>,
    pub size_bytes: u64,
}

impl CollectionResult {
    pub fn new(agent: &str) -> CollectionResult {
        CollectionResult {
            agent: agent.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, record: FileRecord) {
        self.total += 1;
        match record.status {
            FileStatus::Success => {
                self.successful += 1;
                self.size_bytes += record.size_bytes;
            }
            FileStatus::Failed => self.failed += 1,
        }
        self.files.push(record);
    }
}

/// Shared state handed to each agent for one collection run.
pub struct CollectionContext<'a> {
    pub fetcher: &'a Fetcher,
    pub bundle: &'a Bundle,
    pub agent_dir: PathBuf,
    pub now: DateTime<Utc>,
}

/// The one seam between the orchestrator and any data provider. New
/// providers implement this; nothing dispatches on concrete agent types.
#[async_trait]
pub trait CollectionAgent: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(&self, ctx: &CollectionContext<'_>) -> CollectionResult;
}

/// Fetches one URL into the agent directory, producing a success or
/// failure record. Individual failures never abort an agent.
pub async fn download_to_file(
    ctx: &CollectionContext<'_>,
    url: &str,
    file_name: &str,
    description: &str,
    source: &str,
    file_type: &str,
    options: &FetchOptions,
) -> FileRecord {
    let mut record = FileRecord {
        name: file_name.to_string(),
        description: description.to_string(),
        source: source.to_string(),
        status: FileStatus::Failed,
        timestamp: ctx.now,
        source_url: url.to_string(),
        file_path: None,
        size_bytes: 0,
        file_type: file_type.to_string(),
        extra: Metadata::new(),
    };

    let bytes = match ctx.fetcher.fetch(url, options).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(url, error = %e, "download failed");
            record
                .extra
                .insert("error".into(), serde_json::Value::from(e.to_string()));
            return record;
        }
    };

    let path = ctx.agent_dir.join(file_name);
    match fs::write(&path, &bytes).await {
        Ok(()) => {
            debug!(url, path = %path.display(), bytes = bytes.len(), "file collected");
            record.status = FileStatus::Success;
            record.size_bytes = bytes.len() as u64;
            record.file_path = Some(path);
        }
        Err(e) => {
            warn!(url, error = %e, "unable to persist download");
            record
                .extra
                .insert("error".into(), serde_json::Value::from(e.to_string()));
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: FileStatus, size: u64) -> FileRecord {
        FileRecord {
            name: "x".into(),
            description: String::new(),
            source: "test".into(),
            status,
            timestamp: Utc::now(),
            source_url: String::new(),
            file_path: None,
            size_bytes: size,
            file_type: "text".into(),
            extra: Metadata::new(),
        }
    }

    #[test]
    fn test_aggregate_counts() {
        let mut result = CollectionResult::new("buoys");
        result.push(record(FileStatus::Success, 100));
        result.push(record(FileStatus::Success, 50));
        result.push(record(FileStatus::Failed, 0));

        assert_eq!(result.total, 3);
        assert_eq!(result.successful, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.size_bytes, 150);
    }
}
