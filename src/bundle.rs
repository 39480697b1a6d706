use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_MEMBER_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_MAX_COMPRESSION_RATIO: f64 = 100.0;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle io failure: {0}")]
    Io(#[from] io::Error),
    #[error("archive violation in {archive}: {reason}")]
    Security { archive: String, reason: String },
    #[error("unreadable archive {archive}: {reason}")]
    Malformed { archive: String, reason: String },
    #[error("metadata serialization: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ArchiveLimits {
    pub max_member_bytes: u64,
    pub max_total_bytes: u64,
    pub max_compression_ratio: f64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        ArchiveLimits {
            max_member_bytes: DEFAULT_MAX_MEMBER_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_compression_ratio: DEFAULT_MAX_COMPRESSION_RATIO,
        }
    }
}

/// One collection run's content-addressed directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_id: String,
    pub path: PathBuf,
}

impl Bundle {
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join("metadata.json")
    }
}

/// Owns the on-disk layout `<data_root>/<bundle_id>/<agent>/<files>` plus
/// archive extraction and retention.
pub struct BundleManager {
    data_root: PathBuf,
    limits: ArchiveLimits,
}

impl BundleManager {
    pub fn new(data_root: impl Into<PathBuf>, limits: ArchiveLimits) -> BundleManager {
        BundleManager {
            data_root: data_root.into(),
            limits,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn create_bundle(&self) -> Result<Bundle, BundleError> {
        let bundle_id = Uuid::new_v4().to_string();
        let path = self.data_root.join(&bundle_id);
        fs::create_dir_all(&path)?;
        info!(%bundle_id, path = %path.display(), "bundle created");
        Ok(Bundle { bundle_id, path })
    }

    pub fn open_bundle(&self, bundle_id: &str) -> Result<Bundle, BundleError> {
        let path = self.data_root.join(bundle_id);
        if !path.is_dir() {
            return Err(BundleError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no bundle {bundle_id}"),
            )));
        }
        Ok(Bundle {
            bundle_id: bundle_id.to_string(),
            path,
        })
    }

    pub fn agent_dir(&self, bundle: &Bundle, agent: &str) -> Result<PathBuf, BundleError> {
        let dir = bundle.path.join(agent);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn write_metadata(
        &self,
        bundle: &Bundle,
        metadata: &serde_json::Value,
    ) -> Result<(), BundleError> {
        let serialized = serde_json::to_string_pretty(metadata)?;
        fs::write(bundle.metadata_path(), serialized)?;
        Ok(())
    }

    pub fn read_metadata(&self, bundle: &Bundle) -> Result<serde_json::Value, BundleError> {
        let raw = fs::read_to_string(bundle.metadata_path())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Bundle ids under the data root, newest first by directory mtime.
    pub fn list_bundles(&self) -> Result<Vec<String>, BundleError> {
        let mut entries: Vec<(String, std::time::SystemTime)> = vec![];
        if !self.data_root.is_dir() {
            return Ok(vec![]);
        }
        for entry in fs::read_dir(&self.data_root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name == "archive" {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push((name, modified));
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(entries.into_iter().map(|(name, _)| name).collect())
    }

    /// Moves bundles beyond the newest `keep` into the archive subtree.
    /// Nothing is deleted.
    pub fn apply_retention(&self, keep: usize) -> Result<usize, BundleError> {
        let bundles = self.list_bundles()?;
        let archive_root = self.data_root.join("archive");

        let mut moved = 0;
        for bundle_id in bundles.iter().skip(keep) {
            fs::create_dir_all(&archive_root)?;
            let from = self.data_root.join(bundle_id);
            let to = archive_root.join(bundle_id);
            fs::rename(&from, &to)?;
            moved += 1;
        }
        if moved > 0 {
            info!(moved, keep, "retention pass archived older bundles");
        }
        Ok(moved)
    }

    /// Extracts a zip archive after validating every member against the
    /// traversal, size, and compression-ratio limits. Validation runs to
    /// completion before the first byte is written, so a violation leaves
    /// the target untouched.
    pub fn extract_zip(
        &self,
        archive_path: &Path,
        target_dir: &Path,
    ) -> Result<Vec<PathBuf>, BundleError> {
        let archive_name = archive_path.display().to_string();
        let file = File::open(archive_path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| BundleError::Malformed {
                archive: archive_name.clone(),
                reason: e.to_string(),
            })?;

        // validation pass
        let mut cumulative: u64 = 0;
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| BundleError::Malformed {
                archive: archive_name.clone(),
                reason: e.to_string(),
            })?;

            if entry.is_dir() {
                continue;
            }

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                return Err(self.violation(&archive_name, "path escapes extraction directory"));
            };
            if relative.as_os_str().is_empty() {
                return Err(self.violation(&archive_name, "empty member name"));
            }

            let size = entry.size();
            if size > self.limits.max_member_bytes {
                return Err(self.violation(
                    &archive_name,
                    &format!("member {} exceeds size limit", relative.display()),
                ));
            }

            cumulative = cumulative.saturating_add(size);
            if cumulative > self.limits.max_total_bytes {
                return Err(self.violation(&archive_name, "cumulative uncompressed size limit"));
            }

            let compressed = entry.compressed_size();
            if compressed > 0 {
                let ratio = size as f64 / compressed as f64;
                if ratio > self.limits.max_compression_ratio {
                    return Err(self.violation(
                        &archive_name,
                        &format!(
                            "member {} compression ratio {ratio:.0}x",
                            relative.display()
                        ),
                    ));
                }
            }
        }

        // extraction pass
        let mut written = vec![];
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| BundleError::Malformed {
                archive: archive_name.clone(),
                reason: e.to_string(),
            })?;
            if entry.is_dir() {
                continue;
            }
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                continue;
            };

            let destination = target_dir.join(&relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }

            let declared = entry.size();
            let mut out = File::create(&destination)?;
            // a lying local header cannot stream past its declared size
            io::copy(&mut (&mut entry).take(declared), &mut out)?;
            written.push(destination);
        }

        Ok(written)
    }

    /// Validate-then-extract for gzipped tarballs. The ratio guard compares
    /// the cumulative declared entry sizes to the compressed file size.
    pub fn extract_tar_gz(
        &self,
        archive_path: &Path,
        target_dir: &Path,
    ) -> Result<Vec<PathBuf>, BundleError> {
        let archive_name = archive_path.display().to_string();
        let compressed_size = fs::metadata(archive_path)?.len().max(1);

        // validation pass
        let mut cumulative: u64 = 0;
        {
            let file = File::open(archive_path)?;
            let mut archive = tar::Archive::new(GzDecoder::new(file));
            let entries = archive.entries().map_err(|e| BundleError::Malformed {
                archive: archive_name.clone(),
                reason: e.to_string(),
            })?;

            for entry in entries {
                let entry = entry.map_err(|e| BundleError::Malformed {
                    archive: archive_name.clone(),
                    reason: e.to_string(),
                })?;

                let path = entry.path().map_err(|e| BundleError::Malformed {
                    archive: archive_name.clone(),
                    reason: e.to_string(),
                })?;
                let escapes = path.is_absolute()
                    || path
                        .components()
                        .any(|c| matches!(c, std::path::Component::ParentDir));
                if escapes {
                    return Err(
                        self.violation(&archive_name, "path escapes extraction directory")
                    );
                }

                let size = entry.header().size().unwrap_or(0);
                if size > self.limits.max_member_bytes {
                    return Err(self.violation(&archive_name, "member exceeds size limit"));
                }
                cumulative = cumulative.saturating_add(size);
                if cumulative > self.limits.max_total_bytes {
                    return Err(self.violation(&archive_name, "cumulative uncompressed size limit"));
                }
            }

            let ratio = cumulative as f64 / compressed_size as f64;
            if ratio > self.limits.max_compression_ratio {
                return Err(self.violation(
                    &archive_name,
                    &format!("archive compression ratio {ratio:.0}x"),
                ));
            }
        }

        // extraction pass
        let file = File::open(archive_path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let entries = archive.entries().map_err(|e| BundleError::Malformed {
            archive: archive_name.clone(),
            reason: e.to_string(),
        })?;

        let mut written = vec![];
        for entry in entries {
            let mut entry = entry.map_err(|e| BundleError::Malformed {
                archive: archive_name.clone(),
                reason: e.to_string(),
            })?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .map_err(|e| BundleError::Malformed {
                    archive: archive_name.clone(),
                    reason: e.to_string(),
                })?
                .to_path_buf();

            if entry.unpack_in(target_dir).map_err(BundleError::Io)? {
                written.push(target_dir.join(relative));
            } else {
                warn!(archive = %archive_name, member = %relative.display(), "member skipped during unpack");
            }
        }

        Ok(written)
    }

    fn violation(&self, archive: &str, reason: &str) -> BundleError {
        error!(archive, reason, "archive rejected");
        BundleError::Security {
            archive: archive.to_string(),
            reason: reason.to_string(),
        }
    }
}
