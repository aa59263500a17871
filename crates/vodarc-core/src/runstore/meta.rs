//! `run.json` metadata and run directory discovery.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::fs as store_fs;
use super::merge::normalize_source_url;
use super::{RunPaths, JOBS_MANIFEST_FILE};
use crate::model::{now_rfc3339, Manifest, SourceInfo};

/// Contents of `run.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
    #[serde(flatten)]
    pub source: SourceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_manifest_path: Option<PathBuf>,
    #[serde(default)]
    pub jobs_manifest_path: PathBuf,
    /// Output directory chosen the first time the run was executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub total_entries: usize,
    #[serde(default)]
    pub pending: usize,
    #[serde(default)]
    pub skipped_private: usize,
}

pub fn load_run_meta(run_dir: &Path) -> Result<RunMeta, StoreError> {
    store_fs::read_json(&RunPaths::new(run_dir).run_meta)
}

/// Refresh `run.json` from the manifest. A missing file is created; an
/// existing one keeps its `created_at` and, unless `output_dir` is given,
/// its output directory.
pub fn snapshot_run_meta(
    paths: &RunPaths,
    manifest: &Manifest,
    output_dir: Option<&Path>,
) -> Result<RunMeta, StoreError> {
    let mut meta = match store_fs::read_json::<RunMeta>(&paths.run_meta) {
        Ok(meta) => meta,
        Err(e) if e.is_not_found() => RunMeta::default(),
        Err(e) => return Err(e),
    };
    let now = now_rfc3339();
    if meta.created_at.is_empty() {
        meta.created_at = now.clone();
    }
    meta.updated_at = now;
    meta.run_id = manifest.run_id.clone();
    meta.source = manifest.source.clone();
    meta.jobs_manifest_path = paths.jobs_manifest.clone();
    if paths.raw_manifest.exists() {
        meta.raw_manifest_path = Some(paths.raw_manifest.clone());
    }
    if let Some(dir) = output_dir {
        meta.output_dir = Some(dir.to_path_buf());
    }
    meta.total_entries = manifest.counts.total;
    meta.pending = manifest.counts.pending;
    meta.skipped_private = manifest.counts.skipped_private;

    store_fs::write_json(&paths.run_meta, &meta)?;
    Ok(meta)
}

/// Run directories under `runs_dir` (those holding a jobs manifest), sorted
/// by name. Run ids start with a UTC timestamp, so this is creation order.
pub fn list_run_dirs(runs_dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(runs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io("list", runs_dir)(e)),
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.join(JOBS_MANIFEST_FILE).is_file())
        .collect();
    dirs.sort();
    Ok(dirs)
}

pub fn latest_run_dir(runs_dir: &Path) -> Result<Option<PathBuf>, StoreError> {
    Ok(list_run_dirs(runs_dir)?.pop())
}

/// Pick a run directory: an explicit path wins, then `runs_dir/<run_id>`,
/// then the latest run when `latest` is set.
pub fn resolve_run_dir(
    runs_dir: &Path,
    run_dir: Option<&Path>,
    run_id: Option<&str>,
    latest: bool,
) -> anyhow::Result<PathBuf> {
    if let Some(dir) = run_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(id) = run_id.map(str::trim).filter(|id| !id.is_empty()) {
        return Ok(runs_dir.join(id));
    }
    if latest {
        return latest_run_dir(runs_dir)?
            .ok_or_else(|| anyhow::anyhow!("no runs found in {}", runs_dir.display()));
    }
    anyhow::bail!("no run selected: pass a run directory, a run id, or --latest")
}

/// Most recent run whose recorded source URL matches `source_url`.
pub fn find_run_for_source(
    runs_dir: &Path,
    source_url: &str,
) -> Result<Option<PathBuf>, StoreError> {
    let wanted = normalize_source_url(source_url);
    if wanted.is_empty() {
        return Ok(None);
    }
    for dir in list_run_dirs(runs_dir)?.into_iter().rev() {
        let url = match load_run_meta(&dir) {
            Ok(meta) => meta.source.url,
            Err(_) => match store_fs::read_json::<Manifest>(&dir.join(JOBS_MANIFEST_FILE)) {
                Ok(manifest) => manifest.source.url,
                Err(e) => {
                    tracing::debug!(run_dir = %dir.display(), "skipping unreadable run: {:#}", anyhow::Error::from(e));
                    continue;
                }
            },
        };
        if normalize_source_url(&url) == wanted {
            return Ok(Some(dir));
        }
    }
    Ok(None)
}
