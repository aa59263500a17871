//! Run directory persistence.
//!
//! A run directory holds everything one archive run needs to resume:
//! `manifest.jobs.json` (the job list), `manifest.raw.json` (optional source
//! metadata), `run.json` (run metadata), `download-archive.txt` (the tool's
//! dedup archive), per-job logs under `logs/`, and the `.run.lock` marker.
//! Every state file is replaced atomically.

mod error;
pub mod fs;
mod lock;
mod manifest;
mod merge;
mod meta;

pub use error::StoreError;
pub use lock::{read_lock_owner, LockError, LockOwner, RunLock, LOCK_DIR_NAME};
pub use manifest::{load_run_manifest, read_manifest, write_manifest};
pub use merge::{
    create_run, import_job_list, merge_jobs, normalize_source_url, read_job_list, sanitize_id,
    JobList, MergeOutcome,
};
pub use meta::{
    find_run_for_source, latest_run_dir, list_run_dirs, load_run_meta, resolve_run_dir,
    snapshot_run_meta, RunMeta,
};

use std::path::{Path, PathBuf};

pub const JOBS_MANIFEST_FILE: &str = "manifest.jobs.json";
pub const RAW_MANIFEST_FILE: &str = "manifest.raw.json";
pub const RUN_META_FILE: &str = "run.json";
pub const ARCHIVE_FILE: &str = "download-archive.txt";
pub const LOGS_DIR: &str = "logs";
pub const DOWNLOADS_DIR: &str = "downloads";

/// Well-known paths inside one run directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub jobs_manifest: PathBuf,
    pub raw_manifest: PathBuf,
    pub run_meta: PathBuf,
    pub archive: PathBuf,
    pub logs: PathBuf,
    pub default_output: PathBuf,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            jobs_manifest: root.join(JOBS_MANIFEST_FILE),
            raw_manifest: root.join(RAW_MANIFEST_FILE),
            run_meta: root.join(RUN_META_FILE),
            archive: root.join(ARCHIVE_FILE),
            logs: root.join(LOGS_DIR),
            default_output: root.join(DOWNLOADS_DIR),
            root,
        }
    }

    /// Base name of the run directory, used as the fallback run id.
    pub fn dir_name(&self) -> String {
        dir_name(&self.root)
    }
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
