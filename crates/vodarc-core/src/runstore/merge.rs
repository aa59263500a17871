//! Creating runs and merging a freshly discovered job list into one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::fs as store_fs;
use super::lock::RunLock;
use super::manifest::{load_run_manifest, write_manifest};
use super::meta::{find_run_for_source, snapshot_run_meta};
use super::RunPaths;
use crate::model::{can_transition, Job, JobStatus, Manifest, SourceInfo};

/// Result of creating or merging into a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub run_dir: PathBuf,
    pub run_id: String,
    pub total: usize,
    /// Records that did not exist in the run before.
    pub added: usize,
    pub pending: usize,
    pub skipped_private: usize,
}

impl MergeOutcome {
    fn new(paths: &RunPaths, manifest: &Manifest, added: usize) -> Self {
        Self {
            run_dir: paths.root.clone(),
            run_id: manifest.run_id.clone(),
            total: manifest.counts.total,
            added,
            pending: manifest.counts.pending,
            skipped_private: manifest.counts.skipped_private,
        }
    }
}

/// A discovered job list, as handed over by whatever enumerated the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    #[serde(flatten)]
    pub source: SourceInfo,
    pub jobs: Vec<Job>,
}

pub fn read_job_list(path: &Path) -> Result<JobList> {
    let list: JobList = store_fs::read_json(path)?;
    Ok(list)
}

/// Load the job list at `list_path` into a run: `into` if given, otherwise
/// the latest run of the same source unless `fresh`, otherwise a new run
/// under `runs_dir`. `raw_path` is stored as the run's raw source metadata.
pub fn import_job_list(
    runs_dir: &Path,
    list_path: &Path,
    raw_path: Option<&Path>,
    into: Option<&Path>,
    fresh: bool,
) -> Result<MergeOutcome> {
    let list = read_job_list(list_path)
        .with_context(|| format!("read job list {}", list_path.display()))?;
    let raw = match raw_path {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("read raw metadata {}", path.display()))?,
        ),
        None => None,
    };

    let existing = match into {
        Some(dir) => Some(dir.to_path_buf()),
        None if fresh => None,
        None => find_run_for_source(runs_dir, &list.source.url)?,
    };
    match existing {
        Some(dir) => merge_jobs(&dir, Some(list.source), list.jobs, raw.as_deref()),
        None => create_run(runs_dir, list.source, list.jobs, raw.as_deref()),
    }
}

/// Create a new run directory under `runs_dir` named
/// `<UTC timestamp>_<sanitized source id>`.
pub fn create_run(
    runs_dir: &Path,
    source: SourceInfo,
    jobs: Vec<Job>,
    raw: Option<&[u8]>,
) -> Result<MergeOutcome> {
    check_initial(&jobs)?;

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let run_id = format!("{}_{}", stamp, sanitize_id(&source.id));
    let paths = RunPaths::new(runs_dir.join(&run_id));
    std::fs::create_dir_all(runs_dir)
        .with_context(|| format!("create runs dir {}", runs_dir.display()))?;
    std::fs::create_dir(&paths.root)
        .with_context(|| format!("create run dir {}", paths.root.display()))?;

    if let Some(raw) = raw {
        store_fs::write_bytes(&paths.raw_manifest, raw)?;
    }
    let added = jobs.len();
    let manifest = Manifest::new(run_id, source, jobs);
    write_manifest(&paths.jobs_manifest, &manifest)?;
    snapshot_run_meta(&paths, &manifest, None)?;

    tracing::info!(
        run_dir = %paths.root.display(),
        total = manifest.counts.total,
        "created run"
    );
    Ok(MergeOutcome::new(&paths, &manifest, added))
}

/// Replace the job list of an existing run with `incoming`, carrying over the
/// progress of records that share an `item_id`. Holds the run lock while it
/// works, so it cannot race a scheduler on the same directory.
pub fn merge_jobs(
    run_dir: &Path,
    source: Option<SourceInfo>,
    incoming: Vec<Job>,
    raw: Option<&[u8]>,
) -> Result<MergeOutcome> {
    check_initial(&incoming)?;

    let mut lock = RunLock::acquire(run_dir)?;
    let paths = RunPaths::new(run_dir);
    let mut manifest = load_run_manifest(&paths).context("load jobs manifest")?;

    let mut existing: HashMap<String, Job> = manifest
        .jobs
        .drain(..)
        .map(|job| (job.item_id.clone(), job))
        .collect();

    let mut added = 0;
    let mut merged = Vec::with_capacity(incoming.len());
    for new in incoming {
        match existing.remove(&new.item_id) {
            Some(old) => merged.push(carry_over(old, new)?),
            None => {
                added += 1;
                merged.push(new);
            }
        }
    }
    if !existing.is_empty() {
        tracing::debug!(dropped = existing.len(), "records absent from the new job list");
    }

    manifest.jobs = merged;
    if let Some(source) = source {
        manifest.source = source;
    }
    manifest.generated_at = crate::model::now_rfc3339();
    manifest.recompute_counters();

    if let Some(raw) = raw {
        store_fs::write_bytes(&paths.raw_manifest, raw)?;
    }
    write_manifest(&paths.jobs_manifest, &manifest)?;
    snapshot_run_meta(&paths, &manifest, None)?;
    lock.release()?;

    tracing::info!(run_dir = %run_dir.display(), added, total = manifest.counts.total, "merged jobs");
    Ok(MergeOutcome::new(&paths, &manifest, added))
}

fn check_initial(jobs: &[Job]) -> Result<()> {
    for job in jobs {
        if !can_transition(None, job.status) {
            anyhow::bail!(
                "new job {} must be pending or skipped_private, got {}",
                job.job_id,
                job.status
            );
        }
    }
    Ok(())
}

/// Keep the old record's progress, refreshed with the new identity fields.
fn carry_over(mut old: Job, new: Job) -> Result<Job> {
    old.job_id = new.job_id;
    old.index = new.index;
    if !new.title.is_empty() {
        old.title = new.title;
    }
    if !new.item_url.is_empty() {
        old.item_url = new.item_url;
    }

    if old.status == JobStatus::Running {
        old.transition(JobStatus::FailedRetryable, "interrupted_previous_run")?;
    }
    match (new.status, old.status) {
        (JobStatus::SkippedPrivate, status) if status != JobStatus::Completed => {
            old.transition(JobStatus::SkippedPrivate, "private_or_unavailable")?;
        }
        (JobStatus::Pending, JobStatus::SkippedPrivate) => {
            old.transition(JobStatus::Pending, "")?;
        }
        _ => {}
    }
    Ok(old)
}

/// Replace every run of characters outside `[A-Za-z0-9._-]` with one `_`.
pub fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    if out.is_empty() {
        "source".to_string()
    } else {
        out
    }
}

/// Canonical form of a source URL for matching runs: no fragment and no
/// trailing slash. Unparseable input is only trimmed.
pub fn normalize_source_url(raw: &str) -> String {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => raw.trim_end_matches('/').to_string(),
    }
}
