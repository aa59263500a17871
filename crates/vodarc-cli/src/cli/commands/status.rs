//! `vodarc status` – counts, size estimate and failures of one run.

use anyhow::{Context, Result};
use std::path::Path;
use vodarc_core::config::VodConfig;
use vodarc_core::estimate::{format_bytes_iec, SizeEstimator};
use vodarc_core::model::{Job, JobStatus, Manifest};
use vodarc_core::runstore::{
    load_run_manifest, load_run_meta, read_lock_owner, RunPaths, LOCK_DIR_NAME,
};

pub fn run_status(cfg: &VodConfig, run_dir: &Path, json: bool, failures: bool) -> Result<()> {
    let paths = RunPaths::new(run_dir);
    let manifest = load_run_manifest(&paths)
        .with_context(|| format!("load run {}", run_dir.display()))?;
    let estimator = SizeEstimator::load(&paths.raw_manifest, &manifest.jobs, &cfg.quality);
    let output_dir = load_run_meta(run_dir).ok().and_then(|meta| meta.output_dir);
    let locked = paths.root.join(LOCK_DIR_NAME).exists();
    let owner = read_lock_owner(&paths.root);

    if json {
        let doc = serde_json::json!({
            "run_id": manifest.run_id,
            "run_dir": paths.root,
            "source": manifest.source,
            "counts": manifest.counts,
            "remaining": manifest.counts.remaining(),
            "estimated_total_bytes": estimator.total_bytes(),
            "estimated_completed_bytes": estimator.completed_bytes(&manifest.jobs),
            "output_dir": output_dir,
            "locked": locked,
            "lock_owner": owner,
            "failures": if failures { failures_json(&manifest) } else { Vec::new() },
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let c = &manifest.counts;
    println!("run {} ({})", manifest.run_id, paths.root.display());
    if !manifest.source.url.is_empty() {
        println!("  source:     {} [{}]", manifest.source.url, manifest.source.kind);
    }
    if let Some(dir) = &output_dir {
        println!("  output:     {}", dir.display());
    }
    println!("  total:      {}", c.total);
    for status in JobStatus::ALL {
        println!("  {:<18} {}", status.as_str(), c.get(status));
    }
    println!("  remaining:  {}", c.remaining());
    if estimator.has_estimate() {
        println!(
            "  size:       {} of ~{}",
            format_bytes_iec(estimator.completed_bytes(&manifest.jobs)),
            format_bytes_iec(estimator.total_bytes())
        );
    }
    match (locked, owner) {
        (true, Some(o)) => println!(
            "  locked by pid {} on {} since {}",
            o.pid,
            if o.hostname.is_empty() { "?" } else { o.hostname.as_str() },
            o.created_at
        ),
        (true, None) => println!("  locked (owner unknown)"),
        _ => {}
    }

    if failures {
        let failed = failed_jobs(&manifest);
        if failed.is_empty() {
            println!("No failed jobs.");
        }
        for (job, error) in failed {
            println!(
                "#{:04} {:<14} {:<26} {}",
                job.index, job.item_id, job.reason, error
            );
        }
    }
    Ok(())
}

/// Failed jobs with the most telling line of their last error.
fn failed_jobs(manifest: &Manifest) -> Vec<(&Job, &str)> {
    manifest
        .jobs
        .iter()
        .filter(|j| matches!(j.status, JobStatus::FailedRetryable | JobStatus::FailedPermanent))
        .map(|j| (j, error_summary(j.last_error.as_deref().unwrap_or(""))))
        .collect()
}

fn failures_json(manifest: &Manifest) -> Vec<serde_json::Value> {
    failed_jobs(manifest)
        .into_iter()
        .map(|(job, error)| {
            serde_json::json!({
                "index": job.index,
                "item_id": job.item_id,
                "status": job.status,
                "reason": job.reason,
                "error": error,
            })
        })
        .collect()
}

/// First non-empty line that is not the generic exit-status header.
fn error_summary(error: &str) -> &str {
    error
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("yt-dlp failed"))
        .unwrap_or("")
}
