//! Run entry point: startup repair, dispatch loop, and final summary.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use super::options::RunOptions;
use super::order::ordered_job_indexes;
use super::progress::RunEvent;
use super::reconcile::{prune_download_archive, reconcile_completed_with_disk, reset_stale_running};
use super::state::{RunState, Shared};
use super::worker::run_worker;
use crate::downloader::Downloader;
use crate::estimate::SizeEstimator;
use crate::runstore::{
    fs as store_fs, load_run_manifest, load_run_meta, snapshot_run_meta, write_manifest, RunLock,
    RunPaths,
};

/// Outcome of one `run` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Jobs this invocation attempted.
    pub processed: usize,
    pub completed: usize,
    pub failed_retryable: usize,
    pub failed_permanent: usize,
    pub pending: usize,
    pub skipped_private: usize,
    /// Jobs a later run can still pick up.
    pub remaining: usize,
    pub estimated_total_bytes: u64,
    pub estimated_completed_bytes: u64,
    pub stopped_on_retryable: bool,
}

/// Run every runnable job of `opts.run_dir` through `downloader`.
///
/// Holds the run lock for the whole call. Per-job failures are recorded in
/// the manifest; only lock contention, invalid configuration, persistence
/// failures and invalid transitions are returned as errors.
pub async fn run(
    opts: RunOptions,
    downloader: Arc<dyn Downloader>,
    events: Option<mpsc::Sender<RunEvent>>,
) -> Result<RunSummary> {
    let opts = opts.normalized();
    opts.validate()?;

    let paths = RunPaths::new(&opts.run_dir);
    let mut lock = RunLock::acquire(&paths.root)?;

    let mut manifest = load_run_manifest(&paths).context("load jobs manifest")?;
    let interrupted = reset_stale_running(&mut manifest)?;
    if interrupted > 0 {
        tracing::info!(interrupted, "reset jobs left running by an earlier run");
    }
    manifest.recompute_counters();
    write_manifest(&paths.jobs_manifest, &manifest).context("persist jobs manifest")?;

    let output_dir = resolve_output_dir(&opts, &paths);
    store_fs::mkdir(&output_dir)?;
    let missing = reconcile_completed_with_disk(&mut manifest, &output_dir)?;
    if !missing.is_empty() {
        let pruned = prune_download_archive(&paths.archive, &missing)?;
        tracing::info!(
            missing = missing.len(),
            pruned,
            "completed jobs without local media returned to pending"
        );
    }
    manifest.recompute_counters();
    write_manifest(&paths.jobs_manifest, &manifest).context("persist jobs manifest")?;
    snapshot_run_meta(&paths, &manifest, Some(&output_dir)).context("save run metadata")?;

    let estimator = SizeEstimator::load(&paths.raw_manifest, &manifest.jobs, &opts.quality);
    store_fs::mkdir(&paths.logs)?;

    let order = ordered_job_indexes(&manifest.jobs, opts.order);
    tracing::info!(
        run_id = %manifest.run_id,
        total = manifest.counts.total,
        remaining = manifest.counts.remaining(),
        workers = opts.workers,
        order = opts.order.as_str(),
        "starting run"
    );

    let workers = opts.workers;
    let shared = Arc::new(Shared::new(
        opts,
        output_dir,
        downloader,
        estimator,
        events,
        RunState {
            manifest,
            paths: paths.clone(),
        },
    ));
    {
        let state = shared.state.lock().await;
        shared.emit_totals(&state.manifest);
    }

    let (tx, rx) = mpsc::channel::<usize>(1);
    let queue = Arc::new(Mutex::new(rx));
    let mut pool = JoinSet::new();
    for worker in 1..=workers {
        pool.spawn(run_worker(worker, Arc::clone(&shared), Arc::clone(&queue)));
    }

    let dispatched = dispatch(&shared, &order, tx).await;
    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            shared.set_fatal(anyhow::anyhow!("worker task failed: {}", e));
        }
    }
    if let Some(err) = shared.take_fatal() {
        return Err(err);
    }

    let summary = {
        let mut state = shared.state.lock().await;
        state.persist().context("persist jobs manifest")?;
        snapshot_run_meta(&paths, &state.manifest, Some(&shared.output_dir))
            .context("save run metadata")?;
        let counts = state.manifest.counts;
        RunSummary {
            run_id: state.manifest.run_id.clone(),
            run_dir: paths.root.clone(),
            output_dir: shared.output_dir.clone(),
            processed: shared.processed.load(Ordering::SeqCst),
            completed: counts.completed,
            failed_retryable: counts.failed_retryable,
            failed_permanent: counts.failed_permanent,
            pending: counts.pending,
            skipped_private: counts.skipped_private,
            remaining: counts.remaining(),
            estimated_total_bytes: shared.estimator.total_bytes(),
            estimated_completed_bytes: shared.estimator.completed_bytes(&state.manifest.jobs),
            stopped_on_retryable: shared.stopped_on_retryable(),
        }
    };
    lock.release()?;

    tracing::info!(
        run_id = %summary.run_id,
        dispatched,
        processed = summary.processed,
        completed = summary.completed,
        remaining = summary.remaining,
        "run finished"
    );
    Ok(summary)
}

/// Explicit option, then the directory remembered in `run.json`, then
/// `<run_dir>/downloads`.
fn resolve_output_dir(opts: &RunOptions, paths: &RunPaths) -> PathBuf {
    if let Some(dir) = &opts.output_dir {
        return dir.clone();
    }
    match load_run_meta(&paths.root) {
        Ok(meta) => meta
            .output_dir
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| paths.default_output.clone()),
        Err(e) => {
            if !e.is_not_found() {
                tracing::warn!(
                    run_dir = %paths.root.display(),
                    "ignoring unreadable run metadata: {:#}",
                    anyhow::Error::from(e)
                );
            }
            paths.default_output.clone()
        }
    }
}

/// Hand runnable positions to the workers in order. Returns how many were
/// dispatched. Dropping `tx` at the end closes the queue.
async fn dispatch(shared: &Shared, order: &[usize], tx: mpsc::Sender<usize>) -> usize {
    let max_jobs = shared.opts.max_jobs;
    let mut dispatched = 0;
    for &position in order {
        if shared.stop_requested() {
            break;
        }
        if max_jobs > 0 && dispatched >= max_jobs {
            break;
        }
        let runnable = {
            let state = shared.state.lock().await;
            state
                .manifest
                .jobs
                .get(position)
                .is_some_and(|job| job.status.is_runnable(shared.opts.retry_permanent))
        };
        if !runnable {
            continue;
        }
        if tx.send(position).await.is_err() {
            break;
        }
        dispatched += 1;
    }
    dispatched
}
