//! Worker task: claim a job, download it, record the outcome.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::progress::{JobOutcome, RunEvent};
use super::state::{RunState, Shared};
use crate::downloader::OutputSink;
use crate::model::{now_rfc3339, truncate_error, Job, JobStatus};
use crate::proxy::proxy_for_worker;
use crate::retry::classify;

const REASON_MISSING_URL: &str = "missing_video_url";
const REASON_LOG_FILE: &str = "log_file_error";
const STOP_NOTICE: &str = "stopping run after retryable failure; resume later to continue";

/// What a worker needs to know about a job it has moved to `running`.
struct Claim {
    index: u32,
    item_id: String,
    item_url: String,
    title: String,
    attempt: u32,
}

/// Pull job positions from the shared queue until it closes. Errors that
/// must abort the run are handed to [`Shared::set_fatal`].
pub(super) async fn run_worker(
    worker: usize,
    shared: Arc<Shared>,
    queue: Arc<Mutex<mpsc::Receiver<usize>>>,
) {
    let proxy = proxy_for_worker(worker, shared.opts.proxy_mode, &shared.opts.proxies)
        .map(str::to_string);
    loop {
        let next = queue.lock().await.recv().await;
        let Some(position) = next else {
            break;
        };
        if shared.stop_requested() {
            continue;
        }
        if let Err(err) = process_job(&shared, worker, position, proxy.as_deref()).await {
            shared.set_fatal(err);
        }
    }
    tracing::debug!(worker, "worker finished");
}

fn job_mut(state: &mut RunState, position: usize) -> Result<&mut Job> {
    state
        .manifest
        .jobs
        .get_mut(position)
        .ok_or_else(|| anyhow::anyhow!("job position {} out of range", position))
}

/// `logs/<index:04>_<id>.log`, with the id reduced to filename-safe chars.
fn log_file_name(index: u32, item_id: &str) -> String {
    let safe: String = item_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        format!("{:04}_unknown_{}.log", index, index)
    } else {
        format!("{:04}_{}.log", index, safe)
    }
}

/// Re-check runnability and move the job to `running` in one critical
/// section. `None` means the job was not started.
async fn claim_job(shared: &Shared, worker: usize, position: usize) -> Result<Option<Claim>> {
    let mut state = shared.state.lock().await;
    let job = job_mut(&mut state, position)?;
    if !job.status.is_runnable(shared.opts.retry_permanent) {
        return Ok(None);
    }
    let now = now_rfc3339();

    if job.item_url.trim().is_empty() {
        job.transition(JobStatus::FailedPermanent, REASON_MISSING_URL)?;
        job.attempts += 1;
        job.last_attempt_at = Some(now);
        job.set_last_error("item URL missing in manifest");
        let (index, item_id) = (job.index, job.item_id.clone());
        state.persist().context("persist jobs manifest")?;
        shared.processed.fetch_add(1, Ordering::SeqCst);
        shared.emit_totals(&state.manifest);
        drop(state);

        tracing::warn!(worker, index, item_id = %item_id, "job has no URL");
        shared.emit(RunEvent::JobFinished {
            worker,
            index,
            item_id,
            outcome: JobOutcome::Rejected {
                reason: REASON_MISSING_URL,
            },
        });
        return Ok(None);
    }

    job.transition(JobStatus::Running, "")?;
    job.attempts += 1;
    job.last_attempt_at = Some(now);
    let claim = Claim {
        index: job.index,
        item_id: job.item_id.clone(),
        item_url: job.item_url.clone(),
        title: job.title.clone(),
        attempt: job.attempts,
    };
    state.persist().context("persist jobs manifest")?;
    shared.processed.fetch_add(1, Ordering::SeqCst);
    shared.emit_totals(&state.manifest);
    Ok(Some(claim))
}

/// Apply a terminal status to a running job and persist it.
async fn record_outcome(
    shared: &Shared,
    position: usize,
    to: JobStatus,
    reason: &str,
    error: Option<&str>,
) -> Result<()> {
    let mut state = shared.state.lock().await;
    let job = job_mut(&mut state, position)?;
    job.transition(to, reason)?;
    match error {
        Some(message) => {
            job.set_last_error(message);
            job.completed_at = None;
        }
        None => {
            job.last_error = None;
            job.completed_at = Some(now_rfc3339());
        }
    }
    state.persist().context("persist jobs manifest")?;
    shared.emit_totals(&state.manifest);
    Ok(())
}

async fn process_job(
    shared: &Shared,
    worker: usize,
    position: usize,
    proxy: Option<&str>,
) -> Result<()> {
    let Some(claim) = claim_job(shared, worker, position).await? else {
        return Ok(());
    };
    tracing::info!(
        worker,
        index = claim.index,
        item_id = %claim.item_id,
        attempt = claim.attempt,
        "job started"
    );
    shared.emit(RunEvent::JobStarted {
        worker,
        index: claim.index,
        item_id: claim.item_id.clone(),
        title: claim.title.clone(),
        attempt: claim.attempt,
    });

    let log_path = shared.paths.logs.join(log_file_name(claim.index, &claim.item_id));
    let log = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            let message = format!("open job log {}: {}", log_path.display(), e);
            record_outcome(shared, position, JobStatus::FailedPermanent, REASON_LOG_FILE, Some(&message))
                .await?;
            tracing::warn!(worker, item_id = %claim.item_id, "{}", message);
            shared.emit(RunEvent::JobFinished {
                worker,
                index: claim.index,
                item_id: claim.item_id,
                outcome: JobOutcome::Rejected {
                    reason: REASON_LOG_FILE,
                },
            });
            return Ok(());
        }
    };

    let sink = OutputSink::new(worker, claim.index, Some(log), shared.events.clone());
    let request = shared.request_for(&claim.item_url, proxy);
    let result = shared.downloader.download(&request, &sink).await;

    let failure = match result {
        Ok(()) => {
            record_outcome(shared, position, JobStatus::Completed, "", None).await?;
            tracing::info!(worker, index = claim.index, item_id = %claim.item_id, "job completed");
            shared.emit(RunEvent::JobFinished {
                worker,
                index: claim.index,
                item_id: claim.item_id.clone(),
                outcome: JobOutcome::Completed,
            });
            if shared.opts.subtitles {
                if let Err(e) = shared.downloader.fetch_subtitles(&request, &sink).await {
                    tracing::warn!(worker, item_id = %claim.item_id, "subtitle download failed: {}", e);
                    shared.emit(RunEvent::Notice(format!(
                        "warning: subtitles failed for {}; media download is complete",
                        claim.item_id
                    )));
                }
            }
            return Ok(());
        }
        Err(failure) => failure,
    };

    let kind = classify(&failure.message);
    record_outcome(shared, position, kind.status(), kind.reason(), Some(&failure.message)).await?;
    tracing::warn!(
        worker,
        index = claim.index,
        item_id = %claim.item_id,
        reason = kind.reason(),
        "job failed"
    );
    shared.emit(RunEvent::JobFinished {
        worker,
        index: claim.index,
        item_id: claim.item_id,
        outcome: JobOutcome::Failed {
            kind,
            message: truncate_error(&failure.message),
        },
    });

    if kind.is_retryable() && shared.opts.stop_on_retryable && shared.stop_on_retryable() {
        tracing::warn!(worker, "{}", STOP_NOTICE);
        shared.emit(RunEvent::Notice(STOP_NOTICE.to_string()));
    }
    Ok(())
}
