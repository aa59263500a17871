//! Plain-text progress output for `vodarc run`, fed by the scheduler's
//! event channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vodarc_core::estimate::{estimate_total_eta, format_bytes_iec};
use vodarc_core::scheduler::{classify_line, JobOutcome, LiveProgress, RunEvent, RunTotals};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Owns the printing task. Dropping every event sender ends it.
pub struct ProgressPrinter {
    handle: JoinHandle<()>,
}

impl ProgressPrinter {
    pub fn start(mut rx: mpsc::Receiver<RunEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut view = ProgressView::default();
            while let Some(event) = rx.recv().await {
                if let Some(line) = view.handle(event, Instant::now()) {
                    println!("{}", line);
                }
            }
        });
        Self { handle }
    }

    /// Wait for the remaining events to be printed.
    pub async fn stop(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!("progress printer task failed: {}", e);
        }
    }
}

struct ActiveJob {
    index: u32,
    item_id: String,
    progress: LiveProgress,
    last_print: Option<Instant>,
}

#[derive(Default)]
pub(crate) struct ProgressView {
    totals: Option<RunTotals>,
    active: HashMap<usize, ActiveJob>,
}

impl ProgressView {
    /// Fold one event in; returns the line to print, if any.
    pub(crate) fn handle(&mut self, event: RunEvent, now: Instant) -> Option<String> {
        match event {
            RunEvent::Totals(totals) => {
                self.totals = Some(totals);
                None
            }
            RunEvent::JobStarted {
                worker,
                index,
                item_id,
                title,
                attempt,
            } => {
                let line = format!(
                    "[w{}] #{:04} {} started (attempt {}) {}",
                    worker, index, item_id, attempt, title
                );
                self.active.insert(
                    worker,
                    ActiveJob {
                        index,
                        item_id,
                        progress: LiveProgress::default(),
                        last_print: None,
                    },
                );
                Some(line)
            }
            RunEvent::Output {
                worker,
                stream,
                line,
                ..
            } => {
                let overall = self.overall_eta();
                let job = self.active.get_mut(&worker)?;
                job.progress.apply(classify_line(stream, &line));
                job.progress.percent?;
                if job
                    .last_print
                    .is_some_and(|last| now.duration_since(last) < PROGRESS_INTERVAL)
                {
                    return None;
                }
                job.last_print = Some(now);
                Some(render_progress(worker, job, &overall))
            }
            RunEvent::JobFinished {
                worker,
                index,
                item_id,
                outcome,
            } => {
                self.active.remove(&worker);
                let what = match outcome {
                    JobOutcome::Completed => "completed".to_string(),
                    JobOutcome::Failed { kind, message } => {
                        let first = message.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
                        format!("failed ({}): {}", kind.reason(), first.trim())
                    }
                    JobOutcome::Rejected { reason } => format!("rejected ({})", reason),
                };
                Some(format!(
                    "[w{}] #{:04} {} {}{}",
                    worker,
                    index,
                    item_id,
                    what,
                    self.totals_suffix()
                ))
            }
            RunEvent::Notice(text) => Some(text),
        }
    }

    /// Whole-run ETA from the estimated bytes and the live rates of every
    /// active job.
    fn overall_eta(&self) -> String {
        let Some(totals) = &self.totals else {
            return String::new();
        };
        let rate: f64 = self.active.values().filter_map(|j| j.progress.rate_mbps).sum();
        estimate_total_eta(
            totals.estimated_total_bytes,
            totals.estimated_completed_bytes,
            rate,
        )
    }

    fn totals_suffix(&self) -> String {
        let Some(totals) = &self.totals else {
            return String::new();
        };
        let c = &totals.counts;
        let mut out = format!(
            " | {}/{} done, {} remaining",
            c.completed,
            c.total,
            c.remaining()
        );
        if totals.estimated_total_bytes > 0 {
            out.push_str(&format!(
                ", {} of ~{}",
                format_bytes_iec(totals.estimated_completed_bytes),
                format_bytes_iec(totals.estimated_total_bytes)
            ));
        }
        out
    }
}

fn render_progress(worker: usize, job: &ActiveJob, overall_eta: &str) -> String {
    let p = &job.progress;
    let mut line = format!(
        "[w{}] #{:04} {} {}",
        worker,
        job.index,
        job.item_id,
        p.phase.as_str()
    );
    if let Some(quality) = &p.quality {
        line.push_str(&format!(" {}", quality));
    }
    if let Some(percent) = p.percent {
        line.push_str(&format!(" {:.1}%", percent));
    }
    if let Some(size) = &p.total_size {
        line.push_str(&format!(" of {}", size));
    }
    if let Some(speed) = &p.speed {
        line.push_str(&format!(" at {}", speed));
    }
    if let Some(eta) = &p.eta {
        line.push_str(&format!(" ETA {}", eta));
    }
    if !overall_eta.is_empty() {
        line.push_str(&format!(" | run ETA {}", overall_eta));
    }
    line
}
