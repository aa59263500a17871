//! State shared by the dispatcher and workers of one run.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::options::RunOptions;
use super::progress::{RunEvent, RunTotals};
use crate::downloader::{DownloadRequest, Downloader};
use crate::estimate::SizeEstimator;
use crate::model::Manifest;
use crate::runstore::{write_manifest, RunPaths};

/// The manifest plus where it lives. Only touched under [`Shared::state`].
pub(super) struct RunState {
    pub(super) manifest: Manifest,
    pub(super) paths: RunPaths,
}

impl RunState {
    /// Recompute counters and durably write the manifest.
    pub(super) fn persist(&mut self) -> Result<()> {
        self.manifest.recompute_counters();
        write_manifest(&self.paths.jobs_manifest, &self.manifest)?;
        Ok(())
    }
}

/// Everything workers need, shared behind one `Arc`.
pub(super) struct Shared {
    pub(super) opts: RunOptions,
    pub(super) paths: RunPaths,
    pub(super) output_dir: PathBuf,
    pub(super) downloader: Arc<dyn Downloader>,
    pub(super) estimator: SizeEstimator,
    pub(super) events: Option<mpsc::Sender<RunEvent>>,

    /// Manifest mutations, counter recomputation and persistence all happen
    /// under this lock. It is never held across a download.
    pub(super) state: tokio::sync::Mutex<RunState>,
    pub(super) processed: AtomicUsize,
    stop_all: AtomicBool,
    stop_retryable: AtomicBool,
    fatal: Mutex<Option<anyhow::Error>>,
}

impl Shared {
    pub(super) fn new(
        opts: RunOptions,
        output_dir: PathBuf,
        downloader: Arc<dyn Downloader>,
        estimator: SizeEstimator,
        events: Option<mpsc::Sender<RunEvent>>,
        state: RunState,
    ) -> Self {
        Self {
            paths: state.paths.clone(),
            opts,
            output_dir,
            downloader,
            estimator,
            events,
            state: tokio::sync::Mutex::new(state),
            processed: AtomicUsize::new(0),
            stop_all: AtomicBool::new(false),
            stop_retryable: AtomicBool::new(false),
            fatal: Mutex::new(None),
        }
    }

    /// No new job may start.
    pub(super) fn stop_requested(&self) -> bool {
        self.stop_all.load(Ordering::SeqCst) || self.stop_retryable.load(Ordering::SeqCst)
    }

    pub(super) fn stopped_on_retryable(&self) -> bool {
        self.stop_retryable.load(Ordering::SeqCst)
    }

    /// Raise the retryable stop flag. True for the caller that raised it.
    pub(super) fn stop_on_retryable(&self) -> bool {
        !self.stop_retryable.swap(true, Ordering::SeqCst)
    }

    /// Record a run-fatal error; the first one wins.
    pub(super) fn set_fatal(&self, err: anyhow::Error) {
        self.stop_all.store(true, Ordering::SeqCst);
        let mut slot = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            tracing::error!(run_dir = %self.paths.root.display(), "run aborted: {:#}", err);
            *slot = Some(err);
        } else {
            tracing::debug!("additional fatal error after abort: {:#}", err);
        }
    }

    pub(super) fn take_fatal(&self) -> Option<anyhow::Error> {
        self.fatal.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub(super) fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }

    pub(super) fn totals(&self, manifest: &Manifest) -> RunTotals {
        RunTotals {
            counts: manifest.counts,
            estimated_total_bytes: self.estimator.total_bytes(),
            estimated_completed_bytes: self.estimator.completed_bytes(&manifest.jobs),
            processed: self.processed.load(Ordering::SeqCst),
        }
    }

    pub(super) fn emit_totals(&self, manifest: &Manifest) {
        if self.events.is_some() {
            self.emit(RunEvent::Totals(self.totals(manifest)));
        }
    }

    pub(super) fn request_for(&self, item_url: &str, proxy: Option<&str>) -> DownloadRequest {
        DownloadRequest {
            item_url: item_url.to_string(),
            output_dir: self.output_dir.clone(),
            archive_path: Some(self.paths.archive.clone()),
            quality: self.opts.quality.clone(),
            delivery_mode: self.opts.delivery_mode,
            fragments: self.opts.fragments,
            rate_limit_mbps: self.opts.download_limit_mbps,
            proxy: proxy.map(str::to_string),
            cookies: self.opts.cookies.clone(),
            sub_langs: self.opts.sub_langs.clone(),
        }
    }
}
