//! Job scheduler.
//!
//! Drives one run directory: takes the run lock, repairs state left by an
//! earlier invocation (stale `running` jobs, completed jobs whose media
//! vanished), then feeds runnable jobs to a fixed pool of workers that call
//! the [`Downloader`](crate::downloader::Downloader), classify failures and
//! persist every status change before moving on.

mod options;
mod order;
mod progress;
mod reconcile;
mod run;
mod state;
mod worker;

pub use options::{RunOptions, DEFAULT_FRAGMENTS, DEFAULT_WORKERS};
pub use order::{ordered_job_indexes, JobOrder};
pub use progress::{
    classify_line, ffmpeg_bitrate_mbps, parse_rate_to_mbps, resolution_to_quality, JobOutcome,
    LineUpdate, LiveProgress, Phase, RunEvent, RunTotals,
};
pub use reconcile::{
    extract_item_id, index_media_ids, prune_download_archive, reconcile_completed_with_disk,
    reset_stale_running,
};
pub use run::{run, RunSummary};
