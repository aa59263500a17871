//! `vodarc run` – download the runnable jobs of one run.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use vodarc_core::config::VodConfig;
use vodarc_core::downloader::YtDlp;
use vodarc_core::estimate::format_bytes_iec;
use vodarc_core::scheduler::{self, RunEvent, RunSummary};

use crate::cli::printer::ProgressPrinter;
use crate::cli::{run_options, RunFlags};

const EVENT_BUFFER: usize = 256;

pub async fn run_scheduler(cfg: &VodConfig, run_dir: PathBuf, flags: &RunFlags) -> Result<()> {
    let opts = run_options(cfg, run_dir, flags);
    let ytdlp = match &cfg.ytdlp_path {
        Some(path) => YtDlp::new(path),
        None => YtDlp::default(),
    };
    let deps = ytdlp.check_dependencies()?;
    tracing::debug!(ytdlp = ?deps.ytdlp, ffmpeg = ?deps.ffmpeg, "dependencies found");

    let (events, printer) = if flags.quiet {
        (None, None)
    } else {
        let (tx, rx) = tokio::sync::mpsc::channel::<RunEvent>(EVENT_BUFFER);
        (Some(tx), Some(ProgressPrinter::start(rx)))
    };

    let result = scheduler::run(opts, Arc::new(ytdlp), events).await;
    if let Some(printer) = printer {
        printer.stop().await;
    }
    let summary = result?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(s: &RunSummary) {
    println!("run {} ({})", s.run_id, s.run_dir.display());
    println!("  output:     {}", s.output_dir.display());
    println!("  processed:  {}", s.processed);
    println!("  completed:  {}", s.completed);
    println!(
        "  failed:     {} retryable, {} permanent",
        s.failed_retryable, s.failed_permanent
    );
    println!("  pending:    {}", s.pending);
    println!("  private:    {}", s.skipped_private);
    if s.estimated_total_bytes > 0 {
        println!(
            "  size:       {} of ~{}",
            format_bytes_iec(s.estimated_completed_bytes),
            format_bytes_iec(s.estimated_total_bytes)
        );
    }
    if s.stopped_on_retryable {
        println!("Stopped after a retryable failure; {} job(s) left. Run again to resume.", s.remaining);
    } else if s.remaining > 0 {
        println!("{} job(s) remaining. Run again to retry.", s.remaining);
    } else if s.processed == 0 {
        println!("No runnable jobs.");
    }
}
