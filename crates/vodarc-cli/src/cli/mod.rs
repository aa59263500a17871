//! CLI for the vodarc archive scheduler.

mod commands;
mod printer;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use vodarc_core::config::{self, VodConfig};
use vodarc_core::runstore::resolve_run_dir;

use commands::{run_import, run_list_runs, run_scheduler, run_status};

/// Top-level CLI for vodarc.
#[derive(Debug, Parser)]
#[command(name = "vodarc")]
#[command(about = "vodarc: resumable bulk video archiving on top of yt-dlp", long_about = None)]
pub struct Cli {
    /// Directory holding runs (overrides `runs_dir` from the config file).
    #[arg(long, global = true, value_name = "DIR")]
    pub runs_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which run a command works on.
#[derive(Debug, Clone, Default, Args)]
pub struct RunTarget {
    /// Run directory.
    pub run_dir: Option<PathBuf>,
    /// Run id under the runs directory.
    #[arg(long, value_name = "ID", conflicts_with = "run_dir")]
    pub run_id: Option<String>,
    /// Use the most recent run.
    #[arg(long, conflicts_with_all = ["run_dir", "run_id"])]
    pub latest: bool,
}

impl RunTarget {
    fn resolve(&self, runs_dir: &Path) -> Result<PathBuf> {
        resolve_run_dir(
            runs_dir,
            self.run_dir.as_deref(),
            self.run_id.as_deref(),
            self.latest,
        )
    }
}

/// Per-invocation overrides for `vodarc run`.
#[derive(Debug, Clone, Default, Args)]
pub struct RunFlags {
    /// Where media files are written (remembered for later runs).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Concurrent download workers.
    #[arg(long, short = 'w', value_name = "N")]
    pub workers: Option<usize>,
    /// Concurrent fragments per download.
    #[arg(long, value_name = "N")]
    pub fragments: Option<usize>,
    /// Quality label: best, 2160p, 1440p, 1080p, 720p, 480p, 360p.
    #[arg(long)]
    pub quality: Option<String>,
    /// Format delivery: auto or fragmented.
    #[arg(long, value_name = "MODE")]
    pub delivery_mode: Option<String>,
    /// Dispatch order: oldest, newest or manifest.
    #[arg(long)]
    pub order: Option<String>,
    /// Per-download bandwidth cap in MB/s.
    #[arg(long, value_name = "MBPS")]
    pub limit_mbps: Option<f64>,
    /// Proxy mode: off or per_worker.
    #[arg(long, value_name = "MODE")]
    pub proxy_mode: Option<String>,
    /// Proxy URL; repeat once per worker.
    #[arg(long = "proxy", value_name = "URL")]
    pub proxies: Vec<String>,
    /// Stop after dispatching N jobs (0 = no limit).
    #[arg(long, default_value = "0", value_name = "N")]
    pub max_jobs: usize,
    /// Stop dispatching after the first retryable failure.
    #[arg(long)]
    pub stop_on_retryable: bool,
    /// Also retry jobs that failed permanently.
    #[arg(long)]
    pub retry_permanent: bool,
    /// Netscape cookies file passed to yt-dlp.
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,
    /// Browser to read cookies from.
    #[arg(long, value_name = "BROWSER")]
    pub cookies_from_browser: Option<String>,
    /// Fetch subtitles after each download.
    #[arg(long, conflicts_with = "no_subtitles")]
    pub subtitles: bool,
    /// Skip subtitles even if the config enables them.
    #[arg(long)]
    pub no_subtitles: bool,
    /// Comma-separated subtitle languages.
    #[arg(long, value_name = "LANGS")]
    pub sub_langs: Option<String>,
    /// Do not print per-job progress.
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every runnable job of a run.
    Run {
        #[command(flatten)]
        target: RunTarget,
        #[command(flatten)]
        flags: RunFlags,
    },

    /// Show job counts and failures of a run.
    Status {
        #[command(flatten)]
        target: RunTarget,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
        /// List failed jobs with their last error.
        #[arg(long)]
        failures: bool,
    },

    /// List runs in the runs directory.
    Runs,

    /// Import a discovered job list into a run.
    Import {
        /// JSON job list: source fields plus `jobs`.
        path: PathBuf,
        /// Raw source metadata stored next to the manifest (used for size estimates).
        #[arg(long, value_name = "FILE")]
        raw: Option<PathBuf>,
        /// Merge into this run directory instead of looking one up by source.
        #[arg(long, value_name = "DIR")]
        into: Option<PathBuf>,
        /// Always create a new run.
        #[arg(long, conflicts_with = "into")]
        new: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let runs_dir = cli.runs_dir.clone().unwrap_or_else(|| cfg.runs_dir.clone());

        match cli.command {
            CliCommand::Run { target, flags } => {
                let run_dir = target.resolve(&runs_dir)?;
                run_scheduler(&cfg, run_dir, &flags).await?;
            }
            CliCommand::Status {
                target,
                json,
                failures,
            } => {
                let run_dir = target.resolve(&runs_dir)?;
                run_status(&cfg, &run_dir, json, failures)?;
            }
            CliCommand::Runs => run_list_runs(&runs_dir)?,
            CliCommand::Import {
                path,
                raw,
                into,
                new,
            } => run_import(&runs_dir, &path, raw.as_deref(), into.as_deref(), new)?,
        }

        Ok(())
    }
}

/// Config values with this invocation's flags applied.
pub(crate) fn run_options(
    cfg: &VodConfig,
    run_dir: PathBuf,
    flags: &RunFlags,
) -> vodarc_core::scheduler::RunOptions {
    use vodarc_core::config::DeliveryMode;
    use vodarc_core::proxy::ProxyMode;
    use vodarc_core::scheduler::{JobOrder, RunOptions};

    let mut opts = RunOptions::from_config(cfg, run_dir);
    opts.output_dir = flags.output_dir.clone();
    if let Some(n) = flags.workers {
        opts.workers = n;
    }
    if let Some(n) = flags.fragments {
        opts.fragments = n;
    }
    if let Some(q) = &flags.quality {
        opts.quality = q.clone();
    }
    if let Some(mode) = &flags.delivery_mode {
        opts.delivery_mode = DeliveryMode::parse(mode);
    }
    if let Some(order) = &flags.order {
        opts.order = JobOrder::parse(order);
    }
    if flags.limit_mbps.is_some() {
        opts.download_limit_mbps = flags.limit_mbps;
    }
    if let Some(mode) = &flags.proxy_mode {
        opts.proxy_mode = ProxyMode::parse(mode);
    }
    if !flags.proxies.is_empty() {
        opts.proxies = flags.proxies.clone();
    }
    opts.max_jobs = flags.max_jobs;
    opts.stop_on_retryable = flags.stop_on_retryable;
    opts.retry_permanent = flags.retry_permanent;
    if flags.cookies.is_some() {
        opts.cookies.file = flags.cookies.clone();
    }
    if flags.cookies_from_browser.is_some() {
        opts.cookies.from_browser = flags.cookies_from_browser.clone();
    }
    if flags.subtitles {
        opts.subtitles = true;
    }
    if flags.no_subtitles {
        opts.subtitles = false;
    }
    if let Some(langs) = &flags.sub_langs {
        opts.sub_langs = langs.clone();
    }
    opts
}

#[cfg(test)]
mod tests;
