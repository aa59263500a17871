//! `vodarc import` – merge a discovered job list into a run.

use anyhow::Result;
use std::path::Path;
use vodarc_core::runstore::import_job_list;

pub fn run_import(
    runs_dir: &Path,
    path: &Path,
    raw: Option<&Path>,
    into: Option<&Path>,
    fresh: bool,
) -> Result<()> {
    let outcome = import_job_list(runs_dir, path, raw, into, fresh)?;
    println!("run {} ({})", outcome.run_id, outcome.run_dir.display());
    println!(
        "  {} job(s), {} new, {} pending, {} private",
        outcome.total, outcome.added, outcome.pending, outcome.skipped_private
    );
    Ok(())
}
