//! `vodarc runs` – list the runs under the runs directory.

use anyhow::Result;
use std::path::Path;
use vodarc_core::runstore::{list_run_dirs, load_run_manifest, RunPaths};

pub fn run_list_runs(runs_dir: &Path) -> Result<()> {
    let dirs = list_run_dirs(runs_dir)?;
    if dirs.is_empty() {
        println!("No runs in {}.", runs_dir.display());
        return Ok(());
    }
    println!(
        "{:<40} {:>6} {:>6} {:>9} {}",
        "RUN", "TOTAL", "DONE", "REMAINING", "SOURCE"
    );
    for dir in dirs {
        let paths = RunPaths::new(&dir);
        match load_run_manifest(&paths) {
            Ok(m) => println!(
                "{:<40} {:>6} {:>6} {:>9} {}",
                m.run_id,
                m.counts.total,
                m.counts.completed,
                m.counts.remaining(),
                if m.source.title.is_empty() { &m.source.url } else { &m.source.title }
            ),
            Err(e) => {
                let e = anyhow::Error::from(e);
                tracing::warn!(run_dir = %dir.display(), "unreadable run: {:#}", e);
                println!("{:<40} unreadable: {:#}", paths.dir_name(), e);
            }
        }
    }
    Ok(())
}
