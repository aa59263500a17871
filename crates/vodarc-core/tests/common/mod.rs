//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

pub mod fake_downloader;

use std::path::{Path, PathBuf};

use vodarc_core::model::{Job, JobStatus, Manifest, SourceInfo};
use vodarc_core::runstore::{read_manifest, write_manifest, RunPaths};
use vodarc_core::scheduler::{JobOrder, RunOptions};

pub fn item_url(item_id: &str) -> String {
    format!("https://v.test/watch?v={}", item_id)
}

/// A job record already in `status`.
pub fn job(index: u32, item_id: &str, status: JobStatus) -> Job {
    let mut job = Job::new(
        Job::key("chan", index, item_id),
        index,
        item_id,
        item_url(item_id),
        format!("Video {}", index),
        JobStatus::Pending,
        "",
    )
    .unwrap();
    job.status = status;
    job
}

/// Write a run directory with `jobs` under `root` and return its path.
pub fn make_run(root: &Path, jobs: Vec<Job>) -> PathBuf {
    let run_dir = root.join("20240101T000000Z_chan");
    std::fs::create_dir_all(&run_dir).unwrap();
    let source = SourceInfo {
        url: "https://v.test/c/chan".into(),
        id: "chan".into(),
        title: "Chan".into(),
        kind: "channel".into(),
    };
    let manifest = Manifest::new("", source, jobs);
    write_manifest(&RunPaths::new(&run_dir).jobs_manifest, &manifest).unwrap();
    run_dir
}

pub fn load(run_dir: &Path) -> Manifest {
    read_manifest(&RunPaths::new(run_dir).jobs_manifest).unwrap()
}

pub fn find<'a>(manifest: &'a Manifest, item_id: &str) -> &'a Job {
    manifest
        .jobs
        .iter()
        .find(|j| j.item_id == item_id)
        .unwrap_or_else(|| panic!("no job {item_id}"))
}

/// One worker, stored order, no subtitles: deterministic dispatch.
pub fn options(run_dir: &Path) -> RunOptions {
    RunOptions {
        run_dir: run_dir.to_path_buf(),
        workers: 1,
        order: JobOrder::Manifest,
        subtitles: false,
        ..Default::default()
    }
}
