//! The jobs manifest: source metadata, derived counters and the job list.

use serde::{Deserialize, Serialize};

use super::job::Job;
use super::status::JobStatus;

pub const SCHEMA_VERSION: u32 = 1;

/// Where the jobs came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(rename = "source_url", default)]
    pub url: String,
    #[serde(rename = "source_id", default)]
    pub id: String,
    #[serde(rename = "source_title", default)]
    pub title: String,
    #[serde(rename = "source_type", default)]
    pub kind: String,
}

/// Per-status job counts. Always derived from the job list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed_retryable: usize,
    pub failed_permanent: usize,
    pub skipped_private: usize,
}

impl StatusCounts {
    pub fn tally(jobs: &[Job]) -> Self {
        let mut counts = StatusCounts {
            total: jobs.len(),
            ..Default::default()
        };
        for job in jobs {
            *counts.slot_mut(job.status) += 1;
        }
        counts
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::FailedRetryable => self.failed_retryable,
            JobStatus::FailedPermanent => self.failed_permanent,
            JobStatus::SkippedPrivate => self.skipped_private,
        }
    }

    /// Jobs a later run can still pick up.
    pub fn remaining(&self) -> usize {
        self.pending + self.failed_retryable + self.running
    }

    fn slot_mut(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::FailedRetryable => &mut self.failed_retryable,
            JobStatus::FailedPermanent => &mut self.failed_permanent,
            JobStatus::SkippedPrivate => &mut self.skipped_private,
        }
    }
}

/// Contents of `manifest.jobs.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(flatten)]
    pub source: SourceInfo,
    #[serde(flatten)]
    pub counts: StatusCounts,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Manifest {
    pub fn new(run_id: impl Into<String>, source: SourceInfo, jobs: Vec<Job>) -> Self {
        let mut manifest = Self {
            schema_version: SCHEMA_VERSION,
            generated_at: super::now_rfc3339(),
            run_id: run_id.into(),
            source,
            counts: StatusCounts::default(),
            jobs,
        };
        manifest.recompute_counters();
        manifest
    }

    /// Rebuild every counter from the job list.
    pub fn recompute_counters(&mut self) {
        self.counts = StatusCounts::tally(&self.jobs);
    }
}
