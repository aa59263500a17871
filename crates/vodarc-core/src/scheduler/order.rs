//! Dispatch order of runnable jobs.

use serde::{Deserialize, Serialize};

use crate::model::Job;

/// `oldest` assumes the source lists newest items first (index 1 is the
/// newest), so it walks indexes from high to low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobOrder {
    #[default]
    Oldest,
    Newest,
    Manifest,
}

impl JobOrder {
    /// Lenient parse; unknown values fall back to `oldest`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "newest" => JobOrder::Newest,
            "manifest" => JobOrder::Manifest,
            _ => JobOrder::Oldest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobOrder::Oldest => "oldest",
            JobOrder::Newest => "newest",
            JobOrder::Manifest => "manifest",
        }
    }
}

impl From<String> for JobOrder {
    fn from(raw: String) -> Self {
        JobOrder::parse(&raw)
    }
}

impl From<JobOrder> for String {
    fn from(order: JobOrder) -> Self {
        order.as_str().to_string()
    }
}

/// Positions into `jobs` in dispatch order. Covers every job; runnability
/// is checked at dispatch time.
pub fn ordered_job_indexes(jobs: &[Job], order: JobOrder) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..jobs.len()).collect();
    match order {
        JobOrder::Manifest => {}
        JobOrder::Newest => positions.sort_by_key(|&i| (jobs[i].index, i)),
        JobOrder::Oldest => {
            positions.sort_by(|&a, &b| (jobs[b].index, b).cmp(&(jobs[a].index, a)));
        }
    }
    positions
}
