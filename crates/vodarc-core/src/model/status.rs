//! Job status enum and the whitelist of legal transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of one job, stored as a snake_case string in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    FailedRetryable,
    FailedPermanent,
    SkippedPrivate,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::FailedRetryable,
        JobStatus::FailedPermanent,
        JobStatus::SkippedPrivate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::FailedRetryable => "failed_retryable",
            JobStatus::FailedPermanent => "failed_permanent",
            JobStatus::SkippedPrivate => "skipped_private",
        }
    }

    /// Whether a run may dispatch a job in this state. Permanent failures only
    /// qualify when the caller asked to retry them.
    pub fn is_runnable(self, retry_permanent: bool) -> bool {
        match self {
            JobStatus::Pending | JobStatus::FailedRetryable => true,
            JobStatus::FailedPermanent => retry_permanent,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Whether `from -> to` is a legal edge. `None` is the initial state of a
/// record that has not been given a status yet.
pub fn can_transition(from: Option<JobStatus>, to: JobStatus) -> bool {
    use JobStatus::*;

    match from {
        None => matches!(to, Pending | SkippedPrivate),
        Some(Pending) => matches!(
            to,
            Pending | Running | FailedRetryable | FailedPermanent | SkippedPrivate
        ),
        Some(Running) => matches!(to, Running | Completed | FailedRetryable | FailedPermanent),
        Some(Completed) => matches!(to, Completed | Pending | FailedRetryable | FailedPermanent),
        Some(FailedRetryable) => matches!(
            to,
            FailedRetryable | Running | Pending | FailedPermanent | SkippedPrivate
        ),
        Some(FailedPermanent) => matches!(to, FailedPermanent | Running | Pending | SkippedPrivate),
        Some(SkippedPrivate) => matches!(to, SkippedPrivate | Pending),
    }
}
