//! Map download failure text to a [`FailureKind`].

use crate::model::JobStatus;

/// High-level classification of a failed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A helper binary (ffmpeg/ffprobe) is not installed.
    MissingDependency,
    /// Throttling, timeouts and transient network or server errors.
    TransientOrRateLimited,
    /// Anything else.
    DownloadError,
}

const DEPENDENCY_MARKERS: &[&str] = &["ffmpeg could not be found", "ffprobe could not be found"];

const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "too many requests",
    "rate limit",
    "timed out",
    "timeout",
    "temporarily unavailable",
    "connection reset",
    "service unavailable",
    "network is unreachable",
    "http error 5",
];

impl FailureKind {
    /// Reason tag stored on the job.
    pub fn reason(self) -> &'static str {
        match self {
            FailureKind::MissingDependency => "missing_dependency",
            FailureKind::TransientOrRateLimited => "transient_or_rate_limited",
            FailureKind::DownloadError => "download_error",
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::TransientOrRateLimited)
    }

    /// Status a job moves to after failing this way.
    pub fn status(self) -> JobStatus {
        if self.is_retryable() {
            JobStatus::FailedRetryable
        } else {
            JobStatus::FailedPermanent
        }
    }
}

/// Classify failure text. Dependency markers win over transient markers.
pub fn classify(text: &str) -> FailureKind {
    let text = text.to_lowercase();
    if DEPENDENCY_MARKERS.iter().any(|m| text.contains(m)) {
        return FailureKind::MissingDependency;
    }
    if TRANSIENT_MARKERS.iter().any(|m| text.contains(m)) {
        return FailureKind::TransientOrRateLimited;
    }
    FailureKind::DownloadError
}
