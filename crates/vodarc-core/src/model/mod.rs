//! Job records, the jobs manifest, and the job status state machine.
//!
//! Records are created by a merge (as `pending` or `skipped_private`) and are
//! afterwards only mutated by the scheduler through [`Job::transition`].

mod job;
mod manifest;
mod status;

pub use job::{truncate_error, InvalidTransition, Job, LAST_ERROR_MAX_CHARS};
pub use manifest::{Manifest, SourceInfo, StatusCounts, SCHEMA_VERSION};
pub use status::{can_transition, JobStatus, ParseStatusError};

/// Current UTC time as an RFC 3339 string with second precision.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests;
