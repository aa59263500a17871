//! One job record and its guarded status transitions.

use serde::{Deserialize, Serialize};

use super::status::{can_transition, JobStatus};

/// `last_error` is cut to this many characters before it is stored.
pub const LAST_ERROR_MAX_CHARS: usize = 1200;

/// One unit of work: a single item of a source, downloaded by one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Stable key, `<source_id>:<position>:<item_id>`.
    pub job_id: String,
    /// 1-based position in the source's own ordering.
    pub index: u32,
    pub item_id: String,
    #[serde(default)]
    pub item_url: String,
    #[serde(default)]
    pub title: String,
    pub status: JobStatus,
    /// Short machine tag explaining the current status.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Rejected status change; the record it was attempted on is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "invalid job status transition: {:?} -> {:?} (job_id={job_id} item_id={item_id})",
    .from.map(JobStatus::as_str).unwrap_or(""),
    .to.as_str()
)]
pub struct InvalidTransition {
    pub job_id: String,
    pub item_id: String,
    pub from: Option<JobStatus>,
    pub to: JobStatus,
}

impl Job {
    /// Build a record entering the state machine through the initial edge,
    /// so `initial` must be `pending` or `skipped_private`.
    pub fn new(
        job_id: impl Into<String>,
        index: u32,
        item_id: impl Into<String>,
        item_url: impl Into<String>,
        title: impl Into<String>,
        initial: JobStatus,
        reason: impl Into<String>,
    ) -> Result<Self, InvalidTransition> {
        let job_id = job_id.into();
        let item_id = item_id.into();
        if !can_transition(None, initial) {
            return Err(InvalidTransition {
                job_id,
                item_id,
                from: None,
                to: initial,
            });
        }
        Ok(Self {
            job_id,
            index,
            item_id,
            item_url: item_url.into(),
            title: title.into(),
            status: initial,
            reason: reason.into(),
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
            completed_at: None,
        })
    }

    /// Stable job key for an item at `position` within `source_id`.
    pub fn key(source_id: &str, position: u32, item_id: &str) -> String {
        format!("{}:{}:{}", source_id, position, item_id)
    }

    /// Move to `to`, setting status and reason together.
    pub fn transition(
        &mut self,
        to: JobStatus,
        reason: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        if !can_transition(Some(self.status), to) {
            return Err(InvalidTransition {
                job_id: self.job_id.clone(),
                item_id: self.item_id.clone(),
                from: Some(self.status),
                to,
            });
        }
        self.status = to;
        self.reason = reason.into();
        Ok(())
    }

    /// Store a failure message, truncated to [`LAST_ERROR_MAX_CHARS`].
    pub fn set_last_error(&mut self, message: &str) {
        self.last_error = Some(truncate_error(message));
    }
}

/// Trim and cut `message` to at most [`LAST_ERROR_MAX_CHARS`] characters.
pub fn truncate_error(message: &str) -> String {
    let message = message.trim();
    match message.char_indices().nth(LAST_ERROR_MAX_CHARS) {
        Some((cut, _)) => message[..cut].to_string(),
        None => message.to_string(),
    }
}
