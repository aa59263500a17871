//! Failure classification for download attempts.
//!
//! The download tool only reports free text, so the scheduler decides between
//! "try again on a later run" and "give up on this item" by matching that text
//! against known markers.

mod classify;

pub use classify::{classify, FailureKind};
