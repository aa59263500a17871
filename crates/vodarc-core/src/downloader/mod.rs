//! External download collaborator.
//!
//! The scheduler never fetches media itself. It hands a [`DownloadRequest`]
//! to a [`Downloader`], which streams the tool's output lines into an
//! [`OutputSink`] and reports success or a free-text [`DownloadFailure`].

mod args;
mod sink;
mod ytdlp;

pub use args::{download_args, normalize_sub_langs, select_format, subtitle_args, OUTPUT_TEMPLATE};
pub use sink::{OutputSink, OutputStream};
pub use ytdlp::{DependencyReport, YtDlp};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::DeliveryMode;

/// Browser cookies handed to the download tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    /// Netscape-format cookies file; wins over `from_browser`.
    pub file: Option<PathBuf>,
    /// Browser name to read cookies from (`firefox`, `chrome`, ...).
    pub from_browser: Option<String>,
}

/// Everything needed to download one item.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub item_url: String,
    pub output_dir: PathBuf,
    /// Dedup archive shared by every job of the run.
    pub archive_path: Option<PathBuf>,
    pub quality: String,
    pub delivery_mode: DeliveryMode,
    pub fragments: usize,
    /// Bandwidth cap in MB/s.
    pub rate_limit_mbps: Option<f64>,
    pub proxy: Option<String>,
    pub cookies: Cookies,
    pub sub_langs: String,
}

/// Free-text failure reported by a downloader; classified by [`crate::retry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DownloadFailure {
    pub message: String,
}

impl DownloadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download the media for one item.
    async fn download(&self, req: &DownloadRequest, sink: &OutputSink)
        -> Result<(), DownloadFailure>;

    /// Fetch subtitles only. Best effort; callers log failures.
    async fn fetch_subtitles(
        &self,
        req: &DownloadRequest,
        sink: &OutputSink,
    ) -> Result<(), DownloadFailure>;
}
