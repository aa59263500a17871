//! In-process downloader that scripts outcomes per item id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use vodarc_core::downloader::{
    DownloadFailure, DownloadRequest, Downloader, OutputSink, OutputStream,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub item_id: String,
    pub proxy: Option<String>,
    pub output_dir: PathBuf,
}

/// Succeeds unless told otherwise. A successful download leaves a media
/// file named like yt-dlp would in the request's output directory.
#[derive(Default)]
pub struct FakeDownloader {
    failures: HashMap<String, String>,
    subtitle_failure: Option<String>,
    delay: Option<Duration>,
    dir_in_place_of: Option<(String, PathBuf)>,
    calls: Mutex<Vec<Call>>,
    subtitle_calls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, item_id: &str, message: &str) -> Self {
        self.failures.insert(item_id.to_string(), message.to_string());
        self
    }

    pub fn fail_subtitles(mut self, message: &str) -> Self {
        self.subtitle_failure = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// While downloading `item_id`, replace the file at `path` with a
    /// directory so the next write to it fails.
    pub fn replace_with_dir(mut self, item_id: &str, path: PathBuf) -> Self {
        self.dir_in_place_of = Some((item_id.to_string(), path));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.item_id).collect()
    }

    pub fn subtitle_calls(&self) -> Vec<String> {
        self.subtitle_calls.lock().unwrap().clone()
    }
}

fn item_id_of(req: &DownloadRequest) -> String {
    req.item_url
        .rsplit("v=")
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        req: &DownloadRequest,
        sink: &OutputSink,
    ) -> Result<(), DownloadFailure> {
        let item_id = item_id_of(req);
        self.calls.lock().unwrap().push(Call {
            item_id: item_id.clone(),
            proxy: req.proxy.clone(),
            output_dir: req.output_dir.clone(),
        });
        sink.emit(OutputStream::Stdout, &format!("[youtube] {item_id}: Downloading webpage"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((target, path)) = &self.dir_in_place_of {
            if *target == item_id {
                std::fs::remove_file(path).unwrap();
                std::fs::create_dir(path).unwrap();
            }
        }

        if let Some(message) = self.failures.get(&item_id) {
            sink.emit(OutputStream::Stderr, message);
            return Err(DownloadFailure::new(format!("yt-dlp failed: exit status: 1\n{message}\n")));
        }

        let dir = req.output_dir.join("Chan");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("20240101_Video_[{item_id}].mp4")), b"media").unwrap();
        sink.emit(OutputStream::Stdout, "[download] 100% of 5.00B at 1.00MiB/s ETA 00:00");
        Ok(())
    }

    async fn fetch_subtitles(
        &self,
        req: &DownloadRequest,
        _sink: &OutputSink,
    ) -> Result<(), DownloadFailure> {
        self.subtitle_calls.lock().unwrap().push(item_id_of(req));
        match &self.subtitle_failure {
            Some(message) => Err(DownloadFailure::new(message.clone())),
            None => Ok(()),
        }
    }
}
