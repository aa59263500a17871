//! [`Downloader`] backed by the `yt-dlp` executable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::args::{download_args, subtitle_args};
use super::sink::{OutputSink, OutputStream};
use super::{DownloadFailure, DownloadRequest, Downloader};

/// Bytes of each output stream kept for the failure message.
const CAPTURE_LIMIT: usize = 8192;

/// Where the external tools were found on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub ytdlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn dependency_status(&self) -> DependencyReport {
        DependencyReport {
            ytdlp: find_program(&self.program),
            ffmpeg: find_program(Path::new("ffmpeg")),
        }
    }

    /// Fail unless both yt-dlp and ffmpeg can be found.
    pub fn check_dependencies(&self) -> anyhow::Result<DependencyReport> {
        let report = self.dependency_status();
        if report.ytdlp.is_none() {
            anyhow::bail!(
                "missing dependency: {} is not installed or not on PATH",
                self.program.display()
            );
        }
        if report.ffmpeg.is_none() {
            anyhow::bail!(
                "missing dependency: ffmpeg is required for many formats and was not found on PATH"
            );
        }
        Ok(report)
    }

    async fn run_tool(&self, args: Vec<String>, sink: &OutputSink) -> Result<(), DownloadFailure> {
        tracing::debug!(program = %self.program.display(), ?args, "spawning yt-dlp");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DownloadFailure::new(format!("start {}: {}", self.program.display(), e))
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out_text, err_text) = tokio::join!(
            pump(stdout, OutputStream::Stdout, sink),
            pump(stderr, OutputStream::Stderr, sink),
        );

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadFailure::new(format!("wait for yt-dlp: {}", e)))?;
        if !status.success() {
            return Err(DownloadFailure::new(format!(
                "yt-dlp failed: {}\n{}\n{}",
                status,
                err_text.trim(),
                out_text.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn download(
        &self,
        req: &DownloadRequest,
        sink: &OutputSink,
    ) -> Result<(), DownloadFailure> {
        if req.item_url.trim().is_empty() {
            return Err(DownloadFailure::new("item URL is required"));
        }
        self.run_tool(download_args(req), sink).await
    }

    async fn fetch_subtitles(
        &self,
        req: &DownloadRequest,
        sink: &OutputSink,
    ) -> Result<(), DownloadFailure> {
        if req.item_url.trim().is_empty() {
            return Err(DownloadFailure::new("item URL is required"));
        }
        self.run_tool(subtitle_args(req), sink).await
    }
}

/// Forward every line of `reader` to the sink. Lines end at `\n` or `\r` so
/// progress redraws arrive one at a time. Returns the first
/// [`CAPTURE_LIMIT`] bytes of output.
async fn pump<R>(reader: Option<R>, stream: OutputStream, sink: &OutputSink) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(reader) = reader else {
        return captured;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match read_segment(&mut reader, &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.is_empty() {
                    continue;
                }
                let line = String::from_utf8_lossy(&buf);
                append_limited(&mut captured, &line);
                sink.emit(stream, &line);
            }
            Err(e) => {
                tracing::debug!(stream = stream.as_str(), "yt-dlp output read failed: {}", e);
                break;
            }
        }
    }
    captured
}

/// Read up to the next `\n` or `\r`, leaving the delimiter out of `buf`.
/// Returns the bytes consumed; 0 at end of stream.
async fn read_segment<B>(reader: &mut B, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    B: AsyncBufRead + Unpin,
{
    let mut consumed = 0;
    loop {
        let (done, used) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(consumed);
            }
            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(i) => {
                    buf.extend_from_slice(&available[..i]);
                    (true, i + 1)
                }
                None => {
                    buf.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.consume(used);
        consumed += used;
        if done {
            return Ok(consumed);
        }
    }
}

fn append_limited(captured: &mut String, line: &str) {
    let remain = CAPTURE_LIMIT.saturating_sub(captured.len());
    if remain == 0 {
        return;
    }
    let mut end = line.len().min(remain);
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    captured.push_str(&line[..end]);
    if captured.len() < CAPTURE_LIMIT {
        captured.push('\n');
    }
}

/// Resolve `program` like a shell would: paths with a separator are used as
/// given, bare names are searched on `PATH`.
fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
