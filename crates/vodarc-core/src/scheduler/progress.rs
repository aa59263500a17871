//! Run events for display consumers and scraping of download tool output.
//!
//! The scheduler reports through an optional `mpsc::Sender<RunEvent>` using
//! `try_send`, so a slow consumer loses display updates but never blocks a
//! worker. The per-job log file stays the complete record.

use regex::Regex;
use std::sync::LazyLock;

use crate::downloader::OutputStream;
use crate::model::StatusCounts;
use crate::retry::FailureKind;

/// Snapshot of run-wide counters plus the advisory size estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub counts: StatusCounts,
    pub estimated_total_bytes: u64,
    pub estimated_completed_bytes: u64,
    /// Jobs handed to workers so far in this invocation.
    pub processed: usize,
}

/// How one dispatched job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { kind: FailureKind, message: String },
    /// Failed before the downloader ran (missing URL, unwritable log).
    Rejected { reason: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Totals(RunTotals),
    JobStarted {
        worker: usize,
        index: u32,
        item_id: String,
        title: String,
        attempt: u32,
    },
    Output {
        worker: usize,
        index: u32,
        stream: OutputStream,
        line: String,
    },
    JobFinished {
        worker: usize,
        index: u32,
        item_id: String,
        outcome: JobOutcome,
    },
    Notice(String),
}

/// What a single output line is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Starting,
    Metadata,
    Preparing,
    Subtitles,
    Downloading,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Metadata => "metadata",
            Phase::Preparing => "preparing",
            Phase::Subtitles => "subtitles",
            Phase::Downloading => "downloading",
        }
    }
}

/// Facts scraped from one output line. Empty fields mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineUpdate {
    pub phase: Option<Phase>,
    /// ffmpeg is transcoding or remuxing; implies downloading if nothing
    /// more specific is known.
    pub ffmpeg_active: bool,
    pub percent: Option<f64>,
    pub speed: Option<String>,
    pub rate_mbps: Option<f64>,
    pub eta: Option<String>,
    pub total_size: Option<String>,
    pub quality: Option<String>,
}

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)%").expect("valid regex"));
static SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bat\s+([^\s]+)").expect("valid regex"));
static ETA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bETA\s+([0-9:]+)").expect("valid regex"));
static TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bof\s+~?\s*([^\s]+)").expect("valid regex"));
static FFMPEG_SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bspeed=\s*([^\s]+)").expect("valid regex"));
static FFMPEG_BITRATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbitrate=\s*([0-9.]+)\s*([kKmMgG])bits/s").expect("valid regex")
});
static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{3,5})x([0-9]{3,5})\b").expect("valid regex"));
static RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:\.[0-9]+)?)\s*([kmgt]?i?b)/s$").expect("valid regex")
});

/// Classify one line of yt-dlp (stdout) or ffmpeg (stderr) output.
pub fn classify_line(stream: OutputStream, line: &str) -> LineUpdate {
    let line = line.trim();
    let mut update = LineUpdate::default();
    if line.is_empty() {
        return update;
    }

    if line.starts_with("[youtube]") {
        update.phase = Some(Phase::Metadata);
    } else if line.starts_with("[info]") {
        update.phase = if line.to_lowercase().contains("downloading subtitles") {
            Some(Phase::Subtitles)
        } else {
            Some(Phase::Preparing)
        };
    } else if line.starts_with("[download]") {
        update.phase = Some(Phase::Downloading);
        update.percent = capture(&PERCENT, line, 1).and_then(|p| p.parse().ok());
        if let Some(speed) = capture(&SPEED, line, 1) {
            update.rate_mbps = Some(parse_rate_to_mbps(speed)).filter(|r| *r > 0.0);
            update.speed = Some(speed.to_string());
        }
        update.eta = capture(&ETA, line, 1).map(str::to_string);
        update.total_size = capture(&TOTAL, line, 1).map(str::to_string);
    }

    if stream == OutputStream::Stderr {
        if let Some(caps) = RESOLUTION.captures(line) {
            if let (Ok(w), Ok(h)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
                update.quality = Some(resolution_to_quality(w, h));
            }
        }
        if let Some(caps) = FFMPEG_BITRATE.captures(line) {
            update.rate_mbps = ffmpeg_bitrate_mbps(&caps[1], &caps[2]);
        }
        if let Some(speed) = capture(&FFMPEG_SPEED, line, 1) {
            update.speed = Some(speed.to_string());
            update.ffmpeg_active = true;
        }
    }
    update
}

fn capture<'a>(re: &Regex, line: &'a str, group: usize) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str())
}

/// Convert a yt-dlp speed (`2.50MiB/s`, `800KiB/s`, `1.2MB/s`) to megabits
/// per second. Unparseable input is 0.
pub fn parse_rate_to_mbps(raw: &str) -> f64 {
    let text = raw.trim().to_lowercase();
    let Some(caps) = RATE.captures(&text) else {
        return 0.0;
    };
    let value: f64 = match caps[1].parse() {
        Ok(v) if v > 0.0 => v,
        _ => return 0.0,
    };
    let megabytes_per_sec = match &caps[2] {
        "b" => value / 1e6,
        "kib" => value * 1024.0 / 1e6,
        "kb" => value * 1000.0 / 1e6,
        "mib" => value * 1024.0 * 1024.0 / 1e6,
        "mb" => value,
        "gib" => value * 1024.0 * 1024.0 * 1024.0 / 1e6,
        "gb" => value * 1000.0,
        _ => return 0.0,
    };
    megabytes_per_sec * 8.0
}

/// ffmpeg `bitrate=` value in megabits per second.
pub fn ffmpeg_bitrate_mbps(number: &str, unit: &str) -> Option<f64> {
    let value: f64 = number.parse().ok().filter(|v: &f64| *v > 0.0)?;
    match unit.trim().to_ascii_uppercase().as_str() {
        "K" => Some(value / 1000.0),
        "M" => Some(value),
        "G" => Some(value * 1000.0),
        _ => None,
    }
}

pub fn resolution_to_quality(_width: u32, height: u32) -> String {
    match height {
        h if h >= 4320 => "8K".to_string(),
        h if h >= 2160 => "4K".to_string(),
        h => format!("{}p", h),
    }
}

/// Latest known progress of one worker's current job, folded from
/// [`LineUpdate`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveProgress {
    pub phase: Phase,
    pub quality: Option<String>,
    pub percent: Option<f64>,
    pub speed: Option<String>,
    pub rate_mbps: Option<f64>,
    pub eta: Option<String>,
    pub total_size: Option<String>,
}

impl LiveProgress {
    pub fn apply(&mut self, update: LineUpdate) {
        if let Some(phase) = update.phase {
            self.phase = phase;
        }
        if update.ffmpeg_active
            && matches!(self.phase, Phase::Starting | Phase::Metadata | Phase::Preparing)
        {
            self.phase = Phase::Downloading;
        }
        if self.quality.is_none() {
            self.quality = update.quality;
        }
        self.percent = update.percent.or(self.percent);
        self.speed = update.speed.or(self.speed.take());
        self.rate_mbps = update.rate_mbps.or(self.rate_mbps);
        self.eta = update.eta.or(self.eta.take());
        self.total_size = update.total_size.or(self.total_size.take());
    }
}
