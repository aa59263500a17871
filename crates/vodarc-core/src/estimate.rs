//! Advisory size and ETA accounting.
//!
//! Sizes come from the source metadata saved as `manifest.raw.json`
//! (`filesize`, then `filesize_approx`, then `duration` times a bitrate
//! guessed from the quality label). Nothing here affects scheduling.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::model::{Job, JobStatus};

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    filesize: Option<f64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

impl RawEntry {
    fn size_bytes(&self, quality: &str) -> Option<u64> {
        let positive = |v: Option<f64>| v.filter(|v| *v > 0.0);
        if let Some(size) = positive(self.filesize).or_else(|| positive(self.filesize_approx)) {
            return Some(size.round() as u64);
        }
        positive(self.duration).map(|secs| estimate_bytes_from_duration(secs, quality))
    }
}

/// Known byte sizes per item id for one run.
#[derive(Debug, Clone, Default)]
pub struct SizeEstimator {
    bytes_by_id: HashMap<String, u64>,
    total_bytes: u64,
}

impl SizeEstimator {
    /// Build from `raw_path`. A missing or unreadable file gives an empty
    /// estimator.
    pub fn load(raw_path: &Path, jobs: &[Job], quality: &str) -> Self {
        match std::fs::read(raw_path) {
            Ok(data) => Self::from_raw_json(&data, jobs, quality),
            Err(e) => {
                tracing::debug!(path = %raw_path.display(), "no size metadata: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_raw_json(data: &[u8], jobs: &[Job], quality: &str) -> Self {
        let raw: RawManifest = match serde_json::from_slice(data) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("ignoring unparseable size metadata: {}", e);
                return Self::default();
            }
        };

        let mut bytes_by_id = HashMap::new();
        for entry in &raw.entries {
            let Some(id) = entry.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) else {
                continue;
            };
            if let Some(size) = entry.size_bytes(quality) {
                bytes_by_id.insert(id.to_string(), size);
            }
        }

        let total_bytes = jobs
            .iter()
            .filter(|job| job.status != JobStatus::SkippedPrivate)
            .filter_map(|job| bytes_by_id.get(job.item_id.trim()))
            .sum();

        Self {
            bytes_by_id,
            total_bytes,
        }
    }

    pub fn has_estimate(&self) -> bool {
        self.total_bytes > 0
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_for(&self, item_id: &str) -> Option<u64> {
        self.bytes_by_id.get(item_id.trim()).copied()
    }

    /// Known bytes of completed jobs, never more than [`Self::total_bytes`].
    pub fn completed_bytes(&self, jobs: &[Job]) -> u64 {
        let done: u64 = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Completed)
            .filter_map(|job| self.bytes_by_id.get(job.item_id.trim()))
            .sum();
        done.min(self.total_bytes)
    }
}

/// Typical video bitrate in Mb/s for a quality label.
pub fn estimate_mbps_for_quality(quality: &str) -> f64 {
    match quality.trim().to_ascii_lowercase().as_str() {
        "720p" | "720" | "sd" | "small" => 3.5,
        "1080p" | "1080" | "hd" => 6.0,
        _ => 8.0,
    }
}

pub fn estimate_bytes_from_duration(seconds: f64, quality: &str) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    let bits_per_sec = estimate_mbps_for_quality(quality) * 1_000_000.0;
    (seconds * bits_per_sec / 8.0).round() as u64
}

/// Time left to move the remaining bytes at `rate_mbps`. Empty when the
/// inputs cannot produce an estimate.
pub fn estimate_total_eta(total_bytes: u64, done_bytes: u64, rate_mbps: f64) -> String {
    if total_bytes == 0 || rate_mbps <= 0.0 {
        return String::new();
    }
    let remaining = total_bytes.saturating_sub(done_bytes);
    if remaining == 0 {
        return "0m".to_string();
    }
    let bytes_per_sec = rate_mbps * 1_000_000.0 / 8.0;
    format_eta(remaining as f64 / bytes_per_sec)
}

/// Coarse duration: `<1m`, `Nm`, `Nh`, `Nh Mm`, `Nd`, `Nd Nh`.
pub fn format_eta(seconds: f64) -> String {
    let seconds = seconds.round() as u64;
    if seconds < 60 {
        return "<1m".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours < 24 {
        return if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        };
    }
    let (days, hours) = (hours / 24, hours % 24);
    if hours == 0 {
        format!("{}d", days)
    } else {
        format!("{}d {}h", days, hours)
    }
}

/// Human-readable size with binary units (`1.5 GiB`).
pub fn format_bytes_iec(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
