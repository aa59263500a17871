//! User configuration loaded from `~/.config/vodarc/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::proxy::ProxyMode;
use crate::scheduler::JobOrder;

/// How the download tool should pick formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryMode {
    /// Let the tool choose the best muxable formats.
    #[default]
    Auto,
    /// Prefer fragmented (DASH/HLS) formats that download in parallel pieces.
    Fragmented,
}

impl DeliveryMode {
    /// Lenient parse; anything unrecognized is `auto`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fragmented" => DeliveryMode::Fragmented,
            _ => DeliveryMode::Auto,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Auto => "auto",
            DeliveryMode::Fragmented => "fragmented",
        }
    }
}

impl From<String> for DeliveryMode {
    fn from(raw: String) -> Self {
        DeliveryMode::parse(&raw)
    }
}

impl From<DeliveryMode> for String {
    fn from(mode: DeliveryMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Rejected run configuration, reported before any job is touched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("proxy mode per_worker requires at least one proxy")]
    NoProxies,
    #[error("proxy mode per_worker needs one proxy per worker: {workers} workers, {proxies} proxies")]
    NotEnoughProxies { workers: usize, proxies: usize },
    #[error("invalid proxy URL {0:?}")]
    InvalidProxy(String),
    #[error("download rate limit must be positive, got {0}")]
    InvalidRateLimit(f64),
    #[error("cookies file not found: {}", .0.display())]
    CookiesNotFound(PathBuf),
}

/// Global configuration loaded from `~/.config/vodarc/config.toml`.
/// Command-line flags override these values for a single invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VodConfig {
    /// Directory holding one sub-directory per run.
    pub runs_dir: PathBuf,
    /// Concurrent download workers.
    pub workers: usize,
    /// Concurrent fragments per download (`-N`).
    pub fragments: usize,
    /// Quality label: best, 1080p, 720p, ...
    pub quality: String,
    pub delivery_mode: DeliveryMode,
    /// Dispatch order: oldest, newest or manifest.
    pub order: JobOrder,
    /// Per-download bandwidth cap in MB/s.
    pub download_limit_mbps: Option<f64>,
    pub proxy_mode: ProxyMode,
    pub proxies: Vec<String>,
    /// Fetch subtitles after each successful download.
    pub subtitles: bool,
    pub sub_langs: String,
    pub cookies_path: Option<PathBuf>,
    pub cookies_from_browser: Option<String>,
    /// Path of the yt-dlp executable; looked up on PATH when unset.
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for VodConfig {
    fn default() -> Self {
        Self {
            runs_dir: default_runs_dir(),
            workers: 5,
            fragments: 10,
            quality: "best".to_string(),
            delivery_mode: DeliveryMode::Auto,
            order: JobOrder::Oldest,
            download_limit_mbps: None,
            proxy_mode: ProxyMode::Off,
            proxies: Vec::new(),
            subtitles: true,
            sub_langs: "en".to_string(),
            cookies_path: None,
            cookies_from_browser: None,
            ytdlp_path: None,
        }
    }
}

fn default_runs_dir() -> PathBuf {
    xdg::BaseDirectories::with_prefix("vodarc")
        .map(|dirs| dirs.get_data_home().join("vodarc").join("runs"))
        .unwrap_or_else(|_| PathBuf::from("runs"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vodarc")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VodConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VodConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: VodConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = VodConfig::default();
        assert_eq!(cfg.workers, 5);
        assert_eq!(cfg.fragments, 10);
        assert_eq!(cfg.quality, "best");
        assert_eq!(cfg.order, JobOrder::Oldest);
        assert_eq!(cfg.proxy_mode, ProxyMode::Off);
        assert!(cfg.subtitles);
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = VodConfig::default();
        cfg.delivery_mode = DeliveryMode::Fragmented;
        cfg.proxy_mode = ProxyMode::PerWorker;
        cfg.proxies = vec!["http://p1:8080".into()];
        cfg.download_limit_mbps = Some(2.5);
        let toml = toml::to_string_pretty(&cfg).unwrap();
        assert!(toml.contains("delivery_mode = \"fragmented\""));
        assert!(toml.contains("proxy_mode = \"per_worker\""));
        let parsed: VodConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_toml_uses_defaults_and_lenient_enums() {
        let cfg: VodConfig = toml::from_str(
            r#"
workers = 2
order = "sideways"
delivery_mode = "FRAGMENTED"
proxy_mode = "bogus"
"#,
        )
        .unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.fragments, 10);
        assert_eq!(cfg.order, JobOrder::Oldest);
        assert_eq!(cfg.delivery_mode, DeliveryMode::Fragmented);
        assert_eq!(cfg.proxy_mode, ProxyMode::Off);
    }
}
