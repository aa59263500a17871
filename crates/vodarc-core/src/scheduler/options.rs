//! Per-invocation run configuration.

use std::path::PathBuf;

use super::order::JobOrder;
use crate::config::{ConfigError, DeliveryMode, VodConfig};
use crate::downloader::Cookies;
use crate::proxy::{self, ProxyMode};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_FRAGMENTS: usize = 10;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run_dir: PathBuf,
    /// Overrides the output directory remembered in `run.json`.
    pub output_dir: Option<PathBuf>,
    /// Worker tasks; 0 means [`DEFAULT_WORKERS`].
    pub workers: usize,
    /// Concurrent fragments per download; 0 means [`DEFAULT_FRAGMENTS`].
    pub fragments: usize,
    /// Per-download bandwidth cap in MB/s.
    pub download_limit_mbps: Option<f64>,
    pub proxy_mode: ProxyMode,
    pub proxies: Vec<String>,
    pub order: JobOrder,
    pub quality: String,
    pub delivery_mode: DeliveryMode,
    /// Dispatch at most this many jobs; 0 is unlimited.
    pub max_jobs: usize,
    /// Stop dispatching after the first retryable failure.
    pub stop_on_retryable: bool,
    /// Treat `failed_permanent` jobs as runnable.
    pub retry_permanent: bool,
    pub cookies: Cookies,
    pub subtitles: bool,
    pub sub_langs: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::new(),
            output_dir: None,
            workers: DEFAULT_WORKERS,
            fragments: DEFAULT_FRAGMENTS,
            download_limit_mbps: None,
            proxy_mode: ProxyMode::Off,
            proxies: Vec::new(),
            order: JobOrder::Oldest,
            quality: "best".to_string(),
            delivery_mode: DeliveryMode::Auto,
            max_jobs: 0,
            stop_on_retryable: false,
            retry_permanent: false,
            cookies: Cookies::default(),
            subtitles: false,
            sub_langs: "en".to_string(),
        }
    }
}

impl RunOptions {
    /// Options for `run_dir` seeded from the user's config file.
    pub fn from_config(cfg: &VodConfig, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            output_dir: None,
            workers: cfg.workers,
            fragments: cfg.fragments,
            download_limit_mbps: cfg.download_limit_mbps,
            proxy_mode: cfg.proxy_mode,
            proxies: cfg.proxies.clone(),
            order: cfg.order,
            quality: cfg.quality.clone(),
            delivery_mode: cfg.delivery_mode,
            max_jobs: 0,
            stop_on_retryable: false,
            retry_permanent: false,
            cookies: Cookies {
                file: cfg.cookies_path.clone(),
                from_browser: cfg.cookies_from_browser.clone(),
            },
            subtitles: cfg.subtitles,
            sub_langs: cfg.sub_langs.clone(),
        }
    }

    /// Fill defaults and clean up list inputs.
    pub fn normalized(mut self) -> Self {
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if self.fragments == 0 {
            self.fragments = DEFAULT_FRAGMENTS;
        }
        self.proxies = proxy::normalize_proxies(&self.proxies);
        if self.quality.trim().is_empty() {
            self.quality = "best".to_string();
        }
        self
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        proxy::validate(self.proxy_mode, self.workers, &self.proxies)?;
        if let Some(limit) = self.download_limit_mbps {
            if limit.is_nan() || limit <= 0.0 {
                return Err(ConfigError::InvalidRateLimit(limit));
            }
        }
        if let Some(file) = &self.cookies.file {
            if !file.is_file() {
                return Err(ConfigError::CookiesNotFound(file.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_fills_defaults() {
        let opts = RunOptions {
            workers: 0,
            fragments: 0,
            quality: " ".into(),
            proxies: vec![" http://a:1 ".into(), "http://a:1".into(), "".into()],
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.workers, DEFAULT_WORKERS);
        assert_eq!(opts.fragments, DEFAULT_FRAGMENTS);
        assert_eq!(opts.quality, "best");
        assert_eq!(opts.proxies, vec!["http://a:1".to_string()]);
    }

    #[test]
    fn validate_rejects_bad_config() {
        let opts = RunOptions {
            workers: 2,
            proxy_mode: ProxyMode::PerWorker,
            proxies: vec!["http://a:1".into()],
            ..Default::default()
        };
        assert_eq!(
            opts.validate(),
            Err(ConfigError::NotEnoughProxies { workers: 2, proxies: 1 })
        );

        let opts = RunOptions {
            download_limit_mbps: Some(0.0),
            ..Default::default()
        };
        assert_eq!(opts.validate(), Err(ConfigError::InvalidRateLimit(0.0)));

        let opts = RunOptions {
            cookies: Cookies {
                file: Some(PathBuf::from("/no/such/cookies.txt")),
                from_browser: None,
            },
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(ConfigError::CookiesNotFound(_))));
        assert!(RunOptions::default().validate().is_ok());
    }

    #[test]
    fn from_config_copies_fields() {
        let mut cfg = VodConfig::default();
        cfg.workers = 3;
        cfg.cookies_from_browser = Some("firefox".into());
        let opts = RunOptions::from_config(&cfg, "/runs/r1");
        assert_eq!(opts.workers, 3);
        assert_eq!(opts.run_dir, PathBuf::from("/runs/r1"));
        assert_eq!(opts.cookies.from_browser.as_deref(), Some("firefox"));
        assert!(opts.subtitles);
    }
}
