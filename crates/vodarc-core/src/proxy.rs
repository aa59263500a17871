//! Per-worker egress proxy assignment.
//!
//! In `per_worker` mode worker `n` (1-based) always uses `proxies[n-1]`, so
//! one worker's traffic never moves between proxies during a run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProxyMode {
    #[default]
    Off,
    PerWorker,
}

impl ProxyMode {
    /// Lenient parse; empty, `off` and unknown values all mean `off`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "per_worker" => ProxyMode::PerWorker,
            _ => ProxyMode::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProxyMode::Off => "off",
            ProxyMode::PerWorker => "per_worker",
        }
    }
}

impl From<String> for ProxyMode {
    fn from(raw: String) -> Self {
        ProxyMode::parse(&raw)
    }
}

impl From<ProxyMode> for String {
    fn from(mode: ProxyMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Trim entries, drop empties and duplicates, keep first-seen order.
pub fn normalize_proxies<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in raw {
        let entry = entry.as_ref().trim();
        if entry.is_empty() || !seen.insert(entry.to_string()) {
            continue;
        }
        out.push(entry.to_string());
    }
    out
}

/// Check that `per_worker` mode has a usable proxy for every worker.
pub fn validate(mode: ProxyMode, workers: usize, proxies: &[String]) -> Result<(), ConfigError> {
    if mode == ProxyMode::Off {
        return Ok(());
    }
    if proxies.is_empty() {
        return Err(ConfigError::NoProxies);
    }
    if proxies.len() < workers {
        return Err(ConfigError::NotEnoughProxies {
            workers,
            proxies: proxies.len(),
        });
    }
    for proxy in proxies {
        let has_host = url::Url::parse(proxy)
            .map(|u| u.host_str().is_some_and(|h| !h.is_empty()))
            .unwrap_or(false);
        if !has_host {
            return Err(ConfigError::InvalidProxy(proxy.clone()));
        }
    }
    Ok(())
}

/// Proxy for 1-based `worker_id`, or `None` when off or out of range.
pub fn proxy_for_worker(worker_id: usize, mode: ProxyMode, proxies: &[String]) -> Option<&str> {
    if mode != ProxyMode::PerWorker || worker_id == 0 {
        return None;
    }
    proxies.get(worker_id - 1).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_mode_is_lenient() {
        assert_eq!(ProxyMode::parse(""), ProxyMode::Off);
        assert_eq!(ProxyMode::parse("off"), ProxyMode::Off);
        assert_eq!(ProxyMode::parse(" Per_Worker "), ProxyMode::PerWorker);
        assert_eq!(ProxyMode::parse("round_robin"), ProxyMode::Off);
    }

    #[test]
    fn normalize_trims_and_dedupes() {
        let got = normalize_proxies([" http://a:1 ", "", "http://b:2", "http://a:1", "  "]);
        assert_eq!(got, list(&["http://a:1", "http://b:2"]));
    }

    #[test]
    fn proxy_for_worker_in_and_out_of_range() {
        let proxies = list(&["http://a:1", "http://b:2"]);
        assert_eq!(proxy_for_worker(1, ProxyMode::PerWorker, &proxies), Some("http://a:1"));
        assert_eq!(proxy_for_worker(2, ProxyMode::PerWorker, &proxies), Some("http://b:2"));
        assert_eq!(proxy_for_worker(3, ProxyMode::PerWorker, &proxies), None);
        assert_eq!(proxy_for_worker(0, ProxyMode::PerWorker, &proxies), None);
        assert_eq!(proxy_for_worker(1, ProxyMode::Off, &proxies), None);
    }

    #[test]
    fn validate_per_worker() {
        let proxies = list(&["http://a:1", "socks5://b:2"]);
        assert!(validate(ProxyMode::Off, 10, &[]).is_ok());
        assert!(validate(ProxyMode::PerWorker, 2, &proxies).is_ok());
        assert_eq!(validate(ProxyMode::PerWorker, 1, &[]), Err(ConfigError::NoProxies));
        assert_eq!(
            validate(ProxyMode::PerWorker, 3, &proxies),
            Err(ConfigError::NotEnoughProxies { workers: 3, proxies: 2 })
        );
        let bad = list(&["http://a:1", "not a proxy"]);
        assert_eq!(
            validate(ProxyMode::PerWorker, 2, &bad),
            Err(ConfigError::InvalidProxy("not a proxy".into()))
        );
    }
}
