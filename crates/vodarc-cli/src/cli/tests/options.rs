//! Tests for turning config plus flags into run options.

use super::parse;
use crate::cli::{run_options, CliCommand, RunFlags};
use std::path::PathBuf;
use vodarc_core::config::{DeliveryMode, VodConfig};
use vodarc_core::proxy::ProxyMode;
use vodarc_core::scheduler::JobOrder;

fn flags(args: &[&str]) -> RunFlags {
    let mut argv = vec!["vodarc", "run", "--latest"];
    argv.extend_from_slice(args);
    match parse(&argv) {
        CliCommand::Run { flags, .. } => flags,
        _ => panic!("expected Run"),
    }
}

#[test]
fn config_values_apply_without_flags() {
    let cfg = VodConfig {
        workers: 3,
        quality: "720p".into(),
        proxies: vec!["http://a:1".into()],
        cookies_from_browser: Some("firefox".into()),
        subtitles: true,
        ..Default::default()
    };
    let opts = run_options(&cfg, PathBuf::from("/r"), &flags(&[]));
    assert_eq!(opts.run_dir, PathBuf::from("/r"));
    assert_eq!(opts.workers, 3);
    assert_eq!(opts.quality, "720p");
    assert_eq!(opts.proxies, vec!["http://a:1".to_string()]);
    assert_eq!(opts.cookies.from_browser.as_deref(), Some("firefox"));
    assert!(opts.subtitles);
    assert_eq!(opts.output_dir, None);
}

#[test]
fn flags_override_config() {
    let cfg = VodConfig {
        subtitles: true,
        ..Default::default()
    };
    let opts = run_options(
        &cfg,
        PathBuf::from("/r"),
        &flags(&[
            "--workers",
            "8",
            "--quality",
            "1080p",
            "--delivery-mode",
            "fragmented",
            "--order",
            "manifest",
            "--proxy-mode",
            "per_worker",
            "--proxy",
            "http://p:1",
            "--output-dir",
            "/media",
            "--no-subtitles",
            "--sub-langs",
            "en,de",
        ]),
    );
    assert_eq!(opts.workers, 8);
    assert_eq!(opts.quality, "1080p");
    assert_eq!(opts.delivery_mode, DeliveryMode::Fragmented);
    assert_eq!(opts.order, JobOrder::Manifest);
    assert_eq!(opts.proxy_mode, ProxyMode::PerWorker);
    assert_eq!(opts.proxies, vec!["http://p:1".to_string()]);
    assert_eq!(opts.output_dir, Some(PathBuf::from("/media")));
    assert!(!opts.subtitles);
    assert_eq!(opts.sub_langs, "en,de");
}
