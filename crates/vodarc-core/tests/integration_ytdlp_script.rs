//! Integration test: the yt-dlp downloader against a stand-in shell script.
//!
//! The script records its arguments, fails with a rate-limit message for one
//! item and succeeds for the other.

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use common::{find, job, load, make_run, options};
use tempfile::tempdir;
use vodarc_core::downloader::YtDlp;
use vodarc_core::model::JobStatus;

#[tokio::test]
async fn ytdlp_output_is_logged_and_failures_classified() {
    let root = tempdir().unwrap();
    let run_dir = make_run(
        root.path(),
        vec![
            job(1, "okitem01", JobStatus::Pending),
            job(2, "ratelim1", JobStatus::Pending),
        ],
    );
    let args_file = root.path().join("args.txt");
    let script = root.path().join("fake-yt-dlp");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\n\
             printf '%s\\n' \"$@\" >> '{}'\n\
             for last; do :; done\n\
             case \"$last\" in\n\
             *ratelim1) echo 'ERROR: HTTP Error 429: Too Many Requests' >&2; exit 1 ;;\n\
             esac\n\
             echo '[download] 100% of 1.00MiB at 2.00MiB/s ETA 00:00'\n",
            args_file.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut opts = options(&run_dir);
    opts.download_limit_mbps = Some(2.5);
    let summary = vodarc_core::scheduler::run(opts, Arc::new(YtDlp::new(&script)), None)
        .await
        .expect("run");
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed_retryable, 1);

    let manifest = load(&run_dir);
    assert_eq!(find(&manifest, "okitem01").status, JobStatus::Completed);
    let failed = find(&manifest, "ratelim1");
    assert_eq!(failed.status, JobStatus::FailedRetryable);
    assert_eq!(failed.reason, "transient_or_rate_limited");
    let last_error = failed.last_error.as_deref().unwrap();
    assert!(last_error.starts_with("yt-dlp failed: exit status: 1"), "{last_error}");
    assert!(last_error.contains("HTTP Error 429"));

    let ok_log = std::fs::read_to_string(run_dir.join("logs").join("0001_okitem01.log")).unwrap();
    assert!(ok_log.contains("[download] 100% of 1.00MiB"));
    let failed_log =
        std::fs::read_to_string(run_dir.join("logs").join("0002_ratelim1.log")).unwrap();
    assert!(failed_log.contains("HTTP Error 429: Too Many Requests"));

    let args: Vec<String> = std::fs::read_to_string(&args_file)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert!(args.iter().any(|a| a == "--limit-rate"));
    assert!(args.iter().any(|a| a == "2.5M"));
    assert!(args.iter().any(|a| a == "--download-archive"));
    assert!(args.iter().any(|a| a == "https://v.test/watch?v=okitem01"));
}
