//! Startup repair of state left behind by an earlier invocation.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::model::{InvalidTransition, JobStatus, Manifest};
use crate::runstore::{fs as store_fs, StoreError};

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "m4v", "mov", "avi", "flv", "ts", "m4a", "mp3",
];
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".tmp"];

static OUTPUT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z0-9_-]{6,})\]\.[^.]+$").expect("valid regex"));

/// Move every `running` job to `failed_retryable`; only a crashed or killed
/// invocation leaves jobs running. Returns how many were reset.
pub fn reset_stale_running(manifest: &mut Manifest) -> Result<usize, InvalidTransition> {
    let mut reset = 0;
    for job in manifest
        .jobs
        .iter_mut()
        .filter(|job| job.status == JobStatus::Running)
    {
        job.transition(JobStatus::FailedRetryable, "interrupted_previous_run")?;
        if job.last_error.as_deref().map_or(true, str::is_empty) {
            job.last_error = Some("previous run interrupted while this job was running".into());
        }
        reset += 1;
    }
    Ok(reset)
}

/// Item id embedded in an output file name (`..._[<id>].<ext>`).
pub fn extract_item_id(file_name: &str) -> Option<&str> {
    OUTPUT_ID
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_media_file(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    if PARTIAL_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return false;
    }
    Path::new(&lower)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext))
}

/// Ids of finished media files anywhere under `root`. A missing root is
/// empty.
pub fn index_media_ids(root: &Path) -> Result<HashSet<String>, StoreError> {
    let mut ids = HashSet::new();
    if !root.exists() {
        return Ok(ids);
    }
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            StoreError::Io {
                op: "scan",
                source: e.into(),
                path,
            }
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_media_file(&name) {
            continue;
        }
        if let Some(id) = extract_item_id(&name) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Send `completed` jobs whose media is no longer under `output_dir` back to
/// `pending`. Returns their item ids.
pub fn reconcile_completed_with_disk(
    manifest: &mut Manifest,
    output_dir: &Path,
) -> anyhow::Result<Vec<String>> {
    if !manifest.jobs.iter().any(|job| job.status == JobStatus::Completed) {
        return Ok(Vec::new());
    }
    let present = index_media_ids(output_dir)?;

    let mut missing = Vec::new();
    for job in manifest.jobs.iter_mut() {
        if job.status != JobStatus::Completed {
            continue;
        }
        let id = job.item_id.trim();
        if id.is_empty() || present.contains(id) {
            continue;
        }
        job.transition(JobStatus::Pending, "missing_local_media")?;
        job.completed_at = None;
        job.last_error = Some("previously completed but media file is missing locally".into());
        missing.push(job.item_id.trim().to_string());
    }
    Ok(missing)
}

/// Drop archive lines whose last field is one of `ids`. The file is only
/// rewritten when something was removed. Returns the number of lines removed.
pub fn prune_download_archive(path: &Path, ids: &[String]) -> Result<usize, StoreError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::io("read", path)(e)),
    };
    let drop: HashSet<&str> = ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).collect();

    let mut kept = Vec::new();
    let mut removed = 0;
    for line in data.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line
            .split_whitespace()
            .last()
            .is_some_and(|id| drop.contains(id))
        {
            removed += 1;
            continue;
        }
        kept.push(line);
    }
    if removed == 0 {
        return Ok(0);
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    store_fs::write_bytes(path, out.as_bytes())?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Job, SourceInfo};

    fn manifest(entries: &[(&str, JobStatus)]) -> Manifest {
        let jobs = entries
            .iter()
            .enumerate()
            .map(|(i, (id, status))| {
                let mut job =
                    Job::new(Job::key("s", i as u32 + 1, id), i as u32 + 1, *id, "u", "", JobStatus::Pending, "")
                        .unwrap();
                job.status = *status;
                job
            })
            .collect();
        Manifest::new("r", SourceInfo::default(), jobs)
    }

    #[test]
    fn stale_running_jobs_become_retryable() {
        let mut m = manifest(&[("aaaaaa", JobStatus::Running), ("bbbbbb", JobStatus::Pending)]);
        m.jobs[0].last_error = Some(String::new());
        assert_eq!(reset_stale_running(&mut m).unwrap(), 1);
        let job = &m.jobs[0];
        assert_eq!(job.status, JobStatus::FailedRetryable);
        assert_eq!(job.reason, "interrupted_previous_run");
        assert_eq!(
            job.last_error.as_deref(),
            Some("previous run interrupted while this job was running")
        );
        assert!(job.status.is_runnable(false));
        assert_eq!(m.jobs[1].status, JobStatus::Pending);
    }

    #[test]
    fn extracts_bracketed_ids() {
        assert_eq!(extract_item_id("chan/20240101_Title_[dQw4w9WgXcQ].mp4"), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_item_id("x_[abc].mp4"), None);
        assert_eq!(extract_item_id("x_[abcdef].en.vtt"), None);
        assert!(is_media_file("a_[abcdef].MKV"));
        assert!(!is_media_file("a_[abcdef].mp4.part"));
        assert!(!is_media_file("a_[abcdef].f137.mp4.ytdl"));
        assert!(!is_media_file("a_[abcdef].jpg"));
    }

    #[test]
    fn missing_media_reverts_completed() {
        let out = tempfile::tempdir().unwrap();
        let sub = out.path().join("uploader");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("20240101_t_[aaaaaa].mp4"), b"x").unwrap();
        std::fs::write(sub.join("20240101_t_[bbbbbb].mp4.part"), b"x").unwrap();

        let mut m = manifest(&[
            ("aaaaaa", JobStatus::Completed),
            ("bbbbbb", JobStatus::Completed),
            ("cccccc", JobStatus::Pending),
        ]);
        m.jobs[1].completed_at = Some("2024-01-01T00:00:00Z".into());
        let missing = reconcile_completed_with_disk(&mut m, out.path()).unwrap();
        assert_eq!(missing, vec!["bbbbbb".to_string()]);
        assert_eq!(m.jobs[0].status, JobStatus::Completed);
        let b = &m.jobs[1];
        assert_eq!(b.status, JobStatus::Pending);
        assert_eq!(b.reason, "missing_local_media");
        assert_eq!(b.completed_at, None);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_media_counts_as_present() {
        let store = tempfile::tempdir().unwrap();
        let target = store.path().join("library.mp4");
        std::fs::write(&target, b"x").unwrap();
        let out = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(&target, out.path().join("x_[aaaaaaaa].mp4")).unwrap();
        std::os::unix::fs::symlink(store.path().join("gone.mp4"), out.path().join("y_[bbbbbbbb].mp4"))
            .unwrap();

        let ids = index_media_ids(out.path()).unwrap();
        assert!(ids.contains("aaaaaaaa"));
        assert!(ids.contains("bbbbbbbb"));

        let mut m = manifest(&[("aaaaaaaa", JobStatus::Completed)]);
        assert!(reconcile_completed_with_disk(&mut m, out.path()).unwrap().is_empty());
        assert_eq!(m.jobs[0].status, JobStatus::Completed);
    }

    #[test]
    fn missing_output_dir_reverts_everything_completed() {
        let out = tempfile::tempdir().unwrap();
        let mut m = manifest(&[("aaaaaa", JobStatus::Completed)]);
        let missing = reconcile_completed_with_disk(&mut m, &out.path().join("nope")).unwrap();
        assert_eq!(missing, vec!["aaaaaa".to_string()]);
    }

    #[test]
    fn prune_archive_rewrites_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download-archive.txt");
        std::fs::write(&path, "youtube aaaaaa\r\nyoutube bbbbbb\n\nyoutube cccccc\n").unwrap();

        assert_eq!(prune_download_archive(&path, &["zzzzzz".into()]).unwrap(), 0);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\r\n"));

        assert_eq!(prune_download_archive(&path, &["bbbbbb".into()]).unwrap(), 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "youtube aaaaaa\nyoutube cccccc\n"
        );

        let absent = dir.path().join("none.txt");
        assert_eq!(prune_download_archive(&absent, &["aaaaaa".into()]).unwrap(), 0);
        assert!(!absent.exists());
    }
}
