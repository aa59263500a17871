//! Load and save `manifest.jobs.json`.

use std::path::Path;

use super::error::StoreError;
use super::fs;
use super::RunPaths;
use crate::model::Manifest;

pub fn read_manifest(path: &Path) -> Result<Manifest, StoreError> {
    fs::read_json(path)
}

pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), StoreError> {
    fs::write_json(path, manifest)
}

/// Read the jobs manifest of a run directory, defaulting an empty `run_id`
/// to the directory's base name.
pub fn load_run_manifest(paths: &RunPaths) -> Result<Manifest, StoreError> {
    let mut manifest = read_manifest(&paths.jobs_manifest)?;
    if manifest.run_id.is_empty() {
        manifest.run_id = paths.dir_name();
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Job, JobStatus, SourceInfo};

    #[test]
    fn load_defaults_run_id_to_dir_name() {
        let root = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(root.path().join("20240101T000000Z_chan"));
        let job = Job::new("chan:1:aaaaaa", 1, "aaaaaa", "https://x.test/a", "A", JobStatus::Pending, "")
            .unwrap();
        let manifest = Manifest::new("", SourceInfo::default(), vec![job]);
        write_manifest(&paths.jobs_manifest, &manifest).unwrap();

        let loaded = load_run_manifest(&paths).unwrap();
        assert_eq!(loaded.run_id, "20240101T000000Z_chan");
        assert_eq!(loaded.jobs, manifest.jobs);
        assert_eq!(loaded.counts.pending, 1);
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jobs.json");
        std::fs::write(
            &path,
            r#"{"schema_version":1,"jobs":[{"job_id":"a","index":1,"item_id":"x","status":"weird"}]}"#,
        )
        .unwrap();
        let err = read_manifest(&path).unwrap_err();
        assert!(matches!(err, StoreError::CorruptManifest { .. }), "{err}");
    }
}
