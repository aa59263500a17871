//! Atomic file helpers shared by every state file in a run directory.
//!
//! Writes go to a hidden temp file in the target's directory, are fsynced and
//! then renamed over the target, so readers see either the old or the new
//! contents and never a partial file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::error::StoreError;

const TEMP_PREFIX: &str = ".vodarc-tmp-";

pub fn mkdir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(StoreError::io("create directory", path))
}

/// Durably replace `path` with `data`.
pub fn write_bytes(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    mkdir(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(StoreError::io("create temp file in", dir))?;
    tmp.write_all(data)
        .map_err(StoreError::io("write temp file for", path))?;
    tmp.as_file()
        .sync_all()
        .map_err(StoreError::io("sync temp file for", path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(StoreError::io("chmod temp file for", path))?;
    }

    tmp.persist(path)
        .map_err(|e| StoreError::io("replace", path)(e.error))?;
    Ok(())
}

/// Pretty JSON with a trailing newline, written atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    data.push(b'\n');
    write_bytes(path, &data)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = fs::read(path).map_err(StoreError::io("read", path))?;
    serde_json::from_slice(&data).map_err(|source| StoreError::CorruptManifest {
        path: path.to_path_buf(),
        source,
    })
}
