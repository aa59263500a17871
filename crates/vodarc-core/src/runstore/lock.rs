//! Cross-process exclusion over a run directory.
//!
//! The lock is the `.run.lock` directory: `create_dir` either creates it or
//! fails because another process holds it. The holder records itself in
//! `owner.json` so a refused caller can say who has the run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::fs as store_fs;
use crate::model::now_rfc3339;

pub const LOCK_DIR_NAME: &str = ".run.lock";
const OWNER_FILE: &str = "owner.json";

/// Who holds a run lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            created_at: now_rfc3339(),
            hostname: hostname().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("run directory is locked: {}{}", .run_dir.display(), owner_suffix(.owner))]
    Locked {
        run_dir: PathBuf,
        owner: Option<LockOwner>,
    },
    #[error("{op} run lock {}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write run lock owner")]
    Owner(#[source] StoreError),
}

fn owner_suffix(owner: &Option<LockOwner>) -> String {
    match owner {
        Some(o) => format!(" (pid={} created_at={} host={})", o.pid, o.created_at, o.hostname),
        None => String::new(),
    }
}

/// Held run lock. Released on drop; call [`RunLock::release`] to see errors.
#[derive(Debug)]
pub struct RunLock {
    lock_dir: PathBuf,
    released: bool,
}

impl RunLock {
    pub fn acquire(run_dir: &Path) -> Result<Self, LockError> {
        let lock_dir = run_dir.join(LOCK_DIR_NAME);
        if let Err(e) = fs::create_dir(&lock_dir) {
            if e.kind() == io::ErrorKind::AlreadyExists {
                return Err(LockError::Locked {
                    run_dir: run_dir.to_path_buf(),
                    owner: read_lock_owner(run_dir),
                });
            }
            return Err(LockError::Io {
                op: "create",
                path: lock_dir,
                source: e,
            });
        }

        let owner = LockOwner::current();
        if let Err(e) = write_owner(&lock_dir.join(OWNER_FILE), &owner) {
            let _ = fs::remove_dir_all(&lock_dir);
            return Err(LockError::Owner(e));
        }
        tracing::debug!(run_dir = %run_dir.display(), pid = owner.pid, "acquired run lock");

        Ok(Self {
            lock_dir,
            released: false,
        })
    }

    /// Remove the marker with whatever it holds. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        match fs::remove_dir_all(&self.lock_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(LockError::Io {
                    op: "remove",
                    path: self.lock_dir.clone(),
                    source: e,
                })
            }
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(
                lock = %self.lock_dir.display(),
                "failed to release run lock: {:#}",
                anyhow::Error::from(e)
            );
        }
    }
}

fn write_owner(path: &Path, owner: &LockOwner) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(owner).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, bytes).map_err(StoreError::io("write", path))
}

/// Owner of the lock currently held on `run_dir`, if any and readable.
pub fn read_lock_owner(run_dir: &Path) -> Option<LockOwner> {
    store_fs::read_json(&run_dir.join(LOCK_DIR_NAME).join(OWNER_FILE)).ok()
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|h| !h.is_empty())
}
