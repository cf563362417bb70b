//! Process-level run lock.
//!
//! One reconciliation run per process tree: the daemon and ad-hoc
//! invocations both take this lock, so two concurrent runs can never race
//! each other on the token cache or a partition.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use adrecon_types::AdreconError;

/// Default lock file, relative to the working directory.
pub const DEFAULT_PID_FILE: &str = "service.pid";

/// Held PID lock; the file is removed on drop.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Acquire the lock at `path`.
    ///
    /// # Errors
    /// [`AdreconError::Config`] when another live process holds the lock.
    /// A lock file whose owner is gone is treated as stale and reclaimed.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, AdreconError> {
        let path = path.into();
        if let Some(existing) = read_pid(&path) {
            if process_alive(existing) {
                return Err(AdreconError::config(format!(
                    "another run is in flight (pid {existing}, lock {})",
                    path.display()
                )));
            }
            warn!(pid = existing, "reclaiming stale pid lock");
        }
        std::fs::write(&path, std::process::id().to_string())?;
        info!(pid = std::process::id(), lock = %path.display(), "pid lock acquired");
        Ok(Self { path })
    }

    /// Acquire the default working-directory lock.
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    pub fn acquire_default() -> Result<Self, AdreconError> {
        Self::acquire(DEFAULT_PID_FILE)
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    // Without a portable liveness probe, assume a present lock file means
    // a live owner; operators can delete a stale file by hand.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_excludes_second_acquirer_and_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.pid");

        let lock = PidLock::acquire(&path).unwrap();
        // Same (live) process already owns it.
        assert!(PidLock::acquire(&path).is_err());
        drop(lock);
        assert!(!path.exists());

        let _relock = PidLock::acquire(&path).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.pid");
        // A pid that can't exist on Linux (beyond pid_max).
        std::fs::write(&path, "4999999").unwrap();
        let _lock = PidLock::acquire(&path).unwrap();
    }
}
