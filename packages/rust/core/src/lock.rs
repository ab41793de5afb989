//! Exclusive per-industry run lock.
//!
//! A `run.lock` file is created with create-new semantics under the
//! industry's data directory and removed when the guard drops. A crash leaves
//! the file behind; `sourcescout unlock` clears it.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use sourcescout_shared::{Industry, Result, SourceScoutError};

/// File name of the lock inside `<data_dir>/<industry>/`.
pub const LOCK_FILE_NAME: &str = "run.lock";

/// Path of an industry's lock file.
pub fn lock_path(data_dir: &Path, industry: &Industry) -> PathBuf {
    data_dir.join(industry.as_str()).join(LOCK_FILE_NAME)
}

/// Held for the duration of a run; releases the lock on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock for `industry`, failing with [`SourceScoutError::Locked`]
    /// if another run holds it.
    pub fn acquire(data_dir: &Path, industry: &Industry) -> Result<Self> {
        let path = lock_path(data_dir, industry);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SourceScoutError::io(parent, e))?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SourceScoutError::Locked {
                    industry: industry.to_string(),
                    path,
                });
            }
            Err(e) => return Err(SourceScoutError::io(&path, e)),
        };

        write_stamp(&mut file, &path)?;

        debug!(path = %path.display(), "run lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove a stale lock. Returns `false` if none existed.
    pub fn clear(data_dir: &Path, industry: &Industry) -> Result<bool> {
        let path = lock_path(data_dir, industry);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SourceScoutError::io(&path, e)),
        }
    }

    /// Contents of an existing lock file, if any.
    pub fn inspect(data_dir: &Path, industry: &Industry) -> Option<String> {
        std::fs::read_to_string(lock_path(data_dir, industry)).ok()
    }
}

/// Write the owner stamp into a freshly created lock file. A lock that could
/// not be stamped is removed so it does not block later runs.
fn write_stamp(file: &mut impl Write, path: &Path) -> Result<()> {
    let contents = format!(
        "pid={}\nstarted_at={}\n",
        std::process::id(),
        Utc::now().to_rfc3339()
    );
    if let Err(e) = file.write_all(contents.as_bytes()) {
        if let Err(rm) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %rm, "failed to remove unstamped run lock");
        }
        return Err(SourceScoutError::io(path, e));
    }
    Ok(())
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ss_lock_{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn second_acquire_fails_until_released() {
        let dir = data_dir();
        let industry = Industry::new("fintech").unwrap();

        let lock = RunLock::acquire(&dir, &industry).unwrap();
        assert!(lock.path().exists());
        assert!(RunLock::inspect(&dir, &industry).unwrap().contains("pid="));

        let err = RunLock::acquire(&dir, &industry).unwrap_err();
        assert!(matches!(err, SourceScoutError::Locked { .. }));

        drop(lock);
        assert!(RunLock::acquire(&dir, &industry).is_ok());
    }

    #[test]
    fn industries_lock_independently() {
        let dir = data_dir();
        let _a = RunLock::acquire(&dir, &Industry::new("fintech").unwrap()).unwrap();
        assert!(RunLock::acquire(&dir, &Industry::new("biotech").unwrap()).is_ok());
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_stamp_removes_lock_file() {
        let dir = data_dir();
        let industry = Industry::new("fintech").unwrap();
        let path = lock_path(&dir, &industry);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();

        let err = write_stamp(&mut FullDisk, &path).unwrap_err();
        assert!(matches!(err, SourceScoutError::Io { .. }));
        assert!(!path.exists());
        assert!(RunLock::acquire(&dir, &industry).is_ok());
    }

    #[test]
    fn clear_removes_stale_lock() {
        let dir = data_dir();
        let industry = Industry::new("fintech").unwrap();
        let lock = RunLock::acquire(&dir, &industry).unwrap();
        // Simulate a crashed run that never dropped its guard.
        std::mem::forget(lock);

        assert!(RunLock::clear(&dir, &industry).unwrap());
        assert!(!RunLock::clear(&dir, &industry).unwrap());
        assert!(RunLock::acquire(&dir, &industry).is_ok());
    }
}
