use crate::infrastructure::error::InfraError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock held for the lifetime of one alerting run.
///
/// Scheduled invocations can overlap while a dialog is open; the lock keeps
/// them from racing on the alert cache.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Returns `Ok(None)` when another invocation already holds the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, InfraError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|error| {
                InfraError::Lock(format!("cannot open {}: {error}", path.display()))
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(error) if error.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(error) => Err(InfraError::Lock(format!(
                "cannot lock {}: {error}",
                path.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
