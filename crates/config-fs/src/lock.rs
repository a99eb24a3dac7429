//! Advisory locks guarding a local mirror directory
//!
//! The in-process repository mutex serializes threads; this lock additionally
//! keeps two server processes sharing a base directory from mutating the same
//! mirror at once.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Exclusive advisory lock held on `<dir>.lock` until dropped.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Acquire the lock for `dir`, blocking until it is available.
    ///
    /// The lock file lives beside the directory so that deleting the
    /// directory (failed clone cleanup) does not drop the lock.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = lock_path(dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        file.lock_exclusive()
            .map_err(|_| Error::LockFailed { path: path.clone() })?;

        tracing::trace!(path = %path.display(), "Acquired mirror lock");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to release mirror lock"
            );
        }
    }
}

fn lock_path(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mirror".to_string());
    dir.with_file_name(format!(".{}.lock", name))
}
