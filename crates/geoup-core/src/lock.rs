//! Cross-process advisory lock guarding an update run.
//!
//! Non-blocking exclusive lock through `fs2` (`flock` on unix, `LockFileEx`
//! on windows): a second run fails fast with `LockBusy` instead of queueing
//! behind the first. The lock is released when the `FileLock` is
//! dropped; writers hold a [`LockToken`] to check that it is still held.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;

use crate::error::{Result, UpdateError};

/// Held exclusive lock on a lock-file path.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    held: Arc<AtomicBool>,
    verbose: bool,
}

/// Read-only permission token handed to writers while the lock is held.
#[derive(Debug, Clone)]
pub struct LockToken {
    held: Arc<AtomicBool>,
    path: PathBuf,
}

impl LockToken {
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub fn lock_path(&self) -> &Path {
        &self.path
    }
}

impl FileLock {
    /// Create (if needed) and exclusively lock `path`. Never blocks.
    pub fn acquire(path: &Path, verbose: bool) -> Result<Self> {
        let lock_io = |source| UpdateError::LockIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(lock_io)?;
            }
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_io)?;

        if let Err(e) = try_lock_exclusive(&file) {
            if is_contended(&e) {
                return Err(UpdateError::LockBusy {
                    path: path.to_path_buf(),
                });
            }
            return Err(lock_io(e));
        }

        if verbose {
            tracing::info!(path = %path.display(), "acquired lock file");
        } else {
            tracing::debug!(path = %path.display(), "acquired lock file");
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            held: Arc::new(AtomicBool::new(true)),
            verbose,
        })
    }

    pub fn token(&self) -> LockToken {
        LockToken {
            held: Arc::clone(&self.held),
            path: self.path.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now instead of at drop. Failures are logged, not returned.
    pub fn release(self) {
        drop(self);
    }

    fn unlock(&self) -> io::Result<()> {
        if !self.held.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        unlock_file(&self.file)?;
        if self.verbose {
            tracing::info!(path = %self.path.display(), "released lock file");
        } else {
            tracing::debug!(path = %self.path.display(), "released lock file");
        }
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            tracing::error!(path = %self.path.display(), "error closing file lock: {}", e);
        }
    }
}

fn try_lock_exclusive(file: &File) -> io::Result<()> {
    FileExt::try_lock_exclusive(file)
}

fn unlock_file(file: &File) -> io::Result<()> {
    FileExt::unlock(file)
}

/// `fs2` reports contention as `WouldBlock` on unix and as a raw OS error on windows.
fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
