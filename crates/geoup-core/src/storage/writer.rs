//! Writer that installs one database file atomically.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::checksum;
use crate::error::{Result, UpdateError};
use crate::lock::LockToken;

use super::staged::StagedFile;
use super::{temp_prefix, TEMP_SUFFIX};

/// Behaviour switches for [`LocalFileWriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterOptions {
    pub verbose: bool,
    /// Set the installed file's mtime to the server's Last-Modified.
    pub preserve_file_times: bool,
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub bytes: u64,
    pub hash: String,
}

/// Writes one target path. Only constructed while the run's lock is held.
#[derive(Debug, Clone)]
pub struct LocalFileWriter {
    path: PathBuf,
    lock: LockToken,
    opts: WriterOptions,
}

impl LocalFileWriter {
    pub fn new(path: impl Into<PathBuf>, lock: Option<LockToken>, opts: WriterOptions) -> Result<Self> {
        let path = path.into();
        let lock = lock.ok_or_else(|| {
            UpdateError::InvariantViolation(format!(
                "database writer for {} created without a lock",
                path.display()
            ))
        })?;
        if !lock.is_held() {
            return Err(UpdateError::InvariantViolation(format!(
                "lock {} is not held",
                lock.lock_path().display()
            )));
        }
        if path.file_name().is_none() {
            return Err(UpdateError::InvariantViolation(format!(
                "target {} has no file name",
                path.display()
            )));
        }
        Ok(Self { path, lock, opts })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// MD5 of the installed file, or the zero hash when there is none yet.
    pub fn current_hash(&self) -> Result<String> {
        checksum::md5_or_zero(&self.path)
            .map_err(|e| UpdateError::write_io(format!("hash {}", self.path.display()), e))
    }

    /// Create an exclusive temp file in the target's directory.
    pub fn stage(&self) -> Result<StagedFile> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let name = self.path.file_name().unwrap_or_default();
        let prefix = temp_prefix(name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(TEMP_SUFFIX);
        #[cfg(unix)]
        builder.permissions(new_file_permissions());
        let file = builder
            .tempfile_in(dir)
            .map_err(|e| UpdateError::write_io(format!("create temp file in {}", dir.display()), e))?;
        tracing::trace!(temp = %file.path().display(), "staging download");
        Ok(StagedFile::new(file))
    }

    /// Verify `staged` against `expected` and rename it over the target.
    /// On any error the temp file is removed and the target is untouched.
    pub fn commit(
        &self,
        mut staged: StagedFile,
        expected: &str,
        last_modified: Option<SystemTime>,
    ) -> Result<Committed> {
        let actual = staged.digest();
        if !checksum::digests_match(&actual, expected) {
            return Err(UpdateError::VerifyMismatch {
                expected: expected.trim().to_ascii_lowercase(),
                actual,
            });
        }

        let temp_display = staged.temp_path().display().to_string();
        staged
            .flush()
            .and_then(|_| staged.file.as_file().sync_all())
            .map_err(|e| UpdateError::write_io(format!("sync {}", temp_display), e))?;
        keep_target_mode(&self.path, staged.file.as_file())
            .map_err(|e| UpdateError::write_io(format!("chmod {}", temp_display), e))?;
        if self.opts.preserve_file_times {
            if let Some(t) = last_modified {
                staged
                    .file
                    .as_file()
                    .set_modified(t)
                    .map_err(|e| UpdateError::write_io(format!("set mtime on {}", temp_display), e))?;
            }
        }

        if !self.lock.is_held() {
            return Err(UpdateError::InvariantViolation(format!(
                "lock {} released before installing {}",
                self.lock.lock_path().display(),
                self.path.display()
            )));
        }

        let bytes = staged.bytes_written();
        staged.file.persist(&self.path).map_err(|e| {
            UpdateError::write_io(
                format!("rename {} to {}", temp_display, self.path.display()),
                e.error,
            )
        })?;
        sync_parent_dir(&self.path);

        if self.opts.verbose {
            tracing::info!(bytes, path = %self.path.display(), "installed database");
        } else {
            tracing::debug!(bytes, path = %self.path.display(), "installed database");
        }
        Ok(Committed { bytes, hash: actual })
    }

    /// Stream `src` to a staged file and commit it against `expected`.
    pub fn write<R: Read>(&self, mut src: R, expected: &str) -> Result<Committed> {
        let mut staged = self.stage()?;
        io::copy(&mut src, &mut staged).map_err(|e| {
            UpdateError::write_io(format!("write {}", staged.temp_path().display()), e)
        })?;
        self.commit(staged, expected, None)
    }
}

/// Mode requested for a new database file; the process umask applies on create.
#[cfg(unix)]
fn new_file_permissions() -> std::fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    std::fs::Permissions::from_mode(0o644)
}

/// An update keeps the mode of the file it replaces.
fn keep_target_mode(target: &Path, staged: &std::fs::File) -> io::Result<()> {
    match std::fs::metadata(target) {
        Ok(meta) => staged.set_permissions(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Best-effort fsync of the directory so the rename itself is durable.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
            tracing::debug!(dir = %dir.display(), "directory fsync failed: {}", e);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
