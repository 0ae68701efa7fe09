//! Temp file that hashes everything written to it.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Staging artifact for one download attempt. Dropping it without
/// [`LocalFileWriter::commit`](super::LocalFileWriter::commit) deletes the temp file.
pub struct StagedFile {
    pub(super) file: NamedTempFile,
    hasher: md5::Context,
    bytes: u64,
}

impl StagedFile {
    pub(super) fn new(file: NamedTempFile) -> Self {
        Self {
            file,
            hasher: md5::Context::new(),
            bytes: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Lowercase hex MD5 of everything written so far.
    pub fn digest(&self) -> String {
        format!("{:x}", self.hasher.clone().compute())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.consume(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl std::fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedFile")
            .field("temp_path", &self.file.path())
            .field("bytes", &self.bytes)
            .finish()
    }
}
