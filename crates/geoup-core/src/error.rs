//! Error type shared by the lock, writer, reader and orchestrator.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpdateError>;

#[derive(Debug, Error)]
pub enum UpdateError {
    /// Another process holds the lock file.
    #[error("lock file {} is held by another process", path.display())]
    LockBusy { path: PathBuf },

    #[error("lock file {}", path.display())]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filename lookup for an edition failed.
    #[error("error retrieving filename for {edition}: {reason}")]
    Resolve { edition: String, reason: String },

    /// Transport failure (DNS, connect, timeout, reset).
    #[error("network error: {0}")]
    Network(curl::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u32, body: String },

    /// Response was missing or had a malformed header the protocol requires.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("MD5 of new database ({actual}) does not match expected MD5 ({expected})")]
    VerifyMismatch { expected: String, actual: String },

    #[error("{context}")]
    WriteIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// First failed edition in enqueue order.
    #[error("download error for {edition}")]
    Download {
        edition: String,
        #[source]
        source: Box<UpdateError>,
    },
}

impl From<curl::Error> for UpdateError {
    fn from(e: curl::Error) -> Self {
        UpdateError::Network(e)
    }
}

impl UpdateError {
    /// This error and its causes, `: `-separated, for log lines.
    pub fn display_chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(e) = cause {
            out.push_str(": ");
            out.push_str(&e.to_string());
            cause = std::error::Error::source(e);
        }
        out
    }

    pub(crate) fn write_io(context: impl Into<String>, source: std::io::Error) -> Self {
        UpdateError::WriteIo {
            context: context.into(),
            source,
        }
    }

    /// Edition named by an aggregate download error, if this is one.
    pub fn failed_edition(&self) -> Option<&str> {
        match self {
            UpdateError::Download { edition, .. } => Some(edition),
            _ => None,
        }
    }
}
