//! Remote side of the pipeline: conditional update requests against the
//! distribution service, run by a bounded pool of worker threads.
//!
//! Uses the curl crate (libcurl) with one `Easy2` handle per request.

mod client;
mod download;
mod handler;
mod parse;
mod reader;
mod resolve;

use serde::Serialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::resolver::DistributionEntry;
use crate::storage::LocalFileWriter;

pub use client::HttpClient;
pub use reader::RemoteReader;

/// Result of one edition's task that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// New content was verified and installed.
    Updated { bytes: u64, hash: String },
    /// The server reported the local copy as current; nothing was written.
    NotModified,
}

/// Per-edition report returned by [`RemoteReader::wait`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub edition: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
    pub elapsed_ms: u64,
}

/// Something that can bring one edition's file up to date.
pub trait DatabaseSource: Sync {
    fn fetch(&self, entry: &DistributionEntry, writer: &LocalFileWriter) -> Result<TaskOutcome>;
}

impl DatabaseSource for HttpClient {
    fn fetch(&self, entry: &DistributionEntry, writer: &LocalFileWriter) -> Result<TaskOutcome> {
        download::fetch_update(self, entry, writer)
    }
}
