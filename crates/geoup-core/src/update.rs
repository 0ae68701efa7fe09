//! The update run: lock, resolve every edition, queue, wait.
//!
//! Lock and filename failures are pre-flight and abort the run; download
//! failures are independent per edition and surface as one aggregate error
//! after every queued edition has finished.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::Config;
use crate::error::{Result, UpdateError};
use crate::fetch::{DatabaseSource, HttpClient, RemoteReader, TaskOutcome, TaskReport};
use crate::lock::FileLock;
use crate::resolver::Resolver;
use crate::retry::RetryPolicy;
use crate::storage::{LocalFileWriter, WriterOptions};

/// What a successful run did, one report per edition in config order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSummary {
    pub reports: Vec<TaskReport>,
}

impl UpdateSummary {
    pub fn updated(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Updated { .. }))
            .count()
    }

    pub fn not_modified(&self) -> usize {
        self.reports.len() - self.updated()
    }
}

/// Run an update against the configured distribution service.
pub fn run(cfg: &Config) -> Result<UpdateSummary> {
    let client = HttpClient::from_config(cfg);
    let reader = RemoteReader::new(client.clone(), cfg.parallelism)
        .with_retry(RetryPolicy::from(&cfg.retry_config()))
        .with_verbose(cfg.verbose);
    run_with(cfg, &client, reader)
}

/// Like [`run`] with the resolver and reader supplied by the caller.
pub fn run_with<R, S>(cfg: &Config, resolver: &R, mut reader: RemoteReader<S>) -> Result<UpdateSummary>
where
    R: Resolver,
    S: DatabaseSource,
{
    let lock = FileLock::acquire(&cfg.lock_path(), cfg.verbose)?;
    let opts = WriterOptions {
        verbose: cfg.verbose,
        preserve_file_times: cfg.preserve_file_times,
    };

    let mut editions = HashSet::new();
    let mut targets = HashSet::new();
    for edition in &cfg.edition_ids {
        if !editions.insert(edition.as_str()) {
            tracing::warn!(edition = %edition, "edition listed more than once; queuing it once");
            continue;
        }
        let entry = resolver.resolve(edition).map_err(|e| match e {
            e @ UpdateError::Resolve { .. } => e,
            other => UpdateError::Resolve {
                edition: edition.clone(),
                reason: other.display_chain(),
            },
        })?;
        let path = cfg.database_directory.join(&entry.filename);
        if !targets.insert(path.clone()) {
            return Err(UpdateError::InvariantViolation(format!(
                "{} resolves to {}, which another edition already targets",
                edition,
                path.display()
            )));
        }
        tracing::debug!(edition = %edition, path = %path.display(), "queued");
        let writer = LocalFileWriter::new(path, Some(lock.token()), opts)?;
        reader.queue(writer, entry);
    }

    let reports = reader.wait()?;
    lock.release();
    Ok(UpdateSummary { reports })
}
