//! Work queue plus worker pool. `queue` only records the task; `wait` drains
//! the queue with up to `parallelism` threads and reduces the results.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Result, UpdateError};
use crate::resolver::DistributionEntry;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::storage::LocalFileWriter;

use super::{DatabaseSource, TaskOutcome, TaskReport};

struct Task {
    entry: DistributionEntry,
    writer: LocalFileWriter,
}

type Finished = (usize, Task, Result<TaskOutcome>, Duration);

pub struct RemoteReader<S> {
    source: S,
    parallelism: usize,
    retry: RetryPolicy,
    verbose: bool,
    queue: Vec<Task>,
}

impl<S: DatabaseSource> RemoteReader<S> {
    /// `parallelism` is clamped to at least 1.
    pub fn new(source: S, parallelism: usize) -> Self {
        Self {
            source,
            parallelism: parallelism.max(1),
            retry: RetryPolicy::no_retry(),
            verbose: false,
            queue: Vec::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enqueue one edition. Never blocks and never touches the network.
    pub fn queue(&mut self, writer: LocalFileWriter, entry: DistributionEntry) {
        self.queue.push(Task { entry, writer });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run every queued task to completion. Failures do not stop sibling
    /// tasks; each is logged, and the first in enqueue order is returned.
    pub fn wait(&mut self) -> Result<Vec<TaskReport>> {
        let tasks = std::mem::take(&mut self.queue);
        let count = tasks.len();
        if count == 0 {
            return Ok(Vec::new());
        }

        let work: Mutex<VecDeque<(usize, Task)>> = Mutex::new(tasks.into_iter().enumerate().collect());
        let num_workers = self.parallelism.min(count);
        let mut slots: Vec<Option<(Task, Result<TaskOutcome>, Duration)>> =
            (0..count).map(|_| None).collect();

        let source = &self.source;
        let retry = &self.retry;
        let verbose = self.verbose;
        let work = &work;
        let (tx, rx) = mpsc::channel::<Finished>();

        std::thread::scope(|s| {
            for _ in 0..num_workers {
                let tx = tx.clone();
                s.spawn(move || loop {
                    let next = work.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                    let Some((index, task)) = next else {
                        break;
                    };
                    let started = Instant::now();
                    let res = run_with_retry(retry, &task.entry.edition, || {
                        source.fetch(&task.entry, &task.writer)
                    });
                    log_result(&task, &res, verbose);
                    if tx.send((index, task, res, started.elapsed())).is_err() {
                        break;
                    }
                });
            }
            drop(tx);
            for (index, task, res, elapsed) in rx {
                slots[index] = Some((task, res, elapsed));
            }
        });

        let mut reports = Vec::with_capacity(count);
        let mut first_error = None;
        for (task, res, elapsed) in slots.into_iter().flatten() {
            match res {
                Ok(outcome) => reports.push(TaskReport {
                    edition: task.entry.edition,
                    path: task.writer.path().to_path_buf(),
                    outcome,
                    elapsed_ms: elapsed.as_millis() as u64,
                }),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(UpdateError::Download {
                            edition: task.entry.edition,
                            source: Box::new(e),
                        });
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}

fn log_result(task: &Task, res: &Result<TaskOutcome>, verbose: bool) {
    let edition = task.entry.edition.as_str();
    let path = task.writer.path().display();
    match res {
        Ok(TaskOutcome::NotModified) if verbose => {
            tracing::info!(edition, "no new updates for {}", path)
        }
        Ok(TaskOutcome::Updated { bytes, hash }) if verbose => {
            tracing::info!(edition, bytes, %hash, "updated {}", path)
        }
        Ok(_) => tracing::debug!(edition, "finished {}", path),
        Err(e) => tracing::error!(edition, "error updating {}: {}", path, e.display_chain()),
    }
}
