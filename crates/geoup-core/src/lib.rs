//! Core of the geoup database updater: locking, verified installs, the
//! download pool and the update run that ties them together.

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod lock;
pub mod logging;
pub mod resolver;
pub mod retry;
pub mod storage;
pub mod update;

pub use config::{Config, Overrides};
pub use error::{Result, UpdateError};
pub use fetch::{DatabaseSource, HttpClient, RemoteReader, TaskOutcome, TaskReport};
pub use lock::{FileLock, LockToken};
pub use resolver::{DistributionEntry, Resolver};
pub use storage::{LocalFileWriter, WriterOptions};
pub use update::{run, run_with, UpdateSummary};
