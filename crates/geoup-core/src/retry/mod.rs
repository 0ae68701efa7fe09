//! Retry and backoff policy for per-edition downloads.
//!
//! The update request is a conditional GET and therefore idempotent, so
//! transient failures (timeouts, connection errors, throttling, 5xx) are
//! retried with capped exponential backoff. Verification and disk errors are
//! never retried.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
