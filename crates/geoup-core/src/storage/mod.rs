//! Local database files and their lifecycle.
//!
//! Incoming bytes are staged in a temp file next to the target (same
//! filesystem), hashed as they arrive, verified against the identity token
//! from the server, then atomically renamed over the target. On any failure
//! the temp file is discarded and the target keeps its previous content.

mod staged;
mod writer;

pub use staged::StagedFile;
pub use writer::{Committed, LocalFileWriter, WriterOptions};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Prefix for the staged temp file of `file_name` (hidden, e.g. `.City.mmdb.`).
pub(crate) fn temp_prefix(file_name: &std::ffi::OsStr) -> String {
    format!(".{}.", file_name.to_string_lossy())
}
