//! Resolving an edition to the file it is installed as.
//!
//! The orchestrator only depends on the [`Resolver`] trait; the HTTP
//! implementation lives next to the rest of the curl code.

use crate::error::Result;

/// Resolved metadata for one edition, valid for the current run only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionEntry {
    pub edition: String,
    /// Target file name inside the database directory.
    pub filename: String,
    /// Update endpoint; the current content hash is added per request.
    pub download_url: String,
}

pub trait Resolver {
    fn resolve(&self, edition: &str) -> Result<DistributionEntry>;
}

const NAME_MAX: usize = 255;

/// Accepts a server-supplied file name only if it is a single, plain path
/// component. Returns the trimmed name.
pub fn validate_filename(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty() || name.len() > NAME_MAX || name == "." || name == ".." {
        return None;
    }
    let bad = |c: char| c == '\0' || c == '/' || c == '\\' || c.is_control();
    if name.chars().any(bad) {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass() {
        assert_eq!(validate_filename("GeoLite2-City.mmdb\n"), Some("GeoLite2-City.mmdb"));
        assert_eq!(validate_filename("GeoIP.dat"), Some("GeoIP.dat"));
    }

    #[test]
    fn rejects_path_components() {
        assert_eq!(validate_filename("../etc/passwd"), None);
        assert_eq!(validate_filename("a/b.mmdb"), None);
        assert_eq!(validate_filename("a\\b.mmdb"), None);
        assert_eq!(validate_filename(".."), None);
    }

    #[test]
    fn rejects_empty_control_and_long() {
        assert_eq!(validate_filename("   "), None);
        assert_eq!(validate_filename("file\x00name"), None);
        assert_eq!(validate_filename(&"a".repeat(NAME_MAX + 1)), None);
    }
}
