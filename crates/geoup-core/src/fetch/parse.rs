//! Parse HTTP response header lines of an update response.

use std::time::SystemTime;

/// Header carrying the MD5 of the (uncompressed) database.
pub(crate) const MD5_HEADER: &str = "x-database-md5";

/// Headers of an update response that drive verification and install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UpdateHeaders {
    /// Identity token to verify the streamed content against.
    pub md5: Option<String>,
    pub last_modified: Option<SystemTime>,
    /// Body is gzip and must be decompressed before hashing.
    pub gzip: bool,
}

/// Status code from the last `HTTP/x y` line (redirects reset the block).
pub(crate) fn status_code(lines: &[String]) -> Option<u32> {
    let line = lines.iter().rev().find(|l| l.starts_with("HTTP/"))?;
    line.split_whitespace().nth(1)?.parse().ok()
}

pub(crate) fn parse_update_headers(lines: &[String]) -> UpdateHeaders {
    let mut out = UpdateHeaders::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case(MD5_HEADER) && !value.is_empty() {
                out.md5 = Some(value.trim_matches('"').to_ascii_lowercase());
            }
            if name.eq_ignore_ascii_case("last-modified") {
                out.last_modified = chrono::DateTime::parse_from_rfc2822(value)
                    .ok()
                    .map(SystemTime::from);
            }
            if name.eq_ignore_ascii_case("content-type") {
                let mime = value.split(';').next().unwrap_or("").trim();
                if mime.eq_ignore_ascii_case("application/gzip")
                    || mime.eq_ignore_ascii_case("application/x-gzip")
                {
                    out.gzip = true;
                }
            }
            if name.eq_ignore_ascii_case("content-encoding") && value.eq_ignore_ascii_case("gzip") {
                out.gzip = true;
            }
        }
    }

    out
}
