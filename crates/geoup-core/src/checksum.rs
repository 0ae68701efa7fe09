//! MD5 identity of local database files.
//!
//! The distribution service identifies content by the lowercase hex MD5 of the
//! uncompressed database. A missing file hashes to all zeros so the first
//! request is never answered with "not modified".

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Hash sent for a database that does not exist locally yet.
pub const ZERO_MD5: &str = "00000000000000000000000000000000";

/// Compute MD5 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded.
pub fn md5_path(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

/// Like [`md5_path`] but maps a missing file to [`ZERO_MD5`].
pub fn md5_or_zero(path: &Path) -> io::Result<String> {
    match md5_path(path) {
        Ok(h) => Ok(h),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ZERO_MD5.to_string()),
        Err(e) => Err(e),
    }
}

/// Case-insensitive comparison of two hex digests.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
