//! One conditional update request for one edition.

use crate::error::{Result, UpdateError};
use crate::resolver::DistributionEntry;
use crate::storage::LocalFileWriter;

use super::client::{with_query, HttpClient};
use super::handler::DownloadHandler;
use super::parse;
use super::TaskOutcome;

/// Performs `GET .../update?db_md5=<current>` and installs the body on 2xx.
/// 304 means the local file is current and nothing is written.
pub(super) fn fetch_update(
    client: &HttpClient,
    entry: &DistributionEntry,
    writer: &LocalFileWriter,
) -> Result<TaskOutcome> {
    let current = writer.current_hash()?;
    let url = with_query(&entry.download_url, "db_md5", &current)?;
    tracing::debug!(edition = %entry.edition, %url, "requesting update");

    let mut easy = curl::easy::Easy2::new(DownloadHandler::new(writer.clone()));
    client.configure(&mut easy, &url)?;

    if let Err(e) = easy.perform() {
        if let Some(err) = easy.get_mut().error.take() {
            return Err(err);
        }
        return Err(UpdateError::Network(e));
    }

    let code = easy.response_code()?;
    let handler = easy.get_mut();
    if code == 304 {
        return Ok(TaskOutcome::NotModified);
    }
    if !(200..300).contains(&code) {
        return Err(UpdateError::HttpStatus {
            status: code,
            body: handler.error_text(),
        });
    }

    let headers = parse::parse_update_headers(&handler.response_headers);
    let expected = headers.md5.ok_or_else(|| {
        UpdateError::Protocol("response did not include an X-Database-MD5 header".to_string())
    })?;
    let staged = handler.take_staged()?;
    let committed = writer.commit(staged, &expected, headers.last_modified)?;
    Ok(TaskOutcome::Updated {
        bytes: committed.bytes,
        hash: committed.hash,
    })
}
