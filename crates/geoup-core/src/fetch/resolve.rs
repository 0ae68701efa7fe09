//! Filename lookup against the distribution service.

use crate::error::{Result, UpdateError};
use crate::resolver::{validate_filename, DistributionEntry, Resolver};

use super::client::HttpClient;
use super::handler::Collector;

impl Resolver for HttpClient {
    fn resolve(&self, edition: &str) -> Result<DistributionEntry> {
        let fail = |reason: String| UpdateError::Resolve {
            edition: edition.to_string(),
            reason,
        };

        let url = self.filename_url(edition)?;
        let mut easy = curl::easy::Easy2::new(Collector::default());
        self.configure(&mut easy, &url)?;
        easy.perform().map_err(|e| fail(e.to_string()))?;

        let code = easy.response_code().map_err(|e| fail(e.to_string()))?;
        let body = String::from_utf8_lossy(&easy.get_ref().body).trim().to_string();
        if !(200..300).contains(&code) {
            return Err(fail(format!("unexpected HTTP status {}: {}", code, body)));
        }
        let filename = validate_filename(&body)
            .ok_or_else(|| fail(format!("invalid filename {:?} in response", body)))?;

        Ok(DistributionEntry {
            edition: edition.to_string(),
            filename: filename.to_string(),
            download_url: self.update_url(edition)?,
        })
    }
}
