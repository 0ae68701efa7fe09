//! Shared curl setup for requests to the distribution service.

use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, UpdateError};

/// Connection settings for the distribution service. Cheap to clone; each
/// request builds its own curl handle so workers share nothing mutable.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    account_id: u32,
    license_key: String,
    proxy: Option<String>,
    connect_timeout: Duration,
    timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, account_id: u32, license_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id,
            license_key: license_key.into(),
            proxy: None,
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
            user_agent: format!("geoup/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let mut client = HttpClient::new(cfg.base_url(), cfg.account_id, cfg.license_key.clone())
            .with_timeouts(cfg.connect_timeout(), cfg.timeout());
        client.proxy = cfg.proxy.clone();
        client
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/app/update_getfilename?product_id={edition}`
    pub fn filename_url(&self, edition: &str) -> Result<String> {
        let mut url = self.parse_base()?;
        url.path_segments_mut()
            .map_err(|_| invalid_base(&self.base_url))?
            .pop_if_empty()
            .extend(["app", "update_getfilename"]);
        url.query_pairs_mut().append_pair("product_id", edition);
        Ok(url.into())
    }

    /// `{base}/geoip/databases/{edition}/update`; the reader adds `db_md5`.
    pub fn update_url(&self, edition: &str) -> Result<String> {
        let mut url = self.parse_base()?;
        url.path_segments_mut()
            .map_err(|_| invalid_base(&self.base_url))?
            .pop_if_empty()
            .extend(["geoip", "databases", edition, "update"]);
        Ok(url.into())
    }

    fn parse_base(&self) -> Result<url::Url> {
        url::Url::parse(&self.base_url).map_err(|_| invalid_base(&self.base_url))
    }

    /// Apply URL, auth, proxy and timeouts to a fresh handle.
    pub(crate) fn configure<H>(&self, easy: &mut curl::easy::Easy2<H>, url: &str) -> Result<()> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        easy.useragent(&self.user_agent)?;
        easy.username(&self.account_id.to_string())?;
        easy.password(&self.license_key)?;
        if let Some(proxy) = &self.proxy {
            easy.proxy(proxy)?;
        }
        Ok(())
    }
}

fn invalid_base(base: &str) -> UpdateError {
    UpdateError::InvariantViolation(format!("invalid distribution service URL {:?}", base))
}

/// Append a query pair to an already-built URL.
pub(crate) fn with_query(url: &str, key: &str, value: &str) -> Result<String> {
    let mut u = url::Url::parse(url)
        .map_err(|e| UpdateError::InvariantViolation(format!("invalid URL {:?}: {}", url, e)))?;
    u.query_pairs_mut().append_pair(key, value);
    Ok(u.into())
}
