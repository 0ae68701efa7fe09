use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default distribution service host.
pub const DEFAULT_HOST: &str = "updates.maxmind.com";
/// Default directory the databases are installed into.
pub const DEFAULT_DATABASE_DIRECTORY: &str = "/usr/local/share/GeoIP";
/// Lock file name used when no XDG state directory is available.
pub const FALLBACK_LOCK_FILE_NAME: &str = ".geoipupdate.lock";
/// Upper bound for `[retry]` delays, in seconds.
pub const MAX_RETRY_DELAY_SECS: u64 = 3600;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per edition (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

/// Configuration loaded from `~/.config/geoup/config.toml` (or `--config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account_id: u32,
    pub license_key: String,
    /// Editions to keep updated, in the order they are queued.
    pub edition_ids: Vec<String>,
    #[serde(default = "default_database_directory")]
    pub database_directory: PathBuf,
    /// Distribution service host; `https://` is assumed when no scheme is given.
    #[serde(default = "default_host")]
    pub host: String,
    /// Optional proxy URL handed to libcurl.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Lock file path; defaults to the XDG state directory.
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
    /// Number of editions downloaded concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Set installed files' mtime to the server's Last-Modified.
    #[serde(default)]
    pub preserve_file_times: bool,
    /// Total per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Also append logs under the XDG state directory.
    #[serde(default)]
    pub log_file: bool,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Set from the command line only.
    #[serde(skip)]
    pub verbose: bool,
}

fn default_database_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_DIRECTORY)
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_parallelism() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_directory: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub verbose: bool,
    pub log_file: bool,
}

impl Config {
    /// Parse a TOML document without validating it.
    pub fn from_toml(data: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(data)?;
        Ok(cfg)
    }

    /// Load, apply overrides, validate.
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        let data =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let mut cfg =
            Config::from_toml(&data).with_context(|| format!("parse {}", path.display()))?;
        cfg.apply(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.database_directory {
            self.database_directory = dir.clone();
        }
        if let Some(n) = overrides.parallelism {
            self.parallelism = n;
        }
        self.verbose |= overrides.verbose;
        self.log_file |= overrides.log_file;
    }

    pub fn validate(&self) -> Result<()> {
        if self.edition_ids.is_empty() {
            bail!("no edition_ids configured");
        }
        if let Some(blank) = self.edition_ids.iter().find(|e| e.trim().is_empty()) {
            bail!("invalid edition id {:?}", blank);
        }
        if self.license_key.trim().is_empty() {
            bail!("license_key must not be empty");
        }
        if self.parallelism == 0 {
            bail!("parallelism should be greater than 0, got {}", self.parallelism);
        }
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            bail!("timeouts must be greater than 0");
        }
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if let Some(retry) = &self.retry {
            let base = retry.base_delay_secs;
            if !base.is_finite() || base < 0.0 || base > MAX_RETRY_DELAY_SECS as f64 {
                bail!(
                    "retry.base_delay_secs must be between 0 and {}, got {}",
                    MAX_RETRY_DELAY_SECS,
                    base
                );
            }
            if retry.max_delay_secs > MAX_RETRY_DELAY_SECS {
                bail!(
                    "retry.max_delay_secs must be at most {}, got {}",
                    MAX_RETRY_DELAY_SECS,
                    retry.max_delay_secs
                );
            }
        }
        Ok(())
    }

    /// Base URL of the distribution service, without trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    /// Effective lock file path.
    pub fn lock_path(&self) -> PathBuf {
        if let Some(p) = &self.lock_file {
            return p.clone();
        }
        xdg::BaseDirectories::with_prefix("geoup")
            .map(|d| d.get_state_home().join("geoup").join("geoup.lock"))
            .unwrap_or_else(|_| self.database_directory.join(FALLBACK_LOCK_FILE_NAME))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

/// Default config path: `~/.config/geoup/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("geoup")?;
    Ok(xdg_dirs.get_config_home().join("geoup").join("config.toml"))
}
