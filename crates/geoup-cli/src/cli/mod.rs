//! Command-line surface of the geoup updater.

use anyhow::{Context, Result};
use clap::Parser;
use geoup_core::config::{self, Config, Overrides};
use geoup_core::{logging, update, UpdateSummary};
use std::io::Write;
use std::path::PathBuf;

/// Keep local GeoIP databases current.
#[derive(Debug, Parser)]
#[command(name = "geoup", version)]
#[command(about = "geoup: update GeoIP databases from the distribution service", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/geoup/config.toml).
    #[arg(short = 'f', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Install databases into DIR instead of the configured directory.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub database_directory: Option<PathBuf>,

    /// Download up to N editions concurrently.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub parallelism: Option<u16>,

    /// Report progress: lock activity, per-edition results.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print errors with their full cause chain.
    #[arg(long)]
    pub stack_trace: bool,

    /// Print a JSON summary of the run on stdout.
    #[arg(short, long)]
    pub output: bool,

    /// Log to a file under $XDG_STATE_HOME/geoup instead of stderr.
    #[arg(long)]
    pub log_file: bool,
}

/// A failure and the message prefix it is reported with.
#[derive(Debug)]
pub enum Failure {
    Config { path: PathBuf, err: anyhow::Error },
    Update(anyhow::Error),
}

impl Failure {
    pub fn report(&self, stack_trace: bool) -> String {
        let (prefix, err) = match self {
            Failure::Config { path, err } => (
                format!("error loading configuration file {}", path.display()),
                err,
            ),
            Failure::Update(err) => ("error retrieving updates".to_string(), err),
        };
        if stack_trace {
            format!("{}: {:?}", prefix, err)
        } else {
            format!("{}: {:#}", prefix, err)
        }
    }
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database_directory: self.database_directory.clone(),
            parallelism: self.parallelism.map(usize::from),
            verbose: self.verbose,
            log_file: self.log_file,
        }
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(p) => Ok(p.clone()),
            None => config::config_path(),
        }
    }

    /// Load config, set up logging, run the update.
    pub fn execute(&self) -> std::result::Result<(), Failure> {
        let path = self.config_path().map_err(|err| Failure::Config {
            path: PathBuf::from("<unknown>"),
            err,
        })?;
        let cfg = match Config::load(&path, &self.overrides()) {
            Ok(cfg) => cfg,
            Err(err) => {
                logging::init_logging_stderr(self.verbose);
                return Err(Failure::Config { path, err });
            }
        };
        self.init_logging(&cfg);

        if cfg.verbose {
            tracing::info!("geoup version {}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Using config file {}", path.display());
            tracing::info!(
                "Using database directory {}",
                cfg.database_directory.display()
            );
        }

        let summary = update::run(&cfg).map_err(|e| Failure::Update(e.into()))?;
        if self.output {
            print_summary(&summary).map_err(Failure::Update)?;
        }
        Ok(())
    }

    fn init_logging(&self, cfg: &Config) {
        if cfg.log_file {
            if let Err(err) = logging::init_logging_file(cfg.verbose) {
                logging::init_logging_stderr(cfg.verbose);
                tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
            }
        } else {
            logging::init_logging_stderr(cfg.verbose);
        }
    }
}

fn print_summary(summary: &UpdateSummary) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &summary.reports).context("serialize summary")?;
    writeln!(out).context("write summary")?;
    Ok(())
}

#[cfg(test)]
mod tests;
