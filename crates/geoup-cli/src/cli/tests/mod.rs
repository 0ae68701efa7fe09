//! CLI parse tests.

use super::{Cli, Failure};
use clap::Parser;
use geoup_core::UpdateError;
use std::path::PathBuf;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn defaults() {
    let cli = parse(&["geoup"]);
    assert!(cli.config.is_none());
    assert!(cli.database_directory.is_none());
    assert!(cli.parallelism.is_none());
    assert!(!cli.verbose && !cli.stack_trace && !cli.output && !cli.log_file);
}

#[test]
fn short_flags() {
    let cli = parse(&["geoup", "-f", "/etc/GeoIP.toml", "-d", "/srv/geo", "-v", "-o"]);
    assert_eq!(cli.config, Some(PathBuf::from("/etc/GeoIP.toml")));
    assert_eq!(cli.database_directory, Some(PathBuf::from("/srv/geo")));
    assert!(cli.verbose);
    assert!(cli.output);
}

#[test]
fn overrides_carry_flags() {
    let cli = parse(&["geoup", "--parallelism", "4", "--log-file", "-d", "/tmp/db"]);
    let o = cli.overrides();
    assert_eq!(o.parallelism, Some(4));
    assert_eq!(o.database_directory, Some(PathBuf::from("/tmp/db")));
    assert!(o.log_file);
    assert!(!o.verbose);
}

#[test]
fn zero_parallelism_rejected() {
    assert!(Cli::try_parse_from(["geoup", "--parallelism", "0"]).is_err());
}

#[test]
fn explicit_config_path_wins() {
    let cli = parse(&["geoup", "--config", "/x/y.toml"]);
    assert_eq!(cli.config_path().unwrap(), PathBuf::from("/x/y.toml"));
}

#[test]
fn failure_messages() {
    let f = Failure::Config {
        path: PathBuf::from("/etc/geoup.toml"),
        err: anyhow::anyhow!("no edition_ids configured"),
    };
    assert_eq!(
        f.report(false),
        "error loading configuration file /etc/geoup.toml: no edition_ids configured"
    );

    let err = UpdateError::Download {
        edition: "GeoLite2-City".to_string(),
        source: Box::new(UpdateError::HttpStatus {
            status: 500,
            body: "boom".to_string(),
        }),
    };
    let f = Failure::Update(err.into());
    assert_eq!(
        f.report(false),
        "error retrieving updates: download error for GeoLite2-City: unexpected HTTP status 500: boom"
    );
}

#[test]
fn missing_config_file_is_a_config_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let cli = parse(&["geoup", "-f", missing.to_str().unwrap()]);
    match cli.execute() {
        Err(Failure::Config { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected config failure, got {:?}", other),
    }
}
