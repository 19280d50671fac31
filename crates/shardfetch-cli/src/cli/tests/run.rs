//! Tests for init and run.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_init() {
    match parse(&["shardfetch", "init", "--ids", "ids.txt"]).command {
        CliCommand::Init { ids } => assert_eq!(ids, PathBuf::from("ids.txt")),
        _ => panic!("expected Init"),
    }
}

#[test]
fn cli_parse_init_requires_ids() {
    assert!(Cli::try_parse_from(["shardfetch", "init"]).is_err());
}

#[test]
fn cli_parse_run_minimal() {
    let cli = parse(&["shardfetch", "run", "--urls", "urls.json"]);
    assert_eq!(cli.root, PathBuf::from("."));
    match cli.command {
        CliCommand::Run(args) => {
            assert_eq!(args.urls, PathBuf::from("urls.json"));
            assert!(args.ids.is_none());
            assert!(args.workers.is_none());
            assert!(args.target.is_none());
            assert!(!args.no_retry_failed);
            assert_eq!(args.start, 0);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_all_flags() {
    let cli = parse(&[
        "shardfetch",
        "run",
        "--ids",
        "ids.txt",
        "--urls",
        "urls.json",
        "--workers",
        "8",
        "--timeout",
        "60",
        "--per-shard-capacity",
        "100",
        "--target",
        "500",
        "--target-gb",
        "2.5",
        "--start",
        "250",
        "--limit",
        "1000",
        "--no-retry-failed",
        "--root",
        "/data/videos",
    ]);
    assert_eq!(cli.root, PathBuf::from("/data/videos"));
    match cli.command {
        CliCommand::Run(args) => {
            assert_eq!(args.ids, Some(PathBuf::from("ids.txt")));
            assert_eq!(args.workers, Some(8));
            assert_eq!(args.timeout, Some(60));
            assert_eq!(args.per_shard_capacity, Some(100));
            assert_eq!(args.target, Some(500));
            assert_eq!(args.target_gb, Some(2.5));
            assert_eq!(args.start, 250);
            assert_eq!(args.limit, Some(1000));
            assert!(args.no_retry_failed);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_requires_urls() {
    assert!(Cli::try_parse_from(["shardfetch", "run", "--ids", "ids.txt"]).is_err());
}

#[test]
fn cli_parse_run_rejects_bad_number() {
    assert!(Cli::try_parse_from(["shardfetch", "run", "--urls", "u.json", "--workers", "many"]).is_err());
}
