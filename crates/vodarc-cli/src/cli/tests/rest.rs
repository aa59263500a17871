//! Tests for status, runs and import.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_status() {
    match parse(&["vodarc", "status", "--latest", "--failures"]) {
        CliCommand::Status {
            target,
            json,
            failures,
        } => {
            assert!(target.latest);
            assert!(!json);
            assert!(failures);
        }
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_status_json() {
    match parse(&["vodarc", "status", "/r", "--json"]) {
        CliCommand::Status { target, json, .. } => {
            assert_eq!(target.run_dir.as_deref(), Some(Path::new("/r")));
            assert!(json);
        }
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_runs() {
    assert!(matches!(parse(&["vodarc", "runs"]), CliCommand::Runs));
}

#[test]
fn cli_parse_import() {
    match parse(&["vodarc", "import", "jobs.json", "--raw", "raw.json"]) {
        CliCommand::Import {
            path,
            raw,
            into,
            new,
        } => {
            assert_eq!(path, Path::new("jobs.json"));
            assert_eq!(raw.as_deref(), Some(Path::new("raw.json")));
            assert!(into.is_none());
            assert!(!new);
        }
        _ => panic!("expected Import"),
    }
}

#[test]
fn cli_parse_import_new_conflicts_with_into() {
    assert!(Cli::try_parse_from(["vodarc", "import", "j.json", "--new", "--into", "/r"]).is_err());
    match parse(&["vodarc", "import", "j.json", "--new"]) {
        CliCommand::Import { new, .. } => assert!(new),
        _ => panic!("expected Import"),
    }
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["vodarc"]).is_err());
}
