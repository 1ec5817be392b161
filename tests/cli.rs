//! Command-Line Tests
//!
//! - parsed arguments dispatch through `run_command`
//! - engine failures keep their engine code at the CLI

use std::io::Write;

use clap::Parser;
use tempfile::NamedTempFile;
use tidequery::cli::{run_command, Cli, CliError, Command};

// =============================================================================
// Helper Functions
// =============================================================================

fn module_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(args).unwrap().command
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_run_dispatches_parsed_command() {
    let file = module_file(r#"{"body": {"kind": "range", "from": {"kind": "literal", "value": 1}, "to": {"kind": "literal", "value": 3}}}"#);
    let path = file.path().to_str().unwrap();

    let command = parse(&["tidequery", "run", "--query", path, "--partitions", "2"]);
    assert!(matches!(command, Command::Run { partitions: Some(2), .. }));
    run_command(command).unwrap();
}

#[test]
fn test_explain_dispatches_parsed_command() {
    let file = module_file(r#"{"body": {"kind": "literal", "value": 1}}"#);
    let path = file.path().to_str().unwrap();

    run_command(parse(&["tidequery", "explain", "--query", path])).unwrap();
}

#[test]
fn test_run_reports_engine_code() {
    let file = module_file(r#"{"body": {"kind": "variable", "name": "missing"}}"#);
    let path = file.path().to_str().unwrap();

    let err = run_command(parse(&["tidequery", "run", "--query", path])).unwrap_err();
    assert!(matches!(err, CliError::Engine(_)));
    assert_eq!(err.code(), "TQ_UNDEFINED_VARIABLE");
}

#[test]
fn test_bad_log_level_is_a_config_error() {
    let file = module_file(r#"{"body": {"kind": "literal", "value": 1}}"#);
    let path = file.path().to_str().unwrap();

    let command = parse(&["tidequery", "run", "--query", path, "--log-level", "loud"]);
    let err = run_command(command).unwrap_err();
    assert_eq!(err.code(), "TQ_CLI_CONFIG_ERROR");
}

#[test]
fn test_missing_module_file() {
    let command = parse(&["tidequery", "run", "--query", "/nonexistent/module.json"]);
    let err = run_command(command).unwrap_err();
    assert_eq!(err.code(), "TQ_RESOURCE_UNAVAILABLE");
}
