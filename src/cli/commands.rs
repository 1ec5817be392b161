//! CLI command implementations
//!
//! Each command builds one session, does its work and shuts the session
//! down. Query results and query errors are written to stdout as a JSON
//! response; logs go to stderr.

use std::path::Path;

use serde_json::Value;

use crate::expression::QueryModule;
use crate::item::Item;
use crate::observability::{log_event_with_fields, Event, Severity};
use crate::session::{EngineConfig, Session};

use super::args::{Command, Overrides};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_text, Response};

/// Dispatch a parsed command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run {
            query,
            config,
            partitions,
            workers,
            log_level,
        } => run(
            query.as_deref(),
            config.as_deref(),
            Overrides {
                partitions,
                workers,
                log_level,
            },
        ),
        Command::Explain { query, config } => explain(query.as_deref(), config.as_deref()),
    }
}

/// Loads the configuration file, if any, and applies flag overrides
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> CliResult<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(partitions) = overrides.partitions {
        config.default_partitions = partitions;
    }
    if let Some(workers) = overrides.workers {
        config.worker_threads = workers;
    }
    if let Some(level) = &overrides.log_level {
        if Severity::parse(level).is_none() {
            return Err(CliError::Config(format!("Invalid log level: '{}'", level)));
        }
        config.log_level = level.clone();
    }
    config.validate()?;

    let source = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("default_partitions", &config.default_partitions.to_string()),
            ("source", &source),
        ],
    );
    Ok(config)
}

/// Reads a query module from a file, or from stdin
pub fn load_module(path: Option<&Path>) -> CliResult<QueryModule> {
    let module = match path {
        Some(path) => QueryModule::load(path)?,
        None => QueryModule::from_value(read_request()?)?,
    };
    Ok(module)
}

/// Evaluate a query module and write `{"status": "ok", "data": [...]}`
pub fn run(query: Option<&Path>, config_path: Option<&Path>, overrides: Overrides) -> CliResult<()> {
    let config = load_config(config_path, &overrides)?;
    let module = load_module(query)?;

    let session = Session::start(config)?;
    let result = session.evaluate(&module);
    session.shutdown();

    match result {
        Ok(items) => Response::Ok {
            data: Value::Array(items.iter().map(Item::to_json).collect()),
        }
        .emit(),
        Err(e) => {
            Response::Error {
                code: e.code().code(),
                message: &e.to_string(),
            }
            .emit()?;
            Err(e.into())
        }
    }
}

/// Print the execution-mode tree of a query module
pub fn explain(query: Option<&Path>, config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path, &Overrides::default())?;
    let module = load_module(query)?;

    let session = Session::start(config)?;
    let plan = session.explain(&module);
    session.shutdown();

    write_text(&plan.to_string())?;
    if !plan.accepted {
        return Err(CliError::Rejected(
            plan.rejection_reason
                .unwrap_or_else(|| "Query rejected".to_string()),
        ));
    }
    Ok(())
}
