//! CLI argument definitions using clap
//!
//! Commands:
//! - tidequery run --query <module.json> [--config <path>] [--partitions N]
//! - tidequery explain --query <module.json>
//!
//! Without `--query`, the module is read from stdin.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tidequery - hybrid local/distributed JSON query engine
#[derive(Parser, Debug)]
#[command(name = "tidequery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a query module and print its result
    Run {
        /// Path to the query module (stdin if omitted)
        #[arg(long)]
        query: Option<PathBuf>,

        /// Path to the engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the default partition count
        #[arg(long)]
        partitions: Option<usize>,

        /// Override the worker pool size
        #[arg(long)]
        workers: Option<usize>,

        /// Override the minimum log severity
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Print the execution mode of every node without evaluating
    Explain {
        /// Path to the query module (stdin if omitted)
        #[arg(long)]
        query: Option<PathBuf>,

        /// Path to the engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Flags that override configuration fields
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub partitions: Option<usize>,
    pub workers: Option<usize>,
    pub log_level: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "tidequery",
            "run",
            "--query",
            "q.json",
            "--partitions",
            "8",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                query, partitions, ..
            } => {
                assert_eq!(query, Some(PathBuf::from("q.json")));
                assert_eq!(partitions, Some(8));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_explain_from_stdin() {
        let cli = Cli::try_parse_from(["tidequery", "explain"]).unwrap();
        assert!(matches!(cli.command, Command::Explain { query: None, .. }));
    }
}
