//! Command-line interface
//!
//! - run: evaluate a query module and print the result
//! - explain: print the execution mode of every node

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, Overrides};
pub use commands::{explain, load_config, load_module, run as run_query, run_command};
pub use errors::{CliError, CliResult};
pub use io::{read_request, Response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
