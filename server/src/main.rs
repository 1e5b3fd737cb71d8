//! graphload command line
//!
//! Run with: `graphload --help`

use std::process::ExitCode;

use clap::Parser;
use graphload_server::cli::{run, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
