//! The `mtn` binary.
//!
//! A thin wrapper: parse arguments, delegate to the library, print the
//! result.

use std::process::ExitCode;

use clap::Parser;

use mdbase_tasknotes::cli::{self, Cli};

fn main() -> ExitCode {
    let output = cli::run(Cli::parse());
    for line in &output.stdout {
        println!("{line}");
    }
    for line in &output.stderr {
        eprintln!("{line}");
    }
    output.exit_code
}
