//! cistern CLI entry point.
//!
//! Parses command-line arguments, dispatches to the subcommand, and turns
//! any failure into a displayed error with a non-zero exit. A failed
//! compile or resolve always identifies which phase and which entity
//! (package, dependency, feature path) caused it.

use anyhow::Result;
use cistern::cli;
use clap::Parser;
use colored::Colorize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}
