//! Command-line interface for cistern.
//!
//! Each command lives in its own module with its own argument struct and
//! execution logic:
//!
//! - `compile`: compile a package's CI override document into a complete
//!   workflow definition.
//! - `min-versions`: verify the declared minimum toolchain with direct
//!   dependencies pinned to their floors.
//! - `reexports`: diff re-exported backend features against the
//!   package's declared features.
//!
//! # Global options
//!
//! - `--verbose`: debug-level logging
//! - `--quiet`: errors only

mod compile;
mod minver;
mod reexports;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Configuration derived from global CLI flags.
///
/// Kept separate from the parsed arguments so tests and programmatic
/// callers can inject their own.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log level for the tracing subscriber; `None` disables logging.
    pub log_level: Option<String>,
}

impl CliConfig {
    /// Installs the tracing subscriber for this configuration.
    ///
    /// An explicit `RUST_LOG` in the environment wins over the flag-derived
    /// level.
    pub fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let Some(level) = &self.log_level else {
            return;
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.clone()));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
    }
}

/// CI pipeline compiler and minimal-versions MSRV checker.
#[derive(Parser)]
#[command(name = "cistern", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a package's CI overrides into a workflow definition.
    Compile(compile::CompileCommand),

    /// Pin direct dependencies to their minimal versions and re-resolve
    /// transitives for a toolchain-floor check.
    #[command(name = "min-versions")]
    MinVersions(minver::MinVersionsCommand),

    /// Diff re-exported backend features against declared features.
    Reexports(reexports::ReexportsCommand),
}

impl Cli {
    /// Builds a [`CliConfig`] from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };
        CliConfig {
            log_level,
        }
    }

    /// Executes the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Executes with an injected configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Compile(cmd) => cmd.execute().await,
            Commands::MinVersions(cmd) => cmd.execute().await,
            Commands::Reexports(cmd) => cmd.execute().await,
        }
    }
}
