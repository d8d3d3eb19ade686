//! The `min-versions` command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::lockfile::FloorPolicy;
use crate::minver::{CargoResolver, MinVersions};

/// Resolve and pin minimal direct dependency versions.
///
/// Discovers the floor version of every direct dependency, pins each one
/// to it, and re-resolves so transitive dependencies float to their
/// latest compatible versions. The manifest is restored unconditionally;
/// what remains is a `Cargo.lock` reflecting "direct at floor, transitive
/// at latest", ready for a `cargo +<toolchain> check --locked`.
///
/// Exits non-zero on any phase failure: a direct dependency without a
/// discoverable floor, a resolution failure, or an infeasible
/// re-resolution under the declared toolchain.
#[derive(Args)]
pub struct MinVersionsCommand {
    /// Declared minimum toolchain version to re-resolve under.
    toolchain: String,

    /// Directory of the package (containing Cargo.toml).
    #[arg(long, default_value = ".")]
    package_dir: PathBuf,

    /// Tie-break policy when a dependency has several lock entries.
    #[arg(long, value_enum, default_value = "last-listed")]
    floor_policy: FloorPolicy,

    /// Additional dependency families to leave unpinned (repeatable).
    #[arg(long = "skip", value_name = "FAMILY")]
    skip: Vec<String>,
}

impl MinVersionsCommand {
    pub async fn execute(self) -> Result<()> {
        MinVersions::new(&self.package_dir, &self.toolchain)
            .with_policy(self.floor_policy)
            .with_skipped(self.skip)
            .run(&CargoResolver)
            .await?;

        println!(
            "{} direct dependencies at floor, transitives at latest (toolchain {})",
            "Resolved".green().bold(),
            self.toolchain
        );
        Ok(())
    }
}
