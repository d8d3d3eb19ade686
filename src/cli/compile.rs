//! The `compile` command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::OverrideDoc;
use crate::constants::{DEFAULT_WORKFLOW_DIR, OVERRIDE_FILE_NAME};
use crate::metadata::Metadata;
use crate::pipeline::compiler::compile;
use crate::utils::fs::safe_write;

/// Compile one package's pipeline definition.
///
/// Reads the package's metadata and its `ci.toml` override document (an
/// absent document means all defaults apply) and writes the workflow to
/// `<workspace>/.github/workflows/<package>.yml`. Output is deterministic:
/// unchanged inputs produce byte-identical files, so the result diffs
/// cleanly in version control.
#[derive(Args)]
pub struct CompileCommand {
    /// Directory of the package to compile (containing Cargo.toml).
    package_dir: PathBuf,

    /// Output directory for the workflow file (defaults to
    /// .github/workflows under the workspace root).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Print the workflow to stdout instead of writing a file.
    #[arg(long)]
    stdout: bool,
}

impl CompileCommand {
    pub async fn execute(self) -> Result<()> {
        let metadata = Metadata::load(&self.package_dir).await?;
        let identity = metadata.identity(&self.package_dir)?;
        tracing::debug!(target: "compile", "compiling pipeline for '{}'", identity.name);

        let overrides = OverrideDoc::load(&self.package_dir.join(OVERRIDE_FILE_NAME))?;
        let snapshot = metadata
            .snapshot(&identity.name, overrides.backend().as_deref())
            .with_context(|| format!("Failed to snapshot dependencies of '{}'", identity.name))?;

        let pipeline = compile(&identity, &overrides, Some(&snapshot))?;
        let yaml = pipeline.to_yaml()?;

        if self.stdout {
            print!("{yaml}");
            return Ok(());
        }

        let out_dir = self
            .out_dir
            .unwrap_or_else(|| metadata.workspace_root().join(DEFAULT_WORKFLOW_DIR));
        let out_path = out_dir.join(format!("{}.yml", identity.name));
        safe_write(&out_path, &yaml)?;
        println!("{} {}", "Compiled".green().bold(), out_path.display());
        Ok(())
    }
}
