//! The `reexports` command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::OverrideDoc;
use crate::constants::OVERRIDE_FILE_NAME;
use crate::core::CisternError;
use crate::metadata::Metadata;
use crate::reexports::diff_for_package;

/// Check that re-exported backend features match the declared features.
///
/// Prints a two-column report (backend vs. this package) and exits
/// non-zero when the sets differ. Requires a `backend` declaration in the
/// package's `ci.toml`.
#[derive(Args)]
pub struct ReexportsCommand {
    /// Directory of the package (containing Cargo.toml).
    #[arg(long, default_value = ".")]
    package_dir: PathBuf,
}

impl ReexportsCommand {
    pub async fn execute(self) -> Result<()> {
        let metadata = Metadata::load(&self.package_dir).await?;
        let identity = metadata.identity(&self.package_dir)?;

        let overrides = OverrideDoc::load(&self.package_dir.join(OVERRIDE_FILE_NAME))?;
        let backend = overrides.backend().ok_or_else(|| CisternError::BackendNotDeclared {
            package: identity.name.clone(),
        })?;

        let backend_features = metadata.features_of(&backend)?;
        let declared = metadata.features_of(&identity.name)?;
        let diff = diff_for_package(&overrides, &backend_features, &declared);

        println!("{:<32} {}", backend.bold(), identity.name.bold());
        for feature in &diff.matched {
            println!("{:<32} {}", feature, feature);
        }
        for feature in &diff.missing {
            println!("{:<32} {}", feature.red(), "-".red());
        }
        for feature in &diff.unexpected {
            println!("{:<32} {}", "-".red(), feature.red());
        }

        if diff.is_consistent() {
            println!("{} re-exported features match", "OK".green().bold());
            return Ok(());
        }
        Err(CisternError::ReexportMismatch {
            package: identity.name,
            backend,
            missing: diff.missing.len(),
            unexpected: diff.unexpected.len(),
        }
        .into())
    }
}
