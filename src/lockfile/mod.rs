//! Lock state parsing and floor-version queries.
//!
//! After the minimal-versions resolution phase, `Cargo.lock` holds the
//! lowest version of every dependency that still satisfies the declared
//! constraints. [`LockState`] reads that file back and answers "what floor
//! was chosen for package X" for the pinning phase.
//!
//! A name can appear more than once in the lock state (multiple release
//! lines resolved for different parts of the graph). Which entry counts as
//! the floor is an explicit, configurable policy; see [`FloorPolicy`].

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;
use std::path::Path;

use crate::core::CisternError;
use crate::manifest::normalize_name;

/// Tie-break policy when one package name has several lock entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FloorPolicy {
    /// Take the last entry in file order.
    ///
    /// This reproduces the historical behavior of the shell-based
    /// procedure this resolver replaced. It is not semantic-version-aware
    /// and downstream packages may depend on the exact (possibly wrong)
    /// floor it picks, so it stays the default rather than being silently
    /// "fixed".
    #[default]
    LastListed,
    /// Take the semver-lowest entry.
    Lowest,
}

/// One `[[package]]` entry from the lock state.
#[derive(Debug, Clone, Deserialize)]
pub struct LockedPackage {
    /// Package name as resolved (no rename aliases here).
    pub name: String,
    /// Concrete resolved version.
    pub version: String,
    /// Registry or git source; absent for workspace-local packages.
    #[serde(default)]
    pub source: Option<String>,
}

/// A fully resolved lock state (`Cargo.lock`), read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct LockState {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

impl LockState {
    /// Loads the lock state from `dir/Cargo.lock`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("Cargo.lock");
        if !path.exists() {
            return Err(CisternError::LockfileMissing {
                path,
            }
            .into());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read lock state: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse lock state: {}", path.display()))
    }

    /// Parses a lock state from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// All entries, in file order.
    pub fn packages(&self) -> &[LockedPackage] {
        &self.package
    }

    /// Every resolved version of `name`, in file order.
    ///
    /// Matches the exact name first and falls back to `-`/`_`
    /// normalization, mirroring how manifest keys are matched elsewhere.
    pub fn versions_of(&self, name: &str) -> Vec<Version> {
        let exact: Vec<&LockedPackage> =
            self.package.iter().filter(|p| p.name == name).collect();
        let matches = if exact.is_empty() {
            let normalized = normalize_name(name);
            self.package.iter().filter(|p| normalize_name(&p.name) == normalized).collect()
        } else {
            exact
        };

        matches
            .into_iter()
            .filter_map(|p| match Version::parse(&p.version) {
                Ok(version) => Some(version),
                Err(err) => {
                    tracing::warn!(
                        target: "minver",
                        "unparsable version '{}' for '{}' in lock state: {err}",
                        p.version,
                        p.name
                    );
                    None
                }
            })
            .collect()
    }

    /// The floor version for `name` under the given policy, or `None` when
    /// the lock state has no entry for it.
    pub fn floor(&self, name: &str, policy: FloorPolicy) -> Option<Version> {
        let versions = self.versions_of(name);
        match policy {
            FloorPolicy::LastListed => versions.last().cloned(),
            FloorPolicy::Lowest => versions.into_iter().min(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK: &str = r#"
version = 4

[[package]]
name = "deadpool-postgres"
version = "0.14.1"

[[package]]
name = "tokio"
version = "1.0.1"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "windows-sys"
version = "0.52.0"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "windows-sys"
version = "0.48.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

    #[test]
    fn parses_and_lists_versions_in_file_order() {
        let lock = LockState::parse(LOCK).unwrap();
        assert_eq!(lock.packages().len(), 4);
        let versions = lock.versions_of("windows-sys");
        assert_eq!(versions, vec![Version::new(0, 52, 0), Version::new(0, 48, 0)]);
    }

    #[test]
    fn floor_policies_diverge_on_duplicates() {
        let lock = LockState::parse(LOCK).unwrap();
        assert_eq!(
            lock.floor("windows-sys", FloorPolicy::LastListed),
            Some(Version::new(0, 48, 0))
        );

        // Reorder so the two policies disagree.
        let reordered = LOCK.replace("0.52.0", "0.10.0");
        let lock = LockState::parse(&reordered).unwrap();
        assert_eq!(
            lock.floor("windows-sys", FloorPolicy::LastListed),
            Some(Version::new(0, 48, 0))
        );
        assert_eq!(
            lock.floor("windows-sys", FloorPolicy::Lowest),
            Some(Version::new(0, 10, 0))
        );
    }

    #[test]
    fn floor_is_none_for_unknown_packages() {
        let lock = LockState::parse(LOCK).unwrap();
        assert!(lock.floor("nonexistent", FloorPolicy::LastListed).is_none());
    }

    #[test]
    fn name_matching_normalizes_separators() {
        let lock = LockState::parse(LOCK).unwrap();
        assert_eq!(
            lock.floor("windows_sys", FloorPolicy::LastListed),
            Some(Version::new(0, 48, 0))
        );
    }
}
