//! Package manifest access and the destructive pin rewrite.
//!
//! The minimal-versions resolver needs two things from a `Cargo.toml`: the
//! list of direct dependencies (with `package = "..."` rename aliases
//! resolved) and the ability to pin each one to an exact version. Pinning
//! is a destructive in-place edit, so it only ever happens under a
//! [`ManifestGuard`] that snapshots the original bytes first and restores
//! them on every exit path.
//!
//! Edits go through `toml_edit` so the rewrite preserves formatting and
//! comments; the restore path doesn't care (it writes the original bytes
//! back verbatim), but the pinned intermediate state is visible to `cargo`
//! and should stay a faithful manifest.

use anyhow::{Context, Result};
use semver::Version;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, value};

use crate::core::CisternError;
use crate::utils::fs::atomic_write;

/// Cargo treats `-` and `_` as distinct in package names, but manifest
/// keys and lock entries must be matched consistently; comparisons here go
/// through this normalization.
pub fn normalize_name(name: &str) -> String {
    name.replace('_', "-")
}

/// A direct dependency declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDependency {
    /// The manifest key (what the `[dependencies]` table calls it).
    pub key: String,
    /// The real package name: the `package = "..."` alias when the manifest
    /// renamed the dependency, otherwise the key itself.
    pub package: String,
    /// Whether the entry carries a version requirement. Pure `path`
    /// dependencies don't, and cannot be pinned.
    pub versioned: bool,
    /// Whether the entry is `workspace = true` (requirement inherited, not
    /// pinnable locally).
    pub workspace: bool,
}

/// A parsed package manifest (`Cargo.toml`).
pub struct Manifest {
    path: PathBuf,
    doc: DocumentMut,
}

impl Manifest {
    /// Loads and parses the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CisternError::ManifestNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let doc: DocumentMut = text
            .parse()
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// The declared package name, if present.
    pub fn package_name(&self) -> Option<&str> {
        self.doc.get("package")?.get("name")?.as_str()
    }

    /// The declared minimum toolchain version, if present.
    pub fn rust_version(&self) -> Option<&str> {
        self.doc.get("package")?.get("rust-version")?.as_str()
    }

    /// Direct dependencies from the `[dependencies]` table.
    ///
    /// Dev- and build-dependencies are deliberately not included: the floor
    /// verification type-checks the library, which builds neither.
    pub fn direct_dependencies(&self) -> Vec<DirectDependency> {
        let Some(table) = self.doc.get("dependencies").and_then(Item::as_table_like) else {
            return Vec::new();
        };

        table
            .iter()
            .map(|(key, item)| {
                let (package, versioned, workspace) = match item {
                    entry if entry.is_str() => (None, true, false),
                    entry => {
                        let spec = entry.as_table_like();
                        let package = spec
                            .and_then(|t| t.get("package"))
                            .and_then(Item::as_str)
                            .map(ToString::to_string);
                        let versioned =
                            spec.is_some_and(|t| t.get("version").is_some_and(|v| !v.is_none()));
                        let workspace = spec
                            .and_then(|t| t.get("workspace"))
                            .and_then(Item::as_bool)
                            .unwrap_or(false);
                        (package, versioned, workspace)
                    }
                };
                DirectDependency {
                    key: key.to_string(),
                    package: package.unwrap_or_else(|| key.to_string()),
                    versioned,
                    workspace,
                }
            })
            .collect()
    }

    /// Pins each named dependency to an exact version requirement
    /// (`=x.y.z`), preserving the rest of the entry.
    ///
    /// Entries are addressed by manifest key. String entries are replaced
    /// wholesale; table entries get their `version` field rewritten.
    pub fn pin_exact(&mut self, pins: &[(String, Version)]) -> Result<()> {
        for (key, version) in pins {
            let deps = self
                .doc
                .get_mut("dependencies")
                .and_then(Item::as_table_like_mut)
                .context("manifest has no [dependencies] table to pin")?;
            let entry = deps
                .get_mut(key)
                .with_context(|| format!("dependency '{key}' disappeared from the manifest"))?;

            let pinned = format!("={version}");
            if entry.is_str() {
                *entry = value(pinned);
            } else if let Some(spec) = entry.as_table_like_mut() {
                spec.insert("version", value(pinned));
            } else {
                anyhow::bail!("dependency '{key}' has an unsupported entry shape");
            }
            tracing::info!(target: "minver", "pinned {key} to ={version}");
        }
        Ok(())
    }

    /// Writes the (edited) manifest back to disk atomically.
    pub fn save(&self) -> Result<()> {
        atomic_write(&self.path, self.doc.to_string().as_bytes())
            .with_context(|| format!("Failed to write manifest: {}", self.path.display()))
    }
}

/// Scoped snapshot/restore of a manifest file.
///
/// Reads the original bytes on acquisition, before any mutation. Dropping
/// the guard rewrites them; [`ManifestGuard::restore`] does the same but
/// surfaces IO errors instead of only logging them. Either way the pin is
/// never left behind, including on early returns and panics.
pub struct ManifestGuard {
    path: PathBuf,
    original: Vec<u8>,
    restored: bool,
}

impl ManifestGuard {
    /// Snapshots the manifest at `path`. Must be called before any edit.
    pub fn acquire(path: &Path) -> Result<Self> {
        let original = std::fs::read(path)
            .with_context(|| format!("Failed to snapshot manifest: {}", path.display()))?;
        tracing::debug!(target: "minver", "snapshotted {} ({} bytes)", path.display(), original.len());
        Ok(Self {
            path: path.to_path_buf(),
            original,
            restored: false,
        })
    }

    /// The snapshotted original content.
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// Restores the original content, consuming the guard.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        std::fs::write(&self.path, &self.original)
            .with_context(|| format!("Failed to restore manifest: {}", self.path.display()))?;
        tracing::debug!(target: "minver", "restored {}", self.path.display());
        Ok(())
    }
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = std::fs::write(&self.path, &self.original) {
            tracing::error!(
                target: "minver",
                "failed to restore manifest {}: {err}",
                self.path.display()
            );
        }
    }
}
