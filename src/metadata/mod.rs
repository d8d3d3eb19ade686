//! Package metadata reader.
//!
//! Wraps one `cargo metadata` invocation and answers the two questions the
//! compiler asks: who is this package (name, declared minimum toolchain,
//! path inside the workspace) and what does its direct dependency graph
//! look like (resolved versions, plus the backend's declared feature set
//! when a backend is configured).
//!
//! The metadata is materialized once per compiler invocation and treated
//! as an immutable snapshot.

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cargo::CargoCommand;
use crate::core::CisternError;
use crate::manifest::normalize_name;

/// Identity of the package a pipeline is compiled for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    /// Declared package name.
    pub name: String,
    /// Declared minimum toolchain version (`package.rust-version`), if any.
    pub rust_version: Option<String>,
    /// Package directory relative to the workspace root; `.` for a
    /// single-package workspace. Drives path-scoped triggers.
    pub package_path: PathBuf,
}

/// Immutable snapshot of a package's direct dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencySnapshot {
    /// Direct dependency package name (renames resolved) → resolved
    /// version.
    pub direct: BTreeMap<String, Version>,
    /// The backend's declared feature set (feature → implied features and
    /// optional dependencies), when a backend is configured and resolved.
    pub backend_features: Option<BTreeMap<String, Vec<String>>>,
}

impl DependencySnapshot {
    /// Whether `name` is among the direct dependencies (normalized match).
    pub fn has_direct(&self, name: &str) -> bool {
        let normalized = normalize_name(name);
        self.direct.keys().any(|dep| normalize_name(dep) == normalized)
    }
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    name: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,
    manifest_path: PathBuf,
    #[serde(default)]
    rust_version: Option<String>,
    #[serde(default)]
    features: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    packages: Vec<RawPackage>,
    workspace_root: PathBuf,
}

/// Parsed output of one `cargo metadata` invocation.
pub struct Metadata {
    raw: RawMetadata,
}

impl Metadata {
    /// Runs `cargo metadata` in `dir` and parses the result.
    pub async fn load(dir: &Path) -> Result<Self> {
        let json = CargoCommand::metadata()
            .current_dir(dir)
            .execute_stdout()
            .await
            .context("Failed to query package metadata")?;
        Self::parse(&json)
    }

    /// Parses raw `cargo metadata` JSON.
    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawMetadata =
            serde_json::from_str(json).context("Failed to parse cargo metadata output")?;
        Ok(Self {
            raw,
        })
    }

    /// The workspace root directory.
    pub fn workspace_root(&self) -> &Path {
        &self.raw.workspace_root
    }

    /// Finds the package whose manifest lives in `dir` and builds its
    /// identity.
    pub fn identity(&self, dir: &Path) -> Result<PackageIdentity> {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let package = self
            .raw
            .packages
            .iter()
            .find(|p| {
                p.manifest_path
                    .parent()
                    .is_some_and(|parent| parent == canonical || parent == dir)
            })
            .ok_or_else(|| CisternError::PackageNotInMetadata {
                dir: dir.to_path_buf(),
            })?;

        let manifest_dir = package.manifest_path.parent().unwrap_or(Path::new("."));
        let package_path = manifest_dir
            .strip_prefix(&self.raw.workspace_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from("."));
        let package_path = if package_path.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            package_path
        };

        Ok(PackageIdentity {
            name: package.name.clone(),
            rust_version: package.rust_version.clone(),
            package_path,
        })
    }

    /// Builds the dependency snapshot for `package_name`, resolving each
    /// direct dependency to the version present in the metadata. When
    /// `backend` is given, the backend package's feature map is captured
    /// too.
    pub fn snapshot(&self, package_name: &str, backend: Option<&str>) -> Result<DependencySnapshot> {
        let package = self.package(package_name)?;

        let mut direct = BTreeMap::new();
        for dep in &package.dependencies {
            // Normal dependencies only; dev/build deps don't shape the
            // compiled pipeline.
            if dep.kind.is_some() {
                continue;
            }
            if let Some(resolved) = self.find_package(&dep.name) {
                let version = Version::parse(&resolved.version).with_context(|| {
                    format!("invalid version '{}' for '{}'", resolved.version, resolved.name)
                })?;
                direct.insert(resolved.name.clone(), version);
            } else {
                // Optional dependencies that resolution left out.
                tracing::debug!(
                    target: "metadata",
                    "direct dependency '{}' not present in resolved packages",
                    dep.name
                );
            }
        }

        let backend_features = match backend {
            Some(name) => Some(self.features_of(name)?),
            None => None,
        };

        Ok(DependencySnapshot {
            direct,
            backend_features,
        })
    }

    /// The declared feature map of `package_name`.
    pub fn features_of(&self, package_name: &str) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.package(package_name)?.features.clone())
    }

    fn package(&self, name: &str) -> Result<&RawPackage> {
        self.find_package(name).ok_or_else(|| {
            anyhow::anyhow!("package '{name}' not found in cargo metadata output")
        })
    }

    fn find_package(&self, name: &str) -> Option<&RawPackage> {
        self.raw
            .packages
            .iter()
            .find(|p| p.name == name)
            .or_else(|| {
                let normalized = normalize_name(name);
                self.raw.packages.iter().find(|p| normalize_name(&p.name) == normalized)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{
        "workspace_root": "/ws",
        "packages": [
            {
                "name": "deadpool-postgres",
                "version": "0.14.1",
                "manifest_path": "/ws/crates/deadpool-postgres/Cargo.toml",
                "rust_version": "1.75",
                "features": {"default": [], "rt_tokio_1": []},
                "dependencies": [
                    {"name": "tokio-postgres", "rename": null, "kind": null},
                    {"name": "deadpool", "rename": null, "kind": null},
                    {"name": "serde", "rename": null, "kind": "dev"}
                ]
            },
            {
                "name": "tokio-postgres",
                "version": "0.7.10",
                "manifest_path": "/reg/tokio-postgres/Cargo.toml",
                "rust_version": null,
                "features": {"default": ["runtime"], "runtime": [], "with-uuid-1": ["dep:uuid"]},
                "dependencies": []
            },
            {
                "name": "deadpool",
                "version": "0.12.3",
                "manifest_path": "/ws/crates/deadpool/Cargo.toml",
                "rust_version": "1.75",
                "features": {},
                "dependencies": []
            }
        ]
    }"#;

    #[test]
    fn identity_is_relative_to_the_workspace_root() {
        let metadata = Metadata::parse(METADATA).unwrap();
        let identity = metadata.identity(Path::new("/ws/crates/deadpool-postgres")).unwrap();
        assert_eq!(identity.name, "deadpool-postgres");
        assert_eq!(identity.rust_version.as_deref(), Some("1.75"));
        assert_eq!(identity.package_path, PathBuf::from("crates/deadpool-postgres"));
    }

    #[test]
    fn unknown_directory_is_an_error() {
        let metadata = Metadata::parse(METADATA).unwrap();
        assert!(metadata.identity(Path::new("/elsewhere")).is_err());
    }

    #[test]
    fn snapshot_collects_direct_normal_deps_and_backend_features() {
        let metadata = Metadata::parse(METADATA).unwrap();
        let snapshot =
            metadata.snapshot("deadpool-postgres", Some("tokio-postgres")).unwrap();

        assert_eq!(snapshot.direct.len(), 2);
        assert_eq!(snapshot.direct["tokio-postgres"], Version::new(0, 7, 10));
        assert!(snapshot.has_direct("tokio-postgres"));
        assert!(!snapshot.has_direct("serde"));

        let features = snapshot.backend_features.unwrap();
        assert!(features.contains_key("with-uuid-1"));
    }
}
