//! Minimum-version resolution.
//!
//! Proves that a package still builds when every *direct* dependency sits
//! at the lowest version its declared constraint allows, while transitive
//! dependencies float to the latest resolvable versions. Cargo has no
//! single built-in command for "minimal direct, latest transitive", so
//! this runs as a four-phase procedure on a disposable copy of the
//! manifest:
//!
//! 1. **Floor discovery**: resolve the whole graph with the experimental
//!    minimal-versions strategy.
//! 2. **Extraction**: read back the floor chosen for each direct
//!    dependency from the lock state (rename aliases honored, excluded
//!    families and unversioned entries skipped).
//! 3. **Pinning**: rewrite the manifest so each remaining direct
//!    dependency requires exactly its floor. A direct dependency without
//!    a discoverable floor aborts the run.
//! 4. **Re-resolution & restore**: a normal resolve under the pinned
//!    manifest floats transitive dependencies back up, then the original
//!    manifest is restored unconditionally.
//!
//! The artifact is the resulting `Cargo.lock`; a separate `--locked`
//! check step consumes it to decide pass/fail. The manifest itself is
//! never left mutated: restoration runs on every exit path via
//! [`ManifestGuard`].
//!
//! Cargo invocations are reached through the [`Resolver`] capability so
//! the control flow is testable against scripted lock states.

use anyhow::{Context, Result};
use semver::Version;
use std::path::Path;

use crate::cargo::CargoCommand;
use crate::constants::{SKIP_PIN_FAMILIES, in_family};
use crate::core::CisternError;
use crate::lockfile::{FloorPolicy, LockState};
use crate::manifest::{DirectDependency, Manifest, ManifestGuard};

/// Capability for the two resolution passes the procedure needs.
///
/// The production implementation shells out to cargo; tests substitute a
/// fake that writes scripted lock states.
#[allow(async_fn_in_trait)]
pub trait Resolver {
    /// Resolve the whole graph to minimal versions (phase 1).
    async fn resolve_minimal(&self, dir: &Path) -> Result<()>;

    /// Normal resolve under the pinned manifest at the given toolchain
    /// (phase 4).
    async fn resolve_pinned(&self, dir: &Path, toolchain: &str) -> Result<()>;
}

/// Production resolver backed by `cargo update`.
pub struct CargoResolver;

impl Resolver for CargoResolver {
    async fn resolve_minimal(&self, dir: &Path) -> Result<()> {
        CargoCommand::update_minimal_versions()
            .current_dir(dir)
            .with_context_label("floor discovery")
            .execute_success()
            .await
    }

    async fn resolve_pinned(&self, dir: &Path, toolchain: &str) -> Result<()> {
        CargoCommand::update(toolchain)
            .current_dir(dir)
            .with_context_label("re-resolution")
            .execute_success()
            .await
    }
}

/// One minimum-version resolution run for a single package.
pub struct MinVersions<'a> {
    dir: &'a Path,
    toolchain: &'a str,
    policy: FloorPolicy,
    skip: Vec<String>,
}

impl<'a> MinVersions<'a> {
    /// Configures a run for the package in `dir` against the declared
    /// minimum `toolchain`.
    pub fn new(dir: &'a Path, toolchain: &'a str) -> Self {
        Self {
            dir,
            toolchain,
            policy: FloorPolicy::default(),
            skip: SKIP_PIN_FAMILIES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Overrides the floor tie-break policy.
    pub fn with_policy(mut self, policy: FloorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds dependency families to leave unpinned, on top of the built-in
    /// exclusion set.
    pub fn with_skipped(mut self, families: impl IntoIterator<Item = String>) -> Self {
        self.skip.extend(families);
        self
    }

    /// Runs the four phases. The manifest is restored on every exit path;
    /// any phase failure is fatal to the whole run.
    pub async fn run<R: Resolver>(&self, resolver: &R) -> Result<()> {
        let manifest_path = self.dir.join("Cargo.toml");
        let mut manifest = Manifest::load(&manifest_path)?;
        let deps = manifest.direct_dependencies();

        let guard = ManifestGuard::acquire(&manifest_path)?;
        let outcome = self.execute_phases(resolver, &mut manifest, &deps).await;
        let restored = guard.restore();

        outcome?;
        restored
    }

    async fn execute_phases<R: Resolver>(
        &self,
        resolver: &R,
        manifest: &mut Manifest,
        deps: &[DirectDependency],
    ) -> Result<()> {
        tracing::info!(target: "minver", "phase 1: resolving minimal versions");
        resolver
            .resolve_minimal(self.dir)
            .await
            .context("minimal-versions resolution failed")?;

        tracing::info!(target: "minver", "phase 2: extracting floors for direct dependencies");
        let lock = LockState::load(self.dir)?;
        let pins = self.extract_floors(&lock, deps)?;
        if pins.is_empty() {
            tracing::info!(target: "minver", "no pinnable direct dependencies");
        }

        tracing::info!(target: "minver", "phase 3: pinning {} direct dependencies", pins.len());
        manifest.pin_exact(&pins)?;
        manifest.save()?;

        tracing::info!(
            target: "minver",
            "phase 4: re-resolving transitive dependencies at toolchain {}",
            self.toolchain
        );
        resolver
            .resolve_pinned(self.dir, self.toolchain)
            .await
            .context("re-resolution under pinned floors failed")
    }

    /// Phase 2: the floor for every pinnable direct dependency.
    ///
    /// Skips excluded families and entries that carry no version
    /// requirement (pure path and `workspace = true` dependencies). For
    /// everything else a missing floor is fatal: an un-pinnable direct
    /// dependency would make the verification meaningless.
    fn extract_floors(
        &self,
        lock: &LockState,
        deps: &[DirectDependency],
    ) -> Result<Vec<(String, Version)>> {
        let mut pins = Vec::new();
        for dep in deps {
            if in_family(&dep.package, &self.skip) {
                tracing::debug!(target: "minver", "skipping excluded family member '{}'", dep.package);
                continue;
            }
            if dep.workspace || !dep.versioned {
                tracing::debug!(target: "minver", "skipping unversioned dependency '{}'", dep.key);
                continue;
            }
            let floor =
                lock.floor(&dep.package, self.policy).ok_or_else(|| CisternError::FloorNotFound {
                    dependency: dep.package.clone(),
                })?;
            pins.push((dep.key.clone(), floor));
        }
        Ok(pins)
    }
}
