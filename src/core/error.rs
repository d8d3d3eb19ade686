//! Error handling for cistern.
//!
//! The error system follows two rules from the design:
//!
//! 1. **Configuration and resolution errors are fatal** and must name the
//!    entity that caused them (package, dependency, feature path). There is
//!    no partial-success state; a failed phase fails the whole invocation.
//! 2. **Lookup misses in the override document are never errors.** Every
//!    recognized path has a documented default, so nothing in this enum
//!    covers "key not found in ci.toml".
//!
//! External tool failures ([`CisternError::CargoCommandError`]) propagate
//! the tool's stderr verbatim; retries are the CI runner's business, not
//! ours.
//!
//! Call sites wrap these in [`anyhow::Error`] and add `.context()` where a
//! file path or phase name helps; `main` prints the chain and exits
//! non-zero.

use std::path::PathBuf;
use thiserror::Error;

/// All failure modes of the compiler and the minimal-versions resolver.
#[derive(Error, Debug)]
pub enum CisternError {
    /// A `cargo` invocation failed or timed out.
    #[error("cargo {operation} failed: {stderr}")]
    CargoCommandError {
        /// The cargo subcommand that failed (e.g. `metadata`, `update`).
        operation: String,
        /// Stderr from the invocation, passed through verbatim.
        stderr: String,
    },

    /// No `Cargo.toml` at the expected location.
    #[error("manifest not found: {path}")]
    ManifestNotFound {
        /// The path that was probed.
        path: PathBuf,
    },

    /// The package directory is not part of the workspace `cargo metadata`
    /// reported on.
    #[error("no package with a manifest at {dir} in cargo metadata output")]
    PackageNotInMetadata {
        /// The directory the compile was requested for.
        dir: PathBuf,
    },

    /// The msrv job needs a declared floor toolchain and the manifest does
    /// not carry one.
    #[error("package '{package}' declares no rust-version; the msrv job cannot be generated")]
    MissingRustVersion {
        /// The package being compiled.
        package: String,
    },

    /// A re-export check was requested but `ci.toml` names no backend.
    #[error("package '{package}' declares no backend in ci.toml; nothing to diff re-exports against")]
    BackendNotDeclared {
        /// The package the check ran for.
        package: String,
    },

    /// The declared backend is not among the package's direct dependencies.
    #[error("backend '{backend}' of package '{package}' is not a direct dependency")]
    BackendNotADependency {
        /// The package being compiled.
        package: String,
        /// The backend name from `ci.toml`.
        backend: String,
    },

    /// No floor version could be discovered for a direct dependency during
    /// minimal-versions resolution. An un-pinnable dependency makes the
    /// entire floor verification meaningless, so this aborts the run.
    #[error("no floor version found for direct dependency '{dependency}' in the lock state")]
    FloorNotFound {
        /// The dependency's package name (rename alias already applied).
        dependency: String,
    },

    /// `Cargo.lock` was missing after the resolution phase.
    #[error("lock state not found: {path}")]
    LockfileMissing {
        /// The path that was probed.
        path: PathBuf,
    },

    /// The backend's feature set and the package's re-exported features
    /// differ.
    #[error(
        "re-exported features of '{package}' do not match backend '{backend}': \
         {missing} missing, {unexpected} unexpected"
    )]
    ReexportMismatch {
        /// The package that was checked.
        package: String,
        /// The backend it re-exports from.
        backend: String,
        /// Backend features without a matching re-export.
        missing: usize,
        /// Re-exports with no matching backend feature.
        unexpected: usize,
    },
}
