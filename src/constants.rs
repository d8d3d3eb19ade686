//! Global constants used throughout the cistern codebase.
//!
//! Timeouts, fixed file names, and the closed policy lists that control
//! conditional job generation. Defining them centrally keeps the policy
//! knobs discoverable and editable in one place.

use std::time::Duration;

/// File name of the per-package CI override document.
///
/// The compiler looks for this file next to the package's `Cargo.toml`.
/// An absent file is not an error; compilation proceeds with an empty
/// document and every documented default applies.
pub const OVERRIDE_FILE_NAME: &str = "ci.toml";

/// Default output directory for compiled workflows, relative to the
/// workspace root.
pub const DEFAULT_WORKFLOW_DIR: &str = ".github/workflows";

/// The branch that compiled pipelines trigger on (besides release tags).
pub const MAIN_BRANCH: &str = "main";

/// Packages that get a live-service integration `check` job.
///
/// This is a closed list keyed by package name, not a predicate over the
/// dependency graph: integration checks are only meaningful for the
/// adapter crates that talk to a real service in CI.
// TODO: let packages opt in through a `check.integration` key in ci.toml
// instead of growing this list by hand.
pub const INTEGRATION_CHECK_PACKAGES: &[&str] =
    &["deadpool-postgres", "deadpool-redis", "deadpool-memcached"];

/// Dependency families that are never pinned during minimal-versions
/// resolution.
///
/// A name matches a family when it equals the family name or starts with
/// `"<family>-"`. The pool framework's own companion crates resolve as
/// workspace siblings and carry no meaningful registry floor, so pinning
/// them to an exact version would only break the re-resolution phase.
pub const SKIP_PIN_FAMILIES: &[&str] = &["deadpool"];

/// Runner images the integration `check` job fans out over.
pub const CHECK_RUNNERS: &[&str] = &["ubuntu-latest", "macos-latest"];

/// Runner image for every non-matrix job.
pub const DEFAULT_RUNNER: &str = "ubuntu-latest";

/// Timeout for a single `cargo` invocation (10 minutes).
///
/// Resolution against a cold registry index can be slow; anything beyond
/// this is treated as a hung invocation and reported as a failure.
pub const CARGO_TIMEOUT: Duration = Duration::from_secs(600);

/// Returns `true` when `name` belongs to one of the given dependency
/// families (exact match or `<family>-` prefix).
pub fn in_family(name: &str, families: &[impl AsRef<str>]) -> bool {
    families.iter().any(|family| {
        let family = family.as_ref();
        name == family || name.strip_prefix(family).is_some_and(|rest| rest.starts_with('-'))
    })
}
