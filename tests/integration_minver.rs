//! Integration tests for the minimal-versions procedure, driven by a
//! scripted resolver: restoration on every exit path, pin exclusion, and
//! floor policy behavior.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use cistern::lockfile::FloorPolicy;
use cistern::minver::{MinVersions, Resolver};

const MANIFEST: &str = r#"[package]
name = "deadpool-postgres"
version = "0.14.1"
rust-version = "1.75"

[dependencies]
deadpool = { path = "../deadpool", version = "0.12" }
tokio = { version = "1.0", features = ["rt"] }
tokio-postgres = "0.7"
pg = { package = "postgres-types", version = "0.2" }
local-helper = { path = "../helper" }
"#;

const MINIMAL_LOCK: &str = r#"version = 4

[[package]]
name = "deadpool-postgres"
version = "0.14.1"

[[package]]
name = "tokio"
version = "1.0.1"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "tokio-postgres"
version = "0.7.0"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "postgres-types"
version = "0.2.4"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

/// Scripted stand-in for cargo: phase 1 writes a canned lock state and
/// phase 4 records the manifest as it looked while pinned.
struct FakeResolver {
    lock: Option<String>,
    fail_minimal: bool,
    fail_pinned: bool,
    pinned_manifest: Mutex<Option<String>>,
}

impl FakeResolver {
    fn with_lock(lock: &str) -> Self {
        Self {
            lock: Some(lock.to_string()),
            fail_minimal: false,
            fail_pinned: false,
            pinned_manifest: Mutex::new(None),
        }
    }

    fn pinned_manifest(&self) -> Option<String> {
        self.pinned_manifest.lock().unwrap().clone()
    }
}

impl Resolver for FakeResolver {
    async fn resolve_minimal(&self, dir: &Path) -> Result<()> {
        if self.fail_minimal {
            anyhow::bail!("registry unreachable");
        }
        if let Some(lock) = &self.lock {
            std::fs::write(dir.join("Cargo.lock"), lock)?;
        }
        Ok(())
    }

    async fn resolve_pinned(&self, dir: &Path, _toolchain: &str) -> Result<()> {
        let manifest = std::fs::read_to_string(dir.join("Cargo.toml"))?;
        *self.pinned_manifest.lock().unwrap() = Some(manifest);
        if self.fail_pinned {
            anyhow::bail!("no matching version under pinned floors");
        }
        Ok(())
    }
}

fn package_dir(manifest: &str) -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let path = dir.path().to_path_buf();
    std::fs::write(path.join("Cargo.toml"), manifest)?;
    Ok((dir, path))
}

#[tokio::test]
async fn pins_direct_deps_and_restores_the_manifest() -> Result<()> {
    let (_tmp, dir) = package_dir(MANIFEST)?;
    let resolver = FakeResolver::with_lock(MINIMAL_LOCK);

    MinVersions::new(&dir, "1.75").run(&resolver).await?;

    // During phase 4 every pinnable direct dependency sat at its floor.
    let pinned = resolver.pinned_manifest().expect("re-resolution should have run");
    assert!(pinned.contains(r#"tokio-postgres = "=0.7.0""#));
    assert!(pinned.contains(r#"version = "=1.0.1""#));
    assert!(pinned.contains(r#"version = "=0.2.4""#));
    // The excluded family member and the path-only dep stay untouched.
    assert!(pinned.contains(r#"deadpool = { path = "../deadpool", version = "0.12" }"#));
    assert!(pinned.contains(r#"local-helper = { path = "../helper" }"#));

    // After the run the manifest is byte-identical to its original state.
    assert_eq!(std::fs::read_to_string(dir.join("Cargo.toml"))?, MANIFEST);
    Ok(())
}

#[tokio::test]
async fn missing_floor_for_a_direct_dep_is_fatal_but_still_restores() -> Result<()> {
    let (_tmp, dir) = package_dir(MANIFEST)?;
    // Lock state without tokio: its floor cannot be determined.
    let lock = MINIMAL_LOCK.replace("name = \"tokio\"", "name = \"something-else\"");
    let resolver = FakeResolver::with_lock(&lock);

    let err = MinVersions::new(&dir, "1.75").run(&resolver).await.unwrap_err();
    assert!(err.to_string().contains("tokio"));
    assert_eq!(std::fs::read_to_string(dir.join("Cargo.toml"))?, MANIFEST);
    Ok(())
}

#[tokio::test]
async fn excluded_families_never_need_a_floor() -> Result<()> {
    // `deadpool` has no entry in the lock state at all; the run must not
    // fail on it because the family is excluded from pinning.
    let (_tmp, dir) = package_dir(MANIFEST)?;
    let resolver = FakeResolver::with_lock(MINIMAL_LOCK);
    MinVersions::new(&dir, "1.75").run(&resolver).await?;
    Ok(())
}

#[tokio::test]
async fn cli_skip_families_extend_the_exclusion_set() -> Result<()> {
    let (_tmp, dir) = package_dir(MANIFEST)?;
    // Drop tokio from the lock state, then skip its family: no failure,
    // and no pin for it during phase 4.
    let lock = MINIMAL_LOCK.replace("name = \"tokio\"", "name = \"something-else\"");
    let resolver = FakeResolver::with_lock(&lock);

    MinVersions::new(&dir, "1.75")
        .with_skipped(["tokio".to_string()])
        .run(&resolver)
        .await?;

    let pinned = resolver.pinned_manifest().unwrap();
    assert!(pinned.contains(r#"tokio = { version = "1.0", features = ["rt"] }"#));
    Ok(())
}

#[tokio::test]
async fn minimal_resolution_failure_aborts_before_any_edit() -> Result<()> {
    let (_tmp, dir) = package_dir(MANIFEST)?;
    let resolver = FakeResolver {
        fail_minimal: true,
        ..FakeResolver::with_lock(MINIMAL_LOCK)
    };

    let err = MinVersions::new(&dir, "1.75").run(&resolver).await.unwrap_err();
    assert!(format!("{err:#}").contains("minimal-versions resolution failed"));
    assert!(resolver.pinned_manifest().is_none());
    assert_eq!(std::fs::read_to_string(dir.join("Cargo.toml"))?, MANIFEST);
    Ok(())
}

#[tokio::test]
async fn re_resolution_failure_still_restores() -> Result<()> {
    let (_tmp, dir) = package_dir(MANIFEST)?;
    let resolver = FakeResolver {
        fail_pinned: true,
        ..FakeResolver::with_lock(MINIMAL_LOCK)
    };

    let err = MinVersions::new(&dir, "1.75").run(&resolver).await.unwrap_err();
    assert!(format!("{err:#}").contains("re-resolution under pinned floors failed"));
    assert_eq!(std::fs::read_to_string(dir.join("Cargo.toml"))?, MANIFEST);
    Ok(())
}

#[tokio::test]
async fn missing_lock_state_is_a_specific_error() -> Result<()> {
    let (_tmp, dir) = package_dir(MANIFEST)?;
    // Phase 1 "succeeds" without producing a lock state.
    let resolver = FakeResolver {
        lock: None,
        fail_minimal: false,
        fail_pinned: false,
        pinned_manifest: Mutex::new(None),
    };

    let err = MinVersions::new(&dir, "1.75").run(&resolver).await.unwrap_err();
    assert!(format!("{err:#}").contains("lock state not found"));
    assert_eq!(std::fs::read_to_string(dir.join("Cargo.toml"))?, MANIFEST);
    Ok(())
}

#[tokio::test]
async fn floor_policy_controls_the_tie_break() -> Result<()> {
    let manifest = r#"[package]
name = "pkg"
version = "0.1.0"

[dependencies]
windows-sys = "0.40"
"#;
    let lock = r#"version = 4

[[package]]
name = "pkg"
version = "0.1.0"

[[package]]
name = "windows-sys"
version = "0.40.0"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "windows-sys"
version = "0.48.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

    let (_tmp, dir) = package_dir(manifest)?;
    let resolver = FakeResolver::with_lock(lock);
    MinVersions::new(&dir, "1.75").run(&resolver).await?;
    assert!(resolver.pinned_manifest().unwrap().contains(r#"windows-sys = "=0.48.0""#));

    let (_tmp2, dir2) = package_dir(manifest)?;
    let resolver = FakeResolver::with_lock(lock);
    MinVersions::new(&dir2, "1.75")
        .with_policy(FloorPolicy::Lowest)
        .run(&resolver)
        .await?;
    assert!(resolver.pinned_manifest().unwrap().contains(r#"windows-sys = "=0.40.0""#));
    Ok(())
}
