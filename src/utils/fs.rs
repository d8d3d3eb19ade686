//! Atomic file operations.
//!
//! Compiled workflows are committed to version control and diffed, and the
//! minimal-versions resolver rewrites a manifest it must later restore, so
//! every write in cistern goes through the write-then-rename path here.
//! Readers never observe a partially written file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Creates a directory and all parent directories if they don't exist.
///
/// Succeeds silently when the directory is already present.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
        return Ok(());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Safely writes a string to a file using atomic operations.
///
/// Convenience wrapper around [`atomic_write`] for text content.
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// The content is written to a `.tmp` sibling, synced to disk, and renamed
/// over the target. Parent directories are created as needed. The target
/// either holds the old content or the new content, never a mix.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents_and_replaces_content() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("nested/out.yml");

        safe_write(&target, "first")?;
        assert_eq!(fs::read_to_string(&target)?, "first");

        safe_write(&target, "second")?;
        assert_eq!(fs::read_to_string(&target)?, "second");
        assert!(!target.with_extension("tmp").exists());
        Ok(())
    }
}
