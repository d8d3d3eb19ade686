//! Type-safe cargo command builder for consistent command execution.
//!
//! Provides a fluent API for building and executing `cargo` commands,
//! ensuring uniform error handling, timeouts, and logging across the
//! codebase.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::CARGO_TIMEOUT;
use crate::core::CisternError;

/// Name of the cargo executable on this platform.
pub const fn get_cargo_command() -> &'static str {
    if cfg!(windows) { "cargo.exe" } else { "cargo" }
}

/// Builder for constructing and executing cargo commands.
///
/// # Examples
///
/// ```rust,ignore
/// use cistern::cargo::CargoCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let json = CargoCommand::metadata()
///     .current_dir("crates/deadpool-postgres")
///     .execute_stdout()
///     .await?;
///
/// CargoCommand::update_minimal_versions()
///     .current_dir("crates/deadpool-postgres")
///     .with_context_label("floor discovery")
///     .execute_success()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CargoCommand {
    /// Arguments passed to cargo, including any `+toolchain` selector.
    args: Vec<String>,

    /// Working directory for command execution (defaults to the current
    /// process directory).
    current_dir: Option<std::path::PathBuf>,

    /// Environment variables to set for the cargo process.
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for completion (`None` = no timeout).
    timeout_duration: Option<Duration>,

    /// Optional label included in log messages.
    context: Option<String>,
}

impl Default for CargoCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: Some(CARGO_TIMEOUT),
            context: None,
        }
    }
}

impl CargoCommand {
    /// Creates a new cargo command builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for the invocation.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the invocation.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Sets a custom timeout (`None` for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Sets a label included in log messages (e.g. the resolution phase).
    pub fn with_context_label(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The cargo subcommand this invocation runs, skipping any `+toolchain`
    /// selector. Used in error messages.
    fn operation(&self) -> String {
        self.args
            .iter()
            .find(|arg| !arg.starts_with('+'))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Executes the command and returns the captured output.
    pub async fn execute(self) -> Result<CargoCommandOutput> {
        let operation = self.operation();
        let mut cmd = Command::new(get_cargo_command());
        cmd.args(&self.args);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        if let Some(ref ctx) = self.context {
            tracing::debug!(target: "cargo", "({}) Executing: cargo {}", ctx, self.args.join(" "));
        } else {
            tracing::debug!(target: "cargo", "Executing: cargo {}", self.args.join(" "));
        }

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result
                    .context(format!("Failed to execute cargo {}", self.args.join(" ")))?,
                Err(_) => {
                    tracing::warn!(
                        target: "cargo",
                        "Command timed out after {}s: cargo {}",
                        duration.as_secs(),
                        self.args.join(" ")
                    );
                    return Err(CisternError::CargoCommandError {
                        operation,
                        stderr: format!(
                            "cargo command timed out after {} seconds",
                            duration.as_secs()
                        ),
                    }
                    .into());
                }
            }
        } else {
            output_future
                .await
                .context(format!("Failed to execute cargo {}", self.args.join(" ")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::debug!(
                target: "cargo",
                "Command failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            );
            return Err(CisternError::CargoCommandError {
                operation,
                stderr,
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !stderr.is_empty() {
            if let Some(ref ctx) = self.context {
                tracing::debug!(target: "cargo", "({}) {}", ctx, stderr.trim());
            } else {
                tracing::debug!(target: "cargo", "{}", stderr.trim());
            }
        }

        Ok(CargoCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Executes the command and returns only trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Executes the command and checks for success, discarding output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output of a cargo command.
pub struct CargoCommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

// Convenience builders for the invocations cistern actually makes.

impl CargoCommand {
    /// `cargo metadata --format-version 1` (full resolve graph).
    pub fn metadata() -> Self {
        Self::new().args(["metadata", "--format-version", "1"])
    }

    /// `cargo +nightly update -Z minimal-versions`.
    ///
    /// The minimal-versions resolution strategy is an unstable cargo
    /// feature; it needs a nightly toolchain regardless of the toolchain
    /// the floor is later verified against.
    pub fn update_minimal_versions() -> Self {
        Self::new().args(["+nightly", "update", "-Z", "minimal-versions"])
    }

    /// `cargo +<toolchain> update`: a normal resolve that floats transitive
    /// dependencies back up to the latest versions compatible with the
    /// pinned floors.
    pub fn update(toolchain: &str) -> Self {
        Self::new().arg(format!("+{toolchain}")).arg("update")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_builder_basic() {
        let cmd = CargoCommand::new().arg("check").arg("--all-features");
        assert_eq!(cmd.args, vec!["check", "--all-features"]);
    }

    #[test]
    fn command_builder_with_dir() {
        let cmd = CargoCommand::metadata().current_dir("/tmp/pkg");
        assert_eq!(cmd.current_dir, Some(std::path::PathBuf::from("/tmp/pkg")));
        assert_eq!(cmd.args[0], "metadata");
    }

    #[test]
    fn operation_skips_toolchain_selector() {
        let cmd = CargoCommand::update_minimal_versions();
        assert_eq!(cmd.operation(), "update");

        let cmd = CargoCommand::update("1.75.0");
        assert_eq!(cmd.args, vec!["+1.75.0", "update"]);
        assert_eq!(cmd.operation(), "update");
    }
}
