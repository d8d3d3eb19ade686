//! Cargo invocation layer.
//!
//! Everything cistern asks of the package manager goes through
//! [`CargoCommand`], a fluent builder with consistent timeout handling,
//! error context, and debug logging. The resolver algorithms never touch
//! `tokio::process` directly; they call through the [`crate::minver::Resolver`]
//! capability, whose production implementation is built on this module.

pub mod command_builder;

pub use command_builder::{CargoCommand, CargoCommandOutput};
