//! cistern: CI pipeline compiler and minimal-versions MSRV checker for
//! multi-crate Cargo workspaces.
//!
//! Each package in a workspace declares a small override document
//! (`ci.toml`); cistern merges it with the package's own metadata
//! (declared name, declared minimum toolchain version, dependency graph)
//! and compiles a complete, deterministic workflow definition. A
//! companion procedure certifies the declared minimum toolchain by
//! pinning every direct dependency to its lowest allowed version while
//! transitive dependencies float to their latest resolvable versions.
//!
//! # Architecture
//!
//! Two cores, fed by thin readers:
//!
//! - [`pipeline::compiler`] composes [`metadata`] (package identity and
//!   dependency snapshot), [`config`] (path-based override lookups with
//!   documented defaults), and [`pipeline::features`] (the three-way flag
//!   synthesizer) into one pipeline definition.
//! - [`minver`] runs the four-phase minimal-versions procedure against
//!   [`manifest`] (direct dependencies, pin rewrite, guarded restore) and
//!   [`lockfile`] (floor queries with a configurable tie-break policy).
//!
//! External `cargo` invocations go through [`cargo`]; [`reexports`]
//! implements the backend feature consistency diff the generated pipeline
//! invokes.
//!
//! # Example override document
//!
//! ```toml
//! backend = "tokio-postgres"
//!
//! [features]
//! own = ["rt_tokio_1"]
//! required = ["rt_tokio_1"]
//!
//! [check]
//! features = ["rt_tokio_1", "rt_async-std_1"]
//!
//! [test.env]
//! PG_HOST = "127.0.0.1"
//! ```
//!
//! # Command-line usage
//!
//! ```bash
//! # Compile one package's workflow
//! cistern compile crates/deadpool-postgres
//!
//! # Certify the declared MSRV with direct dependencies at their floors
//! cistern min-versions 1.75 --package-dir crates/deadpool-postgres
//!
//! # Diff re-exported backend features
//! cistern reexports --package-dir crates/deadpool-postgres
//! ```

pub mod cargo;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod lockfile;
pub mod manifest;
pub mod metadata;
pub mod minver;
pub mod pipeline;
pub mod reexports;
pub mod utils;
