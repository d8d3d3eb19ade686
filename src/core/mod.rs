//! Core types shared across cistern.
//!
//! Currently this is the error taxonomy; see [`error`] for the full set of
//! failure modes and how they map to exit behavior.

pub mod error;

pub use error::CisternError;
