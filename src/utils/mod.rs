//! Cross-cutting utilities.

pub mod fs;
