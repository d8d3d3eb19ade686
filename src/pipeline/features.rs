//! Feature flag synthesis.
//!
//! Turns a resolved feature selection into the flag expression passed to
//! build, test, doc, and lint invocations. The three-way policy is a
//! deliberate, user-facing distinction:
//!
//! - unspecified (`None`) builds with every feature enabled,
//! - explicitly empty builds with default features only,
//! - a populated list names exactly those features, in order.

/// Synthesizes the cargo feature flag for a selection.
///
/// ```
/// use cistern::pipeline::features::feature_flags;
///
/// assert_eq!(feature_flags(None), "--all-features");
/// assert_eq!(feature_flags(Some(&[])), "");
/// assert_eq!(
///     feature_flags(Some(&["serde".to_string(), "rt".to_string()])),
///     "--features serde,rt"
/// );
/// ```
pub fn feature_flags(features: Option<&[String]>) -> String {
    match features {
        None => "--all-features".to_string(),
        Some([]) => String::new(),
        // Order is caller-controlled and preserved: it changes nothing
        // functionally but must be stable for reproducible output.
        Some(list) => format!("--features {}", list.join(",")),
    }
}

/// Appends a feature flag to a cargo command line, skipping the separator
/// when the flag is empty.
pub fn with_flags(command: &str, flags: &str) -> String {
    if flags.is_empty() {
        command.to_string()
    } else {
        format!("{command} {flags}")
    }
}
