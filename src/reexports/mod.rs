//! Re-exported feature consistency check.
//!
//! A package that wraps a backend re-exports the backend's feature names
//! as its own. This check diffs the two sets: the backend's features
//! (minus the intentionally excluded ones) against the package's declared
//! features (minus the ones the package defines itself). Pass means the
//! sets are equal.
//!
//! `default` is implicit on both sides and never part of the comparison.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::OverrideDoc;

/// Outcome of one re-export comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReexportDiff {
    /// Backend features with no matching re-export.
    pub missing: Vec<String>,
    /// Re-exports with no matching backend feature.
    pub unexpected: Vec<String>,
    /// Features present on both sides.
    pub matched: Vec<String>,
}

impl ReexportDiff {
    /// `true` when the two sets are equal.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Diffs the backend's re-exportable features against the package's
/// declared re-exports.
///
/// * `backend_features`: every feature the backend declares.
/// * `excluded`: backend features intentionally not re-exported
///   (`features.exclude`).
/// * `declared`: every feature this package declares.
/// * `own`: features the package defines itself (`features.own`), not
///   expected on the backend side. A re-exported feature that also
///   appears in `features.required` is still a re-export and stays in
///   the comparison.
pub fn diff_reexports<'a>(
    backend_features: impl IntoIterator<Item = &'a str>,
    excluded: impl IntoIterator<Item = &'a str>,
    declared: impl IntoIterator<Item = &'a str>,
    own: impl IntoIterator<Item = &'a str>,
) -> ReexportDiff {
    let excluded: BTreeSet<&str> = excluded.into_iter().collect();
    let own: BTreeSet<&str> = own.into_iter().collect();

    let expected: BTreeSet<&str> = backend_features
        .into_iter()
        .filter(|f| *f != "default" && !excluded.contains(f))
        .collect();
    let reexported: BTreeSet<&str> = declared
        .into_iter()
        .filter(|f| *f != "default" && !own.contains(f))
        .collect();

    ReexportDiff {
        missing: expected.difference(&reexported).map(|f| (*f).to_string()).collect(),
        unexpected: reexported.difference(&expected).map(|f| (*f).to_string()).collect(),
        matched: expected.intersection(&reexported).map(|f| (*f).to_string()).collect(),
    }
}

/// Builds the diff for one package from its override document and the two
/// declared feature maps (backend and package, as reported by metadata).
pub fn diff_for_package(
    overrides: &OverrideDoc,
    backend_features: &BTreeMap<String, Vec<String>>,
    declared: &BTreeMap<String, Vec<String>>,
) -> ReexportDiff {
    let excluded = overrides.exclude_features();
    let own = overrides.own_features().unwrap_or_default();
    diff_reexports(
        backend_features.keys().map(String::as_str),
        excluded.iter().map(String::as_str),
        declared.keys().map(String::as_str),
        own.iter().map(String::as_str),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_sets_are_consistent() {
        let diff = diff_reexports(
            ["default", "with-uuid", "with-serde", "runtime"],
            ["runtime"],
            ["default", "with-uuid", "with-serde", "rt_tokio_1"],
            ["rt_tokio_1"],
        );
        assert!(diff.is_consistent());
        assert_eq!(diff.matched, vec!["with-serde", "with-uuid"]);
    }

    #[test]
    fn differences_land_in_both_columns() {
        let diff = diff_reexports(
            ["with-uuid", "with-chrono"],
            [],
            ["with-uuid", "with-eui48"],
            [],
        );
        assert!(!diff.is_consistent());
        assert_eq!(diff.missing, vec!["with-chrono"]);
        assert_eq!(diff.unexpected, vec!["with-eui48"]);
    }

    #[test]
    fn required_reexports_stay_in_the_declared_column() {
        // A feature can be both re-exported and always required; only
        // `features.own` marks a feature as not-a-reexport.
        let overrides =
            OverrideDoc::parse("[features]\nrequired = [\"with-serde\"]\n").unwrap();
        let features = BTreeMap::from([("with-serde".to_string(), Vec::new())]);

        let diff = diff_for_package(&overrides, &features, &features);
        assert!(diff.is_consistent());
        assert_eq!(diff.matched, vec!["with-serde"]);
    }
}
