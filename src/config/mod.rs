//! The per-package CI override document (`ci.toml`).
//!
//! Each package may carry a sparse override document next to its
//! `Cargo.toml`. The compiler never pattern-matches the document's shape
//! directly: every read goes through [`OverrideDoc::get`] /
//! [`OverrideDoc::get_opt`], which walk a dotted path and bottom out to a
//! caller-supplied default when any intermediate node is missing or not
//! traversable. A partial path is never an error.
//!
//! # Recognized paths
//!
//! | Path | Default |
//! |------|---------|
//! | `backend` | none (no backend-specific jobs) |
//! | `features.own` | unspecified (distinct from `[]`) |
//! | `features.required` | unspecified |
//! | `features.exclude` | `[]` |
//! | `check.features` | `features.own + features.required` |
//! | `test.features` | `features.own + features.required` |
//! | `test.services` | none |
//! | `test.env` | none |
//! | `jobs.*` | none (raw jobs merged verbatim into the pipeline) |
//!
//! The absent-vs-empty distinction matters: `features.own = []` means "no
//! own features", while a missing `features.own` leaves the combined
//! selection unspecified, which downstream turns into `--all-features`.
//!
//! # Example
//!
//! ```toml
//! backend = "tokio-postgres"
//!
//! [features]
//! own = ["rt_tokio_1"]
//! required = ["rt_tokio_1"]
//! exclude = ["runtime"]
//!
//! [check]
//! features = ["rt_tokio_1", "rt_async-std_1"]
//!
//! [test.env]
//! PG_HOST = "127.0.0.1"
//!
//! [test.services.postgres]
//! image = "postgres:16"
//! ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use toml::Value;
use toml::value::Table;

/// One node of the override document, as seen by [`navigate`].
///
/// An explicit sum type instead of duck-typed traversal: structural
/// recursion terminates at [`Node::Missing`] and the caller decides what a
/// leaf means.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// A key-value table; traversal may continue through it.
    Object(&'a Table),
    /// A list value; a path terminating here yields the list.
    List(&'a [Value]),
    /// Any other terminal value.
    Scalar(&'a Value),
    /// The path left the document.
    Missing,
}

impl Node<'_> {
    /// `true` unless the path left the document.
    pub fn is_present(&self) -> bool {
        !matches!(self, Node::Missing)
    }

    /// Clones the node back into an owned value; `None` for [`Node::Missing`].
    pub fn to_value(self) -> Option<Value> {
        match self {
            Node::Object(table) => Some(Value::Table(table.clone())),
            Node::List(items) => Some(Value::Array(items.to_vec())),
            Node::Scalar(value) => Some(value.clone()),
            Node::Missing => None,
        }
    }
}

/// Walks `root` along `path` (split on `.`), returning the node the path
/// ends on. Any miss along the way returns [`Node::Missing`].
pub fn navigate<'a>(root: &'a Value, path: &str) -> Node<'a> {
    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Table(table) => match table.get(segment) {
                Some(next) => current = next,
                None => return Node::Missing,
            },
            _ => return Node::Missing,
        }
    }
    match current {
        Value::Table(table) => Node::Object(table),
        Value::Array(items) => Node::List(items),
        other => Node::Scalar(other),
    }
}

/// A loaded override document.
///
/// Holds the parsed TOML tree; all access goes through the path-based
/// lookups. An absent file loads as an empty document, so every lookup
/// falls back to its default.
#[derive(Debug, Clone)]
pub struct OverrideDoc {
    root: Value,
}

impl Default for OverrideDoc {
    fn default() -> Self {
        Self {
            root: Value::Table(Table::new()),
        }
    }
}

impl OverrideDoc {
    /// Loads the override document at `path`, or an empty document when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(target: "config", "no override document at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read override document: {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Failed to parse override document: {}", path.display()))
    }

    /// Parses an override document from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = toml::from_str(text).context("invalid TOML")?;
        Ok(Self { root })
    }

    /// Path-qualified lookup with a default.
    ///
    /// Returns `default` when the path misses or the value does not
    /// deserialize to `T`. This is total: it never errors.
    pub fn get<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get_opt(path).unwrap_or(default)
    }

    /// Path-qualified lookup returning `None` on a miss.
    ///
    /// Built on [`navigate`]: the structural walk is the sole access
    /// pattern, typed reads only add deserialization on top of it.
    pub fn get_opt<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let raw = navigate(&self.root, path).to_value()?;
        match raw.try_into::<T>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(target: "config", "value at '{path}' has unexpected shape: {err}");
                None
            }
        }
    }

    /// Structural view of the node at `path`.
    pub fn node(&self, path: &str) -> Node<'_> {
        navigate(&self.root, path)
    }

    /// The wrapped backend dependency, if declared.
    pub fn backend(&self) -> Option<String> {
        self.get_opt("backend")
    }

    /// Feature names the package defines itself (not re-exported).
    ///
    /// `None` means unspecified; `Some(vec![])` means explicitly none.
    pub fn own_features(&self) -> Option<Vec<String>> {
        self.get_opt("features.own")
    }

    /// Feature names always needed when building or testing.
    pub fn required_features(&self) -> Option<Vec<String>> {
        self.get_opt("features.required")
    }

    /// Backend feature names intentionally not re-exported.
    pub fn exclude_features(&self) -> Vec<String> {
        self.get("features.exclude", Vec::new())
    }

    /// `own + required`, or `None` when neither is specified.
    ///
    /// The distinction feeds the flag synthesizer's three-way policy:
    /// `None` becomes `--all-features` downstream, while `Some(vec![])`
    /// builds with default features only.
    pub fn combined_features(&self) -> Option<Vec<String>> {
        let own = self.own_features();
        let required = self.required_features();
        if own.is_none() && required.is_none() {
            return None;
        }
        let mut combined = own.unwrap_or_default();
        combined.extend(required.unwrap_or_default());
        Some(combined)
    }

    /// Feature selection for the integration check job.
    pub fn check_features(&self) -> Option<Vec<String>> {
        self.get_opt("check.features").or_else(|| self.combined_features())
    }

    /// Feature selection for the unit-test job.
    pub fn test_features(&self) -> Option<Vec<String>> {
        self.get_opt("test.features").or_else(|| self.combined_features())
    }

    /// Ambient service declarations for the test job, passed through
    /// opaquely.
    pub fn test_services(&self) -> Option<Table> {
        self.get_opt("test.services")
    }

    /// Environment map for the test job, passed through opaquely.
    pub fn test_env(&self) -> Option<Table> {
        self.get_opt("test.env")
    }

    /// Raw job definitions merged verbatim into the pipeline, keyed by job
    /// name. A raw job replaces a same-named generated job wholesale.
    pub fn raw_jobs(&self) -> Option<Table> {
        self.get_opt("jobs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> OverrideDoc {
        OverrideDoc::parse(text).unwrap()
    }

    #[test]
    fn missing_paths_fall_back_to_default() {
        let empty = OverrideDoc::default();
        assert_eq!(empty.get("backend", "none".to_string()), "none");
        assert_eq!(empty.get("features.own", vec!["x".to_string()]), vec!["x".to_string()]);
        assert!(empty.backend().is_none());
        assert!(empty.raw_jobs().is_none());
    }

    #[test]
    fn partial_paths_bottom_out_silently() {
        // `backend` is a scalar; navigating through it must miss, not error.
        let d = doc("backend = \"tokio-postgres\"\n");
        assert!(d.get_opt::<String>("backend.nested.path").is_none());
        assert!(matches!(d.node("backend.nested"), Node::Missing));
    }

    #[test]
    fn navigate_classifies_nodes() {
        let d = doc("backend = \"b\"\n[features]\nown = [\"a\"]\n");
        assert!(matches!(d.node("features"), Node::Object(_)));
        assert!(matches!(d.node("features.own"), Node::List(_)));
        assert!(matches!(d.node("backend"), Node::Scalar(_)));
        assert!(matches!(d.node("nope"), Node::Missing));
    }

    #[test]
    fn empty_own_is_distinct_from_unspecified() {
        let unspecified = doc("[features]\nrequired = [\"r\"]\n");
        assert!(unspecified.own_features().is_none());
        assert_eq!(unspecified.combined_features(), Some(vec!["r".to_string()]));

        let explicit_empty = doc("[features]\nown = []\nrequired = [\"r\"]\n");
        assert_eq!(explicit_empty.own_features(), Some(vec![]));
        assert_eq!(explicit_empty.combined_features(), Some(vec!["r".to_string()]));

        let nothing = OverrideDoc::default();
        assert!(nothing.combined_features().is_none());
    }

    #[test]
    fn check_and_test_features_default_to_own_plus_required() {
        let d = doc("[features]\nown = [\"a\"]\nrequired = [\"b\"]\n");
        assert_eq!(d.check_features(), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(d.test_features(), Some(vec!["a".to_string(), "b".to_string()]));

        let with_override = doc("[features]\nown = [\"a\"]\n[check]\nfeatures = [\"c\"]\n");
        assert_eq!(with_override.check_features(), Some(vec!["c".to_string()]));
        assert_eq!(with_override.test_features(), Some(vec!["a".to_string()]));
    }

    #[test]
    fn typed_lookups_agree_with_navigation() {
        let d = doc("backend = \"b\"\n[features]\nown = [\"a\"]\n");
        for path in ["backend", "features", "features.own", "features.nope", "nope.deep"] {
            assert_eq!(
                d.node(path).is_present(),
                d.get_opt::<toml::Value>(path).is_some(),
                "{path}"
            );
        }
    }

    #[test]
    fn wrong_shape_falls_back_to_default() {
        let d = doc("[features]\nown = \"not-a-list\"\n");
        assert!(d.own_features().is_none());
        assert_eq!(d.get("features.own", vec!["d".to_string()]), vec!["d".to_string()]);
    }
}
