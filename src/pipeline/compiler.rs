//! Pipeline synthesis.
//!
//! Composes the package identity, the override document, and the
//! dependency snapshot into one complete pipeline definition: a fixed job
//! skeleton (`lint`, `fmt`, `test`, `docs`, `msrv`), conditionally
//! included jobs (`check` for allow-listed packages, `reexports` when a
//! backend is declared), and finally the raw `jobs.*` overlay, where any
//! name collision replaces the generated job wholesale.
//!
//! Compilation is pure: same inputs, same pipeline, byte-identical YAML.

use anyhow::Result;
use serde_yaml::{Mapping, Value};

use crate::config::OverrideDoc;
use crate::constants::{
    CHECK_RUNNERS, DEFAULT_RUNNER, INTEGRATION_CHECK_PACKAGES, MAIN_BRANCH,
};
use crate::core::CisternError;
use crate::metadata::{DependencySnapshot, PackageIdentity};
use crate::pipeline::features::{feature_flags, with_flags};
use crate::pipeline::{Job, PathFilter, Pipeline, PushTrigger, Step, Strategy, Triggers, toml_to_yaml};

const CHECKOUT_ACTION: &str = "actions/checkout@v4";
const TOOLCHAIN_ACTION: &str = "dtolnay/rust-toolchain@master";

/// Compiles the pipeline definition for one package.
///
/// Fails fast (before emitting anything) on configuration errors: a
/// missing `rust-version` with the msrv job mandatory, or a declared
/// backend that is not a direct dependency of the package.
pub fn compile(
    identity: &PackageIdentity,
    overrides: &OverrideDoc,
    snapshot: Option<&DependencySnapshot>,
) -> Result<Pipeline> {
    let backend = overrides.backend();
    if let (Some(backend), Some(snapshot)) = (backend.as_deref(), snapshot) {
        if !snapshot.has_direct(backend) {
            return Err(CisternError::BackendNotADependency {
                package: identity.name.clone(),
                backend: backend.to_string(),
            }
            .into());
        }
    }
    let rust_version =
        identity.rust_version.as_deref().ok_or_else(|| CisternError::MissingRustVersion {
            package: identity.name.clone(),
        })?;

    let package_path = identity.package_path.display().to_string();
    let mut pipeline = Pipeline::new(&identity.name, triggers(&identity.name, &package_path));

    let combined = overrides.combined_features();
    let combined_flags = feature_flags(combined.as_deref());

    pipeline.push_job("lint", &lint_job(&package_path, &combined_flags))?;
    pipeline.push_job("fmt", &fmt_job(&package_path))?;
    pipeline.push_job("test", &test_job(&package_path, overrides))?;
    pipeline.push_job("docs", &docs_job(&package_path, &combined_flags))?;
    pipeline.push_job("msrv", &msrv_job(&package_path, rust_version, &combined_flags))?;

    if INTEGRATION_CHECK_PACKAGES.contains(&identity.name.as_str()) {
        pipeline.push_job("check", &check_job(&package_path, overrides))?;
    }
    if backend.is_some() {
        pipeline.push_job("reexports", &reexports_job(&package_path))?;
    }

    // Raw overrides last: a same-named job replaces the generated one
    // wholesale, with no field-level merging.
    if let Some(raw_jobs) = overrides.raw_jobs() {
        for (name, job) in &raw_jobs {
            tracing::debug!(target: "compile", "overlaying raw job '{name}'");
            pipeline.insert_job(name, toml_to_yaml(job));
        }
    }

    Ok(pipeline)
}

fn triggers(package: &str, package_path: &str) -> Triggers {
    let paths = if package_path == "." {
        vec!["**".to_string()]
    } else {
        vec![format!("{package_path}/**")]
    };
    Triggers {
        push: PushTrigger {
            branches: vec![MAIN_BRANCH.to_string()],
            tags: vec![format!("{package}-v*")],
            paths: paths.clone(),
        },
        pull_request: PathFilter {
            paths,
        },
    }
}

fn checkout() -> Step {
    Step::uses(CHECKOUT_ACTION)
}

fn toolchain(version: &str, components: Option<&str>) -> Step {
    let step = Step::uses(TOOLCHAIN_ACTION).with("toolchain", version);
    match components {
        Some(components) => step.with("components", components),
        None => step,
    }
}

fn install_cistern() -> Step {
    Step::run("Install cistern", "cargo install cistern --locked")
}

fn lint_job(package_path: &str, combined_flags: &str) -> Job {
    let command = with_flags("cargo clippy --all-targets", combined_flags) + " -- -D warnings";
    Job::on_runner(
        DEFAULT_RUNNER,
        vec![checkout(), toolchain("stable", Some("clippy")), Step::run("Clippy", &command)],
    )
    .in_directory(package_path)
}

fn fmt_job(package_path: &str) -> Job {
    Job::on_runner(
        DEFAULT_RUNNER,
        vec![
            checkout(),
            toolchain("stable", Some("rustfmt")),
            Step::run("Check formatting", "cargo fmt --check"),
        ],
    )
    .in_directory(package_path)
}

fn test_job(package_path: &str, overrides: &OverrideDoc) -> Job {
    let flags = feature_flags(overrides.test_features().as_deref());
    let mut job = Job::on_runner(
        DEFAULT_RUNNER,
        vec![
            checkout(),
            toolchain("stable", None),
            Step::run("Test", &with_flags("cargo test", &flags)),
        ],
    )
    .in_directory(package_path);

    // Service and environment declarations pass through opaquely.
    if let Some(services) = overrides.test_services() {
        job.services = Some(toml_to_yaml(&toml::Value::Table(services)));
    }
    if let Some(env) = overrides.test_env() {
        job.env = Some(toml_to_yaml(&toml::Value::Table(env)));
    }
    job
}

fn docs_job(package_path: &str, combined_flags: &str) -> Job {
    Job::on_runner(
        DEFAULT_RUNNER,
        vec![
            checkout(),
            toolchain("stable", None),
            Step::run("Build documentation", &with_flags("cargo doc --no-deps", combined_flags))
                .env("RUSTDOCFLAGS", "-D warnings"),
        ],
    )
    .in_directory(package_path)
}

/// The toolchain-floor verification job: discover and pin minimal direct
/// dependency versions, then type-check against the resulting lock state
/// at the declared minimum toolchain.
fn msrv_job(package_path: &str, rust_version: &str, combined_flags: &str) -> Job {
    let check = with_flags(&format!("cargo +{rust_version} check --locked"), combined_flags);
    Job::on_runner(
        DEFAULT_RUNNER,
        vec![
            checkout(),
            toolchain("nightly", None),
            toolchain(rust_version, None),
            install_cistern(),
            Step::run("Resolve minimal versions", &format!("cistern min-versions {rust_version}")),
            Step::run("Check at floor", &check),
        ],
    )
    .in_directory(package_path)
}

/// The integration check job, generated only for allow-listed packages:
/// a matrix over the resolved `check.features` selection and the fixed
/// runner environments.
fn check_job(package_path: &str, overrides: &OverrideDoc) -> Job {
    let axis: Vec<Value> = match overrides.check_features() {
        // One matrix cell per feature; the unspecified/empty cases still
        // produce exactly one cell so the matrix is never degenerate.
        Some(features) if !features.is_empty() => features
            .iter()
            .map(|feature| Value::String(feature_flags(Some(std::slice::from_ref(feature)))))
            .collect(),
        Some(_) => vec![Value::String(String::new())],
        None => vec![Value::String("--all-features".to_string())],
    };

    let mut matrix = Mapping::new();
    matrix.insert(Value::String("features".to_string()), Value::Sequence(axis));
    matrix.insert(
        Value::String("os".to_string()),
        Value::Sequence(CHECK_RUNNERS.iter().map(|os| Value::String((*os).to_string())).collect()),
    );

    let mut job = Job::on_runner(
        "${{ matrix.os }}",
        vec![
            checkout(),
            toolchain("stable", None),
            Step::run("Check", "cargo check ${{ matrix.features }}"),
        ],
    )
    .in_directory(package_path);
    job.strategy = Some(Strategy {
        matrix,
    });
    job
}

/// The re-exported-feature-consistency job, generated only when a backend
/// is declared.
fn reexports_job(package_path: &str) -> Job {
    Job::on_runner(
        DEFAULT_RUNNER,
        vec![
            checkout(),
            toolchain("stable", None),
            install_cistern(),
            Step::run("Check re-exported features", "cistern reexports"),
        ],
    )
    .in_directory(package_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn identity(name: &str) -> PackageIdentity {
        PackageIdentity {
            name: name.to_string(),
            rust_version: Some("1.75".to_string()),
            package_path: PathBuf::from(format!("crates/{name}")),
        }
    }

    #[test]
    fn fixed_jobs_are_always_generated_in_order() {
        let pipeline =
            compile(&identity("deadpool-sqlite"), &OverrideDoc::default(), None).unwrap();
        assert_eq!(pipeline.job_names(), vec!["lint", "fmt", "test", "docs", "msrv"]);
    }

    #[test]
    fn missing_rust_version_is_fatal() {
        let mut identity = identity("deadpool-sqlite");
        identity.rust_version = None;
        let err = compile(&identity, &OverrideDoc::default(), None).unwrap_err();
        assert!(err.to_string().contains("rust-version"));
    }

    #[test]
    fn check_job_included_only_for_allow_listed_packages() {
        let listed = compile(&identity("deadpool-postgres"), &OverrideDoc::default(), None).unwrap();
        assert!(listed.job("check").is_some());

        let unlisted = compile(&identity("deadpool-sqlite"), &OverrideDoc::default(), None).unwrap();
        assert!(unlisted.job("check").is_none());
    }

    #[test]
    fn msrv_job_names_the_declared_toolchain() {
        let pipeline =
            compile(&identity("deadpool-sqlite"), &OverrideDoc::default(), None).unwrap();
        let yaml = serde_yaml::to_string(pipeline.job("msrv").unwrap()).unwrap();
        assert!(yaml.contains("cistern min-versions 1.75"));
        assert!(yaml.contains("cargo +1.75 check --locked --all-features"));
    }
}
