//! Pipeline definition model and YAML emission.
//!
//! A compiled pipeline is an ordered mapping of job name → job
//! specification plus the pipeline-level trigger scoping. The output is a
//! GitHub Actions workflow document, committed to version control and
//! diffed, so emission must be byte-identical across repeated compilations
//! of unchanged input: jobs are held in insertion order and serialized
//! through `serde_yaml`'s order-preserving mapping.
//!
//! Generated jobs are built from the typed structs below; raw jobs from
//! the override document stay untyped ([`serde_yaml::Value`]) and are
//! merged verbatim.

pub mod compiler;
pub mod features;

use anyhow::Result;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

/// Trigger scoping for the whole pipeline.
///
/// Every job is scoped (at the pipeline level, not per-job) to changes
/// under the package's own path, on the main branch or package release
/// tags. This is what lets many packages share one generation pass
/// without cross-triggering each other.
#[derive(Debug, Clone, Serialize)]
pub struct Triggers {
    pub push: PushTrigger,
    pub pull_request: PathFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushTrigger {
    pub branches: Vec<String>,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathFilter {
    pub paths: Vec<String>,
}

/// A generated job specification.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    #[serde(rename = "runs-on")]
    pub runs_on: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<RunDefaults>,
    pub steps: Vec<Step>,
}

impl Job {
    /// A single-runner job with the given steps.
    pub fn on_runner(runner: &str, steps: Vec<Step>) -> Self {
        Self {
            runs_on: Value::String(runner.to_string()),
            strategy: None,
            services: None,
            env: None,
            defaults: None,
            steps,
        }
    }

    /// Scopes every `run` step of this job to a working directory.
    pub fn in_directory(mut self, dir: &str) -> Self {
        if dir != "." {
            self.defaults = Some(RunDefaults {
                run: RunDirectory {
                    working_directory: dir.to_string(),
                },
            });
        }
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Strategy {
    pub matrix: Mapping,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunDefaults {
    pub run: RunDirectory,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunDirectory {
    #[serde(rename = "working-directory")]
    pub working_directory: String,
}

/// One step of a job: either `uses` an action or `run`s a command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<Mapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Mapping>,
}

impl Step {
    /// A `uses:` step referencing an action.
    pub fn uses(action: &str) -> Self {
        Self {
            uses: Some(action.to_string()),
            ..Self::default()
        }
    }

    /// Adds a `with:` input to a `uses:` step.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        let map = self.with.get_or_insert_with(Mapping::new);
        map.insert(Value::String(key.to_string()), Value::String(value.to_string()));
        self
    }

    /// A named `run:` step.
    pub fn run(name: &str, command: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            run: Some(command.to_string()),
            ..Self::default()
        }
    }

    /// Adds an environment variable to the step.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        let map = self.env.get_or_insert_with(Mapping::new);
        map.insert(Value::String(key.to_string()), Value::String(value.to_string()));
        self
    }
}

/// A compiled pipeline definition.
///
/// Job names are unique; inserting a job under an existing name replaces
/// the previous specification wholesale while keeping its position.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub triggers: Triggers,
    jobs: Vec<(String, Value)>,
}

impl Pipeline {
    pub fn new(name: &str, triggers: Triggers) -> Self {
        Self {
            name: name.to_string(),
            triggers,
            jobs: Vec::new(),
        }
    }

    /// Adds a generated job.
    pub fn push_job(&mut self, name: &str, job: &Job) -> Result<()> {
        self.insert_job(name, serde_yaml::to_value(job)?);
        Ok(())
    }

    /// Inserts a job value, replacing any same-named job in place.
    pub fn insert_job(&mut self, name: &str, job: Value) {
        if let Some(slot) = self.jobs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = job;
        } else {
            self.jobs.push((name.to_string(), job));
        }
    }

    /// Job names, in emission order.
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// The job under `name`, if present.
    pub fn job(&self, name: &str) -> Option<&Value> {
        self.jobs.iter().find(|(n, _)| n == name).map(|(_, j)| j)
    }

    /// Serializes the pipeline to workflow YAML.
    ///
    /// The top-level mapping and the jobs mapping are both built in
    /// insertion order, so identical inputs yield identical bytes.
    pub fn to_yaml(&self) -> Result<String> {
        let mut jobs = Mapping::new();
        for (name, job) in &self.jobs {
            jobs.insert(Value::String(name.clone()), job.clone());
        }

        let mut root = Mapping::new();
        root.insert(Value::String("name".to_string()), Value::String(self.name.clone()));
        root.insert(Value::String("on".to_string()), serde_yaml::to_value(&self.triggers)?);
        root.insert(Value::String("jobs".to_string()), Value::Mapping(jobs));

        Ok(serde_yaml::to_string(&Value::Mapping(root))?)
    }
}

/// Converts a raw TOML value (from the override document) into YAML for
/// verbatim inclusion in the pipeline.
pub fn toml_to_yaml(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number((*i).into()),
        toml::Value::Float(f) => Value::Number(serde_yaml::Number::from(*f)),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.iter().map(toml_to_yaml).collect()),
        toml::Value::Table(table) => {
            let mut map = Mapping::new();
            for (key, item) in table {
                map.insert(Value::String(key.clone()), toml_to_yaml(item));
            }
            Value::Mapping(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers() -> Triggers {
        Triggers {
            push: PushTrigger {
                branches: vec!["main".to_string()],
                tags: vec!["pkg-v*".to_string()],
                paths: vec!["crates/pkg/**".to_string()],
            },
            pull_request: PathFilter {
                paths: vec!["crates/pkg/**".to_string()],
            },
        }
    }

    #[test]
    fn insert_job_replaces_in_place() {
        let mut pipeline = Pipeline::new("pkg", triggers());
        pipeline.insert_job("a", Value::String("one".to_string()));
        pipeline.insert_job("b", Value::String("two".to_string()));
        pipeline.insert_job("a", Value::String("replaced".to_string()));

        assert_eq!(pipeline.job_names(), vec!["a", "b"]);
        assert_eq!(pipeline.job("a"), Some(&Value::String("replaced".to_string())));
    }

    #[test]
    fn yaml_emission_is_stable() {
        let mut pipeline = Pipeline::new("pkg", triggers());
        let job = Job::on_runner("ubuntu-latest", vec![Step::run("check", "cargo check")]);
        pipeline.push_job("check", &job).unwrap();

        let first = pipeline.to_yaml().unwrap();
        let second = pipeline.to_yaml().unwrap();
        assert_eq!(first, second);
        assert!(first.contains("runs-on: ubuntu-latest"));
        assert!(!first.contains("working-directory"));
    }

    #[test]
    fn toml_values_convert_to_yaml() {
        let raw: toml::Value = toml::from_str(
            "runs-on = \"ubuntu-latest\"\nsteps = [{ run = \"true\" }]\ncount = 3\nflag = true\n",
        )
        .unwrap();
        let yaml = toml_to_yaml(&raw);
        let mapping = yaml.as_mapping().unwrap();
        assert_eq!(mapping.get("runs-on"), Some(&Value::String("ubuntu-latest".to_string())));
        assert!(mapping.get("steps").unwrap().is_sequence());
    }
}
