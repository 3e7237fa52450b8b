//! # Conformance Harness
//!
//! Runs mappings against literal inputs and compares the results with literal
//! expectations. Two sources of cases share the same machinery:
//!
//! - **Registry examples**: every [`Example`] attached to a registered function or method
//! - **Suite files**: YAML documents discovered under a directory
//!
//! ## Suite Format
//!
//! ```yaml
//! mapping: |
//!   root.name = this.name.uppercase()
//! cases:
//!   - name: uppercases names
//!     input: {"name": "ada"}
//!     output: {"name": "ADA"}
//!   - input: {"name": 5}
//!     error: expected string value
//! ```
//!
//! Inputs may be structured YAML or a string holding the raw message. An expected
//! output string is compared structurally when it parses as JSON, otherwise as raw text.
//!
//! ## Example Results
//!
//! Each example result is `(input, expected)` where `expected` is a JSON document,
//! `Error(<substring>)` for a failing mapping, or `Deleted()` when the message must be
//! dropped. The results of one example run in order against a single compiled mapping,
//! so stateful functions observe the earlier calls.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::environment::Environment;
use crate::errors::{MappingError, Result};
use crate::mapping::Mapping;
use crate::message::{Batch, Part};
use crate::registry::Example;
use crate::value::Value;

// =============================================================================
// CORE TYPES
// =============================================================================

/// What a case expects the mapping to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// The mapped message, parsed as JSON when possible.
    Output(Value),
    /// The mapping fails with an error containing this text.
    Error(String),
    /// The mapping deletes the message.
    Deleted,
}

impl Expectation {
    /// Reads the expectation notation used by registry examples.
    pub fn parse(expected: &str) -> Self {
        if expected == "Deleted()" {
            return Expectation::Deleted;
        }
        if let Some(inner) = expected
            .strip_prefix("Error(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Expectation::Error(inner.to_string());
        }
        Expectation::Output(structured_or_text(expected.as_bytes()))
    }
}

/// Outcome of a single case.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pass,
    Fail { expected: String, actual: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    /// Where the case came from: a function name or a suite path.
    pub source: String,
    pub name: String,
    pub outcome: Outcome,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    pub fn failed(&self) -> bool {
        matches!(self.outcome, Outcome::Fail { .. })
    }
}

/// Tallies of a harness run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn of(results: &[CaseResult]) -> Self {
        results.iter().fold(Summary::default(), |mut summary, result| {
            match result.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail { .. } => summary.failed += 1,
                Outcome::Skipped { .. } => summary.skipped += 1,
            }
            summary
        })
    }
}

// =============================================================================
// EXECUTION
// =============================================================================

fn structured_or_text(raw: &[u8]) -> Value {
    Value::from_json_slice(raw).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_json_pretty(),
    }
}

fn render_expectation(expected: &Expectation) -> String {
    match expected {
        Expectation::Output(value) => render(value),
        Expectation::Error(substring) => format!("an error containing `{substring}`"),
        Expectation::Deleted => "the message to be deleted".to_string(),
    }
}

/// Maps `input` as the raw bytes of a single message and checks the result.
pub fn run_case(mapping: &Mapping, input: &[u8], expected: &Expectation) -> Outcome {
    let batch = Batch::from(Part::new(input));
    let actual = match mapping.map_part(&batch, 0) {
        Ok(Some(part)) => Ok(Some(structured_or_text(part.raw()))),
        Ok(None) => Ok(None),
        Err(err) => Err(err),
    };
    let matched = match (&actual, expected) {
        (Ok(Some(value)), Expectation::Output(want)) => value == want,
        (Ok(None), Expectation::Deleted) => true,
        (Err(err), Expectation::Error(substring)) => err.to_string().contains(substring.as_str()),
        _ => false,
    };
    if matched {
        return Outcome::Pass;
    }
    let actual = match actual {
        Ok(Some(value)) => render(&value),
        Ok(None) => "deleted message".to_string(),
        Err(err) => format!("error: {err}"),
    };
    Outcome::Fail {
        expected: render_expectation(expected),
        actual,
    }
}

fn run_example(env: &Environment, source: &str, index: usize, example: &Example) -> Vec<CaseResult> {
    let name = format!("example {} ({})", index + 1, example.summary);
    if example.skip_testing {
        return vec![CaseResult {
            source: source.to_string(),
            name,
            outcome: Outcome::Skipped {
                reason: "marked as not testable".to_string(),
            },
        }];
    }
    let mapping = match env.parse(&example.mapping) {
        Ok(mapping) => mapping,
        Err(err) => {
            return vec![CaseResult {
                source: source.to_string(),
                name,
                outcome: Outcome::Fail {
                    expected: "the mapping to compile".to_string(),
                    actual: format!("error: {err}"),
                },
            }]
        }
    };
    let results = example
        .results
        .iter()
        .enumerate()
        .map(|(i, (input, expected))| CaseResult {
            source: source.to_string(),
            name: format!("{name} #{}", i + 1),
            outcome: run_case(&mapping, input.as_bytes(), &Expectation::parse(expected)),
        })
        .collect();
    if let Err(err) = mapping.close() {
        log::warn!("failed to close example mapping of `{source}`: {err}");
    }
    results
}

/// Runs every example of every function and method registered in `env`.
pub fn check_examples(env: &Environment) -> Vec<CaseResult> {
    let functions = env.functions().specs().map(|spec| (spec, format!("{}()", spec.name)));
    let methods = env.methods().specs().map(|spec| (spec, format!(".{}()", spec.name)));
    let mut results = Vec::new();
    for (spec, source) in functions.chain(methods) {
        if spec.examples.is_empty() {
            results.push(CaseResult {
                source: source.clone(),
                name: "examples".to_string(),
                outcome: Outcome::Fail {
                    expected: "at least one example".to_string(),
                    actual: "none".to_string(),
                },
            });
        }
        for (index, example) in spec.examples.iter().enumerate() {
            results.extend(run_example(env, &source, index, example));
        }
    }
    log::debug!("checked examples: {:?}", Summary::of(&results));
    results
}

// =============================================================================
// SUITE FILES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Suite {
    pub mapping: String,
    #[serde(default)]
    pub cases: Vec<SuiteCase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteCase {
    #[serde(default)]
    pub name: Option<String>,
    pub input: serde_yaml::Value,
    #[serde(default)]
    pub output: Option<serde_yaml::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub skip: bool,
}

impl SuiteCase {
    fn raw_input(&self) -> Result<Vec<u8>> {
        match &self.input {
            serde_yaml::Value::String(s) => Ok(s.clone().into_bytes()),
            other => serde_json::to_vec(other)
                .map_err(|err| MappingError::general(format!("input is not representable as JSON: {err}"))),
        }
    }

    fn expectation(&self) -> Result<Expectation> {
        if let Some(substring) = &self.error {
            return Ok(Expectation::Error(substring.clone()));
        }
        if self.deleted {
            return Ok(Expectation::Deleted);
        }
        match &self.output {
            Some(serde_yaml::Value::String(s)) => Ok(Expectation::Output(structured_or_text(s.as_bytes()))),
            Some(other) => serde_json::to_value(other)
                .map(|json| Expectation::Output(Value::from_json(json)))
                .map_err(|err| MappingError::general(format!("output is not representable as JSON: {err}"))),
            None => Err(MappingError::general(
                "case needs one of `output`, `error` or `deleted`",
            )),
        }
    }
}

/// Finds every `.yaml` or `.yml` file below `root`, in a stable order.
pub fn discover_suites<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

pub fn load_suite(path: &Path) -> Result<Suite> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|err| MappingError::general(format!("failed to parse suite {}: {err}", path.display())))
}

fn unrunnable(err: &MappingError) -> Outcome {
    Outcome::Fail {
        expected: "a runnable case".to_string(),
        actual: format!("error: {err}"),
    }
}

/// Runs a suite. A mapping that fails to compile fails every case.
pub fn run_suite(env: &Environment, source: &str, suite: &Suite) -> Vec<CaseResult> {
    let compiled = env.parse(&suite.mapping);
    let results = suite
        .cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            let name = case.name.clone().unwrap_or_else(|| format!("case {}", i + 1));
            let outcome = if case.skip {
                Outcome::Skipped {
                    reason: "marked `skip`".to_string(),
                }
            } else {
                let prepared = case
                    .raw_input()
                    .and_then(|input| Ok((input, case.expectation()?)));
                match (&compiled, prepared) {
                    (Ok(mapping), Ok((input, expected))) => run_case(mapping, &input, &expected),
                    (Err(err), _) => unrunnable(err),
                    (_, Err(err)) => unrunnable(&err),
                }
            };
            CaseResult {
                source: source.to_string(),
                name,
                outcome,
            }
        })
        .collect();
    if let Ok(mapping) = &compiled {
        if let Err(err) = mapping.close() {
            log::warn!("failed to close mapping of {source}: {err}");
        }
    }
    results
}

/// Discovers, loads and runs every suite under `root`. Unreadable files count as failures.
pub fn run_suites(env: &Environment, root: &Path) -> Vec<CaseResult> {
    let mut results = Vec::new();
    for path in discover_suites(root) {
        let source = path.display().to_string();
        log::info!("running suite {source}");
        match load_suite(&path) {
            Ok(suite) => results.extend(run_suite(env, &source, &suite)),
            Err(err) => results.push(CaseResult {
                source,
                name: "load".to_string(),
                outcome: Outcome::Fail {
                    expected: "a valid suite file".to_string(),
                    actual: format!("error: {err}"),
                },
            }),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectation_notation() {
        assert_eq!(Expectation::parse("Error(boom)"), Expectation::Error("boom".to_string()));
        assert_eq!(Expectation::parse("Deleted()"), Expectation::Deleted);
        assert_eq!(
            Expectation::parse(r#"{"a":1}"#),
            Expectation::Output(Value::from_json_str(r#"{"a":1}"#).unwrap())
        );
        assert_eq!(Expectation::parse("plain"), Expectation::Output(Value::from("plain")));
    }

    #[test]
    fn outputs_compare_structurally() {
        let env = Environment::standard();
        let mapping = env.parse("root.b = this.a + 1").unwrap();
        let expected = Expectation::parse(r#"{ "b" : 2.0 }"#);
        assert_eq!(run_case(&mapping, br#"{"a":1}"#, &expected), Outcome::Pass);
        assert!(matches!(
            run_case(&mapping, br#"{"a":2}"#, &expected),
            Outcome::Fail { .. }
        ));
    }

    #[test]
    fn suite_cases_accept_structured_yaml() {
        let suite: Suite = serde_yaml::from_str(
            "mapping: root.n = this.n * 2\ncases:\n  - input: {n: 2}\n    output: {n: 4}\n  - input: '{\"n\":\"x\"}'\n    error: cannot multiply\n",
        )
        .unwrap();
        let results = run_suite(&Environment::standard(), "inline", &suite);
        assert_eq!(Summary::of(&results), Summary { passed: 2, failed: 0, skipped: 0 });
    }
}
