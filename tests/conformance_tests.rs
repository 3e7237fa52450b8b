//! Every documented example of the standard library must hold, and the suite runner must
//! agree with the examples on how results are compared.

use std::fs;
use std::path::PathBuf;

use mapling::conformance::{self, Outcome, Summary};
use mapling::Environment;
use pretty_assertions::assert_eq;

#[test]
fn every_registered_example_passes() {
    let env = Environment::standard();
    let results = conformance::check_examples(&env);
    let failures: Vec<String> = results
        .iter()
        .filter_map(|result| match &result.outcome {
            Outcome::Fail { expected, actual } => Some(format!(
                "{} {}\n  expected: {expected}\n  actual:   {actual}",
                result.source, result.name
            )),
            _ => None,
        })
        .collect();
    assert!(failures.is_empty(), "failing examples:\n{}", failures.join("\n"));
    assert!(Summary::of(&results).passed > 100);
}

#[test]
fn every_entry_is_documented() {
    let env = Environment::standard();
    for spec in env.functions().specs().chain(env.methods().specs()) {
        assert!(!spec.examples.is_empty(), "`{}` has no examples", spec.name);
        assert!(!spec.summary.is_empty(), "`{}` has no summary", spec.name);
    }
}

#[test]
fn the_catalogue_is_complete() {
    let env = Environment::standard();
    for name in [
        "deleted", "nothing", "throw", "range", "var", "content", "json", "meta", "metadata",
        "batch_index", "batch_size", "tracing_id", "tracing_span", "env", "now",
        "timestamp_unix", "uuid_v4", "counter", "random_int", "count",
    ] {
        assert!(env.functions().contains(name), "missing function `{name}`");
    }
    for name in [
        "ceil", "floor", "round", "abs", "number", "int64", "uint64", "float64", "uppercase",
        "lowercase", "trim", "capitalize", "length", "contains", "has_prefix", "has_suffix",
        "replace_all", "split", "reverse", "slice", "string", "bytes", "format", "quote",
        "hash", "encode", "decode", "parse_json", "format_json", "re_match", "re_find_all",
        "re_replace_all", "map_each", "filter", "any", "all", "fold", "sort", "sort_by", "sum",
        "join", "keys", "values", "index", "append", "merge", "without", "exists", "get",
        "flatten", "unique", "type", "not_null", "or", "catch", "bool", "not_empty",
    ] {
        assert!(env.methods().contains(name), "missing method `{name}`");
    }
}

#[test]
fn narrowed_environments_drop_impure_entries() {
    let env = Environment::standard().only_pure();
    assert!(!env.functions().contains("counter"));
    assert!(!env.functions().contains("uuid_v4"));
    assert!(env.functions().contains("range"));
    let err = env.parse("root.id = uuid_v4()").unwrap_err();
    assert!(err.to_string().contains("unrecognised function `uuid_v4`"));
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mapling-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("nested")).unwrap();
    dir
}

#[test]
fn suites_are_discovered_and_run() {
    let dir = scratch_dir("suites");
    fs::write(
        dir.join("names.yaml"),
        r#"mapping: |
  root.name = this.name.uppercase()
cases:
  - name: uppercases
    input: {"name": "ada"}
    output: {"name": "ADA"}
  - name: rejects numbers
    input: {"name": 5}
    error: expected string value
"#,
    )
    .unwrap();
    fs::write(
        dir.join("nested/drop.yml"),
        r#"mapping: root = if this.drop { deleted() } else { this }
cases:
  - input: '{"drop":true}'
    deleted: true
  - input: '{"drop":false}'
    output: '{"drop":false}'
  - input: '{}'
    output: {}
    skip: true
"#,
    )
    .unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    assert_eq!(conformance::discover_suites(&dir).len(), 2);
    let results = conformance::run_suites(&Environment::standard(), &dir);
    assert_eq!(
        Summary::of(&results),
        Summary {
            passed: 4,
            failed: 0,
            skipped: 1
        }
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn broken_suites_are_failures() {
    let dir = scratch_dir("broken");
    fs::write(dir.join("bad.yaml"), "mapping: [unclosed").unwrap();
    fs::write(
        dir.join("wrong.yaml"),
        "mapping: root.n = this.n\ncases:\n  - input: {n: 1}\n    output: {n: 2}\n",
    )
    .unwrap();
    let results = conformance::run_suites(&Environment::standard(), &dir);
    assert_eq!(Summary::of(&results).failed, 2);
    let wrong = results.iter().find(|r| r.source.ends_with("wrong.yaml")).unwrap();
    match &wrong.outcome {
        Outcome::Fail { expected, actual } => {
            assert!(expected.contains("\"n\": 2"), "{expected}");
            assert!(actual.contains("\"n\": 1"), "{actual}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let _ = fs::remove_dir_all(&dir);
}
