//! End-to-end runs of the `mapling` binary.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn mapling() -> Command {
    Command::cargo_bin("mapling").unwrap()
}

fn write_mapping(name: &str, source: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mapling-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn eval_maps_stdin() {
    let file = write_mapping("upper.map", "root.name = this.name.uppercase()\n");
    mapling()
        .arg("eval")
        .arg(&file)
        .write_stdin(r#"{"name":"ada"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name":"ADA""#));
}

#[test]
fn eval_lines_runs_a_batch() {
    let file = write_mapping(
        "batch.map",
        "root.n = this.n\nroot.of = batch_size()\nroot = if this.n == 2 { deleted() } else { root }\n",
    );
    mapling()
        .args(["eval", "--lines"])
        .arg(&file)
        .write_stdin("{\"n\":1}\n\n{\"n\":2}\n{\"n\":3}\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"{"n":1,"of":3}"#)
                .and(predicate::str::contains(r#"{"n":3,"of":3}"#))
                .and(predicate::str::contains(r#""n":2"#).not()),
        );
}

#[test]
fn query_prints_strings_raw() {
    mapling()
        .args(["query", "this.user.name.capitalize()"])
        .write_stdin(r#"{"user":{"name":"grace"}}"#)
        .assert()
        .success()
        .stdout("Grace\n");
}

#[test]
fn query_prints_structures_as_json() {
    mapling()
        .args(["query", "this.items.map_each(i -> i * 2)"])
        .write_stdin(r#"{"items":[1,2]}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("2").and(predicate::str::contains("4")));
}

#[test]
fn targets_lists_read_paths() {
    let file = write_mapping("targets.map", "root.a = this.b + this.c.d\nmeta k = @topic\n");
    mapling()
        .arg("targets")
        .arg(&file)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("this.b")
                .and(predicate::str::contains("this.c.d"))
                .and(predicate::str::contains("@topic")),
        );
}

#[test]
fn functions_and_methods_are_listed() {
    mapling()
        .arg("functions")
        .assert()
        .success()
        .stdout(predicate::str::contains("range").and(predicate::str::contains("(impure)")));
    mapling()
        .arg("methods")
        .assert()
        .success()
        .stdout(predicate::str::contains(".uppercase"));
    mapling()
        .args(["functions", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "counter""#));
}

#[test]
fn check_runs_the_documented_examples() {
    mapling()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("passed:"))
        .stdout(predicate::str::contains("failed:").not());
}

#[test]
fn test_runs_the_bundled_suites() {
    let suites = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/suites");
    mapling()
        .arg("test")
        .arg(&suites)
        .assert()
        .success()
        .stdout(predicate::str::contains("orders.yaml").and(predicate::str::contains("failed:").not()));
}

#[test]
fn test_rejects_a_missing_directory() {
    mapling()
        .args(["test", "/definitely/not/here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn parse_errors_are_reported_with_help() {
    let file = write_mapping("broken.map", "root.a = nope(1)\n");
    mapling()
        .arg("eval")
        .arg(&file)
        .write_stdin("{}")
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("mapling::parse::error")
                .and(predicate::str::contains("unrecognised function `nope`")),
        );
}

#[test]
fn runtime_errors_fail_the_command() {
    let file = write_mapping("fail.map", "root.a = this.a * 2\n");
    mapling()
        .arg("eval")
        .arg(&file)
        .write_stdin(r#"{"a":"x"}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed assignment (line 1)"));
}
