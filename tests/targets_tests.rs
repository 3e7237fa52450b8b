//! Static analysis of the inputs a mapping reads.

use mapling::{Environment, TargetKind, TargetPath};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn targets(source: &str) -> Vec<String> {
    let mapping = Environment::standard().parse(source).unwrap();
    let mut paths: Vec<String> = mapping.targets().iter().map(ToString::to_string).collect();
    paths.sort();
    paths
}

#[rstest]
#[case::fields("root.a = this.x + this.y.z", &["this.x", "this.y.z"])]
#[case::literals_read_nothing(r#"root.a = [1, "two", {"three": 3}]"#, &[])]
#[case::root_references("root.b = root.a", &["root.a"])]
#[case::metadata(r#"root.t = @topic
root.u = meta("user")"#, &["@topic", "@user"])]
#[case::variables("let x = this.v\nroot.y = $x", &["$x", "this.v"])]
#[case::json_function(r#"root.v = json("a.b")"#, &["this.a.b"])]
#[case::lambda_paths_extend_the_target("root.p = this.items.map_each(i -> i.price)", &["this.items", "this.items.price"])]
#[case::scoped_queries_without_lambdas("root.n = this.people.filter(age > 18)", &["this.people", "this.people.age"])]
#[case::unscoped_arguments_use_the_outer_context("root.s = this.a.or(this.b)", &["this.a", "this.b"])]
#[case::duplicates_across_statements("root.a = this.x\nroot.b = this.x.uppercase()", &["this.x"])]
#[case::conditionals(
    r#"root.v = if this.flag { this.a } else { this.b }"#,
    &["this.a", "this.b", "this.flag"]
)]
fn mappings_report_their_inputs(#[case] source: &str, #[case] expected: &[&str]) {
    assert_eq!(targets(source), expected.to_vec());
}

#[test]
fn composite_expressions_keep_every_leaf() {
    let env = Environment::standard();
    let query = env.parse_query("this.a + this.b * this.c - this.d").unwrap();
    let (_, paths) = query.query_targets(mapling::TargetsContext::new());
    assert_eq!(paths.len(), 4);
    for leaf in ["a", "b", "c", "d"] {
        assert!(paths.contains(&TargetPath::value(&[leaf])), "missing {leaf}");
    }
}

#[test]
fn targets_carry_their_kind() {
    let mapping = Environment::standard().parse("root.a = @k\nroot.b = root.c\nroot.d = this.e").unwrap();
    let kinds: Vec<TargetKind> = mapping.targets().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TargetKind::Metadata, TargetKind::Root, TargetKind::Value]);
}

#[test]
fn analysis_does_not_execute_stateful_functions() {
    let env = Environment::standard();
    let mapping = env.parse("root.n = counter(min: this.lo)").unwrap();
    assert_eq!(mapping.targets(), vec![TargetPath::value(&["lo"])]);
    // The counter was never initialised, so the first run still starts at `lo`.
    let out = mapping.query(&mapling::Value::from_json_str(r#"{"lo":5}"#).unwrap()).unwrap();
    assert_eq!(out.to_json_string(), r#"{"n":5}"#);
}
