//! End to end mapping behaviour: statements, operators, control flow and built-ins.

mod common;

use common::{json, map_err, map_ok};
use mapling::{Batch, Environment, MappingInput, Part, TraceSpan, Value};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case::field_arithmetic("root.a = this.x + 1", r#"{"x":1}"#, r#"{"a":2}"#)]
#[case::nested_targets("root.a.b.c = this.v", r#"{"v":"deep"}"#, r#"{"a":{"b":{"c":"deep"}}}"#)]
#[case::pass_through("let unused = 1", r#"{"keep":true}"#, r#"{"keep":true}"#)]
#[case::copy_then_delete("root = this\nroot.secret = deleted()", r#"{"a":1,"secret":"x"}"#, r#"{"a":1}"#)]
#[case::nothing_keeps_value("root.a = 1\nroot.a = nothing()", "{}", r#"{"a":1}"#)]
#[case::variables("let rate = 3\nroot.total = this.n * $rate", r#"{"n":4}"#, r#"{"total":12}"#)]
#[case::root_reads_back("root.a = 2\nroot.b = root.a * 10", "{}", r#"{"a":2,"b":20}"#)]
#[case::soft_missing_paths("root.v = this.a.b.c", "{}", r#"{"v":null}"#)]
#[case::coalesce_defaults(r#"root.name = this.name | "anon""#, "{}", r#"{"name":"anon"}"#)]
#[case::coalesce_recovers(r#"root.n = this.s.number() | -1"#, r#"{"s":"x"}"#, r#"{"n":-1}"#)]
#[case::integer_overflow_widens("root.n = 9223372036854775807 + 1", "{}", r#"{"n":9223372036854775808.0}"#)]
#[case::division_is_lossless("root.a = 6 / 3\nroot.b = 7 / 2", "{}", r#"{"a":2,"b":3.5}"#)]
#[case::string_concat(r#"root.s = this.a + "-" + this.b"#, r#"{"a":"x","b":"y"}"#, r#"{"s":"x-y"}"#)]
#[case::if_else(
    r#"root.size = if this.n > 10 { "big" } else if this.n > 5 { "medium" } else { "small" }"#,
    r#"{"n":7}"#,
    r#"{"size":"medium"}"#
)]
#[case::if_without_else_is_nothing("root.a = 1\nroot.a = if false { 2 }", "{}", r#"{"a":1}"#)]
#[case::match_subject(
    r#"root.label = match this.n { 1 => "one", this > 3 => "many", _ => "few" }"#,
    r#"{"n":5}"#,
    r#"{"label":"many"}"#
)]
#[case::match_without_subject(
    r#"root.kind = match { this.a != null => "a", _ => "none" }"#,
    r#"{"a":0}"#,
    r#"{"kind":"a"}"#
)]
#[case::literals_drop_deleted(r#"root.o = {"a": 1, "b": deleted(), "c": [deleted(), 2]}"#, "{}", r#"{"o":{"a":1,"c":[2]}}"#)]
#[case::lambda_restores_this(
    "root.out = this.items.map_each(i -> i + this.offset)",
    r#"{"items":[1,2],"offset":10}"#,
    r#"{"out":[11,12]}"#
)]
#[case::method_chain(
    r#"root.tags = this.tags.filter(t -> t.length() > 1).map_each(t -> t.uppercase()).sort()"#,
    r#"{"tags":["zz","a","bb"]}"#,
    r#"{"tags":["BB","ZZ"]}"#
)]
#[case::negative_index("root.last = this.a.index(-1)", r#"{"a":[1,2,3]}"#, r#"{"last":3}"#)]
#[case::smallest_integer_literal("root.n = -9223372036854775808", "{}", r#"{"n":-9223372036854775808}"#)]
#[case::quoted_paths(r#"root."a.b" = this."x y""#, r#"{"x y":1}"#, r#"{"a.b":1}"#)]
fn mappings_produce_documents(#[case] mapping: &str, #[case] input: &str, #[case] expected: &str) {
    assert_eq!(map_ok(mapping, input), json(expected).to_json_string());
}

#[test]
fn rounding_keeps_integers_when_lossless() {
    assert_eq!(
        map_ok("root.a = this.a.round()\nroot.b = this.b.floor()", r#"{"a":2.5,"b":1e300}"#),
        json(r#"{"a":3,"b":1e300}"#).to_json_string()
    );
    let out = common::map(r#"root.a = this.a.round()"#, r#"{"a":2.5}"#).unwrap();
    assert!(matches!(out.as_object().and_then(|o| o.get("a")), Some(Value::Int(3))));
}

#[test]
fn metadata_statements_write_the_output_metadata() {
    let env = Environment::standard();
    let mapping = env
        .parse("meta topic = \"orders\"\nmeta drop = deleted()\nroot.seen = @topic")
        .unwrap();
    let part = Part::new(r#"{"id":1}"#).with_metadata("drop", "x").with_metadata("keep", 1i64);
    let batch = Batch::from(part);
    let out = mapping.map_part(&batch, 0).unwrap().unwrap();
    assert_eq!(out.metadata().get("topic"), Some(&Value::from("orders")));
    assert_eq!(out.metadata().get("keep"), Some(&Value::Int(1)));
    assert!(out.metadata().get("drop").is_none());
    assert_eq!(out.structured().unwrap(), json(r#"{"seen":"orders"}"#));
}

#[test]
fn original_metadata_stays_visible_through_meta() {
    let env = Environment::standard();
    let mapping = env
        .parse("meta topic = \"new\"\nroot.before = meta(\"topic\")\nroot.after = metadata(\"topic\")")
        .unwrap();
    let batch = Batch::from(Part::new("{}").with_metadata("topic", "old"));
    let out = mapping.map_part(&batch, 0).unwrap().unwrap();
    assert_eq!(out.structured().unwrap(), json(r#"{"after":"new","before":"old"}"#));
}

#[test]
fn deleting_root_drops_the_message() {
    let env = Environment::standard();
    let mapping = env
        .parse("root = if this.spam { deleted() } else { this }")
        .unwrap();
    let batch = Batch::new(vec![Part::new(r#"{"spam":true}"#), Part::new(r#"{"spam":false}"#)]);
    assert!(mapping.map_part(&batch, 0).unwrap().is_none());
    assert!(mapping.map_part(&batch, 1).unwrap().is_some());
}

#[test]
fn unparseable_input_leaves_this_undefined() {
    let env = Environment::standard();
    let mapping = env.parse("root.raw = content().string()\nroot.len = this.a").unwrap();
    let batch = Batch::from(Part::new("not json"));
    let err = mapping.map_part(&batch, 0).unwrap_err();
    assert!(err.to_string().contains("context was undefined"), "{err}");

    let raw_only = env.parse("root.raw = content().string()").unwrap();
    let out = raw_only.map_part(&batch, 0).unwrap().unwrap();
    assert_eq!(out.structured().unwrap(), json(r#"{"raw":"not json"}"#));
}

#[test]
fn batch_functions_see_their_position() {
    let env = Environment::standard();
    let mapping = env
        .parse("root.i = batch_index()\nroot.n = batch_size()\nroot.trace = tracing_id()")
        .unwrap();
    let batch = Batch::new(vec![
        Part::new("{}"),
        Part::new("{}").with_trace_span(TraceSpan::new("abc")),
    ]);
    let second = mapping.map_part(&batch, 1).unwrap().unwrap();
    assert_eq!(second.structured().unwrap(), json(r#"{"i":1,"n":2,"trace":"abc"}"#));
}

#[test]
fn mapping_input_carries_metadata_without_a_batch() {
    let env = Environment::standard();
    let mapping = env.parse("root.k = @key").unwrap();
    let value = json("{}");
    let mut metadata = mapling::value::Object::new();
    metadata.insert("key".to_string(), Value::from("v"));
    let out = mapping.exec(&MappingInput::new(&value, &metadata)).unwrap();
    assert_eq!(out.root, json(r#"{"k":"v"}"#));
    assert_eq!(out.metadata, metadata);
}

#[test]
fn errors_surface_from_builtins() {
    assert!(map_err("root.n = this.s.number()", r#"{"s":"abc"}"#).contains("expected number value"));
    assert!(map_err(r#"root = throw("stop")"#, "{}").contains("stop"));
}
