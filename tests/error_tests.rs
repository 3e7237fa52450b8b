//! Error provenance, wrapping rules and compile diagnostics.

mod common;

use common::{json, map_err};
use mapling::registry::{function_ctor, Category, Example, FunctionSpec};
use mapling::runtime::ClosureFunction;
use mapling::{Environment, FunctionContext, MappingError};
use miette::Diagnostic;
use pretty_assertions::assert_eq;

#[test]
fn failed_assignments_report_their_line() {
    let message = map_err("root.a = 1\nroot.b = this.s.uppercase()", r#"{"s":5}"#);
    assert!(message.starts_with("failed assignment (line 2): "), "{message}");
    assert!(message.contains("expected string value, got number (5)"), "{message}");
}

#[test]
fn first_failure_aborts_the_mapping() {
    let env = Environment::standard();
    let mapping = env.parse("root.a = throw(\"first\")\nroot.b = throw(\"second\")").unwrap();
    let err = mapping.query(&json("{}")).unwrap_err();
    assert!(matches!(err, MappingError::Assignment { line: 1, .. }));
    assert!(err.to_string().contains("first"));
    assert!(!err.to_string().contains("second"));
}

#[test]
fn type_mismatches_name_both_operands() {
    let env = Environment::standard();
    let mapping = env.parse("root.x = this.a + this.b").unwrap();
    let err = mapping.query(&json(r#"{"a":"x","b":1}"#)).unwrap_err();
    let mismatch = err.as_type_mismatch().expect("a type mismatch");
    assert_eq!(mismatch.operation, "add");
    assert_eq!(mismatch.left_type, "string");
    assert_eq!(mismatch.right_type, "number");
    assert!(err.to_string().contains("cannot add types string"), "{err}");
}

#[test]
fn wrapping_is_idempotent() {
    let once = MappingError::general("boom").annotate("function `first`");
    let rendered = once.to_string();
    let twice = once.annotate("function `second`");
    assert_eq!(twice.to_string(), rendered);
    assert_eq!(rendered, "function `first`: boom");
}

#[test]
fn missing_context_is_reported_as_such() {
    let env = Environment::standard();
    let query = env.parse_query("this.user.name").unwrap();
    let err = query.exec(&FunctionContext::empty()).unwrap_err();
    assert!(err.is_no_context());
    assert!(err.to_string().contains("unable to reference `user.name`"), "{err}");
}

#[test]
fn component_errors_pass_through_untouched() {
    let mut env = Environment::standard();
    env.register_function(
        FunctionSpec::new("lookup", Category::General, "Fails like a remote cache would.").example(
            Example::new("Always fails.", "root = lookup()", &[("{}", "Error(timeout)")]),
        ),
        function_ctor(|_params| {
            Ok(ClosureFunction::new("function `lookup`", |_ctx| {
                Err(MappingError::component("cache", "users", vec![], "timeout"))
            })
            .into_func())
        }),
    )
    .unwrap();
    let mapping = env.parse("root.user = lookup().name").unwrap();
    let err = mapping.query(&json("{}")).unwrap_err();
    assert!(err.as_component().is_some());
    assert_eq!(
        err.to_string(),
        "failed assignment (line 1): component `cache` (users) failed: timeout"
    );
}

#[test]
fn registering_a_duplicate_name_fails() {
    let mut env = Environment::standard();
    let err = env
        .register_function(
            FunctionSpec::new("range", Category::General, "Shadows a built-in."),
            function_ctor(|_params| Ok(mapling::runtime::Literal::func(mapling::Value::Null))),
        )
        .unwrap_err();
    assert!(err.to_string().contains("conflicting function name: range"));
}

#[test]
fn unknown_functions_fail_to_compile_with_help() {
    let env = Environment::standard();
    let err = env.parse("root.a = 1\nroot.b = nope()").unwrap_err();
    assert!(err.to_string().contains("unrecognised function `nope`"), "{err}");
    let help = err.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("mapling functions"), "{help}");

    let err = env.parse("root.b = this.a.nope()").unwrap_err();
    assert!(err.to_string().contains("unrecognised method `nope`"), "{err}");
}

#[test]
fn parameter_errors_name_the_call() {
    let env = Environment::standard();
    let err = env.parse(r#"root.a = this.s.re_match("(")"#).unwrap_err();
    assert!(err.to_string().contains("invalid regular expression"), "{err}");
    let err = env.parse("root.a = range(1)").unwrap_err();
    assert!(err.to_string().contains("function `range`"), "{err}");
    let err = env.parse("root.a = range(0, 9000000000000000000)").unwrap_err();
    assert!(err.to_string().contains("the limit is 1000000"), "{err}");
}

#[test]
fn parse_errors_render_through_miette() {
    let env = Environment::standard();
    let err = env.parse("root.a = (1 + ").unwrap_err();
    assert_eq!(
        err.code().map(|c| c.to_string()),
        Some("mapling::parse::error".to_string())
    );
    let rendered = format!("{:?}", miette::Report::new(err));
    assert!(rendered.contains("failed to parse mapping"), "{rendered}");
}

#[test]
fn catch_recovers_from_failures() {
    assert_eq!(
        common::map_ok(r#"root.v = this.s.number().catch(0)"#, r#"{"s":"x"}"#),
        r#"{"v":0}"#
    );
}
