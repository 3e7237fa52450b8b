//! # General Built-ins
//!
//! Functions: `deleted`, `nothing`, `throw`, `range`, `var`.
//! Methods: `type`, `not_null`, `or`, `catch`, `bool`, `not_empty`.

use crate::builtins::helpers::{register, simple_function, simple_method};
use crate::errors::{MappingError, Result};
use crate::params::ParamDef;
use crate::registry::{
    function_ctor, method_ctor, Category, Example, FunctionSet, FunctionSpec, MethodSet,
};
use crate::runtime::{
    exec_child, method_body, recovering_body, ClosureFunction, Literal, TargetKind, TargetPath,
};
use crate::value::{Array, Value};

// ============================================================================
// FUNCTIONS
// ============================================================================

pub fn register_functions(functions: &mut FunctionSet) {
    simple_function(
        functions,
        FunctionSpec::new("deleted", Category::General, "Removes the target of the assignment.")
            .description(
                "Assigning `deleted()` to a field removes it, to a metadata key removes the key \
                 and to `root` drops the message. Inside arrays and objects the element is left out.",
            )
            .example(Example::new(
                "Drop a sensitive field.",
                "root = this\nroot.password = deleted()",
                &[(r#"{"user":"ada","password":"x"}"#, r#"{"user":"ada"}"#)],
            ))
            .example(Example::new(
                "Leave elements out of a literal.",
                r#"root.items = [1, deleted(), 3]"#,
                &[("{}", r#"{"items":[1,3]}"#)],
            )),
        |_ctx| Ok(Value::Delete),
    );

    simple_function(
        functions,
        FunctionSpec::new("nothing", Category::General, "Leaves the target of the assignment unchanged.")
            .example(Example::new(
                "Only overwrite a field when a condition holds.",
                "root = this\nroot.name = if this.name == \"\" { nothing() } else { this.name.uppercase() }",
                &[
                    (r#"{"name":""}"#, r#"{"name":""}"#),
                    (r#"{"name":"ada"}"#, r#"{"name":"ADA"}"#),
                ],
            )),
        |_ctx| Ok(Value::Nothing),
    );

    register(
        functions,
        FunctionSpec::new("throw", Category::General, "Fails the mapping with a message.")
            .param(ParamDef::string("why", "the error message"))
            .example(Example::new(
                "Reject documents that are not ready.",
                r#"root.doc = if this.ready { this } else { throw("document is not ready") }"#,
                &[
                    (r#"{"ready":true}"#, r#"{"doc":{"ready":true}}"#),
                    (r#"{"ready":false}"#, "Error(document is not ready)"),
                ],
            )),
        function_ctor(|params| {
            let why = params.field_string("why")?;
            Ok(ClosureFunction::new("function `throw`", move |_ctx| {
                Err(MappingError::general(why.clone()))
            })
            .into_func())
        }),
    );

    register(
        functions,
        FunctionSpec::new("range", Category::General, "Creates an array of integers.")
            .description(
                "Counts from `start` up to, but not including, `stop` in increments of `step`. \
                 A range may hold at most one million elements.",
            )
            .param(ParamDef::int("start", "the first value"))
            .param(ParamDef::int("stop", "the exclusive upper bound"))
            .param(ParamDef::int("step", "the increment, may be negative").default(1i64))
            .example(Example::new(
                "Count upwards.",
                "root.r = range(0, 5)",
                &[("{}", r#"{"r":[0,1,2,3,4]}"#)],
            ))
            .example(Example::new(
                "Count down with named arguments.",
                "root.r = range(start: 10, stop: 0, step: -3)",
                &[("{}", r#"{"r":[10,7,4,1]}"#)],
            )),
        function_ctor(|params| {
            let values = range(
                params.field_int("start")?,
                params.field_int("stop")?,
                params.field_int("step")?,
            )?;
            Ok(Literal::func(Value::Array(values)))
        }),
    );

    register(
        functions,
        FunctionSpec::new("var", Category::General, "Reads a variable by name.")
            .description("Returns `null` when the variable has not been assigned.")
            .param(ParamDef::string("name", "the variable name"))
            .example(Example::new(
                "Pick a variable by a computed name.",
                "let greeting = \"hello\"\nroot.out = var(\"greet\" + \"ing\")",
                &[("{}", r#"{"out":"hello"}"#)],
            )),
        function_ctor(|params| {
            let name = params.field_string("name")?;
            let targets = vec![TargetPath::new(TargetKind::Variable, vec![name.clone()])];
            Ok(ClosureFunction::new("function `var`", move |ctx| {
                Ok(ctx.vars.get(&name).cloned().unwrap_or(Value::Null))
            })
            .with_targets(targets)
            .into_func())
        }),
    );
}

/// The most elements a single `range` call may produce.
pub const MAX_RANGE_LEN: i128 = 1_000_000;

fn range(start: i64, stop: i64, step: i64) -> Result<Array> {
    if step == 0 {
        return Err(MappingError::general("step must not be zero"));
    }
    if (step > 0 && start > stop) || (step < 0 && start < stop) {
        return Err(MappingError::general(format!(
            "range from {start} to {stop} never terminates with step {step}"
        )));
    }
    let span = i128::from(stop) - i128::from(start);
    let step_wide = i128::from(step);
    let len = (span + step_wide - step_wide.signum()) / step_wide;
    if len > MAX_RANGE_LEN {
        return Err(MappingError::general(format!(
            "range from {start} to {stop} would produce {len} elements, the limit is {MAX_RANGE_LEN}"
        )));
    }
    let mut out = Array::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        out.push_back(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(out)
}

// ============================================================================
// METHODS
// ============================================================================

pub fn register_methods(methods: &mut MethodSet) {
    simple_method(
        methods,
        FunctionSpec::new("type", Category::General, "Returns the type name of a value.")
            .example(Example::new(
                "Inspect field types.",
                "root.a = this.a.type()\nroot.b = this.b.type()\nroot.c = this.c.type()",
                &[(r#"{"a":1,"b":"x","c":[1]}"#, r#"{"a":"number","b":"string","c":"array"}"#)],
            )),
        |value| Ok(Value::from(value.type_name())),
    );

    simple_method(
        methods,
        FunctionSpec::new("not_null", Category::General, "Fails when the value is `null`.")
            .example(Example::new(
                "Require a field.",
                "root.id = this.id.not_null()",
                &[
                    (r#"{"id":"a1"}"#, r#"{"id":"a1"}"#),
                    ("{}", "Error(value is null)"),
                ],
            )),
        |value| match value {
            Value::Null => Err(MappingError::general("value is null")),
            other => Ok(other),
        },
    );

    register(
        methods,
        FunctionSpec::new("or", Category::General, "Falls back when the target is `null` or fails.")
            .param(ParamDef::query("fallback", "the value used instead"))
            .example(Example::new(
                "Default a missing field.",
                r#"root.name = this.name.or("anonymous")"#,
                &[
                    (r#"{"name":"ada"}"#, r#"{"name":"ada"}"#),
                    ("{}", r#"{"name":"anonymous"}"#),
                ],
            )),
        method_ctor(|params| {
            let fallback = params.field_query("fallback")?;
            Ok(recovering_body(move |target, ctx| match target {
                Ok(value) if !value.is_null() && !value.is_sentinel() => Ok(value),
                _ => exec_child(fallback.as_ref(), ctx),
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("catch", Category::General, "Falls back when the target fails.")
            .description("Unlike `or`, a `null` result is kept.")
            .param(ParamDef::query("fallback", "the value used when the target fails"))
            .example(Example::new(
                "Recover from a parse failure.",
                r#"root.doc = this.raw.parse_json().catch({"valid": false})"#,
                &[
                    (r#"{"raw":"{\"valid\":true}"}"#, r#"{"doc":{"valid":true}}"#),
                    (r#"{"raw":"nope"}"#, r#"{"doc":{"valid":false}}"#),
                ],
            )),
        method_ctor(|params| {
            let fallback = params.field_query("fallback")?;
            Ok(recovering_body(move |target, ctx| match target {
                Ok(value) => Ok(value),
                Err(err) => {
                    log::trace!("catch recovered from: {err}");
                    exec_child(fallback.as_ref(), ctx)
                }
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("bool", Category::Coercion, "Converts a value into a boolean.")
            .description(
                "Accepts booleans, the strings `true` and `false`, and numbers (non-zero is true). \
                 Other values fail unless a default is given.",
            )
            .param(ParamDef::bool("default", "returned when the value cannot be converted").optional())
            .example(Example::new(
                "Coerce flags.",
                r#"root.a = this.a.bool()
root.b = this.b.bool()
root.c = this.c.bool(false)"#,
                &[(r#"{"a":"true","b":0,"c":"maybe"}"#, r#"{"a":true,"b":false,"c":false}"#)],
            )),
        method_ctor(|params| {
            let default = params.field_optional_bool("default")?;
            Ok(method_body(move |value, _ctx| {
                let converted = match &value {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => match s.as_str() {
                        "true" => Some(true),
                        "false" => Some(false),
                        _ => None,
                    },
                    number if number.is_number() => number.as_f64().map(|f| f != 0.0),
                    _ => None,
                };
                converted
                    .or(default)
                    .map(Value::Bool)
                    .ok_or_else(|| MappingError::expected("bool", &value))
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("not_empty", Category::General, "Fails when a string, array or object is empty.")
            .example(Example::new(
                "Require at least one tag.",
                "root.tags = this.tags.not_empty()",
                &[
                    (r#"{"tags":["a"]}"#, r#"{"tags":["a"]}"#),
                    (r#"{"tags":[]}"#, "Error(must not be empty)"),
                ],
            )),
        |value| {
            let empty = match &value {
                Value::String(s) => s.is_empty(),
                Value::Bytes(b) => b.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                other => return Err(MappingError::expected("string, array or object", other)),
            };
            if empty {
                Err(MappingError::general(format!("{} must not be empty", value.type_name())))
            } else {
                Ok(value)
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_stop_before_the_bound() {
        assert_eq!(range(0, 3, 1).unwrap().len(), 3);
        assert_eq!(range(3, 3, 1).unwrap().len(), 0);
        assert!(range(0, 3, 0).is_err());
        assert!(range(0, 3, -1).is_err());
        let down: Vec<Value> = range(5, 0, -2).unwrap().into_iter().collect();
        assert_eq!(down, vec![Value::Int(5), Value::Int(3), Value::Int(1)]);
    }

    #[test]
    fn oversized_ranges_are_rejected() {
        assert_eq!(range(0, 1_000_000, 1).unwrap().len(), 1_000_000);
        let err = range(0, 9_000_000_000_000_000_000, 1).unwrap_err();
        assert!(err.to_string().contains("the limit is 1000000"), "{err}");
        assert!(range(i64::MAX, i64::MIN, -1).is_err());
        assert_eq!(range(0, 10, 3).unwrap().len(), 4);
    }
}
