//! # Number Methods
//!
//! Rounding and numeric coercion. Every rounding method goes through
//! [`round_with`](crate::value::number::round_with), so a rounded float becomes an
//! integer exactly when the cast is lossless.

use crate::builtins::helpers::{register, simple_method};
use crate::errors::MappingError;
use crate::params::ParamDef;
use crate::registry::{method_ctor, Category, Example, FunctionSpec, MethodSet};
use crate::runtime::method_body;
use crate::value::number::round_with;
use crate::value::Value;

fn rounding(methods: &mut MethodSet, name: &str, summary: &str, round_fn: fn(f64) -> f64, example: Example) {
    simple_method(
        methods,
        FunctionSpec::new(name, Category::Numbers, summary)
            .description(
                "Integers are returned unchanged. A rounded float becomes an integer when it fits \
                 a signed 64 bit integer, otherwise it stays a float.",
            )
            .example(example),
        move |value| round_with(&value, round_fn).ok_or_else(|| MappingError::expected("number", &value)),
    );
}

/// Parses a number from text, preferring integer representations.
fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Value::UInt(u));
    }
    s.parse::<f64>().ok().map(Value::Float)
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        number if number.is_number() => Some(number.clone()),
        Value::String(s) => parse_number(s),
        Value::Bytes(b) => std::str::from_utf8(b).ok().and_then(parse_number),
        _ => None,
    }
}

fn not_integral(kind: &str, value: &Value) -> MappingError {
    MappingError::general(format!(
        "value {} cannot be represented as {kind} without loss",
        value.preview()
    ))
}

pub fn register_methods(methods: &mut MethodSet) {
    rounding(
        methods,
        "ceil",
        "Rounds a number up to the nearest integer.",
        f64::ceil,
        Example::new(
            "Round up.",
            "root.a = this.a.ceil()\nroot.b = this.b.ceil()",
            &[(r#"{"a":5.3,"b":-5.9}"#, r#"{"a":6,"b":-5}"#)],
        ),
    );
    rounding(
        methods,
        "floor",
        "Rounds a number down to the nearest integer.",
        f64::floor,
        Example::new(
            "Round down.",
            "root.a = this.a.floor()\nroot.b = this.b.floor()",
            &[(r#"{"a":5.7,"b":-5.1}"#, r#"{"a":5,"b":-6}"#)],
        ),
    );
    rounding(
        methods,
        "round",
        "Rounds a number to the nearest integer, halves away from zero.",
        f64::round,
        Example::new(
            "Round to the nearest integer.",
            "root.a = this.a.round()\nroot.b = this.b.round()\nroot.huge = this.huge.round()",
            &[(r#"{"a":5.5,"b":5.4,"huge":1e300}"#, r#"{"a":6,"b":5,"huge":1e300}"#)],
        ),
    );

    simple_method(
        methods,
        FunctionSpec::new("abs", Category::Numbers, "Returns the absolute value of a number.")
            .example(Example::new(
                "Distance from zero.",
                "root.a = this.a.abs()\nroot.b = this.b.abs()",
                &[(r#"{"a":-5,"b":-2.5}"#, r#"{"a":5,"b":2.5}"#)],
            )),
        |value| match value {
            Value::Int(i) => Ok(i
                .checked_abs()
                .map(Value::Int)
                .unwrap_or_else(|| Value::UInt(i.unsigned_abs()))),
            Value::UInt(_) => Ok(value),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(MappingError::expected("number", &other)),
        },
    );

    register(
        methods,
        FunctionSpec::new("number", Category::Coercion, "Converts a value into a number.")
            .description(
                "Numbers are returned unchanged and strings are parsed. Other values fail unless \
                 a default is given.",
            )
            .param(ParamDef::any("default", "returned when the value cannot be converted").optional())
            .example(Example::new(
                "Parse numeric strings.",
                "root.a = this.a.number()\nroot.b = this.b.number(0)",
                &[(r#"{"a":"12.5","b":"n/a"}"#, r#"{"a":12.5,"b":0}"#)],
            ))
            .example(Example::new(
                "Unparseable values fail without a default.",
                "root.a = this.a.number()",
                &[(r#"{"a":"twelve"}"#, "Error(expected number value)")],
            )),
        method_ctor(|params| {
            let default = params.get("default").cloned();
            Ok(method_body(move |value, _ctx| {
                to_number(&value)
                    .or_else(|| default.clone())
                    .ok_or_else(|| MappingError::expected("number", &value))
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("int64", Category::Coercion, "Converts a value into a signed 64 bit integer.")
            .description("Strings are parsed. Fails when the conversion would lose information.")
            .example(Example::new(
                "Integral floats convert, fractional ones fail.",
                "root.a = this.a.int64()\nroot.b = this.b.int64()",
                &[
                    (r#"{"a":"-7","b":3.0}"#, r#"{"a":-7,"b":3}"#),
                    (r#"{"a":1,"b":3.5}"#, "Error(cannot be represented as int64)"),
                ],
            )),
        |value| {
            let number = to_number(&value).ok_or_else(|| MappingError::expected("number", &value))?;
            number
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| not_integral("int64", &value))
        },
    );

    simple_method(
        methods,
        FunctionSpec::new("uint64", Category::Coercion, "Converts a value into an unsigned 64 bit integer.")
            .description("Strings are parsed. Fails for negative or fractional numbers.")
            .example(Example::new(
                "Convert to unsigned.",
                "root.a = this.a.uint64()",
                &[
                    (r#"{"a":"18446744073709551615"}"#, r#"{"a":18446744073709551615}"#),
                    (r#"{"a":-1}"#, "Error(cannot be represented as uint64)"),
                ],
            )),
        |value| {
            let number = to_number(&value).ok_or_else(|| MappingError::expected("number", &value))?;
            number
                .as_u64()
                .map(Value::UInt)
                .ok_or_else(|| not_integral("uint64", &value))
        },
    );

    simple_method(
        methods,
        FunctionSpec::new("float64", Category::Coercion, "Converts a value into a 64 bit float.")
            .example(Example::new(
                "Parse a float.",
                "root.a = this.a.float64()\nroot.half = this.b.float64() / 2",
                &[(r#"{"a":"2.25","b":5}"#, r#"{"a":2.25,"half":2.5}"#)],
            )),
        |value| {
            to_number(&value)
                .and_then(|number| number.as_f64())
                .map(Value::Float)
                .ok_or_else(|| MappingError::expected("number", &value))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_parses_to_the_narrowest_number() {
        assert!(matches!(parse_number("42"), Some(Value::Int(42))));
        assert!(matches!(parse_number(" 18446744073709551615 "), Some(Value::UInt(u64::MAX))));
        assert!(matches!(parse_number("1.5"), Some(Value::Float(f)) if f == 1.5));
        assert!(parse_number("x").is_none());
    }

    #[test]
    fn booleans_are_not_numbers() {
        assert!(to_number(&Value::Bool(true)).is_none());
        assert_eq!(to_number(&Value::Bytes(b"7".to_vec())), Some(Value::Int(7)));
    }
}
