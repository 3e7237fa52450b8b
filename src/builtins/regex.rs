//! # Regular Expression Methods
//!
//! Patterns are static arguments compiled once when the mapping is parsed, so an invalid
//! pattern is a compile error rather than a per-message failure. Strings are matched with
//! [`regex::Regex`], byte sequences with [`regex::bytes::Regex`].

use ::regex::bytes::Regex as BytesRegex;
use ::regex::Regex;

use crate::builtins::helpers::{register, text};
use crate::errors::{MappingError, Result};
use crate::params::{ParamDef, ParsedParams};
use crate::registry::{method_ctor, Category, Example, FunctionSpec, MethodSet};
use crate::runtime::method_body;
use crate::value::{Text, Value};

/// One pattern compiled for both text families.
struct Pattern {
    text: Regex,
    bytes: BytesRegex,
}

impl Pattern {
    fn compile(source: &str) -> Result<Self> {
        let invalid = |err: ::regex::Error| MappingError::params(format!("invalid regular expression: {err}"));
        Ok(Pattern {
            text: Regex::new(source).map_err(invalid)?,
            bytes: BytesRegex::new(source).map_err(invalid)?,
        })
    }

    fn from_params(params: &ParsedParams) -> Result<Self> {
        let source = params.field_string("pattern")?;
        log::trace!("compiling pattern {source:?}");
        Self::compile(&source)
    }

    fn is_match(&self, haystack: &Text<'_>) -> bool {
        match haystack {
            Text::Str(s) => self.text.is_match(s),
            Text::Bytes(b) => self.bytes.is_match(b),
        }
    }

    fn find_all(&self, haystack: &Text<'_>) -> Value {
        match haystack {
            Text::Str(s) => self.text.find_iter(s).map(|m| Value::from(m.as_str())).collect(),
            Text::Bytes(b) => self
                .bytes
                .find_iter(b)
                .map(|m| Value::Bytes(m.as_bytes().to_vec()))
                .collect(),
        }
    }

    fn replace_all(&self, haystack: &Text<'_>, replacement: &str) -> Value {
        match haystack {
            Text::Str(s) => Value::String(self.text.replace_all(s, replacement).into_owned()),
            Text::Bytes(b) => Value::Bytes(
                self.bytes
                    .replace_all(b, replacement.as_bytes())
                    .into_owned(),
            ),
        }
    }
}

fn pattern_param() -> ParamDef {
    ParamDef::string("pattern", "the regular expression").static_only()
}

pub fn register_methods(methods: &mut MethodSet) {
    register(
        methods,
        FunctionSpec::new("re_match", Category::Regex, "Checks whether a pattern matches anywhere in text.")
            .param(pattern_param())
            .example(Example::new(
                "Validate an identifier.",
                r#"root.valid = this.id.re_match("^[a-z]+-[0-9]+$")"#,
                &[
                    (r#"{"id":"order-42"}"#, r#"{"valid":true}"#),
                    (r#"{"id":"Order 42"}"#, r#"{"valid":false}"#),
                ],
            ))
            .example(Example::new(
                "Patterns are checked when the mapping is parsed.",
                r#"root.valid = this.id.re_match("(")"#,
                &[("{}", "Error(invalid regular expression)")],
            )
            .skip_testing()),
        method_ctor(|params| {
            let pattern = Pattern::from_params(params)?;
            Ok(method_body(move |value, _ctx| {
                Ok(Value::Bool(pattern.is_match(&text(&value)?)))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("re_find_all", Category::Regex, "Returns every non-overlapping match.")
            .param(pattern_param())
            .example(Example::new(
                "Extract numbers.",
                r#"root.numbers = this.s.re_find_all("[0-9]+")"#,
                &[(r#"{"s":"a1 b22 c333"}"#, r#"{"numbers":["1","22","333"]}"#)],
            )),
        method_ctor(|params| {
            let pattern = Pattern::from_params(params)?;
            Ok(method_body(move |value, _ctx| Ok(pattern.find_all(&text(&value)?))))
        }),
    );

    register(
        methods,
        FunctionSpec::new("re_replace_all", Category::Regex, "Replaces every match of a pattern.")
            .description("The replacement may refer to capture groups as `$1` or `${name}`.")
            .param(pattern_param())
            .param(ParamDef::string("value", "the replacement"))
            .example(Example::new(
                "Swap the parts of a key.",
                r#"root.key = this.key.re_replace_all("([a-z]+)-([0-9]+)", "${2}_$1")"#,
                &[(r#"{"key":"order-42"}"#, r#"{"key":"42_order"}"#)],
            )),
        method_ctor(|params| {
            let pattern = Pattern::from_params(params)?;
            let replacement = params.field_string("value")?;
            Ok(method_body(move |value, _ctx| {
                Ok(pattern.replace_all(&text(&value)?, &replacement))
            }))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_and_strings_match_alike() {
        let pattern = Pattern::compile("b+").unwrap();
        assert!(pattern.is_match(&Text::Str("abbc")));
        assert!(pattern.is_match(&Text::Bytes(b"abbc")));
        assert_eq!(
            pattern.replace_all(&Text::Bytes(b"abbc"), "_"),
            Value::Bytes(b"a_c".to_vec())
        );
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let err = Pattern::compile("(").err().unwrap();
        assert!(err.to_string().starts_with("invalid regular expression"));
    }
}
