//! # Environment Built-ins
//!
//! Functions that read the process environment, the clock or generate identifiers. All of
//! them are impure and disappear from environments built with `only_pure`.

use chrono::Utc;
use uuid::Uuid;

use crate::builtins::helpers::{register, simple_function};
use crate::params::ParamDef;
use crate::registry::{function_ctor, Category, Example, FunctionSet, FunctionSpec};
use crate::runtime::ClosureFunction;
use crate::value::Value;

pub fn register_functions(functions: &mut FunctionSet) {
    register(
        functions,
        FunctionSpec::new("env", Category::Environment, "Reads an environment variable.")
            .description("Returns `null` when the variable is not set.")
            .param(ParamDef::string("name", "the variable name"))
            .impure()
            .example(Example::new(
                "Fall back when a variable is unset.",
                r#"root.region = env("MAPLING_EXAMPLE_UNSET") | "local""#,
                &[("{}", r#"{"region":"local"}"#)],
            )),
        function_ctor(|params| {
            let name = params.field_string("name")?;
            Ok(ClosureFunction::new("function `env`", move |_ctx| {
                Ok(std::env::var(&name).map(Value::from).unwrap_or(Value::Null))
            })
            .into_func())
        }),
    );

    simple_function(
        functions,
        FunctionSpec::new("now", Category::Environment, "The current time as an RFC 3339 string.")
            .impure()
            .example(Example::new(
                "Stamp a document.",
                "root.at = now()",
                &[("{}", r#"{"at":"2024-03-01T12:00:00.000000000+00:00"}"#)],
            )
            .skip_testing())
            .example(Example::new(
                "The result is a string.",
                "root.ok = now().type() == \"string\"",
                &[("{}", r#"{"ok":true}"#)],
            )),
        |_ctx| Ok(Value::from(Utc::now().to_rfc3339())),
    );

    simple_function(
        functions,
        FunctionSpec::new("timestamp_unix", Category::Environment, "The current Unix time in seconds.")
            .impure()
            .example(Example::new(
                "Seconds since the epoch.",
                "root.ok = timestamp_unix() > 1600000000",
                &[("{}", r#"{"ok":true}"#)],
            )),
        |_ctx| Ok(Value::Int(Utc::now().timestamp())),
    );

    simple_function(
        functions,
        FunctionSpec::new("uuid_v4", Category::Environment, "Generates a random version 4 UUID.")
            .impure()
            .example(Example::new(
                "Identifiers are 36 characters long.",
                "root.len = uuid_v4().length()",
                &[("{}", r#"{"len":36}"#)],
            )),
        |_ctx| Ok(Value::from(Uuid::new_v4().to_string())),
    );
}
