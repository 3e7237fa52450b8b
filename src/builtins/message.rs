//! # Message Built-ins
//!
//! Functions reading the message being mapped through the batch accessor: its raw
//! content, the parsed document, original and working metadata, its position in the batch
//! and its trace span.
//!
//! Without a batch (a bare [`Mapping::query`](crate::Mapping::query)) the message is
//! treated as a batch of one with no content, metadata or span.

use crate::builtins::helpers::{register, simple_function};
use crate::errors::{MappingError, Result};
use crate::params::ParamDef;
use crate::registry::{function_ctor, Category, Example, FunctionSet, FunctionSpec};
use crate::runtime::{ClosureFunction, FunctionContext, TargetKind, TargetPath};
use crate::value::{get_path, parse_dot_path, Value};

fn no_message() -> MappingError {
    MappingError::general("no message is available in this context")
}

fn structured(ctx: &FunctionContext<'_>) -> Result<Value> {
    let batch = ctx.batch.ok_or_else(no_message)?;
    batch.structured(ctx.index)
}

pub fn register_functions(functions: &mut FunctionSet) {
    simple_function(
        functions,
        FunctionSpec::new("content", Category::Message, "Returns the raw bytes of the message.")
            .example(Example::new(
                "Keep the original payload as a string.",
                "root.original = content().string()",
                &[(r#"{"a":1}"#, r#"{"original":"{\"a\":1}"}"#)],
            )),
        |ctx| {
            let batch = ctx.batch.ok_or_else(no_message)?;
            batch
                .raw(ctx.index)
                .map(|raw| Value::Bytes(raw.to_vec()))
                .ok_or_else(no_message)
        },
    );

    register(
        functions,
        FunctionSpec::new("json", Category::Message, "Reads the message parsed as JSON.")
            .description(
                "Reads the original message rather than the current context, so it is unaffected \
                 by narrowing inside methods. A dot path selects a nested field.",
            )
            .param(ParamDef::string("path", "dot path of the field to read").default(""))
            .example(Example::new(
                "Read a field of the original message.",
                r#"root.names = this.items.map_each(item -> item.name + json("suffix"))"#,
                &[(
                    r#"{"suffix":"!","items":[{"name":"a"},{"name":"b"}]}"#,
                    r#"{"names":["a!","b!"]}"#,
                )],
            )),
        function_ctor(|params| {
            let path = parse_dot_path(&params.field_string("path")?);
            let targets = vec![TargetPath::new(TargetKind::Value, path.clone())];
            Ok(ClosureFunction::new("function `json`", move |ctx| {
                let doc = structured(ctx)?;
                Ok(get_path(&doc, &path).cloned().unwrap_or(Value::Null))
            })
            .with_targets(targets)
            .into_func())
        }),
    );

    register(
        functions,
        FunctionSpec::new("meta", Category::Message, "Reads metadata of the original message.")
            .description(
                "Changes made by earlier `meta` assignments are not visible here, use `metadata` \
                 or `@` for those. Without a key every key is returned as an object.",
            )
            .param(ParamDef::string("key", "the metadata key").optional())
            .example(Example::new(
                "Default a missing key.",
                r#"root.topic = meta("topic") | "unknown""#,
                &[("{}", r#"{"topic":"unknown"}"#)],
            )),
        function_ctor(|params| {
            let key = params.field_optional_string("key")?;
            let targets = vec![TargetPath::new(TargetKind::Metadata, key.iter().cloned().collect())];
            Ok(ClosureFunction::new("function `meta`", move |ctx| {
                let Some(batch) = ctx.batch else {
                    return Ok(Value::Null);
                };
                Ok(match &key {
                    Some(key) => batch.meta(ctx.index, key).unwrap_or(Value::Null),
                    None => batch
                        .meta_all(ctx.index)
                        .map(Value::Object)
                        .unwrap_or(Value::Null),
                })
            })
            .with_targets(targets)
            .into_func())
        }),
    );

    register(
        functions,
        FunctionSpec::new("metadata", Category::Message, "Reads the working metadata.")
            .description("Sees earlier `meta` assignments. Equivalent to `@key`, or `@` without a key.")
            .param(ParamDef::string("key", "the metadata key").optional())
            .example(Example::new(
                "Read back an assigned key.",
                "meta kind = \"user\"\nroot.kind = metadata(\"kind\")\nroot.all = metadata()",
                &[("{}", r#"{"kind":"user","all":{"kind":"user"}}"#)],
            )),
        function_ctor(|params| {
            let key = params.field_optional_string("key")?;
            let targets = vec![TargetPath::new(TargetKind::Metadata, key.iter().cloned().collect())];
            Ok(ClosureFunction::new("function `metadata`", move |ctx| {
                Ok(match &key {
                    Some(key) => ctx.metadata.get(key).cloned().unwrap_or(Value::Null),
                    None => Value::Object(ctx.metadata.clone()),
                })
            })
            .with_targets(targets)
            .into_func())
        }),
    );

    simple_function(
        functions,
        FunctionSpec::new("batch_index", Category::Message, "Position of the message in its batch.")
            .example(Example::new(
                "Tag messages with their position.",
                "root = this\nroot.position = batch_index()",
                &[(r#"{"a":1}"#, r#"{"a":1,"position":0}"#)],
            )),
        |ctx| Ok(Value::from(ctx.index as u64)),
    );

    simple_function(
        functions,
        FunctionSpec::new("batch_size", Category::Message, "Number of messages in the batch.")
            .example(Example::new(
                "Record the batch size.",
                "root.size = batch_size()",
                &[("{}", r#"{"size":1}"#)],
            )),
        |ctx| Ok(Value::from(ctx.batch.map_or(1, |batch| batch.len()) as u64)),
    );

    simple_function(
        functions,
        FunctionSpec::new("tracing_id", Category::Message, "The trace id of the message, or `null`.")
            .example(Example::new(
                "Untraced messages have no id.",
                "root.trace = tracing_id()",
                &[("{}", r#"{"trace":null}"#)],
            )),
        |ctx| {
            Ok(ctx
                .batch
                .and_then(|batch| batch.trace_span(ctx.index))
                .map(|span| Value::from(span.trace_id.as_str()))
                .unwrap_or(Value::Null))
        },
    );

    simple_function(
        functions,
        FunctionSpec::new(
            "tracing_span",
            Category::Message,
            "The propagation headers of the message trace span as an object, or `null`.",
        )
        .example(Example::new(
            "Untraced messages have no span.",
            "root.span = tracing_span()",
            &[("{}", r#"{"span":null}"#)],
        )),
        |ctx| {
            Ok(ctx
                .batch
                .and_then(|batch| batch.trace_span(ctx.index))
                .map(|span| span.to_value())
                .unwrap_or(Value::Null))
        },
    );
}

#[cfg(test)]
mod tests {
    use crate::message::{Batch, Part, TraceSpan};
    use crate::value::Value;
    use crate::Environment;

    #[test]
    fn trace_spans_are_exposed() {
        let env = Environment::standard();
        let mapping = env
            .parse("root.id = tracing_id()\nroot.span = tracing_span()\nroot.index = batch_index()")
            .unwrap();
        let part = Part::new("{}").with_trace_span(TraceSpan::new("abc").with_entry("traceparent", "00-1"));
        let batch = Batch::new(vec![Part::new("{}"), part]);
        let mapped = mapping.map_part(&batch, 1).unwrap().unwrap();
        assert_eq!(
            mapped.structured().unwrap(),
            Value::from_json_str(r#"{"id":"abc","span":{"traceparent":"00-1"},"index":1}"#).unwrap()
        );
    }

    #[test]
    fn meta_reads_the_original_metadata() {
        let env = Environment::standard();
        let mapping = env
            .parse("meta topic = \"changed\"\nroot.before = meta(\"topic\")\nroot.after = @topic")
            .unwrap();
        let batch = Batch::from(Part::new("{}").with_metadata("topic", "orders"));
        let mapped = mapping.map_part(&batch, 0).unwrap().unwrap();
        assert_eq!(
            mapped.structured().unwrap().to_json_string(),
            r#"{"after":"changed","before":"orders"}"#
        );
        assert_eq!(mapped.metadata().get("topic"), Some(&Value::from("changed")));
    }
}
