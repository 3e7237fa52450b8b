//! # String Methods
//!
//! Methods over text. Each one accepts both strings and byte sequences through the
//! [`Text`] view and returns a result of the same family, so `"abc".uppercase()` is a
//! string and `content().uppercase()` stays bytes. Methods that also make sense for
//! arrays (`length`, `contains`, `reverse`, `slice`) accept those too.

use crate::builtins::helpers::{register, simple_method, text};
use crate::errors::{MappingError, Result};
use crate::params::ParamDef;
use crate::registry::{method_ctor, Category, Example, FunctionSpec, MethodSet};
use crate::runtime::method_body;
use crate::value::text::resolve_bounds;
use crate::value::{Text, Value};

fn text_method(methods: &mut MethodSet, spec: FunctionSpec, op: fn(&Text<'_>) -> Value) {
    simple_method(methods, spec, move |value| Ok(op(&text(&value)?)));
}

/// The needle of a text search: strings and bytes as they are, anything else rendered.
fn needle(value: &Value) -> Vec<u8> {
    match value.as_text() {
        Some(t) => t.as_bytes().to_vec(),
        None => value.to_string().into_bytes(),
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Expands `%v`, `%s`, `%d` and `%%` in `template` with `args`, in order.
fn format_template(template: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut consumed = 0;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars
            .next()
            .ok_or_else(|| MappingError::general("format string ends with a lone `%`"))?;
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = args.next().ok_or_else(|| {
            MappingError::general(format!("format string needs more than {consumed} arguments"))
        })?;
        consumed += 1;
        match verb {
            'v' | 's' => out.push_str(&arg.to_string()),
            'd' => {
                let i = arg.as_i64().ok_or_else(|| MappingError::expected("integer", arg))?;
                out.push_str(&i.to_string());
            }
            other => {
                return Err(MappingError::general(format!("unsupported format verb `%{other}`")))
            }
        }
    }
    let surplus = args.count();
    if surplus > 0 {
        return Err(MappingError::general(format!(
            "format string uses {consumed} arguments but {} were given",
            consumed + surplus
        )));
    }
    Ok(out)
}

pub fn register_methods(methods: &mut MethodSet) {
    // ===== CASE AND WHITESPACE =====

    text_method(
        methods,
        FunctionSpec::new("uppercase", Category::Strings, "Converts text to upper case.").example(
            Example::new(
                "Shout.",
                "root.a = this.a.uppercase()",
                &[(r#"{"a":"hello world"}"#, r#"{"a":"HELLO WORLD"}"#)],
            ),
        ),
        |t| t.to_upper(),
    );

    text_method(
        methods,
        FunctionSpec::new("lowercase", Category::Strings, "Converts text to lower case.").example(
            Example::new(
                "Normalise an address.",
                "root.email = this.email.lowercase()",
                &[(r#"{"email":"Ada@Example.COM"}"#, r#"{"email":"ada@example.com"}"#)],
            ),
        ),
        |t| t.to_lower(),
    );

    text_method(
        methods,
        FunctionSpec::new("trim", Category::Strings, "Removes leading and trailing whitespace.")
            .example(Example::new(
                "Clean up input.",
                "root.name = this.name.trim()",
                &[(r#"{"name":"  ada \n"}"#, r#"{"name":"ada"}"#)],
            )),
        |t| t.trim(),
    );

    text_method(
        methods,
        FunctionSpec::new("capitalize", Category::Strings, "Upper-cases the first character.")
            .example(Example::new(
                "Capitalise a title.",
                "root.title = this.title.capitalize()",
                &[(r#"{"title":"émile zola"}"#, r#"{"title":"Émile zola"}"#)],
            )),
        |t| t.capitalize(),
    );

    // ===== INSPECTION =====

    simple_method(
        methods,
        FunctionSpec::new("length", Category::Strings, "Length of text, an array or an object.")
            .description(
                "Strings count characters, bytes count bytes, arrays count elements and objects \
                 count keys.",
            )
            .example(Example::new(
                "Measure values.",
                "root.s = this.s.length()\nroot.a = this.a.length()\nroot.o = this.o.length()",
                &[(r#"{"s":"héllo","a":[1,2],"o":{"x":1}}"#, r#"{"s":5,"a":2,"o":1}"#)],
            )),
        |value| {
            let len = match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => text(other)?.len(),
            };
            Ok(Value::Int(len as i64))
        },
    );

    register(
        methods,
        FunctionSpec::new("contains", Category::Strings, "Checks for a substring or an array element.")
            .param(ParamDef::any("value", "the substring or element to look for"))
            .example(Example::new(
                "Search text and arrays.",
                r#"root.text = this.text.contains("wor")
root.tags = this.tags.contains("b")"#,
                &[(r#"{"text":"hello world","tags":["a","b"]}"#, r#"{"text":true,"tags":true}"#)],
            )),
        method_ctor(|params| {
            let wanted = params.field_value("value")?;
            Ok(method_body(move |value, _ctx| match &value {
                Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| item == &wanted))),
                other => Ok(Value::Bool(text(other)?.contains(&needle(&wanted)))),
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("has_prefix", Category::Strings, "Checks whether text starts with a prefix.")
            .param(ParamDef::string("prefix", "the expected start"))
            .example(Example::new(
                "Detect a scheme.",
                r#"root.secure = this.url.has_prefix("https://")"#,
                &[(r#"{"url":"https://example.com"}"#, r#"{"secure":true}"#)],
            )),
        method_ctor(|params| {
            let prefix = params.field_string("prefix")?;
            Ok(method_body(move |value, _ctx| {
                Ok(Value::Bool(text(&value)?.has_prefix(prefix.as_bytes())))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("has_suffix", Category::Strings, "Checks whether text ends with a suffix.")
            .param(ParamDef::string("suffix", "the expected end"))
            .example(Example::new(
                "Detect a file type.",
                r#"root.json = this.file.has_suffix(".json")"#,
                &[(r#"{"file":"doc.yaml"}"#, r#"{"json":false}"#)],
            )),
        method_ctor(|params| {
            let suffix = params.field_string("suffix")?;
            Ok(method_body(move |value, _ctx| {
                Ok(Value::Bool(text(&value)?.has_suffix(suffix.as_bytes())))
            }))
        }),
    );

    // ===== TRANSFORMATION =====

    register(
        methods,
        FunctionSpec::new("replace_all", Category::Strings, "Replaces every occurrence of a substring.")
            .param(ParamDef::string("old", "the text to replace"))
            .param(ParamDef::string("new", "the replacement"))
            .example(Example::new(
                "Swap separators.",
                r#"root.path = this.path.replace_all("/", ".")"#,
                &[(r#"{"path":"a/b/c"}"#, r#"{"path":"a.b.c"}"#)],
            )),
        method_ctor(|params| {
            let old = params.field_string("old")?;
            let new = params.field_string("new")?;
            Ok(method_body(move |value, _ctx| {
                Ok(text(&value)?.replace_all(old.as_bytes(), new.as_bytes()))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("split", Category::Strings, "Splits text on a delimiter.")
            .description("An empty delimiter splits into single characters.")
            .param(ParamDef::string("delimiter", "the separator"))
            .example(Example::new(
                "Split a CSV line.",
                r#"root.fields = this.line.split(",")"#,
                &[(r#"{"line":"a,b,,c"}"#, r#"{"fields":["a","b","","c"]}"#)],
            )),
        method_ctor(|params| {
            let delimiter = params.field_string("delimiter")?;
            Ok(method_body(move |value, _ctx| {
                Ok(text(&value)?.split(delimiter.as_bytes()))
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("reverse", Category::Strings, "Reverses text or an array.")
            .example(Example::new(
                "Reverse both kinds.",
                "root.s = this.s.reverse()\nroot.a = this.a.reverse()",
                &[(r#"{"s":"abc","a":[1,2,3]}"#, r#"{"s":"cba","a":[3,2,1]}"#)],
            )),
        |value| match value {
            Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
            other => Ok(text(&other)?.reverse()),
        },
    );

    register(
        methods,
        FunctionSpec::new("slice", Category::Strings, "Extracts a range of text or an array.")
            .description(
                "Takes the elements from `low` up to, but not including, `high`. Negative bounds \
                 count back from the end and a missing `high` means the end.",
            )
            .param(ParamDef::int("low", "the first index"))
            .param(ParamDef::int("high", "the exclusive end index").optional())
            .example(Example::new(
                "Take prefixes and suffixes.",
                "root.head = this.s.slice(0, 3)\nroot.tail = this.s.slice(-2)\nroot.items = this.a.slice(1)",
                &[(
                    r#"{"s":"foobar","a":[1,2,3]}"#,
                    r#"{"head":"foo","tail":"ar","items":[2,3]}"#,
                )],
            ))
            .example(Example::new(
                "Bounds must be ordered.",
                "root.s = this.s.slice(4, 2)",
                &[(r#"{"s":"foobar"}"#, "Error(lower slice bound 4)")],
            )),
        method_ctor(|params| {
            let low = params.field_int("low")?;
            let high = params.field_optional_int("high")?;
            Ok(method_body(move |value, _ctx| match &value {
                Value::Array(items) => {
                    let (start, end) = resolve_bounds(items.len(), low, high).map_err(MappingError::general)?;
                    Ok(Value::Array(items.iter().skip(start).take(end - start).cloned().collect()))
                }
                other => text(other)?.slice(low, high).map_err(MappingError::general),
            }))
        }),
    );

    // ===== CONVERSION =====

    simple_method(
        methods,
        FunctionSpec::new("string", Category::Coercion, "Converts a value into a string.")
            .description("Bytes are decoded as UTF-8, other non-string values are serialised as JSON.")
            .example(Example::new(
                "Stringify anything.",
                "root.n = this.n.string()\nroot.o = this.o.string()",
                &[(r#"{"n":5,"o":{"a":[1]}}"#, r#"{"n":"5","o":"{\"a\":[1]}"}"#)],
            )),
        |value| match value {
            Value::String(_) => Ok(value),
            other => Ok(Value::String(other.to_string())),
        },
    );

    simple_method(
        methods,
        FunctionSpec::new("bytes", Category::Coercion, "Converts a value into bytes.")
            .description("Strings are encoded as UTF-8, other values are serialised as JSON.")
            .example(Example::new(
                "Byte length differs from character length.",
                "root.len = this.s.bytes().length()",
                &[(r#"{"s":"héllo"}"#, r#"{"len":6}"#)],
            )),
        |value| match value {
            Value::Bytes(_) => Ok(value),
            other => Ok(Value::Bytes(other.to_bytes())),
        },
    );

    register(
        methods,
        FunctionSpec::new("format", Category::Strings, "Interpolates arguments into a template.")
            .description(
                "The target is the template. `%v` and `%s` insert any value, `%d` inserts an \
                 integer and `%%` is a literal percent sign. The number of arguments must match \
                 the template.",
            )
            .variadic()
            .example(Example::new(
                "Build a sentence.",
                r#"root.msg = "%s is %d years old (%v%%)".format(this.name, this.age, 100)"#,
                &[(r#"{"name":"Ada","age":36}"#, r#"{"msg":"Ada is 36 years old (100%)"}"#)],
            ))
            .example(Example::new(
                "Missing arguments fail.",
                r#"root.msg = "%s and %s".format("one")"#,
                &[("{}", "Error(format string needs more than 1 arguments)")],
            )),
        method_ctor(|params| {
            let args = params.variadic();
            Ok(method_body(move |value, _ctx| {
                let template = text(&value)?.to_string_lossy();
                format_template(&template, &args).map(Value::String)
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("quote", Category::Strings, "Quotes and escapes text as a JSON string.")
            .example(Example::new(
                "Embed text in a literal.",
                "root.q = this.s.quote()",
                &[(r#"{"s":"say \"hi\""}"#, r#"{"q":"\"say \\\"hi\\\"\""}"#)],
            )),
        |value| {
            let raw = text(&value)?.to_string_lossy();
            serde_json::to_string(&raw)
                .map(Value::String)
                .map_err(MappingError::general)
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_consume_arguments_in_order() {
        let args = vec![Value::from("x"), Value::Int(3)];
        assert_eq!(format_template("%s=%d", &args).unwrap(), "x=3");
        assert_eq!(format_template("100%%", &[]).unwrap(), "100%");
    }

    #[test]
    fn argument_counts_must_match() {
        assert!(format_template("%s", &[]).is_err());
        assert!(format_template("plain", &[Value::Int(1)]).is_err());
        assert!(format_template("%d", &[Value::from("x")]).is_err());
        assert!(format_template("%q", &[Value::Int(1)]).is_err());
        assert!(format_template("50%", &[]).is_err());
    }
}
