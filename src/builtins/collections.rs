//! # Collection Methods
//!
//! Higher-order methods take the place of loops. Their query arguments run once per
//! element with the element as `this`, or bound to a name when written as a lambda
//! (`item -> item.price * 2`), in which case `this` keeps referring to the outer context.
//!
//! ## Element Contexts
//!
//! - **Arrays**: the element itself
//! - **Objects**: `{"key": ..., "value": ...}` for each entry
//! - **`fold`**: `{"tally": ..., "value": ...}`
//! - **`sort`**: `{"left": ..., "right": ...}`, the query answers whether left sorts first

use std::cmp::Ordering;

use crate::builtins::helpers::{array, exec_with, key_value, object, predicate, register, simple_method};
use crate::errors::{MappingError, Result};
use crate::params::ParamDef;
use crate::registry::{method_ctor, Category, Example, FunctionSpec, MethodSet};
use crate::runtime::{method_body, Func, FunctionContext};
use crate::value::number::combine;
use crate::value::{delete_path, get_path, parse_dot_path, Array, Object, Value};

// ============================================================================
// HELPERS
// ============================================================================

fn pair(left_key: &str, left: &Value, right_key: &str, right: &Value) -> Value {
    let mut entry = Object::new();
    entry.insert(left_key.to_string(), left.clone());
    entry.insert(right_key.to_string(), right.clone());
    Value::Object(entry)
}

fn scoped_query(name: &str, description: &str) -> ParamDef {
    ParamDef::query(name, description).scoped()
}

/// Stable merge sort with a fallible `less` predicate. Inconsistent predicates produce
/// an unspecified order, never a panic.
fn sort_values<F>(mut items: Vec<Value>, less: &F) -> Result<Vec<Value>>
where
    F: Fn(&Value, &Value) -> Result<bool>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = sort_values(items, less)?;
    let right = sort_values(right, less)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => less(r, l)?,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        merged.extend(if take_right { right.next() } else { left.next() });
    }
    Ok(merged)
}

fn natural_less(a: &Value, b: &Value) -> Result<bool> {
    a.compare(b).map(|order| order == Ordering::Less).ok_or_else(|| {
        MappingError::general(format!(
            "cannot compare {} with {}",
            a.type_name(),
            b.type_name()
        ))
    })
}

/// Objects merge key by key. Colliding values that are not both objects are collected
/// into an array.
fn merge_values(destination: Value, source: Value) -> Value {
    match (destination, source) {
        (Value::Object(mut dst), Value::Object(src)) => {
            for (key, value) in src {
                let merged = match dst.remove(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => value,
                };
                dst.insert(key, merged);
            }
            Value::Object(dst)
        }
        (Value::Array(mut dst), Value::Array(src)) => {
            dst.append(src);
            Value::Array(dst)
        }
        (Value::Array(mut dst), other) => {
            dst.push_back(other);
            Value::Array(dst)
        }
        (existing, other) => Value::from(vec![existing, other]),
    }
}

fn map_array(items: &Array, query: &Func, ctx: &FunctionContext<'_>) -> Result<Value> {
    let mut out = Array::new();
    for item in items {
        match exec_with(query, ctx, item)? {
            Value::Delete => {}
            Value::Nothing => out.push_back(item.clone()),
            mapped => out.push_back(mapped),
        }
    }
    Ok(Value::Array(out))
}

fn map_object(map: &Object, query: &Func, ctx: &FunctionContext<'_>) -> Result<Value> {
    let mut out = Object::new();
    for (key, value) in map {
        match exec_with(query, ctx, &key_value(key, value))? {
            Value::Delete => {}
            Value::Nothing => {
                out.insert(key.clone(), value.clone());
            }
            mapped => {
                out.insert(key.clone(), mapped);
            }
        }
    }
    Ok(Value::Object(out))
}

// ============================================================================
// REGISTRATION
// ============================================================================

pub fn register_methods(methods: &mut MethodSet) {
    register_higher_order(methods);
    register_aggregates(methods);
    register_structural(methods);
}

fn register_higher_order(methods: &mut MethodSet) {
    register(
        methods,
        FunctionSpec::new("map_each", Category::Collections, "Applies a query to every element.")
            .description(
                "Elements mapped to `deleted()` are removed and elements mapped to `nothing()` are \
                 kept unchanged. On objects the query sees each entry as `{\"key\", \"value\"}` and \
                 its result replaces the value.",
            )
            .param(scoped_query("query", "the query applied to each element"))
            .example(Example::new(
                "Double every number.",
                "root.doubled = this.nums.map_each(n -> n * 2)",
                &[(r#"{"nums":[1,2,3]}"#, r#"{"doubled":[2,4,6]}"#)],
            ))
            .example(Example::new(
                "Drop elements while mapping.",
                "root.big = this.nums.map_each(n -> if n > 1 { n * 10 } else { deleted() })",
                &[(r#"{"nums":[1,2,3]}"#, r#"{"big":[20,30]}"#)],
            ))
            .example(Example::new(
                "Rewrite object values.",
                "root.prices = this.prices.map_each(entry -> entry.value * this.rate)",
                &[(
                    r#"{"rate":2,"prices":{"apple":1,"pear":3}}"#,
                    r#"{"prices":{"apple":2,"pear":6}}"#,
                )],
            )),
        method_ctor(|params| {
            let query = params.field_query("query")?;
            Ok(method_body(move |value, ctx| match &value {
                Value::Array(items) => map_array(items, &query, ctx),
                Value::Object(map) => map_object(map, &query, ctx),
                other => Err(MappingError::expected("array or object", other)),
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("filter", Category::Collections, "Keeps the elements a predicate accepts.")
            .description("On objects the predicate sees each entry as `{\"key\", \"value\"}`.")
            .param(scoped_query("test", "a query returning a boolean"))
            .example(Example::new(
                "Keep large numbers.",
                "root.big = this.nums.filter(n -> n > 2)",
                &[(r#"{"nums":[1,3,2,5]}"#, r#"{"big":[3,5]}"#)],
            ))
            .example(Example::new(
                "Drop null fields.",
                "root = this.filter(kv -> kv.value != null)",
                &[(r#"{"a":1,"b":null}"#, r#"{"a":1}"#)],
            )),
        method_ctor(|params| {
            let test = params.field_query("test")?;
            Ok(method_body(move |value, ctx| match &value {
                Value::Array(items) => {
                    let mut out = Array::new();
                    for item in items {
                        if predicate(&test, ctx, item)? {
                            out.push_back(item.clone());
                        }
                    }
                    Ok(Value::Array(out))
                }
                Value::Object(map) => {
                    let mut out = Object::new();
                    for (key, item) in map {
                        if predicate(&test, ctx, &key_value(key, item))? {
                            out.insert(key.clone(), item.clone());
                        }
                    }
                    Ok(Value::Object(out))
                }
                other => Err(MappingError::expected("array or object", other)),
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("any", Category::Collections, "Checks whether any element passes a test.")
            .param(scoped_query("test", "a query returning a boolean"))
            .example(Example::new(
                "Look for errors.",
                r#"root.failed = this.results.any(r -> r.status == "error")"#,
                &[(
                    r#"{"results":[{"status":"ok"},{"status":"error"}]}"#,
                    r#"{"failed":true}"#,
                )],
            )),
        method_ctor(|params| {
            let test = params.field_query("test")?;
            Ok(method_body(move |value, ctx| {
                for item in array(&value)? {
                    if predicate(&test, ctx, item)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("all", Category::Collections, "Checks whether every element passes a test.")
            .description("An empty array fails the check.")
            .param(scoped_query("test", "a query returning a boolean"))
            .example(Example::new(
                "Require positive numbers.",
                "root.ok = this.nums.all(n -> n > 0)",
                &[
                    (r#"{"nums":[1,2]}"#, r#"{"ok":true}"#),
                    (r#"{"nums":[1,-2]}"#, r#"{"ok":false}"#),
                    (r#"{"nums":[]}"#, r#"{"ok":false}"#),
                ],
            )),
        method_ctor(|params| {
            let test = params.field_query("test")?;
            Ok(method_body(move |value, ctx| {
                let items = array(&value)?;
                if items.is_empty() {
                    return Ok(Value::Bool(false));
                }
                for item in items {
                    if !predicate(&test, ctx, item)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("fold", Category::Collections, "Reduces an array to a single value.")
            .description(
                "The query runs once per element with `{\"tally\", \"value\"}` as its context and \
                 returns the next tally.",
            )
            .param(ParamDef::any("initial", "the starting tally"))
            .param(scoped_query("query", "computes the next tally"))
            .example(Example::new(
                "Sum numbers.",
                "root.total = this.nums.fold(0, acc -> acc.tally + acc.value)",
                &[(r#"{"nums":[3,8,11]}"#, r#"{"total":22}"#)],
            ))
            .example(Example::new(
                "Concatenate strings.",
                r#"root.text = this.words.fold("", tally + value)"#,
                &[(r#"{"words":["a","b","c"]}"#, r#"{"text":"abc"}"#)],
            )),
        method_ctor(|params| {
            let initial = params.field_value("initial")?;
            let query = params.field_query("query")?;
            Ok(method_body(move |value, ctx| {
                let mut tally = initial.clone();
                for item in array(&value)? {
                    tally = exec_with(&query, ctx, &pair("tally", &tally, "value", item))?;
                }
                Ok(tally)
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("sort", Category::Collections, "Sorts an array.")
            .description(
                "Without a query numbers and strings sort in ascending order. A query receives \
                 `{\"left\", \"right\"}` and returns whether `left` sorts before `right`. The sort \
                 is stable.",
            )
            .param(scoped_query("compare", "returns true when left sorts first").optional())
            .example(Example::new(
                "Natural order.",
                "root.sorted = this.nums.sort()",
                &[(r#"{"nums":[3,1,2]}"#, r#"{"sorted":[1,2,3]}"#)],
            ))
            .example(Example::new(
                "Descending order.",
                "root.sorted = this.nums.sort(p -> p.left > p.right)",
                &[(r#"{"nums":[3,1,2]}"#, r#"{"sorted":[3,2,1]}"#)],
            ))
            .example(Example::new(
                "Mixed types cannot be compared.",
                "root.sorted = this.mixed.sort()",
                &[(r#"{"mixed":[1,"a"]}"#, "Error(cannot compare)")],
            )),
        method_ctor(|params| {
            let compare = params.field_optional_query("compare")?;
            Ok(method_body(move |value, ctx| {
                let items: Vec<Value> = array(&value)?.iter().cloned().collect();
                let sorted = match &compare {
                    Some(query) => sort_values(items, &|a: &Value, b: &Value| {
                        predicate(query, ctx, &pair("left", a, "right", b))
                    })?,
                    None => sort_values(items, &natural_less)?,
                };
                Ok(Value::from(sorted))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("sort_by", Category::Collections, "Sorts an array by a key.")
            .description("The query extracts the key of each element. Keys must be mutually comparable.")
            .param(scoped_query("query", "extracts the sort key"))
            .example(Example::new(
                "Sort people by age.",
                "root.names = this.people.sort_by(p -> p.age).map_each(p -> p.name)",
                &[(
                    r#"{"people":[{"name":"b","age":30},{"name":"a","age":20}]}"#,
                    r#"{"names":["a","b"]}"#,
                )],
            )),
        method_ctor(|params| {
            let query = params.field_query("query")?;
            Ok(method_body(move |value, ctx| {
                let keyed = array(&value)?
                    .iter()
                    .map(|item| Ok(Value::from(vec![exec_with(&query, ctx, item)?, item.clone()])))
                    .collect::<Result<Vec<_>>>()?;
                let key = |entry: &Value| entry.as_array().and_then(|e| e.get(0)).cloned().unwrap_or_default();
                let sorted = sort_values(keyed, &|a: &Value, b: &Value| natural_less(&key(a), &key(b)))?;
                Ok(sorted
                    .into_iter()
                    .filter_map(|entry| entry.as_array().and_then(|e| e.get(1)).cloned())
                    .collect())
            }))
        }),
    );
}

fn register_aggregates(methods: &mut MethodSet) {
    simple_method(
        methods,
        FunctionSpec::new("sum", Category::Collections, "Adds up an array of numbers.")
            .example(Example::new(
                "Total a basket.",
                "root.total = this.prices.sum()",
                &[(r#"{"prices":[1,2,3.5]}"#, r#"{"total":6.5}"#)],
            )),
        |value| {
            let mut total = Value::Int(0);
            for item in array(&value)? {
                total = combine(&total, item, i64::checked_add, |a, b| a + b)
                    .ok_or_else(|| MappingError::expected("number", item))?;
            }
            Ok(total)
        },
    );

    register(
        methods,
        FunctionSpec::new("join", Category::Collections, "Joins an array of strings.")
            .param(ParamDef::string("delimiter", "inserted between elements").default(""))
            .example(Example::new(
                "Build a sentence.",
                r#"root.text = this.words.join(" ")"#,
                &[(r#"{"words":["hello","world"]}"#, r#"{"text":"hello world"}"#)],
            )),
        method_ctor(|params| {
            let delimiter = params.field_string("delimiter")?;
            Ok(method_body(move |value, _ctx| {
                let parts = array(&value)?
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.as_str()),
                        other => Err(MappingError::expected("string", other)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::String(parts.join(&delimiter)))
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("keys", Category::Collections, "Returns the keys of an object, sorted.")
            .example(Example::new(
                "List field names.",
                "root.keys = this.keys()",
                &[(r#"{"b":1,"a":2}"#, r#"{"keys":["a","b"]}"#)],
            )),
        |value| Ok(object(&value)?.keys().map(|k| Value::from(k.as_str())).collect()),
    );

    simple_method(
        methods,
        FunctionSpec::new("values", Category::Collections, "Returns the values of an object, ordered by key.")
            .example(Example::new(
                "List field values.",
                "root.values = this.values()",
                &[(r#"{"b":1,"a":2}"#, r#"{"values":[2,1]}"#)],
            )),
        |value| Ok(object(&value)?.values().cloned().collect()),
    );
}

fn register_structural(methods: &mut MethodSet) {
    register(
        methods,
        FunctionSpec::new("index", Category::Collections, "Returns the element at an index.")
            .description("Negative indices count back from the end. Out of range indices fail.")
            .param(ParamDef::int("index", "the position"))
            .example(Example::new(
                "First and last elements.",
                "root.first = this.a.index(0)\nroot.last = this.a.index(-1)",
                &[(r#"{"a":["x","y","z"]}"#, r#"{"first":"x","last":"z"}"#)],
            ))
            .example(Example::new(
                "Out of range.",
                "root.v = this.a.index(5)",
                &[(r#"{"a":[1]}"#, "Error(out of bounds)")],
            )),
        method_ctor(|params| {
            let index = params.field_int("index")?;
            Ok(method_body(move |value, _ctx| {
                let items = array(&value)?;
                let len = items.len() as i64;
                let resolved = if index < 0 { len + index } else { index };
                usize::try_from(resolved)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        MappingError::general(format!(
                            "index {index} is out of bounds for an array of length {len}"
                        ))
                    })
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("append", Category::Collections, "Adds elements to the end of an array.")
            .variadic()
            .example(Example::new(
                "Extend a list.",
                "root.a = this.a.append(3, this.extra)",
                &[(r#"{"a":[1,2],"extra":4}"#, r#"{"a":[1,2,3,4]}"#)],
            )),
        method_ctor(|params| {
            let extra = params.variadic();
            Ok(method_body(move |value, _ctx| {
                let mut items = array(&value)?.clone();
                items.extend(extra.iter().cloned());
                Ok(Value::Array(items))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("merge", Category::Collections, "Merges another value into the target.")
            .description(
                "Objects merge recursively and arrays concatenate. When both sides hold a \
                 non-object value under the same key, the result is an array of both.",
            )
            .param(ParamDef::any("with", "the value merged into the target"))
            .example(Example::new(
                "Combine two documents.",
                "root = this.a.merge(this.b)",
                &[(
                    r#"{"a":{"x":1,"tag":"a"},"b":{"y":2,"tag":"b"}}"#,
                    r#"{"tag":["a","b"],"x":1,"y":2}"#,
                )],
            )),
        method_ctor(|params| {
            let with = params.field_value("with")?;
            Ok(method_body(move |value, _ctx| Ok(merge_values(value, with.clone()))))
        }),
    );

    register(
        methods,
        FunctionSpec::new("without", Category::Collections, "Removes dot paths from an object.")
            .variadic()
            .example(Example::new(
                "Strip nested fields.",
                r#"root = this.without("user.password", "debug")"#,
                &[(
                    r#"{"user":{"name":"ada","password":"x"},"debug":true}"#,
                    r#"{"user":{"name":"ada"}}"#,
                )],
            )),
        method_ctor(|params| {
            let paths = params
                .variadic()
                .iter()
                .map(|path| match path {
                    Value::String(s) => Ok(parse_dot_path(s)),
                    other => Err(MappingError::expected("string", other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(method_body(move |value, _ctx| {
                object(&value)?;
                let mut out = value;
                for path in &paths {
                    delete_path(&mut out, path);
                }
                Ok(out)
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("exists", Category::Collections, "Checks whether a dot path is present.")
            .description("A present field holding `null` still exists.")
            .param(ParamDef::string("path", "the dot path to check"))
            .example(Example::new(
                "Check nested fields.",
                r#"root.a = this.exists("a.b")
root.c = this.exists("c")"#,
                &[(r#"{"a":{"b":null}}"#, r#"{"a":true,"c":false}"#)],
            )),
        method_ctor(|params| {
            let path = parse_dot_path(&params.field_string("path")?);
            Ok(method_body(move |value, _ctx| {
                Ok(Value::Bool(get_path(&value, &path).is_some()))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("get", Category::Collections, "Reads a dot path, returning `null` when absent.")
            .param(ParamDef::string("path", "the dot path to read"))
            .example(Example::new(
                "Read a computed path.",
                "root.v = this.doc.get(this.field)",
                &[(r#"{"doc":{"a":{"b":7}},"field":"a.b"}"#, r#"{"v":7}"#)],
            )),
        method_ctor(|params| {
            let path = parse_dot_path(&params.field_string("path")?);
            Ok(method_body(move |value, _ctx| {
                Ok(get_path(&value, &path).cloned().unwrap_or(Value::Null))
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("flatten", Category::Collections, "Flattens nested arrays by one level.")
            .example(Example::new(
                "Flatten pages of results.",
                "root.items = this.pages.flatten()",
                &[(r#"{"pages":[[1,2],[3],4]}"#, r#"{"items":[1,2,3,4]}"#)],
            )),
        |value| {
            let mut out = Array::new();
            for item in array(&value)? {
                match item {
                    Value::Array(inner) => out.extend(inner.iter().cloned()),
                    other => out.push_back(other.clone()),
                }
            }
            Ok(Value::Array(out))
        },
    );

    simple_method(
        methods,
        FunctionSpec::new("unique", Category::Collections, "Removes duplicate elements, keeping the first.")
            .example(Example::new(
                "Deduplicate tags.",
                "root.tags = this.tags.unique()",
                &[(r#"{"tags":["a","b","a",1,1.0]}"#, r#"{"tags":["a","b",1]}"#)],
            )),
        |value| {
            let mut out = Array::new();
            for item in array(&value)? {
                if !out.contains(item) {
                    out.push_back(item.clone());
                }
            }
            Ok(Value::Array(out))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn merge_sort_is_stable() {
        let items = vec![
            Value::from(vec![Value::Int(1), Value::from("a")]),
            Value::from(vec![Value::Int(0), Value::from("b")]),
            Value::from(vec![Value::Int(1), Value::from("c")]),
        ];
        let by_first = |a: &Value, b: &Value| {
            let key = |v: &Value| v.as_array().and_then(|e| e.get(0)).and_then(Value::as_i64);
            Ok::<bool, MappingError>(key(a) < key(b))
        };
        let sorted = sort_values(items, &by_first).unwrap();
        let tags: Vec<String> = sorted
            .iter()
            .filter_map(|v| v.as_array().and_then(|e| e.get(1)).map(|t| t.to_string()))
            .collect();
        assert_eq!(tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn natural_sort_rejects_mixed_types() {
        assert_eq!(sort_values(ints(&[3, 1, 2]), &natural_less).unwrap(), ints(&[1, 2, 3]));
        assert!(sort_values(vec![Value::Int(1), Value::from("a")], &natural_less).is_err());
    }

    #[test]
    fn merge_collects_collisions() {
        let a = Value::from_json_str(r#"{"x":{"y":1},"list":[1]}"#).unwrap();
        let b = Value::from_json_str(r#"{"x":{"y":2,"z":3},"list":[2]}"#).unwrap();
        assert_eq!(
            merge_values(a, b).to_json_string(),
            r#"{"list":[1,2],"x":{"y":[1,2],"z":3}}"#
        );
    }
}
