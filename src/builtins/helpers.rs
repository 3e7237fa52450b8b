//! # Built-in Helper Infrastructure
//!
//! Registration shortcuts for the common shapes of built-ins, plus the argument checks
//! most of them share.

use std::sync::Arc;

use crate::errors::{MappingError, Result};
use crate::registry::{function_ctor, method_ctor, FunctionSet, FunctionSpec, MethodSet, Registry};
use crate::runtime::{exec_child, method_body, ClosureFunction, Func, FunctionContext};
use crate::value::{Array, Object, Text, Value};

// ============================================================================
// REGISTRATION
// ============================================================================

/// Adds a built-in. The standard library registers fixed, distinct names, so a failure
/// here is logged rather than propagated.
pub fn register<C: Clone>(set: &mut Registry<C>, spec: FunctionSpec, ctor: C) {
    let name = spec.name.clone();
    if let Err(err) = set.add(spec, ctor) {
        log::error!("failed to register built-in `{name}`: {err}");
    }
}

/// Registers a function without parameters.
pub fn simple_function<F>(set: &mut FunctionSet, spec: FunctionSpec, body: F)
where
    F: Fn(&FunctionContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    let annotation = format!("function `{}`", spec.name);
    let body = Arc::new(body);
    let ctor = function_ctor(move |_params| {
        let body = body.clone();
        Ok(ClosureFunction::new(annotation.clone(), move |ctx| body(ctx)).into_func())
    });
    register(set, spec, ctor);
}

/// Registers a method without parameters that only looks at its target value.
pub fn simple_method<F>(set: &mut MethodSet, spec: FunctionSpec, body: F)
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let ctor = method_ctor(move |_params| {
        let body = body.clone();
        Ok(method_body(move |value, _ctx| body(value)))
    });
    register(set, spec, ctor);
}

// ============================================================================
// ARGUMENT CHECKS
// ============================================================================

pub fn text(value: &Value) -> Result<Text<'_>> {
    value
        .as_text()
        .ok_or_else(|| MappingError::expected("string", value))
}

pub fn array(value: &Value) -> Result<&Array> {
    value
        .as_array()
        .ok_or_else(|| MappingError::expected("array", value))
}

pub fn object(value: &Value) -> Result<&Object> {
    value
        .as_object()
        .ok_or_else(|| MappingError::expected("object", value))
}

// ============================================================================
// QUERY ARGUMENTS
// ============================================================================

/// Runs `query` with `value` as `this`.
pub fn exec_with(query: &Func, ctx: &FunctionContext<'_>, value: &Value) -> Result<Value> {
    exec_child(query.as_ref(), &ctx.with_value(value))
}

/// Runs a predicate query against `value`. Anything but a boolean is an error.
pub fn predicate(query: &Func, ctx: &FunctionContext<'_>, value: &Value) -> Result<bool> {
    match exec_with(query, ctx, value)? {
        Value::Bool(b) => Ok(b),
        other => Err(MappingError::expected("bool", &other).annotate(query.annotation())),
    }
}

/// The `{"key": ..., "value": ...}` context object methods use for object entries.
pub fn key_value(key: &str, value: &Value) -> Value {
    let mut entry = Object::new();
    entry.insert("key".to_string(), Value::from(key));
    entry.insert("value".to_string(), value.clone());
    Value::Object(entry)
}
