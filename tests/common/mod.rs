//! Shared helpers for the integration tests.

#![allow(dead_code)]

use mapling::{Environment, MappingError, Value};

pub fn json(source: &str) -> Value {
    Value::from_json_str(source).expect("test input must be valid JSON")
}

/// Compiles `mapping` against the standard environment and maps `input`.
pub fn map(mapping: &str, input: &str) -> Result<Value, MappingError> {
    let mapping = Environment::standard().parse(mapping)?;
    mapping.query(&json(input))
}

/// Like [`map`], but the mapping must succeed. Returns compact JSON.
pub fn map_ok(mapping: &str, input: &str) -> String {
    match map(mapping, input) {
        Ok(value) => value.to_json_string(),
        Err(err) => panic!("mapping `{mapping}` failed: {err}"),
    }
}

/// Like [`map`], but the mapping must fail. Returns the rendered error.
pub fn map_err(mapping: &str, input: &str) -> String {
    match map(mapping, input) {
        Ok(value) => panic!("mapping `{mapping}` unexpectedly produced {value}"),
        Err(err) => err.to_string(),
    }
}
