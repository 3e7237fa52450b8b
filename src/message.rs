//! Access to the messages a mapping runs against.
//!
//! The pipeline hands the evaluator a [`MessageBatch`]: index based access to raw bytes,
//! the parsed document, metadata and an optional trace span. [`Part`] and [`Batch`] are
//! the in-crate implementations used by the executor, the CLI and tests.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;

use crate::errors::{MappingError, Result};
use crate::value::{Object, Value};

/// Tracing details attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSpan {
    pub trace_id: String,
    /// Propagation headers, e.g. `traceparent`.
    pub text_map: BTreeMap<String, String>,
}

impl TraceSpan {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            text_map: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.text_map.insert(key.into(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.text_map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect(),
        )
    }
}

pub trait MessageBatch: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn raw(&self, index: usize) -> Option<&[u8]>;

    /// The message parsed as a JSON document.
    fn structured(&self, index: usize) -> Result<Value>;

    fn meta(&self, index: usize, key: &str) -> Option<Value>;

    fn meta_all(&self, index: usize) -> Option<Object>;

    fn trace_span(&self, index: usize) -> Option<&TraceSpan>;
}

/// One message. Metadata is a persistent map, so cloning a part and then editing its
/// metadata copies only what changes.
#[derive(Debug, Clone, Default)]
pub struct Part {
    raw: Vec<u8>,
    metadata: Object,
    structured: OnceCell<Value>,
    span: Option<TraceSpan>,
}

impl Part {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: raw.into(),
            ..Self::default()
        }
    }

    /// A part whose raw bytes are the serialised `value`.
    pub fn from_value(value: Value) -> Self {
        let part = Self::new(value.to_bytes());
        let _ = part.structured.set(value);
        part
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_trace_span(mut self, span: TraceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn metadata(&self) -> &Object {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Object {
        &mut self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Object) {
        self.metadata = metadata;
    }

    /// Replaces the payload and forgets any cached parse.
    pub fn set_value(&mut self, value: Value) {
        self.raw = value.to_bytes();
        self.structured = OnceCell::new();
        let _ = self.structured.set(value);
    }

    pub fn structured(&self) -> Result<Value> {
        self.structured
            .get_or_try_init(|| Value::from_json_slice(&self.raw))
            .cloned()
            .map_err(|err| MappingError::general(format!("failed to parse message as JSON: {err}")))
    }

    pub fn trace_span(&self) -> Option<&TraceSpan> {
        self.span.as_ref()
    }
}

/// An ordered group of messages processed together.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    parts: Vec<Part>,
}

impl Batch {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

impl From<Part> for Batch {
    fn from(part: Part) -> Self {
        Self::new(vec![part])
    }
}

impl MessageBatch for Batch {
    fn len(&self) -> usize {
        self.parts.len()
    }

    fn raw(&self, index: usize) -> Option<&[u8]> {
        self.parts.get(index).map(Part::raw)
    }

    fn structured(&self, index: usize) -> Result<Value> {
        match self.parts.get(index) {
            Some(part) => part.structured(),
            None => Err(MappingError::general(format!(
                "message index {index} is out of bounds for a batch of {}",
                self.parts.len()
            ))),
        }
    }

    fn meta(&self, index: usize, key: &str) -> Option<Value> {
        self.parts.get(index)?.metadata.get(key).cloned()
    }

    fn meta_all(&self, index: usize) -> Option<Object> {
        self.parts.get(index).map(|part| part.metadata.clone())
    }

    fn trace_span(&self, index: usize) -> Option<&TraceSpan> {
        self.parts.get(index)?.span.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_parses_once_and_reports_errors() {
        let part = Part::new(r#"{"a":1}"#);
        assert_eq!(part.structured().unwrap().to_json_string(), r#"{"a":1}"#);
        let bad = Part::new("not json");
        assert!(bad.structured().is_err());
    }

    #[test]
    fn edited_metadata_does_not_leak_into_clones() {
        let original = Part::new("x").with_metadata("topic", "a");
        let mut copy = original.clone();
        copy.metadata_mut().insert("topic".into(), Value::from("b"));
        let batch = Batch::new(vec![original, copy]);
        assert_eq!(batch.meta(0, "topic"), Some(Value::from("a")));
        assert_eq!(batch.meta(1, "topic"), Some(Value::from("b")));
        assert_eq!(batch.meta(2, "topic"), None);
        assert!(batch.structured(5).is_err());
    }
}
