//! Runtime values for the mapping language.
//!
//! Every expression evaluates to a [`Value`]. The data variants mirror JSON with a few
//! additions (distinct signed/unsigned integers and raw bytes), and two sentinel variants
//! ([`Value::Delete`] and [`Value::Nothing`]) travel through the same slots to signal
//! structural mutation intent to whoever consumes the result.
//!
//! Arrays and objects use `im` persistent collections so that cloning a value shares
//! structure instead of copying it.

use std::cmp::Ordering;
use std::fmt;

use im::{OrdMap, Vector};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

pub mod number;
pub mod path;
pub mod text;

pub use number::{float_to_i64, float_to_value};
pub use path::{delete_path, get_path, parse_dot_path, set_path};
pub use text::Text;

/// Ordered sequence of values.
pub type Array = Vector<Value>;

/// String keyed mapping of values. Keys iterate in sorted order.
pub type Object = OrdMap<String, Value>;

/// Canonical runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Array),
    Object(Object),
    /// Remove the target field, metadata key or message.
    Delete,
    /// Leave the target unchanged.
    Nothing,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Delete, Value::Delete) => true,
            (Value::Nothing, Value::Nothing) => true,
            (a, b) if a.is_number() && b.is_number() => number::compare(a, b) == Some(Ordering::Equal),
            _ => false,
        }
    }
}

impl Value {
    /// Returns the user facing type name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Delete => "delete",
            Value::Nothing => "nothing",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Float(_))
    }

    /// True for the non-data markers `Delete` and `Nothing`.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Value::Delete | Value::Nothing)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a signed integer when that conversion is lossless.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Float(f) => float_to_i64(*f),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer when that conversion is lossless.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            Value::Float(f) => float_to_i64(*f).and_then(|i| u64::try_from(i).ok()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns a text view for strings and byte sequences.
    pub fn as_text(&self) -> Option<Text<'_>> {
        match self {
            Value::String(s) => Some(Text::Str(s)),
            Value::Bytes(b) => Some(Text::Bytes(b)),
            _ => None,
        }
    }

    /// Serialises the value into raw message bytes. Strings and bytes are written as-is,
    /// everything else as compact JSON.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            other => other.to_json_string().into_bytes(),
        }
    }

    /// Total ordering used by sorting methods. Only numbers with numbers and strings with
    /// strings are comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => number::compare(a, b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Short single line rendering used inside error messages.
    pub fn preview(&self) -> String {
        let rendered = match self {
            Value::String(s) => format!("{s:?}"),
            other => other.to_string(),
        };
        if rendered.chars().count() > 64 {
            let cut: String = rendered.chars().take(61).collect();
            format!("{cut}...")
        } else {
            rendered
        }
    }

    // ------------------------------------------------------------------------
    // JSON conversion
    // ------------------------------------------------------------------------

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn from_json_str(source: &str) -> serde_json::Result<Value> {
        serde_json::from_str::<serde_json::Value>(source).map(Value::from_json)
    }

    pub fn from_json_slice(source: &[u8]) -> serde_json::Result<Value> {
        serde_json::from_slice::<serde_json::Value>(source).map(Value::from_json)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Delete | Value::Nothing => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::UInt(u) => serde_json::Value::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_else(|_| self.to_json_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            other => f.write_str(&other.to_json_string()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Delete | Value::Nothing => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Array(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::UInt(7), Value::Int(7));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_ne!(Value::Int(1), Value::Bool(true));
    }

    #[test]
    fn json_round_trip_keeps_integer_kinds() {
        let v = Value::from_json_str(r#"{"a":1,"b":18446744073709551615,"c":1.5}"#).unwrap();
        let map = v.as_object().unwrap();
        assert!(matches!(map.get("a"), Some(Value::Int(1))));
        assert!(matches!(map.get("b"), Some(Value::UInt(u64::MAX))));
        assert!(matches!(map.get("c"), Some(Value::Float(_))));
        assert_eq!(v.to_json_string(), r#"{"a":1,"b":18446744073709551615,"c":1.5}"#);
    }

    #[test]
    fn display_renders_strings_raw() {
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::from(vec![Value::from("hi")]).to_string(), r#"["hi"]"#);
        assert_eq!(Value::Delete.to_string(), "null");
    }

    #[test]
    fn preview_truncates_long_values() {
        let long = Value::String("x".repeat(200));
        assert!(long.preview().ends_with("..."));
        assert!(long.preview().chars().count() <= 64);
    }
}
