//! Dot-path traversal over nested values.
//!
//! Reads are soft: a missing key, an out of range index or a scalar in the middle of the
//! path all resolve to `None`, which callers surface as `null`.

use super::{Object, Value};

/// Resolves `path` inside `value`. Numeric segments index into arrays.
pub fn get_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get(segment.as_str())?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `new_value` at `path`, creating intermediate objects as needed. A scalar found
/// along the way is replaced by an object.
pub fn set_path(target: &mut Value, path: &[String], new_value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = new_value;
        return;
    };

    if let Value::Array(items) = target {
        if let Some(slot) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            set_path(slot, rest, new_value);
            return;
        }
    }

    if !matches!(target, Value::Object(_)) {
        *target = Value::Object(Object::new());
    }
    if let Value::Object(map) = target {
        if !map.contains_key(head.as_str()) {
            map.insert(head.clone(), Value::Null);
        }
        if let Some(slot) = map.get_mut(head.as_str()) {
            set_path(slot, rest, new_value);
        }
    }
}

/// Removes the value at `path`. Returns whether anything was removed.
pub fn delete_path(target: &mut Value, path: &[String]) -> bool {
    match path {
        [] => false,
        [last] => match target {
            Value::Object(map) => map.remove(last.as_str()).is_some(),
            Value::Array(items) => match last.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    items.remove(i);
                    true
                }
                _ => false,
            },
            _ => false,
        },
        [head, rest @ ..] => match child_mut(target, head) {
            Some(child) => delete_path(child, rest),
            None => false,
        },
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

/// Splits a dot separated path. Empty input yields an empty path.
pub fn parse_dot_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(path: &str) -> Vec<String> {
        parse_dot_path(path)
    }

    fn doc() -> Value {
        Value::from_json_str(r#"{"a":{"b":[10,{"c":"deep"}]},"s":"str"}"#).unwrap()
    }

    #[test]
    fn get_is_soft() {
        let v = doc();
        assert_eq!(get_path(&v, &p("a.b.1.c")), Some(&Value::from("deep")));
        assert_eq!(get_path(&v, &p("a.b.0")), Some(&Value::Int(10)));
        assert_eq!(get_path(&v, &p("a.missing.x")), None);
        assert_eq!(get_path(&v, &p("a.b.9")), None);
        assert_eq!(get_path(&v, &p("s.inner")), None);
        assert_eq!(get_path(&v, &[]), Some(&v));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut v = Value::Null;
        set_path(&mut v, &p("x.y.z"), Value::Int(1));
        assert_eq!(v.to_json_string(), r#"{"x":{"y":{"z":1}}}"#);

        let mut v = doc();
        set_path(&mut v, &p("a.b.0"), Value::Int(11));
        assert_eq!(get_path(&v, &p("a.b.0")), Some(&Value::Int(11)));

        set_path(&mut v, &p("s.inner"), Value::Bool(true));
        assert_eq!(get_path(&v, &p("s.inner")), Some(&Value::Bool(true)));
    }

    #[test]
    fn delete_removes_keys_and_indices() {
        let mut v = doc();
        assert!(delete_path(&mut v, &p("a.b.0")));
        assert_eq!(get_path(&v, &p("a.b.0.c")), Some(&Value::from("deep")));
        assert!(delete_path(&mut v, &p("s")));
        assert!(!delete_path(&mut v, &p("s")));
        assert!(!delete_path(&mut v, &p("nope.deeper")));
    }
}
