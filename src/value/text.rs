//! A uniform view over the two text-like value families.
//!
//! String methods work on both `string` and `bytes` values. Instead of switching on the
//! runtime type inside every method, [`Text`] exposes each operation once and spells out
//! both branches, producing a result of the same family as its input.

use unicode_segmentation::UnicodeSegmentation;

use super::Value;

#[derive(Debug, Clone, Copy)]
pub enum Text<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> Text<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Text::Str(s) => s.as_bytes(),
            Text::Bytes(b) => b,
        }
    }

    /// Length in characters for strings and in bytes for byte sequences.
    pub fn len(&self) -> usize {
        match self {
            Text::Str(s) => s.chars().count(),
            Text::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn contains(&self, needle: &[u8]) -> bool {
        match self {
            Text::Str(s) => s.contains(String::from_utf8_lossy(needle).as_ref()),
            Text::Bytes(b) => find_bytes(b, needle).is_some(),
        }
    }

    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        match self {
            Text::Str(s) => s.starts_with(String::from_utf8_lossy(prefix).as_ref()),
            Text::Bytes(b) => b.starts_with(prefix),
        }
    }

    pub fn has_suffix(&self, suffix: &[u8]) -> bool {
        match self {
            Text::Str(s) => s.ends_with(String::from_utf8_lossy(suffix).as_ref()),
            Text::Bytes(b) => b.ends_with(suffix),
        }
    }

    pub fn to_upper(&self) -> Value {
        match self {
            Text::Str(s) => Value::String(s.to_uppercase()),
            Text::Bytes(b) => Value::Bytes(b.to_ascii_uppercase()),
        }
    }

    pub fn to_lower(&self) -> Value {
        match self {
            Text::Str(s) => Value::String(s.to_lowercase()),
            Text::Bytes(b) => Value::Bytes(b.to_ascii_lowercase()),
        }
    }

    pub fn trim(&self) -> Value {
        match self {
            Text::Str(s) => Value::String(s.trim().to_string()),
            Text::Bytes(b) => {
                let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
                let end = b
                    .iter()
                    .rposition(|c| !c.is_ascii_whitespace())
                    .map_or(start, |i| i + 1);
                Value::Bytes(b[start..end].to_vec())
            }
        }
    }

    /// Upper-cases the first character.
    pub fn capitalize(&self) -> Value {
        match self {
            Text::Str(s) => {
                let mut chars = s.chars();
                let out = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                };
                Value::String(out)
            }
            Text::Bytes(b) => {
                let mut out = b.to_vec();
                if let Some(first) = out.first_mut() {
                    first.make_ascii_uppercase();
                }
                Value::Bytes(out)
            }
        }
    }

    pub fn replace_all(&self, from: &[u8], to: &[u8]) -> Value {
        match self {
            Text::Str(s) => Value::String(s.replace(
                String::from_utf8_lossy(from).as_ref(),
                String::from_utf8_lossy(to).as_ref(),
            )),
            Text::Bytes(b) => Value::Bytes(replace_bytes(b, from, to)),
        }
    }

    /// Splits on `delim`, producing an array of the same family.
    pub fn split(&self, delim: &[u8]) -> Value {
        match self {
            Text::Str(s) => {
                let delim = String::from_utf8_lossy(delim);
                if delim.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(delim.as_ref()).map(Value::from).collect()
                }
            }
            Text::Bytes(b) => split_bytes(b, delim)
                .into_iter()
                .map(|part| Value::Bytes(part.to_vec()))
                .collect(),
        }
    }

    /// Reverses graphemes for strings and bytes for byte sequences.
    pub fn reverse(&self) -> Value {
        match self {
            Text::Str(s) => Value::String(s.graphemes(true).rev().collect()),
            Text::Bytes(b) => Value::Bytes(b.iter().rev().copied().collect()),
        }
    }

    /// Extracts `[low, high)`. Negative bounds count back from the end. Strings are indexed
    /// by character, bytes by byte.
    pub fn slice(&self, low: i64, high: Option<i64>) -> Result<Value, String> {
        let len = self.len();
        let (start, end) = resolve_bounds(len, low, high)?;
        Ok(match self {
            Text::Str(s) => Value::String(s.chars().skip(start).take(end - start).collect()),
            Text::Bytes(b) => Value::Bytes(b[start..end].to_vec()),
        })
    }

    pub fn to_owned_value(&self) -> Value {
        match self {
            Text::Str(s) => Value::String(s.to_string()),
            Text::Bytes(b) => Value::Bytes(b.to_vec()),
        }
    }

    /// Lossy UTF-8 rendering.
    pub fn to_string_lossy(&self) -> String {
        match self {
            Text::Str(s) => s.to_string(),
            Text::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// Resolves slice bounds against `len`, supporting negative offsets.
pub fn resolve_bounds(len: usize, low: i64, high: Option<i64>) -> Result<(usize, usize), String> {
    let clamp = |i: i64| -> usize {
        if i < 0 {
            len.saturating_sub(i.unsigned_abs() as usize)
        } else {
            (i as usize).min(len)
        }
    };
    let start = clamp(low);
    let end = high.map_or(len, clamp);
    if start > end {
        return Err(format!(
            "lower slice bound {start} must be lower than or equal to upper bound ({end})"
        ));
    }
    Ok((start, end))
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(i) = find_bytes(rest, from) {
        out.extend_from_slice(&rest[..i]);
        out.extend_from_slice(to);
        rest = &rest[i + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn split_bytes<'b>(haystack: &'b [u8], delim: &[u8]) -> Vec<&'b [u8]> {
    if delim.is_empty() {
        return haystack.chunks(1).collect();
    }
    let mut parts = Vec::new();
    let mut rest = haystack;
    while let Some(i) = find_bytes(rest, delim) {
        parts.push(&rest[..i]);
        rest = &rest[i + delim.len()..];
    }
    parts.push(rest);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_families_keep_their_type() {
        let s = Value::from("Hello World");
        let b = Value::Bytes(b"Hello World".to_vec());
        assert_eq!(s.as_text().unwrap().to_upper(), Value::from("HELLO WORLD"));
        assert_eq!(b.as_text().unwrap().to_upper(), Value::Bytes(b"HELLO WORLD".to_vec()));
        assert!(b.as_text().unwrap().contains(b"lo W"));
        assert!(s.as_text().unwrap().has_suffix(b"World"));
    }

    #[test]
    fn byte_replace_and_split() {
        let b = Text::Bytes(b"a,b,,c");
        assert_eq!(b.replace_all(b",", b";"), Value::Bytes(b"a;b;;c".to_vec()));
        let parts = b.split(b",");
        assert_eq!(parts.as_array().map(|a| a.len()), Some(4));
        assert_eq!(Text::Bytes(b"  x \n").trim(), Value::Bytes(b"x".to_vec()));
    }

    #[test]
    fn slicing_supports_negative_bounds() {
        let s = Text::Str("héllo");
        assert_eq!(s.slice(1, Some(3)).unwrap(), Value::from("él"));
        assert_eq!(s.slice(-3, None).unwrap(), Value::from("llo"));
        assert!(s.slice(4, Some(2)).is_err());
    }

    #[test]
    fn reverse_respects_graphemes() {
        assert_eq!(Text::Str("ab\u{301}c").reverse(), Value::from("cb\u{301}a"));
    }
}
