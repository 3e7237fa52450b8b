//! # Encoding Methods
//!
//! Hashing, binary-to-text schemes and JSON (de)serialisation.
//!
//! Hashes and decoded payloads are `bytes`; encoded payloads and serialised documents
//! are strings.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::builtins::helpers::{register, simple_method, text};
use crate::errors::{MappingError, Result};
use crate::params::ParamDef;
use crate::registry::{method_ctor, Category, Example, FunctionSpec, MethodSet};
use crate::runtime::method_body;
use crate::value::Value;

// ============================================================================
// SCHEMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(MappingError::params(format!(
                "unrecognised hash algorithm `{other}`, expected one of sha224, sha256, sha384, sha512"
            ))),
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Base64,
    Base64Url,
    Base64RawUrl,
    Hex,
}

impl Scheme {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "base64" => Ok(Scheme::Base64),
            "base64url" => Ok(Scheme::Base64Url),
            "base64rawurl" => Ok(Scheme::Base64RawUrl),
            "hex" => Ok(Scheme::Hex),
            other => Err(MappingError::params(format!(
                "unrecognised encoding scheme `{other}`, expected one of base64, base64url, base64rawurl, hex"
            ))),
        }
    }

    fn encode(&self, data: &[u8]) -> String {
        match self {
            Scheme::Base64 => STANDARD.encode(data),
            Scheme::Base64Url => URL_SAFE.encode(data),
            Scheme::Base64RawUrl => URL_SAFE_NO_PAD.encode(data),
            Scheme::Hex => hex::encode(data),
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let decoded = match self {
            Scheme::Base64 => STANDARD.decode(data).map_err(|err| err.to_string()),
            Scheme::Base64Url => URL_SAFE.decode(data).map_err(|err| err.to_string()),
            Scheme::Base64RawUrl => URL_SAFE_NO_PAD.decode(data).map_err(|err| err.to_string()),
            Scheme::Hex => hex::decode(data).map_err(|err| err.to_string()),
        };
        decoded.map_err(|err| MappingError::general(format!("failed to decode: {err}")))
    }
}

/// Serialises `value` with a custom indent, or compactly when `indent` is `None`.
fn to_json_text(value: &Value, indent: Option<&str>) -> Result<String> {
    let Some(indent) = indent else {
        return Ok(value.to_json_string());
    };
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|err| MappingError::general(format!("failed to serialise JSON: {err}")))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ============================================================================
// REGISTRATION
// ============================================================================

pub fn register_methods(methods: &mut MethodSet) {
    register(
        methods,
        FunctionSpec::new("hash", Category::Encoding, "Hashes text with a SHA-2 algorithm.")
            .description("Supported algorithms are `sha224`, `sha256`, `sha384` and `sha512`. The digest is returned as bytes.")
            .param(ParamDef::string("algorithm", "the hash algorithm").static_only())
            .example(Example::new(
                "Fingerprint a value.",
                r#"root.h = this.s.hash("sha256").encode("hex")"#,
                &[(
                    r#"{"s":"hello"}"#,
                    r#"{"h":"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"}"#,
                )],
            )),
        method_ctor(|params| {
            let algorithm = HashAlgorithm::parse(&params.field_string("algorithm")?)?;
            Ok(method_body(move |value, _ctx| {
                Ok(Value::Bytes(algorithm.digest(text(&value)?.as_bytes())))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("encode", Category::Encoding, "Encodes text with a binary-to-text scheme.")
            .description("Schemes: `base64`, `base64url`, `base64rawurl` (no padding) and `hex`.")
            .param(ParamDef::string("scheme", "the encoding scheme").static_only())
            .example(Example::new(
                "Encode as base64.",
                r#"root.b64 = this.s.encode("base64")
root.hex = this.s.encode("hex")"#,
                &[(r#"{"s":"hello world"}"#, r#"{"b64":"aGVsbG8gd29ybGQ=","hex":"68656c6c6f20776f726c64"}"#)],
            )),
        method_ctor(|params| {
            let scheme = Scheme::parse(&params.field_string("scheme")?)?;
            Ok(method_body(move |value, _ctx| {
                Ok(Value::String(scheme.encode(text(&value)?.as_bytes())))
            }))
        }),
    );

    register(
        methods,
        FunctionSpec::new("decode", Category::Encoding, "Decodes text encoded with a binary-to-text scheme.")
            .description("Accepts the same schemes as `encode`. The result is bytes.")
            .param(ParamDef::string("scheme", "the encoding scheme").static_only())
            .example(Example::new(
                "Decode base64.",
                r#"root.s = this.b64.decode("base64").string()"#,
                &[
                    (r#"{"b64":"aGVsbG8gd29ybGQ="}"#, r#"{"s":"hello world"}"#),
                    (r#"{"b64":"!!"}"#, "Error(failed to decode)"),
                ],
            )),
        method_ctor(|params| {
            let scheme = Scheme::parse(&params.field_string("scheme")?)?;
            Ok(method_body(move |value, _ctx| {
                scheme.decode(text(&value)?.as_bytes()).map(Value::Bytes)
            }))
        }),
    );

    simple_method(
        methods,
        FunctionSpec::new("parse_json", Category::Encoding, "Parses text as a JSON document.")
            .example(Example::new(
                "Unpack an embedded document.",
                "root.doc = this.raw.parse_json()",
                &[
                    (r#"{"raw":"{\"a\":[1,2]}"}"#, r#"{"doc":{"a":[1,2]}}"#),
                    (r#"{"raw":"{"}"#, "Error(failed to parse JSON)"),
                ],
            )),
        |value| {
            Value::from_json_slice(text(&value)?.as_bytes())
                .map_err(|err| MappingError::general(format!("failed to parse JSON: {err}")))
        },
    );

    register(
        methods,
        FunctionSpec::new("format_json", Category::Encoding, "Serialises a value as a JSON string.")
            .description("Pretty prints with `indent` unless `no_indent` is set.")
            .param(ParamDef::string("indent", "the indentation of each level").default("    "))
            .param(ParamDef::bool("no_indent", "serialise without any whitespace").default(false))
            .example(Example::new(
                "Compact and indented output.",
                "root.compact = this.doc.format_json(no_indent: true)\nroot.pretty = this.doc.format_json(\"  \")",
                &[(
                    r#"{"doc":{"a":1}}"#,
                    r#"{"compact":"{\"a\":1}","pretty":"{\n  \"a\": 1\n}"}"#,
                )],
            )),
        method_ctor(|params| {
            let indent = params.field_string("indent")?;
            let compact = params.field_bool("no_indent")?;
            Ok(method_body(move |value, _ctx| {
                let indent = (!compact).then_some(indent.as_str());
                to_json_text(&value, indent).map(Value::String)
            }))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes_round_trip() {
        let data = b"\xff\x00mapling";
        for scheme in [Scheme::Base64, Scheme::Base64Url, Scheme::Base64RawUrl, Scheme::Hex] {
            let encoded = scheme.encode(data);
            assert_eq!(scheme.decode(encoded.as_bytes()).unwrap(), data.to_vec(), "{scheme:?}");
        }
        assert!(!Scheme::Base64RawUrl.encode(b"a").ends_with('='));
    }

    #[test]
    fn digests_have_the_expected_length() {
        assert_eq!(HashAlgorithm::Sha224.digest(b"x").len(), 28);
        assert_eq!(HashAlgorithm::Sha512.digest(b"x").len(), 64);
        assert!(HashAlgorithm::parse("md5").is_err());
    }
}
