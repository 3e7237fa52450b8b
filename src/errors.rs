//! Mapling error handling.
//!
//! All fallible operations return [`MappingError`]. Runtime errors pick up provenance as
//! they travel up the expression tree: the first node that receives a fresh error from a
//! child prefixes it with that child's annotation (`field `this.foo`: ...`). Wrapping is
//! idempotent, so an error that is already annotated, a type mismatch or a component
//! failure passes through every further wrap untouched.
//!
//! Compile errors carry the mapping source and a labelled span so the CLI can render
//! them with `miette`.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::runtime::Function;
use crate::value::Value;

pub type Result<T> = std::result::Result<T, MappingError>;

// ============================================================================
// STRUCTURED ERROR PAYLOADS
// ============================================================================

/// A binary operation was applied to two values of incompatible types.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
#[error("cannot {operation} types {left_type} (from {left_from}) and {right_type} (from {right_from})")]
#[diagnostic(code(mapling::runtime::type_mismatch))]
pub struct TypeMismatchError {
    pub operation: String,
    pub left_type: String,
    pub right_type: String,
    pub left_from: String,
    pub right_from: String,
}

impl TypeMismatchError {
    pub fn new(
        operation: &str,
        left: &Value,
        left_fn: &dyn Function,
        right: &Value,
        right_fn: &dyn Function,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            left_type: left.type_name().to_string(),
            right_type: right.type_name().to_string(),
            left_from: left_fn.annotation(),
            right_from: right_fn.annotation(),
        }
    }
}

/// A failure reported by an external pipeline component invoked from a mapping.
#[derive(Error, Diagnostic, Debug)]
#[error("{}", render_component(.type_name, .label, .path, .source))]
#[diagnostic(code(mapling::runtime::component))]
pub struct ComponentError {
    pub type_name: String,
    pub label: String,
    pub path: Vec<String>,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

fn render_component(
    type_name: &str,
    label: &str,
    path: &[String],
    source: &dyn fmt::Display,
) -> String {
    let name = if label.is_empty() {
        format!("`{type_name}`")
    } else {
        format!("`{type_name}` ({label})")
    };
    if path.is_empty() {
        format!("component {name} failed: {source}")
    } else {
        format!("component {name} at path {} failed: {source}", path.join("."))
    }
}

fn render_no_context(field: &str) -> String {
    if field.is_empty() {
        "context was undefined".to_string()
    } else {
        format!("context was undefined, unable to reference `{field}`")
    }
}

// ============================================================================
// MAIN ERROR TYPE
// ============================================================================

#[derive(Error, Diagnostic, Debug)]
pub enum MappingError {
    /// A field was referenced while no context value was available.
    #[error("{}", render_no_context(.field))]
    #[diagnostic(code(mapling::runtime::no_context))]
    NoContext { field: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    TypeMismatch(TypeMismatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Component(ComponentError),

    /// An error prefixed with the annotation of the node that produced it.
    #[error("{annotation}: {inner}")]
    #[diagnostic(code(mapling::runtime::annotated))]
    Annotated {
        annotation: String,
        inner: Box<MappingError>,
    },

    /// A mapping statement failed; rendered with the statement's line.
    #[error("failed assignment (line {line}): {inner}")]
    #[diagnostic(code(mapling::mapping::assignment))]
    Assignment {
        line: usize,
        inner: Box<MappingError>,
    },

    #[error("expected {expected} value, got {actual}")]
    #[diagnostic(code(mapling::runtime::invalid_value))]
    InvalidValue { expected: String, actual: String },

    #[error("{message}")]
    #[diagnostic(code(mapling::params::invalid))]
    Params { message: String },

    #[error("unrecognised {kind} `{name}`")]
    #[diagnostic(code(mapling::registry::unknown))]
    Unknown { kind: &'static str, name: String },

    #[error("failed to parse mapping: {message}")]
    #[diagnostic(code(mapling::parse::error))]
    Parse {
        message: String,
        #[source_code]
        src: Arc<NamedSource<String>>,
        #[label("{label}")]
        span: SourceSpan,
        label: String,
        #[help]
        help: Option<String>,
    },

    #[error("{0}")]
    #[diagnostic(code(mapling::runtime::general))]
    General(String),

    #[error(transparent)]
    #[diagnostic(code(mapling::io))]
    Io(#[from] std::io::Error),
}

impl MappingError {
    pub fn general(message: impl fmt::Display) -> Self {
        MappingError::General(message.to_string())
    }

    pub fn no_context(field: impl Into<String>) -> Self {
        MappingError::NoContext {
            field: field.into(),
        }
    }

    /// `expected number value, got string ("foo")`
    pub fn expected(expected: &str, actual: &Value) -> Self {
        let actual = match actual {
            Value::Null | Value::Delete | Value::Nothing => actual.type_name().to_string(),
            other => format!("{} ({})", other.type_name(), other.preview()),
        };
        MappingError::InvalidValue {
            expected: expected.to_string(),
            actual,
        }
    }

    pub fn params(message: impl fmt::Display) -> Self {
        MappingError::Params {
            message: message.to_string(),
        }
    }

    pub fn component(
        type_name: impl Into<String>,
        label: impl Into<String>,
        path: Vec<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MappingError::Component(ComponentError {
            type_name: type_name.into(),
            label: label.into(),
            path,
            source: source.into(),
        })
    }

    pub fn parse_error(
        source_name: &str,
        source: &str,
        span: (usize, usize),
        message: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let (start, end) = span;
        MappingError::Parse {
            message: message.into(),
            src: Arc::new(NamedSource::new(source_name, source.to_string())),
            span: SourceSpan::from(start..end.max(start)),
            label: label.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        if let MappingError::Parse { help, .. } = &mut self {
            *help = Some(text.into());
        }
        self
    }

    /// True when the error already carries provenance and must not be wrapped again.
    pub fn has_provenance(&self) -> bool {
        matches!(
            self,
            MappingError::Annotated { .. }
                | MappingError::TypeMismatch(_)
                | MappingError::Component(_)
                | MappingError::Assignment { .. }
                | MappingError::Parse { .. }
        )
    }

    /// Prefixes the error with `annotation` unless it already carries provenance.
    pub fn annotate(self, annotation: impl Into<String>) -> Self {
        if self.has_provenance() {
            return self;
        }
        MappingError::Annotated {
            annotation: annotation.into(),
            inner: Box::new(self),
        }
    }

    /// Annotates with the provenance of the function that produced the error.
    pub fn from_function(self, function: &dyn Function) -> Self {
        if self.has_provenance() {
            return self;
        }
        self.annotate(function.annotation())
    }

    pub fn assignment(line: usize, source: MappingError) -> Self {
        MappingError::Assignment {
            line,
            inner: Box::new(source),
        }
    }

    /// The innermost error, looking through annotation and assignment wrappers.
    pub fn root_cause(&self) -> &MappingError {
        match self {
            MappingError::Annotated { inner, .. } | MappingError::Assignment { inner, .. } => {
                inner.root_cause()
            }
            other => other,
        }
    }

    pub fn is_no_context(&self) -> bool {
        matches!(self.root_cause(), MappingError::NoContext { .. })
    }

    pub fn as_type_mismatch(&self) -> Option<&TypeMismatchError> {
        match self.root_cause() {
            MappingError::TypeMismatch(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentError> {
        match self.root_cause() {
            MappingError::Component(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_annotated(&self) -> bool {
        matches!(self, MappingError::Annotated { .. })
    }
}

impl From<TypeMismatchError> for MappingError {
    fn from(err: TypeMismatchError) -> Self {
        MappingError::TypeMismatch(err)
    }
}

impl From<ComponentError> for MappingError {
    fn from(err: ComponentError) -> Self {
        MappingError::Component(err)
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints a MappingError with full miette diagnostics.
pub fn print_error(error: MappingError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_names_the_field() {
        assert_eq!(
            MappingError::no_context("foo.bar").to_string(),
            "context was undefined, unable to reference `foo.bar`"
        );
        assert_eq!(MappingError::no_context("").to_string(), "context was undefined");
    }

    #[test]
    fn annotate_is_idempotent() {
        let err = MappingError::general("boom").annotate("field `this.a`");
        let rendered = err.to_string();
        let again = err.annotate("method `uppercase`");
        assert_eq!(again.to_string(), rendered);
        assert_eq!(rendered, "field `this.a`: boom");
    }

    #[test]
    fn component_errors_are_not_wrapped() {
        let err = MappingError::component("cache", "users", vec!["pipeline".into()], "timeout");
        let rendered = err.to_string();
        assert_eq!(err.annotate("function `x`").to_string(), rendered);
        assert!(rendered.contains("users"));
    }

    #[test]
    fn inspection_looks_through_wrappers() {
        let err = MappingError::assignment(3, MappingError::no_context("x").annotate("field `x`"));
        assert!(err.is_no_context());
        assert!(err.to_string().starts_with("failed assignment (line 3): field `x`:"));
    }
}
