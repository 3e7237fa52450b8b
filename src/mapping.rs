//! # Mapping Executor
//!
//! A [`Mapping`] is a compiled document: an ordered list of assignments. Executing it
//! against one message builds a new document (`root`) and new metadata from the input.
//!
//! ## Execution Rules
//!
//! - `root` starts as `nothing`; a mapping that never assigns it passes the input through
//! - assigning `deleted()` removes the target, assigning `nothing()` leaves it unchanged
//! - variables start empty for every message
//! - the first failing statement aborts execution with its line number

use std::fmt;

use crate::errors::{MappingError, Result};
use crate::message::{Batch, MessageBatch, Part};
use crate::runtime::{Func, FunctionContext, TargetPath, TargetsContext, Variables};
use crate::value::{delete_path, set_path, Object, Value};

/// Where an assignment writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    /// `root.a.b = ...`, an empty path replaces the whole document.
    Root(Vec<String>),
    /// `meta key = ...`, or `meta = ...` for all metadata.
    Meta(Option<String>),
    /// `let name = ...`
    Variable(String),
}

impl fmt::Display for AssignTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignTarget::Root(path) if path.is_empty() => f.write_str("root"),
            AssignTarget::Root(path) => write!(f, "root.{}", path.join(".")),
            AssignTarget::Meta(Some(key)) => write!(f, "meta {key}"),
            AssignTarget::Meta(None) => f.write_str("meta"),
            AssignTarget::Variable(name) => write!(f, "let {name}"),
        }
    }
}

pub struct Statement {
    pub line: usize,
    pub target: AssignTarget,
    pub query: Func,
}

struct State {
    root: Value,
    metadata: Object,
    vars: Variables,
}

impl State {
    fn assign(&mut self, target: &AssignTarget, value: Value) -> Result<()> {
        if matches!(value, Value::Nothing) {
            return Ok(());
        }
        match target {
            AssignTarget::Root(path) if path.is_empty() => self.root = value,
            AssignTarget::Root(path) => {
                if matches!(value, Value::Delete) {
                    delete_path(&mut self.root, path);
                } else {
                    if matches!(self.root, Value::Delete | Value::Nothing) {
                        self.root = Value::Object(Object::new());
                    }
                    set_path(&mut self.root, path, value);
                }
            }
            AssignTarget::Meta(Some(key)) => {
                if matches!(value, Value::Delete) {
                    self.metadata.remove(key);
                } else {
                    self.metadata.insert(key.clone(), value);
                }
            }
            AssignTarget::Meta(None) => match value {
                Value::Delete => self.metadata = Object::new(),
                Value::Object(map) => self.metadata = map,
                other => return Err(MappingError::expected("object", &other)),
            },
            AssignTarget::Variable(name) => {
                if matches!(value, Value::Delete) {
                    self.vars.remove(name);
                } else {
                    self.vars.insert(name.clone(), value);
                }
            }
        }
        Ok(())
    }
}

/// The message a mapping runs against.
#[derive(Clone, Copy)]
pub struct MappingInput<'a> {
    /// The parsed input. `None` when it could not be parsed, which leaves `this` undefined.
    pub value: Option<&'a Value>,
    pub metadata: &'a Object,
    pub batch: Option<&'a dyn MessageBatch>,
    pub index: usize,
}

impl<'a> MappingInput<'a> {
    pub fn new(value: &'a Value, metadata: &'a Object) -> Self {
        Self {
            value: Some(value),
            metadata,
            batch: None,
            index: 0,
        }
    }

    pub fn with_batch(self, batch: &'a dyn MessageBatch, index: usize) -> Self {
        Self {
            batch: Some(batch),
            index,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingOutput {
    /// The new document. `Delete` when the mapping deleted the message.
    pub root: Value,
    pub metadata: Object,
}

pub struct Mapping {
    statements: Vec<Statement>,
    source: String,
}

impl Mapping {
    pub fn new(statements: Vec<Statement>, source: impl Into<String>) -> Self {
        Self {
            statements,
            source: source.into(),
        }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn exec(&self, input: &MappingInput<'_>) -> Result<MappingOutput> {
        let mut state = State {
            root: Value::Nothing,
            metadata: input.metadata.clone(),
            vars: Variables::new(),
        };
        for statement in &self.statements {
            let ctx = FunctionContext {
                value: input.value,
                root: Some(&state.root),
                named: None,
                outer: None,
                vars: &state.vars,
                metadata: &state.metadata,
                batch: input.batch,
                index: input.index,
            };
            let result = statement
                .query
                .exec(&ctx)
                .and_then(|value| state.assign(&statement.target, value))
                .map_err(|err| {
                    MappingError::assignment(statement.line, err.from_function(statement.query.as_ref()))
                });
            if let Err(err) = result {
                log::debug!("mapping aborted at line {}: {err}", statement.line);
                return Err(err);
            }
        }
        let root = match state.root {
            Value::Nothing => input.value.cloned().unwrap_or(Value::Nothing),
            other => other,
        };
        Ok(MappingOutput {
            root,
            metadata: state.metadata,
        })
    }

    /// Maps a bare value with empty metadata and returns the new document.
    pub fn query(&self, value: &Value) -> Result<Value> {
        let metadata = Object::new();
        Ok(self.exec(&MappingInput::new(value, &metadata))?.root)
    }

    /// Maps message `index` of `batch` into a new part. `None` means the message was
    /// deleted.
    pub fn map_part(&self, batch: &Batch, index: usize) -> Result<Option<Part>> {
        let part = batch.get(index).ok_or_else(|| {
            MappingError::general(format!("message index {index} is out of bounds"))
        })?;
        let parsed = part.structured().ok();
        let input = MappingInput {
            value: parsed.as_ref(),
            metadata: part.metadata(),
            batch: Some(batch),
            index,
        };
        let output = self.exec(&input)?;
        let mut mapped = part.clone();
        mapped.set_metadata(output.metadata);
        match output.root {
            Value::Delete => return Ok(None),
            Value::Nothing => {}
            root => mapped.set_value(root),
        }
        Ok(Some(mapped))
    }

    /// Every input the mapping reads, in statement order without duplicates.
    pub fn targets(&self) -> Vec<TargetPath> {
        let mut seen = Vec::new();
        for statement in &self.statements {
            let (_, paths) = statement.query.query_targets(TargetsContext::new());
            for path in paths {
                if !seen.contains(&path) {
                    seen.push(path);
                }
            }
        }
        seen
    }

    pub fn close(&self) -> Result<()> {
        for statement in &self.statements {
            statement.query.close()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("statements", &self.statements.len())
            .field("source", &self.source)
            .finish()
    }
}
