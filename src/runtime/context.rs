use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::message::MessageBatch;
use crate::value::{Object, Value};

/// Variables bound with `let` statements.
pub type Variables = HashMap<String, Value>;

static NO_VARIABLES: Lazy<Variables> = Lazy::new(HashMap::new);
static NO_METADATA: Lazy<Object> = Lazy::new(Object::new);

/// A named sub-context introduced by a lambda (`item -> item.price`).
///
/// Frames form a chain through their parents so nested lambdas can reach every name
/// bound above them.
#[derive(Debug, Clone, Copy)]
pub struct NamedFrame<'a> {
    pub name: &'a str,
    pub value: &'a Value,
    pub parent: Option<&'a NamedFrame<'a>>,
}

impl<'a> NamedFrame<'a> {
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if current.name == name {
                return Some(current.value);
            }
            frame = current.parent;
        }
        None
    }
}

/// Everything a node may read while it executes.
///
/// A context is a bundle of borrows and is cheap to copy. Narrowing the current value
/// (as array methods do for each element) keeps a reference to the enclosing context so
/// lambdas can restore the outer `this`.
#[derive(Clone, Copy)]
pub struct FunctionContext<'a> {
    /// The value `this` refers to. `None` when the input could not be parsed.
    pub value: Option<&'a Value>,
    /// The document under construction, readable through `root.*`.
    pub root: Option<&'a Value>,
    pub named: Option<&'a NamedFrame<'a>>,
    pub outer: Option<&'a FunctionContext<'a>>,
    pub vars: &'a Variables,
    /// Working metadata of the message being mapped.
    pub metadata: &'a Object,
    pub batch: Option<&'a dyn MessageBatch>,
    pub index: usize,
}

impl<'a> FunctionContext<'a> {
    /// A context with nothing in it. Used to resolve static arguments at compile time.
    pub fn empty() -> FunctionContext<'static> {
        FunctionContext {
            value: None,
            root: None,
            named: None,
            outer: None,
            vars: &NO_VARIABLES,
            metadata: &NO_METADATA,
            batch: None,
            index: 0,
        }
    }

    /// A context whose `this` is `value` and nothing else.
    pub fn for_value(value: &'a Value) -> FunctionContext<'a> {
        FunctionContext {
            value: Some(value),
            ..FunctionContext::empty()
        }
    }

    pub fn with_root(self, root: &'a Value) -> Self {
        FunctionContext {
            root: Some(root),
            ..self
        }
    }

    pub fn with_vars(self, vars: &'a Variables) -> Self {
        FunctionContext { vars, ..self }
    }

    pub fn with_metadata(self, metadata: &'a Object) -> Self {
        FunctionContext { metadata, ..self }
    }

    pub fn with_batch(self, batch: &'a dyn MessageBatch, index: usize) -> Self {
        FunctionContext {
            batch: Some(batch),
            index,
            ..self
        }
    }

    /// Narrows `this` to `value`, remembering the current context as the outer one.
    pub fn with_value<'b>(&'b self, value: &'b Value) -> FunctionContext<'b>
    where
        'a: 'b,
    {
        FunctionContext {
            value: Some(value),
            root: self.root,
            named: self.named,
            outer: Some(self),
            vars: self.vars,
            metadata: self.metadata,
            batch: self.batch,
            index: self.index,
        }
    }

    /// Binds a named frame on top of the current chain.
    pub fn with_named<'b>(&self, frame: &'b NamedFrame<'b>) -> FunctionContext<'b>
    where
        'a: 'b,
    {
        FunctionContext {
            value: self.value,
            root: self.root,
            named: Some(frame),
            outer: self.outer,
            vars: self.vars,
            metadata: self.metadata,
            batch: self.batch,
            index: self.index,
        }
    }

    /// The context that was active before the last `with_value`, or this one.
    pub fn pop_value(&self) -> FunctionContext<'a> {
        match self.outer {
            Some(outer) => *outer,
            None => *self,
        }
    }

    pub fn named_value(&self, name: &str) -> Option<&'a Value> {
        self.named.and_then(|frame| frame.lookup(name))
    }
}
