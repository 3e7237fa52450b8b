//! References to data outside the expression: fields of the current value, the root under
//! construction, named sub-contexts, variables and metadata.
//!
//! Resolving the thing a reference is rooted at can fail. Walking the path below it never
//! does: a missing key or index resolves to `null`.

use std::sync::Arc;

use crate::errors::{MappingError, Result};
use crate::runtime::context::FunctionContext;
use crate::runtime::function::{exec_child, Func, Function};
use crate::runtime::targets::{TargetKind, TargetPath, TargetsContext};
use crate::value::{get_path, Value};

/// What a field reference is rooted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldScope {
    /// `this` (or a bare path).
    Value,
    /// `root`, the document being built.
    Root,
    /// A name bound by a lambda.
    Named(String),
}

#[derive(Debug, Clone)]
pub struct FieldFunction {
    scope: FieldScope,
    path: Vec<String>,
}

impl FieldFunction {
    pub fn new(scope: FieldScope, path: Vec<String>) -> Self {
        Self { scope, path }
    }

    pub fn this(path: &[&str]) -> Self {
        Self::new(FieldScope::Value, path.iter().map(|s| s.to_string()).collect())
    }

    pub fn func(scope: FieldScope, path: Vec<String>) -> Func {
        Arc::new(Self::new(scope, path))
    }

    pub fn scope(&self) -> &FieldScope {
        &self.scope
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// A copy of this reference reaching further down.
    pub fn extended(&self, segment: String) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self::new(self.scope.clone(), path)
    }

    fn rendered(&self) -> String {
        let base = match &self.scope {
            FieldScope::Value => "this",
            FieldScope::Root => "root",
            FieldScope::Named(name) => name.as_str(),
        };
        if self.path.is_empty() {
            base.to_string()
        } else {
            format!("{base}.{}", self.path.join("."))
        }
    }

    fn resolve_target<'a>(&self, ctx: &FunctionContext<'a>) -> Result<&'a Value> {
        match &self.scope {
            FieldScope::Value => ctx
                .value
                .ok_or_else(|| MappingError::no_context(self.path.join("."))),
            FieldScope::Root => ctx
                .root
                .ok_or_else(|| MappingError::general("no root in this context")),
            FieldScope::Named(name) => ctx.named_value(name).ok_or_else(|| {
                MappingError::general(format!("named context `{name}` is not defined"))
            }),
        }
    }
}

impl Function for FieldFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let target = self.resolve_target(ctx)?;
        Ok(get_path(target, &self.path).cloned().unwrap_or(Value::Null))
    }

    fn annotation(&self) -> String {
        format!("field `{}`", self.rendered())
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = match &self.scope {
            FieldScope::Value => ctx.resolve_value(&self.path),
            FieldScope::Root => vec![TargetPath::new(TargetKind::Root, self.path.clone())],
            FieldScope::Named(name) => match ctx.named_paths(name) {
                Some(bases) if !bases.is_empty() => {
                    bases.iter().map(|base| base.extended(&self.path)).collect()
                }
                _ => ctx.resolve_value(&self.path),
            },
        };
        (ctx.with_main(paths.clone()), paths)
    }
}

/// `$name.path`
#[derive(Debug, Clone)]
pub struct VariableFunction {
    name: String,
    path: Vec<String>,
}

impl VariableFunction {
    pub fn new(name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn extended(&self, segment: String) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self::new(self.name.clone(), path)
    }
}

impl Function for VariableFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let value = ctx.vars.get(&self.name).ok_or_else(|| {
            MappingError::general(format!("variable `{}` is undefined", self.name))
        })?;
        Ok(get_path(value, &self.path).cloned().unwrap_or(Value::Null))
    }

    fn annotation(&self) -> String {
        if self.path.is_empty() {
            format!("variable `${}`", self.name)
        } else {
            format!("variable `${}.{}`", self.name, self.path.join("."))
        }
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let mut path = vec![self.name.clone()];
        path.extend(self.path.iter().cloned());
        let paths = vec![TargetPath::new(TargetKind::Variable, path)];
        (ctx, paths)
    }
}

/// `@key` reads one working metadata key, `@` reads all of them as an object.
#[derive(Debug, Clone)]
pub struct MetadataFunction {
    key: Option<String>,
}

impl MetadataFunction {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }
}

impl Function for MetadataFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        Ok(match &self.key {
            Some(key) => ctx.metadata.get(key).cloned().unwrap_or(Value::Null),
            None => Value::Object(ctx.metadata.clone()),
        })
    }

    fn annotation(&self) -> String {
        match &self.key {
            Some(key) => format!("metadata value `@{key}`"),
            None => "metadata object".to_string(),
        }
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let path = self.key.iter().cloned().collect();
        (ctx, vec![TargetPath::new(TargetKind::Metadata, path)])
    }
}

/// A path read from the result of an arbitrary expression, as in `foo().bar.baz`.
pub struct GetFunction {
    target: Func,
    path: Vec<String>,
}

impl GetFunction {
    pub fn new(target: Func, path: Vec<String>) -> Self {
        Self { target, path }
    }
}

impl Function for GetFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let value = exec_child(self.target.as_ref(), ctx)?;
        Ok(get_path(&value, &self.path).cloned().unwrap_or(Value::Null))
    }

    fn annotation(&self) -> String {
        format!("field `.{}` of {}", self.path.join("."), self.target.annotation())
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let (_, base) = self.target.query_targets(ctx.clone());
        let paths: Vec<TargetPath> = base.iter().map(|p| p.extended(&self.path)).collect();
        (ctx.with_main(paths.clone()), paths)
    }

    fn close(&self) -> Result<()> {
        self.target.close()
    }
}
