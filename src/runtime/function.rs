//! The evaluation contract shared by every node, plus the generic nodes built-ins compile
//! to.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{MappingError, Result};
use crate::runtime::context::FunctionContext;
use crate::runtime::targets::{TargetPath, TargetsContext};
use crate::value::Value;

/// A compiled expression node.
///
/// Implementations must be safe to execute from many threads at once. Nodes that keep
/// state guard it themselves.
pub trait Function: Send + Sync {
    /// Evaluates the node. Returns a value, `Delete`, `Nothing` or an error.
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value>;

    /// Human readable description used only in error messages.
    fn annotation(&self) -> String;

    /// Reports every input this node and its children read, without executing anything.
    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>);

    /// Releases resources opened at construction.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// The constant this node always evaluates to, if it is a literal.
    fn literal(&self) -> Option<&Value> {
        None
    }
}

pub type Func = Arc<dyn Function>;

/// Executes a child node, annotating a fresh error with the child's provenance.
pub fn exec_child(child: &dyn Function, ctx: &FunctionContext<'_>) -> Result<Value> {
    child.exec(ctx).map_err(|err| err.from_function(child))
}

/// Unions the targets of `children`, each analysed against the same context.
pub fn union_targets<'f>(
    ctx: &TargetsContext,
    children: impl IntoIterator<Item = &'f Func>,
) -> Vec<TargetPath> {
    children
        .into_iter()
        .flat_map(|child| child.query_targets(ctx.clone()).1)
        .collect()
}

pub(crate) fn close_all<'f>(children: impl IntoIterator<Item = &'f Func>) -> Result<()> {
    for child in children {
        child.close()?;
    }
    Ok(())
}

// ============================================================================
// LITERALS
// ============================================================================

/// A constant value.
#[derive(Debug, Clone)]
pub struct Literal {
    value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn func(value: Value) -> Func {
        Arc::new(Self::new(value))
    }
}

impl Function for Literal {
    fn exec(&self, _ctx: &FunctionContext<'_>) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn annotation(&self) -> String {
        format!("{} literal", self.value.type_name())
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        (ctx, Vec::new())
    }

    fn literal(&self) -> Option<&Value> {
        Some(&self.value)
    }
}

// ============================================================================
// BUILT-IN FUNCTIONS AND METHODS
// ============================================================================

pub type FunctionBody = Box<dyn Fn(&FunctionContext<'_>) -> Result<Value> + Send + Sync>;

/// The node a registered function compiles to: a closure over its bound parameters.
pub struct ClosureFunction {
    annotation: String,
    body: FunctionBody,
    children: Vec<Func>,
    targets: Vec<TargetPath>,
}

impl ClosureFunction {
    pub fn new<F>(annotation: impl Into<String>, body: F) -> Self
    where
        F: Fn(&FunctionContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            annotation: annotation.into(),
            body: Box::new(body),
            children: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Query arguments the closure executes. They contribute targets and are closed with it.
    pub fn with_children(mut self, children: Vec<Func>) -> Self {
        self.children = children;
        self
    }

    /// Targets the function reads by itself, such as a statically named metadata key.
    pub fn with_targets(mut self, targets: Vec<TargetPath>) -> Self {
        self.targets = targets;
        self
    }

    pub fn into_func(self) -> Func {
        Arc::new(self)
    }
}

impl Function for ClosureFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        (self.body)(ctx)
    }

    fn annotation(&self) -> String {
        self.annotation.clone()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let mut paths = self.targets.clone();
        paths.extend(union_targets(&ctx, &self.children));
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        close_all(&self.children)
    }
}

/// A method applied to the outcome of its target. Most bodies only handle a value and
/// are built with [`method_body`]; bodies that recover from a failing target use
/// [`recovering_body`].
pub type MethodBody =
    Box<dyn Fn(Result<Value>, &FunctionContext<'_>) -> Result<Value> + Send + Sync>;

/// A body that runs only when the target succeeded. Target errors pass through as is.
pub fn method_body<F>(body: F) -> MethodBody
where
    F: Fn(Value, &FunctionContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(move |target, ctx| body(target?, ctx))
}

/// A body that also sees the error of a failing target.
pub fn recovering_body<F>(body: F) -> MethodBody
where
    F: Fn(Result<Value>, &FunctionContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(body)
}

/// A registered method applied to the result of a target expression.
pub struct MethodFunction {
    name: String,
    target: Func,
    body: MethodBody,
    /// Query arguments, flagged when they run with the method target as their context.
    queries: Vec<(Func, bool)>,
}

impl MethodFunction {
    pub fn new(name: impl Into<String>, target: Func, body: MethodBody, queries: Vec<(Func, bool)>) -> Self {
        Self {
            name: name.into(),
            target,
            body,
            queries,
        }
    }
}

impl Function for MethodFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let target = exec_child(self.target.as_ref(), ctx);
        (self.body)(target, ctx).map_err(|err| err.annotate(self.target.annotation()))
    }

    fn annotation(&self) -> String {
        format!("method `{}`", self.name)
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let (target_ctx, mut paths) = self.target.query_targets(ctx.clone());
        for (query, scoped) in &self.queries {
            let query_ctx = if *scoped { target_ctx.clone() } else { ctx.clone() };
            paths.extend(query.query_targets(query_ctx).1);
        }
        (target_ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.target.close()?;
        close_all(self.queries.iter().map(|(query, _)| query))
    }
}

/// Wraps a query so it is executed once per compiled instance and then reused.
pub struct MemoizedQuery {
    query: Func,
    resolved: Mutex<Option<Value>>,
}

impl MemoizedQuery {
    pub fn new(query: Func) -> Self {
        Self {
            query,
            resolved: Mutex::new(None),
        }
    }

    pub fn func(query: Func) -> Func {
        Arc::new(Self::new(query))
    }
}

impl Function for MemoizedQuery {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let mut resolved = self.resolved.lock();
        if let Some(value) = resolved.as_ref() {
            return Ok(value.clone());
        }
        let value = self.query.exec(ctx)?;
        *resolved = Some(value.clone());
        Ok(value)
    }

    fn annotation(&self) -> String {
        self.query.annotation()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        self.query.query_targets(ctx)
    }

    fn close(&self) -> Result<()> {
        self.query.close()
    }

    fn literal(&self) -> Option<&Value> {
        self.query.literal()
    }
}

/// Rejects `Delete` and `Nothing` where a concrete value is required.
pub(crate) fn reject_sentinel(value: Value, what: &str) -> Result<Value> {
    if value.is_sentinel() {
        Err(MappingError::general(format!(
            "{what} resolved to a {} marker",
            value.type_name()
        )))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tally(Arc<AtomicUsize>);

    impl Function for Tally {
        fn exec(&self, _ctx: &FunctionContext<'_>) -> Result<Value> {
            Ok(Value::from(self.0.fetch_add(1, Ordering::SeqCst) as i64))
        }

        fn annotation(&self) -> String {
            "tally".into()
        }

        fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
            (ctx, Vec::new())
        }
    }

    #[test]
    fn literals_describe_their_type() {
        assert_eq!(Literal::new(Value::from(5i64)).annotation(), "number literal");
        assert_eq!(Literal::new(Value::from("x")).annotation(), "string literal");
    }

    #[test]
    fn memoized_queries_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = MemoizedQuery::new(Arc::new(Tally(calls.clone())));
        let ctx = FunctionContext::empty();
        assert_eq!(memo.exec(&ctx).unwrap(), Value::from(0i64));
        assert_eq!(memo.exec(&ctx).unwrap(), Value::from(0i64));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exec_child_annotates_fresh_errors_once() {
        let failing = ClosureFunction::new("function `boom`", |_ctx| {
            Err(MappingError::general("bang"))
        });
        let err = exec_child(&failing, &FunctionContext::empty()).unwrap_err();
        assert_eq!(err.to_string(), "function `boom`: bang");
        let again = err.from_function(&failing);
        assert_eq!(again.to_string(), "function `boom`: bang");
    }
}
