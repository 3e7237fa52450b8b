//! Conditional expressions and lambdas.

use crate::errors::{MappingError, Result};
use crate::runtime::context::{FunctionContext, NamedFrame};
use crate::runtime::function::{close_all, exec_child, Func, Function};
use crate::runtime::targets::{TargetPath, TargetsContext};
use crate::value::Value;

/// `if a { x } else if b { y } else { z }`. Yields `nothing` when no branch applies.
pub struct IfFunction {
    branches: Vec<(Func, Func)>,
    otherwise: Option<Func>,
}

impl IfFunction {
    pub fn new(branches: Vec<(Func, Func)>, otherwise: Option<Func>) -> Self {
        Self {
            branches,
            otherwise,
        }
    }
}

impl Function for IfFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        for (condition, body) in &self.branches {
            match exec_child(condition.as_ref(), ctx)? {
                Value::Bool(true) => return exec_child(body.as_ref(), ctx),
                Value::Bool(false) => continue,
                other => {
                    return Err(MappingError::expected("bool", &other).annotate(condition.annotation()))
                }
            }
        }
        match &self.otherwise {
            Some(body) => exec_child(body.as_ref(), ctx),
            None => Ok(Value::Nothing),
        }
    }

    fn annotation(&self) -> String {
        "if expression".to_string()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let mut paths = Vec::new();
        for (condition, body) in &self.branches {
            paths.extend(condition.query_targets(ctx.clone()).1);
            paths.extend(body.query_targets(ctx.clone()).1);
        }
        if let Some(body) = &self.otherwise {
            paths.extend(body.query_targets(ctx.clone()).1);
        }
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        close_all(self.branches.iter().flat_map(|(c, b)| [c, b]).chain(self.otherwise.iter()))
    }
}

/// One arm of a `match` expression.
pub enum MatchCase {
    /// `_`
    Wildcard,
    /// A constant compared for equality with the matched value.
    Equals(Value),
    /// A boolean result acts as a condition, anything else is compared for equality.
    Query(Func),
}

impl MatchCase {
    /// Chooses how a case expression is checked. Boolean constants stay conditions.
    pub fn from_query(query: Func) -> Self {
        match query.literal() {
            Some(value) if !matches!(value, Value::Bool(_)) => MatchCase::Equals(value.clone()),
            _ => MatchCase::Query(query),
        }
    }

    fn matches(&self, ctx: &FunctionContext<'_>) -> Result<bool> {
        Ok(match self {
            MatchCase::Wildcard => true,
            MatchCase::Equals(expected) => ctx.value == Some(expected),
            MatchCase::Query(query) => match exec_child(query.as_ref(), ctx)? {
                Value::Bool(b) => b,
                other => ctx.value == Some(&other),
            },
        })
    }
}

/// `match subject { case => result, _ => fallback }`
///
/// Cases and results run with the subject as `this`. Without a subject the current
/// context is matched. Yields `nothing` when no case applies.
pub struct MatchFunction {
    subject: Option<Func>,
    cases: Vec<(MatchCase, Func)>,
}

impl MatchFunction {
    pub fn new(subject: Option<Func>, cases: Vec<(MatchCase, Func)>) -> Self {
        Self { subject, cases }
    }
}

impl Function for MatchFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let subject = match &self.subject {
            Some(query) => Some(exec_child(query.as_ref(), ctx)?),
            None => None,
        };
        let inner = match &subject {
            Some(value) => ctx.with_value(value),
            None => *ctx,
        };
        for (case, body) in &self.cases {
            if case.matches(&inner)? {
                return exec_child(body.as_ref(), &inner);
            }
        }
        Ok(Value::Nothing)
    }

    fn annotation(&self) -> String {
        "match expression".to_string()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let (inner, mut paths) = match &self.subject {
            Some(query) => query.query_targets(ctx.clone()),
            None => (ctx.clone(), Vec::new()),
        };
        for (case, body) in &self.cases {
            if let MatchCase::Query(query) = case {
                paths.extend(query.query_targets(inner.clone()).1);
            }
            paths.extend(body.query_targets(inner.clone()).1);
        }
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        let case_queries = self.cases.iter().filter_map(|(case, _)| match case {
            MatchCase::Query(query) => Some(query),
            _ => None,
        });
        close_all(
            self.subject
                .iter()
                .chain(case_queries)
                .chain(self.cases.iter().map(|(_, body)| body)),
        )
    }
}

/// `name -> body`: binds the current value to `name` and restores the outer `this` for
/// the body.
pub struct LambdaFunction {
    name: String,
    body: Func,
}

impl LambdaFunction {
    pub fn new(name: impl Into<String>, body: Func) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl Function for LambdaFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let value = ctx
            .value
            .ok_or_else(|| MappingError::no_context(self.name.clone()))?;
        let frame = NamedFrame {
            name: &self.name,
            value,
            parent: ctx.named,
        };
        let outer = ctx.pop_value();
        exec_child(self.body.as_ref(), &outer.with_named(&frame))
    }

    fn annotation(&self) -> String {
        format!("lambda `{}`", self.name)
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let bound = ctx.with_named(&self.name, ctx.main.clone());
        let paths = self.body.query_targets(bound).1;
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.body.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::field::{FieldFunction, FieldScope};
    use crate::runtime::function::Literal;
    use crate::runtime::ops::{ArithmeticFunction, Op};
    use std::sync::Arc;

    fn lit(v: impl Into<Value>) -> Func {
        Literal::func(v.into())
    }

    #[test]
    fn if_without_else_yields_nothing() {
        let ctx = FunctionContext::empty();
        let func = IfFunction::new(vec![(lit(false), lit(1i64))], None);
        assert_eq!(func.exec(&ctx).unwrap(), Value::Nothing);
        let chained = IfFunction::new(
            vec![(lit(false), lit(1i64)), (lit(true), lit(2i64))],
            Some(lit(3i64)),
        );
        assert_eq!(chained.exec(&ctx).unwrap(), Value::from(2i64));
        let bad = IfFunction::new(vec![(lit("yes"), lit(1i64))], None);
        assert!(bad.exec(&ctx).is_err());
    }

    #[test]
    fn match_cases_compare_or_test() {
        let doc = Value::from_json_str(r#"{"n":5}"#).unwrap();
        let ctx = FunctionContext::for_value(&doc);
        let subject: Func = Arc::new(FieldFunction::this(&["n"]));
        let greater: Func = Arc::new(ArithmeticFunction::new(
            Op::Gt,
            Arc::new(FieldFunction::this(&[])),
            lit(3i64),
        ));
        let func = MatchFunction::new(
            Some(subject),
            vec![
                (MatchCase::from_query(lit(1i64)), lit("one")),
                (MatchCase::from_query(greater), lit("big")),
                (MatchCase::Wildcard, lit("other")),
            ],
        );
        assert_eq!(func.exec(&ctx).unwrap(), Value::from("big"));

        let none = MatchFunction::new(None, vec![(MatchCase::from_query(lit("x")), lit(1i64))]);
        assert_eq!(none.exec(&ctx).unwrap(), Value::Nothing);
    }

    #[test]
    fn lambdas_bind_the_element_and_restore_this() {
        let doc = Value::from_json_str(r#"{"offset":10}"#).unwrap();
        let element = Value::from(5i64);
        let outer = FunctionContext::for_value(&doc);
        let narrowed = outer.with_value(&element);
        let body: Func = Arc::new(ArithmeticFunction::new(
            Op::Add,
            Arc::new(FieldFunction::new(FieldScope::Named("x".into()), vec![])),
            Arc::new(FieldFunction::this(&["offset"])),
        ));
        let lambda = LambdaFunction::new("x", body);
        assert_eq!(lambda.exec(&narrowed).unwrap(), Value::from(15i64));
    }
}
