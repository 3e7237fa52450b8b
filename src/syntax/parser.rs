//! Mapling Parser
//!
//! Compiles mapping source straight into runtime nodes. There is no separate AST: pest
//! pairs are lowered as they are visited, function and method calls are bound against the
//! environment's registries on the spot, and constant sub-expressions are folded.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use once_cell::sync::Lazy;
use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op as PrattOp, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::environment::Environment;
use crate::errors::{MappingError, Result};
use crate::mapping::{AssignTarget, Mapping, Statement};
use crate::params::CallArg;
use crate::runtime::ops::negate;
use crate::runtime::{
    ArithmeticFunction, ArrayLiteral, CoalesceFunction, FieldFunction, FieldScope, Func,
    GetFunction, IfFunction, LambdaFunction, Literal, MatchCase, MatchFunction, MetadataFunction,
    NegateFunction, NotFunction, ObjectLiteral, Op, VariableFunction,
};
use crate::value::{Array, Object, Value};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct MaplingParser;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(PrattOp::infix(Rule::op_coalesce, Assoc::Left))
        .op(PrattOp::infix(Rule::op_or, Assoc::Left))
        .op(PrattOp::infix(Rule::op_and, Assoc::Left))
        .op(PrattOp::infix(Rule::op_eq, Assoc::Left)
            | PrattOp::infix(Rule::op_neq, Assoc::Left)
            | PrattOp::infix(Rule::op_gt, Assoc::Left)
            | PrattOp::infix(Rule::op_gte, Assoc::Left)
            | PrattOp::infix(Rule::op_lt, Assoc::Left)
            | PrattOp::infix(Rule::op_lte, Assoc::Left))
        .op(PrattOp::infix(Rule::op_add, Assoc::Left) | PrattOp::infix(Rule::op_sub, Assoc::Left))
        .op(PrattOp::infix(Rule::op_mul, Assoc::Left)
            | PrattOp::infix(Rule::op_div, Assoc::Left)
            | PrattOp::infix(Rule::op_mod, Assoc::Left))
        .op(PrattOp::prefix(Rule::op_not) | PrattOp::prefix(Rule::op_neg))
        .op(PrattOp::postfix(Rule::method_call) | PrattOp::postfix(Rule::field_access))
});

const SOURCE_NAME: &str = "mapping";

// ============================================================================
// PUBLIC API
// ============================================================================

/// Compiles a mapping document against the functions and methods of `env`.
pub fn parse_mapping(env: &Environment, source: &str) -> Result<Mapping> {
    let mut pairs = MaplingParser::parse(Rule::mapping, source)
        .map_err(|err| convert_parse_error(err, source))?;
    let Some(document) = pairs.next() else {
        return Ok(Mapping::new(Vec::new(), source));
    };

    let compiler = Compiler::new(env, source);
    let statements = document
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(|pair| compiler.statement(pair))
        .collect::<Result<Vec<_>>>()?;
    Ok(Mapping::new(statements, source))
}

/// Compiles a single expression.
pub fn parse_query(env: &Environment, source: &str) -> Result<Func> {
    let mut pairs = MaplingParser::parse(Rule::query, source)
        .map_err(|err| convert_parse_error(err, source))?;
    let compiler = Compiler::new(env, source);
    let expr = pairs
        .next()
        .and_then(|query| query.into_inner().find(|pair| pair.as_rule() == Rule::expr))
        .ok_or_else(|| compiler.error((0, source.len()), "expected an expression", "empty query"))?;
    compiler.expr(expr)
}

// ============================================================================
// COMPILER
// ============================================================================

/// An expression under construction. Plain references stay open so that trailing
/// `.field` segments extend their path instead of stacking lookups.
enum Node {
    Field(FieldFunction),
    Variable(VariableFunction),
    Func(Func),
}

impl Node {
    fn into_func(self) -> Func {
        match self {
            Node::Field(field) => Arc::new(field),
            Node::Variable(variable) => Arc::new(variable),
            Node::Func(func) => func,
        }
    }

    fn get(self, segment: String) -> Node {
        match self {
            Node::Field(field) => Node::Field(field.extended(segment)),
            Node::Variable(variable) => Node::Variable(variable.extended(segment)),
            Node::Func(func) => Node::Func(Arc::new(GetFunction::new(func, vec![segment]))),
        }
    }
}

struct Compiler<'e> {
    env: &'e Environment,
    source: &'e str,
    /// Names bound by the lambdas enclosing the expression being compiled.
    lambdas: RefCell<Vec<String>>,
    depth: Cell<usize>,
}

type Span = (usize, usize);

fn span_of(pair: &Pair<'_, Rule>) -> Span {
    let span = pair.as_span();
    (span.start(), span.end())
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_let
            | Rule::kw_meta
            | Rule::kw_root
            | Rule::kw_this
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_match
    )
}

/// Child pairs without the keyword tokens.
fn children<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|child| !is_keyword(child.as_rule()))
}

impl<'e> Compiler<'e> {
    fn new(env: &'e Environment, source: &'e str) -> Self {
        Self {
            env,
            source,
            lambdas: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    fn error(&self, span: Span, message: impl Into<String>, label: impl Into<String>) -> MappingError {
        MappingError::parse_error(SOURCE_NAME, self.source, span, message, label)
    }

    /// Reports a failure to compile a call at the span of the call.
    fn call_error(&self, err: MappingError, span: Span, kind: &str) -> MappingError {
        match err {
            MappingError::Parse { .. } => err,
            MappingError::Unknown { .. } => self
                .error(span, err.to_string(), format!("unknown {kind}"))
                .with_help(format!("run `mapling {kind}s` to list what is available")),
            other => self.error(span, other.to_string(), format!("in this {kind} call")),
        }
    }

    fn missing(&self, span: Span, what: &str) -> MappingError {
        self.error(span, format!("malformed {what}"), "here")
    }

    // ===== STATEMENTS =====

    fn statement(&self, pair: Pair<'_, Rule>) -> Result<Statement> {
        let line = pair.line_col().0;
        let span = span_of(&pair);
        let rule = pair.as_rule();
        let mut parts = children(pair);
        let (target, query) = match rule {
            Rule::let_stmt => {
                let name = parts.next().ok_or_else(|| self.missing(span, "let statement"))?;
                let name = self.segment(name)?;
                (AssignTarget::Variable(name), parts.next())
            }
            Rule::meta_stmt => {
                let first = parts.next().ok_or_else(|| self.missing(span, "meta statement"))?;
                if first.as_rule() == Rule::expr {
                    (AssignTarget::Meta(None), Some(first))
                } else {
                    (AssignTarget::Meta(Some(self.segment(first)?)), parts.next())
                }
            }
            _ => {
                let target = parts.next().ok_or_else(|| self.missing(span, "assignment"))?;
                (self.assign_target(target)?, parts.next())
            }
        };
        let query = query.ok_or_else(|| self.missing(span, "statement"))?;
        Ok(Statement {
            line,
            target,
            query: self.expr(query)?,
        })
    }

    fn assign_target(&self, pair: Pair<'_, Rule>) -> Result<AssignTarget> {
        let span = span_of(&pair);
        let mut parts = pair.into_inner();
        let head = parts
            .next()
            .and_then(|head| head.into_inner().next())
            .ok_or_else(|| self.missing(span, "assignment target"))?;
        let mut path = Vec::new();
        match head.as_rule() {
            Rule::kw_root => {}
            Rule::kw_this => {
                return Err(self
                    .error(span, "cannot assign to `this`", "assignment target")
                    .with_help("assign to `root` to build the new document"))
            }
            _ => path.push(self.segment(head)?),
        }
        for segment in parts {
            path.push(self.segment(segment)?);
        }
        Ok(AssignTarget::Root(path))
    }

    /// A field name, identifier or quoted string used as a path segment or key.
    fn segment(&self, pair: Pair<'_, Rule>) -> Result<String> {
        match pair.as_rule() {
            Rule::string => self.unescape(&pair),
            _ => Ok(pair.as_str().to_string()),
        }
    }

    fn unescape(&self, pair: &Pair<'_, Rule>) -> Result<String> {
        serde_json::from_str::<String>(pair.as_str()).map_err(|err| {
            self.error(span_of(pair), format!("invalid string literal: {err}"), "this string")
        })
    }

    // ===== EXPRESSIONS =====

    fn expr(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        Ok(self.node(pair)?.into_func())
    }

    fn node(&self, pair: Pair<'_, Rule>) -> Result<Node> {
        let depth = self.depth.get() + 1;
        let limit = self.env.max_depth();
        if depth > limit {
            return Err(self.error(
                span_of(&pair),
                format!("expression nesting exceeds the maximum depth of {limit}"),
                "too deeply nested",
            ));
        }
        self.depth.set(depth);
        let result = PRATT
            .map_primary(|primary| self.primary(primary))
            .map_prefix(|op, rhs| self.prefix(op, rhs?))
            .map_postfix(|lhs, op| self.postfix(lhs?, op))
            .map_infix(|lhs, op, rhs| self.infix(lhs?, op, rhs?))
            .parse(pair.into_inner());
        self.depth.set(depth - 1);
        result
    }

    fn prefix(&self, op: Pair<'_, Rule>, operand: Node) -> Result<Node> {
        let operand = operand.into_func();
        let folded = operand.literal().and_then(|value| match op.as_rule() {
            Rule::op_neg => negate(value),
            _ => value.as_bool().map(|b| Value::Bool(!b)),
        });
        if let Some(value) = folded {
            return Ok(Node::Func(Literal::func(value)));
        }
        Ok(Node::Func(match op.as_rule() {
            Rule::op_neg => Arc::new(NegateFunction::new(operand)),
            _ => Arc::new(NotFunction::new(operand)),
        }))
    }

    fn postfix(&self, target: Node, op: Pair<'_, Rule>) -> Result<Node> {
        let span = span_of(&op);
        let rule = op.as_rule();
        let mut parts = op.into_inner();
        let name = parts.next().ok_or_else(|| self.missing(span, "path"))?;
        if rule == Rule::field_access {
            return Ok(target.get(self.segment(name)?));
        }
        let args = match parts.next() {
            Some(args) => self.call_args(args)?,
            None => Vec::new(),
        };
        self.env
            .methods()
            .init(name.as_str(), target.into_func(), args)
            .map(Node::Func)
            .map_err(|err| self.call_error(err, span, "method"))
    }

    fn infix(&self, left: Node, op: Pair<'_, Rule>, right: Node) -> Result<Node> {
        let (left, right) = (left.into_func(), right.into_func());
        let op = match op.as_rule() {
            Rule::op_coalesce => {
                return Ok(Node::Func(Arc::new(CoalesceFunction::new(left, right))))
            }
            Rule::op_or => Op::Or,
            Rule::op_and => Op::And,
            Rule::op_eq => Op::Eq,
            Rule::op_neq => Op::Neq,
            Rule::op_gt => Op::Gt,
            Rule::op_gte => Op::Gte,
            Rule::op_lt => Op::Lt,
            Rule::op_lte => Op::Lte,
            Rule::op_add => Op::Add,
            Rule::op_sub => Op::Sub,
            Rule::op_mul => Op::Mul,
            Rule::op_div => Op::Div,
            _ => Op::Mod,
        };
        Ok(Node::Func(Arc::new(ArithmeticFunction::new(op, left, right))))
    }

    fn primary(&self, pair: Pair<'_, Rule>) -> Result<Node> {
        let span = span_of(&pair);
        let func: Func = match pair.as_rule() {
            Rule::null_lit => Literal::func(Value::Null),
            Rule::bool_lit => Literal::func(Value::Bool(pair.as_str() == "true")),
            Rule::number => Literal::func(self.number(&pair)?),
            Rule::string => Literal::func(Value::String(self.unescape(&pair)?)),
            Rule::raw_string => {
                let text = pair.into_inner().next().map(|inner| inner.as_str()).unwrap_or("");
                Literal::func(Value::from(text))
            }
            Rule::array => self.array(pair)?,
            Rule::object => self.object(pair)?,
            Rule::if_expr => self.if_expr(pair)?,
            Rule::match_expr => self.match_expr(pair)?,
            Rule::function_call => self.function_call(pair)?,
            Rule::variable => {
                let name = pair.into_inner().next().ok_or_else(|| self.missing(span, "variable"))?;
                return Ok(Node::Variable(VariableFunction::new(name.as_str(), Vec::new())));
            }
            Rule::metadata => {
                let key = match pair.into_inner().next() {
                    Some(key) => Some(self.segment(key)?),
                    None => None,
                };
                Arc::new(MetadataFunction::new(key))
            }
            Rule::root_ref => return Ok(Node::Field(FieldFunction::new(FieldScope::Root, Vec::new()))),
            Rule::this_ref => return Ok(Node::Field(FieldFunction::new(FieldScope::Value, Vec::new()))),
            Rule::bare_path => return Ok(Node::Field(self.bare_path(pair.as_str()))),
            Rule::paren => {
                let inner = pair.into_inner().next().ok_or_else(|| self.missing(span, "group"))?;
                return self.node(inner);
            }
            other => {
                return Err(self.error(span, format!("unexpected {other:?}"), "not an expression"))
            }
        };
        Ok(Node::Func(func))
    }

    /// A bare name is a lambda parameter when one is in scope, otherwise a field of `this`.
    fn bare_path(&self, name: &str) -> FieldFunction {
        if self.lambdas.borrow().iter().any(|bound| bound == name) {
            FieldFunction::new(FieldScope::Named(name.to_string()), Vec::new())
        } else {
            FieldFunction::new(FieldScope::Value, vec![name.to_string()])
        }
    }

    fn number(&self, pair: &Pair<'_, Rule>) -> Result<Value> {
        let text = pair.as_str();
        let invalid = || self.error(span_of(pair), format!("invalid number `{text}`"), "this number");
        if text.contains(['.', 'e', 'E']) {
            return text.parse::<f64>().map(Value::Float).map_err(|_| invalid());
        }
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Int(int));
        }
        if let Ok(uint) = text.parse::<u64>() {
            return Ok(Value::UInt(uint));
        }
        text.parse::<f64>().map(Value::Float).map_err(|_| invalid())
    }

    // ===== CONSTRUCTORS =====

    fn array(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        let items = pair
            .into_inner()
            .map(|item| self.expr(item))
            .collect::<Result<Vec<_>>>()?;
        if items.iter().all(|item| item.literal().is_some()) {
            let values: Array = items
                .iter()
                .filter_map(|item| item.literal().cloned())
                .filter(|value| !value.is_sentinel())
                .collect();
            return Ok(Literal::func(Value::Array(values)));
        }
        Ok(Arc::new(ArrayLiteral::new(items)))
    }

    fn object(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        let mut entries = Vec::new();
        for entry in pair.into_inner() {
            let span = span_of(&entry);
            let mut parts = entry.into_inner();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                return Err(self.missing(span, "object entry"));
            };
            let key = self.expr(key)?;
            if let Some(literal) = key.literal() {
                if !matches!(literal, Value::String(_)) {
                    return Err(self.error(
                        span,
                        format!("object keys must be strings, got {}", literal.type_name()),
                        "this key",
                    ));
                }
            }
            entries.push((key, self.expr(value)?));
        }

        let folded: Option<Object> = entries
            .iter()
            .map(|(key, value)| match (key.literal(), value.literal()) {
                (Some(Value::String(key)), Some(value)) => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect();
        if let Some(object) = folded {
            return Ok(Literal::func(Value::Object(object)));
        }
        Ok(Arc::new(ObjectLiteral::new(entries)))
    }

    // ===== CONTROL FLOW =====

    fn if_expr(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        for part in pair.into_inner() {
            let span = span_of(&part);
            let rule = part.as_rule();
            let mut exprs = children(part);
            if rule == Rule::else_block {
                let body = exprs.next().ok_or_else(|| self.missing(span, "else block"))?;
                otherwise = Some(self.expr(body)?);
                continue;
            }
            let (Some(condition), Some(body)) = (exprs.next(), exprs.next()) else {
                return Err(self.missing(span, "if branch"));
            };
            branches.push((self.expr(condition)?, self.expr(body)?));
        }
        Ok(Arc::new(IfFunction::new(branches, otherwise)))
    }

    fn match_expr(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        let mut subject = None;
        let mut cases = Vec::new();
        for part in children(pair) {
            let span = span_of(&part);
            if part.as_rule() == Rule::expr {
                subject = Some(self.expr(part)?);
                continue;
            }
            let mut sides = part.into_inner();
            let (Some(case), Some(body)) = (sides.next(), sides.next()) else {
                return Err(self.missing(span, "match case"));
            };
            let case = match case.as_rule() {
                Rule::wildcard => MatchCase::Wildcard,
                _ => MatchCase::from_query(self.expr(case)?),
            };
            cases.push((case, self.expr(body)?));
        }
        Ok(Arc::new(MatchFunction::new(subject, cases)))
    }

    // ===== CALLS =====

    fn function_call(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        let span = span_of(&pair);
        let mut parts = pair.into_inner();
        let name = parts.next().ok_or_else(|| self.missing(span, "function call"))?;
        let args = match parts.next() {
            Some(args) => self.call_args(args)?,
            None => Vec::new(),
        };
        self.env
            .functions()
            .init(name.as_str(), args)
            .map_err(|err| self.call_error(err, span, "function"))
    }

    fn call_args(&self, pair: Pair<'_, Rule>) -> Result<Vec<CallArg>> {
        pair.into_inner()
            .map(|arg| match arg.as_rule() {
                Rule::named_arg => {
                    let span = span_of(&arg);
                    let mut parts = arg.into_inner();
                    let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                        return Err(self.missing(span, "named argument"));
                    };
                    Ok(CallArg::named(name.as_str(), self.argument(value)?))
                }
                _ => Ok(CallArg::positional(self.argument(arg)?)),
            })
            .collect()
    }

    fn argument(&self, pair: Pair<'_, Rule>) -> Result<Func> {
        if pair.as_rule() != Rule::lambda {
            return self.expr(pair);
        }
        let span = span_of(&pair);
        let mut parts = pair.into_inner();
        let (Some(name), Some(body)) = (parts.next(), parts.next()) else {
            return Err(self.missing(span, "lambda"));
        };
        let name = name.as_str().to_string();
        self.lambdas.borrow_mut().push(name.clone());
        let body = self.expr(body);
        self.lambdas.borrow_mut().pop();
        Ok(Arc::new(LambdaFunction::new(name, body?)))
    }
}

// ============================================================================
// ERROR CONVERSION
// ============================================================================

fn describe(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".into(),
        Rule::expr | Rule::paren => "an expression".into(),
        Rule::let_stmt | Rule::meta_stmt | Rule::assign_stmt | Rule::assign_target => {
            "a statement".into()
        }
        Rule::ident | Rule::field_name => "a name".into(),
        Rule::string | Rule::raw_string => "a string".into(),
        Rule::number => "a number".into(),
        Rule::call_args => "`(`".into(),
        Rule::match_case => "a match case".into(),
        Rule::object_entry => "an object entry".into(),
        Rule::named_arg | Rule::lambda => "an argument".into(),
        Rule::op_or => "`||`".into(),
        Rule::op_and => "`&&`".into(),
        Rule::op_coalesce => "`|`".into(),
        Rule::op_eq => "`==`".into(),
        Rule::op_neq => "`!=`".into(),
        Rule::op_gte => "`>=`".into(),
        Rule::op_lte => "`<=`".into(),
        Rule::op_gt => "`>`".into(),
        Rule::op_lt => "`<`".into(),
        Rule::op_add => "`+`".into(),
        Rule::op_sub => "`-`".into(),
        Rule::op_mul => "`*`".into(),
        Rule::op_div => "`/`".into(),
        Rule::op_mod => "`%`".into(),
        Rule::method_call | Rule::field_access => "`.`".into(),
        other => format!("{other:?}").replace('_', " "),
    }
}

fn describe_all(rules: &[Rule]) -> String {
    let mut names: Vec<String> = Vec::new();
    for rule in rules {
        let name = describe(rule);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    match names.len() {
        0 => String::new(),
        1 => names.remove(0),
        _ => {
            let last = names.pop().unwrap_or_default();
            format!("{} or {last}", names.join(", "))
        }
    }
}

fn convert_parse_error(error: pest::error::Error<Rule>, source: &str) -> MappingError {
    let span = match error.location {
        InputLocation::Pos(pos) => (pos, (pos + 1).min(source.len())),
        InputLocation::Span((start, end)) => (start, end),
    };
    let message = match &error.variant {
        ErrorVariant::ParsingError {
            positives,
            negatives,
        } => match (positives.is_empty(), negatives.is_empty()) {
            (false, _) => format!("expected {}", describe_all(positives)),
            (true, false) => format!("unexpected {}", describe_all(negatives)),
            (true, true) => "unexpected input".to_string(),
        },
        ErrorVariant::CustomError { message } => message.clone(),
    };
    log::trace!("pest error: {error}");
    MappingError::parse_error(SOURCE_NAME, source, span, message, "here")
}
