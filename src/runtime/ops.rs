//! Operators: arithmetic, comparison, boolean logic, negation and coalescing.
//!
//! ## Typing Rules
//!
//! - `+ - *` on two integers stay integral and fall back to a float on overflow
//! - any float operand yields a float
//! - `/` always divides as floats, then applies the lossless integer cast
//! - `%` requires integers
//! - `+` also concatenates two strings or two byte sequences
//! - `> >= < <=` compare numbers with numbers and strings with strings
//! - `==` and `!=` compare any pair structurally
//!
//! Anything else is a type mismatch naming both operands and where they came from.

use std::cmp::Ordering;
use std::fmt;

use crate::errors::{MappingError, Result, TypeMismatchError};
use crate::runtime::context::FunctionContext;
use crate::runtime::function::{exec_child, union_targets, Func, Function};
use crate::runtime::targets::{TargetPath, TargetsContext};
use crate::value::number::combine;
use crate::value::{float_to_value, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Eq => "==",
            Op::Neq => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::And => "&&",
            Op::Or => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Op> {
        Some(match symbol {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "%" => Op::Mod,
            "==" => Op::Eq,
            "!=" => Op::Neq,
            ">" => Op::Gt,
            ">=" => Op::Gte,
            "<" => Op::Lt,
            "<=" => Op::Lte,
            "&&" => Op::And,
            "||" => Op::Or,
            _ => return None,
        })
    }

    /// The verb used in type mismatch messages.
    fn verb(&self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "subtract",
            Op::Mul => "multiply",
            Op::Div => "divide",
            Op::Mod => "modulo",
            Op::And | Op::Or => "combine",
            _ => "compare",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// BINARY OPERATORS
// ============================================================================

pub struct ArithmeticFunction {
    op: Op,
    left: Func,
    right: Func,
}

impl ArithmeticFunction {
    pub fn new(op: Op, left: Func, right: Func) -> Self {
        Self { op, left, right }
    }

    fn mismatch(&self, left: &Value, right: &Value) -> MappingError {
        TypeMismatchError::new(
            self.op.verb(),
            left,
            self.left.as_ref(),
            right,
            self.right.as_ref(),
        )
        .into()
    }

    fn boolean(&self, value: Value, from: &Func) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(MappingError::expected("bool", &other).annotate(from.annotation())),
        }
    }

    fn apply(&self, left: Value, right: Value) -> Result<Value> {
        let result = match self.op {
            Op::Add => match (&left, &right) {
                (Value::String(a), Value::String(b)) => Some(Value::String(format!("{a}{b}"))),
                (Value::Bytes(a), Value::Bytes(b)) => {
                    Some(Value::Bytes([a.as_slice(), b.as_slice()].concat()))
                }
                _ => combine(&left, &right, i64::checked_add, |a, b| a + b),
            },
            Op::Sub => combine(&left, &right, i64::checked_sub, |a, b| a - b),
            Op::Mul => combine(&left, &right, i64::checked_mul, |a, b| a * b),
            Op::Div => match (left.as_f64(), right.as_f64()) {
                (Some(_), Some(divisor)) if divisor == 0.0 => {
                    return Err(MappingError::general("attempted to divide by zero"))
                }
                (Some(a), Some(b)) => Some(float_to_value(a / b)),
                _ => None,
            },
            Op::Mod => match (integral(&left), integral(&right)) {
                (Some(_), Some(0)) => {
                    return Err(MappingError::general("attempted to modulo by zero"))
                }
                (Some(a), Some(b)) => Some(Value::Int(a.wrapping_rem(b))),
                _ => None,
            },
            Op::Eq => Some(Value::Bool(left == right)),
            Op::Neq => Some(Value::Bool(left != right)),
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                let comparable = (left.is_number() && right.is_number())
                    || matches!((&left, &right), (Value::String(_), Value::String(_)));
                if comparable {
                    let ordering = left.compare(&right);
                    Some(Value::Bool(matches!(
                        (self.op, ordering),
                        (Op::Gt, Some(Ordering::Greater))
                            | (Op::Gte, Some(Ordering::Greater | Ordering::Equal))
                            | (Op::Lt, Some(Ordering::Less))
                            | (Op::Lte, Some(Ordering::Less | Ordering::Equal))
                    )))
                } else {
                    None
                }
            }
            Op::And | Op::Or => match (&left, &right) {
                (Value::Bool(a), Value::Bool(b)) if self.op == Op::And => Some(Value::Bool(*a && *b)),
                (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(*a || *b)),
                _ => None,
            },
        };
        result.ok_or_else(|| self.mismatch(&left, &right))
    }
}

/// Integers, and floats without a fractional part, as `i64`.
fn integral(value: &Value) -> Option<i64> {
    if value.is_number() {
        value.as_i64()
    } else {
        None
    }
}

impl Function for ArithmeticFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let left = exec_child(self.left.as_ref(), ctx)?;
        match self.op {
            Op::And if !self.boolean(left.clone(), &self.left)? => return Ok(Value::Bool(false)),
            Op::Or if self.boolean(left.clone(), &self.left)? => return Ok(Value::Bool(true)),
            Op::And | Op::Or => {
                let right = exec_child(self.right.as_ref(), ctx)?;
                return Ok(Value::Bool(self.boolean(right, &self.right)?));
            }
            _ => {}
        }
        let right = exec_child(self.right.as_ref(), ctx)?;
        self.apply(left, right)
    }

    fn annotation(&self) -> String {
        format!("`{}` expression", self.op)
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = union_targets(&ctx, [&self.left, &self.right]);
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.left.close()?;
        self.right.close()
    }
}

/// `a | b`: the right side replaces a left side that fails or yields `null` or `nothing`.
pub struct CoalesceFunction {
    left: Func,
    right: Func,
}

impl CoalesceFunction {
    pub fn new(left: Func, right: Func) -> Self {
        Self { left, right }
    }
}

impl Function for CoalesceFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        match self.left.exec(ctx) {
            Ok(Value::Null | Value::Nothing) | Err(_) => exec_child(self.right.as_ref(), ctx),
            Ok(value) => Ok(value),
        }
    }

    fn annotation(&self) -> String {
        format!("coalesce of {}", self.left.annotation())
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = union_targets(&ctx, [&self.left, &self.right]);
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.left.close()?;
        self.right.close()
    }
}

// ============================================================================
// UNARY OPERATORS
// ============================================================================

/// `!expr`
pub struct NotFunction {
    inner: Func,
}

impl NotFunction {
    pub fn new(inner: Func) -> Self {
        Self { inner }
    }
}

impl Function for NotFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        match exec_child(self.inner.as_ref(), ctx)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(MappingError::expected("bool", &other).annotate(self.inner.annotation())),
        }
    }

    fn annotation(&self) -> String {
        format!("not {}", self.inner.annotation())
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = self.inner.query_targets(ctx.clone()).1;
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

/// `-expr`
pub struct NegateFunction {
    inner: Func,
}

impl NegateFunction {
    pub fn new(inner: Func) -> Self {
        Self { inner }
    }
}

pub(crate) fn negate(value: &Value) -> Option<Value> {
    Some(match value {
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(*i as f64))),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::Int(-i),
            Err(_) if *u == i64::MIN.unsigned_abs() => Value::Int(i64::MIN),
            Err(_) => Value::Float(-(*u as f64)),
        },
        Value::Float(f) => Value::Float(-f),
        _ => return None,
    })
}

impl Function for NegateFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let value = exec_child(self.inner.as_ref(), ctx)?;
        negate(&value).ok_or_else(|| {
            MappingError::expected("number", &value).annotate(self.inner.annotation())
        })
    }

    fn annotation(&self) -> String {
        format!("negated {}", self.inner.annotation())
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = self.inner.query_targets(ctx.clone()).1;
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::field::FieldFunction;
    use crate::runtime::function::Literal;
    use std::sync::Arc;

    fn lit(v: impl Into<Value>) -> Func {
        Literal::func(v.into())
    }

    fn run(op: Op, left: Func, right: Func) -> Result<Value> {
        ArithmeticFunction::new(op, left, right).exec(&FunctionContext::empty())
    }

    #[test]
    fn integer_arithmetic_overflows_into_floats() {
        assert!(matches!(run(Op::Add, lit(2i64), lit(3i64)).unwrap(), Value::Int(5)));
        assert!(matches!(
            run(Op::Add, lit(i64::MAX), lit(1i64)).unwrap(),
            Value::Float(_)
        ));
        assert!(matches!(run(Op::Mul, lit(2i64), lit(1.5)).unwrap(), Value::Float(f) if f == 3.0));
    }

    #[test]
    fn division_applies_the_lossless_cast() {
        assert!(matches!(run(Op::Div, lit(6i64), lit(3i64)).unwrap(), Value::Int(2)));
        assert!(matches!(run(Op::Div, lit(7i64), lit(2i64)).unwrap(), Value::Float(f) if f == 3.5));
        assert!(run(Op::Div, lit(1i64), lit(0i64)).is_err());
    }

    #[test]
    fn strings_and_bytes_concatenate() {
        assert_eq!(run(Op::Add, lit("foo"), lit("bar")).unwrap(), Value::from("foobar"));
        assert_eq!(
            run(Op::Add, lit(b"ab".to_vec()), lit(b"c".to_vec())).unwrap(),
            Value::Bytes(b"abc".to_vec())
        );
    }

    #[test]
    fn mismatches_name_both_operands() {
        let doc = Value::from_json_str(r#"{"n":"five"}"#).unwrap();
        let err = ArithmeticFunction::new(Op::Add, Arc::new(FieldFunction::this(&["n"])), lit(1i64))
            .exec(&FunctionContext::for_value(&doc))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot add types string (from field `this.n`) and number (from number literal)"
        );
        assert!(err.as_type_mismatch().is_some());
    }

    #[test]
    fn comparisons_are_typed() {
        assert_eq!(run(Op::Gt, lit(3i64), lit(2.5)).unwrap(), Value::Bool(true));
        assert_eq!(run(Op::Lte, lit("a"), lit("b")).unwrap(), Value::Bool(true));
        assert!(run(Op::Lt, lit("a"), lit(1i64)).is_err());
        assert_eq!(run(Op::Eq, lit(1i64), lit(1.0)).unwrap(), Value::Bool(true));
        assert_eq!(run(Op::Neq, lit("a"), lit(1i64)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn boolean_operators_short_circuit() {
        let failing: Func = Arc::new(FieldFunction::this(&["x"]));
        assert_eq!(run(Op::And, lit(false), failing.clone()).unwrap(), Value::Bool(false));
        assert_eq!(run(Op::Or, lit(true), failing.clone()).unwrap(), Value::Bool(true));
        assert!(run(Op::And, lit(true), failing).is_err());
        assert!(run(Op::Or, lit(1i64), lit(true)).is_err());
    }

    #[test]
    fn coalesce_recovers_from_errors_and_nulls() {
        let ctx = FunctionContext::empty();
        let failing: Func = Arc::new(FieldFunction::this(&["x"]));
        let coalesce = CoalesceFunction::new(failing, lit("fallback"));
        assert_eq!(coalesce.exec(&ctx).unwrap(), Value::from("fallback"));
        let null_left = CoalesceFunction::new(lit(Value::Null), lit(1i64));
        assert_eq!(null_left.exec(&ctx).unwrap(), Value::from(1i64));
        let kept = CoalesceFunction::new(lit(false), lit(1i64));
        assert_eq!(kept.exec(&ctx).unwrap(), Value::Bool(false));
    }

    #[test]
    fn negation_keeps_integers() {
        assert!(matches!(negate(&Value::Int(5)), Some(Value::Int(-5))));
        assert!(matches!(negate(&Value::Int(i64::MIN)), Some(Value::Float(_))));
        assert!(matches!(negate(&Value::UInt(1 << 63)), Some(Value::Int(i64::MIN))));
        assert!(matches!(negate(&Value::UInt(u64::MAX)), Some(Value::Float(_))));
        assert!(negate(&Value::from("x")).is_none());
    }
}
