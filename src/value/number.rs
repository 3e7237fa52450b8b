//! Numeric coercion rules shared by arithmetic and the rounding methods.

use std::cmp::Ordering;

use super::Value;

/// 2^63 as a float, the first value above `i64::MAX`.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;

/// Casts a float to `i64` only when no information is lost: the float must be finite,
/// have no fractional part and fit the signed 64-bit range.
pub fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Returns an `Int` when the float converts losslessly, otherwise the float itself.
pub fn float_to_value(f: f64) -> Value {
    match float_to_i64(f) {
        Some(i) => Value::Int(i),
        None => Value::Float(f),
    }
}

/// Compares two numeric values, keeping integer precision where both sides allow it.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::UInt(x), Value::UInt(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::UInt(y)) => Some(i128::from(*x).cmp(&i128::from(*y))),
        (Value::UInt(x), Value::Int(y)) => Some(i128::from(*x).cmp(&i128::from(*y))),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

/// Applies an integer operation when both operands are integers, falling back to the
/// float operation on overflow or when either operand is a float.
pub fn combine(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Option<Value> {
    if !a.is_number() || !b.is_number() {
        return None;
    }
    let both_integral = !matches!(a, Value::Float(_)) && !matches!(b, Value::Float(_));
    if both_integral {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            if let Some(r) = int_op(x, y) {
                return Some(Value::Int(r));
            }
        }
    }
    Some(Value::Float(float_op(a.as_f64()?, b.as_f64()?)))
}

/// Rounds a numeric value with `round_fn`, honouring the lossless integer cast rule.
pub fn round_with(value: &Value, round_fn: fn(f64) -> f64) -> Option<Value> {
    match value {
        Value::Int(_) | Value::UInt(_) => Some(value.clone()),
        Value::Float(f) => Some(float_to_value(round_fn(*f))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_floats_become_integers() {
        assert!(matches!(float_to_value(4.0), Value::Int(4)));
        assert!(matches!(float_to_value(-0.0), Value::Int(0)));
        assert!(matches!(float_to_value(-9_223_372_036_854_775_808.0), Value::Int(i64::MIN)));
    }

    #[test]
    fn lossy_floats_stay_floats() {
        assert!(matches!(float_to_value(4.5), Value::Float(_)));
        assert!(matches!(float_to_value(9_223_372_036_854_775_808.0), Value::Float(_)));
        assert!(matches!(float_to_value(1e300), Value::Float(_)));
        assert!(matches!(float_to_value(f64::NAN), Value::Float(_)));
        assert!(matches!(float_to_value(f64::INFINITY), Value::Float(_)));
    }

    #[test]
    fn rounding_keeps_the_invariant() {
        assert!(matches!(round_with(&Value::Float(1.2), f64::ceil), Some(Value::Int(2))));
        assert!(matches!(round_with(&Value::Float(-1.2), f64::floor), Some(Value::Int(-2))));
        assert!(matches!(round_with(&Value::Float(2.5), f64::round), Some(Value::Int(3))));
        assert!(matches!(round_with(&Value::Float(1e20), f64::round), Some(Value::Float(_))));
        assert!(matches!(round_with(&Value::Int(7), f64::round), Some(Value::Int(7))));
        assert!(round_with(&Value::from("7"), f64::round).is_none());
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let sum = combine(&Value::Int(i64::MAX), &Value::Int(1), i64::checked_add, |a, b| a + b);
        assert!(matches!(sum, Some(Value::Float(_))));
        let sum = combine(&Value::Int(2), &Value::Int(3), i64::checked_add, |a, b| a + b);
        assert!(matches!(sum, Some(Value::Int(5))));
        let sum = combine(&Value::Int(2), &Value::Float(0.5), i64::checked_add, |a, b| a + b);
        assert!(matches!(sum, Some(Value::Float(f)) if f == 2.5));
    }
}
