//! Built-in operators of the default grammar.
//!
//! | Symbol | Weight | Meaning |
//! |---|---|---|
//! | `&&` `\|\|` | 10 | short-circuit, yields the deciding operand |
//! | `==` `!=` `<` `<=` `>` `>=` `in` | 20 | comparison, membership |
//! | `+` `-` | 30 | addition / concatenation, subtraction |
//! | `*` `/` `//` `%` | 40 | multiplication, division, floor division, remainder |
//! | `^` | 50 | power |
//! | `!` | unary | logical not |

use std::cmp::Ordering;

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{evaluator::EvalError, grammar::Grammar, value::Value};

/// Arithmetic operations with integer preservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Remainder,
}

impl Arith {
    fn verb(self) -> &'static str {
        match self {
            Arith::Add => "add",
            Arith::Subtract => "subtract",
            Arith::Multiply => "multiply",
            Arith::Divide | Arith::FloorDivide => "divide",
            Arith::Remainder => "compute remainder of",
        }
    }
}

pub(crate) fn install(grammar: &mut Grammar) {
    grammar.add_short_circuit_op("&&", 10, |left| {
        (!left.is_truthy()).then(|| left.clone())
    });
    grammar.add_short_circuit_op("||", 10, |left| left.is_truthy().then(|| left.clone()));

    grammar.add_binary_op("==", 20, |l, r| Ok(Value::Boolean(loose_eq(l, r))));
    grammar.add_binary_op("!=", 20, |l, r| Ok(Value::Boolean(!loose_eq(l, r))));
    grammar.add_binary_op("<", 20, |l, r| Ok(compare(l, r, Ordering::is_lt)));
    grammar.add_binary_op("<=", 20, |l, r| Ok(compare(l, r, Ordering::is_le)));
    grammar.add_binary_op(">", 20, |l, r| Ok(compare(l, r, Ordering::is_gt)));
    grammar.add_binary_op(">=", 20, |l, r| Ok(compare(l, r, Ordering::is_ge)));
    grammar.add_binary_op("in", 20, |l, r| Ok(Value::Boolean(contains(r, l))));

    grammar.add_binary_op("+", 30, add);
    grammar.add_binary_op("-", 30, |l, r| arithmetic(Arith::Subtract, l, r));
    grammar.add_binary_op("*", 40, |l, r| arithmetic(Arith::Multiply, l, r));
    grammar.add_binary_op("/", 40, |l, r| arithmetic(Arith::Divide, l, r));
    grammar.add_binary_op("//", 40, |l, r| arithmetic(Arith::FloorDivide, l, r));
    grammar.add_binary_op("%", 40, |l, r| arithmetic(Arith::Remainder, l, r));
    grammar.add_binary_op("^", 50, power);

    grammar.add_unary_op("!", |operand| Ok(Value::Boolean(!operand.is_truthy())));
}

/// `+`: concatenation when either side is a string, numeric addition otherwise.
pub fn add(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::String(format!("{}{}", left.to_text(), right.to_text())))
        }
        _ => arithmetic(Arith::Add, left, right),
    }
}

/// Apply an arithmetic operation after numeric coercion of both operands.
///
/// Integer operands stay integers as long as the result is whole and fits;
/// mixed integer/float operands go through decimal arithmetic so that
/// `0.1 + 2` does not pick up binary rounding noise.
pub fn arithmetic(op: Arith, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (l, r) = (left.to_number(), right.to_number());
    match (&l, &r) {
        (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(op, *a, *b),
        (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => {
            let (a, b) = (l.as_float().unwrap_or(f64::NAN), r.as_float().unwrap_or(f64::NAN));
            if let Some(result) = decimal_arithmetic(op, a, b)? {
                return Ok(result);
            }
            float_arithmetic(op, a, b)
        }
        (Value::Float(a), Value::Float(b)) => float_arithmetic(op, *a, *b),
        _ => Err(EvalError::Type(format!(
            "Cannot {} {} and {}",
            op.verb(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn integer_arithmetic(op: Arith, a: i64, b: i64) -> Result<Value, EvalError> {
    if b == 0 && matches!(op, Arith::Divide | Arith::FloorDivide | Arith::Remainder) {
        return Err(EvalError::DivisionByZero);
    }
    let exact = match op {
        Arith::Add => a.checked_add(b),
        Arith::Subtract => a.checked_sub(b),
        Arith::Multiply => a.checked_mul(b),
        // Inexact or overflowing quotients fall through to floats
        Arith::Divide => a
            .checked_rem(b)
            .is_some_and(|r| r == 0)
            .then(|| a.checked_div(b))
            .flatten(),
        Arith::FloorDivide => a.checked_div(b).map(|q| {
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }),
        Arith::Remainder => a.checked_rem(b),
    };
    match exact {
        Some(n) => Ok(Value::Integer(n)),
        None => float_arithmetic(op, a as f64, b as f64),
    }
}

fn decimal_arithmetic(op: Arith, a: f64, b: f64) -> Result<Option<Value>, EvalError> {
    let (Some(ad), Some(bd)) = (Decimal::from_f64(a), Decimal::from_f64(b)) else {
        return Ok(None);
    };
    if bd.is_zero() && matches!(op, Arith::Divide | Arith::FloorDivide | Arith::Remainder) {
        return Err(EvalError::DivisionByZero);
    }
    let rd = match op {
        Arith::Add => ad.checked_add(bd),
        Arith::Subtract => ad.checked_sub(bd),
        Arith::Multiply => ad.checked_mul(bd),
        Arith::Divide => ad.checked_div(bd),
        Arith::FloorDivide => ad.checked_div(bd).map(|q| q.floor()),
        Arith::Remainder => ad.checked_rem(bd),
    };
    let Some(rd) = rd else {
        return Ok(None);
    };
    if rd.is_integer()
        && let Some(r) = rd.to_i64()
    {
        return Ok(Some(Value::Integer(r)));
    }
    Ok(rd.to_f64().map(Value::Float))
}

fn float_arithmetic(op: Arith, a: f64, b: f64) -> Result<Value, EvalError> {
    if b == 0.0 && matches!(op, Arith::Divide | Arith::FloorDivide | Arith::Remainder) {
        return Err(EvalError::DivisionByZero);
    }
    Ok(match op {
        Arith::Add => Value::Float(a + b),
        Arith::Subtract => Value::Float(a - b),
        Arith::Multiply => Value::Float(a * b),
        Arith::Divide => Value::Float(a / b),
        Arith::FloorDivide => whole((a / b).floor()),
        Arith::Remainder => Value::Float(a % b),
    })
}

/// A float that holds a whole number in `i64` range becomes an integer.
pub fn whole(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Value::Integer(n as i64)
    } else {
        Value::Float(n)
    }
}

/// `^`: exponentiation.
pub fn power(base: &Value, exponent: &Value) -> Result<Value, EvalError> {
    match (base.to_number(), exponent.to_number()) {
        (Value::Integer(b), Value::Integer(e)) if (0..=u32::MAX as i64).contains(&e) => {
            match b.checked_pow(e as u32) {
                Some(n) => Ok(Value::Integer(n)),
                None => Ok(Value::Float((b as f64).powf(e as f64))),
            }
        }
        (b, e) => {
            let (b, e) = (b.as_float().unwrap_or(f64::NAN), e.as_float().unwrap_or(f64::NAN));
            Ok(Value::Float(b.powf(e)))
        }
    }
}

/// `==`: structural equality where `null` and `undefined` are equal.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    (left.is_nullish() && right.is_nullish()) || left == right
}

/// Relational comparison. Two strings compare lexicographically; anything
/// else is compared numerically, and `NaN` never satisfies the predicate.
pub fn compare(left: &Value, right: &Value, predicate: fn(Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            let a = left.to_number().as_float().unwrap_or(f64::NAN);
            let b = right.to_number().as_float().unwrap_or(f64::NAN);
            a.partial_cmp(&b)
        }
    };
    Value::Boolean(ordering.is_some_and(predicate))
}

/// `in`: substring containment or array membership.
pub fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&needle.to_text()),
        Value::Array(items) => items.iter().any(|item| item == needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integer() {
        assert_eq!(arithmetic(Arith::Add, &Value::Integer(2), &Value::Integer(3)), Ok(Value::Integer(5)));
        assert_eq!(arithmetic(Arith::Divide, &Value::Integer(8), &Value::Integer(2)), Ok(Value::Integer(4)));
        assert_eq!(arithmetic(Arith::Divide, &Value::Integer(7), &Value::Integer(2)), Ok(Value::Float(3.5)));
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        assert_eq!(arithmetic(Arith::FloorDivide, &Value::Integer(7), &Value::Integer(2)), Ok(Value::Integer(3)));
        assert_eq!(arithmetic(Arith::FloorDivide, &Value::Integer(-7), &Value::Integer(2)), Ok(Value::Integer(-4)));
        assert_eq!(arithmetic(Arith::FloorDivide, &Value::Float(7.5), &Value::Integer(2)), Ok(Value::Integer(3)));
    }

    #[test]
    fn overflowing_integer_division_becomes_float() {
        let min = Value::Integer(i64::MIN);
        let minus_one = Value::Integer(-1);
        let flipped = Value::Float(-(i64::MIN as f64));
        assert_eq!(arithmetic(Arith::Divide, &min, &minus_one), Ok(flipped.clone()));
        assert_eq!(arithmetic(Arith::FloorDivide, &min, &minus_one), Ok(flipped));
        assert_eq!(arithmetic(Arith::Remainder, &min, &minus_one), Ok(Value::Float(-0.0)));
    }

    #[test]
    fn mixed_arithmetic_uses_decimals() {
        assert_eq!(arithmetic(Arith::Add, &Value::Float(0.1), &Value::Float(0.2)), Ok(Value::Float(0.1 + 0.2)));
        assert_eq!(arithmetic(Arith::Add, &Value::Integer(2), &Value::Float(0.1)), Ok(Value::Float(2.1)));
        assert_eq!(arithmetic(Arith::Multiply, &Value::Float(2.5), &Value::Integer(2)), Ok(Value::Integer(5)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(arithmetic(Arith::Divide, &Value::Integer(1), &Value::Integer(0)), Err(EvalError::DivisionByZero));
        assert_eq!(arithmetic(Arith::Remainder, &Value::Float(1.0), &Value::Float(0.0)), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn addition_concatenates_strings() {
        assert_eq!(add(&Value::from("a"), &Value::Integer(8)), Ok(Value::from("a8")));
        assert_eq!(add(&Value::Boolean(true), &Value::Integer(1)), Ok(Value::Integer(2)));
    }

    #[test]
    fn comparisons() {
        assert_eq!(compare(&Value::Integer(2), &Value::Float(1.5), Ordering::is_gt), Value::Boolean(true));
        assert_eq!(compare(&Value::from("abc"), &Value::from("abd"), Ordering::is_lt), Value::Boolean(true));
        assert_eq!(compare(&Value::Undefined, &Value::Integer(1), Ordering::is_lt), Value::Boolean(false));
        assert!(loose_eq(&Value::Null, &Value::Undefined));
        assert!(loose_eq(&Value::Integer(1), &Value::Float(1.0)));
    }

    #[test]
    fn membership() {
        assert!(contains(&Value::from("foobartek"), &Value::from("bar")));
        assert!(!contains(&Value::from("foobartek"), &Value::from("baz")));
        assert!(contains(&Value::array([Value::from("foo"), Value::from("bar")]), &Value::from("bar")));
        assert!(!contains(&Value::Undefined, &Value::from("bar")));
    }

    #[test]
    fn powers() {
        assert_eq!(power(&Value::Integer(2), &Value::Integer(10)), Ok(Value::Integer(1024)));
        assert_eq!(power(&Value::Integer(4), &Value::Float(0.5)), Ok(Value::Float(2.0)));
    }
}
