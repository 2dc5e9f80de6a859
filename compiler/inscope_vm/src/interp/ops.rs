//! Operator semantics.
//!
//! Ints are 64-bit and checked: overflow raises `OverflowError` instead of
//! promoting. Mixed int/float arithmetic widens to float; bools act as ints.

use std::cmp::Ordering;
use std::rc::Rc;

use inscope_ir::ast::{BinaryOp, CompareOp, UnaryOp};

use crate::errors::{
    integer_overflow, type_error, unsupported_operands, zero_division, VmError,
};
use crate::value::{Key, Number, Value};

#[inline]
fn checked_arith(result: Option<i64>, operation: &'static str) -> Result<Value, VmError> {
    result.map(Value::Int).ok_or_else(|| integer_overflow(operation))
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, VmError> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => int_binary(op, a, b),
            _ => float_binary(op, a.to_f64(), b.to_f64()),
        };
    }
    let unsupported = || unsupported_operands(op.as_symbol(), left, right);
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::Str(Rc::from(joined)))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Mul, seq, Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), seq) => {
            repeat(seq, *n).ok_or_else(unsupported)
        }
        _ => Err(unsupported()),
    }
}

fn repeat(seq: &Value, times: i64) -> Option<Value> {
    let times = usize::try_from(times).unwrap_or(0);
    match seq {
        Value::Str(s) => Some(Value::str(&s.repeat(times))),
        Value::List(items) => {
            let items = items.borrow();
            Some(Value::list(
                items.iter().cycle().take(items.len() * times).cloned().collect(),
            ))
        }
        Value::Tuple(items) => Some(Value::Tuple(
            items.iter().cycle().take(items.len() * times).cloned().collect(),
        )),
        _ => None,
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, VmError> {
    match op {
        BinaryOp::Add => checked_arith(a.checked_add(b), "addition"),
        BinaryOp::Sub => checked_arith(a.checked_sub(b), "subtraction"),
        BinaryOp::Mul => checked_arith(a.checked_mul(b), "multiplication"),
        BinaryOp::Div => {
            if b == 0 {
                return Err(zero_division("division by zero"));
            }
            float_binary(op, Number::Int(a).to_f64(), Number::Int(b).to_f64())
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(|| integer_overflow("floor division"))?;
            // Round toward negative infinity.
            if a % b != 0 && (a < 0) != (b < 0) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            // Anything mod -1 is 0; `i64::MIN % -1` overflows in `%` itself.
            let r = if b == -1 { 0 } else { a % b };
            // Result takes the sign of the divisor.
            if r != 0 && (r < 0) != (b < 0) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinaryOp::Pow => match u32::try_from(b) {
            Ok(exp) => checked_arith(a.checked_pow(exp), "exponentiation"),
            Err(_) if b < 0 => {
                if a == 0 {
                    return Err(zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                float_binary(op, Number::Int(a).to_f64(), Number::Int(b).to_f64())
            }
            Err(_) => Err(integer_overflow("exponentiation")),
        },
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value, VmError> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Float(value))
}

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> Result<Value, VmError> {
    match (op, operand.as_number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOp::Neg, Some(Number::Int(i))) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| integer_overflow("negation")),
        (UnaryOp::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Number::Float(f))) => Ok(Value::Float(f)),
        (_, None) => Err(type_error(format!(
            "bad operand type for unary {}: '{}'",
            op.as_symbol(),
            operand.type_name()
        ))),
    }
}

pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value, VmError> {
    let result = match op {
        CompareOp::Eq => left == right,
        CompareOp::NotEq => left != right,
        CompareOp::Is => left.is_same(right),
        CompareOp::IsNot => !left.is_same(right),
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Lt | CompareOp::LtE | CompareOp::Gt | CompareOp::GtE => {
            let ordering = order(left, right).ok_or_else(|| {
                type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.as_symbol(),
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::LtE => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
    };
    Ok(Value::Bool(result))
}

/// Ordering for `<` and friends; `None` when the types don't compare.
///
/// NaN compares as equal to everything, which keeps `sorted` total.
pub(crate) fn order(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Some(match (a, b) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            _ => a
                .to_f64()
                .partial_cmp(&b.to_f64())
                .unwrap_or(Ordering::Equal),
        });
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => order_items(&a.borrow(), &b.borrow()),
        (Value::Tuple(a), Value::Tuple(b)) => order_items(a, b),
        _ => None,
    }
}

fn order_items(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return order(x, y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, VmError> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v == item)),
        Value::Tuple(items) => Ok(items.iter().any(|v| v == item)),
        Value::Dict(map) => Ok(map.borrow().contains_key(&Key::from_value(item)?)),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(&**needle)),
            other => Err(type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Range(range) => Ok(match item.as_number() {
            Some(Number::Int(i)) => {
                let offset = i128::from(i) - i128::from(range.start);
                let in_bounds = if range.step > 0 {
                    i >= range.start && i < range.stop
                } else {
                    i <= range.start && i > range.stop
                };
                in_bounds && offset % i128::from(range.step) == 0
            }
            _ => false,
        }),
        other => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}
