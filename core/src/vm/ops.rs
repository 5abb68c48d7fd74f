//! Value-level semantics of the arithmetic, comparison and subscript
//! instructions.

use core::cmp::Ordering;
use std::rc::Rc;

use super::error::RuntimeError;
use super::instruction_set::{ComparisonOp, Opcode};
use crate::values::Value;

pub fn unary_negative(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Float(f) => Ok(Value::Float(-f)),
        other => match other.as_int() {
            Some(i) => i.checked_neg().map(Value::Int).ok_or(RuntimeError::IntegerOverflow),
            None => Err(RuntimeError::type_error(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
    }
}

enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numbers(a: &Value, b: &Value) -> Option<Numbers> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Some(Numbers::Floats(*x, *y)),
        (Value::Float(x), other) => other.as_int().map(|y| Numbers::Floats(*x, y as f64)),
        (other, Value::Float(y)) => other.as_int().map(|x| Numbers::Floats(x as f64, *y)),
        _ => Some(Numbers::Ints(a.as_int()?, b.as_int()?)),
    }
}

fn unsupported(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        a.type_name(),
        b.type_name()
    ))
}

/// Apply one of the `Binary*` opcodes.
pub fn binary(op: Opcode, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match op {
        Opcode::BinaryAdd => add(a, b),
        Opcode::BinarySubtract => arithmetic("-", a, b, i64::checked_sub, |x, y| x - y),
        Opcode::BinaryMultiply => multiply(a, b),
        Opcode::BinaryDivide => divide(a, b),
        Opcode::BinaryModulo => modulo(a, b),
        Opcode::BinarySubscr => subscript(a, b),
        _ => Err(RuntimeError::type_error(format!("{:?} is not a binary operation", op))),
    }
}

fn arithmetic(
    symbol: &str,
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match numbers(a, b) {
        Some(Numbers::Ints(x, y)) => int_op(x, y).map(Value::Int).ok_or(RuntimeError::IntegerOverflow),
        Some(Numbers::Floats(x, y)) => Ok(Value::Float(float_op(x, y))),
        None => Err(unsupported(symbol, a, b)),
    }
}

fn add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => {
            let mut joined = x.clone();
            joined.push_str(y);
            Ok(Value::Str(joined))
        }
        (Value::List(x), Value::List(y)) => Ok(Value::list(x.iter().chain(y.iter()).cloned())),
        (Value::Tuple(x), Value::Tuple(y)) => Ok(Value::tuple(x.iter().chain(y.iter()).cloned())),
        _ => arithmetic("+", a, b, i64::checked_add, |x, y| x + y),
    }
}

/// Upper bound on the byte length produced by `str * int`.
pub const MAX_STRING_LEN: usize = 1 << 28;

fn multiply(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Str(s), n) | (n, Value::Str(s)) if n.as_int().is_some() => {
            let count = usize::try_from(n.as_int().unwrap_or(0).max(0)).unwrap_or(usize::MAX);
            match s.len().checked_mul(count) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Value::str(s.repeat(count))),
                _ => Err(RuntimeError::StringTooLong {
                    limit: MAX_STRING_LEN,
                }),
            }
        }
        _ => arithmetic("*", a, b, i64::checked_mul, |x, y| x * y),
    }
}

fn divide(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match numbers(a, b) {
        Some(Numbers::Ints(_, 0)) => Err(RuntimeError::DivisionByZero),
        Some(Numbers::Ints(x, y)) => {
            // Floor division: round toward negative infinity.
            let q = x.checked_div(y).ok_or(RuntimeError::IntegerOverflow)?;
            let inexact = x % y != 0;
            Ok(Value::Int(if inexact && (x < 0) != (y < 0) { q - 1 } else { q }))
        }
        Some(Numbers::Floats(_, y)) if y == 0.0 => Err(RuntimeError::DivisionByZero),
        Some(Numbers::Floats(x, y)) => Ok(Value::Float(x / y)),
        None => Err(unsupported("/", a, b)),
    }
}

fn modulo(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match numbers(a, b) {
        Some(Numbers::Ints(_, 0)) => Err(RuntimeError::DivisionByZero),
        Some(Numbers::Ints(x, y)) => {
            // Result takes the sign of the divisor.
            let r = x.checked_rem(y).ok_or(RuntimeError::IntegerOverflow)?;
            Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
        }
        Some(Numbers::Floats(_, y)) if y == 0.0 => Err(RuntimeError::DivisionByZero),
        Some(Numbers::Floats(x, y)) => {
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }))
        }
        None => Err(unsupported("%", a, b)),
    }
}

fn index(items: &[Value], key: &Value) -> Result<Value, RuntimeError> {
    let Some(i) = key.as_int() else {
        return Err(RuntimeError::type_error(format!(
            "indices must be integers, not {}",
            key.type_name()
        )));
    };
    let len = items.len();
    let resolved = if i < 0 { i + len as i64 } else { i };
    usize::try_from(resolved)
        .ok()
        .and_then(|at| items.get(at))
        .cloned()
        .ok_or(RuntimeError::IndexOutOfRange { index: i, len })
}

pub fn subscript(container: &Value, key: &Value) -> Result<Value, RuntimeError> {
    match container {
        Value::List(items) => index(items, key),
        Value::Tuple(items) => index(items, key),
        Value::Str(s) => {
            let chars: Vec<Value> = s.chars().map(|c| Value::str(c.to_string())).collect();
            index(&chars, key)
        }
        Value::Dict(pairs) => pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RuntimeError::KeyNotFound {
                key: key.repr().to_string(),
            }),
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) => sequence_ordering(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => sequence_ordering(x, y),
        _ => match numbers(a, b)? {
            Numbers::Ints(x, y) => Some(x.cmp(&y)),
            Numbers::Floats(x, y) => x.partial_cmp(&y),
        },
    }
}

fn sequence_ordering(x: &[Value], y: &[Value]) -> Option<Ordering> {
    for (a, b) in x.iter().zip(y) {
        if a != b {
            return ordering(a, b);
        }
    }
    Some(x.len().cmp(&y.len()))
}

pub fn compare(cmp: ComparisonOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let result = match cmp {
        ComparisonOp::Eq => a == b,
        ComparisonOp::Ne => a != b,
        _ => {
            let Some(order) = ordering(a, b) else {
                return Err(RuntimeError::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    cmp.symbol(),
                    a.type_name(),
                    b.type_name()
                )));
            };
            match cmp {
                ComparisonOp::Lt => order == Ordering::Less,
                ComparisonOp::Le => order != Ordering::Greater,
                ComparisonOp::Gt => order == Ordering::Greater,
                _ => order != Ordering::Less,
            }
        }
    };
    Ok(Value::Bool(result))
}

/// Pair up `[k1, v1, k2, v2, ...]` into dict entries.
pub fn build_map(flat: Vec<Value>) -> Value {
    let mut pairs = Vec::with_capacity(flat.len() / 2);
    let mut items = flat.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        pairs.push((key, value));
    }
    Value::Dict(Rc::new(pairs))
}
