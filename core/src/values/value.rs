//! Runtime values.
//!
//! Values have two textual forms:
//! - the plain form ([`Display`](core::fmt::Display)), used by print
//!   statements and `[[name]]` template markers;
//! - the diagnostic form ([`Value::repr`]), which quotes strings and shows
//!   container structure, used by `{{name}}` template markers.

use core::fmt;
use std::rc::Rc;

use ecow::EcoString;

use super::function::{Cell, Function, NativeFunction};
use crate::vm::CodeObject;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(EcoString),
    Tuple(Rc<[Value]>),
    List(Rc<Vec<Value>>),
    /// Insertion-ordered key/value pairs.
    Dict(Rc<Vec<(Value, Value)>>),
    Function(Rc<Function>),
    Native(NativeFunction),
    Code(Rc<CodeObject>),
    Cell(Cell),
}

impl Value {
    pub fn str(s: impl Into<EcoString>) -> Self {
        Value::Str(s.into())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    pub fn dict(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Dict(Rc::new(pairs.into_iter().collect()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Native(_) => "builtin_function",
            Value::Code(_) => "code",
            Value::Cell(_) => "cell",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(pairs) => !pairs.is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Diagnostic form: strings quoted, containers shown structurally.
    pub fn repr(&self) -> Repr<'_> {
        Repr(self)
    }

    /// Identity comparison for reference values, structural for data.
    ///
    /// Used by the assembler to deduplicate constants; unlike `==`, it keeps
    /// `1`, `1.0` and `True` apart.
    pub fn same_constant(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Code(a), Value::Code(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            (Value::Code(a), Value::Code(b)) => Rc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => Rc::ptr_eq(a, b),
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Float(a), b) => b.as_int().is_some_and(|b| *a == b as f64),
            (a, Value::Float(b)) => a.as_int().is_some_and(|a| a as f64 == *b),
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => write!(f, "{}", other.repr()),
        }
    }
}

/// Diagnostic formatting adapter returned by [`Value::repr`].
pub struct Repr<'a>(&'a Value);

impl fmt::Display for Repr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => format_float(f, *x),
            Value::Str(s) => escape_string(f, s),
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Value::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key.repr(), value.repr())?;
                }
                f.write_str("}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Native(native) => write!(f, "<built-in function {}>", native.name()),
            Value::Code(code) => write!(
                f,
                "<code object {} at \"{}\", line {}>",
                code.name, code.filename, code.first_line
            ),
            Value::Cell(cell) => match &*cell.borrow() {
                Some(value) => write!(f, "<cell: {} object>", value.type_name()),
                None => f.write_str("<cell: empty>"),
            },
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item.repr())?;
    }
    Ok(())
}

fn format_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        write!(f, "nan")
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            write!(f, "inf")
        } else {
            write!(f, "-inf")
        }
    } else {
        let s = value.to_string();
        if s.contains('.') || s.contains('e') || s.contains('E') {
            write!(f, "{}", s)
        } else {
            write!(f, "{}.0", s)
        }
    }
}

/// Quote a string the way the diagnostic form shows it.
///
/// Single quotes are preferred; double quotes are used when the string
/// contains a single quote but no double quote.
fn escape_string(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    let quote_char = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    write!(f, "{}", quote_char)?;

    for ch in s.chars() {
        if ch == quote_char {
            write!(f, "\\{}", quote_char)?;
        } else {
            match ch {
                '\\' => write!(f, "\\\\")?,
                '\n' => write!(f, "\\n")?,
                '\r' => write!(f, "\\r")?,
                '\t' => write!(f, "\\t")?,
                c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
                c => write!(f, "{}", c)?,
            }
        }
    }

    write!(f, "{}", quote_char)
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<EcoString> for Value {
    fn from(value: EcoString) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(Rc::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}
