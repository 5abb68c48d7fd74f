//! Tests for the plain and diagnostic forms of values.

use pretty_assertions::assert_eq;

use crate::values::Value;

#[test]
fn test_display_int() {
    assert_eq!(format!("{}", Value::Int(42)), "42");
    assert_eq!(format!("{}", Value::Int(-100)), "-100");
    assert_eq!(format!("{}", Value::Int(42).repr()), "42");
}

#[test]
fn test_display_float_whole_number() {
    assert_eq!(format!("{}", Value::Float(42.0)), "42.0");
    assert_eq!(format!("{}", Value::Float(2.5)), "2.5");
    assert_eq!(format!("{}", Value::Float(f64::NEG_INFINITY)), "-inf");
}

#[test]
fn test_display_str_plain_vs_repr() {
    let value = Value::str("abc");
    assert_eq!(format!("{}", value), "abc");
    assert_eq!(format!("{}", value.repr()), "'abc'");
}

#[test]
fn test_repr_quote_selection() {
    assert_eq!(format!("{}", Value::str("it's").repr()), "\"it's\"");
    assert_eq!(format!("{}", Value::str("say \"hi\"").repr()), "'say \"hi\"'");
    assert_eq!(format!("{}", Value::str("both ' \"").repr()), "'both \\' \"'");
}

#[test]
fn test_repr_escapes() {
    assert_eq!(format!("{}", Value::str("a\nb\\").repr()), "'a\\nb\\\\'");
    assert_eq!(format!("{}", Value::str("\u{1}").repr()), "'\\x01'");
}

#[test]
fn test_display_none_and_bools() {
    assert_eq!(format!("{}", Value::None), "None");
    assert_eq!(format!("{}", Value::Bool(true)), "True");
    assert_eq!(format!("{}", Value::Bool(false).repr()), "False");
}

#[test]
fn test_containers_show_element_reprs() {
    let list = Value::list([Value::Int(1), Value::str("a")]);
    assert_eq!(format!("{}", list), "[1, 'a']");
    assert_eq!(format!("{}", list.repr()), "[1, 'a']");

    let single = Value::tuple([Value::Int(1)]);
    assert_eq!(format!("{}", single), "(1,)");

    let dict = Value::dict([
        (Value::str("a"), Value::Int(1)),
        (Value::Int(2), Value::str("c")),
        (
            Value::Int(3),
            Value::list([Value::Int(1), Value::str("a"), Value::str("b")]),
        ),
    ]);
    assert_eq!(format!("{}", dict), "{'a': 1, 2: 'c', 3: [1, 'a', 'b']}");
}

#[test]
fn test_equality_crosses_numeric_types() {
    assert_eq!(Value::Int(1), Value::Float(1.0));
    assert_eq!(Value::Bool(true), Value::Int(1));
    assert!(Value::Int(1) != Value::str("1"));
    assert!(!Value::Int(1).same_constant(&Value::Float(1.0)));
    assert!(!Value::Int(1).same_constant(&Value::Bool(true)));
}

#[test]
fn test_truthiness() {
    assert!(!Value::None.is_truthy());
    assert!(!Value::str("").is_truthy());
    assert!(Value::list([Value::None]).is_truthy());
    assert!(!Value::Float(0.0).is_truthy());
}
