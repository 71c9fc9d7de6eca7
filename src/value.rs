//! Rendering semantics over [`serde_json::Value`].
//!
//! The payload is plain JSON, so instead of a bespoke value type the engine
//! works directly on `serde_json::Value` and keeps the directive-language
//! semantics (truthiness, display formatting, arithmetic) in this module.
use std::cmp::Ordering;
use std::io::Write;

use serde_json::{Number, Value};

use crate::errors::{Error, TmpletResult};

/// The type name used in error messages
pub(crate) fn name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// `null`, `false`, `0`, `""` and empty containers are falsy, everything else
/// is truthy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Writes the string form of a value: strings are written bare, numbers
/// without a trailing `.0` when integral, containers as compact JSON.
pub(crate) fn format(value: &Value, out: &mut impl Write) -> std::io::Result<()> {
    match value {
        Value::Null => out.write_all(b"null"),
        Value::Bool(b) => write!(out, "{b}"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                write!(out, "{i}")
            } else if let Some(u) = n.as_u64() {
                write!(out, "{u}")
            } else {
                // f64 Display already drops the fractional part when it's zero
                write!(out, "{}", n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => out.write_all(s.as_bytes()),
        Value::Array(_) | Value::Object(_) => serde_json::to_writer(out, value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    }
}

pub(crate) fn format_to_string(value: &Value) -> String {
    let mut out = Vec::with_capacity(16);
    format(value, &mut out).expect("writing to a vec is infallible");
    String::from_utf8(out).expect("valid utf-8 from format")
}

/// Equality with numeric coercion: `1 == 1.0` regardless of the underlying
/// `Number` representation.
pub(crate) fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering for `<`, `<=`, `>` and `>=`. Only numbers and strings are ordered.
pub(crate) fn compare(a: &Value, b: &Value) -> TmpletResult<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y)
                .ok_or_else(|| Error::message("Cannot compare NaN"))
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(Error::message(format!(
            "Cannot compare `{}` with `{}`",
            name(a),
            name(b)
        ))),
    }
}

fn float_value(f: f64) -> TmpletResult<Value> {
    match Number::from_f64(f) {
        Some(n) => Ok(Value::Number(n)),
        None => Err(Error::message("The result is not a finite number")),
    }
}

fn as_int_pair(a: &Value, b: &Value) -> Option<(i64, i64)> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some((x.as_i64()?, y.as_i64()?)),
        _ => None,
    }
}

fn as_float_pair(a: &Value, b: &Value) -> TmpletResult<(f64, f64)> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(Error::message("The number cannot be represented as a float")),
        },
        _ => {
            let bad = if matches!(a, Value::Number(_)) { b } else { a };
            Err(Error::message(format!(
                "Math operations can only be done on numbers, found `{}`",
                name(bad)
            )))
        }
    }
}

/// `+` concatenates as soon as one side is a string, like the host language
/// of the original templates did.
pub(crate) fn add(a: &Value, b: &Value) -> TmpletResult<Value> {
    if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
        let mut out = format_to_string(a);
        out.push_str(&format_to_string(b));
        return Ok(Value::String(out));
    }

    if let Some((x, y)) = as_int_pair(a, b) {
        return match x.checked_add(y) {
            Some(v) => Ok(Value::from(v)),
            None => Err(Error::message("Addition overflowed an integer")),
        };
    }
    let (x, y) = as_float_pair(a, b)?;
    float_value(x + y)
}

pub(crate) fn sub(a: &Value, b: &Value) -> TmpletResult<Value> {
    if let Some((x, y)) = as_int_pair(a, b) {
        return match x.checked_sub(y) {
            Some(v) => Ok(Value::from(v)),
            None => Err(Error::message("Subtraction overflowed an integer")),
        };
    }
    let (x, y) = as_float_pair(a, b)?;
    float_value(x - y)
}

pub(crate) fn mul(a: &Value, b: &Value) -> TmpletResult<Value> {
    if let Some((x, y)) = as_int_pair(a, b) {
        return match x.checked_mul(y) {
            Some(v) => Ok(Value::from(v)),
            None => Err(Error::message("Multiplication overflowed an integer")),
        };
    }
    let (x, y) = as_float_pair(a, b)?;
    float_value(x * y)
}

pub(crate) fn div(a: &Value, b: &Value) -> TmpletResult<Value> {
    if let Some((x, y)) = as_int_pair(a, b) {
        if y == 0 {
            return Err(Error::message("Tried to divide by 0"));
        }
        // checked: i64::MIN / -1 does not fit in an i64
        match (x.checked_div(y), x.checked_rem(y)) {
            (Some(q), Some(0)) => return Ok(Value::from(q)),
            (Some(_), Some(_)) => (),
            _ => return Err(Error::message("Division overflowed an integer")),
        }
    }
    let (x, y) = as_float_pair(a, b)?;
    if y == 0.0 {
        return Err(Error::message("Tried to divide by 0"));
    }
    float_value(x / y)
}

pub(crate) fn rem(a: &Value, b: &Value) -> TmpletResult<Value> {
    if let Some((x, y)) = as_int_pair(a, b) {
        if y == 0 {
            return Err(Error::message("Tried to divide by 0"));
        }
        return match x.checked_rem(y) {
            Some(v) => Ok(Value::from(v)),
            None => Err(Error::message("Remainder overflowed an integer")),
        };
    }
    let (x, y) = as_float_pair(a, b)?;
    if y == 0.0 {
        return Err(Error::message("Tried to divide by 0"));
    }
    float_value(x % y)
}

pub(crate) fn negate(a: &Value) -> TmpletResult<Value> {
    match a {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i.checked_neg() {
                    Some(v) => Ok(Value::from(v)),
                    None => Err(Error::message("Negation overflowed an integer")),
                }
            } else {
                float_value(-n.as_f64().unwrap_or(f64::NAN))
            }
        }
        _ => Err(Error::message(format!(
            "Math operations can only be done on numbers, found `{}`",
            name(a)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        for v in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(1), json!(-0.5), json!("a"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(&v), "{v} should be truthy");
        }
    }

    #[test]
    fn formatting() {
        assert_eq!(format_to_string(&json!("hello")), "hello");
        assert_eq!(format_to_string(&json!(3)), "3");
        assert_eq!(format_to_string(&json!(3.5)), "3.5");
        assert_eq!(format_to_string(&json!(null)), "null");
        assert_eq!(format_to_string(&json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn add_concatenates_strings() {
        assert_eq!(
            add(&json!("a"), &json!(1)).unwrap(),
            Value::String("a1".to_string())
        );
        assert_eq!(
            add(&json!(1), &json!("a")).unwrap(),
            Value::String("1a".to_string())
        );
        assert_eq!(add(&json!(1), &json!(2)).unwrap(), json!(3));
    }

    #[test]
    fn division() {
        assert_eq!(div(&json!(6), &json!(2)).unwrap(), json!(3));
        assert_eq!(div(&json!(7), &json!(2)).unwrap(), json!(3.5));
        assert!(div(&json!(1), &json!(0)).is_err());
        assert_eq!(rem(&json!(7), &json!(-1)).unwrap(), json!(0));
        // i64::MIN / -1 and i64::MIN % -1 overflow
        assert!(div(&json!(i64::MIN), &json!(-1)).is_err());
        assert!(rem(&json!(i64::MIN), &json!(-1)).is_err());
    }

    #[test]
    fn numeric_equality_ignores_representation() {
        assert!(equal(&json!(1), &json!(1.0)));
        assert!(!equal(&json!(1), &json!("1")));
    }
}
