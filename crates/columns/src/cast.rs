//! Value casts applied by generic columns after extraction.

use std::sync::Arc;

use engine_core::{Error, Result, Value};
use tracing::debug;

/// Converts an extracted value into the column's stored value.
pub type Cast = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

pub fn identity() -> Cast {
    Arc::new(|value| Ok(value))
}

/// Parses `true/false/yes/no/y/n/on/off/1/0/t/f`, case-insensitive.
pub fn str_to_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" | "t" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "f" => Some(false),
        _ => None,
    }
}

fn parse_int(column: &str, value: &Value) -> Option<i64> {
    match value {
        Value::Int(v) => Some(*v),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => match s.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                debug!(column = %column, value = %s, "Value is not an int64");
                None
            }
        },
        _ => None,
    }
}

pub fn int64_or_nil(column: &str) -> Cast {
    let column = column.to_string();
    Arc::new(move |value| Ok(parse_int(&column, &value).map(Value::Int).unwrap_or(Value::Null)))
}

pub fn int64_or_zero(column: &str) -> Cast {
    let column = column.to_string();
    Arc::new(move |value| Ok(Value::Int(parse_int(&column, &value).unwrap_or(0))))
}

pub fn float64_or_nil(column: &str) -> Cast {
    let column = column.to_string();
    Arc::new(move |value| {
        Ok(match value {
            Value::Float(v) => Value::Float(v),
            Value::Int(v) => Value::Float(v as f64),
            Value::String(s) if !s.is_empty() => match s.trim().parse::<f64>() {
                Ok(v) => Value::Float(v),
                Err(_) => {
                    debug!(column = %column, value = %s, "Value is not a float64");
                    Value::Null
                }
            },
            _ => Value::Null,
        })
    })
}

/// Booleans pass through; strings must parse; everything else is `false`.
pub fn to_bool(column: &str) -> Cast {
    let column = column.to_string();
    Arc::new(move |value| match value {
        Value::Bool(v) => Ok(Value::Bool(v)),
        Value::String(s) => str_to_bool(&s)
            .map(Value::Bool)
            .ok_or_else(|| Error::internal(format!("{}: failed to cast {} to bool", column, s))),
        _ => Ok(Value::Bool(false)),
    })
}

/// Fails on anything that is not a string.
pub fn to_string(column: &str) -> Cast {
    let column = column.to_string();
    Arc::new(move |value| match value {
        Value::String(s) => Ok(Value::String(s)),
        other => Err(Error::internal(format!(
            "{}: value is not a string: {:?}",
            column, other
        ))),
    })
}

/// Fails on non-strings and on the empty string.
pub fn str_err_if_empty(column: &str) -> Cast {
    let column = column.to_string();
    Arc::new(move |value| match value {
        Value::String(s) if s.is_empty() => {
            Err(Error::internal(format!("{}: value is empty", column)))
        }
        Value::String(s) => Ok(Value::String(s)),
        other => Err(Error::internal(format!(
            "{}: value is not a string: {:?}",
            column, other
        ))),
    })
}

pub fn nil_if_error(inner: Cast) -> Cast {
    Arc::new(move |value| Ok(inner(value).unwrap_or(Value::Null)))
}

/// Nil for cast errors, non-strings and empty strings.
pub fn str_nil_if_error_or_empty(inner: Cast) -> Cast {
    Arc::new(move |value| {
        Ok(match inner(value) {
            Ok(Value::String(s)) if !s.is_empty() => Value::String(s),
            _ => Value::Null,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_bool() {
        for t in ["true", " YES ", "y", "On", "1", "T"] {
            assert_eq!(str_to_bool(t), Some(true), "{}", t);
        }
        for f in ["false", "No", "n", "OFF", "0", "f"] {
            assert_eq!(str_to_bool(f), Some(false), "{}", f);
        }
        assert_eq!(str_to_bool("maybe"), None);
    }

    #[test]
    fn test_int_policies() {
        let or_nil = int64_or_nil("c");
        let or_zero = int64_or_zero("c");
        assert_eq!(or_nil(Value::from("42")).unwrap(), Value::Int(42));
        assert_eq!(or_nil(Value::from("x")).unwrap(), Value::Null);
        assert_eq!(or_nil(Value::from("")).unwrap(), Value::Null);
        assert_eq!(or_zero(Value::from("x")).unwrap(), Value::Int(0));
        assert_eq!(or_zero(Value::Null).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_float_and_bool() {
        let f = float64_or_nil("c");
        assert_eq!(f(Value::from("1.5")).unwrap(), Value::Float(1.5));
        assert_eq!(f(Value::from("abc")).unwrap(), Value::Null);

        let b = to_bool("c");
        assert_eq!(b(Value::from("yes")).unwrap(), Value::Bool(true));
        assert_eq!(b(Value::Int(3)).unwrap(), Value::Bool(false));
        assert!(b(Value::from("perhaps")).is_err());
    }

    #[test]
    fn test_string_casts() {
        let strict = str_err_if_empty("c");
        assert!(strict(Value::from("")).is_err());
        assert!(strict(Value::Int(1)).is_err());

        let lenient = str_nil_if_error_or_empty(to_string("c"));
        assert_eq!(lenient(Value::from("")).unwrap(), Value::Null);
        assert_eq!(lenient(Value::Int(1)).unwrap(), Value::Null);
        assert_eq!(lenient(Value::from("a")).unwrap(), Value::from("a"));

        assert_eq!(nil_if_error(to_string("c"))(Value::Bool(true)).unwrap(), Value::Null);
    }
}
