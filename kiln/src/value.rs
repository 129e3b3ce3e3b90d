//! Provides the runtime value type.
//!
//! Render data and everything that flows through filters is represented as a
//! [`Value`].  The engine does not define its own dynamic type but uses the
//! JSON data model of [`serde_json`] so that anything implementing
//! [`Serialize`] can be passed to [`Template::render`](crate::Template::render).
//!
//! When values are written into the output the following rules apply:
//!
//! * strings are written verbatim
//! * `null` is written as the empty string
//! * booleans and numbers use their display form
//! * arrays and objects are written as compact JSON
use std::fmt;

use serde::Serialize;

use crate::error::{Error, ErrorKind};

pub use serde_json::Value;

/// The map type used for render contexts.
pub type ValueMap = serde_json::Map<String, Value>;

/// The value every missing variable resolves to.
pub(crate) static EMPTY_STRING: Value = Value::String(String::new());

/// Converts a serializable value into a [`Value`].
pub fn from_serialize<S: Serialize + ?Sized>(value: &S) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::BadSerialization, "could not convert value").with_source(err)
    })
}

/// Like [`from_serialize`] but maps failures to `null`.
pub fn from_serialize_lossy<S: Serialize + ?Sized>(value: &S) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Converts render data into the mapping a context is created from.
///
/// `()` and `None` serialize to `null` and produce an empty mapping.  Any
/// other value that is not a map is rejected.
pub(crate) fn into_context_map(value: Value) -> Result<ValueMap, Error> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ValueMap::new()),
        other => Err(Error::new(
            ErrorKind::BadSerialization,
            format!("render data must be a map, got {}", kind_name(&other)),
        )),
    }
}

/// Returns a short name for the kind of value.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

/// Writes a value in output form.
pub fn write_value<W: fmt::Write + ?Sized>(out: &mut W, value: &Value) -> fmt::Result {
    match value {
        Value::Null => Ok(()),
        Value::String(s) => out.write_str(s),
        Value::Bool(b) => write!(out, "{}", b),
        Value::Number(n) => write!(out, "{}", n),
        Value::Array(_) | Value::Object(_) => write!(out, "{}", value),
    }
}

/// Formats a value into a new string in output form.
pub fn to_output_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let mut rv = String::new();
            let _ = write_value(&mut rv, other);
            rv
        }
    }
}

/// Checks if the value is "empty" in the sense of the `default` filter.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use similar_asserts::assert_eq;

    #[test]
    fn test_output_form() {
        assert_eq!(to_output_string(&json!("hello")), "hello");
        assert_eq!(to_output_string(&Value::Null), "");
        assert_eq!(to_output_string(&json!(42)), "42");
        assert_eq!(to_output_string(&json!(true)), "true");
        assert_eq!(to_output_string(&json!([1, "a"])), "[1,\"a\"]");
        assert_eq!(to_output_string(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_context_map() {
        assert_eq!(into_context_map(Value::Null).unwrap().len(), 0);
        assert_eq!(into_context_map(json!({"a": 1})).unwrap()["a"], json!(1));
        let err = into_context_map(json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadSerialization);
        assert_eq!(
            err.to_string(),
            "could not serialize to value: render data must be a map, got sequence"
        );
    }
}
