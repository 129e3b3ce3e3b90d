//! Filter functions and abstractions.
//!
//! Filters are functions that compiled procedures apply to values at render
//! time.  They are looked up by name in the [`Environment`](crate::Environment)
//! when they are invoked, so registering a filter after a template was
//! compiled still takes effect.
//!
//! A filter receives the value it is applied to and the remaining arguments:
//!
//! ```
//! # use kiln::Environment;
//! # use kiln::value::Value;
//! let mut env = Environment::new();
//! env.add_filter("repeat", |value: Value, args: &[Value]| {
//!     let n = args.first().and_then(|x| x.as_u64()).unwrap_or(2);
//!     let s = value.as_str().unwrap_or_default();
//!     Ok(Value::from(s.repeat(n as usize)))
//! });
//! ```
//!
//! # Built-in Filters
//!
//! When the `builtins` feature is enabled (default) the following filters are
//! registered on [`Environment::new`](crate::Environment::new):
//!
//! `capitalize`, `default`, `escape` (alias `e`), `join`, `length`,
//! `lower`, `replace`, `title`, `trim`, `upper`.
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::value::Value;

type FilterFunc = dyn Fn(Value, &[Value]) -> Result<Value, Error> + Sync + Send + 'static;

/// A boxed filter.
#[derive(Clone)]
pub struct BoxedFilter(Arc<FilterFunc>);

impl fmt::Debug for BoxedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedFilter")
    }
}

impl BoxedFilter {
    /// Creates a new boxed filter.
    pub fn new<F>(f: F) -> BoxedFilter
    where
        F: Fn(Value, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        BoxedFilter(Arc::new(f))
    }

    /// Applies the filter to a value and arguments.
    pub fn apply_to(&self, value: Value, args: &[Value]) -> Result<Value, Error> {
        (self.0)(value, args)
    }
}

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;

    use std::fmt::Write;

    use crate::error::ErrorKind;
    use crate::utils::HtmlEscape;
    use crate::value::{is_empty, kind_name, to_output_string};

    fn check_arg_count(name: &str, args: &[Value], max: usize) -> Result<(), Error> {
        if args.len() > max {
            Err(Error::new(
                ErrorKind::InvalidArguments,
                format!("{} takes at most {} argument(s)", name, max),
            ))
        } else {
            Ok(())
        }
    }

    fn string_arg<'a>(name: &str, args: &'a [Value], idx: usize) -> Result<Option<&'a str>, Error> {
        match args.get(idx) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::new(
                ErrorKind::InvalidArguments,
                format!(
                    "{} expects a string argument, got {}",
                    name,
                    kind_name(other)
                ),
            )),
        }
    }

    /// Converts a value to uppercase.
    ///
    /// ```jinja
    /// <h1>{{ chapter.title|upper }}</h1>
    /// ```
    pub fn upper(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("upper", args, 0));
        Ok(Value::from(to_output_string(&value).to_uppercase()))
    }

    /// Converts a value to lowercase.
    ///
    /// ```jinja
    /// <h1>{{ chapter.title|lower }}</h1>
    /// ```
    pub fn lower(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("lower", args, 0));
        Ok(Value::from(to_output_string(&value).to_lowercase()))
    }

    /// Converts a value to title case.
    ///
    /// ```jinja
    /// <h1>{{ chapter.title|title }}</h1>
    /// ```
    pub fn title(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("title", args, 0));
        let mut rv = String::new();
        let mut capitalize = true;
        for c in to_output_string(&value).chars() {
            if c.is_ascii_punctuation() || c.is_whitespace() {
                rv.push(c);
                capitalize = true;
            } else if capitalize {
                ok!(write!(rv, "{}", c.to_uppercase()).map_err(Error::from));
                capitalize = false;
            } else {
                ok!(write!(rv, "{}", c.to_lowercase()).map_err(Error::from));
            }
        }
        Ok(Value::from(rv))
    }

    /// Convert the string with all its characters lowercased
    /// apart from the first char which is uppercased.
    ///
    /// ```jinja
    /// <h1>{{ chapter.title|capitalize }}</h1>
    /// ```
    pub fn capitalize(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("capitalize", args, 0));
        let text = to_output_string(&value);
        let mut chars = text.chars();
        Ok(Value::from(match chars.next() {
            None => String::new(),
            Some(f) => f.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        }))
    }

    /// Strip leading and trailing characters from a string.
    ///
    /// By default it strips whitespace.  When a string argument is given all
    /// of its characters are stripped instead.
    ///
    /// ```jinja
    /// {{ "  non-space characters  " | trim }} -> "non-space characters"
    /// {{ "1212foo12bar1212" | trim("12") }} -> "foo12bar"
    /// ```
    pub fn trim(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("trim", args, 1));
        let s = to_output_string(&value);
        Ok(Value::from(match ok!(string_arg("trim", args, 0)) {
            Some(chars) => {
                let chars = chars.chars().collect::<Vec<_>>();
                s.trim_matches(&chars[..]).to_string()
            }
            None => s.trim().to_string(),
        }))
    }

    /// Does a string replace.
    ///
    /// It replaces all occurrences of the first parameter with the second.
    ///
    /// ```jinja
    /// {{ "Hello World"|replace("Hello", "Goodbye") }}
    ///   -> Goodbye World
    /// ```
    pub fn replace(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("replace", args, 2));
        match (
            ok!(string_arg("replace", args, 0)),
            ok!(string_arg("replace", args, 1)),
        ) {
            (Some(from), Some(to)) => Ok(Value::from(to_output_string(&value).replace(from, to))),
            _ => Err(Error::new(
                ErrorKind::InvalidArguments,
                "replace requires two arguments",
            )),
        }
    }

    /// Returns the "length" of the value
    ///
    /// Strings count characters, sequences count items and maps count keys.
    ///
    /// ```jinja
    /// <p>Search results: {{ results|length }}
    /// ```
    pub fn length(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("length", args, 0));
        match value {
            Value::String(ref s) => Ok(Value::from(s.chars().count())),
            Value::Array(ref items) => Ok(Value::from(items.len())),
            Value::Object(ref map) => Ok(Value::from(map.len())),
            ref other => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot calculate length of value of type {}", kind_name(other)),
            )),
        }
    }

    /// If the value is empty it will return the passed default value,
    /// otherwise the value of the variable.
    ///
    /// Since missing variables render as the empty string, an empty string
    /// counts as missing just like `none` does.
    ///
    /// ```jinja
    /// <p>{{ my_variable|default("my_variable was not defined") }}</p>
    /// ```
    pub fn default(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("default", args, 1));
        if is_empty(&value) {
            Ok(args.first().cloned().unwrap_or_else(|| Value::from("")))
        } else {
            Ok(value)
        }
    }

    /// Joins a sequence by a character
    ///
    /// ```jinja
    /// {{ users|join(", ") }} -> Peter, Paul, Mary
    /// ```
    pub fn join(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("join", args, 1));
        let joiner = ok!(string_arg("join", args, 0)).unwrap_or("");
        match value {
            Value::Null => Ok(Value::from("")),
            Value::String(s) => {
                let chars = s.chars().map(String::from).collect::<Vec<_>>();
                Ok(Value::from(chars.join(joiner)))
            }
            Value::Array(items) => {
                let mut rv = String::new();
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        rv.push_str(joiner);
                    }
                    rv.push_str(&to_output_string(item));
                }
                Ok(Value::from(rv))
            }
            other => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot join value of type {}", kind_name(&other)),
            )),
        }
    }

    /// HTML escapes a string.
    ///
    /// By default this filter is also registered under the alias `e`.
    ///
    /// ```jinja
    /// {{ comment|escape }}
    /// ```
    pub fn escape(value: Value, args: &[Value]) -> Result<Value, Error> {
        ok!(check_arg_count("escape", args, 0));
        Ok(Value::from(HtmlEscape(&to_output_string(&value)).to_string()))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use serde_json::json;
        use similar_asserts::assert_eq;

        #[test]
        fn test_string_filters() {
            assert_eq!(upper(json!("hello"), &[]).unwrap(), json!("HELLO"));
            assert_eq!(lower(json!("HeLLo"), &[]).unwrap(), json!("hello"));
            assert_eq!(
                title(json!("hello world-wide"), &[]).unwrap(),
                json!("Hello World-Wide")
            );
            assert_eq!(capitalize(json!("hELLO"), &[]).unwrap(), json!("Hello"));
            assert_eq!(capitalize(json!(""), &[]).unwrap(), json!(""));
            assert_eq!(trim(json!("  x  "), &[]).unwrap(), json!("x"));
            assert_eq!(
                trim(json!("1212foo12bar1212"), &[json!("12")]).unwrap(),
                json!("foo12bar")
            );
            assert_eq!(upper(json!(42), &[]).unwrap(), json!("42"));
        }

        #[test]
        fn test_replace() {
            assert_eq!(
                replace(json!("Hello World"), &[json!("Hello"), json!("Goodbye")]).unwrap(),
                json!("Goodbye World")
            );
            let err = replace(json!("Hello"), &[json!("Hello")]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArguments);
            let err = replace(json!("Hello"), &[json!(1), json!("x")]).unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid arguments: replace expects a string argument, got number"
            );
        }

        #[test]
        fn test_length() {
            assert_eq!(length(json!("äbc"), &[]).unwrap(), json!(3));
            assert_eq!(length(json!([1, 2]), &[]).unwrap(), json!(2));
            assert_eq!(length(json!({"a": 1}), &[]).unwrap(), json!(1));
            let err = length(json!(true), &[]).unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid operation: cannot calculate length of value of type bool"
            );
        }

        #[test]
        fn test_default() {
            assert_eq!(default(json!(""), &[json!("x")]).unwrap(), json!("x"));
            assert_eq!(default(Value::Null, &[json!("x")]).unwrap(), json!("x"));
            assert_eq!(default(json!("y"), &[json!("x")]).unwrap(), json!("y"));
            assert_eq!(default(json!(0), &[json!("x")]).unwrap(), json!(0));
            assert_eq!(default(Value::Null, &[]).unwrap(), json!(""));
        }

        #[test]
        fn test_join() {
            assert_eq!(
                join(json!(["a", 1, true]), &[json!(", ")]).unwrap(),
                json!("a, 1, true")
            );
            assert_eq!(join(json!("abc"), &[json!("-")]).unwrap(), json!("a-b-c"));
            assert_eq!(join(Value::Null, &[]).unwrap(), json!(""));
            assert_eq!(
                join(json!({}), &[]).unwrap_err().kind(),
                ErrorKind::InvalidOperation
            );
        }

        #[test]
        fn test_escape() {
            assert_eq!(
                escape(json!("<a href=\"/\">"), &[]).unwrap(),
                json!("&lt;a href=&quot;&#x2f;&quot;&gt;")
            );
        }

        #[test]
        fn test_too_many_arguments() {
            let err = upper(json!("x"), &[json!(1)]).unwrap_err();
            assert_eq!(err.to_string(), "invalid arguments: upper takes at most 0 argument(s)");
        }
    }
}

#[cfg(feature = "builtins")]
pub use self::builtins::*;
