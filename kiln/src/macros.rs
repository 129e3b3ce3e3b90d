// `ok!` and `some!` are less bloaty alternatives to the standard library's try operator (`?`).
// Since we do not need type conversions in this crate we can fall back to much easier match
// patterns that compile faster and produce less bloaty code.

macro_rules! ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => return Err(err),
        }
    };
}

macro_rules! some {
    ($expr:expr) => {
        match $expr {
            Some(val) => val,
            None => return None,
        }
    };
}

/// Creates a render context from keys and values.
///
/// ```rust
/// # use kiln::context;
/// let ctx = context! {
///     name => "Peter",
///     location => "World",
/// };
/// assert_eq!(ctx["name"], "Peter");
/// ```
///
/// Alternatively if the variable name matches the key name it can
/// be omitted:
///
/// ```rust
/// # use kiln::context;
/// let name = "Peter";
/// let ctx = context! { name };
/// assert_eq!(ctx["name"], "Peter");
/// ```
///
/// The return value is a [`Value`](crate::value::Value) holding a map.
/// Values that fail to serialize are stored as `null`.
#[macro_export]
macro_rules! context {
    (
        $($key:ident $(=> $value:expr)?),* $(,)?
    ) => {{
        let mut ctx = $crate::value::ValueMap::new();
        $(
            $crate::__pair!(ctx, $key $(, $value)?);
        )*
        $crate::value::Value::Object(ctx)
    }}
}

#[macro_export]
#[doc(hidden)]
macro_rules! __pair {
    ($ctx:ident, $key:ident) => {{
        $crate::__pair!($ctx, $key, $key);
    }};
    ($ctx:ident, $key:ident, $value:expr) => {
        $ctx.insert(
            stringify!($key).to_string(),
            $crate::value::from_serialize_lossy(&$value),
        );
    };
}
