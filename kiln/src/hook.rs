//! Glue for web frameworks.
//!
//! Frameworks commonly render views through a callback style hook: the view
//! name and the data are passed in and the outcome is reported through a
//! callback.  [`RenderHook`] implements that shape on top of an
//! [`Environment`].  It layers three sources of variables, lowest precedence
//! first:
//!
//! 1. the application defaults registered with [`RenderHook::set_default`],
//! 2. the request locals found in the `_locals` key of the render data,
//! 3. the remaining render data of the call site.
//!
//! ```
//! # use kiln::{context, Environment, Error, MemoryLoader, Module, Procedure, RenderHook};
//! # let loader = MemoryLoader::new();
//! # loader.add_template("page", "");
//! # let mut env = Environment::empty();
//! # env.add_loader(loader);
//! # env.set_compiler(|_: &str, _: &str, _: &Environment| -> Result<Module, Error> {
//! #     Ok(Module::new().with_root(Procedure::new(|state| {
//! #         Ok(format!("{} by {}", state.format(state.lookup("title")),
//! #                    state.format(state.lookup("user"))))
//! #     })))
//! # });
//! let mut hook = RenderHook::new(&env);
//! hook.set_default("title", "Untitled");
//! hook.render("page", &context! {
//!     _locals => context! { user => "anonymous" },
//!     user => "peter",
//! }, |rv| {
//!     assert_eq!(rv.unwrap(), "Untitled by peter");
//! });
//! ```
use std::fmt;

use serde::Serialize;

use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::value::{self, Value, ValueMap};

/// The key of the render data that holds the request locals.
pub const LOCALS_KEY: &str = "_locals";

/// A callback style render entry point for frameworks.
pub struct RenderHook<'env> {
    env: &'env Environment,
    defaults: ValueMap,
}

impl fmt::Debug for RenderHook<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHook")
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl<'env> RenderHook<'env> {
    /// Creates a hook without application defaults.
    pub fn new(env: &'env Environment) -> RenderHook<'env> {
        RenderHook {
            env,
            defaults: ValueMap::new(),
        }
    }

    /// Sets an application default.
    ///
    /// Values that fail to serialize are stored as `null`.
    pub fn set_default<K: Into<String>, V: Serialize>(&mut self, key: K, value: V) {
        self.defaults
            .insert(key.into(), value::from_serialize_lossy(&value));
    }

    /// Returns the application defaults.
    pub fn defaults(&self) -> &ValueMap {
        &self.defaults
    }

    /// Computes the variables a view is rendered with.
    ///
    /// `data` has to be a map or null.  Its `_locals` entry, if present, has
    /// to be a map or null as well and is not part of the result.
    pub fn merged_context(&self, data: &Value) -> Result<ValueMap, Error> {
        let mut rv = self.defaults.clone();
        let data = match data {
            Value::Null => return Ok(rv),
            Value::Object(map) => map,
            other => return value::into_context_map(other.clone()),
        };
        match data.get(LOCALS_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::Object(locals)) => {
                rv.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(other) => {
                return Err(Error::new(
                    ErrorKind::InvalidArguments,
                    format!(
                        "{} must be a map, got {}",
                        LOCALS_KEY,
                        value::kind_name(other)
                    ),
                ))
            }
        }
        rv.extend(
            data.iter()
                .filter(|(k, _)| k.as_str() != LOCALS_KEY)
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(rv)
    }

    /// Loads and renders a view, returning the result.
    pub fn render_to_string(&self, name: &str, data: &Value) -> Result<String, Error> {
        let ctx = ok!(self.merged_context(data));
        let tmpl = ok!(self.env.get_template(name));
        tmpl.render(Value::Object(ctx))
    }

    /// Loads and renders a view and reports the outcome to `callback`.
    ///
    /// Every failure, be it resolution, compilation or rendering, is passed
    /// to the callback.
    pub fn render<F>(&self, name: &str, data: &Value, callback: F)
    where
        F: FnOnce(Result<String, Error>),
    {
        let rv = self.render_to_string(name, data);
        if let Err(ref err) = rv {
            tracing::debug!(template = name, error = %err, "view failed to render");
        }
        callback(rv)
    }
}
