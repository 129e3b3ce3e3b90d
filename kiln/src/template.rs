use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::environment::Environment;
use crate::error::Error;
use crate::loader::{LoadedSource, UpToDateFunc};
use crate::utils::{BTreeMapKeysDebug, FreshnessPolicy};
use crate::value::{self, Value};
use crate::vm::{BlockMap, Context, Procedure, State};

/// The executable form of a template.
pub(crate) struct CompiledTemplate {
    pub(crate) root: Procedure,
    pub(crate) blocks: Arc<BlockMap>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("root", &self.root)
            .field("blocks", &BTreeMapKeysDebug(&*self.blocks))
            .finish()
    }
}

/// A template as it is held in the cache of the environment.
///
/// The source never changes.  A newer source for the same name results in a
/// new instance replacing this one.
pub(crate) struct LoadedTemplate {
    name: Arc<str>,
    source: String,
    path: Option<PathBuf>,
    up_to_date: Option<Box<UpToDateFunc>>,
    compiled: OnceLock<CompiledTemplate>,
}

impl fmt::Debug for LoadedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedTemplate")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("compiled", &self.compiled.get())
            .finish()
    }
}

impl LoadedTemplate {
    pub(crate) fn new(name: &str, loaded: LoadedSource) -> LoadedTemplate {
        let (source, path, up_to_date) = loaded.into_parts();
        LoadedTemplate {
            name: name.into(),
            source,
            path,
            up_to_date,
            compiled: OnceLock::new(),
        }
    }

    pub(crate) fn is_up_to_date(&self, policy: FreshnessPolicy) -> bool {
        match self.up_to_date {
            Some(ref f) => f(),
            None => policy.is_fresh(),
        }
    }

    /// Returns the compiled form, compiling on first use.
    ///
    /// Concurrent first uses may both invoke the compiler, only one result
    /// is kept.  A failed compilation leaves the template uncompiled.
    pub(crate) fn compiled(&self, env: &Environment) -> Result<&CompiledTemplate, Error> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        let compiled = ok!(env.compile(&self.name, &self.source));
        Ok(self.compiled.get_or_init(|| compiled))
    }
}

/// Represents a handle to a template.
///
/// Templates are looked up through [`Environment::get_template`] which
/// returns them in form of this handle.  The handle keeps the template alive
/// even if the environment replaces it in its cache, so a handle always
/// renders the source it was created from.  Cloning a handle is cheap.
///
/// To render the [`render`](Template::render) method can be used.
#[derive(Clone)]
pub struct Template<'env> {
    env: &'env Environment,
    loaded: Arc<LoadedTemplate>,
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name())
            .field("path", &self.path())
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl<'env> Template<'env> {
    pub(crate) fn new(env: &'env Environment, loaded: Arc<LoadedTemplate>) -> Template<'env> {
        Template { env, loaded }
    }

    /// Returns the name of the template.
    pub fn name(&self) -> &str {
        &self.loaded.name
    }

    /// Returns the source code of the template.
    pub fn source(&self) -> &str {
        &self.loaded.source
    }

    /// Returns the path the source was loaded from, if the loader knew it.
    pub fn path(&self) -> Option<&Path> {
        self.loaded.path.as_deref()
    }

    /// Checks if the template still reflects its source.
    ///
    /// If the loader supplied no `up_to_date` callback the
    /// [`FreshnessPolicy`] of the environment decides.  By default such
    /// templates are always stale.
    pub fn is_up_to_date(&self) -> bool {
        self.loaded.is_up_to_date(self.env.freshness_policy())
    }

    /// Checks if the template was compiled already.
    pub fn is_compiled(&self) -> bool {
        self.loaded.compiled.get().is_some()
    }

    /// Compiles the template unless that already happened.
    pub fn compile(&self) -> Result<(), Error> {
        self.loaded
            .compiled(self.env)
            .map(|_| ())
            .map_err(|err| err.with_template_name(self.name()))
    }

    /// Checks if two handles refer to the same template instance.
    pub fn is_same(&self, other: &Template<'_>) -> bool {
        Arc::ptr_eq(&self.loaded, &other.loaded)
    }

    /// Renders the template into a string.
    ///
    /// The provided value is used as the variables of the render context.  It
    /// can be any object that implements [`Serialize`](serde::Serialize) and
    /// serializes into a map, or `()` for no variables at all.  The
    /// [`context!`](crate::context) macro can be used to create an ad-hoc
    /// context.
    ///
    /// The template is compiled on the first render.
    ///
    /// ```
    /// # use kiln::{Environment, Error, MemoryLoader, Module, Procedure, context};
    /// # let loader = MemoryLoader::new();
    /// # loader.add_template("hello", "Hello");
    /// # let mut env = Environment::empty();
    /// # env.add_loader(loader);
    /// # env.set_compiler(|_: &str, source: &str, _: &Environment| -> Result<Module, Error> {
    /// #     let source = source.to_string();
    /// #     Ok(Module::new().with_root(Procedure::new(move |state| {
    /// #         Ok(format!("{} {}!", source, state.format(state.lookup("name"))))
    /// #     })))
    /// # });
    /// let tmpl = env.get_template("hello").unwrap();
    /// assert_eq!(tmpl.render(context!(name => "John")).unwrap(), "Hello John!");
    /// ```
    pub fn render<S: Serialize>(&self, data: S) -> Result<String, Error> {
        value::from_serialize(&data)
            .and_then(|data| self._render(data))
            .map_err(|err| err.with_template_name(self.name()))
    }

    fn _render(&self, data: Value) -> Result<String, Error> {
        let compiled = ok!(self.loaded.compiled(self.env));
        let ctx = Context::new(ok!(value::into_context_map(data)), compiled.blocks.clone())
            .with_name(self.loaded.name.clone());
        compiled.root.invoke(&State::new(self.env, &ctx))
    }
}
