use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::compiler::TemplateCompiler;
use crate::defaults;
use crate::error::{Error, ErrorKind};
use crate::filters::BoxedFilter;
use crate::hook::RenderHook;
use crate::loader::{FileSystemLoader, LoadedSource, SourceProvider};
use crate::template::{CompiledTemplate, LoadedTemplate, Template};
use crate::utils::{BTreeMapKeysDebug, FreshnessPolicy};
use crate::value::Value;

type TemplateMap = BTreeMap<Arc<str>, Arc<LoadedTemplate>>;

/// An abstraction that holds the engine configuration.
///
/// This object holds the central configuration state for templates: the
/// loaders that resolve template names to sources, the compiler that turns
/// sources into procedures, the registered filters and the cache of loaded
/// templates.
///
/// Templates are requested by name through [`get_template`](Self::get_template).
/// A cached template is handed out again for as long as it reports to be up
/// to date, otherwise the loaders are consulted and a new template replaces
/// the cached one.
///
/// There is no global environment.  Multiple environments can coexist and
/// are `Send` and `Sync`, so one environment can be shared between threads.
///
/// ```
/// # use kiln::{Environment, Error, MemoryLoader, Module, Procedure, context};
/// let loader = MemoryLoader::new();
/// loader.add_template("hello.txt", "Hello");
///
/// let mut env = Environment::empty();
/// env.add_loader(loader);
/// env.set_compiler(|_: &str, source: &str, _: &Environment| -> Result<Module, Error> {
///     let greeting = source.to_string();
///     Ok(Module::new().with_root(Procedure::new(move |state| {
///         Ok(format!("{}, {}!", greeting, state.format(state.lookup("name"))))
///     })))
/// });
///
/// let tmpl = env.get_template("hello.txt").unwrap();
/// assert_eq!(tmpl.render(context!(name => "World")).unwrap(), "Hello, World!");
/// ```
pub struct Environment {
    loaders: Vec<Arc<dyn SourceProvider>>,
    compiler: Option<Arc<dyn TemplateCompiler>>,
    filters: BTreeMap<Cow<'static, str>, BoxedFilter>,
    templates: Mutex<TemplateMap>,
    freshness_policy: FreshnessPolicy,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Environment")
            .field("loaders", &self.loaders.len())
            .field("has_compiler", &self.compiler.is_some())
            .field("filters", &BTreeMapKeysDebug(&self.filters))
            .field("templates", &BTreeMapKeysDebug(&*templates))
            .field("freshness_policy", &self.freshness_policy)
            .finish()
    }
}

impl Environment {
    /// Creates a new environment with sensible defaults.
    ///
    /// This environment has the built-in filters registered and loads
    /// templates from the current working directory.  A compiler still has
    /// to be configured with [`set_compiler`](Self::set_compiler).
    pub fn new() -> Environment {
        Environment::with_loaders([FileSystemLoader::new(".")])
    }

    /// Creates a completely empty environment.
    ///
    /// This environment has no loaders, no filters and no compiler.
    pub fn empty() -> Environment {
        Environment {
            loaders: Vec::new(),
            compiler: None,
            filters: BTreeMap::new(),
            templates: Mutex::default(),
            freshness_policy: FreshnessPolicy::default(),
        }
    }

    /// Creates an environment with the built-in filters and the given loaders.
    ///
    /// The loaders are consulted in the order of the iterator.
    pub fn with_loaders<I, L>(loaders: I) -> Environment
    where
        I: IntoIterator<Item = L>,
        L: SourceProvider + 'static,
    {
        let mut rv = Environment::empty();
        rv.filters = defaults::get_builtin_filters();
        for loader in loaders {
            rv.add_loader(loader);
        }
        rv
    }

    /// Appends a loader.
    ///
    /// Loaders are consulted in the order they were added and the first one
    /// that knows a template wins.
    pub fn add_loader<L>(&mut self, loader: L)
    where
        L: SourceProvider + 'static,
    {
        self.loaders.push(Arc::new(loader));
    }

    /// Replaces all loaders.
    pub fn set_loaders<I, L>(&mut self, loaders: I)
    where
        I: IntoIterator<Item = L>,
        L: SourceProvider + 'static,
    {
        self.clear_loaders();
        for loader in loaders {
            self.add_loader(loader);
        }
    }

    /// Removes all loaders.
    pub fn clear_loaders(&mut self) {
        self.loaders.clear();
    }

    /// Sets the compiler that turns template sources into procedures.
    pub fn set_compiler<C>(&mut self, compiler: C)
    where
        C: TemplateCompiler + 'static,
    {
        self.compiler = Some(Arc::new(compiler));
    }

    /// Returns the configured compiler.
    pub fn compiler(&self) -> Option<&dyn TemplateCompiler> {
        self.compiler.as_deref()
    }

    /// Changes what a missing staleness predicate means.
    ///
    /// The default is [`FreshnessPolicy::AssumeStale`]: templates whose
    /// loader cannot tell whether they changed are loaded again on every
    /// request.  With [`FreshnessPolicy::AssumeFresh`] they stay cached
    /// until [`clear_templates`](Self::clear_templates) is called.
    pub fn set_freshness_policy(&mut self, policy: FreshnessPolicy) {
        self.freshness_policy = policy;
    }

    /// Returns the current freshness policy.
    pub fn freshness_policy(&self) -> FreshnessPolicy {
        self.freshness_policy
    }

    /// Adds a new filter function.
    ///
    /// An existing filter with the same name is replaced.
    pub fn add_filter<N, F>(&mut self, name: N, f: F)
    where
        N: Into<Cow<'static, str>>,
        F: Fn(Value, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), BoxedFilter::new(f));
    }

    /// Removes a filter by name.
    pub fn remove_filter(&mut self, name: &str) {
        self.filters.remove(name);
    }

    /// Looks up a filter.
    pub fn get_filter(&self, name: &str) -> Option<&BoxedFilter> {
        self.filters.get(name)
    }

    pub(crate) fn apply_filter(
        &self,
        name: &str,
        value: Value,
        args: &[Value],
    ) -> Result<Value, Error> {
        match self.get_filter(name) {
            Some(filter) => filter.apply_to(value, args),
            None => Err(Error::new(
                ErrorKind::UnknownFilter,
                format!("filter {} is unknown", name),
            )),
        }
    }

    /// Fetches a template by name.
    ///
    /// A cached template that is up to date is returned as is.  Otherwise
    /// the loaders are consulted in order and the template they produce
    /// replaces the cached one.  If no loader knows the template an error of
    /// kind [`TemplateNotFound`](ErrorKind::TemplateNotFound) is returned.
    ///
    /// The template is not compiled; that happens on the first render.
    pub fn get_template(&self, name: &str) -> Result<Template<'_>, Error> {
        self.load_template(name, false)
            .map(|loaded| Template::new(self, loaded))
    }

    /// Fetches a template by name and compiles it before it is returned.
    ///
    /// Unlike [`get_template`](Self::get_template) a template that fails to
    /// compile is not stored in the cache.
    pub fn get_template_eager(&self, name: &str) -> Result<Template<'_>, Error> {
        self.load_template(name, true)
            .map(|loaded| Template::new(self, loaded))
    }

    fn load_template(&self, name: &str, eager: bool) -> Result<Arc<LoadedTemplate>, Error> {
        if let Some(cached) = self.get_cached(name) {
            if cached.is_up_to_date(self.freshness_policy) {
                tracing::trace!(template = name, "template cache hit");
                if eager {
                    ok!(cached
                        .compiled(self)
                        .map_err(|err| err.with_template_name(name)));
                }
                return Ok(cached);
            }
            tracing::debug!(template = name, "cached template is stale");
        } else {
            tracing::debug!(template = name, "template cache miss");
        }

        let source = ok!(self.resolve_source(name));
        let loaded = Arc::new(LoadedTemplate::new(name, source));
        if eager {
            ok!(loaded
                .compiled(self)
                .map_err(|err| err.with_template_name(name)));
        }

        let mut templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        templates.insert(name.into(), loaded.clone());
        Ok(loaded)
    }

    fn get_cached(&self, name: &str) -> Option<Arc<LoadedTemplate>> {
        let templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        templates.get(name).cloned()
    }

    fn resolve_source(&self, name: &str) -> Result<LoadedSource, Error> {
        for (idx, loader) in self.loaders.iter().enumerate() {
            if let Some(source) = ok!(loader.get_source(name)) {
                tracing::debug!(template = name, loader = idx, "resolved template source");
                return Ok(source);
            }
        }
        Err(Error::new_not_found(name))
    }

    /// Creates a template from a string without going through the cache.
    ///
    /// The template is named `<string>`.  As there is no loader behind it,
    /// it never reports to be up to date under the default freshness policy.
    pub fn template_from_str(&self, source: &str) -> Template<'_> {
        self.template_from_named_str("<string>", source)
    }

    /// Like [`template_from_str`](Self::template_from_str) but with a name.
    pub fn template_from_named_str(&self, name: &str, source: &str) -> Template<'_> {
        let loaded = LoadedTemplate::new(name, LoadedSource::new(source));
        Template::new(self, Arc::new(loaded))
    }

    /// Drops all cached templates.
    ///
    /// Handles that were handed out before keep working.
    pub fn clear_templates(&self) {
        let mut templates = self.templates.lock().unwrap_or_else(PoisonError::into_inner);
        templates.clear();
    }

    /// Creates a render hook with no application defaults.
    pub fn render_hook(&self) -> RenderHook<'_> {
        RenderHook::new(self)
    }

    pub(crate) fn compile(&self, name: &str, source: &str) -> Result<CompiledTemplate, Error> {
        let compiler = ok!(self.compiler.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::CompileError, "no template compiler configured")
        }));
        let module = ok!(compiler.compile(name, source, self).map_err(|err| {
            if err.kind() == ErrorKind::CompileError {
                err
            } else {
                Error::new(ErrorKind::CompileError, "template failed to compile").with_source(err)
            }
        }));
        let (root, blocks) = ok!(module.into_parts());
        tracing::debug!(template = name, blocks = blocks.len(), "compiled template");
        Ok(CompiledTemplate { root, blocks })
    }
}
