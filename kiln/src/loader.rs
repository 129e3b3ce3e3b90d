//! Template source providers.
//!
//! The [`Environment`](crate::Environment) does not know where templates come
//! from.  It asks its loaders, in the order they were added, until one of
//! them returns a [`LoadedSource`].  A loaded source carries the template
//! text, an optional path for diagnostics and an optional `up_to_date`
//! callback that tells the environment whether a cached template compiled
//! from it may still be used.
//!
//! Two loaders ship with the crate:
//!
//! * [`FileSystemLoader`] looks templates up in a list of directories.
//! * [`MemoryLoader`] holds templates in memory and can be updated at runtime.
//!
//! Any closure of the shape `Fn(&str) -> Result<Option<LoadedSource>, Error>`
//! can be used as loader as well.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::SystemTime;

use crate::error::{Error, ErrorKind};

pub(crate) type UpToDateFunc = dyn Fn() -> bool + Send + Sync;

/// The result of a successful template lookup.
pub struct LoadedSource {
    source: String,
    path: Option<PathBuf>,
    up_to_date: Option<Box<UpToDateFunc>>,
}

impl fmt::Debug for LoadedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedSource")
            .field("source", &self.source)
            .field("path", &self.path)
            .field("has_up_to_date", &self.up_to_date.is_some())
            .finish()
    }
}

impl LoadedSource {
    /// Creates a loaded source without path and staleness callback.
    pub fn new<S: Into<String>>(source: S) -> LoadedSource {
        LoadedSource {
            source: source.into(),
            path: None,
            up_to_date: None,
        }
    }

    /// Attaches the path the source was loaded from.
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> LoadedSource {
        self.path = Some(path.into());
        self
    }

    /// Attaches a callback that reports if templates compiled from this
    /// source are still current.
    pub fn with_up_to_date<F>(mut self, f: F) -> LoadedSource
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.up_to_date = Some(Box::new(f));
        self
    }

    /// Returns the template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the path if known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn into_parts(self) -> (String, Option<PathBuf>, Option<Box<UpToDateFunc>>) {
        (self.source, self.path, self.up_to_date)
    }
}

/// A source of templates.
pub trait SourceProvider: Send + Sync {
    /// Looks up the source of a template.
    ///
    /// Returns `Ok(None)` if this loader does not know the template so that
    /// the next loader gets a chance.  Errors abort the lookup.
    fn get_source(&self, name: &str) -> Result<Option<LoadedSource>, Error>;
}

impl<F> SourceProvider for F
where
    F: Fn(&str) -> Result<Option<LoadedSource>, Error> + Send + Sync,
{
    fn get_source(&self, name: &str) -> Result<Option<LoadedSource>, Error> {
        self(name)
    }
}

/// Safely joins two paths.
pub fn safe_join(base: &Path, template: &str) -> Option<PathBuf> {
    let mut rv = base.to_path_buf();
    for segment in template.split('/') {
        if segment.starts_with('.') || segment.contains('\\') {
            return None;
        }
        rv.push(segment);
    }
    Some(rv)
}

fn modified(path: &Path) -> Option<SystemTime> {
    let metadata = some!(fs::metadata(path).ok());
    metadata.modified().ok()
}

/// Loads templates from a list of directories.
///
/// The directories are searched in order.  Templates that start with a dot
/// (`.`) or are contained in a folder starting with a dot cannot be loaded.
/// Loaded templates are considered current for as long as the modification
/// time of their file does not change.
///
/// ```rust
/// # use kiln::{Environment, FileSystemLoader};
/// fn create_env() -> Environment {
///     let mut env = Environment::empty();
///     env.add_loader(FileSystemLoader::new("path/to/templates"));
///     env
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    search_paths: Vec<PathBuf>,
}

impl Default for FileSystemLoader {
    fn default() -> Self {
        FileSystemLoader::new(".")
    }
}

impl FileSystemLoader {
    /// Creates a loader for a single directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> FileSystemLoader {
        FileSystemLoader {
            search_paths: vec![dir.as_ref().to_path_buf()],
        }
    }

    /// Creates a loader that searches multiple directories in order.
    pub fn with_search_paths<I, P>(dirs: I) -> FileSystemLoader
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        FileSystemLoader {
            search_paths: dirs.into_iter().map(|x| x.as_ref().to_path_buf()).collect(),
        }
    }

    /// Adds another directory to the end of the search path.
    pub fn add_search_path<P: AsRef<Path>>(&mut self, dir: P) {
        self.search_paths.push(dir.as_ref().to_path_buf());
    }

    /// Returns the search path.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl SourceProvider for FileSystemLoader {
    fn get_source(&self, name: &str) -> Result<Option<LoadedSource>, Error> {
        for dir in &self.search_paths {
            let path = match safe_join(dir, name) {
                Some(path) => path,
                None => return Ok(None),
            };
            if path.is_dir() {
                continue;
            }
            let mtime = modified(&path);
            match fs::read_to_string(&path) {
                Ok(source) => {
                    tracing::debug!(
                        template = name,
                        path = %path.display(),
                        "loaded template from file system"
                    );
                    let watched = path.clone();
                    let up_to_date = move || mtime.is_some() && modified(&watched) == mtime;
                    return Ok(Some(
                        LoadedSource::new(source)
                            .with_path(path)
                            .with_up_to_date(up_to_date),
                    ));
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::warn!(
                        template = name,
                        path = %path.display(),
                        error = %err,
                        "could not read template"
                    );
                    return Err(Error::new(
                        ErrorKind::InvalidOperation,
                        "could not read template",
                    )
                    .with_source(err));
                }
            }
        }
        Ok(None)
    }
}

#[derive(Default)]
struct MemoryStore {
    templates: BTreeMap<String, (Arc<str>, u64)>,
    revision: u64,
}

/// Holds templates in memory.
///
/// The loader can be cloned; clones share the same templates.  This allows
/// one handle to be registered on an environment while another one is used
/// to update sources.  Every update gives the template a new revision which
/// makes previously loaded versions stale.
///
/// ```rust
/// # use kiln::{Environment, MemoryLoader};
/// let loader = MemoryLoader::new();
/// loader.add_template("hello.txt", "Hello!");
/// let mut env = Environment::empty();
/// env.add_loader(loader.clone());
/// ```
#[derive(Clone, Default)]
pub struct MemoryLoader {
    store: Arc<Mutex<MemoryStore>>,
}

impl fmt::Debug for MemoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_list().entries(store.templates.keys()).finish()
    }
}

impl MemoryLoader {
    /// Creates an empty memory loader.
    pub fn new() -> MemoryLoader {
        MemoryLoader::default()
    }

    /// Adds or replaces a template.
    pub fn add_template<N, S>(&self, name: N, source: S)
    where
        N: Into<String>,
        S: Into<String>,
    {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.revision += 1;
        let revision = store.revision;
        store
            .templates
            .insert(name.into(), (source.into().into(), revision));
    }

    /// Removes a template.
    pub fn remove_template(&self, name: &str) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.templates.remove(name);
    }

    /// Checks if a template is known.
    pub fn contains(&self, name: &str) -> bool {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.templates.contains_key(name)
    }
}

fn is_current_revision(store: &Weak<Mutex<MemoryStore>>, name: &str, revision: u64) -> bool {
    let store = match store.upgrade() {
        Some(store) => store,
        None => return false,
    };
    let store = store.lock().unwrap_or_else(PoisonError::into_inner);
    store
        .templates
        .get(name)
        .map_or(false, |(_, current)| *current == revision)
}

impl SourceProvider for MemoryLoader {
    fn get_source(&self, name: &str) -> Result<Option<LoadedSource>, Error> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let (source, revision) = match store.templates.get(name) {
            Some((source, revision)) => (source.clone(), *revision),
            None => return Ok(None),
        };
        let weak = Arc::downgrade(&self.store);
        let name = name.to_string();
        Ok(Some(LoadedSource::new(&*source).with_up_to_date(move || {
            is_current_revision(&weak, &name, revision)
        })))
    }
}
