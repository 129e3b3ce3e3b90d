//! The compiler interface.
//!
//! Turning template markup into something executable is not done by this
//! crate.  Instead an implementation of [`TemplateCompiler`] is registered on
//! the [`Environment`] and invoked whenever a template needs compiling.  The
//! compiler produces a [`Module`]: a list of named exports.
//!
//! * the export named [`ROOT_EXPORT`] is the root procedure that renders the
//!   template,
//! * every export whose name starts with [`BLOCK_PREFIX`] is a block body, the
//!   rest of the name being the block's name.
//!
//! A compiler flattens an inheritance chain into the module: for every block
//! it emits the body of the most derived template first and the bodies of the
//! ancestors after it, in inheritance order.
//!
//! ```
//! # use kiln::{Environment, Error, Module, Procedure};
//! let mut env = Environment::empty();
//! env.set_compiler(|_name: &str, source: &str, _env: &Environment| -> Result<Module, Error> {
//!     let text = source.to_string();
//!     Ok(Module::new().with_root(Procedure::new(move |_| Ok(text.clone()))))
//! });
//! ```
use std::fmt;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::vm::{BlockMap, Procedure};

/// The name of the root export.
pub const ROOT_EXPORT: &str = "root";

/// The prefix that marks an export as block body.
pub const BLOCK_PREFIX: &str = "b_";

/// Compiles template sources into executable modules.
///
/// Plain functions and closures with the signature of
/// [`compile`](Self::compile) implement this trait.
pub trait TemplateCompiler: Send + Sync {
    /// Compiles a template source.
    ///
    /// Failures should be reported with
    /// [`ErrorKind::CompileError`](crate::ErrorKind::CompileError).  Errors of
    /// other kinds are wrapped into a compile error by the engine.
    fn compile(&self, name: &str, source: &str, env: &Environment) -> Result<Module, Error>;
}

impl<F> TemplateCompiler for F
where
    F: Fn(&str, &str, &Environment) -> Result<Module, Error> + Send + Sync,
{
    fn compile(&self, name: &str, source: &str, env: &Environment) -> Result<Module, Error> {
        self(name, source, env)
    }
}

/// The executable unit a compiler produces.
#[derive(Default, Clone)]
pub struct Module {
    exports: Vec<(String, Procedure)>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.exports.iter().map(|x| &x.0))
            .finish()
    }
}

impl Module {
    /// Creates an empty module.
    pub fn new() -> Module {
        Module::default()
    }

    /// Adds an export under its raw name.
    pub fn add_export<N: Into<String>>(&mut self, name: N, procedure: Procedure) {
        self.exports.push((name.into(), procedure));
    }

    /// Sets the root procedure.
    pub fn set_root(&mut self, procedure: Procedure) {
        self.add_export(ROOT_EXPORT, procedure);
    }

    /// Adds a block body.
    ///
    /// Bodies for the same block must be added most derived first.
    pub fn add_block(&mut self, name: &str, procedure: Procedure) {
        self.add_export(format!("{}{}", BLOCK_PREFIX, name), procedure);
    }

    /// Sets the root procedure, builder style.
    pub fn with_root(mut self, procedure: Procedure) -> Module {
        self.set_root(procedure);
        self
    }

    /// Adds a block body, builder style.
    pub fn with_block(mut self, name: &str, procedure: Procedure) -> Module {
        self.add_block(name, procedure);
        self
    }

    /// Iterates over all exports in emission order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &Procedure)> {
        self.exports.iter().map(|(name, proc)| (name.as_str(), proc))
    }

    /// Splits the module into the root procedure and the block map.
    ///
    /// Exports that are neither the root nor a block are ignored.
    pub(crate) fn into_parts(self) -> Result<(Procedure, Arc<BlockMap>), Error> {
        let mut root = None;
        let mut blocks = BlockMap::new();

        for (name, procedure) in self.exports {
            if name == ROOT_EXPORT {
                if root.is_some() {
                    return Err(Error::new(
                        ErrorKind::CompileError,
                        "module has more than one root export",
                    ));
                }
                root = Some(procedure);
            } else if let Some(block_name) = name.strip_prefix(BLOCK_PREFIX) {
                if block_name.is_empty() {
                    return Err(Error::new(
                        ErrorKind::CompileError,
                        "block export without a block name",
                    ));
                }
                blocks.entry(block_name.to_string()).or_default().push(procedure);
            }
        }

        match root {
            Some(root) => Ok((root, Arc::new(blocks))),
            None => Err(Error::new(
                ErrorKind::CompileError,
                "module has no root export",
            )),
        }
    }
}
