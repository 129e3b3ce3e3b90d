//! Kiln is the runtime core of a template engine with template inheritance.
//!
//! It does not ship a template language.  Instead it provides everything
//! around one: templates are looked up by name through a list of loaders,
//! compiled exactly once by a pluggable [`TemplateCompiler`], cached until
//! their source changes and rendered against a per-call [`Context`] that
//! resolves variables and the block overrides of inheriting templates.
//!
//! # Usage
//!
//! An [`Environment`] holds loaders, filters, the compiler and the template
//! cache.  Templates are fetched by name with
//! [`get_template`](Environment::get_template) and rendered with any value
//! that implements [`Serialize`](serde::Serialize), for instance with the
//! help of the [`context!`] macro:
//!
//! ```
//! use kiln::{context, Environment, Error, MemoryLoader, Module, Procedure};
//!
//! let loader = MemoryLoader::new();
//! loader.add_template("hello.txt", "Hello");
//!
//! let mut env = Environment::empty();
//! env.add_loader(loader);
//! env.set_compiler(|_: &str, source: &str, _: &Environment| -> Result<Module, Error> {
//!     let greeting = source.to_string();
//!     Ok(Module::new().with_root(Procedure::new(move |state| {
//!         Ok(format!("{}, {}!", greeting, state.format(state.lookup("name"))))
//!     })))
//! });
//!
//! let tmpl = env.get_template("hello.txt").unwrap();
//! println!("{}", tmpl.render(context!(name => "World")).unwrap());
//! ```
//!
//! # Compilation
//!
//! A compiler turns a source into a [`Module`]: a root [`Procedure`] and the
//! bodies of all blocks of the inheritance chain, most derived first.
//! Procedures are either native closures or [`Instructions`] for the
//! built-in [`Vm`].
//!
//! # Inheritance
//!
//! Every block name maps to a [`BlockStack`].  Rendering a block renders the
//! body at the top of the stack.  From within a body `super` renders the
//! next body further down, which is how a child template includes the
//! content of its parent.
//!
//! # Caching
//!
//! Loaders may hand out an `up_to_date` callback with every source.  A cached
//! template is reused for as long as the callback returns `true`.  Templates
//! without a callback follow the [`FreshnessPolicy`] of the environment which
//! by default never reuses them.
//!
//! # Optional Features
//!
//! - `builtins`: registers the built-in [`filters`] on
//!   [`Environment::new`].  Enabled by default.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

#[macro_use]
mod macros;

mod compiler;
mod defaults;
mod environment;
mod error;
mod hook;
mod instructions;
mod loader;
mod template;
mod utils;
mod vm;

pub mod filters;
pub mod value;

pub use self::compiler::{Module, TemplateCompiler, BLOCK_PREFIX, ROOT_EXPORT};
pub use self::environment::Environment;
pub use self::error::{Error, ErrorKind};
pub use self::hook::{RenderHook, LOCALS_KEY};
pub use self::instructions::{Instruction, Instructions};
pub use self::loader::{FileSystemLoader, LoadedSource, MemoryLoader, SourceProvider};
pub use self::template::Template;
pub use self::utils::{FreshnessPolicy, HtmlEscape};
pub use self::vm::{Block, BlockMap, BlockStack, Context, Procedure, State, SuperCall, Vm};
