use std::fmt;

use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::value::{to_output_string, Value};
use crate::vm::context::{Block, Context};

/// Provides access to the current execution state of the engine.
///
/// A read only reference is passed to every [`Procedure`](crate::Procedure).
/// Through it procedures look up variables, dispatch to blocks and `super`,
/// and apply filters.
///
/// **Notes on lifetimes:** the state object exposes some of the internal
/// lifetimes through the type.  You should always elide these lifetimes
/// as there might be lifetimes added or removed between releases.
pub struct State<'ctx, 'env> {
    env: &'env Environment,
    ctx: &'ctx Context,
    current_block: Option<Block<'ctx>>,
}

impl fmt::Debug for State<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ds = f.debug_struct("State");
        ds.field("current_block", &self.current_block());
        ds.field("ctx", &self.ctx);
        ds.field("env", &self.env);
        ds.finish()
    }
}

impl<'ctx, 'env> State<'ctx, 'env> {
    /// Creates a new state outside of any block.
    pub fn new(env: &'env Environment, ctx: &'ctx Context) -> State<'ctx, 'env> {
        State {
            env,
            ctx,
            current_block: None,
        }
    }

    pub(crate) fn with_block(mut self, block: Block<'ctx>) -> State<'ctx, 'env> {
        self.current_block = Some(block);
        self
    }

    /// Returns a reference to the current environment.
    #[inline(always)]
    pub fn env(&self) -> &'env Environment {
        self.env
    }

    /// Returns a reference to the render context.
    #[inline(always)]
    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    /// Returns the name of the template being rendered.
    #[inline(always)]
    pub fn name(&self) -> Option<&'ctx str> {
        self.ctx.name()
    }

    /// Returns the name of the block being rendered.
    #[inline(always)]
    pub fn current_block(&self) -> Option<&'ctx str> {
        self.current_block.map(|x| x.name())
    }

    /// Returns the block body being rendered together with its depth.
    pub fn block(&self) -> Option<Block<'ctx>> {
        self.current_block
    }

    /// Looks up a variable by name in the context.
    ///
    /// Missing variables resolve to the empty string.
    #[inline(always)]
    pub fn lookup(&self, name: &str) -> &'ctx Value {
        self.ctx.lookup(name)
    }

    /// Renders the most derived body of a block.
    pub fn render_block(&self, name: &str) -> Result<String, Error> {
        let block = ok!(self.ctx.get_block(name));
        block.render(self.env, self.ctx)
    }

    /// Renders the next less derived body of the current block.
    ///
    /// This is what `super()` in a block body resolves to.
    pub fn render_super(&self) -> Result<String, Error> {
        let block = ok!(self.current_block.ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "cannot super outside of block")
        }));
        ok!(self.ctx.get_super(self.env, &block)).call()
    }

    /// Invokes a filter with some arguments.
    ///
    /// ```
    /// # use kiln::{Environment, State, Context};
    /// # let env = Environment::new();
    /// # let ctx = Context::new(Default::default(), Default::default());
    /// # let state = State::new(&env, &ctx);
    /// let rv = state.apply_filter("upper", "hello world".into(), &[]).unwrap();
    /// assert_eq!(rv.as_str(), Some("HELLO WORLD"));
    /// ```
    pub fn apply_filter(&self, filter: &str, value: Value, args: &[Value]) -> Result<Value, Error> {
        self.env.apply_filter(filter, value, args)
    }

    /// Formats a value for the output.
    pub fn format(&self, value: &Value) -> String {
        to_output_string(value)
    }
}
