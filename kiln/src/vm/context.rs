use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::environment::Environment;
use crate::error::Error;
use crate::utils::BTreeMapKeysDebug;
use crate::value::{self, Value, ValueMap, EMPTY_STRING};
use crate::vm::state::State;
use crate::vm::Procedure;

/// Maps block names to their override stacks.
pub type BlockMap = BTreeMap<String, BlockStack>;

/// The override chain of a single block.
///
/// The stack is ordered most derived first: index `0` holds the body of the
/// template that was rendered, the immediate parent follows and the root
/// ancestor comes last.  A body's index in the stack is its depth.
#[derive(Clone, Default)]
pub struct BlockStack {
    procedures: Vec<Procedure>,
}

impl fmt::Debug for BlockStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.procedures.iter()).finish()
    }
}

impl BlockStack {
    /// Creates an empty block stack.
    pub fn new() -> BlockStack {
        BlockStack::default()
    }

    /// Appends a less derived body to the end of the stack.
    pub fn push(&mut self, procedure: Procedure) {
        self.procedures.push(procedure);
    }

    /// Returns the body at the given depth.
    pub fn get(&self, depth: usize) -> Option<&Procedure> {
        self.procedures.get(depth)
    }

    /// Returns the number of bodies in the chain.
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Is the chain empty?
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

impl FromIterator<Procedure> for BlockStack {
    fn from_iter<T: IntoIterator<Item = Procedure>>(iter: T) -> Self {
        BlockStack {
            procedures: iter.into_iter().collect(),
        }
    }
}

/// A resolved block body together with its position in the override chain.
#[derive(Debug, Clone, Copy)]
pub struct Block<'ctx> {
    name: &'ctx str,
    depth: usize,
    procedure: &'ctx Procedure,
}

impl<'ctx> Block<'ctx> {
    /// Returns the name of the block.
    pub fn name(&self) -> &'ctx str {
        self.name
    }

    /// Returns the position of the body in the override chain.
    ///
    /// The most derived body has depth `0`.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the procedure of the body.
    pub fn procedure(&self) -> &'ctx Procedure {
        self.procedure
    }

    /// Renders this body against a context.
    pub fn render(&self, env: &Environment, ctx: &'ctx Context) -> Result<String, Error> {
        self.procedure.invoke(&State::new(env, ctx).with_block(*self))
    }
}

/// A deferred call into the next less derived body of a block.
///
/// Returned by [`Context::get_super`].  Calling it renders the parent body
/// with the same environment and context.
pub struct SuperCall<'ctx, 'env> {
    env: &'env Environment,
    ctx: &'ctx Context,
    block: Block<'ctx>,
}

impl fmt::Debug for SuperCall<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperCall")
            .field("block", &self.block)
            .finish()
    }
}

impl<'ctx, 'env> SuperCall<'ctx, 'env> {
    /// Returns the body this call renders.
    pub fn block(&self) -> Block<'ctx> {
        self.block
    }

    /// Renders the parent body.
    pub fn call(&self) -> Result<String, Error> {
        self.block.render(self.env, self.ctx)
    }
}

/// The per-render scope.
///
/// A context is created for every render call from the render data and the
/// block map of the template.  It resolves variables and implements the
/// block override protocol.  It never changes after construction.
pub struct Context {
    name: Option<Arc<str>>,
    variables: ValueMap,
    blocks: Arc<BlockMap>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .field("blocks", &BTreeMapKeysDebug(&*self.blocks))
            .finish()
    }
}

impl Context {
    /// Creates a context from variables and a block map.
    ///
    /// The block map is shared with the template, it is not copied.
    pub fn new(variables: ValueMap, blocks: Arc<BlockMap>) -> Context {
        Context {
            name: None,
            variables,
            blocks,
        }
    }

    /// Records the name of the template the context renders.
    pub fn with_name(mut self, name: Arc<str>) -> Context {
        self.name = Some(name);
        self
    }

    /// Returns the name of the template being rendered, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Creates a context from any serializable render data.
    ///
    /// The data has to serialize into a map (or to nothing at all, like `()`).
    pub fn from_serialize<S: Serialize>(data: S, blocks: Arc<BlockMap>) -> Result<Context, Error> {
        let value = ok!(value::from_serialize(&data));
        Ok(Context::new(ok!(value::into_context_map(value)), blocks))
    }

    /// Looks up a variable.
    ///
    /// Missing variables are not an error, they resolve to the empty string.
    pub fn lookup(&self, name: &str) -> &Value {
        self.variables.get(name).unwrap_or(&EMPTY_STRING)
    }

    /// Returns all variables of the context.
    pub fn variables(&self) -> &ValueMap {
        &self.variables
    }

    /// Returns the block map.
    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    /// Returns the most derived body of a block.
    ///
    /// Fails with [`UnknownBlock`](crate::ErrorKind::UnknownBlock) if no
    /// template in the chain defines the block.
    pub fn get_block(&self, name: &str) -> Result<Block<'_>, Error> {
        match self.blocks.get_key_value(name) {
            Some((name, stack)) => match stack.get(0) {
                Some(procedure) => Ok(Block {
                    name: name.as_str(),
                    depth: 0,
                    procedure,
                }),
                None => Err(Error::new_unknown_block(name)),
            },
            None => Err(Error::new_unknown_block(name)),
        }
    }

    /// Resolves the body that `super` refers to from within `block`.
    ///
    /// This is the body one position further down the override chain.  Fails
    /// with [`NoSuperBlock`](crate::ErrorKind::NoSuperBlock) if there is no
    /// such body or if `block` is not part of this context's chain.
    pub fn get_super<'ctx, 'env>(
        &'ctx self,
        env: &'env Environment,
        block: &Block<'_>,
    ) -> Result<SuperCall<'ctx, 'env>, Error> {
        let (name, stack) = ok!(self
            .blocks
            .get_key_value(block.name())
            .ok_or_else(|| Error::new_no_super_block(block.name())));
        if !stack
            .get(block.depth())
            .map_or(false, |current| current.ptr_eq(block.procedure()))
        {
            return Err(Error::new_no_super_block(name));
        }
        let depth = block.depth() + 1;
        match stack.get(depth) {
            Some(procedure) => Ok(SuperCall {
                env,
                ctx: self,
                block: Block {
                    name: name.as_str(),
                    depth,
                    procedure,
                },
            }),
            None => Err(Error::new_no_super_block(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use similar_asserts::assert_eq;

    fn text(s: &'static str) -> Procedure {
        Procedure::new(move |_| Ok(s.to_string()))
    }

    fn chain() -> Arc<BlockMap> {
        let mut blocks = BlockMap::new();
        blocks.insert(
            "body".into(),
            [text("child"), text("parent"), text("grandparent")]
                .into_iter()
                .collect(),
        );
        Arc::new(blocks)
    }

    #[test]
    fn test_lookup_missing_is_empty_string() {
        let ctx = Context::from_serialize(json!({"name": "James"}), Arc::default()).unwrap();
        assert_eq!(ctx.lookup("name"), &json!("James"));
        assert_eq!(ctx.lookup("missing"), &json!(""));
        let ctx = Context::new(ValueMap::new(), Arc::default());
        assert_eq!(ctx.lookup("anything"), &json!(""));
    }

    #[test]
    fn test_get_block_returns_most_derived() {
        let env = Environment::empty();
        let ctx = Context::new(ValueMap::new(), chain());
        let block = ctx.get_block("body").unwrap();
        assert_eq!(block.name(), "body");
        assert_eq!(block.depth(), 0);
        assert_eq!(block.render(&env, &ctx).unwrap(), "child");
    }

    #[test]
    fn test_unknown_block() {
        let ctx = Context::new(ValueMap::new(), chain());
        let err = ctx.get_block("footer").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnknownBlock);
        assert_eq!(err.to_string(), "unknown block: block \"footer\" is not defined");

        let mut blocks = BlockMap::new();
        blocks.insert("empty".into(), BlockStack::new());
        let ctx = Context::new(ValueMap::new(), Arc::new(blocks));
        assert_eq!(
            ctx.get_block("empty").unwrap_err().kind(),
            crate::ErrorKind::UnknownBlock
        );
    }

    #[test]
    fn test_super_walks_the_chain() {
        let env = Environment::empty();
        let ctx = Context::new(ValueMap::new(), chain());

        let child = ctx.get_block("body").unwrap();
        let parent = ctx.get_super(&env, &child).unwrap();
        assert_eq!(parent.block().depth(), 1);
        assert_eq!(parent.call().unwrap(), "parent");

        let grandparent = ctx.get_super(&env, &parent.block()).unwrap();
        assert_eq!(grandparent.block().depth(), 2);
        assert_eq!(grandparent.call().unwrap(), "grandparent");

        let err = ctx.get_super(&env, &grandparent.block()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NoSuperBlock);
        assert_eq!(
            err.to_string(),
            "no super block: block \"body\" has no parent body"
        );
    }

    #[test]
    fn test_super_rejects_foreign_block() {
        let env = Environment::empty();
        let ctx = Context::new(ValueMap::new(), chain());
        let other = Context::new(ValueMap::new(), chain());
        let foreign = other.get_block("body").unwrap();
        let err = ctx.get_super(&env, &foreign).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NoSuperBlock);
    }

    #[test]
    fn test_blocks_are_shared() {
        let blocks = chain();
        let ctx = Context::new(ValueMap::new(), blocks.clone());
        assert!(std::ptr::eq(ctx.blocks(), &*blocks));
    }
}
