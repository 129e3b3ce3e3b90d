use std::fmt;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::instructions::{Instruction, Instructions};
use crate::value::{write_value, Value};

pub use crate::vm::context::{Block, BlockMap, BlockStack, Context, SuperCall};
pub use crate::vm::state::State;

mod context;
mod state;

type NativeFunc = dyn Fn(&State<'_, '_>) -> Result<String, Error> + Send + Sync;

/// An executable render procedure.
///
/// Compiled templates consist of a root procedure and any number of block
/// procedures.  A procedure is either a native Rust closure or a list of
/// [`Instructions`] that is interpreted by the [`Vm`].  Both receive the
/// current [`State`] which gives access to the environment, the render
/// context and the block that is being rendered.
///
/// Procedures are cheap to clone as they are reference counted.
#[derive(Clone)]
pub struct Procedure(Arc<ProcedureRepr>);

enum ProcedureRepr {
    Native(Box<NativeFunc>),
    Instructions(Instructions),
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            ProcedureRepr::Native(_) => f.write_str("Procedure(<native>)"),
            ProcedureRepr::Instructions(ref instrs) => {
                f.debug_tuple("Procedure").field(instrs).finish()
            }
        }
    }
}

impl Procedure {
    /// Creates a procedure from a native closure.
    ///
    /// ```
    /// # use kiln::Procedure;
    /// let proc = Procedure::new(|state| {
    ///     Ok(format!("Hello, {}", state.format(state.lookup("name"))))
    /// });
    /// ```
    pub fn new<F>(f: F) -> Procedure
    where
        F: Fn(&State<'_, '_>) -> Result<String, Error> + Send + Sync + 'static,
    {
        Procedure(Arc::new(ProcedureRepr::Native(Box::new(f))))
    }

    /// Creates a procedure that is interpreted by the [`Vm`].
    pub fn from_instructions(instructions: Instructions) -> Procedure {
        Procedure(Arc::new(ProcedureRepr::Instructions(instructions)))
    }

    /// Returns the instructions if this procedure is interpreted.
    pub fn instructions(&self) -> Option<&Instructions> {
        match *self.0 {
            ProcedureRepr::Instructions(ref instrs) => Some(instrs),
            ProcedureRepr::Native(_) => None,
        }
    }

    /// Invokes the procedure and returns the rendered output.
    pub fn invoke(&self, state: &State<'_, '_>) -> Result<String, Error> {
        match *self.0 {
            ProcedureRepr::Native(ref f) => f(state),
            ProcedureRepr::Instructions(ref instrs) => Vm::new(state.env()).eval(instrs, state),
        }
    }

    /// Checks if two handles refer to the same procedure.
    pub fn ptr_eq(&self, other: &Procedure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Default)]
struct Stack {
    values: Vec<Value>,
}

impl Stack {
    fn push(&mut self, arg: Value) {
        self.values.push(arg);
    }

    fn pop(&mut self) -> Result<Value, Error> {
        self.values.pop().ok_or_else(stack_underflow)
    }

    fn pop_many(&mut self, n: usize) -> Result<Vec<Value>, Error> {
        if n > self.values.len() {
            return Err(stack_underflow());
        }
        Ok(self.values.split_off(self.values.len() - n))
    }
}

fn stack_underflow() -> Error {
    Error::new(ErrorKind::InvalidOperation, "stack underflow")
}

/// Interprets [`Instructions`] against a render [`State`].
pub struct Vm<'env> {
    env: &'env Environment,
}

impl<'env> Vm<'env> {
    /// Creates a new VM.
    pub fn new(env: &'env Environment) -> Vm<'env> {
        Vm { env }
    }

    /// Evaluates the given instructions against a state and returns the
    /// rendered output.
    pub fn eval(
        &self,
        instructions: &Instructions,
        state: &State<'_, '_>,
    ) -> Result<String, Error> {
        let mut out = String::new();
        let mut stack = Stack::default();

        for instr in instructions.iter() {
            match instr {
                Instruction::EmitRaw(val) => {
                    out.push_str(val);
                }
                Instruction::Lookup(name) => {
                    stack.push(state.lookup(name).clone());
                }
                Instruction::LoadConst(value) => {
                    stack.push(value.clone());
                }
                Instruction::ApplyFilter(name, arg_count) => {
                    let args = ok!(stack.pop_many(*arg_count));
                    let value = ok!(stack.pop());
                    stack.push(ok!(self.env.apply_filter(name, value, &args)));
                }
                Instruction::Emit => {
                    let value = ok!(stack.pop());
                    ok!(write_value(&mut out, &value).map_err(Error::from));
                }
                Instruction::CallBlock(name) => {
                    out.push_str(&ok!(state.render_block(name)));
                }
                Instruction::FastSuper => {
                    out.push_str(&ok!(state.render_super()));
                }
            }
        }

        Ok(out)
    }
}
