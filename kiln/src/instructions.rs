use std::fmt;

use crate::value::Value;

/// Represents an instruction for the VM.
///
/// Instructions are the executable form a [`TemplateCompiler`](crate::TemplateCompiler)
/// can emit instead of native closures.  They operate on a value stack:
/// `Lookup` and `LoadConst` push, `ApplyFilter` replaces the top of the
/// stack, `Emit` pops and writes to the output.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Emits raw source
    EmitRaw(String),

    /// Load a variable,
    Lookup(String),

    /// Loads a constant value.
    LoadConst(Value),

    /// Applies a named filter.
    ///
    /// The argument count excludes the filtered value itself.  Arguments are
    /// on the stack above the value in the order they were pushed.
    ApplyFilter(String, usize),

    /// Writes the top of the stack to the output.
    Emit,

    /// Renders the most derived body of a block into the output.
    CallBlock(String),

    /// Renders the next less derived body of the current block.
    FastSuper,
}

/// An ordered list of instructions forming one procedure body.
#[derive(Clone, Default, PartialEq)]
pub struct Instructions {
    instructions: Vec<Instruction>,
}

impl Instructions {
    /// Creates a new empty instruction list.
    pub fn new() -> Instructions {
        Instructions::default()
    }

    /// Adds a new instruction and returns its index.
    pub fn add(&mut self, instr: Instruction) -> usize {
        let rv = self.instructions.len();
        self.instructions.push(instr);
        rv
    }

    /// Adds a new instruction, builder style.
    pub fn with(mut self, instr: Instruction) -> Instructions {
        self.add(instr);
        self
    }

    /// Returns an instruction by index
    pub fn get(&self, idx: usize) -> Option<&Instruction> {
        self.instructions.get(idx)
    }

    /// Iterates over all instructions.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Returns the number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Do we have any instructions?
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl FromIterator<Instruction> for Instructions {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Instructions {
            instructions: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct InstructionWrapper<'a>(usize, &'a Instruction);

        impl fmt::Debug for InstructionWrapper<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:>05x} | {:?}", self.0, self.1)
            }
        }

        let mut list = f.debug_list();
        for (idx, instr) in self.instructions.iter().enumerate() {
            list.entry(&InstructionWrapper(idx, instr));
        }
        list.finish()
    }
}

#[test]
fn test_builder() {
    let instrs = Instructions::new()
        .with(Instruction::EmitRaw("Hello, ".into()))
        .with(Instruction::Lookup("name".into()))
        .with(Instruction::Emit);
    assert_eq!(instrs.len(), 3);
    assert_eq!(instrs.get(1), Some(&Instruction::Lookup("name".into())));
    assert_eq!(instrs.get(3), None);
    assert!(Instructions::new().is_empty());
}
