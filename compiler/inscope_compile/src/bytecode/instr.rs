//! The instruction set.

use inscope_ir::ast::{BinaryOp, CompareOp, UnaryOp};

/// `MakeFunction` operand bits: which optional pieces sit below the code on the stack.
pub mod make_function {
    /// A tuple of positional defaults.
    pub const DEFAULTS: u8 = 0x01;
    /// A dict of keyword-only defaults, keyed by parameter name.
    pub const KWDEFAULTS: u8 = 0x02;
    /// A tuple of closure cells, one per free variable of the code.
    pub const CLOSURE: u8 = 0x08;
}

/// One stack-machine instruction.
///
/// Operands index into the owning [`CodeObject`](super::CodeObject):
/// `LoadConst` into `constants`, `*Fast` into `varnames`, `*Deref` and
/// `LoadClosure` into `cellvars ++ freevars`, and the global, name and
/// attribute forms into `names`. Jump targets are absolute instruction
/// indices, except `JumpForward`, whose operand counts instructions after
/// the jump itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instr {
    LoadConst(u32),
    LoadFast(u32),
    StoreFast(u32),
    LoadDeref(u32),
    StoreDeref(u32),
    /// Push the cell object itself, for building a closure tuple.
    LoadClosure(u32),
    /// Class bodies: look in the class namespace first, then the cell.
    LoadClassDeref(u32),
    LoadGlobal(u32),
    StoreGlobal(u32),
    /// Class bodies: class namespace, then globals, then builtins.
    LoadName(u32),
    StoreName(u32),
    LoadAttr(u32),
    StoreAttr(u32),
    LoadSubscript,
    StoreSubscript,

    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CompareOp),

    BuildList(u32),
    BuildTuple(u32),
    /// Pops `2 * n` values: key, value pairs in push order.
    BuildDict(u32),
    /// Replace a sequence of exactly `n` items with its items, first on top.
    UnpackSequence(u32),

    /// Call with `n` positional arguments.
    Call(u32),
    /// Call with `n` arguments, the last `k` of them keyword arguments whose
    /// names come from the `Constant::Names` tuple on top of the stack.
    CallKw(u32),
    MakeFunction(u8),
    /// Push the class-construction builtin.
    LoadBuildClass,

    Jump(u32),
    JumpIfFalse(u32),
    JumpIfTrue(u32),
    /// Jump and keep the top if it is falsy, otherwise pop it.
    JumpIfFalseOrPop(u32),
    /// Jump and keep the top if it is truthy, otherwise pop it.
    JumpIfTrueOrPop(u32),
    JumpForward(u32),
    GetIter,
    /// Push the next item, or pop the exhausted iterator and jump.
    ForIter(u32),

    Pop,
    Dup,
    DupTwo,
    Rot2,
    Rot3,

    YieldValue,
    Await,
    Raise,
    /// Pop a message and raise `AssertionError`.
    RaiseAssert,
    ReturnValue,
    /// Push a dict of the frame's bound locals, cells and free variables.
    SnapshotLocals,
}

impl Instr {
    /// Absolute jump target, if this is an absolute jump.
    pub fn jump_target(self) -> Option<u32> {
        match self {
            Instr::Jump(t)
            | Instr::JumpIfFalse(t)
            | Instr::JumpIfTrue(t)
            | Instr::JumpIfFalseOrPop(t)
            | Instr::JumpIfTrueOrPop(t)
            | Instr::ForIter(t) => Some(t),
            _ => None,
        }
    }

    /// The same jump aimed at `target`. Non-jumps are returned unchanged.
    #[must_use]
    pub fn with_target(self, target: u32) -> Instr {
        match self {
            Instr::Jump(_) => Instr::Jump(target),
            Instr::JumpIfFalse(_) => Instr::JumpIfFalse(target),
            Instr::JumpIfTrue(_) => Instr::JumpIfTrue(target),
            Instr::JumpIfFalseOrPop(_) => Instr::JumpIfFalseOrPop(target),
            Instr::JumpIfTrueOrPop(_) => Instr::JumpIfTrueOrPop(target),
            Instr::ForIter(_) => Instr::ForIter(target),
            other => other,
        }
    }
}
