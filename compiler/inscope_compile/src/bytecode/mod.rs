//! Compiled code objects.
//!
//! A [`CodeObject`] is the unit of compilation: one per module, function
//! body and class body. Code objects are immutable once built and shared
//! through `Rc`; nested bodies live in the constant pool as
//! [`Constant::Code`].

mod constant;
mod instr;

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use inscope_ir::Name;

pub use constant::{Constant, Marker};
pub use instr::{make_function, Instr};

bitflags! {
    /// Properties of a code object fixed at compile time.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct CodeFlags: u32 {
        /// Takes `*args`.
        const VARARGS = 1 << 0;
        /// Takes `**kwargs`.
        const VARKEYWORDS = 1 << 1;
        /// Body contains `yield`.
        const GENERATOR = 1 << 2;
        /// `async def` without `yield`.
        const COROUTINE = 1 << 3;
        /// `async def` with `yield`.
        const ASYNC_GENERATOR = 1 << 4;
        /// Defined inside another function.
        const NESTED = 1 << 5;
    }
}

/// A compiled body.
#[derive(Clone, Debug)]
pub struct CodeObject {
    pub name: Name,
    /// Dotted path including enclosing definitions, e.g. `outer.<locals>.inner`.
    pub qualname: Rc<str>,
    pub instructions: Vec<Instr>,
    pub constants: Vec<Constant>,
    /// Global, attribute and class-body names.
    pub names: Vec<Name>,
    /// Fast locals: parameters first, in slot order, then other locals.
    pub varnames: Vec<Name>,
    /// Locals captured by nested bodies.
    pub cellvars: Vec<Name>,
    /// Names captured from enclosing bodies.
    pub freevars: Vec<Name>,
    /// Positional parameters.
    pub arg_count: u32,
    pub kwonly_count: u32,
    pub flags: CodeFlags,
    /// `(cell index, varnames slot)` for parameters that live in cells.
    pub cell_params: Vec<(u32, u32)>,
}

impl CodeObject {
    /// Name of the `index`-th deref slot (`cellvars ++ freevars`).
    pub fn deref_name(&self, index: u32) -> Option<Name> {
        let index = index as usize;
        match index.checked_sub(self.cellvars.len()) {
            None => self.cellvars.get(index).copied(),
            Some(free) => self.freevars.get(free).copied(),
        }
    }

    /// Whether the `index`-th deref slot is one of `freevars`.
    pub fn is_free_slot(&self, index: u32) -> bool {
        let index = index as usize;
        index >= self.cellvars.len() && index < self.cellvars.len() + self.freevars.len()
    }

    /// Total parameter slots, including `*args` and `**kwargs`.
    pub fn param_count(&self) -> usize {
        let mut count = (self.arg_count + self.kwonly_count) as usize;
        if self.flags.contains(CodeFlags::VARARGS) {
            count += 1;
        }
        if self.flags.contains(CodeFlags::VARKEYWORDS) {
            count += 1;
        }
        count
    }

    pub fn is_generator(&self) -> bool {
        self.flags.contains(CodeFlags::GENERATOR)
    }

    /// Nested code objects in the constant pool, in pool order.
    pub fn nested(&self) -> impl Iterator<Item = &Rc<CodeObject>> {
        self.constants.iter().filter_map(|c| match c {
            Constant::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Human-readable operand annotation for the disassembler.
    fn annotate(&self, instr: Instr) -> Option<String> {
        let name_at = |i: u32| self.names.get(i as usize).map(|n| n.to_string());
        match instr {
            Instr::LoadConst(i) => self.constants.get(i as usize).map(ToString::to_string),
            Instr::LoadFast(i) | Instr::StoreFast(i) => {
                self.varnames.get(i as usize).map(|n| n.to_string())
            }
            Instr::LoadDeref(i)
            | Instr::StoreDeref(i)
            | Instr::LoadClosure(i)
            | Instr::LoadClassDeref(i) => self.deref_name(i).map(|n| n.to_string()),
            Instr::LoadGlobal(i)
            | Instr::StoreGlobal(i)
            | Instr::LoadName(i)
            | Instr::StoreName(i)
            | Instr::LoadAttr(i)
            | Instr::StoreAttr(i) => name_at(i),
            _ => None,
        }
    }
}

/// Disassembly listing, nested bodies included.
impl fmt::Display for CodeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "code {} ({:?})", self.qualname, self.flags)?;
        for (pc, instr) in self.instructions.iter().enumerate() {
            match self.annotate(*instr) {
                Some(note) => writeln!(f, "{pc:>5} {instr:?} ({note})")?,
                None => writeln!(f, "{pc:>5} {instr:?}")?,
            }
        }
        for code in self.nested() {
            writeln!(f)?;
            write!(f, "{code}")?;
        }
        Ok(())
    }
}
