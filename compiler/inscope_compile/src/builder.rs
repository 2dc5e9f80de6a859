//! Incremental construction of a [`CodeObject`].
//!
//! Jumps are emitted against [`Label`]s and patched in [`CodeBuilder::finish`],
//! so forward branches need no second pass over the tree. Names are pooled
//! with `IndexSet` so each distinct name gets one stable slot.

use std::rc::Rc;

use indexmap::IndexSet;
use inscope_ir::{Name, Span};
use rustc_hash::FxBuildHasher;

use crate::bytecode::{CodeFlags, CodeObject, Constant, Instr};
use crate::CompileError;

type NameSet = IndexSet<Name, FxBuildHasher>;

/// A jump target, bound to an instruction index at most once.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Label(u32);

pub(crate) struct CodeBuilder {
    name: Name,
    qualname: Rc<str>,
    instructions: Vec<Instr>,
    constants: Vec<Constant>,
    names: NameSet,
    varnames: NameSet,
    cellvars: Vec<Name>,
    freevars: Vec<Name>,
    arg_count: u32,
    kwonly_count: u32,
    flags: CodeFlags,
    cell_params: Vec<(u32, u32)>,
    labels: Vec<Option<u32>>,
    /// Instructions whose target is a label, patched in `finish`.
    forward_refs: Vec<(usize, Label)>,
}

impl CodeBuilder {
    pub(crate) fn new(name: Name, qualname: &str) -> Self {
        CodeBuilder {
            name,
            qualname: Rc::from(qualname),
            instructions: Vec::new(),
            constants: Vec::new(),
            names: NameSet::default(),
            varnames: NameSet::default(),
            cellvars: Vec::new(),
            freevars: Vec::new(),
            arg_count: 0,
            kwonly_count: 0,
            flags: CodeFlags::empty(),
            cell_params: Vec::new(),
            labels: Vec::new(),
            forward_refs: Vec::new(),
        }
    }

    pub(crate) fn set_arg_counts(&mut self, positional: u32, kwonly: u32) {
        self.arg_count = positional;
        self.kwonly_count = kwonly;
    }

    pub(crate) fn add_flags(&mut self, flags: CodeFlags) {
        self.flags |= flags;
    }

    /// Declare deref slots. Must run before any deref is emitted.
    pub(crate) fn set_derefs(&mut self, cellvars: Vec<Name>, freevars: Vec<Name>) {
        self.cellvars = cellvars;
        self.freevars = freevars;
    }

    /// Slot of a fast local, allocating it on first use.
    pub(crate) fn varname(&mut self, name: Name) -> u32 {
        index_u32(self.varnames.insert_full(name).0)
    }

    pub(crate) fn name(&mut self, name: Name) -> u32 {
        index_u32(self.names.insert_full(name).0)
    }

    /// Index into `cellvars ++ freevars`.
    pub(crate) fn deref(&self, name: Name) -> Option<u32> {
        if let Some(i) = self.cellvars.iter().position(|n| *n == name) {
            return Some(index_u32(i));
        }
        self.freevars
            .iter()
            .position(|n| *n == name)
            .map(|i| index_u32(self.cellvars.len() + i))
    }

    /// Record that parameter slot `slot` starts life in cell `cell`.
    pub(crate) fn add_cell_param(&mut self, cell: u32, slot: u32) {
        self.cell_params.push((cell, slot));
    }

    pub(crate) fn constant(&mut self, constant: Constant) -> u32 {
        if let Some(i) = self.constants.iter().position(|c| c.same_slot(&constant)) {
            return index_u32(i);
        }
        self.constants.push(constant);
        index_u32(self.constants.len() - 1)
    }

    pub(crate) fn emit(&mut self, instr: Instr) {
        self.instructions.push(instr);
    }

    pub(crate) fn emit_const(&mut self, constant: Constant) {
        let index = self.constant(constant);
        self.emit(Instr::LoadConst(index));
    }

    pub(crate) fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(index_u32(self.labels.len() - 1))
    }

    pub(crate) fn bind_label(&mut self, label: Label) {
        let pc = index_u32(self.instructions.len());
        if let Some(slot) = self.labels.get_mut(label.0 as usize) {
            *slot = Some(pc);
        }
    }

    /// Emit a jump (any variant with an absolute target) to `label`.
    pub(crate) fn emit_jump(&mut self, jump: fn(u32) -> Instr, label: Label) {
        self.forward_refs.push((self.instructions.len(), label));
        self.emit(jump(0));
    }

    pub(crate) fn finish(mut self, span: Span) -> Result<CodeObject, CompileError> {
        for (at, label) in std::mem::take(&mut self.forward_refs) {
            let target = self
                .labels
                .get(label.0 as usize)
                .copied()
                .flatten()
                .ok_or_else(|| CompileError::new("jump to unbound label", span))?;
            self.instructions[at] = self.instructions[at].with_target(target);
        }
        Ok(CodeObject {
            name: self.name,
            qualname: self.qualname,
            instructions: self.instructions,
            constants: self.constants,
            names: self.names.into_iter().collect(),
            varnames: self.varnames.into_iter().collect(),
            cellvars: self.cellvars,
            freevars: self.freevars,
            arg_count: self.arg_count,
            kwonly_count: self.kwonly_count,
            flags: self.flags,
            cell_params: self.cell_params,
        })
    }
}

#[allow(clippy::cast_possible_truncation)] // pools and bodies never approach u32::MAX entries
pub(crate) fn index_u32(index: usize) -> u32 {
    index as u32
}
