//! Activation records.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use inscope_compile::CodeObject;
use inscope_ir::Name;

use crate::errors::{runtime_error, stack_underflow, unbound_free, unbound_local, VmError};
use crate::interp::ArgList;
use crate::namespace::{Globals, Namespace};
use crate::value::{ClosureCell, FunctionObject, NameMap, Value};

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// One executing body: its code, its locals and its value stack.
pub struct Frame {
    pub code: Rc<CodeObject>,
    pub globals: Globals,
    /// Fast locals, indexed like `code.varnames`; `None` while unbound.
    pub(crate) fast: Vec<Option<Value>>,
    /// Deref slots: fresh cells for `cellvars`, then the closure's cells.
    pub(crate) cells: Vec<Rc<ClosureCell>>,
    /// Namespace of a class body being executed.
    pub(crate) class_ns: Option<Namespace>,
    pub(crate) stack: Vec<Value>,
    pub(crate) pc: usize,
    id: u64,
}

impl Frame {
    fn with_code(
        code: Rc<CodeObject>,
        globals: Globals,
        closure: &[Rc<ClosureCell>],
        class_ns: Option<Namespace>,
    ) -> Self {
        let cells = code
            .cellvars
            .iter()
            .map(|_| Rc::new(ClosureCell::default()))
            .chain(closure.iter().cloned())
            .collect();
        Frame {
            fast: vec![None; code.varnames.len()],
            cells,
            class_ns,
            stack: Vec::new(),
            pc: 0,
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            code,
            globals,
        }
    }

    /// Frame for top-level module code.
    pub fn for_module(code: Rc<CodeObject>, globals: Globals) -> Self {
        Frame::with_code(code, globals, &[], None)
    }

    /// Frame for a call of `function`, parameters not yet bound.
    pub(crate) fn for_function(function: &FunctionObject) -> Self {
        Frame::with_code(
            Rc::clone(&function.code),
            function.globals.clone(),
            &function.closure,
            None,
        )
    }

    /// Frame for a class body writing into `namespace`.
    pub(crate) fn for_class_body(function: &FunctionObject, namespace: Namespace) -> Self {
        Frame::with_code(
            Rc::clone(&function.code),
            function.globals.clone(),
            &function.closure,
            Some(namespace),
        )
    }

    /// Unique for the life of the process; distinguishes recursive activations.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Move parameters captured by nested bodies from their fast slots into cells.
    pub(crate) fn move_params_to_cells(&mut self) {
        for &(cell, slot) in &self.code.cell_params {
            let value = self.fast.get_mut(slot as usize).and_then(Option::take);
            if let (Some(cell), Some(value)) = (self.cells.get(cell as usize), value) {
                cell.set(value);
            }
        }
    }

    /// The frame's bound locals.
    ///
    /// Function frames list fast locals in slot order, then cells, then
    /// free variables; unbound names are omitted. Class-body frames report
    /// their class namespace.
    pub fn locals(&self) -> NameMap {
        if let Some(ns) = &self.class_ns {
            return ns.snapshot();
        }
        let mut locals = NameMap::default();
        for (name, value) in self.code.varnames.iter().zip(&self.fast) {
            if let Some(value) = value {
                locals.insert(*name, value.clone());
            }
        }
        let derefs = self.code.cellvars.iter().chain(&self.code.freevars);
        for (name, cell) in derefs.zip(&self.cells) {
            if let Some(value) = cell.get() {
                locals.insert(*name, value);
            }
        }
        locals
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Result<Value, VmError> {
        self.stack.pop().ok_or_else(stack_underflow)
    }

    /// Pop `n` values, returned in push order.
    pub(crate) fn pop_n(&mut self, n: usize) -> Result<ArgList, VmError> {
        let at = self.stack.len().checked_sub(n).ok_or_else(stack_underflow)?;
        Ok(self.stack.drain(at..).collect())
    }

    pub(crate) fn top(&self) -> Result<&Value, VmError> {
        self.stack.last().ok_or_else(stack_underflow)
    }

    pub(crate) fn constant(&self, index: u32) -> Result<Value, VmError> {
        self.code
            .constants
            .get(index as usize)
            .map(Value::from_constant)
            .ok_or_else(|| runtime_error(format!("constant index {index} out of range")))
    }

    pub(crate) fn name(&self, index: u32) -> Result<Name, VmError> {
        self.code
            .names
            .get(index as usize)
            .copied()
            .ok_or_else(|| runtime_error(format!("name index {index} out of range")))
    }

    pub(crate) fn load_fast(&self, slot: u32) -> Result<Value, VmError> {
        match self.fast.get(slot as usize) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(unbound_local(self.varname(slot)?)),
            None => Err(runtime_error(format!("local slot {slot} out of range"))),
        }
    }

    pub(crate) fn store_fast(&mut self, slot: u32, value: Value) -> Result<(), VmError> {
        let entry = self
            .fast
            .get_mut(slot as usize)
            .ok_or_else(|| runtime_error(format!("local slot {slot} out of range")))?;
        *entry = Some(value);
        Ok(())
    }

    fn varname(&self, slot: u32) -> Result<Name, VmError> {
        self.code
            .varnames
            .get(slot as usize)
            .copied()
            .ok_or_else(|| runtime_error(format!("local slot {slot} out of range")))
    }

    pub(crate) fn cell(&self, index: u32) -> Result<&Rc<ClosureCell>, VmError> {
        self.cells
            .get(index as usize)
            .ok_or_else(|| runtime_error(format!("deref slot {index} out of range")))
    }

    pub(crate) fn load_deref(&self, index: u32) -> Result<Value, VmError> {
        if let Some(value) = self.cell(index)?.get() {
            return Ok(value);
        }
        let name = self
            .code
            .deref_name(index)
            .ok_or_else(|| runtime_error(format!("deref slot {index} out of range")))?;
        if self.code.is_free_slot(index) {
            Err(unbound_free(name))
        } else {
            Err(unbound_local(name))
        }
    }

    pub(crate) fn deref_name(&self, index: u32) -> Result<Name, VmError> {
        self.code
            .deref_name(index)
            .ok_or_else(|| runtime_error(format!("deref slot {index} out of range")))
    }
}
