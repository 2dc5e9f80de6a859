//! Heap object payloads.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use inscope_compile::CodeObject;
use inscope_ir::Name;

use super::{NameMap, Value};
use crate::errors::{ExceptionKind, VmError};
use crate::namespace::{Builtins, Globals, Namespace};

/// A guest function: code plus everything captured when `def` ran.
pub struct FunctionObject {
    pub code: Rc<CodeObject>,
    pub globals: Globals,
    /// Defaults for the trailing positional parameters.
    pub defaults: Vec<Value>,
    pub kwdefaults: NameMap,
    /// One cell per entry of `code.freevars`.
    pub closure: Vec<Rc<ClosureCell>>,
}

impl FunctionObject {
    pub fn new(code: Rc<CodeObject>, globals: Globals) -> Self {
        FunctionObject {
            code,
            globals,
            defaults: Vec::new(),
            kwdefaults: NameMap::default(),
            closure: Vec::new(),
        }
    }

    pub fn name(&self) -> Name {
        self.code.name
    }

    pub fn qualname(&self) -> &str {
        &self.code.qualname
    }

    /// Free variable names paired with their current cell contents.
    pub fn closure_values(&self) -> impl Iterator<Item = (Name, Option<Value>)> + '_ {
        self.code
            .freevars
            .iter()
            .zip(&self.closure)
            .map(|(name, cell)| (*name, cell.get()))
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.qualname())
    }
}

/// A shared, possibly empty binding captured by closures.
#[derive(Default)]
pub struct ClosureCell(RefCell<Option<Value>>);

impl ClosureCell {
    pub fn new(value: Option<Value>) -> Self {
        ClosureCell(RefCell::new(value))
    }

    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = Some(value);
    }
}

/// Native implementation of a builtin function or method.
///
/// Methods receive their receiver as the first positional argument.
pub type BuiltinFn =
    fn(&Rc<Builtins>, &[Value], &[(Name, Value)]) -> Result<Value, VmError>;

pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// A callable bound to its receiver.
pub struct BoundMethod {
    pub receiver: Value,
    pub function: Value,
}

/// A guest class: one namespace plus bases searched depth-first.
pub struct ClassObject {
    pub name: Name,
    pub bases: Vec<Rc<ClassObject>>,
    pub namespace: Namespace,
}

impl ClassObject {
    pub fn lookup(&self, name: Name) -> Option<Value> {
        self.namespace
            .get(name)
            .or_else(|| self.bases.iter().find_map(|base| base.lookup(name)))
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<ClassObject>) -> bool {
        Rc::ptr_eq(self, other) || self.bases.iter().any(|base| base.is_subclass_of(other))
    }
}

pub struct Instance {
    pub class: Rc<ClassObject>,
    pub attrs: RefCell<NameMap>,
}

/// `range(start, stop, step)`; `step` is never zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs();
        usize::try_from(span.unsigned_abs().div_ceil(step)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        i64::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.step))
            .and_then(|offset| self.start.checked_add(offset))
    }
}

/// An exception instance, as produced by calling an exception class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionValue {
    pub kind: ExceptionKind,
    pub message: String,
}

impl ExceptionValue {
    pub fn to_error(&self) -> VmError {
        VmError::new(self.kind, self.message.clone())
    }
}
