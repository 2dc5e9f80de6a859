//! Name-to-value tables: module globals, class bodies and builtins.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use inscope_ir::Name;

use crate::print_handler::SharedPrintHandler;
use crate::value::{NameMap, Value};

/// A shared, insertion-ordered namespace.
///
/// Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct Namespace(Rc<RefCell<NameMap>>);

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn get(&self, name: Name) -> Option<Value> {
        self.0.borrow().get(&name).cloned()
    }

    pub fn set(&self, name: Name, value: Value) {
        self.0.borrow_mut().insert(name, value);
    }

    pub fn contains(&self, name: Name) -> bool {
        self.0.borrow().contains_key(&name)
    }

    pub fn remove(&self, name: Name) -> Option<Value> {
        self.0.borrow_mut().shift_remove(&name)
    }

    pub fn keys(&self) -> Vec<Name> {
        self.0.borrow().keys().copied().collect()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> NameMap {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn borrow(&self) -> Ref<'_, NameMap> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<NameMap> for Namespace {
    fn from(map: NameMap) -> Self {
        Namespace(Rc::new(RefCell::new(map)))
    }
}

/// Runtime-wide state every function can reach: the builtin table, the
/// print destination and the call-depth budget.
pub struct Builtins {
    names: NameMap,
    pub(crate) print: SharedPrintHandler,
    pub(crate) recursion_limit: usize,
    pub(crate) depth: Cell<usize>,
}

impl Builtins {
    pub(crate) fn new(names: NameMap, print: SharedPrintHandler, recursion_limit: usize) -> Self {
        Builtins {
            names,
            print,
            recursion_limit,
            depth: Cell::new(0),
        }
    }

    pub fn get(&self, name: Name) -> Option<Value> {
        self.names.get(&name).cloned()
    }

    pub fn contains(&self, name: Name) -> bool {
        self.names.contains_key(&name)
    }

    /// Every builtin name, in registration order.
    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.names.keys().copied()
    }

    pub fn print_handler(&self) -> &SharedPrintHandler {
        &self.print
    }
}

/// A module's global namespace coupled with the runtime builtins.
#[derive(Clone)]
pub struct Globals {
    pub vars: Namespace,
    pub builtins: Rc<Builtins>,
}

impl Globals {
    pub fn new(vars: Namespace, builtins: Rc<Builtins>) -> Self {
        Globals { vars, builtins }
    }

    /// Global lookup with builtin fallback.
    pub fn lookup(&self, name: Name) -> Option<Value> {
        self.vars.get(name).or_else(|| self.builtins.get(name))
    }
}
