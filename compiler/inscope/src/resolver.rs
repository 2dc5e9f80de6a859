//! Free-name discovery.
//!
//! [`Requirements::of`] walks a body's instructions, and those of every
//! body nested in its constant pool, collecting the names that must come
//! from outside: the body's own closure variables and every name loaded
//! from the global namespace anywhere in the tree.

use std::rc::Rc;

use indexmap::IndexSet;
use inscope_compile::{CodeObject, Constant, Instr};
use inscope_ir::Name;
use rustc_hash::{FxBuildHasher, FxHashSet};
use tracing::trace;

/// Ordered, deduplicated set of names.
pub type NameSet = IndexSet<Name, FxBuildHasher>;

/// The outer names a body needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Free variables of the top-level body, in declaration order.
    pub closures: NameSet,
    /// Names read from the global namespace, in first-seen order.
    pub globals: NameSet,
}

/// How loads in a block are resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BlockKind {
    Function,
    /// A class body: `LoadName` looks in the class namespace first.
    Class,
}

impl Requirements {
    pub fn of(code: &Rc<CodeObject>) -> Requirements {
        let mut requirements = Requirements {
            closures: code.freevars.iter().copied().collect(),
            globals: NameSet::default(),
        };
        let mut seen = FxHashSet::default();
        requirements.walk(code, BlockKind::Function, &mut seen);
        trace!(
            code = %code.qualname,
            closures = requirements.closures.len(),
            globals = requirements.globals.len(),
            "requirements resolved"
        );
        requirements
    }

    /// Closure names, then global names.
    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.closures.iter().chain(&self.globals).copied()
    }

    pub fn is_closure(&self, name: Name) -> bool {
        self.closures.contains(&name)
    }

    pub fn len(&self) -> usize {
        self.closures.len() + self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.is_empty() && self.globals.is_empty()
    }

    fn walk(
        &mut self,
        code: &Rc<CodeObject>,
        kind: BlockKind,
        seen: &mut FxHashSet<*const CodeObject>,
    ) {
        if !seen.insert(Rc::as_ptr(code)) {
            return;
        }
        let stored: FxHashSet<u32> = match kind {
            BlockKind::Class => code
                .instructions
                .iter()
                .filter_map(|instr| match instr {
                    Instr::StoreName(i) => Some(*i),
                    _ => None,
                })
                .collect(),
            BlockKind::Function => FxHashSet::default(),
        };

        let mut class_pending = false;
        let mut last_code = None;
        let mut nested = Vec::new();
        for instr in &code.instructions {
            match *instr {
                Instr::LoadGlobal(i) => self.add_global(code, i),
                Instr::LoadName(i) if !stored.contains(&i) => self.add_global(code, i),
                Instr::LoadConst(i) => {
                    if let Some(Constant::Code(child)) =
                        code.constants.get(i as usize)
                    {
                        last_code = Some(Rc::clone(child));
                    }
                }
                Instr::LoadBuildClass => class_pending = true,
                Instr::MakeFunction(_) => {
                    if let Some(child) = last_code.take() {
                        let child_kind = if class_pending {
                            BlockKind::Class
                        } else {
                            BlockKind::Function
                        };
                        nested.push((child, child_kind));
                    }
                    class_pending = false;
                }
                _ => {}
            }
        }

        // Bodies never handed to `MakeFunction` still count as functions.
        for child in code.nested() {
            if !nested.iter().any(|(c, _)| Rc::ptr_eq(c, child)) {
                nested.push((Rc::clone(child), BlockKind::Function));
            }
        }
        for (child, child_kind) in nested {
            self.walk(&child, child_kind, seen);
        }
    }

    fn add_global(&mut self, code: &CodeObject, index: u32) {
        if let Some(name) = code.names.get(index as usize) {
            self.globals.insert(*name);
        }
    }
}

#[cfg(test)]
mod tests;
