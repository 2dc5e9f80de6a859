//! Symbol analysis.
//!
//! Builds a tree of [`Scope`]s (module, function, class) mirroring the
//! definitions in a module and classifies every name each body touches.
//!
//! Resolution follows the guest language's lexical rules:
//! - binding a name anywhere in a function makes it local to the whole body
//! - `global` and `nonlocal` declarations override that
//! - a name used but not bound resolves to the nearest enclosing *function*
//!   that binds it (class bodies are skipped), otherwise to the globals
//! - scopes between a binder and a user pass the name through as free
//!
//! Children are stored in definition order; the compiler consumes them in
//! the same order while walking the tree.

mod collect;

use indexmap::IndexSet;
use inscope_ir::ast::Module;
use inscope_ir::{Name, Span};
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::CompileError;

pub(crate) type NameSet = IndexSet<Name, FxBuildHasher>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Class,
}

/// How a name is read and written within one scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// Fast local slot.
    Local,
    /// Local that nested bodies capture; lives in a cell.
    Cell,
    /// Captured from an enclosing function.
    Free,
    /// Declared `global`.
    GlobalExplicit,
    /// Not bound anywhere visible; looked up in globals then builtins.
    GlobalImplicit,
    /// Bound in a class body; lives in the class namespace.
    ClassLocal,
    /// Read in a class body, bound in an enclosing function.
    ClassFree,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: Name,
    pub qualname: String,
    pub span: Span,
    /// Parameters in slot order: positional, keyword-only, `*args`, `**kwargs`.
    pub params: Vec<Name>,
    pub is_generator: bool,
    pub is_async: bool,
    pub children: Vec<Scope>,
    bound: NameSet,
    used: NameSet,
    globals: FxHashSet<Name>,
    nonlocals: NameSet,
    cells: NameSet,
    free: NameSet,
}

impl Scope {
    fn new(kind: ScopeKind, name: Name, qualname: String, span: Span) -> Self {
        Scope {
            kind,
            name,
            qualname,
            span,
            params: Vec::new(),
            is_generator: false,
            is_async: false,
            children: Vec::new(),
            bound: NameSet::default(),
            used: NameSet::default(),
            globals: FxHashSet::default(),
            nonlocals: NameSet::default(),
            cells: NameSet::default(),
            free: NameSet::default(),
        }
    }

    pub fn symbol(&self, name: Name) -> Symbol {
        if self.globals.contains(&name) {
            return Symbol::GlobalExplicit;
        }
        match self.kind {
            ScopeKind::Module => Symbol::GlobalImplicit,
            ScopeKind::Function => {
                if self.cells.contains(&name) {
                    Symbol::Cell
                } else if self.free.contains(&name) {
                    Symbol::Free
                } else if self.bound.contains(&name) {
                    Symbol::Local
                } else {
                    Symbol::GlobalImplicit
                }
            }
            ScopeKind::Class => {
                if self.nonlocals.contains(&name) {
                    Symbol::Free
                } else if self.bound.contains(&name) {
                    Symbol::ClassLocal
                } else if self.free.contains(&name) {
                    Symbol::ClassFree
                } else {
                    Symbol::GlobalImplicit
                }
            }
        }
    }

    pub fn cellvars(&self) -> impl Iterator<Item = Name> + '_ {
        self.cells.iter().copied()
    }

    pub fn freevars(&self) -> impl Iterator<Item = Name> + '_ {
        self.free.iter().copied()
    }

    /// Function locals that are neither parameters nor cells, in binding order.
    pub fn plain_locals(&self) -> impl Iterator<Item = Name> + '_ {
        self.local_names()
            .filter(|n| !self.params.contains(n) && !self.cells.contains(n))
    }

    fn local_names(&self) -> impl Iterator<Item = Name> + '_ {
        self.bound
            .iter()
            .copied()
            .filter(|n| !self.globals.contains(n) && !self.nonlocals.contains(n))
    }
}

/// Analyze a whole module.
pub fn analyze(module: &Module) -> Result<Scope, CompileError> {
    let mut root = Scope::new(
        ScopeKind::Module,
        Name::intern("<module>"),
        "<module>".to_owned(),
        Span::DUMMY,
    );
    collect::collect_body(&mut root, &module.body)?;
    resolve(&mut root, &[])?;
    Ok(root)
}

/// Decide free and cell names bottom-up.
///
/// `enclosing` holds the local names of every enclosing function, innermost last.
fn resolve(scope: &mut Scope, enclosing: &[&NameSet]) -> Result<(), CompileError> {
    let visible = |name: &Name| enclosing.iter().any(|set| set.contains(name));

    if scope.kind != ScopeKind::Module {
        for name in &scope.nonlocals {
            if !visible(name) {
                return Err(CompileError::new(
                    format!("no binding for nonlocal '{name}' found"),
                    scope.span,
                ));
            }
            scope.free.insert(*name);
        }
        for name in &scope.used {
            let declared = scope.bound.contains(name) || scope.globals.contains(name);
            if !declared && visible(name) {
                scope.free.insert(*name);
            }
        }
    }

    let locals: NameSet = scope.local_names().collect();
    let mut inner = enclosing.to_vec();
    if scope.kind == ScopeKind::Function {
        inner.push(&locals);
    }
    for child in &mut scope.children {
        resolve(child, &inner)?;
        for name in child.freevars() {
            if scope.kind == ScopeKind::Function && locals.contains(&name) {
                scope.cells.insert(name);
            } else {
                scope.free.insert(name);
            }
        }
    }
    Ok(())
}
