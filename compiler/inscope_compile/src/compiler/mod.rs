//! Code generation.
//!
//! One [`Unit`] per body being compiled. A unit owns the analyzed
//! [`Scope`] for its body and hands child scopes out, in definition order,
//! to the units compiling nested `def` and `class` bodies.

mod expr;
mod stmt;

use std::rc::Rc;

use inscope_ir::ast::{ClassDef, FunctionDef, Module, Stmt};
use inscope_ir::{Name, Span};
use tracing::debug;

use crate::builder::{index_u32, CodeBuilder, Label};
use crate::bytecode::{make_function, CodeFlags, CodeObject, Constant, Instr};
use crate::scope::{self, Scope, ScopeKind, Symbol};
use crate::CompileError;

/// Compile a parsed module into its top-level code object.
#[tracing::instrument(level = "debug", skip(module))]
pub fn compile_module(module: &Module, name: &str) -> Result<Rc<CodeObject>, CompileError> {
    let root = scope::analyze(module)?;
    let mut unit = Unit::new(root, CodeBuilder::new(Name::intern("<module>"), name));
    unit.compile_body(&module.body)?;
    unit.finish()
}

struct Loop {
    head: Label,
    exit: Label,
    /// `for` loops keep their iterator on the stack; `break` must drop it.
    has_iterator: bool,
}

struct Unit {
    builder: CodeBuilder,
    scope: Scope,
    children: std::vec::IntoIter<Scope>,
    loops: Vec<Loop>,
}

impl Unit {
    fn new(mut scope: Scope, mut builder: CodeBuilder) -> Self {
        let children = std::mem::take(&mut scope.children).into_iter();
        builder.set_derefs(scope.cellvars().collect(), scope.freevars().collect());
        Unit {
            builder,
            scope,
            children,
            loops: Vec::new(),
        }
    }

    fn function(scope: Scope, def: &FunctionDef, nested: bool) -> Self {
        let mut builder = CodeBuilder::new(def.name, &scope.qualname);
        let mut flags = CodeFlags::empty();
        if def.params.vararg.is_some() {
            flags |= CodeFlags::VARARGS;
        }
        if def.params.kwarg.is_some() {
            flags |= CodeFlags::VARKEYWORDS;
        }
        flags |= match (scope.is_async, scope.is_generator) {
            (false, false) => CodeFlags::empty(),
            (false, true) => CodeFlags::GENERATOR,
            (true, false) => CodeFlags::COROUTINE,
            (true, true) => CodeFlags::ASYNC_GENERATOR,
        };
        if nested {
            flags |= CodeFlags::NESTED;
        }
        builder.add_flags(flags);
        builder.set_arg_counts(
            index_u32(def.params.positional.len()),
            index_u32(def.params.kwonly.len()),
        );
        for param in &scope.params {
            builder.varname(*param);
        }
        for local in scope.plain_locals() {
            builder.varname(local);
        }

        let mut unit = Unit::new(scope, builder);
        for (slot, param) in unit.scope.params.iter().enumerate() {
            if unit.scope.symbol(*param) == Symbol::Cell {
                if let Some(cell) = unit.builder.deref(*param) {
                    unit.builder.add_cell_param(cell, index_u32(slot));
                }
            }
        }
        unit
    }

    fn class(scope: Scope, class: &ClassDef) -> Self {
        let builder = CodeBuilder::new(class.name, &scope.qualname);
        Unit::new(scope, builder)
    }

    fn compile_body(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    /// Append the implicit `return None` and build the code object.
    fn finish(mut self) -> Result<Rc<CodeObject>, CompileError> {
        self.builder.emit_const(Constant::None);
        self.builder.emit(Instr::ReturnValue);
        let code = self.builder.finish(self.scope.span)?;
        debug!(
            code = %code.qualname,
            instructions = code.instructions.len(),
            cellvars = code.cellvars.len(),
            freevars = code.freevars.len(),
            "compiled body"
        );
        Ok(Rc::new(code))
    }

    fn next_child(&mut self, span: Span) -> Result<Scope, CompileError> {
        self.children
            .next()
            .ok_or_else(|| CompileError::new("scope tree out of step with body", span))
    }

    fn deref(&self, name: Name, span: Span) -> Result<u32, CompileError> {
        self.builder
            .deref(name)
            .ok_or_else(|| CompileError::new(format!("no cell for '{name}'"), span))
    }

    fn load_name(&mut self, name: Name, span: Span) -> Result<(), CompileError> {
        let instr = match self.scope.symbol(name) {
            Symbol::Local => Instr::LoadFast(self.builder.varname(name)),
            Symbol::Cell | Symbol::Free => Instr::LoadDeref(self.deref(name, span)?),
            Symbol::ClassFree => Instr::LoadClassDeref(self.deref(name, span)?),
            Symbol::ClassLocal => Instr::LoadName(self.builder.name(name)),
            Symbol::GlobalImplicit if self.scope.kind == ScopeKind::Class => {
                Instr::LoadName(self.builder.name(name))
            }
            Symbol::GlobalExplicit | Symbol::GlobalImplicit => {
                Instr::LoadGlobal(self.builder.name(name))
            }
        };
        self.builder.emit(instr);
        Ok(())
    }

    fn store_name(&mut self, name: Name, span: Span) -> Result<(), CompileError> {
        let instr = match self.scope.symbol(name) {
            Symbol::Local => Instr::StoreFast(self.builder.varname(name)),
            Symbol::Cell | Symbol::Free => Instr::StoreDeref(self.deref(name, span)?),
            Symbol::ClassLocal => Instr::StoreName(self.builder.name(name)),
            Symbol::GlobalExplicit | Symbol::GlobalImplicit => {
                Instr::StoreGlobal(self.builder.name(name))
            }
            Symbol::ClassFree => {
                return Err(CompileError::new(
                    format!("cannot store to captured name '{name}'"),
                    span,
                ))
            }
        };
        self.builder.emit(instr);
        Ok(())
    }

    fn compile_function_def(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        let mut flags = 0;

        let defaults: Vec<_> = def
            .params
            .positional
            .iter()
            .filter_map(|p| p.default.as_ref())
            .collect();
        if !defaults.is_empty() {
            for default in &defaults {
                self.compile_expr(default)?;
            }
            self.builder.emit(Instr::BuildTuple(index_u32(defaults.len())));
            flags |= make_function::DEFAULTS;
        }

        let kwdefaults: Vec<_> = def
            .params
            .kwonly
            .iter()
            .filter_map(|p| p.default.as_ref().map(|d| (p.name, d)))
            .collect();
        if !kwdefaults.is_empty() {
            for (name, default) in &kwdefaults {
                self.builder.emit_const(Constant::Str(Rc::from(name.as_str())));
                self.compile_expr(default)?;
            }
            self.builder.emit(Instr::BuildDict(index_u32(kwdefaults.len())));
            flags |= make_function::KWDEFAULTS;
        }

        let child = self.next_child(def.span)?;
        let nested = self.scope.kind == ScopeKind::Function;
        let mut unit = Unit::function(child, def, nested);
        unit.compile_body(&def.body)?;
        let code = unit.finish()?;

        self.make_function(code, flags, def.span)?;
        self.store_name(def.name, def.span)
    }

    fn compile_class_def(&mut self, class: &ClassDef) -> Result<(), CompileError> {
        self.builder.emit(Instr::LoadBuildClass);

        let child = self.next_child(class.span)?;
        let mut unit = Unit::class(child, class);
        unit.compile_body(&class.body)?;
        let code = unit.finish()?;
        self.make_function(code, 0, class.span)?;

        self.builder
            .emit_const(Constant::Str(Rc::from(class.name.as_str())));
        for base in &class.bases {
            self.compile_expr(base)?;
        }
        self.builder
            .emit(Instr::Call(index_u32(2 + class.bases.len())));
        self.store_name(class.name, class.span)
    }

    /// Push the closure tuple (if any) and the code, then `MakeFunction`.
    fn make_function(
        &mut self,
        code: Rc<CodeObject>,
        mut flags: u8,
        span: Span,
    ) -> Result<(), CompileError> {
        if !code.freevars.is_empty() {
            for name in &code.freevars {
                let slot = self.deref(*name, span)?;
                self.builder.emit(Instr::LoadClosure(slot));
            }
            self.builder
                .emit(Instr::BuildTuple(index_u32(code.freevars.len())));
            flags |= make_function::CLOSURE;
        }
        self.builder.emit_const(Constant::Code(code));
        self.builder.emit(Instr::MakeFunction(flags));
        Ok(())
    }
}
