//! Statement lowering.

use inscope_ir::ast::{Expr, ExprKind, Stmt, StmtKind};
use inscope_ir::ensure_sufficient_stack;

use super::{Loop, Unit};
use crate::builder::{index_u32, Label};
use crate::bytecode::{Constant, Instr};
use crate::scope::ScopeKind;
use crate::CompileError;

impl Unit {
    pub(super) fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.compile_stmt_inner(stmt))
    }

    fn compile_stmt_inner(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Instr::Pop);
            }
            StmtKind::Assign { targets, value } => {
                self.compile_expr(value)?;
                let (last, rest) = targets
                    .split_last()
                    .ok_or_else(|| CompileError::new("assignment without target", stmt.span))?;
                for target in rest {
                    self.builder.emit(Instr::Dup);
                    self.compile_store(target)?;
                }
                self.compile_store(last)?;
            }
            StmtKind::AugAssign { target, op, value } => match &target.kind {
                ExprKind::Name(name) => {
                    self.load_name(*name, target.span)?;
                    self.compile_expr(value)?;
                    self.builder.emit(Instr::Binary(*op));
                    self.store_name(*name, target.span)?;
                }
                ExprKind::Attribute { value: object, attr } => {
                    self.compile_expr(object)?;
                    self.builder.emit(Instr::Dup);
                    let slot = self.builder.name(*attr);
                    self.builder.emit(Instr::LoadAttr(slot));
                    self.compile_expr(value)?;
                    self.builder.emit(Instr::Binary(*op));
                    self.builder.emit(Instr::Rot2);
                    self.builder.emit(Instr::StoreAttr(slot));
                }
                ExprKind::Subscript {
                    value: object,
                    index,
                } => {
                    self.compile_expr(object)?;
                    self.compile_expr(index)?;
                    self.builder.emit(Instr::DupTwo);
                    self.builder.emit(Instr::LoadSubscript);
                    self.compile_expr(value)?;
                    self.builder.emit(Instr::Binary(*op));
                    self.builder.emit(Instr::Rot3);
                    self.builder.emit(Instr::StoreSubscript);
                }
                _ => {
                    return Err(CompileError::new(
                        "illegal target for augmented assignment",
                        target.span,
                    ))
                }
            },
            StmtKind::FunctionDef(def) => self.compile_function_def(def)?,
            StmtKind::ClassDef(class) => self.compile_class_def(class)?,
            StmtKind::Return(value) => {
                if self.scope.kind != ScopeKind::Function {
                    return Err(CompileError::new("'return' outside function", stmt.span));
                }
                match value {
                    Some(value) => self.compile_expr(value)?,
                    None => self.builder.emit_const(Constant::None),
                }
                self.builder.emit(Instr::ReturnValue);
            }
            StmtKind::If { test, body, orelse } => {
                let otherwise = self.builder.new_label();
                let end = self.builder.new_label();
                self.compile_expr(test)?;
                self.builder.emit_jump(Instr::JumpIfFalse, otherwise);
                self.compile_body(body)?;
                if !orelse.is_empty() {
                    self.builder.emit_jump(Instr::Jump, end);
                }
                self.builder.bind_label(otherwise);
                self.compile_body(orelse)?;
                self.builder.bind_label(end);
            }
            StmtKind::While { test, body } => {
                let head = self.builder.new_label();
                let exit = self.builder.new_label();
                self.builder.bind_label(head);
                self.compile_expr(test)?;
                self.builder.emit_jump(Instr::JumpIfFalse, exit);
                self.compile_loop_body(head, exit, false, body)?;
                self.builder.emit_jump(Instr::Jump, head);
                self.builder.bind_label(exit);
            }
            StmtKind::For { target, iter, body } => {
                let head = self.builder.new_label();
                let exit = self.builder.new_label();
                self.compile_expr(iter)?;
                self.builder.emit(Instr::GetIter);
                self.builder.bind_label(head);
                self.builder.emit_jump(Instr::ForIter, exit);
                self.compile_store(target)?;
                self.compile_loop_body(head, exit, true, body)?;
                self.builder.emit_jump(Instr::Jump, head);
                self.builder.bind_label(exit);
            }
            StmtKind::Break => {
                let (exit, has_iterator) = self
                    .loops
                    .last()
                    .map(|l| (l.exit, l.has_iterator))
                    .ok_or_else(|| CompileError::new("'break' outside loop", stmt.span))?;
                if has_iterator {
                    self.builder.emit(Instr::Pop);
                }
                self.builder.emit_jump(Instr::Jump, exit);
            }
            StmtKind::Continue => {
                let head = self
                    .loops
                    .last()
                    .map(|l| l.head)
                    .ok_or_else(|| CompileError::new("'continue' not properly in loop", stmt.span))?;
                self.builder.emit_jump(Instr::Jump, head);
            }
            StmtKind::Pass | StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
            StmtKind::Raise(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Instr::Raise);
            }
            StmtKind::Assert { test, msg } => {
                let ok = self.builder.new_label();
                self.compile_expr(test)?;
                self.builder.emit_jump(Instr::JumpIfTrue, ok);
                match msg {
                    Some(msg) => self.compile_expr(msg)?,
                    None => self.builder.emit_const(Constant::None),
                }
                self.builder.emit(Instr::RaiseAssert);
                self.builder.bind_label(ok);
            }
        }
        Ok(())
    }

    fn compile_loop_body(
        &mut self,
        head: Label,
        exit: Label,
        has_iterator: bool,
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        self.loops.push(Loop {
            head,
            exit,
            has_iterator,
        });
        let result = self.compile_body(body);
        self.loops.pop();
        result
    }

    /// Store the value on top of the stack into `target`.
    pub(super) fn compile_store(&mut self, target: &Expr) -> Result<(), CompileError> {
        match &target.kind {
            ExprKind::Name(name) => self.store_name(*name, target.span),
            ExprKind::Attribute { value, attr } => {
                self.compile_expr(value)?;
                let slot = self.builder.name(*attr);
                self.builder.emit(Instr::StoreAttr(slot));
                Ok(())
            }
            ExprKind::Subscript { value, index } => {
                self.compile_expr(value)?;
                self.compile_expr(index)?;
                self.builder.emit(Instr::StoreSubscript);
                Ok(())
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                self.builder
                    .emit(Instr::UnpackSequence(index_u32(items.len())));
                for item in items {
                    self.compile_store(item)?;
                }
                Ok(())
            }
            _ => Err(CompileError::new("cannot assign to expression", target.span)),
        }
    }
}
