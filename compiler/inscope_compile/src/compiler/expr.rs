//! Expression lowering.

use std::rc::Rc;

use inscope_ir::ast::{BoolOp, Expr, ExprKind};
use inscope_ir::{ensure_sufficient_stack, Name};

use super::Unit;
use crate::builder::index_u32;
use crate::bytecode::{Constant, Instr};
use crate::CompileError;

impl Unit {
    /// Leave the value of `expr` on top of the stack.
    pub(super) fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.compile_expr_inner(expr))
    }

    fn compile_expr_inner(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::None => self.builder.emit_const(Constant::None),
            ExprKind::Ellipsis => self.builder.emit_const(Constant::Ellipsis),
            ExprKind::Bool(v) => self.builder.emit_const(Constant::Bool(*v)),
            ExprKind::Int(v) => self.builder.emit_const(Constant::Int(*v)),
            ExprKind::Float(v) => self.builder.emit_const(Constant::Float(*v)),
            ExprKind::Str(s) => self.builder.emit_const(Constant::Str(Rc::from(s.as_str()))),
            ExprKind::Name(name) => self.load_name(*name, expr.span)?,
            ExprKind::List(items) => {
                self.compile_all(items)?;
                self.builder.emit(Instr::BuildList(index_u32(items.len())));
            }
            ExprKind::Tuple(items) => {
                self.compile_all(items)?;
                self.builder.emit(Instr::BuildTuple(index_u32(items.len())));
            }
            ExprKind::Dict(pairs) => {
                for (key, value) in pairs {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.builder.emit(Instr::BuildDict(index_u32(pairs.len())));
            }
            ExprKind::Attribute { value, attr } => {
                self.compile_expr(value)?;
                let slot = self.builder.name(*attr);
                self.builder.emit(Instr::LoadAttr(slot));
            }
            ExprKind::Subscript { value, index } => {
                self.compile_expr(value)?;
                self.compile_expr(index)?;
                self.builder.emit(Instr::LoadSubscript);
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.compile_expr(func)?;
                self.compile_all(args)?;
                if keywords.is_empty() {
                    self.builder.emit(Instr::Call(index_u32(args.len())));
                } else {
                    for keyword in keywords {
                        self.compile_expr(&keyword.value)?;
                    }
                    let names: Rc<[Name]> = keywords.iter().map(|k| k.name).collect();
                    self.builder.emit_const(Constant::Names(names));
                    self.builder
                        .emit(Instr::CallKw(index_u32(args.len() + keywords.len())));
                }
            }
            ExprKind::Unary { op, operand } => {
                self.compile_expr(operand)?;
                self.builder.emit(Instr::Unary(*op));
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.builder.emit(Instr::Binary(*op));
            }
            ExprKind::Compare { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.builder.emit(Instr::Compare(*op));
            }
            ExprKind::BoolOp { op, left, right } => {
                let end = self.builder.new_label();
                self.compile_expr(left)?;
                let jump = match op {
                    BoolOp::And => Instr::JumpIfFalseOrPop,
                    BoolOp::Or => Instr::JumpIfTrueOrPop,
                };
                self.builder.emit_jump(jump, end);
                self.compile_expr(right)?;
                self.builder.bind_label(end);
            }
            ExprKind::IfExp { test, body, orelse } => {
                let otherwise = self.builder.new_label();
                let end = self.builder.new_label();
                self.compile_expr(test)?;
                self.builder.emit_jump(Instr::JumpIfFalse, otherwise);
                self.compile_expr(body)?;
                self.builder.emit_jump(Instr::Jump, end);
                self.builder.bind_label(otherwise);
                self.compile_expr(orelse)?;
                self.builder.bind_label(end);
            }
            ExprKind::Yield(value) => {
                match value {
                    Some(value) => self.compile_expr(value)?,
                    None => self.builder.emit_const(Constant::None),
                }
                self.builder.emit(Instr::YieldValue);
            }
            ExprKind::Await(value) => {
                self.compile_expr(value)?;
                self.builder.emit(Instr::Await);
            }
        }
        Ok(())
    }

    fn compile_all(&mut self, exprs: &[Expr]) -> Result<(), CompileError> {
        exprs.iter().try_for_each(|e| self.compile_expr(e))
    }
}
