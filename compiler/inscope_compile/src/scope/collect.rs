//! First pass: record what each scope binds, uses and declares.

use inscope_ir::ast::{ClassDef, Expr, ExprKind, FunctionDef, Stmt, StmtKind};
use inscope_ir::ensure_sufficient_stack;

use super::{Scope, ScopeKind};
use crate::CompileError;

pub(super) fn collect_body(scope: &mut Scope, body: &[Stmt]) -> Result<(), CompileError> {
    body.iter().try_for_each(|stmt| collect_stmt(scope, stmt))
}

fn collect_stmt(scope: &mut Scope, stmt: &Stmt) -> Result<(), CompileError> {
    ensure_sufficient_stack(|| match &stmt.kind {
        StmtKind::Expr(expr) | StmtKind::Raise(expr) => use_expr(scope, expr),
        StmtKind::Assign { targets, value } => {
            use_expr(scope, value)?;
            targets.iter().try_for_each(|t| bind_target(scope, t))
        }
        StmtKind::AugAssign { target, value, .. } => {
            use_expr(scope, value)?;
            use_expr(scope, target)?;
            bind_target(scope, target)
        }
        StmtKind::FunctionDef(def) => collect_function(scope, def),
        StmtKind::ClassDef(class) => collect_class(scope, class),
        StmtKind::Return(value) => value.iter().try_for_each(|v| use_expr(scope, v)),
        StmtKind::If { test, body, orelse } => {
            use_expr(scope, test)?;
            collect_body(scope, body)?;
            collect_body(scope, orelse)
        }
        StmtKind::While { test, body } => {
            use_expr(scope, test)?;
            collect_body(scope, body)
        }
        StmtKind::For { target, iter, body } => {
            use_expr(scope, iter)?;
            bind_target(scope, target)?;
            collect_body(scope, body)
        }
        StmtKind::Global(names) => {
            for name in names {
                if scope.params.contains(name) {
                    return Err(CompileError::new(
                        format!("name '{name}' is parameter and global"),
                        stmt.span,
                    ));
                }
                if scope.nonlocals.contains(name) {
                    return Err(CompileError::new(
                        format!("name '{name}' is nonlocal and global"),
                        stmt.span,
                    ));
                }
                scope.globals.insert(*name);
            }
            Ok(())
        }
        StmtKind::Nonlocal(names) => {
            if scope.kind == ScopeKind::Module {
                return Err(CompileError::new(
                    "nonlocal declaration not allowed at module level",
                    stmt.span,
                ));
            }
            for name in names {
                if scope.params.contains(name) {
                    return Err(CompileError::new(
                        format!("name '{name}' is parameter and nonlocal"),
                        stmt.span,
                    ));
                }
                if scope.globals.contains(name) {
                    return Err(CompileError::new(
                        format!("name '{name}' is nonlocal and global"),
                        stmt.span,
                    ));
                }
                scope.nonlocals.insert(*name);
            }
            Ok(())
        }
        StmtKind::Assert { test, msg } => {
            use_expr(scope, test)?;
            msg.iter().try_for_each(|m| use_expr(scope, m))
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Pass => Ok(()),
    })
}

fn child_qualname(parent: &Scope, name: &str) -> String {
    match parent.kind {
        ScopeKind::Module => name.to_owned(),
        ScopeKind::Function => format!("{}.<locals>.{name}", parent.qualname),
        ScopeKind::Class => format!("{}.{name}", parent.qualname),
    }
}

fn collect_function(scope: &mut Scope, def: &FunctionDef) -> Result<(), CompileError> {
    // Defaults evaluate in the defining scope.
    for param in def.params.positional.iter().chain(&def.params.kwonly) {
        if let Some(default) = &param.default {
            use_expr(scope, default)?;
        }
    }
    scope.bound.insert(def.name);

    let qualname = child_qualname(scope, def.name.as_str());
    let mut child = Scope::new(ScopeKind::Function, def.name, qualname, def.span);
    child.is_async = def.is_async;
    child.params = def
        .params
        .positional
        .iter()
        .chain(&def.params.kwonly)
        .map(|p| p.name)
        .chain(def.params.vararg)
        .chain(def.params.kwarg)
        .collect();
    for param in &child.params {
        child.bound.insert(*param);
    }
    collect_body(&mut child, &def.body)?;
    scope.children.push(child);
    Ok(())
}

fn collect_class(scope: &mut Scope, class: &ClassDef) -> Result<(), CompileError> {
    for base in &class.bases {
        use_expr(scope, base)?;
    }
    scope.bound.insert(class.name);

    let qualname = child_qualname(scope, class.name.as_str());
    let mut child = Scope::new(ScopeKind::Class, class.name, qualname, class.span);
    collect_body(&mut child, &class.body)?;
    scope.children.push(child);
    Ok(())
}

fn bind_target(scope: &mut Scope, target: &Expr) -> Result<(), CompileError> {
    match &target.kind {
        ExprKind::Name(name) => {
            scope.bound.insert(*name);
            Ok(())
        }
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            items.iter().try_for_each(|item| bind_target(scope, item))
        }
        ExprKind::Attribute { value, .. } => use_expr(scope, value),
        ExprKind::Subscript { value, index } => {
            use_expr(scope, value)?;
            use_expr(scope, index)
        }
        _ => Err(CompileError::new("cannot assign to expression", target.span)),
    }
}

fn use_expr(scope: &mut Scope, expr: &Expr) -> Result<(), CompileError> {
    ensure_sufficient_stack(|| match &expr.kind {
        ExprKind::None
        | ExprKind::Ellipsis
        | ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_) => Ok(()),
        ExprKind::Name(name) => {
            scope.used.insert(*name);
            Ok(())
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            items.iter().try_for_each(|item| use_expr(scope, item))
        }
        ExprKind::Dict(pairs) => pairs.iter().try_for_each(|(k, v)| {
            use_expr(scope, k)?;
            use_expr(scope, v)
        }),
        ExprKind::Attribute { value, .. } => use_expr(scope, value),
        ExprKind::Subscript { value, index } => {
            use_expr(scope, value)?;
            use_expr(scope, index)
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            use_expr(scope, func)?;
            args.iter().try_for_each(|a| use_expr(scope, a))?;
            keywords.iter().try_for_each(|k| use_expr(scope, &k.value))
        }
        ExprKind::Unary { operand, .. } => use_expr(scope, operand),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Compare { left, right, .. }
        | ExprKind::BoolOp { left, right, .. } => {
            use_expr(scope, left)?;
            use_expr(scope, right)
        }
        ExprKind::IfExp { test, body, orelse } => {
            use_expr(scope, test)?;
            use_expr(scope, body)?;
            use_expr(scope, orelse)
        }
        ExprKind::Yield(value) => {
            if scope.kind != ScopeKind::Function {
                return Err(CompileError::new("'yield' outside function", expr.span));
            }
            scope.is_generator = true;
            value.iter().try_for_each(|v| use_expr(scope, v))
        }
        ExprKind::Await(value) => {
            if scope.kind != ScopeKind::Function || !scope.is_async {
                return Err(CompileError::new(
                    "'await' outside async function",
                    expr.span,
                ));
            }
            use_expr(scope, value)
        }
    })
}
