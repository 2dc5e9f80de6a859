#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use inscope_ir::ast::{BinaryOp, CompareOp, Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use inscope_ir::Name;
use pretty_assertions::assert_eq;

fn body(source: &str) -> Vec<Stmt> {
    parse(source).unwrap().body
}

fn single_expr(source: &str) -> Expr {
    match body(source).remove(0).kind {
        StmtKind::Expr(e) => e,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn name_of(expr: &Expr) -> &str {
    match &expr.kind {
        ExprKind::Name(n) => n.as_str(),
        other => panic!("expected name, got {other:?}"),
    }
}

#[test]
fn test_assignment_chain() {
    let stmts = body("a = b = 1");
    let StmtKind::Assign { targets, value } = &stmts[0].kind else {
        panic!("expected assignment");
    };
    assert_eq!(targets.len(), 2);
    assert_eq!(name_of(&targets[0]), "a");
    assert_eq!(name_of(&targets[1]), "b");
    assert_eq!(value.kind, ExprKind::Int(1));
}

#[test]
fn test_semicolons_separate_statements() {
    let stmts = body("a = 1; b = a + 1");
    assert_eq!(stmts.len(), 2);
}

#[test]
fn test_precedence() {
    let e = single_expr("1 + 2 * 3");
    let ExprKind::Binary { op, right, .. } = e.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn test_power_is_right_associative_and_binds_over_unary() {
    let e = single_expr("-2 ** 3 ** 2");
    let ExprKind::Unary { op, operand } = e.kind else {
        panic!("expected unary");
    };
    assert_eq!(op, UnaryOp::Neg);
    let ExprKind::Binary { op, right, .. } = operand.kind else {
        panic!("expected power");
    };
    assert_eq!(op, BinaryOp::Pow);
    assert!(matches!(
        right.kind,
        ExprKind::Binary {
            op: BinaryOp::Pow,
            ..
        }
    ));
}

#[test]
fn test_not_in_and_is_not() {
    let e = single_expr("a not in b");
    assert!(matches!(
        e.kind,
        ExprKind::Compare {
            op: CompareOp::NotIn,
            ..
        }
    ));
    let e = single_expr("a is not None");
    assert!(matches!(
        e.kind,
        ExprKind::Compare {
            op: CompareOp::IsNot,
            ..
        }
    ));
}

#[test]
fn test_call_with_keywords() {
    let e = single_expr("dict(a=x, b=3)");
    let ExprKind::Call { args, keywords, .. } = e.kind else {
        panic!("expected call");
    };
    assert!(args.is_empty());
    let names: Vec<&str> = keywords.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_positional_after_keyword_is_rejected() {
    assert!(parse("f(a=1, 2)").is_err());
}

#[test]
fn test_tuple_forms() {
    assert_eq!(single_expr("()").kind, ExprKind::Tuple(Vec::new()));
    assert!(matches!(single_expr("(1,)").kind, ExprKind::Tuple(ref v) if v.len() == 1));
    assert_eq!(single_expr("(1)").kind, ExprKind::Int(1));
    assert!(matches!(single_expr("1, 2").kind, ExprKind::Tuple(ref v) if v.len() == 2));
}

#[test]
fn test_dict_literal_spans_lines() {
    let e = single_expr("{\n  'a': 1,\n  'b': 2,\n}");
    let ExprKind::Dict(items) = e.kind else {
        panic!("expected dict");
    };
    assert_eq!(items.len(), 2);
}

#[test]
fn test_function_params() {
    let stmts = body("def f(w, x=1, *args, y=2, z, **kwargs) { pass }");
    let StmtKind::FunctionDef(def) = &stmts[0].kind else {
        panic!("expected def");
    };
    let names: Vec<&str> = def.params.names().map(Name::as_str).collect();
    assert_eq!(names, vec!["w", "x", "args", "y", "z", "kwargs"]);
    assert_eq!(def.params.kwonly.len(), 2);
    assert!(def.params.kwonly[0].default.is_some());
    assert!(def.params.kwonly[1].default.is_none());
    assert!(!def.is_async);
}

#[test]
fn test_param_errors() {
    assert!(parse("def f(a=1, b) { pass }").is_err());
    assert!(parse("def f(a, a) { pass }").is_err());
    assert!(parse("def f(**k, a) { pass }").is_err());
}

#[test]
fn test_async_def() {
    let stmts = body("async def f() { await g() }");
    let StmtKind::FunctionDef(def) = &stmts[0].kind else {
        panic!("expected def");
    };
    assert!(def.is_async);
    assert!(matches!(
        &def.body[0].kind,
        StmtKind::Expr(Expr {
            kind: ExprKind::Await(_),
            ..
        })
    ));
}

#[test]
fn test_if_elif_else_across_lines() {
    let source = "if a {\n  x = 1\n}\nelif b {\n  x = 2\n}\nelse {\n  x = 3\n}\ny = x";
    let stmts = body(source);
    assert_eq!(stmts.len(), 2);
    let StmtKind::If { orelse, .. } = &stmts[0].kind else {
        panic!("expected if");
    };
    let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
        panic!("expected elif");
    };
    assert_eq!(inner.len(), 1);
}

#[test]
fn test_for_unpacking_target() {
    let stmts = body("for k, v in d.items() { pass }");
    let StmtKind::For { target, .. } = &stmts[0].kind else {
        panic!("expected for");
    };
    assert!(matches!(&target.kind, ExprKind::Tuple(v) if v.len() == 2));
}

#[test]
fn test_yield_forms() {
    let stmts = body("def g() { yield 1; x = yield; yield }");
    let StmtKind::FunctionDef(def) = &stmts[0].kind else {
        panic!("expected def");
    };
    assert_eq!(def.body.len(), 3);
    assert!(matches!(
        &def.body[1].kind,
        StmtKind::Assign {
            value: Expr {
                kind: ExprKind::Yield(None),
                ..
            },
            ..
        }
    ));
}

#[test]
fn test_class_with_bases() {
    let stmts = body("class C(Base) {\n  x = 1\n  def m(self) { return self.x }\n}");
    let StmtKind::ClassDef(class) = &stmts[0].kind else {
        panic!("expected class");
    };
    assert_eq!(class.bases.len(), 1);
    assert_eq!(class.body.len(), 2);
}

#[test]
fn test_invalid_targets() {
    assert!(parse("1 = a").is_err());
    assert!(parse("f() = 1").is_err());
    assert!(parse("a, b += 1").is_err());
}

#[test]
fn test_missing_terminator() {
    let err = parse("a = 1 b = 2").unwrap_err();
    assert!(err.message.starts_with("expected end of statement"));
}

#[test]
fn test_unclosed_block() {
    assert!(parse("def f() { return 1").is_err());
    assert!(parse("}").is_err());
}

#[test]
fn test_conditional_expression() {
    let e = single_expr("a if c else b");
    assert!(matches!(e.kind, ExprKind::IfExp { .. }));
}
