#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use inscope_vm::{ExceptionKind, Module, Runtime};
use pretty_assertions::assert_eq;

fn load(source: &str) -> Module {
    Runtime::new().load(source, "scoped").unwrap()
}

fn transform() -> WrapOptions {
    WrapOptions::new().method(Method::Transform)
}

fn names(set: &NameSet) -> Vec<&'static str> {
    set.iter().map(|n| n.as_str()).collect()
}

#[test]
fn test_status_follows_missing_names() {
    let module = load("def f() {\n  c = b + 1\n}");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[], transform()).unwrap();
    assert_eq!(f.status(), Status::Missing);
    assert_eq!(names(f.missing()), vec!["b"]);

    let bound = f.bind_kw([("b", 2)]).unwrap();
    assert_eq!(bound.status(), Status::Ready);
    assert_eq!(f.status(), Status::Missing);
}

#[test]
fn test_bind_layers_newest_mapping_on_top() {
    let module = load("def f() {\n  c = b\n}");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[], transform()).unwrap();
    let first = f.bind_kw([("b", 1)]).unwrap();
    let second = first.bind_kw([("b", 2)]).unwrap();
    let scope = second.call(Args::new()).unwrap().into_scope().unwrap();
    assert_eq!(scope["c"], Value::Int(2));
    assert_eq!(first.outer().get(&Name::intern("b")), Some(&Value::Int(1)));
}

#[test]
fn test_wrapping_a_wrapper_keeps_its_environment() {
    let module = load("def f() {\n  c = a + b\n}");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[bindings([("a", 1)])], transform())
        .unwrap();
    let g = ScopedFunction::new(&f, &[bindings([("b", 2)])], transform()).unwrap();
    assert!(Rc::ptr_eq(g.function(), f.function()));
    let scope = g.call(Args::new()).unwrap().into_scope().unwrap();
    assert_eq!(scope["c"], Value::Int(3));
}

#[test]
fn test_arguments_defaults_and_kwdefaults_survive() {
    let module = load("def f(a, b=2, *, c=3) {\n  total = a + b + c\n}");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[], transform()).unwrap();
    let scope = f
        .call(Args::new().arg(1).kwarg("c", 10))
        .unwrap()
        .into_scope()
        .unwrap();
    assert_eq!(scope["total"], Value::Int(13));
    assert_eq!(scope["b"], Value::Int(2));
}

#[test]
fn test_body_errors_propagate_unchanged() {
    let module = load("def f() {\n  x = 1 // 0\n}");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[], transform()).unwrap();
    let Err(ScopeError::Body(err)) = f.call(Args::new()) else {
        panic!("expected the body's own error");
    };
    assert_eq!(err.kind, ExceptionKind::ZeroDivisionError);
}

#[test]
fn test_non_functions_are_rejected() {
    assert_eq!(
        ScopedFunction::new(Value::Int(3), &[], transform()).err(),
        Some(ScopeError::NotAFunction { found: "int" })
    );
}

#[test]
fn test_method_is_resolved_at_construction() {
    let module = load("def f() { pass }");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[], WrapOptions::default()).unwrap();
    assert_ne!(f.method(), Method::Default);
    let traced = ScopedFunction::new(
        module.get("f").unwrap(),
        &[],
        WrapOptions::new().method(Method::Trace),
    )
    .unwrap();
    assert_eq!(traced.method(), Method::Trace);
}

#[test]
fn test_outcome_accessors() {
    let module = load("def f() { a = 1 }\ndef g() { yield 1 }");
    let f = ScopedFunction::new(module.get("f").unwrap(), &[], transform()).unwrap();
    let outcome = f.call(Args::new()).unwrap();
    assert!(outcome.as_scope().is_some());
    assert!(outcome.into_generator().is_none());

    let g = ScopedFunction::new(module.get("g").unwrap(), &[], transform()).unwrap();
    let outcome = g.call(Args::new()).unwrap();
    assert!(outcome.as_scope().is_none());
    assert!(outcome.into_generator().is_some());
}
