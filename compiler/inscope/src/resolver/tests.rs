#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::rc::Rc;

use super::*;
use inscope_vm::Runtime;
use pretty_assertions::assert_eq;

fn code_of(source: &str, function: &str) -> Rc<CodeObject> {
    let module = Runtime::new().load(source, "resolver").unwrap();
    Rc::clone(&module.function(function).unwrap().code)
}

fn names(set: &NameSet) -> Vec<&'static str> {
    set.iter().map(|n| n.as_str()).collect()
}

#[test]
fn test_globals_in_first_seen_order() {
    let code = code_of("def f() {\n  c = b + len(a)\n  d = b\n}", "f");
    let req = Requirements::of(&code);
    assert_eq!(names(&req.globals), vec!["b", "len", "a"]);
    assert!(req.closures.is_empty());
}

#[test]
fn test_locals_and_parameters_are_not_required() {
    let code = code_of("def f(x) {\n  y = x\n  z = y + x\n}", "f");
    assert!(Requirements::of(&code).is_empty());
}

#[test]
fn test_closure_variables() {
    let source = "\
def outer() {
  x = 1
  def inner() { return x + y }
  return inner
}
inner = outer()
";
    let req = Requirements::of(&code_of(source, "inner"));
    assert_eq!(names(&req.closures), vec!["x"]);
    assert_eq!(names(&req.globals), vec!["y"]);
    assert_eq!(
        req.names().map(Name::as_str).collect::<Vec<_>>(),
        vec!["x", "y"]
    );
}

#[test]
fn test_nested_function_globals_are_required() {
    let source = "\
def f() {
  a = 1
  def g() { return a + z }
  h = g()
}
";
    let req = Requirements::of(&code_of(source, "f"));
    assert!(req.closures.is_empty());
    assert_eq!(names(&req.globals), vec!["z"]);
}

#[test]
fn test_class_body_names_stored_in_the_body_are_not_required() {
    let source = "\
def f() {
  class K {
    x = 1
    y = x + w
    def m(self) { return x }
  }
}
";
    let req = Requirements::of(&code_of(source, "f"));
    assert_eq!(names(&req.globals), vec!["w", "x"]);
}

#[test]
fn test_class_body_reads_before_any_store_are_required() {
    let source = "\
def f() {
  class K {
    v = q
  }
}
";
    let req = Requirements::of(&code_of(source, "f"));
    assert_eq!(names(&req.globals), vec!["q"]);
}

#[test]
fn test_shared_nested_code_is_walked_once() {
    let source = "\
def f() {
  def g() { return p }
  def h() { return p + r }
}
";
    let req = Requirements::of(&code_of(source, "f"));
    assert_eq!(names(&req.globals), vec!["p", "r"]);
}
