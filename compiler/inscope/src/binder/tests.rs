#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::rc::Rc;

use super::*;
use inscope_vm::{Module, Runtime};
use pretty_assertions::assert_eq;

fn load(source: &str) -> Module {
    Runtime::new().load(source, "binder").unwrap()
}

fn resolve(
    function: &Rc<FunctionObject>,
    mappings: &[Bindings],
    use_closures: bool,
    use_globals: bool,
) -> Environment {
    let requirements = Requirements::of(&function.code);
    Environment::resolve(&requirements, function, mappings, use_closures, use_globals)
}

fn names(set: &NameSet) -> Vec<&'static str> {
    set.iter().map(|n| n.as_str()).collect()
}

#[test]
fn test_globals_builtins_and_missing() {
    let module = load("g = 10\ndef f() {\n  return g + len(h)\n}");
    let f = module.function("f").unwrap();
    let env = resolve(&f, &[], true, true);
    assert_eq!(env.outer, bindings([("g", 10)]));
    assert_eq!(names(&env.builtins), vec!["len"]);
    assert_eq!(names(&env.missing), vec!["h"]);
    assert!(!env.is_complete());
}

#[test]
fn test_supplied_mappings_win_and_later_ones_override() {
    let module = load("g = 10\ndef f() {\n  return g + h\n}");
    let f = module.function("f").unwrap();
    let env = resolve(
        &f,
        &[bindings([("g", 1), ("h", 2)]), bindings([("h", 3)])],
        true,
        true,
    );
    assert_eq!(env.outer, bindings([("g", 1), ("h", 3)]));
    assert!(env.missing.is_empty());
}

#[test]
fn test_unrequired_supplied_names_are_dropped() {
    let module = load("def f() {\n  return a\n}");
    let f = module.function("f").unwrap();
    let env = resolve(&f, &[bindings([("a", 1), ("unused", 2)])], true, true);
    assert_eq!(env.outer, bindings([("a", 1)]));
}

#[test]
fn test_without_globals_module_names_are_missing() {
    let module = load("g = 10\ndef f() {\n  return g\n}");
    let f = module.function("f").unwrap();
    let env = resolve(&f, &[], true, false);
    assert!(env.outer.is_empty());
    assert_eq!(names(&env.missing), vec!["g"]);
}

#[test]
fn test_supplied_name_shadows_builtin() {
    let module = load("def f() {\n  return len\n}");
    let f = module.function("f").unwrap();
    let env = resolve(&f, &[bindings([("len", 4)])], true, true);
    assert!(env.builtins.is_empty());
    assert_eq!(env.outer, bindings([("len", 4)]));
}

#[test]
fn test_closures_follow_use_closures() {
    let source = "\
def outer() {
  x = 1
  def inner() { return x }
  return inner
}
inner = outer()
";
    let module = load(source);
    let inner = module.function("inner").unwrap();

    let env = resolve(&inner, &[], true, true);
    assert_eq!(env.outer, bindings([("x", 1)]));

    let env = resolve(&inner, &[], false, true);
    assert_eq!(names(&env.missing), vec!["x"]);

    let env = resolve(&inner, &[bindings([("x", 5)])], false, true);
    assert_eq!(env.outer, bindings([("x", 5)]));
    assert!(env.missing.is_empty());
}

#[test]
fn test_closure_and_global_of_one_name_stay_apart() {
    let source = "\
x = 100
def outer() {
  x = 1
  def f() {
    y = x
    def g() {
      global x
      return x
    }
    return g()
  }
  return f
}
f = outer()
";
    let module = load(source);
    let f = module.function("f").unwrap();
    let env = resolve(&f, &[], true, true);
    assert_eq!(env.cells, bindings([("x", 1)]));
    assert_eq!(env.globals, bindings([("x", 100)]));
    assert_eq!(env.outer, bindings([("x", 1)]));

    let requirements = Requirements::of(&f.code);
    let rebound = env.rebind(&requirements, &f, &[], true, true);
    assert_eq!(rebound, env);
}

#[test]
fn test_missing_and_outer_never_overlap() {
    let module = load("a = 1\ndef f() {\n  return a + b + c\n}");
    let f = module.function("f").unwrap();
    let env = resolve(&f, &[bindings([("c", 3)])], true, true);
    for name in &env.missing {
        assert!(!env.outer.contains_key(name));
    }
    assert_eq!(names(&env.missing), vec!["b"]);
}

#[test]
fn test_merge_keeps_first_position_and_last_value() {
    let merged = merge(&[bindings([("a", 1), ("b", 2)]), bindings([("a", 3)])]);
    let pairs: Vec<(&str, Value)> = merged.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    assert_eq!(pairs, vec![("a", Value::Int(3)), ("b", Value::Int(2))]);
}
