//! Properties that must hold for any body, under either capture method.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

mod common;

use common::{inner_keys, load, names, wrap_named, METHODS};
use inscope::{bindings, Args, BindToOptions, Method, Name, ScopeError, Value};
use inscope_vm::call_function;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const FREE_NAMES: [&str; 4] = ["p", "q", "r", "s"];

fn branching_body(k1: i32, k2: i32, k3: i32) -> String {
    format!(
        "def f(x) {{\n  a = x + {k1}\n  b = a * {k2}\n  if b > {k3} {{ return b }}\n  c = b - 1\n  return c\n}}\n"
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn wrapped_call_returns_what_direct_call_returns(
        x in -1000i64..1000,
        k1 in -50i32..50,
        k2 in -20i32..20,
        k3 in -500i32..500,
        method_index in 0usize..2,
    ) {
        let module = load(&branching_body(k1, k2, k3));
        let direct = call_function(&module.function("f").unwrap(), &[Value::Int(x)], &[]).unwrap();

        let f = wrap_named(&module, "f", &[], METHODS[method_index]).unwrap();
        let scope = f.call(Args::new().arg(x)).unwrap().into_scope().unwrap();
        prop_assert_eq!(scope.return_value(), &direct);
        prop_assert_eq!(scope.get("x"), Some(&Value::Int(x)));
        prop_assert_eq!(scope.get("a"), Some(&Value::Int(x + i64::from(k1))));
    }

    #[test]
    fn missing_names_are_exactly_the_unbound_ones(
        defined in proptest::sample::subsequence(FREE_NAMES.to_vec(), 0..=4),
        method_index in 0usize..2,
    ) {
        let module = load("def f() {\n  total = p + q + r + s\n}");
        let mapping = bindings(defined.iter().map(|name| (*name, 1)));
        let f = wrap_named(&module, "f", &[mapping], METHODS[method_index]).unwrap();

        let expected: Vec<&str> = FREE_NAMES
            .iter()
            .copied()
            .filter(|name| !defined.contains(name))
            .collect();
        prop_assert_eq!(names(f.missing()), expected.clone());

        let outcome = f.call(Args::new());
        if expected.is_empty() {
            let scope = outcome.unwrap().into_scope().unwrap();
            prop_assert_eq!(scope["total"].clone(), Value::Int(4));
        } else {
            let unresolved = matches!(
                outcome,
                Err(ScopeError::UnresolvedName { names }) if names.len() == expected.len()
            );
            prop_assert!(unresolved);
        }
    }
}

#[test]
fn composition_does_not_depend_on_the_capturing_method() {
    let module = load("def make() {\n  a = 1\n  b = 2\n}\ndef consume() {\n  c = a + b + d\n}");
    let mut results = Vec::new();
    for method in METHODS {
        let scope = wrap_named(&module, "make", &[], method)
            .unwrap()
            .call(Args::new())
            .unwrap()
            .into_scope()
            .unwrap();
        let bound = scope
            .bind_to(
                module.get("consume").unwrap(),
                BindToOptions::new().method(Method::Transform),
            )
            .unwrap();
        results.push((names(bound.missing()), bound.outer().clone()));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].0, vec!["d"]);
    assert_eq!(results[0].1, bindings([("a", 1), ("b", 2)]));
}

#[test]
fn inner_never_holds_outer_or_closure_names_it_did_not_rebind() {
    let source = "\
def outer() {
  k = 10
  def inner(x) {
    y = x + k + g
  }
  return inner
}
g = 5
";
    let module = load(source);
    let inner_fn = inscope_vm::call_function(&module.function("outer").unwrap(), &[], &[]).unwrap();
    for method in METHODS {
        let f = inscope::wrap(&inner_fn, &[], inscope::WrapOptions::new().method(method)).unwrap();
        assert!(f.missing().is_empty(), "{method}");
        let scope = f.call(Args::new().arg(1)).unwrap().into_scope().unwrap();

        assert_eq!(inner_keys(&scope), vec!["x", "y"], "{method}");
        assert_eq!(scope.outer(), &bindings([("k", 10), ("g", 5)]), "{method}");
        assert_eq!(scope["y"], Value::Int(16), "{method}");
        let outer_names: Vec<Name> = scope.outer().keys().copied().collect();
        for name in outer_names {
            assert!(!scope.inner().contains_key(&name), "{method}: {name}");
        }
    }
}

#[test]
fn drained_generator_scope_carries_the_body_return() {
    let module = load("def gen(n) {\n  total = 0\n  for i in range(n) {\n    total += i\n    yield i\n  }\n  return total * 2\n}");
    for method in METHODS {
        let f = wrap_named(&module, "gen", &[], method).unwrap();
        let mut generator = f.call(Args::new().arg(4)).unwrap().into_generator().unwrap();
        let yielded: Vec<Value> = generator.by_ref().map(Result::unwrap).collect();
        assert_eq!(yielded, (0..4).map(Value::Int).collect::<Vec<_>>(), "{method}");
        assert!(generator.is_finished());

        let scope = generator.scope().unwrap();
        assert_eq!(scope.return_value(), &Value::Int(12), "{method}");
        assert_eq!(scope["total"], Value::Int(6), "{method}");
        assert_eq!(scope["i"], Value::Int(3), "{method}");
    }
}

#[test]
fn abandoned_generator_has_no_scope() {
    let module = load("def gen() {\n  yield 1\n  yield 2\n  late = 3\n}");
    for method in METHODS {
        let f = wrap_named(&module, "gen", &[], method).unwrap();
        let mut generator = f.call(Args::new()).unwrap().into_generator().unwrap();
        assert_eq!(generator.next().unwrap().unwrap(), Value::Int(1));
        assert!(generator.scope().is_none(), "{method}");
        assert!(!generator.is_finished());

        let scope = generator.into_scope().unwrap();
        assert_eq!(scope, bindings([("late", 3)]), "{method}");
    }
}
