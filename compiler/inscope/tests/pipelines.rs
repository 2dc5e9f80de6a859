//! Composition helpers, error translation and environment options.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{inner_keys, keys, load, names, wrap_named, METHODS};
use inscope::{
    bind_with, bindings, call_once, call_with, wrap, Args, BindToOptions, Bindings, Method, Name,
    ScopeError, Value, WrapOptions,
};
use inscope_vm::trace::{current_observer, install_observer, FrameEvent, FrameObserver};
use inscope_vm::ExceptionKind;
use pretty_assertions::assert_eq;

#[test]
fn scope_feeds_the_next_function() {
    let module = load(
        "\
def setup() {
  width = 3
  height = 4
}
def area() {
  result = width * height
}
",
    );
    for method in METHODS {
        let setup = wrap_named(&module, "setup", &[], method).unwrap();
        let scope = setup.call(Args::new()).unwrap().into_scope().unwrap();

        let area = scope
            .bind_to(module.get("area").unwrap(), BindToOptions::new())
            .unwrap();
        assert_eq!(area.method(), method);
        assert!(area.missing().is_empty());

        let next = area.call(Args::new()).unwrap().into_scope().unwrap();
        assert_eq!(keys(&next), vec!["width", "height", "result"], "{method}");
        assert_eq!(next["result"], Value::Int(12));

        let direct = scope
            .call(module.get("area").unwrap(), Args::new())
            .unwrap()
            .into_scope()
            .unwrap();
        assert_eq!(direct, next);

        let curried = scope.call_with(Args::new())(module.get("area").unwrap())
            .unwrap()
            .into_scope()
            .unwrap();
        assert_eq!(curried, next);
    }
}

#[test]
fn free_function_helpers() {
    let module = load("def f(a, b=1) {\n  c = a + b + k\n}\nk = 100");

    let once = call_once(module.get("f").unwrap(), Args::new().arg(1))
        .unwrap()
        .into_scope()
        .unwrap();
    assert_eq!(once["c"], Value::Int(102));

    let later = call_with(Args::new().arg(2).kwarg("b", 3))(module.get("f").unwrap())
        .unwrap()
        .into_scope()
        .unwrap();
    assert_eq!(later["c"], Value::Int(105));

    let bound = bind_with(vec![bindings([("k", 0)])])(module.get("f").unwrap()).unwrap();
    let scope = bound.call(Args::new().arg(5)).unwrap().into_scope().unwrap();
    assert_eq!(scope["c"], Value::Int(6));
    assert_eq!(scope.outer(), &bindings([("k", 0)]));
}

#[test]
fn reading_a_name_before_assigning_it_is_explained() {
    let module = load("def f() {\n  y = x + 1\n  x = 2\n}\nx = 10");
    for method in METHODS {
        let f = wrap_named(&module, "f", &[], method).unwrap();
        assert!(f.missing().is_empty());
        let err = f.call(Args::new()).err().unwrap();
        let ScopeError::ShadowedOuterName { name, source } = &err else {
            panic!("{method}: expected a shadowing error, got {err:?}");
        };
        assert_eq!(*name, Name::intern("x"));
        assert_eq!(source.kind, ExceptionKind::UnboundLocalError);
        let message = err.to_string();
        assert!(message.contains("- Pass x in as an argument to the function."), "{message}");
        assert!(
            message.contains("- Don't assign to x; use a different name for the local variable."),
            "{message}"
        );
    }
}

#[test]
fn raised_unbound_local_error_is_the_bodys_own() {
    let module = load("def f() {\n  raise UnboundLocalError('mine')\n}");
    for method in METHODS {
        let f = wrap_named(&module, "f", &[], method).unwrap();
        let Err(ScopeError::Body(err)) = f.call(Args::new()) else {
            panic!("{method}: expected the raised error");
        };
        assert_eq!(err.kind, ExceptionKind::UnboundLocalError);
        assert_eq!(err.message, "mine");
    }
}

#[test]
fn async_bodies_are_rejected_at_construction() {
    let module = load("async def f() {\n  x = 1\n}\nasync def g() {\n  yield 1\n}");
    for method in METHODS {
        assert_eq!(
            wrap_named(&module, "f", &[], method).err(),
            Some(ScopeError::UnsupportedBody {
                function: "f".to_owned(),
                kind: "coroutine",
            }),
            "{method}"
        );
        assert!(matches!(
            wrap_named(&module, "g", &[], method),
            Err(ScopeError::UnsupportedBody {
                kind: "async generator",
                ..
            })
        ));
    }
}

#[derive(Default)]
struct Recorder {
    qualnames: RefCell<Vec<String>>,
}

impl FrameObserver for Recorder {
    fn on_event(&self, event: &FrameEvent<'_>) {
        if let FrameEvent::Enter(frame) = event {
            self.qualnames
                .borrow_mut()
                .push(frame.code.qualname.to_string());
        }
    }
}

#[test]
fn trace_capture_leaves_an_installed_observer_in_place() {
    let module = load("def helper() { return 2 }\ndef f() {\n  a = helper()\n}");
    let recorder = Rc::new(Recorder::default());
    let _guard = install_observer(recorder.clone());

    let f = wrap_named(&module, "f", &[], Method::Trace).unwrap();
    let scope = f.call(Args::new()).unwrap().into_scope().unwrap();
    assert_eq!(scope["a"], Value::Int(2));
    assert_eq!(*recorder.qualnames.borrow(), vec!["f", "helper"]);

    let current = current_observer().unwrap();
    assert!(Rc::ptr_eq(&current, &(recorder as Rc<dyn FrameObserver>)));
}

#[test]
fn trace_capture_is_uninstalled_between_generator_steps() {
    let module = load("def gen() {\n  yield 1\n  yield 2\n}");
    let recorder = Rc::new(Recorder::default());
    let _guard = install_observer(recorder.clone());
    let installed: Rc<dyn FrameObserver> = recorder.clone();

    let f = wrap_named(&module, "gen", &[], Method::Trace).unwrap();
    let mut generator = f.call(Args::new()).unwrap().into_generator().unwrap();
    assert!(recorder.qualnames.borrow().is_empty());

    assert_eq!(generator.next().unwrap().unwrap(), Value::Int(1));
    assert!(Rc::ptr_eq(&current_observer().unwrap(), &installed));
    assert_eq!(generator.next().unwrap().unwrap(), Value::Int(2));
    assert!(Rc::ptr_eq(&current_observer().unwrap(), &installed));
    assert!(generator.next().is_none());
    assert_eq!(recorder.qualnames.borrow().len(), 3);
    assert!(generator.scope().is_some());
}

#[test]
fn closures_can_be_ignored() {
    let source = "\
def outer() {
  k = 1
  def inner() {
    y = k + 1
  }
  return inner
}
";
    let module = load(source);
    let inner = inscope_vm::call_function(&module.function("outer").unwrap(), &[], &[]).unwrap();
    for method in METHODS {
        let options = WrapOptions::new().method(method).use_closures(false);
        let f = wrap(&inner, &[], options).unwrap();
        assert!(!f.use_closures());
        assert_eq!(names(f.missing()), vec!["k"], "{method}");

        let scope = f
            .bind_kw([("k", 100)])
            .unwrap()
            .call(Args::new())
            .unwrap()
            .into_scope()
            .unwrap();
        assert_eq!(scope["y"], Value::Int(101), "{method}");
        assert_eq!(inner_keys(&scope), vec!["y"], "{method}");
    }
}

#[test]
fn a_closure_name_does_not_leak_into_nested_globals() {
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
";
    let module = load(source);
    let f = inscope_vm::call_function(&module.function("outer").unwrap(), &[], &[]).unwrap();
    let direct = inscope_vm::call_function(f.as_function().unwrap(), &[], &[]).unwrap();
    assert_eq!(direct, Value::Int(100));
    for method in METHODS {
        let wrapped = wrap(&f, &[], WrapOptions::new().method(method)).unwrap();
        let scope = wrapped.call(Args::new()).unwrap().into_scope().unwrap();
        assert_eq!(scope.return_value(), &direct, "{method}");
        assert_eq!(scope["y"], Value::Int(1), "{method}");

        let rebound = wrapped.bind_kw([("y", 0)]).unwrap();
        let scope = rebound.call(Args::new()).unwrap().into_scope().unwrap();
        assert_eq!(scope.return_value(), &Value::Int(100), "{method}");
    }
}

#[test]
fn globals_can_be_ignored() {
    let module = load("def f() {\n  y = g * 2\n}\ng = 4");
    for method in METHODS {
        let options = WrapOptions::new().method(method).use_globals(false);
        let f = wrap(module.get("f").unwrap(), &[], options).unwrap();
        assert_eq!(names(f.missing()), vec!["g"], "{method}");
        let scope = f
            .bind_kw([("g", 5)])
            .unwrap()
            .call(Args::new())
            .unwrap()
            .into_scope()
            .unwrap();
        assert_eq!(scope["y"], Value::Int(10), "{method}");
    }
}

#[test]
fn a_binding_overrides_a_builtin() {
    let module = load("def fake(v) { return 99 }\ndef f(s) {\n  n = len(s)\n}");
    for method in METHODS {
        let fake = module.get("fake").unwrap();
        let mut mapping = Bindings::default();
        mapping.insert(Name::intern("len"), fake.clone());
        let f = wrap_named(&module, "f", &[mapping], method).unwrap();
        assert!(f.builtin_names().is_empty(), "{method}");
        assert_eq!(f.outer().get(&Name::intern("len")), Some(&fake));

        let scope = f
            .call(Args::new().arg("abc"))
            .unwrap()
            .into_scope()
            .unwrap();
        assert_eq!(scope["n"], Value::Int(99), "{method}");
    }
}

#[test]
fn nested_definitions_are_locals_of_the_body() {
    let module = load("def f() {\n  def g() { return 1 }\n  class K { pass }\n  r = g()\n}");
    for method in METHODS {
        let f = wrap_named(&module, "f", &[], method).unwrap();
        let scope = f.call(Args::new()).unwrap().into_scope().unwrap();
        assert_eq!(inner_keys(&scope), vec!["g", "K", "r"], "{method}");
        assert_eq!(scope["g"].type_name(), "function");
        assert_eq!(scope["r"], Value::Int(1));
    }
}

#[test]
fn a_tuple_that_looks_like_a_payload_is_just_a_return_value() {
    let module = load("def f() {\n  a = 1\n  return (a, [], 3)\n}");
    for method in METHODS {
        let f = wrap_named(&module, "f", &[], method).unwrap();
        let scope = f.call(Args::new()).unwrap().into_scope().unwrap();
        assert_eq!(
            scope.return_value(),
            &Value::tuple(vec![Value::Int(1), Value::list(Vec::new()), Value::Int(3)]),
            "{method}"
        );
        assert_eq!(scope, bindings([("a", 1)]), "{method}");
    }
}

#[test]
fn scope_display_reads_like_a_mapping() {
    let module = load("def f() {\n  c = b + 1\n  s = 'x'\n}");
    for method in METHODS {
        let f = wrap_named(&module, "f", &[bindings([("b", 2)])], method).unwrap();
        let scope = f.call(Args::new()).unwrap().into_scope().unwrap();
        assert_eq!(scope.to_string(), "Scope({'b': 2, 'c': 3, 's': 'x'})", "{method}");
    }
}
