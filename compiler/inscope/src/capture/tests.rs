#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use inscope_vm::{call_function, FunctionObject, Runtime};
use pretty_assertions::assert_eq;

fn function(source: &str, name: &str) -> Rc<FunctionObject> {
    let module = Runtime::new().load(source, "capture").unwrap();
    module.function(name).unwrap()
}

const TWO_RETURNS: &str = "\
def f(x) {
  if x { return 1 }
  y = 2
  z = y * 3
}
";

#[test]
fn test_rewrite_turns_returns_into_jumps_to_tail() {
    let f = function(TWO_RETURNS, "f");
    let original = &f.code;
    let marker = Marker::new("test");
    let rewritten = rewrite(original, &marker, DEFAULT_TRANSFORM_REACH).unwrap();

    let tail = original.instructions.len();
    assert_eq!(rewritten.instructions.len(), tail + 4);
    let mut returns = 0;
    for (pc, instr) in original.instructions.iter().enumerate() {
        if *instr == Instr::ReturnValue {
            returns += 1;
            let delta = u32::try_from(tail - pc - 1).unwrap();
            assert_eq!(rewritten.instructions[pc], Instr::JumpForward(delta));
        } else {
            assert_eq!(rewritten.instructions[pc], *instr);
        }
    }
    assert_eq!(returns, 2);

    let marker_index = u32::try_from(original.constants.len()).unwrap();
    assert_eq!(
        &rewritten.instructions[tail..],
        &[
            Instr::SnapshotLocals,
            Instr::LoadConst(marker_index),
            Instr::BuildTuple(3),
            Instr::ReturnValue,
        ]
    );
    assert!(matches!(
        rewritten.constants.last(),
        Some(Constant::Marker(found)) if *found == marker
    ));
}

#[test]
fn test_rewrite_reports_unreachable_returns() {
    let f = function(TWO_RETURNS, "f");
    let err = rewrite(&f.code, &Marker::new("test"), 2).unwrap_err();
    let ScopeError::CaptureLayout {
        unreachable,
        total,
        farthest,
        reach,
        ..
    } = err
    else {
        panic!("expected a layout error, got {err:?}");
    };
    assert_eq!(unreachable, 1);
    assert_eq!(total, 2);
    assert_eq!(reach, 2);
    let first_return = f
        .code
        .instructions
        .iter()
        .position(|i| *i == Instr::ReturnValue)
        .unwrap();
    assert_eq!(farthest, f.code.instructions.len() - first_return - 1);
}

#[test]
fn test_rewritten_body_returns_payload() {
    let f = function(TWO_RETURNS, "f");
    let marker = Marker::new("test");
    let code = rewrite(&f.code, &marker, DEFAULT_TRANSFORM_REACH).unwrap();
    let runnable = Rc::new(FunctionObject {
        code,
        globals: f.globals.clone(),
        defaults: Vec::new(),
        kwdefaults: f.kwdefaults.clone(),
        closure: Vec::new(),
    });

    let capture = Capture::Transform(marker);
    let terminal = call_function(&runnable, &[Value::Bool(true)], &[]).unwrap();
    let (value, locals) = capture.finish(terminal, "f").unwrap();
    assert_eq!(value, Value::Int(1));
    assert_eq!(locals.keys().map(|n| n.as_str()).collect::<Vec<_>>(), vec!["x"]);

    let terminal = call_function(&runnable, &[Value::Bool(false)], &[]).unwrap();
    let (value, locals) = capture.finish(terminal, "f").unwrap();
    assert_eq!(value, Value::None);
    assert_eq!(
        locals.keys().map(|n| n.as_str()).collect::<Vec<_>>(),
        vec!["x", "y", "z"]
    );
}

#[test]
fn test_payload_with_foreign_marker_is_malformed() {
    let capture = Capture::Transform(Marker::new("mine"));
    let look_alike = Value::tuple(vec![
        Value::Int(1),
        Value::dict_from_names(&Bindings::default()),
        Value::Marker(Marker::new("mine")),
    ]);
    assert!(matches!(
        capture.finish(look_alike, "f"),
        Err(ScopeError::MalformedCapture { .. })
    ));
    assert!(matches!(
        capture.finish(Value::Int(1), "f"),
        Err(ScopeError::MalformedCapture { .. })
    ));
}

#[test]
fn test_async_bodies_are_rejected() {
    let f = function("async def f() { return 1 }", "f");
    assert_eq!(
        check_body(&f.code),
        Err(ScopeError::UnsupportedBody {
            function: "f".to_string(),
            kind: "coroutine",
        })
    );
    let g = function("async def g() { yield 1 }", "g");
    assert!(matches!(
        CapturePlan::build(&g.code, Method::Trace, DEFAULT_TRANSFORM_REACH),
        Err(ScopeError::UnsupportedBody {
            kind: "async generator",
            ..
        })
    ));
}

#[test]
fn test_method_names() {
    assert_eq!("transform".parse::<Method>().unwrap(), Method::Transform);
    assert_eq!("bytecode".parse::<Method>().unwrap(), Method::Transform);
    assert_eq!(" Trace ".parse::<Method>().unwrap(), Method::Trace);
    assert_eq!("default".parse::<Method>().unwrap(), Method::Default);
    assert!("ptrace".parse::<Method>().is_err());
    assert_eq!(Method::Trace.to_string(), "trace");
}

#[derive(Default)]
struct Counter {
    events: RefCell<usize>,
}

impl FrameObserver for Counter {
    fn on_event(&self, _: &FrameEvent<'_>) {
        *self.events.borrow_mut() += 1;
    }
}

#[test]
fn test_trace_capture_chains_to_installed_observer() {
    let f = function("def f(a) {\n  b = a + 1\n  return b\n}", "f");
    let counter = Rc::new(Counter::default());
    let _guard = install_observer(counter.clone());

    let observer = Rc::new(CaptureObserver::new(Rc::clone(&f.code)));
    let capture = Capture::Trace(Rc::clone(&observer));
    let terminal = capture
        .run(|| call_function(&f, &[Value::Int(1)], &[]))
        .unwrap();
    let (value, locals) = capture.finish(terminal, "f").unwrap();

    assert_eq!(value, Value::Int(2));
    assert_eq!(locals.get(&Name::intern("b")), Some(&Value::Int(2)));
    assert_eq!(*counter.events.borrow(), 2);
    assert!(Rc::ptr_eq(
        &current_observer().unwrap(),
        &(counter as Rc<dyn FrameObserver>)
    ));
}

#[test]
fn test_trace_capture_ignores_recursive_frames() {
    let source = "\
def f(n) {
  depth = n
  if n > 0 { f(n - 1) }
}
";
    let f = function(source, "f");
    let observer = Rc::new(CaptureObserver::new(Rc::clone(&f.code)));
    let capture = Capture::Trace(observer);
    let terminal = capture
        .run(|| call_function(&f, &[Value::Int(3)], &[]))
        .unwrap();
    let (_, locals) = capture.finish(terminal, "f").unwrap();
    assert_eq!(locals.get(&Name::intern("depth")), Some(&Value::Int(3)));
}
