#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use inscope_ir::Name;
use pretty_assertions::assert_eq;

fn run(source: &str) -> (Runtime, Module) {
    let rt = Runtime::builder().print_handler(buffer_handler()).build();
    let module = rt.load(source, "test").unwrap();
    (rt, module)
}

fn run_err(source: &str) -> VmError {
    let rt = Runtime::builder().print_handler(silent_handler()).build();
    match rt.load(source, "test") {
        Err(LoadError::Run(err)) => err,
        Err(other) => panic!("expected a runtime error, got {other}"),
        Ok(_) => panic!("expected a runtime error"),
    }
}

fn global(module: &Module, name: &str) -> String {
    module.get(name).unwrap().repr()
}

#[test]
fn test_arithmetic_and_globals() {
    let (_, m) = run("a = 7 // 2\nb = -7 // 2\nc = -7 % 3\nd = 2 ** -1\ne = 1 + 2.5");
    assert_eq!(global(&m, "a"), "3");
    assert_eq!(global(&m, "b"), "-4");
    assert_eq!(global(&m, "c"), "2");
    assert_eq!(global(&m, "d"), "0.5");
    assert_eq!(global(&m, "e"), "3.5");
}

#[test]
fn test_print_goes_through_handler() {
    let (rt, _) = run("print('a', 1, [2])\nprint('x', 'y', sep='-', end='!')");
    assert_eq!(rt.output(), "a 1 [2]\nx-y!");
}

#[test]
fn test_control_flow() {
    let source = "\
total = 0
for i in range(10) {
  if i % 2 == 0 { continue }
  if i > 7 { break }
  total += i
}
n = 0
while n < 5 { n += 1 }
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "total"), "16");
    assert_eq!(global(&m, "n"), "5");
}

#[test]
fn test_function_arguments() {
    let source = "\
def f(a, b=2, *rest, c, d=4, **extra) {
  return [a, b, rest, c, d, extra]
}
x = f(1, c=3)
y = f(1, 5, 6, 7, c=3, z=9)
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "x"), "[1, 2, (), 3, 4, {}]");
    assert_eq!(global(&m, "y"), "[1, 5, (6, 7), 3, 4, {'z': 9}]");
}

#[test]
fn test_argument_errors() {
    let err = run_err("def f(a) { pass }\nf()");
    assert_eq!(err.kind, ExceptionKind::TypeError);
    assert_eq!(err.message, "f() missing 1 required positional argument: 'a'");

    let err = run_err("def f(a) { pass }\nf(1, 2)");
    assert_eq!(
        err.message,
        "f() takes 1 positional argument but 2 were given"
    );

    let err = run_err("def f(a) { pass }\nf(1, a=2)");
    assert_eq!(err.message, "f() got multiple values for argument 'a'");

    let err = run_err("def f(a) { pass }\nf(b=2)");
    assert_eq!(err.message, "f() got an unexpected keyword argument 'b'");
}

#[test]
fn test_closures_share_cells() {
    let source = "\
def counter() {
  n = 0
  def step() {
    nonlocal n
    n += 1
    return n
  }
  return step
}
step = counter()
step()
step()
last = step()
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "last"), "3");
    let step = m.function("step").unwrap();
    let captured: Vec<(Name, Option<Value>)> = step.closure_values().collect();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0.as_str(), "n");
    assert_eq!(captured[0].1, Some(Value::Int(3)));
}

#[test]
fn test_unbound_local_records_name() {
    let source = "\
x = 1
def f() {
  y = x
  x = 2
}
f()
";
    let err = run_err(source);
    assert_eq!(err.kind, ExceptionKind::UnboundLocalError);
    assert_eq!(err.unbound_name.map(Name::as_str), Some("x"));
}

#[test]
fn test_raised_unbound_local_has_no_name() {
    let err = run_err("raise UnboundLocalError('x')");
    assert_eq!(err.kind, ExceptionKind::UnboundLocalError);
    assert_eq!(err.message, "x");
    assert_eq!(err.unbound_name, None);
}

#[test]
fn test_undefined_name() {
    let err = run_err("y = missing + 1");
    assert_eq!(err.kind, ExceptionKind::NameError);
    assert_eq!(err.message, "name 'missing' is not defined");
}

#[test]
fn test_classes_and_methods() {
    let source = "\
class Base {
  scale = 10
  def area(self) { return self.w * self.scale }
}
class Box(Base) {
  def __init__(self, w) { self.w = w }
}
b = Box(3)
a = b.area()
ok = isinstance(b, Base)
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "a"), "30");
    assert_eq!(global(&m, "ok"), "True");
    assert_eq!(global(&m, "Box"), "<class 'Box'>");
}

#[test]
fn test_class_body_reads_enclosing_function_locals() {
    let source = "\
def make(v) {
  class K {
    value = v
  }
  return K
}
k = make(5).value
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "k"), "5");
}

#[test]
fn test_generators_iterate_lazily() {
    let source = "\
log = []
def gen(n) {
  for i in range(n) {
    log.append(i)
    yield i * i
  }
  return 'done'
}
g = gen(3)
first = next(g)
rest = list(g)
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "first"), "0");
    assert_eq!(global(&m, "rest"), "[1, 4]");
    assert_eq!(global(&m, "log"), "[0, 1, 2]");
}

#[test]
fn test_generator_resume_reports_return_value() {
    let (rt, m) = run("def gen() {\n  yield 1\n  return 'end'\n}");
    let Value::Generator(g) = rt.call(&m.get("gen").unwrap(), &[], &[]).unwrap() else {
        panic!("expected generator");
    };
    assert!(matches!(g.resume().unwrap(), Resume::Yielded(Value::Int(1))));
    match g.resume().unwrap() {
        Resume::Returned(value) => assert_eq!(value, Value::str("end")),
        Resume::Yielded(_) => panic!("generator should have returned"),
    }
    assert!(g.is_finished());
    assert_eq!(g.resume().unwrap_err().kind, ExceptionKind::StopIteration);
}

#[test]
fn test_async_functions_are_not_run() {
    let err = run_err("async def f() { return 1 }\nf()");
    assert_eq!(err.kind, ExceptionKind::RuntimeError);
}

#[test]
fn test_recursion_limit() {
    let rt = Runtime::builder()
        .print_handler(silent_handler())
        .recursion_limit(50)
        .build();
    let err = match rt.load("def f(n) { return f(n + 1) }\nf(0)", "test") {
        Err(LoadError::Run(err)) => err,
        _ => panic!("expected recursion error"),
    };
    assert_eq!(err.kind, ExceptionKind::RecursionError);
}

#[test]
fn test_builtins() {
    let source = "\
a = len([1, 2, 3])
b = sorted([3, 1, 2], reverse=True)
c = list(enumerate('ab', start=1))
d = list(zip([1, 2], 'xy'))
e = sum(range(5))
f = max(3, 9, 4)
g = int('42') + int(2.9)
h = ','.join(['a', 'b']).upper()
i = {'k': 1}.get('z', 0)
j = str(1.5) + repr('q')
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "a"), "3");
    assert_eq!(global(&m, "b"), "[3, 2, 1]");
    assert_eq!(global(&m, "c"), "[(1, 'a'), (2, 'b')]");
    assert_eq!(global(&m, "d"), "[(1, 'x'), (2, 'y')]");
    assert_eq!(global(&m, "e"), "10");
    assert_eq!(global(&m, "f"), "9");
    assert_eq!(global(&m, "g"), "44");
    assert_eq!(global(&m, "h"), "'A,B'");
    assert_eq!(global(&m, "i"), "0");
    assert_eq!(global(&m, "j"), "\"1.5'q'\"");
}

#[test]
fn test_integer_overflow_is_an_error() {
    let err = run_err("x = 9223372036854775807 + 1");
    assert_eq!(err.kind, ExceptionKind::OverflowError);
}

#[test]
fn test_modulo_by_minus_one_never_overflows() {
    let (_, m) = run("low = -9223372036854775807 - 1\nr = low % -1\ns = 7 % -1\nt = -7 % -1");
    assert_eq!(global(&m, "r"), "0");
    assert_eq!(global(&m, "s"), "0");
    assert_eq!(global(&m, "t"), "0");
    let err = run_err("low = -9223372036854775807 - 1\nq = low // -1");
    assert_eq!(err.kind, ExceptionKind::OverflowError);
}

#[test]
fn test_assert_and_raise() {
    let err = run_err("assert 1 == 2, 'nope'");
    assert_eq!(err.kind, ExceptionKind::AssertionError);
    assert_eq!(err.message, "nope");

    let err = run_err("raise ValueError('bad', 1)");
    assert_eq!(err.kind, ExceptionKind::ValueError);
    assert_eq!(err.message, "('bad', 1)");
}

#[test]
fn test_unpacking_and_subscripts() {
    let source = "\
a, b = 1, 2
a, b = b, a
xs = [1, 2, 3]
xs[-1] = 9
d = {}
d['k'] = xs[0]
";
    let (_, m) = run(source);
    assert_eq!(global(&m, "a"), "2");
    assert_eq!(global(&m, "b"), "1");
    assert_eq!(global(&m, "xs"), "[1, 2, 9]");
    assert_eq!(global(&m, "d"), "{'k': 1}");
}

#[test]
fn test_parse_and_compile_errors_surface_from_load() {
    let rt = Runtime::new();
    assert!(matches!(rt.load("x = (", "bad"), Err(LoadError::Parse(_))));
    assert!(matches!(rt.load("return 1", "bad"), Err(LoadError::Compile(_))));
}
