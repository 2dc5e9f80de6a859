//! The bytecode interpreter.
//!
//! [`execute`] runs one frame until it returns or yields, reporting the
//! transition to the frame observer (see [`crate::trace`]). Calls recurse
//! natively: each guest call gets its own `execute`, guarded by the
//! runtime's recursion limit and by [`ensure_sufficient_stack`].

mod attr;
mod iter;
mod ops;

use std::cell::RefCell;
use std::rc::Rc;

use inscope_compile::{make_function, CodeFlags, CodeObject, Instr};
use inscope_ir::{ensure_sufficient_stack, Name};
use smallvec::SmallVec;
use tracing::trace;

use crate::errors::{
    name_not_defined, not_callable, recursion_limit, runtime_error, stack_underflow, type_error,
    value_error, ExceptionKind, VmError,
};
use crate::frame::Frame;
use crate::generator::Generator;
use crate::namespace::{Builtins, Globals, Namespace};
use crate::trace::{notify, FrameEvent};
use crate::value::{
    ClassObject, DictMap, ExceptionValue, FunctionObject, Instance, Key, NameMap, Value,
};

pub use iter::IterState;
pub(crate) use iter::{collect_iterable, make_iter, next_item};
pub(crate) use ops::{binary, order};

/// Call arguments; most calls pass a handful.
pub(crate) type ArgList = SmallVec<[Value; 4]>;

/// How a frame stopped running.
pub(crate) enum Completion {
    Return(Value),
    Yield(Value),
}

/// Counts active frames against the runtime's recursion limit.
struct DepthGuard(Rc<Builtins>);

impl DepthGuard {
    fn enter(builtins: &Rc<Builtins>) -> Result<Self, VmError> {
        let depth = builtins.depth.get() + 1;
        if depth > builtins.recursion_limit {
            return Err(recursion_limit(builtins.recursion_limit));
        }
        builtins.depth.set(depth);
        Ok(DepthGuard(Rc::clone(builtins)))
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.0.depth.set(self.0.depth.get().saturating_sub(1));
    }
}

/// Run `frame` until it returns or yields.
pub(crate) fn execute(frame: &mut Frame) -> Result<Completion, VmError> {
    let _depth = DepthGuard::enter(&frame.globals.builtins)?;
    notify(&FrameEvent::Enter(frame));
    let result = ensure_sufficient_stack(|| run_frame(frame));
    match &result {
        Ok(Completion::Return(_)) => notify(&FrameEvent::Exit(frame)),
        Ok(Completion::Yield(_)) => notify(&FrameEvent::Suspend(frame)),
        Err(err) => {
            trace!(code = %frame.code.qualname, error = %err, "frame unwinding");
            notify(&FrameEvent::Unwind(frame));
        }
    }
    result
}

/// Execute module-level code in `globals`.
pub fn run_module(code: Rc<CodeObject>, globals: Globals) -> Result<(), VmError> {
    let mut frame = Frame::for_module(code, globals);
    match execute(&mut frame)? {
        Completion::Return(_) => Ok(()),
        Completion::Yield(_) => Err(runtime_error("'yield' at module level")),
    }
}

#[allow(clippy::too_many_lines)] // one arm per instruction
fn run_frame(frame: &mut Frame) -> Result<Completion, VmError> {
    let code = Rc::clone(&frame.code);
    loop {
        let instr = *code.instructions.get(frame.pc).ok_or_else(|| {
            runtime_error(format!("{} ran past its last instruction", code.qualname))
        })?;
        frame.pc += 1;
        match instr {
            Instr::LoadConst(i) => {
                let value = frame.constant(i)?;
                frame.push(value);
            }
            Instr::LoadFast(i) => {
                let value = frame.load_fast(i)?;
                frame.push(value);
            }
            Instr::StoreFast(i) => {
                let value = frame.pop()?;
                frame.store_fast(i, value)?;
            }
            Instr::LoadDeref(i) => {
                let value = frame.load_deref(i)?;
                frame.push(value);
            }
            Instr::StoreDeref(i) => {
                let value = frame.pop()?;
                frame.cell(i)?.set(value);
            }
            Instr::LoadClosure(i) => {
                let cell = Rc::clone(frame.cell(i)?);
                frame.push(Value::Cell(cell));
            }
            Instr::LoadClassDeref(i) => {
                let name = frame.deref_name(i)?;
                let value = match frame.class_ns.as_ref().and_then(|ns| ns.get(name)) {
                    Some(value) => value,
                    None => frame.load_deref(i)?,
                };
                frame.push(value);
            }
            Instr::LoadGlobal(i) => {
                let name = frame.name(i)?;
                let value = frame
                    .globals
                    .lookup(name)
                    .ok_or_else(|| name_not_defined(name))?;
                frame.push(value);
            }
            Instr::StoreGlobal(i) => {
                let name = frame.name(i)?;
                let value = frame.pop()?;
                frame.globals.vars.set(name, value);
            }
            Instr::LoadName(i) => {
                let name = frame.name(i)?;
                let value = frame
                    .class_ns
                    .as_ref()
                    .and_then(|ns| ns.get(name))
                    .or_else(|| frame.globals.lookup(name))
                    .ok_or_else(|| name_not_defined(name))?;
                frame.push(value);
            }
            Instr::StoreName(i) => {
                let name = frame.name(i)?;
                let value = frame.pop()?;
                match &frame.class_ns {
                    Some(ns) => ns.set(name, value),
                    None => frame.globals.vars.set(name, value),
                }
            }
            Instr::LoadAttr(i) => {
                let name = frame.name(i)?;
                let object = frame.pop()?;
                frame.push(attr::get_attr(&object, name)?);
            }
            Instr::StoreAttr(i) => {
                let name = frame.name(i)?;
                let object = frame.pop()?;
                let value = frame.pop()?;
                attr::set_attr(&object, name, value)?;
            }
            Instr::LoadSubscript => {
                let index = frame.pop()?;
                let container = frame.pop()?;
                frame.push(attr::get_item(&container, &index)?);
            }
            Instr::StoreSubscript => {
                let index = frame.pop()?;
                let container = frame.pop()?;
                let value = frame.pop()?;
                attr::set_item(&container, &index, value)?;
            }

            Instr::Unary(op) => {
                let operand = frame.pop()?;
                frame.push(ops::unary(op, &operand)?);
            }
            Instr::Binary(op) => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(ops::binary(op, &left, &right)?);
            }
            Instr::Compare(op) => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(ops::compare(op, &left, &right)?);
            }

            Instr::BuildList(n) => {
                let items = frame.pop_n(n as usize)?;
                frame.push(Value::list(items.into_vec()));
            }
            Instr::BuildTuple(n) => {
                let items = frame.pop_n(n as usize)?;
                frame.push(Value::tuple(items.into_vec()));
            }
            Instr::BuildDict(n) => {
                let flat = frame.pop_n(2 * n as usize)?;
                let mut map = DictMap::default();
                for pair in flat.chunks_exact(2) {
                    map.insert(Key::from_value(&pair[0])?, pair[1].clone());
                }
                frame.push(Value::dict(map));
            }
            Instr::UnpackSequence(n) => {
                let sequence = frame.pop()?;
                let items = collect_iterable(&sequence)?;
                let expected = n as usize;
                if items.len() < expected {
                    return Err(value_error(format!(
                        "not enough values to unpack (expected {expected}, got {})",
                        items.len()
                    )));
                }
                if items.len() > expected {
                    return Err(value_error(format!(
                        "too many values to unpack (expected {expected})"
                    )));
                }
                frame.stack.extend(items.into_iter().rev());
            }

            Instr::Call(n) => {
                let args = frame.pop_n(n as usize)?;
                let callee = frame.pop()?;
                let builtins = Rc::clone(&frame.globals.builtins);
                frame.push(call_value(&builtins, &callee, &args, &[])?);
            }
            Instr::CallKw(n) => {
                let names = keyword_names(&frame.pop()?)?;
                let mut args = frame.pop_n(n as usize)?;
                let split = args.len().checked_sub(names.len()).ok_or_else(|| {
                    runtime_error("keyword names exceed call arguments")
                })?;
                let kwargs: Vec<(Name, Value)> =
                    names.into_iter().zip(args.drain(split..)).collect();
                let callee = frame.pop()?;
                let builtins = Rc::clone(&frame.globals.builtins);
                frame.push(call_value(&builtins, &callee, &args, &kwargs)?);
            }
            Instr::MakeFunction(flags) => {
                let function = make_function_object(frame, flags)?;
                frame.push(Value::Function(Rc::new(function)));
            }
            Instr::LoadBuildClass => frame.push(crate::builtins::build_class_builtin()),

            Instr::Jump(target) => frame.pc = target as usize,
            Instr::JumpIfFalse(target) => {
                if !frame.pop()?.is_truthy() {
                    frame.pc = target as usize;
                }
            }
            Instr::JumpIfTrue(target) => {
                if frame.pop()?.is_truthy() {
                    frame.pc = target as usize;
                }
            }
            Instr::JumpIfFalseOrPop(target) => {
                if frame.top()?.is_truthy() {
                    frame.pop()?;
                } else {
                    frame.pc = target as usize;
                }
            }
            Instr::JumpIfTrueOrPop(target) => {
                if frame.top()?.is_truthy() {
                    frame.pc = target as usize;
                } else {
                    frame.pop()?;
                }
            }
            Instr::JumpForward(delta) => frame.pc += delta as usize,
            Instr::GetIter => {
                let iterable = frame.pop()?;
                frame.push(make_iter(&iterable)?);
            }
            Instr::ForIter(target) => {
                let iterator = frame.top()?.clone();
                match next_item(&iterator)? {
                    Some(item) => frame.push(item),
                    None => {
                        frame.pop()?;
                        frame.pc = target as usize;
                    }
                }
            }

            Instr::Pop => {
                frame.pop()?;
            }
            Instr::Dup => {
                let top = frame.top()?.clone();
                frame.push(top);
            }
            Instr::DupTwo => {
                let pair = frame.pop_n(2)?;
                frame.stack.extend(pair.iter().cloned());
                frame.stack.extend(pair);
            }
            Instr::Rot2 => {
                let top = frame.pop()?;
                let second = frame.pop()?;
                frame.push(top);
                frame.push(second);
            }
            Instr::Rot3 => {
                let top = frame.pop()?;
                let at = frame
                    .stack
                    .len()
                    .checked_sub(2)
                    .ok_or_else(stack_underflow)?;
                frame.stack.insert(at, top);
            }

            Instr::YieldValue => return Ok(Completion::Yield(frame.pop()?)),
            Instr::Await => {
                return Err(runtime_error("'await' is not supported by this runtime"));
            }
            Instr::Raise => return Err(raise(&frame.pop()?)),
            Instr::RaiseAssert => {
                let message = match frame.pop()? {
                    Value::None => String::new(),
                    other => other.to_display_string(),
                };
                return Err(VmError::new(ExceptionKind::AssertionError, message));
            }
            Instr::ReturnValue => return Ok(Completion::Return(frame.pop()?)),
            Instr::SnapshotLocals => {
                let locals = frame.locals();
                frame.push(Value::dict_from_names(&locals));
            }
        }
    }
}

fn keyword_names(value: &Value) -> Result<Vec<Name>, VmError> {
    value
        .as_tuple()
        .ok_or_else(|| runtime_error("CallKw without keyword names"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(Name::intern)
                .ok_or_else(|| runtime_error("keyword name is not a string"))
        })
        .collect()
}

/// Pop the pieces announced by `flags` and build a function.
fn make_function_object(frame: &mut Frame, flags: u8) -> Result<FunctionObject, VmError> {
    let Value::Code(code) = frame.pop()? else {
        return Err(runtime_error("MakeFunction without a code object"));
    };
    let mut function = FunctionObject::new(code, frame.globals.clone());
    if flags & make_function::CLOSURE != 0 {
        let cells = frame.pop()?;
        function.closure = cells
            .as_tuple()
            .ok_or_else(|| runtime_error("closure is not a tuple"))?
            .iter()
            .map(|cell| match cell {
                Value::Cell(cell) => Ok(Rc::clone(cell)),
                _ => Err(runtime_error("closure entry is not a cell")),
            })
            .collect::<Result<_, _>>()?;
    }
    if flags & make_function::KWDEFAULTS != 0 {
        let Value::Dict(map) = frame.pop()? else {
            return Err(runtime_error("keyword defaults are not a dict"));
        };
        function.kwdefaults = map
            .borrow()
            .iter()
            .filter_map(|(key, value)| match key {
                Key::Str(s) => Some((Name::intern(s), value.clone())),
                _ => None,
            })
            .collect();
    }
    if flags & make_function::DEFAULTS != 0 {
        let defaults = frame.pop()?;
        function.defaults = defaults
            .as_tuple()
            .ok_or_else(|| runtime_error("defaults are not a tuple"))?
            .to_vec();
    }
    Ok(function)
}

fn raise(value: &Value) -> VmError {
    match value {
        Value::Exception(exception) => exception.to_error(),
        Value::ExceptionType(kind) => VmError::new(*kind, ""),
        other => type_error(format!(
            "exceptions must derive from Exception, not '{}'",
            other.type_name()
        )),
    }
}

/// Call any callable value.
pub fn call_value(
    builtins: &Rc<Builtins>,
    callee: &Value,
    args: &[Value],
    kwargs: &[(Name, Value)],
) -> Result<Value, VmError> {
    match callee {
        Value::Function(function) => call_function(function, args, kwargs),
        Value::Builtin(builtin) => (builtin.func)(builtins, args, kwargs),
        Value::BoundMethod(method) => {
            let mut full = ArgList::with_capacity(args.len() + 1);
            full.push(method.receiver.clone());
            full.extend(args.iter().cloned());
            call_value(builtins, &method.function, &full, kwargs)
        }
        Value::Class(class) => instantiate(builtins, class, args, kwargs),
        Value::ExceptionType(kind) => {
            if let Some((name, _)) = kwargs.first() {
                return Err(type_error(format!(
                    "{kind}() takes no keyword arguments, got '{name}'"
                )));
            }
            let message = match args {
                [] => String::new(),
                [single] => single.to_display_string(),
                many => Value::tuple(many.to_vec()).repr(),
            };
            Ok(Value::Exception(Rc::new(ExceptionValue {
                kind: *kind,
                message,
            })))
        }
        other => Err(not_callable(other)),
    }
}

fn instantiate(
    builtins: &Rc<Builtins>,
    class: &Rc<ClassObject>,
    args: &[Value],
    kwargs: &[(Name, Value)],
) -> Result<Value, VmError> {
    let instance = Value::Instance(Rc::new(Instance {
        class: Rc::clone(class),
        attrs: RefCell::new(NameMap::default()),
    }));
    match class.lookup(Name::intern("__init__")) {
        Some(init) => {
            let mut full = ArgList::with_capacity(args.len() + 1);
            full.push(instance.clone());
            full.extend(args.iter().cloned());
            let result = call_value(builtins, &init, &full, kwargs)?;
            if !matches!(result, Value::None) {
                return Err(type_error(format!(
                    "__init__() should return None, not '{}'",
                    result.type_name()
                )));
            }
        }
        None if !args.is_empty() || !kwargs.is_empty() => {
            return Err(type_error(format!("{}() takes no arguments", class.name)));
        }
        None => {}
    }
    Ok(instance)
}

/// Call a guest function.
///
/// Generator functions return a fresh `Value::Generator` without running
/// any of the body. Coroutine functions are refused.
pub fn call_function(
    function: &Rc<FunctionObject>,
    args: &[Value],
    kwargs: &[(Name, Value)],
) -> Result<Value, VmError> {
    let code = &function.code;
    if code
        .flags
        .intersects(CodeFlags::COROUTINE | CodeFlags::ASYNC_GENERATOR)
    {
        return Err(runtime_error(format!(
            "coroutine function '{}' cannot be run by this runtime",
            code.qualname
        )));
    }
    let mut frame = Frame::for_function(function);
    bind_arguments(&mut frame, function, args, kwargs)?;
    frame.move_params_to_cells();
    if code.is_generator() {
        return Ok(Value::Generator(Rc::new(Generator::new(frame))));
    }
    match execute(&mut frame)? {
        Completion::Return(value) => Ok(value),
        Completion::Yield(_) => Err(runtime_error("yield from a non-generator body")),
    }
}

/// Run a class body into a fresh namespace and build the class.
pub(crate) fn build_class(
    body: &Rc<FunctionObject>,
    name: Name,
    bases: Vec<Rc<ClassObject>>,
) -> Result<Value, VmError> {
    let namespace = Namespace::new();
    let mut frame = Frame::for_class_body(body, namespace.clone());
    execute(&mut frame)?;
    Ok(Value::Class(Rc::new(ClassObject {
        name,
        bases,
        namespace,
    })))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn quoted_list(names: &[Name]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bind call arguments into the parameter slots of a new frame.
fn bind_arguments(
    frame: &mut Frame,
    function: &FunctionObject,
    args: &[Value],
    kwargs: &[(Name, Value)],
) -> Result<(), VmError> {
    let code = Rc::clone(&function.code);
    let name = code.name;
    let positional = code.arg_count as usize;
    let kwonly = code.kwonly_count as usize;
    let named = positional + kwonly;

    for (slot, value) in args.iter().take(positional).enumerate() {
        frame.fast[slot] = Some(value.clone());
    }

    let mut slot = named;
    if code.flags.contains(CodeFlags::VARARGS) {
        let extra = args.get(positional..).unwrap_or_default();
        frame.fast[slot] = Some(Value::tuple(extra.to_vec()));
        slot += 1;
    } else if args.len() > positional {
        return Err(type_error(format!(
            "{name}() takes {positional} positional argument{} but {} {} given",
            plural(positional),
            args.len(),
            if args.len() == 1 { "was" } else { "were" }
        )));
    }

    let varkw_slot = code.flags.contains(CodeFlags::VARKEYWORDS).then_some(slot);
    let mut extra_kwargs = DictMap::default();
    for (key, value) in kwargs {
        match code.varnames[..named].iter().position(|n| n == key) {
            Some(at) => {
                if frame.fast[at].is_some() {
                    return Err(type_error(format!(
                        "{name}() got multiple values for argument '{key}'"
                    )));
                }
                frame.fast[at] = Some(value.clone());
            }
            None if varkw_slot.is_some() => {
                if extra_kwargs
                    .insert(Key::str(key.as_str()), value.clone())
                    .is_some()
                {
                    return Err(type_error(format!(
                        "{name}() got multiple values for keyword argument '{key}'"
                    )));
                }
            }
            None => {
                return Err(type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )));
            }
        }
    }
    if let Some(slot) = varkw_slot {
        frame.fast[slot] = Some(Value::dict(extra_kwargs));
    }

    let first_default = positional.saturating_sub(function.defaults.len());
    let mut missing = Vec::new();
    for at in 0..positional {
        if frame.fast[at].is_none() {
            let default = at
                .checked_sub(first_default)
                .and_then(|i| function.defaults.get(i));
            match default {
                Some(default) => frame.fast[at] = Some(default.clone()),
                None => missing.push(code.varnames[at]),
            }
        }
    }
    if !missing.is_empty() {
        return Err(type_error(format!(
            "{name}() missing {} required positional argument{}: {}",
            missing.len(),
            plural(missing.len()),
            quoted_list(&missing)
        )));
    }

    for at in positional..named {
        if frame.fast[at].is_none() {
            let param = code.varnames[at];
            match function.kwdefaults.get(&param) {
                Some(default) => frame.fast[at] = Some(default.clone()),
                None => missing.push(param),
            }
        }
    }
    if !missing.is_empty() {
        return Err(type_error(format!(
            "{name}() missing {} required keyword-only argument{}: {}",
            missing.len(),
            plural(missing.len()),
            quoted_list(&missing)
        )));
    }
    Ok(())
}
