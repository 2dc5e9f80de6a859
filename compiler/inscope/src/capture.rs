//! Recovering a body's locals after it runs.
//!
//! Two methods produce the same `(return value, locals)` pair:
//!
//! - **Transform** rewrites every `ReturnValue` of the body into a short
//!   forward jump to an appended tail that snapshots the locals and returns
//!   `(value, locals, marker)`. The marker is a constant unique to the
//!   wrapper, so a body returning a look-alike tuple is never mistaken for a
//!   capture.
//! - **Trace** runs the body unchanged with a [`CaptureObserver`] in the
//!   frame observer slot and reads the locals off the frame as it exits.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use inscope_compile::{CodeFlags, CodeObject, Constant, Instr, Marker};
use inscope_ir::Name;
use inscope_vm::trace::{current_observer, install_observer, FrameEvent, FrameObserver};
use inscope_vm::value::Key;
use inscope_vm::Value;
use tracing::{trace, warn};

use crate::binder::Bindings;
use crate::config;
use crate::errors::ScopeError;

/// Default longest jump from a return point to the capture tail.
pub const DEFAULT_TRANSFORM_REACH: usize = 255;

/// Which capture mechanism a wrapper uses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// Whatever [`config::default_method`] says when the wrapper is built.
    #[default]
    Default,
    Transform,
    Trace,
}

impl Method {
    /// Replace `Default` with the process-wide default.
    pub fn resolve(self) -> Method {
        match self {
            Method::Default => config::default_method(),
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Default => "default",
            Method::Transform => "transform",
            Method::Trace => "trace",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown capture method '{0}' (expected transform, trace or default)")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Method::Default),
            "transform" | "bytecode" => Ok(Method::Transform),
            "trace" => Ok(Method::Trace),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Refuse bodies whose execution cannot be captured.
pub(crate) fn check_body(code: &CodeObject) -> Result<(), ScopeError> {
    let kind = if code.flags.contains(CodeFlags::ASYNC_GENERATOR) {
        "async generator"
    } else if code.flags.contains(CodeFlags::COROUTINE) {
        "coroutine"
    } else {
        return Ok(());
    };
    Err(ScopeError::UnsupportedBody {
        function: code.qualname.to_string(),
        kind,
    })
}

/// Rewrite `code` so every return hands back `(value, locals, marker)`.
///
/// Each `ReturnValue` becomes a `JumpForward` to a four-instruction tail
/// appended after the last original instruction. No instruction moves, so
/// existing jump targets stay valid. Fails when any return is more than
/// `reach` instructions from the tail.
pub fn rewrite(
    code: &CodeObject,
    marker: &Marker,
    reach: usize,
) -> Result<Rc<CodeObject>, ScopeError> {
    let tail = code.instructions.len();
    let distances: Vec<(usize, usize)> = code
        .instructions
        .iter()
        .enumerate()
        .filter(|(_, instr)| **instr == Instr::ReturnValue)
        .map(|(pc, _)| (pc, tail - (pc + 1)))
        .collect();

    let unreachable = distances.iter().filter(|(_, d)| *d > reach).count();
    if unreachable > 0 {
        return Err(ScopeError::CaptureLayout {
            function: code.qualname.to_string(),
            unreachable,
            total: distances.len(),
            farthest: distances.iter().map(|(_, d)| *d).max().unwrap_or(0),
            reach,
        });
    }

    let mut rewritten = code.clone();
    for &(pc, distance) in &distances {
        let delta = u32::try_from(distance).map_err(|_| ScopeError::CaptureLayout {
            function: code.qualname.to_string(),
            unreachable: 1,
            total: distances.len(),
            farthest: distance,
            reach,
        })?;
        rewritten.instructions[pc] = Instr::JumpForward(delta);
    }
    let marker_index = u32::try_from(rewritten.constants.len()).map_err(|_| {
        ScopeError::MalformedCapture {
            function: code.qualname.to_string(),
        }
    })?;
    rewritten.constants.push(Constant::Marker(marker.clone()));
    rewritten.instructions.extend([
        Instr::SnapshotLocals,
        Instr::LoadConst(marker_index),
        Instr::BuildTuple(3),
        Instr::ReturnValue,
    ]);
    trace!(
        code = %code.qualname,
        returns = distances.len(),
        "body rewritten for capture"
    );
    Ok(Rc::new(rewritten))
}

/// Per-wrapper capture setup, fixed at construction.
#[derive(Clone)]
pub(crate) enum CapturePlan {
    Transform { code: Rc<CodeObject>, marker: Marker },
    Trace,
}

impl CapturePlan {
    pub(crate) fn build(
        code: &Rc<CodeObject>,
        method: Method,
        reach: usize,
    ) -> Result<CapturePlan, ScopeError> {
        check_body(code)?;
        match method.resolve() {
            Method::Trace => Ok(CapturePlan::Trace),
            Method::Transform | Method::Default => {
                let marker = Marker::new(&format!("capture:{}", code.qualname));
                let code = rewrite(code, &marker, reach)?;
                Ok(CapturePlan::Transform { code, marker })
            }
        }
    }

    /// The code to run and the per-call capture state.
    pub(crate) fn prepare(&self, original: &Rc<CodeObject>) -> (Rc<CodeObject>, Capture) {
        match self {
            CapturePlan::Transform { code, marker } => {
                (Rc::clone(code), Capture::Transform(marker.clone()))
            }
            CapturePlan::Trace => (
                Rc::clone(original),
                Capture::Trace(Rc::new(CaptureObserver::new(Rc::clone(original)))),
            ),
        }
    }
}

/// Capture state for one call.
#[derive(Clone)]
pub(crate) enum Capture {
    Transform(Marker),
    Trace(Rc<CaptureObserver>),
}

impl Capture {
    /// Run one step of the body with the capture in place.
    pub(crate) fn run<T>(&self, step: impl FnOnce() -> T) -> T {
        match self {
            Capture::Transform(_) => step(),
            Capture::Trace(observer) => {
                let previous = current_observer();
                if previous.is_some() {
                    warn!(
                        code = %observer.target.qualname,
                        "frame observer already installed; chaining through it"
                    );
                }
                *observer.previous.borrow_mut() = previous;
                let guard = install_observer(Rc::clone(observer) as Rc<dyn FrameObserver>);
                let result = step();
                drop(guard);
                observer.previous.borrow_mut().take();
                result
            }
        }
    }

    /// Split the body's terminal value into return value and locals.
    pub(crate) fn finish(
        &self,
        terminal: Value,
        function: &str,
    ) -> Result<(Value, Bindings), ScopeError> {
        let malformed = || ScopeError::MalformedCapture {
            function: function.to_string(),
        };
        match self {
            Capture::Transform(marker) => {
                let Some([value, Value::Dict(locals), Value::Marker(found)]) = terminal.as_tuple()
                else {
                    return Err(malformed());
                };
                if found != marker {
                    return Err(malformed());
                }
                let locals = locals
                    .borrow()
                    .iter()
                    .map(|(key, value)| match key {
                        Key::Str(s) => Ok((Name::intern(s), value.clone())),
                        _ => Err(malformed()),
                    })
                    .collect::<Result<Bindings, _>>()?;
                Ok((value.clone(), locals))
            }
            Capture::Trace(observer) => {
                let locals = observer.take_locals().ok_or_else(malformed)?;
                Ok((terminal, locals))
            }
        }
    }
}

/// Frame observer that records the locals of one frame as it exits.
///
/// It latches onto the first frame entered with the target code, so
/// recursive calls of the same body are ignored. Every event is forwarded
/// to the observer it displaced.
pub struct CaptureObserver {
    target: Rc<CodeObject>,
    frame: Cell<Option<u64>>,
    locals: RefCell<Option<Bindings>>,
    previous: RefCell<Option<Rc<dyn FrameObserver>>>,
}

impl CaptureObserver {
    pub fn new(target: Rc<CodeObject>) -> Self {
        CaptureObserver {
            target,
            frame: Cell::new(None),
            locals: RefCell::new(None),
            previous: RefCell::new(None),
        }
    }

    /// Locals recorded at exit, if the target frame has exited.
    pub fn take_locals(&self) -> Option<Bindings> {
        self.locals.borrow_mut().take()
    }
}

impl FrameObserver for CaptureObserver {
    fn on_event(&self, event: &FrameEvent<'_>) {
        let frame = event.frame();
        match event {
            FrameEvent::Enter(_)
                if self.frame.get().is_none() && Rc::ptr_eq(&frame.code, &self.target) =>
            {
                trace!(code = %self.target.qualname, frame = frame.id(), "capture latched");
                self.frame.set(Some(frame.id()));
            }
            FrameEvent::Exit(_) if self.frame.get() == Some(frame.id()) => {
                trace!(code = %self.target.qualname, "locals captured at exit");
                *self.locals.borrow_mut() = Some(frame.locals());
            }
            _ => {}
        }
        let previous = self.previous.borrow().clone();
        if let Some(previous) = previous {
            previous.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests;
