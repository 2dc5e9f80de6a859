//! Generator objects.
//!
//! A generator owns the suspended frame of a generator-function call.
//! Each [`Generator::resume`] runs the frame until its next `yield` or its
//! return; after that the generator is finished for good.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use inscope_compile::CodeObject;

use crate::errors::{stop_iteration, value_error, VmError};
use crate::frame::Frame;
use crate::interp::{execute, Completion};
use crate::value::Value;

/// Outcome of one resume step.
#[derive(Clone, Debug, PartialEq)]
pub enum Resume {
    Yielded(Value),
    Returned(Value),
}

enum GenState {
    Suspended(Box<Frame>),
    Running,
    Finished,
}

pub struct Generator {
    code: Rc<CodeObject>,
    state: RefCell<GenState>,
    started: Cell<bool>,
}

impl Generator {
    pub(crate) fn new(frame: Frame) -> Self {
        Generator {
            code: Rc::clone(&frame.code),
            state: RefCell::new(GenState::Suspended(Box::new(frame))),
            started: Cell::new(false),
        }
    }

    pub fn code(&self) -> &Rc<CodeObject> {
        &self.code
    }

    pub fn qualname(&self) -> &str {
        &self.code.qualname
    }

    pub fn is_finished(&self) -> bool {
        matches!(*self.state.borrow(), GenState::Finished)
    }

    /// Run until the next `yield` or the end of the body.
    ///
    /// Resuming a finished generator raises `StopIteration`; resuming one
    /// from inside its own body raises `ValueError`.
    pub fn resume(&self) -> Result<Resume, VmError> {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), GenState::Running);
        let mut frame = match previous {
            GenState::Suspended(frame) => frame,
            GenState::Running => return Err(value_error("generator already executing")),
            GenState::Finished => {
                *self.state.borrow_mut() = GenState::Finished;
                return Err(stop_iteration());
            }
        };
        if self.started.replace(true) {
            // Value of the `yield` expression we resume from.
            frame.push(Value::None);
        }
        match execute(&mut frame) {
            Ok(Completion::Yield(value)) => {
                *self.state.borrow_mut() = GenState::Suspended(frame);
                Ok(Resume::Yielded(value))
            }
            Ok(Completion::Return(value)) => {
                *self.state.borrow_mut() = GenState::Finished;
                Ok(Resume::Returned(value))
            }
            Err(err) => {
                *self.state.borrow_mut() = GenState::Finished;
                Err(err)
            }
        }
    }

    /// The next yielded value, or `None` once the body has returned.
    pub fn next_value(&self) -> Result<Option<Value>, VmError> {
        if self.is_finished() {
            return Ok(None);
        }
        match self.resume()? {
            Resume::Yielded(value) => Ok(Some(value)),
            Resume::Returned(_) => Ok(None),
        }
    }
}
