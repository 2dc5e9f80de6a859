//! Guest exceptions as Rust errors.
//!
//! Every failure inside guest code surfaces as a [`VmError`]: an exception
//! kind plus message. Factory functions below are the public way to build
//! them, so messages stay uniform across the interpreter and builtins.

use std::fmt;

use inscope_ir::Name;

use crate::value::Value;

/// Built-in exception classes. `Exception` is the base of all others.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    NameError,
    UnboundLocalError,
    TypeError,
    ValueError,
    ZeroDivisionError,
    OverflowError,
    KeyError,
    IndexError,
    AttributeError,
    AssertionError,
    RuntimeError,
    RecursionError,
    StopIteration,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 14] = [
        ExceptionKind::Exception,
        ExceptionKind::NameError,
        ExceptionKind::UnboundLocalError,
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::KeyError,
        ExceptionKind::IndexError,
        ExceptionKind::AttributeError,
        ExceptionKind::AssertionError,
        ExceptionKind::RuntimeError,
        ExceptionKind::RecursionError,
        ExceptionKind::StopIteration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::UnboundLocalError => "UnboundLocalError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::StopIteration => "StopIteration",
        }
    }

    pub fn from_name(name: &str) -> Option<ExceptionKind> {
        ExceptionKind::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Whether an exception of this kind is caught by `class`.
    pub fn is_subclass_of(self, class: ExceptionKind) -> bool {
        self == class
            || class == ExceptionKind::Exception
            || (self == ExceptionKind::UnboundLocalError && class == ExceptionKind::NameError)
            || (self == ExceptionKind::RecursionError && class == ExceptionKind::RuntimeError)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a VM operation; defaults to producing a value.
pub type VmResult<T = Value> = Result<T, VmError>;

/// A guest exception propagating out of the VM.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct VmError {
    pub kind: ExceptionKind,
    pub message: String,
    /// Set only when the VM itself detects a read of an unassigned local.
    /// A guest `raise UnboundLocalError(...)` leaves this empty.
    pub unbound_name: Option<Name>,
}

impl VmError {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        VmError {
            kind,
            message: message.into(),
            unbound_name: None,
        }
    }
}

pub fn type_error(message: impl Into<String>) -> VmError {
    VmError::new(ExceptionKind::TypeError, message)
}

pub fn value_error(message: impl Into<String>) -> VmError {
    VmError::new(ExceptionKind::ValueError, message)
}

pub fn runtime_error(message: impl Into<String>) -> VmError {
    VmError::new(ExceptionKind::RuntimeError, message)
}

pub fn index_error(message: impl Into<String>) -> VmError {
    VmError::new(ExceptionKind::IndexError, message)
}

pub fn key_error(key_repr: impl Into<String>) -> VmError {
    VmError::new(ExceptionKind::KeyError, key_repr)
}

pub fn zero_division(message: impl Into<String>) -> VmError {
    VmError::new(ExceptionKind::ZeroDivisionError, message)
}

/// Result of integer `operation` does not fit in 64 bits.
pub fn integer_overflow(operation: &str) -> VmError {
    VmError::new(
        ExceptionKind::OverflowError,
        format!("integer overflow in {operation}"),
    )
}

pub fn unsupported_operands(symbol: &str, left: &Value, right: &Value) -> VmError {
    type_error(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    ))
}

pub fn not_callable(value: &Value) -> VmError {
    type_error(format!("'{}' object is not callable", value.type_name()))
}

pub fn not_iterable(value: &Value) -> VmError {
    type_error(format!("'{}' object is not iterable", value.type_name()))
}

pub fn name_not_defined(name: Name) -> VmError {
    VmError::new(
        ExceptionKind::NameError,
        format!("name '{name}' is not defined"),
    )
}

pub fn unbound_local(name: Name) -> VmError {
    VmError {
        kind: ExceptionKind::UnboundLocalError,
        message: format!("local variable '{name}' referenced before assignment"),
        unbound_name: Some(name),
    }
}

pub fn unbound_free(name: Name) -> VmError {
    VmError::new(
        ExceptionKind::NameError,
        format!("free variable '{name}' referenced before assignment in enclosing scope"),
    )
}

pub fn attribute_error(type_name: &str, attr: Name) -> VmError {
    VmError::new(
        ExceptionKind::AttributeError,
        format!("'{type_name}' object has no attribute '{attr}'"),
    )
}

pub fn class_attribute_error(class: Name, attr: Name) -> VmError {
    VmError::new(
        ExceptionKind::AttributeError,
        format!("type object '{class}' has no attribute '{attr}'"),
    )
}

pub fn recursion_limit(limit: usize) -> VmError {
    VmError::new(
        ExceptionKind::RecursionError,
        format!("maximum recursion depth exceeded (limit {limit})"),
    )
}

pub fn stop_iteration() -> VmError {
    VmError::new(ExceptionKind::StopIteration, "")
}

/// Stack discipline violated by a malformed code object.
pub fn stack_underflow() -> VmError {
    runtime_error("value stack underflow")
}
