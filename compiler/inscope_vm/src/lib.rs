//! Inscope VM - stack virtual machine for compiled inscope bytecode.
//!
//! # Architecture
//!
//! - [`Runtime`]: owns the builtins and loads modules from source
//! - [`Frame`]: one activation record (fast locals, cells, value stack)
//! - `interp`: the dispatch loop and the calling convention
//! - [`Generator`]: a suspended frame resumed by iteration
//! - [`trace`]: a per-thread slot for observing frame transitions
//!
//! Guest exceptions surface as [`VmError`] values carrying an
//! [`ExceptionKind`] and a message.

mod builtins;
pub mod errors;
mod frame;
mod generator;
mod interp;
mod namespace;
mod print_handler;
mod runtime;
pub mod trace;
pub mod value;

pub use errors::{ExceptionKind, VmError, VmResult};
pub use frame::Frame;
pub use generator::{Generator, Resume};
pub use interp::{call_function, call_value, run_module, IterState};
pub use namespace::{Builtins, Globals, Namespace};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, PrintHandlerImpl, SharedPrintHandler,
};
pub use runtime::{LoadError, Module, Runtime, RuntimeBuilder, DEFAULT_RECURSION_LIMIT};
pub use value::{ClosureCell, FunctionObject, NameMap, Value};

#[cfg(test)]
mod tests;
