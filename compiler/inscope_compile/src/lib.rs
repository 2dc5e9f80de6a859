//! Inscope Compile - from syntax tree to stack bytecode.
//!
//! Compilation runs in two passes:
//! 1. [`scope::analyze`] builds the scope tree and classifies names
//! 2. the compiler walks the tree again, emitting one [`CodeObject`] per
//!    module, function and class body
//!
//! The instruction stream keeps enough structure for later inspection:
//! nested bodies are reachable through the constant pool, class bodies are
//! announced by `LoadBuildClass`, and every function ends in `ReturnValue`.

pub mod bytecode;
mod builder;
mod compiler;
pub mod scope;

use inscope_ir::Span;

pub use bytecode::{make_function, CodeFlags, CodeObject, Constant, Instr, Marker};
pub use compiler::compile_module;

/// A semantic error found while compiling.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {span}")]
pub struct CompileError {
    pub message: String,
    pub span: Span,
}

impl CompileError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        CompileError {
            message: message.into(),
            span,
        }
    }
}
