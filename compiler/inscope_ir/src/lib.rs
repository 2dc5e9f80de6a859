//! Inscope IR - shared vocabulary for the guest-language pipeline.
//!
//! - [`Name`]: interned identifiers backed by a process-global interner
//! - [`Span`]: byte ranges into source text
//! - [`ast`]: the syntax tree produced by `inscope_parse`
//! - [`ensure_sufficient_stack`]: stack growth for recursive passes

pub mod ast;
mod name;
mod span;
mod stack;

pub use name::{InternError, Name, StringInterner};
pub use span::Span;
pub use stack::ensure_sufficient_stack;
