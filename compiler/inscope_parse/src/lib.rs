//! Inscope Parse - recursive-descent parser for the guest language.
//!
//! Statements are parsed by hand in `grammar::stmt`; expressions use
//! precedence climbing in `grammar::expr`. Both recurse through
//! [`ensure_sufficient_stack`](inscope_ir::ensure_sufficient_stack) so deep
//! nesting cannot overflow the native stack.

mod cursor;
mod grammar;

use inscope_ir::ast::Module;
use inscope_ir::Span;
use inscope_lexer::LexError;

/// A syntax error with its location.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.kind.to_string(), err.span)
    }
}

/// Parse a whole source file.
#[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let tokens = inscope_lexer::lex(source)?;
    grammar::Parser::new(tokens).parse_module()
}

#[cfg(test)]
mod tests;
