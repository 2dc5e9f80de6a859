//! Grammar entry points.

mod expr;
mod stmt;

use inscope_ir::ast::{Module, Stmt};
use inscope_lexer::{Token, TokenKind};

use crate::cursor::Cursor;
use crate::ParseError;

pub(crate) struct Parser {
    cursor: Cursor,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Parser {
            cursor: Cursor::new(tokens),
        }
    }

    pub(crate) fn parse_module(mut self) -> Result<Module, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.cursor.at_eof() {
                break;
            }
            if self.cursor.check(&TokenKind::RBrace) {
                return Err(ParseError::new("unmatched `}`", self.cursor.span()));
            }
            body.push(self.parse_stmt()?);
        }
        Ok(Module { body })
    }

    /// `{ stmt* }`
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.cursor.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.cursor.eat(&TokenKind::RBrace) {
                break;
            }
            if self.cursor.at_eof() {
                return Err(ParseError::new(
                    "expected `}` before end of input",
                    self.cursor.span(),
                ));
            }
            body.push(self.parse_stmt()?);
        }
        Ok(body)
    }

    fn skip_separators(&mut self) {
        while self.cursor.eat(&TokenKind::Newline) || self.cursor.eat(&TokenKind::Semicolon) {}
    }

    /// A simple statement must be followed by a newline, `;`, `}` or end of input.
    fn end_simple_stmt(&mut self) -> Result<(), ParseError> {
        match self.cursor.kind() {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.cursor.advance();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            other => Err(ParseError::new(
                format!("expected end of statement, found {}", other.describe()),
                self.cursor.span(),
            )),
        }
    }
}
