//! Token cursor used by the grammar.

use inscope_ir::Span;
use inscope_lexer::{Token, TokenKind};
use tracing::trace;

use crate::ParseError;

pub(crate) struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    /// `tokens` must end with `Eof`, which `inscope_lexer::lex` guarantees.
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Cursor { tokens, pos: 0 }
    }

    #[inline]
    pub(crate) fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    #[inline]
    pub(crate) fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    #[inline]
    pub(crate) fn span(&self) -> Span {
        self.current().span
    }

    /// Kind of the token after the current one.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + 1).min(last)].kind
    }

    /// Span of the most recently consumed token.
    pub(crate) fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(Span::DUMMY, |t| t.span)
    }

    #[inline]
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.check(&TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        trace!(kind = ?token.kind, "advance");
        token
    }

    /// Consume the current token if it matches.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<Span, ParseError> {
        if self.check(kind) {
            Ok(self.advance().span)
        } else {
            Err(ParseError::new(
                format!("expected `{kind}`, found {}", self.kind().describe()),
                self.span(),
            ))
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// Kind of the first non-newline token at or after the cursor.
    pub(crate) fn kind_after_newlines(&self) -> &TokenKind {
        self.tokens[self.pos..]
            .iter()
            .map(|t| &t.kind)
            .find(|k| **k != TokenKind::Newline)
            .unwrap_or(&TokenKind::Eof)
    }
}
