//! Inscope Lexer - turns guest-language source into tokens.
//!
//! Newlines are significant statement terminators, except inside `()` and
//! `[]` where they are dropped. Braces delimit both blocks and dict
//! literals, so newlines inside braces are kept and left to the parser.

mod cursor;
mod token;

use cursor::Cursor;
use inscope_ir::{Name, Span};

pub use token::{Token, TokenKind};

/// What went wrong while lexing.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unknown escape sequence `\\{0}`")]
    UnknownEscape(char),
    #[error("unexpected character `{0}`")]
    InvalidChar(char),
    #[error("malformed number `{0}`")]
    MalformedNumber(String),
    #[error("unbalanced `{0}`")]
    Unbalanced(char),
}

/// Lexer failure with its location.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Tokenize `source`. The result always ends with `Newline`, `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'src> {
    cursor: Cursor<'src>,
    tokens: Vec<Token>,
    /// Open `(` / `[` nesting; newlines are insignificant while positive.
    depth: usize,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Lexer {
            cursor: Cursor::new(source),
            tokens: Vec::new(),
            depth: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while !self.cursor.is_eof() {
            self.next_token()?;
        }
        let end = self.cursor.pos();
        self.push_newline(end);
        self.tokens
            .push(Token::new(TokenKind::Eof, Span::from_range(end, end)));
        Ok(self.tokens)
    }

    fn error(kind: LexErrorKind, start: usize, end: usize) -> LexError {
        LexError {
            kind,
            span: Span::from_range(start, end),
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = Span::from_range(start, self.cursor.pos());
        self.tokens.push(Token::new(kind, span));
    }

    fn push_newline(&mut self, at: usize) {
        let redundant = matches!(
            self.tokens.last(),
            None | Some(Token {
                kind: TokenKind::Newline,
                ..
            })
        );
        if !redundant {
            self.tokens
                .push(Token::new(TokenKind::Newline, Span::from_range(at, at + 1)));
        }
    }

    fn next_token(&mut self) -> Result<(), LexError> {
        let start = self.cursor.pos();
        let Some(c) = self.cursor.bump() else {
            return Ok(());
        };
        match c {
            ' ' | '\t' | '\r' => {}
            '\\' if self.cursor.eat('\n') => {}
            '\n' => {
                if self.depth == 0 {
                    self.push_newline(start);
                }
            }
            '#' => self.cursor.eat_while(|c| c != '\n'),
            '"' | '\'' => self.string(c, start)?,
            '0'..='9' => self.number(start)?,
            c if c == '_' || c.is_alphabetic() => {
                self.cursor.eat_while(|c| c == '_' || c.is_alphanumeric());
                let word = self.cursor.slice(start);
                let kind =
                    TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Ident(Name::intern(word)));
                self.push(kind, start);
            }
            '(' | '[' => {
                self.depth += 1;
                let kind = if c == '(' {
                    TokenKind::LParen
                } else {
                    TokenKind::LBracket
                };
                self.push(kind, start);
            }
            ')' | ']' => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or_else(|| Self::error(LexErrorKind::Unbalanced(c), start, start + 1))?;
                let kind = if c == ')' {
                    TokenKind::RParen
                } else {
                    TokenKind::RBracket
                };
                self.push(kind, start);
            }
            _ => {
                let kind = self.punct(c, start)?;
                self.push(kind, start);
            }
        }
        Ok(())
    }

    fn punct(&mut self, c: char, start: usize) -> Result<TokenKind, LexError> {
        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => {
                if self.cursor.current() == Some('.') && self.cursor.peek() == Some('.') {
                    self.cursor.bump();
                    self.cursor.bump();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '+' if self.cursor.eat('=') => TokenKind::PlusAssign,
            '+' => TokenKind::Plus,
            '-' if self.cursor.eat('=') => TokenKind::MinusAssign,
            '-' => TokenKind::Minus,
            '*' if self.cursor.eat('*') => TokenKind::DoubleStar,
            '*' if self.cursor.eat('=') => TokenKind::StarAssign,
            '*' => TokenKind::Star,
            '/' if self.cursor.eat('/') => {
                if self.cursor.eat('=') {
                    TokenKind::DoubleSlashAssign
                } else {
                    TokenKind::DoubleSlash
                }
            }
            '/' if self.cursor.eat('=') => TokenKind::SlashAssign,
            '/' => TokenKind::Slash,
            '%' if self.cursor.eat('=') => TokenKind::PercentAssign,
            '%' => TokenKind::Percent,
            '=' if self.cursor.eat('=') => TokenKind::EqEq,
            '=' => TokenKind::Assign,
            '!' if self.cursor.eat('=') => TokenKind::NotEq,
            '<' if self.cursor.eat('=') => TokenKind::LtE,
            '<' => TokenKind::Lt,
            '>' if self.cursor.eat('=') => TokenKind::GtE,
            '>' => TokenKind::Gt,
            other => {
                return Err(Self::error(
                    LexErrorKind::InvalidChar(other),
                    start,
                    self.cursor.pos(),
                ))
            }
        };
        Ok(kind)
    }

    fn string(&mut self, quote: char, start: usize) -> Result<(), LexError> {
        let mut text = String::new();
        loop {
            let Some(c) = self.cursor.bump() else {
                return Err(Self::error(
                    LexErrorKind::UnterminatedString,
                    start,
                    self.cursor.pos(),
                ));
            };
            match c {
                c if c == quote => break,
                '\n' => {
                    return Err(Self::error(
                        LexErrorKind::UnterminatedString,
                        start,
                        self.cursor.pos(),
                    ))
                }
                '\\' => {
                    let escape_start = self.cursor.pos();
                    let escaped = match self.cursor.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(Self::error(
                                LexErrorKind::UnknownEscape(other),
                                escape_start - 1,
                                self.cursor.pos(),
                            ))
                        }
                        None => {
                            return Err(Self::error(
                                LexErrorKind::UnterminatedString,
                                start,
                                self.cursor.pos(),
                            ))
                        }
                    };
                    text.push(escaped);
                }
                other => text.push(other),
            }
        }
        self.push(TokenKind::Str(text), start);
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<(), LexError> {
        let is_digit = |c: char| c.is_ascii_digit() || c == '_';
        self.cursor.eat_while(is_digit);
        let mut is_float = false;
        if self.cursor.current() == Some('.') && self.cursor.peek().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.bump();
            self.cursor.eat_while(is_digit);
        }
        if matches!(self.cursor.current(), Some('e' | 'E')) {
            is_float = true;
            self.cursor.bump();
            if matches!(self.cursor.current(), Some('+' | '-')) {
                self.cursor.bump();
            }
            self.cursor.eat_while(is_digit);
        }
        if self
            .cursor
            .current()
            .is_some_and(|c| c == '_' || c.is_alphabetic())
        {
            self.cursor.eat_while(|c| c == '_' || c.is_alphanumeric());
        }
        let raw = self.cursor.slice(start);
        let cleaned: String = raw.chars().filter(|&c| c != '_').collect();
        let malformed = || {
            Self::error(
                LexErrorKind::MalformedNumber(raw.to_owned()),
                start,
                start + raw.len(),
            )
        };
        let kind = if is_float {
            TokenKind::Float(cleaned.parse().map_err(|_| malformed())?)
        } else {
            TokenKind::Int(cleaned.parse().map_err(|_| malformed())?)
        };
        self.push(kind, start);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
