//! Expression grammar.
//!
//! Precedence, loosest first: conditional, `or`, `and`, `not`, comparison,
//! `+ -`, `* / // %`, unary `- +`, `**`, `await`, postfix (call, attribute,
//! subscript), atoms.

use inscope_ir::ast::{BinaryOp, BoolOp, CompareOp, Expr, ExprKind, Keyword, UnaryOp};
use inscope_ir::{ensure_sufficient_stack, Span};
use inscope_lexer::TokenKind;
use tracing::trace;

use super::Parser;
use crate::ParseError;

impl Parser {
    /// A single expression (no bare tuples, no `yield`).
    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        ensure_sufficient_stack(|| self.parse_conditional())
    }

    /// `a` or `a, b, ...` (bare tuple).
    pub(super) fn parse_expr_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_expr()?;
        if !self.cursor.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.span;
        let mut items = vec![first];
        while self.cursor.eat(&TokenKind::Comma) {
            if !self.starts_expr() {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expr::new(
            ExprKind::Tuple(items),
            start.merge(self.cursor.prev_span()),
        ))
    }

    /// Expression list, or a `yield` expression.
    pub(super) fn parse_expr_list_or_yield(&mut self) -> Result<Expr, ParseError> {
        if self.cursor.check(&TokenKind::Yield) {
            self.parse_yield()
        } else {
            self.parse_expr_list()
        }
    }

    fn parse_yield(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.expect(&TokenKind::Yield)?;
        let value = if self.starts_expr() {
            Some(Box::new(self.parse_expr_list()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Yield(value),
            start.merge(self.cursor.prev_span()),
        ))
    }

    fn starts_expr(&self) -> bool {
        matches!(
            self.cursor.kind(),
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::Ellipsis
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
                | TokenKind::Await
        )
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let body = self.parse_or()?;
        if !self.cursor.check(&TokenKind::If) {
            return Ok(body);
        }
        self.cursor.advance();
        let test = self.parse_or()?;
        self.cursor.expect(&TokenKind::Else)?;
        let orelse = self.parse_expr()?;
        let span = body.span.merge(orelse.span);
        Ok(Expr::new(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.cursor.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = bool_op(BoolOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.cursor.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = bool_op(BoolOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.cursor.check(&TokenKind::Not) {
            let start = self.cursor.advance().span;
            let operand = ensure_sufficient_stack(|| self.parse_not())?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.cursor.kind() {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::LtE => CompareOp::LtE,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::GtE => CompareOp::GtE,
            TokenKind::In => CompareOp::In,
            TokenKind::Not if *self.cursor.peek_kind() == TokenKind::In => {
                self.cursor.advance();
                CompareOp::NotIn
            }
            TokenKind::Is if *self.cursor.peek_kind() == TokenKind::Not => {
                self.cursor.advance();
                CompareOp::IsNot
            }
            TokenKind::Is => CompareOp::Is,
            _ => return Ok(left),
        };
        self.cursor.advance();
        let right = self.parse_additive()?;
        let span = left.span.merge(right.span);
        Ok(Expr::new(
            ExprKind::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cursor.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.cursor.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cursor.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.cursor.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cursor.kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.cursor.advance().span;
        let operand = ensure_sufficient_stack(|| self.parse_unary())?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_await()?;
        if !self.cursor.eat(&TokenKind::DoubleStar) {
            return Ok(base);
        }
        // Right-associative, and binds tighter than a unary minus on its left.
        let exponent = ensure_sufficient_stack(|| self.parse_unary())?;
        Ok(binary(BinaryOp::Pow, base, exponent))
    }

    fn parse_await(&mut self) -> Result<Expr, ParseError> {
        if !self.cursor.check(&TokenKind::Await) {
            return self.parse_postfix();
        }
        let start = self.cursor.advance().span;
        let value = ensure_sufficient_stack(|| self.parse_await())?;
        let span = start.merge(value.span);
        Ok(Expr::new(ExprKind::Await(Box::new(value)), span))
    }

    /// Atom followed by any number of calls, attribute accesses and subscripts.
    pub(super) fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.cursor.kind() {
                TokenKind::LParen => {
                    self.cursor.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    let end = self.cursor.expect(&TokenKind::RParen)?;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            keywords,
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.cursor.advance();
                    let attr = self.parse_ident()?;
                    let span = expr.span.merge(self.cursor.prev_span());
                    expr = Expr::new(
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.cursor.advance();
                    let index = self.parse_expr_list()?;
                    let end = self.cursor.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while !self.cursor.check(&TokenKind::RParen) {
            if let (TokenKind::Ident(name), TokenKind::Assign) =
                (self.cursor.kind(), self.cursor.peek_kind())
            {
                let name = *name;
                let start = self.cursor.advance().span;
                self.cursor.advance();
                if keywords.iter().any(|k| k.name == name) {
                    return Err(ParseError::new(
                        format!("keyword argument repeated: `{name}`"),
                        start,
                    ));
                }
                let value = self.parse_expr()?;
                keywords.push(Keyword { name, value });
            } else {
                let arg = self.parse_expr()?;
                if !keywords.is_empty() {
                    return Err(ParseError::new(
                        "positional argument follows keyword argument",
                        arg.span,
                    ));
                }
                args.push(arg);
            }
            if !self.cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let token = self.cursor.advance();
        trace!(kind = ?token.kind, "atom");
        let start = token.span;
        let kind = match token.kind {
            TokenKind::Ident(name) => ExprKind::Name(name),
            TokenKind::Int(v) => ExprKind::Int(v),
            TokenKind::Float(v) => ExprKind::Float(v),
            TokenKind::Str(s) => {
                let mut text = s;
                // Adjacent string literals concatenate.
                while let TokenKind::Str(next) = self.cursor.kind() {
                    text.push_str(next);
                    self.cursor.advance();
                }
                ExprKind::Str(text)
            }
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::None => ExprKind::None,
            TokenKind::Ellipsis => ExprKind::Ellipsis,
            TokenKind::LParen => return self.parse_paren(start),
            TokenKind::LBracket => {
                let items = self.parse_sequence_items(&TokenKind::RBracket)?;
                ExprKind::List(items)
            }
            TokenKind::LBrace => ExprKind::Dict(self.parse_dict_items()?),
            other => {
                return Err(ParseError::new(
                    format!("expected expression, found {}", other.describe()),
                    start,
                ))
            }
        };
        Ok(Expr::new(kind, start.merge(self.cursor.prev_span())))
    }

    /// After `(`: unit tuple, parenthesised expression, tuple, or `(yield ...)`.
    fn parse_paren(&mut self, start: Span) -> Result<Expr, ParseError> {
        if self.cursor.eat(&TokenKind::RParen) {
            return Ok(Expr::new(
                ExprKind::Tuple(Vec::new()),
                start.merge(self.cursor.prev_span()),
            ));
        }
        if self.cursor.check(&TokenKind::Yield) {
            let inner = self.parse_yield()?;
            self.cursor.expect(&TokenKind::RParen)?;
            return Ok(inner);
        }
        let first = self.parse_expr()?;
        if self.cursor.eat(&TokenKind::RParen) {
            return Ok(Expr::new(first.kind, start.merge(self.cursor.prev_span())));
        }
        self.cursor.expect(&TokenKind::Comma)?;
        let mut items = vec![first];
        items.extend(self.parse_sequence_items(&TokenKind::RParen)?);
        Ok(Expr::new(
            ExprKind::Tuple(items),
            start.merge(self.cursor.prev_span()),
        ))
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_sequence_items(&mut self, close: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.cursor.check(close) {
            items.push(self.parse_expr()?);
            if !self.cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.cursor.expect(close)?;
        Ok(items)
    }

    /// After `{`: `key: value` pairs up to `}`; newlines are insignificant here.
    fn parse_dict_items(&mut self) -> Result<Vec<(Expr, Expr)>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.cursor.skip_newlines();
            if self.cursor.eat(&TokenKind::RBrace) {
                break;
            }
            let key = self.parse_expr()?;
            self.cursor.skip_newlines();
            self.cursor.expect(&TokenKind::Colon)?;
            self.cursor.skip_newlines();
            let value = self.parse_expr()?;
            items.push((key, value));
            self.cursor.skip_newlines();
            if !self.cursor.eat(&TokenKind::Comma) {
                self.cursor.skip_newlines();
                self.cursor.expect(&TokenKind::RBrace)?;
                break;
            }
        }
        Ok(items)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

fn bool_op(op: BoolOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::BoolOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}
