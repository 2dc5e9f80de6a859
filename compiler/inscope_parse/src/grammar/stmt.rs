//! Statement grammar.

use inscope_ir::ast::{
    BinaryOp, ClassDef, Expr, ExprKind, FunctionDef, Param, Params, Stmt, StmtKind,
};
use inscope_ir::{ensure_sufficient_stack, Name, Span};
use inscope_lexer::TokenKind;

use super::Parser;
use crate::ParseError;

impl Parser {
    pub(super) fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        ensure_sufficient_stack(|| self.parse_stmt_inner())
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cursor.span();
        match self.cursor.kind() {
            TokenKind::Def => self.parse_def(false, start),
            TokenKind::Async => {
                self.cursor.advance();
                if !self.cursor.check(&TokenKind::Def) {
                    return Err(ParseError::new(
                        "expected `def` after `async`",
                        self.cursor.span(),
                    ));
                }
                self.parse_def(true, start)
            }
            TokenKind::Class => self.parse_class(start),
            TokenKind::If => {
                self.cursor.advance();
                self.parse_if_rest(start)
            }
            TokenKind::While => {
                self.cursor.advance();
                let test = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::new(
                    StmtKind::While { test, body },
                    start.merge(self.cursor.prev_span()),
                ))
            }
            TokenKind::For => self.parse_for(start),
            _ => {
                let stmt = self.parse_simple_stmt(start)?;
                self.end_simple_stmt()?;
                Ok(stmt)
            }
        }
    }

    fn parse_simple_stmt(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let kind = match self.cursor.kind() {
            TokenKind::Return => {
                self.cursor.advance();
                if self.at_stmt_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr_list()?))
                }
            }
            TokenKind::Pass => {
                self.cursor.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.cursor.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.cursor.advance();
                StmtKind::Continue
            }
            TokenKind::Global => {
                self.cursor.advance();
                StmtKind::Global(self.parse_name_list()?)
            }
            TokenKind::Nonlocal => {
                self.cursor.advance();
                StmtKind::Nonlocal(self.parse_name_list()?)
            }
            TokenKind::Raise => {
                self.cursor.advance();
                StmtKind::Raise(self.parse_expr()?)
            }
            TokenKind::Assert => {
                self.cursor.advance();
                let test = self.parse_expr()?;
                let msg = if self.cursor.eat(&TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            _ => return self.parse_expr_stmt(start),
        };
        Ok(Stmt::new(kind, start.merge(self.cursor.prev_span())))
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.cursor.kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn parse_name_list(&mut self) -> Result<Vec<Name>, ParseError> {
        let mut names = vec![self.parse_ident()?];
        while self.cursor.eat(&TokenKind::Comma) {
            names.push(self.parse_ident()?);
        }
        Ok(names)
    }

    pub(super) fn parse_ident(&mut self) -> Result<Name, ParseError> {
        match *self.cursor.kind() {
            TokenKind::Ident(name) => {
                self.cursor.advance();
                Ok(name)
            }
            ref other => Err(ParseError::new(
                format!("expected identifier, found {}", other.describe()),
                self.cursor.span(),
            )),
        }
    }

    /// Expression statement, assignment chain, or augmented assignment.
    fn parse_expr_stmt(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let first = self.parse_expr_list_or_yield()?;

        if let Some(op) = augmented_op(self.cursor.kind()) {
            self.cursor.advance();
            check_target(&first, false)?;
            let value = self.parse_expr_list_or_yield()?;
            return Ok(Stmt::new(
                StmtKind::AugAssign {
                    target: first,
                    op,
                    value,
                },
                start.merge(self.cursor.prev_span()),
            ));
        }

        if !self.cursor.check(&TokenKind::Assign) {
            return Ok(Stmt::new(
                StmtKind::Expr(first),
                start.merge(self.cursor.prev_span()),
            ));
        }

        let mut targets = vec![first];
        let mut value = None;
        while self.cursor.eat(&TokenKind::Assign) {
            let next = self.parse_expr_list_or_yield()?;
            if let Some(previous) = value.replace(next) {
                targets.push(previous);
            }
        }
        for target in &targets {
            check_target(target, true)?;
        }
        let value = value.ok_or_else(|| ParseError::new("expected value", self.cursor.span()))?;
        Ok(Stmt::new(
            StmtKind::Assign { targets, value },
            start.merge(self.cursor.prev_span()),
        ))
    }

    fn parse_def(&mut self, is_async: bool, start: Span) -> Result<Stmt, ParseError> {
        self.cursor.expect(&TokenKind::Def)?;
        let name = self.parse_ident()?;
        self.cursor.expect(&TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.cursor.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = start.merge(self.cursor.prev_span());
        Ok(Stmt::new(
            StmtKind::FunctionDef(Box::new(FunctionDef {
                name,
                params,
                body,
                is_async,
                span,
            })),
            span,
        ))
    }

    fn parse_params(&mut self) -> Result<Params, ParseError> {
        let mut params = Params::default();
        let mut keyword_only = false;
        let mut seen_default = false;
        while !self.cursor.check(&TokenKind::RParen) {
            let start = self.cursor.span();
            if self.cursor.eat(&TokenKind::DoubleStar) {
                params.kwarg = Some(self.parse_ident()?);
                self.cursor.eat(&TokenKind::Comma);
                if !self.cursor.check(&TokenKind::RParen) {
                    return Err(ParseError::new(
                        "`**` parameter must be last",
                        self.cursor.span(),
                    ));
                }
                break;
            }
            if self.cursor.eat(&TokenKind::Star) {
                if keyword_only {
                    return Err(ParseError::new("duplicate `*` in parameters", start));
                }
                keyword_only = true;
                if let TokenKind::Ident(name) = *self.cursor.kind() {
                    self.cursor.advance();
                    params.vararg = Some(name);
                }
            } else {
                let name = self.parse_ident()?;
                let default = if self.cursor.eat(&TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                let param = Param {
                    name,
                    span: start.merge(self.cursor.prev_span()),
                    default,
                };
                if keyword_only {
                    params.kwonly.push(param);
                } else {
                    if param.default.is_some() {
                        seen_default = true;
                    } else if seen_default {
                        return Err(ParseError::new(
                            "parameter without a default follows parameter with a default",
                            param.span,
                        ));
                    }
                    params.positional.push(param);
                }
            }
            if !self.cursor.eat(&TokenKind::Comma) {
                break;
            }
        }
        let mut seen = Vec::new();
        for name in params.names() {
            if seen.contains(&name) {
                return Err(ParseError::new(
                    format!("duplicate parameter `{name}`"),
                    self.cursor.span(),
                ));
            }
            seen.push(name);
        }
        Ok(params)
    }

    fn parse_class(&mut self, start: Span) -> Result<Stmt, ParseError> {
        self.cursor.expect(&TokenKind::Class)?;
        let name = self.parse_ident()?;
        let mut bases = Vec::new();
        if self.cursor.eat(&TokenKind::LParen) {
            while !self.cursor.check(&TokenKind::RParen) {
                bases.push(self.parse_expr()?);
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.cursor.expect(&TokenKind::RParen)?;
        }
        let body = self.parse_block()?;
        let span = start.merge(self.cursor.prev_span());
        Ok(Stmt::new(
            StmtKind::ClassDef(Box::new(ClassDef {
                name,
                bases,
                body,
                span,
            })),
            span,
        ))
    }

    /// After `if` / `elif`: `test block (elif ...)? (else block)?`
    fn parse_if_rest(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        let orelse = match self.cursor.kind_after_newlines() {
            TokenKind::Elif => {
                self.cursor.skip_newlines();
                let elif_start = self.cursor.advance().span;
                vec![self.parse_if_rest(elif_start)?]
            }
            TokenKind::Else => {
                self.cursor.skip_newlines();
                self.cursor.advance();
                self.parse_block()?
            }
            _ => Vec::new(),
        };
        Ok(Stmt::new(
            StmtKind::If { test, body, orelse },
            start.merge(self.cursor.prev_span()),
        ))
    }

    fn parse_for(&mut self, start: Span) -> Result<Stmt, ParseError> {
        self.cursor.expect(&TokenKind::For)?;
        let target = self.parse_target_list()?;
        check_target(&target, true)?;
        self.cursor.expect(&TokenKind::In)?;
        let iter = self.parse_expr_list()?;
        let body = self.parse_block()?;
        Ok(Stmt::new(
            StmtKind::For { target, iter, body },
            start.merge(self.cursor.prev_span()),
        ))
    }

    /// `a`, `a, b`, `x.y, z[0]`. Postfix expressions only, so `in` is not consumed.
    fn parse_target_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_postfix()?;
        if !self.cursor.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.span;
        let mut items = vec![first];
        while self.cursor.eat(&TokenKind::Comma) {
            if self.cursor.check(&TokenKind::In) {
                break;
            }
            items.push(self.parse_postfix()?);
        }
        Ok(Expr::new(
            ExprKind::Tuple(items),
            start.merge(self.cursor.prev_span()),
        ))
    }
}

fn augmented_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::PlusAssign => BinaryOp::Add,
        TokenKind::MinusAssign => BinaryOp::Sub,
        TokenKind::StarAssign => BinaryOp::Mul,
        TokenKind::SlashAssign => BinaryOp::Div,
        TokenKind::DoubleSlashAssign => BinaryOp::FloorDiv,
        TokenKind::PercentAssign => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

/// Reject expressions that cannot be assigned to.
fn check_target(target: &Expr, allow_unpack: bool) -> Result<(), ParseError> {
    match &target.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
        ExprKind::Tuple(items) | ExprKind::List(items) if allow_unpack => items
            .iter()
            .try_for_each(|item| check_target(item, true)),
        _ => Err(ParseError::new("cannot assign to expression", target.span)),
    }
}
