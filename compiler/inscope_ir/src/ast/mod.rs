//! Syntax tree for the guest language.
//!
//! The tree is plain owned data: the parser builds it once, the compiler
//! walks it once. Nodes carry a [`Span`] for diagnostics.

mod operators;

pub use operators::{BinaryOp, BoolOp, CompareOp, UnaryOp};

use crate::{Name, Span};

/// A parsed source file.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for effect.
    Expr(Expr),
    /// `a = b = value`; each target is a name, attribute, subscript or tuple of targets.
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target op= value`.
    AugAssign {
        target: Expr,
        op: BinaryOp,
        value: Expr,
    },
    FunctionDef(Box<FunctionDef>),
    ClassDef(Box<ClassDef>),
    Return(Option<Expr>),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While { test: Expr, body: Vec<Stmt> },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Pass,
    Global(Vec<Name>),
    Nonlocal(Vec<Name>),
    Raise(Expr),
    Assert { test: Expr, msg: Option<Expr> },
}

/// `def name(params) { body }`, optionally `async`.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: Name,
    pub params: Params,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub span: Span,
}

/// Parameter list: `a, b=1, *args, c, d=2, **kwargs`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Params {
    pub positional: Vec<Param>,
    pub vararg: Option<Name>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Name>,
}

impl Params {
    /// All parameter names in slot order: positional, `*args`, keyword-only, `**kwargs`.
    pub fn names(&self) -> impl Iterator<Item = Name> + '_ {
        self.positional
            .iter()
            .map(|p| p.name)
            .chain(self.vararg)
            .chain(self.kwonly.iter().map(|p| p.name))
            .chain(self.kwarg)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Name,
    pub default: Option<Expr>,
    pub span: Span,
}

/// `class Name(bases) { body }`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    pub name: Name,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(Name),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Attribute {
        value: Box<Expr>,
        attr: Name,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `body if test else orelse`
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Yield(Option<Box<Expr>>),
    Await(Box<Expr>),
}

/// `name=value` in a call.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub name: Name,
    pub value: Expr,
}
