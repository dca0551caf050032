//! Owned syntax tree the interpreter walks

use std::sync::Arc;

/// A parsed script
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Declare {
        kind: DeclKind,
        declarations: Vec<(String, Option<Expr>)>,
    },
    Function(Arc<FunctionDef>),
    Return(Option<Expr>),
    Throw(Expr),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Empty,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub rest: Option<String>,
    pub body: FunctionBody,
    pub arrow: bool,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Arrow function with an expression body
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

/// Element of an array literal or argument list
#[derive(Debug, Clone)]
pub struct Element {
    pub spread: bool,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub enum MemberKey {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    String(Arc<str>),
    Bool(bool),
    Null,
    Undefined,
    This,
    Ident(String),
    Array(Vec<Element>),
    Object(Vec<(String, Expr)>),
    Function(Arc<FunctionDef>),
    Member {
        object: Box<Expr>,
        key: MemberKey,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Element>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Element>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

impl Expr {
    /// Source-like rendering of a callee, used in "is not a function" messages
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::This => "this".to_string(),
            Expr::Member {
                object,
                key: MemberKey::Named(name),
            } => format!("{}.{}", object.describe(), name),
            Expr::Member { object, .. } => format!("{}[...]", object.describe()),
            Expr::Call { callee, .. } => format!("{}(...)", callee.describe()),
            _ => "expression".to_string(),
        }
    }
}
