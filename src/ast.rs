use std::rc::Rc;

use derive_more::{From, TryInto};

use crate::token;

/// A literal value as written in source, or synthesized by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lit {
    pub value: LitValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupingExpr {
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: token::Token,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: token::Token,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// Short-circuiting `and` / `or`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpr {
    pub op: token::Token,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarExpr {
    pub ident: token::Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignExpr {
    pub ident: token::Token,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    /// The closing `)`, used to locate errors raised by the call.
    pub paren: token::Token,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, From, TryInto)]
pub enum Expr {
    Lit(Lit),
    Grouping(GroupingExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Logical(LogicalExpr),
    Var(VarExpr),
    Assign(AssignExpr),
    Call(CallExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintStmt {
    pub keyword: token::Token,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ident: token::Token,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
}

/// A named function declaration. Shared with every function value created
/// from it, so it outlives the statement list it was parsed into.
#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl {
    pub ident: token::Token,
    pub parameters: Vec<token::Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub keyword: token::Token,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, From, TryInto)]
pub enum Stmt {
    Expr(ExprStmt),
    Print(PrintStmt),
    VarDecl(VarDecl),
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    Fun(Rc<FunDecl>),
    Return(ReturnStmt),
}
