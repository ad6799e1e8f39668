//! Expression and statement trees built by the parser (§3, §4.1).
//!
//! `Expr` and `Stmt` are tagged sum types rather than a class hierarchy with
//! a visitor — matching spec.md's own data model and avoiding the
//! double-dispatch machinery the `ast_interpreter`/`printer_visitor` split
//! uses in `examples/original_source`. Every expression that resolves an
//! identifier (`Identifier`, `This`, `Super`) carries a [`NodeId`] so the
//! resolver's side table can key on node identity instead of a pointer
//! (§9, "Identifier identity for the resolver side table").

use std::rc::Rc;

use crate::token::Token;
use crate::value::Value;

/// A stable identity for a resolvable AST node, assigned monotonically by
/// the parser. Keys the resolver's depth table (see [`crate::resolver`]).
pub type NodeId = u32;

/// The parameters and body shared by a function declaration and a method.
/// Wrapped in `Rc` so constructing the `Callable` for a function/method is
/// a cheap pointer clone rather than a copy of the body's statements.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Expr {
    Literal(Value),
    Grouping(Box<Expr>),
    Unary(Token, Box<Expr>),
    /// Covers arithmetic/comparison/equality operators *and* `and`/`or`:
    /// spec.md models logical operators as ordinary binary nodes whose
    /// evaluation short-circuits based on the operator token's kind.
    Binary(Box<Expr>, Token, Box<Expr>),
    Identifier(NodeId, Token),
    This(NodeId, Token),
    /// `super.method`: the `super` keyword token, then the method name.
    Super(NodeId, Token, Token),
    Call(Box<Expr>, Token, Vec<Expr>),
    GetField(Box<Expr>, Token),
}

#[derive(Debug)]
pub enum Stmt {
    ExprStmt(Expr),
    VarDecl(Token, Option<Expr>),
    Assign(Expr, Expr),
    SetField(Expr, Token, Expr),
    /// A lexical block. `increment` is `Some` only for the block
    /// synthesized from a desugared `for` loop body, so `continue` can run
    /// it before the block unwinds (§4.1, §4.3).
    Block(Vec<Stmt>, Option<Box<Stmt>>),
    /// `if`/`elif`*/`else`, n-way. `branches[i]` is always a `Block`.
    If(Vec<Expr>, Vec<Stmt>, Option<Box<Stmt>>),
    /// `body` is always a `Block` (carrying the desugared increment, if any).
    While(Expr, Box<Stmt>),
    Break(Token),
    Continue(Token),
    Return(Token, Option<Expr>),
    FunctionDecl(Rc<FunctionDef>),
    ClassDecl(Token, Option<Expr>, Vec<Rc<FunctionDef>>),
}
