//! Statement trees.
//!
//! A parsed script is a single [`Stmt`] (usually a `Block`).  Trees are
//! immutable once parsed and are shared by `Rc` between the parse cache and
//! every execution.

use std::rc::Rc;

use super::expr::{BinOp, Expr};
use super::function::FunctionDef;
use super::reference::Reference;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    /// `ref = expr` and `name := expr`.
    Assign(Reference, Expr),
    /// `ref += expr`, `ref -= expr`, `ref++`, `ref--`.
    Compound(Reference, BinOp, Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    /// `repeat body until cond` runs the body at least once.
    Repeat(Box<Stmt>, Expr),
    For {
        init: Box<Stmt>,
        cond: Expr,
        step: Box<Stmt>,
        body: Box<Stmt>,
    },
    /// `func name(params) body`
    FuncDecl(String, Rc<FunctionDef>),
    Return(Expr),
    Print(Vec<Expr>),
    Printf(Vec<Expr>),
    Panic(Expr),
    /// Literal template text.
    Text(String),
    Expr(Expr),
}

impl Stmt {
    /// Number of statements in the tree, counting nested ones.
    pub fn size(&self) -> usize {
        1 + match self {
            Stmt::Block(body) => body.iter().map(Stmt::size).sum(),
            Stmt::If(_, then, els) => then.size() + els.as_ref().map_or(0, |s| s.size()),
            Stmt::While(_, body) | Stmt::Repeat(body, _) => body.size(),
            Stmt::For {
                init, step, body, ..
            } => init.size() + step.size() + body.size(),
            Stmt::FuncDecl(_, def) => def.body.size(),
            _ => 0,
        }
    }
}
