//! Expression trees and their evaluation.
//!
//! Operator precedence (lowest → highest):
//!   `|` `||`  →  `^`  →  `&` `&&`  →  equality  →  relational  →  shift  →
//!   additive  →  multiplicative  →  unary  →  postfix  →  primary

use std::rc::Rc;

use super::context::Context;
use super::error::EvalError;
use super::function::{Function, FunctionDef};
use super::reference::Reference;
use super::value::{List, Map, Value};

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ref(Reference),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    /// Anonymous `func(a, b) body`.
    Func(Rc<FunctionDef>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Ref(Reference::Var(name.into()))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// Short description of a callee for diagnostics.
    fn describe(&self) -> String {
        match self {
            Expr::Ref(r) => r.to_string(),
            Expr::Literal(v) => v.type_name().to_owned(),
            _ => "expression".to_owned(),
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

pub fn eval_expr(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ref(r) => r.get(ctx),
        Expr::Unary(op, e) => {
            let v = eval_expr(e, ctx)?;
            match op {
                UnaryOp::Neg => v.arith_neg(),
                UnaryOp::Not => Ok(Value::Bool(!v.as_bool()?)),
                UnaryOp::BitNot => v.bit_not(),
            }
        }
        Expr::Binary(BinOp::And, lhs, rhs) => {
            if !eval_expr(lhs, ctx)?.as_bool()? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_expr(rhs, ctx)?.as_bool()?))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            if eval_expr(lhs, ctx)?.as_bool()? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_expr(rhs, ctx)?.as_bool()?))
        }
        Expr::Binary(op, lhs, rhs) => {
            let a = eval_expr(lhs, ctx)?;
            let b = eval_expr(rhs, ctx)?;
            apply_binary(*op, &a, &b)
        }
        Expr::Call(callee, args) => {
            let value = eval_expr(callee, ctx)?;
            let Value::Function(func) = value else {
                return Err(EvalError::NotCallable(callee.describe()));
            };
            func.call(ctx, args)
        }
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, ctx)?);
            }
            Ok(Value::List(List::from_vec(values)))
        }
        Expr::Map(entries) => {
            let map = Map::new();
            for (key, e) in entries {
                map.insert(key, eval_expr(e, ctx)?);
            }
            Ok(Value::Map(map))
        }
        Expr::Func(def) => Ok(Value::Function(Rc::new(Function::user(
            "<anonymous>",
            Rc::clone(def),
            ctx,
        )))),
    }
}

pub fn apply_binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering::*;

    let shift = |b: &Value| -> Result<u32, EvalError> { Ok((b.as_int()? & 63) as u32) };
    match op {
        BinOp::Add => a.arith_add(b),
        BinOp::Sub => a.arith_sub(b),
        BinOp::Mul => a.arith_mul(b),
        BinOp::Div => a.arith_div(b),
        BinOp::Rem => a.arith_rem(b),
        BinOp::Eq => Ok(Value::Bool(a.equals(b))),
        BinOp::Ne => Ok(Value::Bool(!a.equals(b))),
        BinOp::Lt => Ok(Value::Bool(a.cmp_value(b)? == Less)),
        BinOp::Le => Ok(Value::Bool(a.cmp_value(b)? != Greater)),
        BinOp::Gt => Ok(Value::Bool(a.cmp_value(b)? == Greater)),
        BinOp::Ge => Ok(Value::Bool(a.cmp_value(b)? != Less)),
        BinOp::And => Ok(Value::Bool(a.as_bool()? && b.as_bool()?)),
        BinOp::Or => Ok(Value::Bool(a.as_bool()? || b.as_bool()?)),
        BinOp::BitAnd => a.bit_op(b, |x, y| x & y, |x, y| x & y),
        BinOp::BitOr => a.bit_op(b, |x, y| x | y, |x, y| x | y),
        BinOp::BitXor => a.bit_op(b, |x, y| x ^ y, |x, y| x ^ y),
        BinOp::Shl => Ok(Value::Int(a.as_int()?.wrapping_shl(shift(b)?))),
        BinOp::Shr => Ok(Value::Int(a.as_int()?.wrapping_shr(shift(b)?))),
        BinOp::Ushr => Ok(Value::Int(((a.as_int()? as u64) >> shift(b)?) as i64)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
