//! Callable values.
//!
//! A [`Function`] is immutable once built: a name, an arity and an
//! implementation.  Host functions receive the calling [`Context`] as their
//! callback into the interpreter; user functions written in the script
//! language capture the scope they were defined in and keep it alive.

use std::fmt;
use std::rc::Rc;

use super::context::Context;
use super::error::EvalError;
use super::expr::{eval_expr, Expr};
use super::interp::{exec_stmt, Flow};
use super::stmt::Stmt;
use super::value::Value;

/// Number of arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

/// Host function working on evaluated arguments.
pub type NativeFn = fn(&Context, &[Value]) -> Result<Value, EvalError>;

/// Host function that decides itself whether and how to evaluate its
/// argument expressions.
pub type LazyFn = fn(&Context, &[Expr]) -> Result<Value, EvalError>;

/// Parameter list and body of a script-defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub params: Vec<String>,
    pub body: Stmt,
}

enum FunctionKind {
    Native(NativeFn),
    Lazy(LazyFn),
    User {
        def: Rc<FunctionDef>,
        closure: Context,
    },
}

/// A named, arity-checked callable.
pub struct Function {
    name: String,
    arity: Arity,
    kind: FunctionKind,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Function {
    pub fn native(name: impl Into<String>, arity: Arity, f: NativeFn) -> Self {
        Function {
            name: name.into(),
            arity,
            kind: FunctionKind::Native(f),
        }
    }

    pub fn lazy(name: impl Into<String>, arity: Arity, f: LazyFn) -> Self {
        Function {
            name: name.into(),
            arity,
            kind: FunctionKind::Lazy(f),
        }
    }

    /// A script function closing over `closure`.
    pub fn user(name: impl Into<String>, def: Rc<FunctionDef>, closure: &Context) -> Self {
        Function {
            name: name.into(),
            arity: Arity::Exact(def.params.len()),
            kind: FunctionKind::User {
                def,
                closure: closure.clone(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    fn check_arity(&self, found: usize) -> Result<(), EvalError> {
        if self.arity.accepts(found) {
            Ok(())
        } else {
            Err(EvalError::ArityMismatch {
                name: self.name.clone(),
                expected: self.arity.to_string(),
                found,
            })
        }
    }

    /// Call with unevaluated argument expressions from a call site.
    pub fn call(&self, ctx: &Context, args: &[Expr]) -> Result<Value, EvalError> {
        self.check_arity(args.len())?;
        if let FunctionKind::Lazy(f) = &self.kind {
            return f(ctx, args);
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(eval_expr(arg, ctx)?);
        }
        self.invoke(ctx, values)
    }

    /// Call with already evaluated arguments.
    pub fn call_values(&self, ctx: &Context, args: Vec<Value>) -> Result<Value, EvalError> {
        self.check_arity(args.len())?;
        self.invoke(ctx, args)
    }

    fn invoke(&self, ctx: &Context, args: Vec<Value>) -> Result<Value, EvalError> {
        match &self.kind {
            FunctionKind::Native(f) => f(ctx, &args),
            FunctionKind::Lazy(f) => {
                let exprs: Vec<Expr> = args.into_iter().map(Expr::Literal).collect();
                f(ctx, &exprs)
            }
            FunctionKind::User { def, closure } => {
                let frame = Context::frame(closure, ctx);
                for (param, value) in def.params.iter().zip(args) {
                    frame.set_var(param, value);
                }
                match exec_stmt(&def.body, &frame)? {
                    Some(Flow::Return(v)) => Ok(v),
                    None => Ok(Value::default()),
                }
            }
        }
    }
}
