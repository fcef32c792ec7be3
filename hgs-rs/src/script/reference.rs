//! Assignable locations.
//!
//! Every left-hand side of the language (`a`, `a[i]`, `a.b`, `a.b[2].c`) is a
//! [`Reference`], so assignment is one code path whatever the access path.

use std::fmt;

use super::context::Context;
use super::error::EvalError;
use super::expr::{eval_expr, Expr};
use super::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Plain name, resolved through the scope chain.
    Var(String),
    /// `parent[index]` on an array-capable value.
    Index(Box<Reference>, Box<Expr>),
    /// `parent.key` on a field-capable value.
    Field(Box<Reference>, String),
}

impl Reference {
    pub fn var(name: impl Into<String>) -> Self {
        Reference::Var(name.into())
    }

    pub fn index(self, index: Expr) -> Self {
        Reference::Index(Box::new(self), Box::new(index))
    }

    pub fn field(self, key: impl Into<String>) -> Self {
        Reference::Field(Box::new(self), key.into())
    }

    pub fn get(&self, ctx: &Context) -> Result<Value, EvalError> {
        match self {
            Reference::Var(name) => ctx.get_var(name),
            Reference::Index(parent, index) => {
                let target = parent.get(ctx)?;
                let list = target.as_array()?;
                let i = eval_index(index, ctx)?;
                usize::try_from(i)
                    .ok()
                    .and_then(|idx| list.get(idx))
                    .ok_or(EvalError::IndexOutOfBounds(i))
            }
            Reference::Field(parent, key) => parent.get(ctx)?.get_field(key),
        }
    }

    pub fn set(&self, ctx: &Context, value: Value) -> Result<(), EvalError> {
        match self {
            Reference::Var(name) => {
                ctx.set_var(name, value);
                Ok(())
            }
            Reference::Index(parent, index) => {
                let target = parent.get(ctx)?;
                let list = target.as_array()?;
                let i = eval_index(index, ctx)?;
                let idx = usize::try_from(i).map_err(|_| EvalError::IndexOutOfBounds(i))?;
                list.set(idx, value)
            }
            Reference::Field(parent, key) => parent.get(ctx)?.set_field(key, value),
        }
    }
}

fn eval_index(index: &Expr, ctx: &Context) -> Result<i64, EvalError> {
    eval_expr(index, ctx)?.as_int()
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Var(name) => write!(f, "{name}"),
            Reference::Index(parent, _) => write!(f, "{parent}[]"),
            Reference::Field(parent, key) => write!(f, "{parent}.{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::value::{List, Map};

    fn at(i: i64) -> Reference {
        Reference::var("a").index(Expr::Literal(Value::Int(i)))
    }

    fn with_list() -> Context {
        let ctx = Context::new();
        ctx.set_var(
            "a",
            List::from_vec(vec![Value::Int(10), Value::Int(20), Value::Int(30)]),
        );
        ctx
    }

    #[test]
    fn index_get_in_bounds() {
        let ctx = with_list();
        assert_eq!(at(0).get(&ctx), Ok(Value::Int(10)));
        assert_eq!(at(2).get(&ctx), Ok(Value::Int(30)));
    }

    #[test]
    fn index_get_out_of_bounds() {
        let ctx = with_list();
        assert_eq!(at(-1).get(&ctx), Err(EvalError::IndexOutOfBounds(-1)));
        assert_eq!(at(3).get(&ctx), Err(EvalError::IndexOutOfBounds(3)));
    }

    #[test]
    fn negative_set_leaves_list_untouched() {
        let ctx = with_list();
        assert_eq!(
            at(-1).set(&ctx, Value::Int(0)),
            Err(EvalError::IndexOutOfBounds(-1))
        );
        let list = ctx.get_var("a").unwrap();
        assert_eq!(list.as_array().unwrap().size(), 3);
        assert_eq!(at(0).get(&ctx), Ok(Value::Int(10)));
    }

    #[test]
    fn set_at_size_grows_through_container() {
        let ctx = with_list();
        at(3).set(&ctx, Value::Int(40)).unwrap();
        assert_eq!(at(3).get(&ctx), Ok(Value::Int(40)));
        assert_eq!(
            at(9).set(&ctx, Value::Int(0)),
            Err(EvalError::IndexOutOfBounds(9))
        );
    }

    #[test]
    fn index_on_non_list_is_type_mismatch() {
        let ctx = Context::new();
        ctx.set_var("a", 5i64);
        assert!(matches!(
            at(0).get(&ctx),
            Err(EvalError::TypeMismatch { expected: "list", .. })
        ));
    }

    #[test]
    fn nested_field_and_index() {
        let ctx = Context::new();
        let m = Map::new();
        m.insert("pins", Value::List(List::from_vec(vec![Value::from("A")])));
        ctx.set_var("m", m);
        let r = Reference::var("m")
            .field("pins")
            .index(Expr::Literal(Value::Int(0)));
        assert_eq!(r.get(&ctx), Ok(Value::from("A")));
        r.set(&ctx, Value::from("B")).unwrap();
        assert_eq!(r.get(&ctx), Ok(Value::from("B")));
        assert_eq!(r.to_string(), "m.pins[]");
    }

    #[test]
    fn var_set_binds_locally() {
        let root = Context::new();
        root.set_var("x", 1i64);
        let child = Context::with_parent(&root);
        Reference::var("x").set(&child, Value::Int(2)).unwrap();
        assert_eq!(root.get_var("x"), Ok(Value::Int(1)));
        assert_eq!(child.get_var("x"), Ok(Value::Int(2)));
    }
}
