//! Runtime value type for the generator script language.
//!
//! Values form a small closed set.  Instead of probing open-ended
//! capabilities, callers coerce explicitly with [`Value::as_int`],
//! [`Value::as_array`], [`Value::as_callable`] or the field accessors, and
//! get [`EvalError::TypeMismatch`] when the value has the wrong shape.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::context::Context;
use super::error::EvalError;
use super::function::Function;
use crate::circuit::AttributeHandle;

/// A script runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(List),
    Map(Map),
    Function(Rc<Function>),
    /// A whole scope used as a record, e.g. the generic arguments bound as `args`.
    Context(Context),
    /// Mutable view of an element's attributes, bound as `this`.
    Attributes(AttributeHandle),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(_) | Value::Map(_) => self.fmt_nested(f, &mut Vec::new()),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Context(_) => write!(f, "<context>"),
            Value::Attributes(_) => write!(f, "<attributes>"),
        }
    }
}

/// Identity of a shared container, for cycle detection.
type Addr = *const ();

impl Value {
    /// Format containers, printing `[...]` / `{...}` for one that is already
    /// open further up.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<Addr>) -> fmt::Result {
        match self {
            Value::List(list) => {
                let addr = list.addr();
                if open.contains(&addr) {
                    return write!(f, "[...]");
                }
                open.push(addr);
                write!(f, "[")?;
                for (i, v) in list.0.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    v.fmt_nested(f, open)?;
                }
                open.pop();
                write!(f, "]")
            }
            Value::Map(map) => {
                let addr = map.addr();
                if open.contains(&addr) {
                    return write!(f, "{{...}}");
                }
                open.push(addr);
                write!(f, "{{")?;
                for (i, (k, v)) in map.0.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: ")?;
                    v.fmt_nested(f, open)?;
                }
                open.pop();
                write!(f, "}}")
            }
            other => fmt::Display::fmt(other, f),
        }
    }

    /// Structural equality.  A pair of containers already being compared
    /// further up counts as equal.
    fn eq_nested(&self, other: &Value, open: &mut Vec<(Addr, Addr)>) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                let pair = (a.addr(), b.addr());
                if a.ptr_eq(b) || open.contains(&pair) {
                    return true;
                }
                open.push(pair);
                let (xs, ys) = (a.0.borrow(), b.0.borrow());
                let eq = xs.len() == ys.len()
                    && xs.iter().zip(ys.iter()).all(|(x, y)| x.eq_nested(y, open));
                open.pop();
                eq
            }
            (Value::Map(a), Value::Map(b)) => {
                let pair = (a.addr(), b.addr());
                if a.ptr_eq(b) || open.contains(&pair) {
                    return true;
                }
                open.push(pair);
                let (xs, ys) = (a.0.borrow(), b.0.borrow());
                let eq = xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|((kx, x), (ky, y))| kx == ky && x.eq_nested(y, open));
                open.pop();
                eq
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Context(a), Value::Context(b)) => a.ptr_eq(b),
            (Value::Attributes(a), Value::Attributes(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_nested(other, &mut Vec::new())
    }
}

/// Numeric view of a value used by the arithmetic helpers.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

impl Value {
    /// Name of the value's shape, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Context(_) => "context",
            Value::Attributes(_) => "attributes",
        }
    }

    fn mismatch(&self, expected: &'static str) -> EvalError {
        EvalError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    fn num(&self) -> Result<Num, EvalError> {
        match self {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(x) => Ok(Num::Float(*x)),
            Value::Str(s) => {
                let t = s.trim();
                if let Ok(n) = t.parse::<i64>() {
                    Ok(Num::Int(n))
                } else if let Ok(x) = t.parse::<f64>() {
                    Ok(Num::Float(x))
                } else {
                    Err(self.mismatch("number"))
                }
            }
            other => Err(other.mismatch("number")),
        }
    }

    /// Coerce to an integer.  Floats truncate, booleans map to 0/1 and
    /// numeric strings are parsed.
    pub fn as_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => match self.num()? {
                Num::Int(n) => Ok(n),
                Num::Float(x) => Ok(x as i64),
            },
        }
    }

    pub fn as_float(&self) -> Result<f64, EvalError> {
        Ok(self.num()?.as_f64())
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// The array capability: only lists are indexable.
    pub fn as_array(&self) -> Result<&List, EvalError> {
        match self {
            Value::List(list) => Ok(list),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn as_callable(&self) -> Result<&Rc<Function>, EvalError> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(EvalError::NotCallable(other.type_name().to_owned())),
        }
    }

    // ── Field capability ──────────────────────────────────────────────────────

    /// Read `self.key`.  Maps, contexts and attribute views are field-capable.
    pub fn get_field(&self, key: &str) -> Result<Value, EvalError> {
        match self {
            Value::Map(map) => map
                .get(key)
                .ok_or_else(|| EvalError::FieldNotFound(key.to_owned())),
            Value::Context(ctx) => ctx.get_var(key),
            Value::Attributes(attrs) => attrs.get(key),
            other => Err(other.mismatch("map")),
        }
    }

    /// Write `self.key = value`.
    pub fn set_field(&self, key: &str, value: Value) -> Result<(), EvalError> {
        match self {
            Value::Map(map) => {
                map.insert(key, value);
                Ok(())
            }
            Value::Context(ctx) => {
                ctx.set_var(key, value);
                Ok(())
            }
            Value::Attributes(attrs) => attrs.set(key, &value),
            other => Err(other.mismatch("map")),
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    fn numeric(
        &self,
        rhs: &Value,
        int_op: impl Fn(i64, i64) -> i64,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, EvalError> {
        Ok(match (self.num()?, rhs.num()?) {
            (Num::Int(a), Num::Int(b)) => Value::Int(int_op(a, b)),
            (a, b) => Value::Float(float_op(a.as_f64(), b.as_f64())),
        })
    }

    /// `+`: string concatenation if either side is a string, numeric otherwise.
    pub fn arith_add(&self, rhs: &Value) -> Result<Value, EvalError> {
        if matches!(self, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
            return Ok(Value::Str(format!("{self}{rhs}")));
        }
        self.numeric(rhs, i64::wrapping_add, |a, b| a + b)
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, EvalError> {
        self.numeric(rhs, i64::wrapping_sub, |a, b| a - b)
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, EvalError> {
        self.numeric(rhs, i64::wrapping_mul, |a, b| a * b)
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, EvalError> {
        if let (Num::Int(_), Num::Int(0)) = (self.num()?, rhs.num()?) {
            return Err(EvalError::DivisionByZero);
        }
        self.numeric(rhs, i64::wrapping_div, |a, b| a / b)
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, EvalError> {
        if let (Num::Int(_), Num::Int(0)) = (self.num()?, rhs.num()?) {
            return Err(EvalError::DivisionByZero);
        }
        self.numeric(rhs, i64::wrapping_rem, |a, b| a % b)
    }

    pub fn arith_neg(&self) -> Result<Value, EvalError> {
        Ok(match self.num()? {
            Num::Int(n) => Value::Int(n.wrapping_neg()),
            Num::Float(x) => Value::Float(-x),
        })
    }

    /// `&`, `|`, `^`: logical on two booleans, bitwise on integers.
    pub fn bit_op(
        &self,
        rhs: &Value,
        bool_op: impl Fn(bool, bool) -> bool,
        int_op: impl Fn(i64, i64) -> i64,
    ) -> Result<Value, EvalError> {
        if let (Value::Bool(a), Value::Bool(b)) = (self, rhs) {
            return Ok(Value::Bool(bool_op(*a, *b)));
        }
        Ok(Value::Int(int_op(self.as_int()?, rhs.as_int()?)))
    }

    pub fn bit_not(&self) -> Result<Value, EvalError> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            _ => Ok(Value::Int(!self.as_int()?)),
        }
    }

    /// Ordering used by `<`, `<=`, `>`, `>=`: lexical for two strings,
    /// numeric otherwise.
    pub fn cmp_value(&self, rhs: &Value) -> Result<Ordering, EvalError> {
        if let (Value::Str(a), Value::Str(b)) = (self, rhs) {
            return Ok(a.cmp(b));
        }
        let (a, b) = (self.num()?, rhs.num()?);
        Ok(match (a, b) {
            (Num::Int(a), Num::Int(b)) => a.cmp(&b),
            (a, b) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        })
    }

    /// Equality used by `=`/`==`/`!=`.  Integers and floats compare
    /// numerically; a string compared with a number compares text.
    pub fn equals(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                matches!(self.cmp_value(rhs), Ok(Ordering::Equal))
            }
            (Value::Str(a), Value::Int(_) | Value::Float(_)) => *a == rhs.to_string(),
            (Value::Int(_) | Value::Float(_), Value::Str(b)) => self.to_string() == *b,
            _ => self == rhs,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        Value::Context(ctx)
    }
}

// ── List ──────────────────────────────────────────────────────────────────────

/// Growable, shared list; the array-capable container of the language.
#[derive(Clone, Default)]
pub struct List(Rc<RefCell<Vec<Value>>>);

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "List({})", Value::List(self.clone()))
    }
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        List(Rc::new(RefCell::new(values)))
    }

    pub fn size(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Store `value` at `index`.  Writing at `index == size` appends; any
    /// higher index is out of bounds.
    pub fn set(&self, index: usize, value: Value) -> Result<(), EvalError> {
        let mut items = self.0.borrow_mut();
        match index.cmp(&items.len()) {
            Ordering::Less => items[index] = value,
            Ordering::Equal => items.push(value),
            Ordering::Greater => {
                return Err(EvalError::IndexOutOfBounds(
                    i64::try_from(index).unwrap_or(i64::MAX),
                ))
            }
        }
        Ok(())
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> Addr {
        Rc::as_ptr(&self.0).cast()
    }
}

// ── Map ───────────────────────────────────────────────────────────────────────

/// String-keyed record created by `newMap()` or a `{k: v}` literal.
#[derive(Clone, Default)]
pub struct Map(Rc<RefCell<BTreeMap<String, Value>>>);

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Map({})", Value::Map(self.clone()))
    }
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.0.borrow_mut().insert(key.to_owned(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> Addr {
        Rc::as_ptr(&self.0).cast()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }

    #[test]
    fn display_containers() {
        let list = List::from_vec(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(Value::List(list).to_string(), "[1, a]");
        let map = Map::new();
        map.insert("b", Value::Int(2));
        map.insert("a", Value::Int(1));
        assert_eq!(Value::Map(map).to_string(), "{a: 1, b: 2}");
    }

    #[test]
    fn as_int_coercions() {
        assert_eq!(Value::Int(5).as_int(), Ok(5));
        assert_eq!(Value::Float(3.9).as_int(), Ok(3));
        assert_eq!(Value::Bool(true).as_int(), Ok(1));
        assert_eq!(Value::from(" 42 ").as_int(), Ok(42));
        assert!(matches!(
            Value::from("abc").as_int(),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::List(List::new()).as_int(),
            Err(EvalError::TypeMismatch { found: "list", .. })
        ));
    }

    #[test]
    fn capability_coercions_fail_with_type_mismatch() {
        assert!(matches!(
            Value::Int(1).as_array(),
            Err(EvalError::TypeMismatch { expected: "list", .. })
        ));
        assert!(matches!(
            Value::Int(1).as_callable(),
            Err(EvalError::NotCallable(_))
        ));
        assert!(matches!(
            Value::Int(1).get_field("x"),
            Err(EvalError::TypeMismatch { expected: "map", .. })
        ));
    }

    #[test]
    fn arithmetic() {
        let a = Value::Int(10);
        let b = Value::Int(3);
        assert_eq!(a.arith_add(&b), Ok(Value::Int(13)));
        assert_eq!(a.arith_sub(&b), Ok(Value::Int(7)));
        assert_eq!(a.arith_mul(&b), Ok(Value::Int(30)));
        assert_eq!(a.arith_div(&b), Ok(Value::Int(3)));
        assert_eq!(a.arith_rem(&b), Ok(Value::Int(1)));
        assert_eq!(a.arith_neg(), Ok(Value::Int(-10)));
    }

    #[test]
    fn float_promotion() {
        assert_eq!(
            Value::Int(7).arith_add(&Value::Float(2.0)),
            Ok(Value::Float(9.0))
        );
        assert_eq!(
            Value::Float(1.0).arith_div(&Value::Float(0.0)),
            Ok(Value::Float(f64::INFINITY))
        );
    }

    #[test]
    fn integer_division_by_zero() {
        assert_eq!(
            Value::Int(1).arith_div(&Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            Value::Int(1).arith_rem(&Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            Value::from("w").arith_add(&Value::Int(8)),
            Ok(Value::from("w8"))
        );
        assert_eq!(
            Value::Int(1).arith_add(&Value::from("x")),
            Ok(Value::from("1x"))
        );
    }

    #[test]
    fn bit_ops_are_logical_on_booleans() {
        let and = |a: &Value, b: &Value| a.bit_op(b, |x, y| x & y, |x, y| x & y);
        assert_eq!(and(&Value::Bool(true), &Value::Bool(false)), Ok(Value::Bool(false)));
        assert_eq!(and(&Value::Int(6), &Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(Value::Bool(false).bit_not(), Ok(Value::Bool(true)));
        assert_eq!(Value::Int(0).bit_not(), Ok(Value::Int(-1)));
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(
            Value::Int(2).cmp_value(&Value::Float(2.5)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            Value::from("abc").cmp_value(&Value::from("abd")),
            Ok(Ordering::Less)
        );
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(Value::from("4").equals(&Value::Int(4)));
        assert!(!Value::Bool(true).equals(&Value::Int(1)));
    }

    #[test]
    fn list_set_appends_at_size_only() {
        let list = List::from_vec(vec![Value::Int(1)]);
        list.set(0, Value::Int(5)).unwrap();
        list.set(1, Value::Int(6)).unwrap();
        assert_eq!(list.to_vec(), vec![Value::Int(5), Value::Int(6)]);
        assert_eq!(
            list.set(5, Value::Int(0)),
            Err(EvalError::IndexOutOfBounds(5))
        );
        assert_eq!(list.size(), 2);
    }

    #[test]
    fn map_fields() {
        let v = Value::Map(Map::new());
        v.set_field("width", Value::Int(4)).unwrap();
        assert_eq!(v.get_field("width"), Ok(Value::Int(4)));
        assert_eq!(
            v.get_field("height"),
            Err(EvalError::FieldNotFound("height".into()))
        );
    }

    #[test]
    fn self_containing_containers() {
        let list = List::new();
        list.push(Value::Int(1));
        list.push(Value::List(list.clone()));
        let v = Value::List(list.clone());
        assert_eq!(v.to_string(), "[1, [...]]");
        assert_eq!(format!("{list:?}"), "List([1, [...]])");

        let map = Map::new();
        map.insert("self", Value::Map(map.clone()));
        map.insert("l", v.clone());
        assert_eq!(Value::Map(map).to_string(), "{l: [1, [...]], self: {...}}");

        // two distinct lists of the same self-similar shape
        let other = List::new();
        other.push(Value::Int(1));
        other.push(Value::List(other.clone()));
        assert_eq!(v, Value::List(other.clone()));
        other.push(Value::Int(2));
        assert_ne!(v, Value::List(other));
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Int(42));
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));
        assert_eq!(Value::default(), Value::from(""));
    }
}
