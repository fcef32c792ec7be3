//! Built-in functions.
//!
//! Two registries exist.  The *core* set (`format`, `isPresent`, `sizeOf`,
//! `newMap`, `newList`) is bound into every [`Context`] at construction.
//! The *standard* set adds numeric and string helpers and is installed on
//! root scopes by whoever creates them (the expansion engine and the CLI),
//! so nested scopes reach it through their parent chain.

use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use super::context::Context;
use super::error::EvalError;
use super::expr::{eval_expr, Expr};
use super::function::{Arity, Function};
use super::value::{List, Map, Value};

thread_local! {
    static CORE: Vec<Rc<Function>> = vec![
        Rc::new(Function::native("format", Arity::AtLeast(1), builtin_format)),
        Rc::new(Function::lazy("isPresent", Arity::Exact(1), builtin_is_present)),
        Rc::new(Function::native("sizeOf", Arity::Exact(1), builtin_size_of)),
        Rc::new(Function::native("newMap", Arity::Exact(0), |_, _| Ok(Value::Map(Map::new())))),
        Rc::new(Function::native("newList", Arity::Exact(0), |_, _| Ok(Value::List(List::new())))),
    ];

    static STANDARD: Vec<Rc<Function>> = vec![
        Rc::new(Function::native("int", Arity::Exact(1), |_, a| Ok(Value::Int(a[0].as_int()?)))),
        Rc::new(Function::native("float", Arity::Exact(1), |_, a| Ok(Value::Float(a[0].as_float()?)))),
        Rc::new(Function::native("abs", Arity::Exact(1), builtin_abs)),
        Rc::new(Function::native("min", Arity::AtLeast(1), |_, a| pick(a, std::cmp::Ordering::Less))),
        Rc::new(Function::native("max", Arity::AtLeast(1), |_, a| pick(a, std::cmp::Ordering::Greater))),
        Rc::new(Function::native("ceil", Arity::Exact(1), |_, a| Ok(Value::Int(a[0].as_float()?.ceil() as i64)))),
        Rc::new(Function::native("floor", Arity::Exact(1), |_, a| Ok(Value::Int(a[0].as_float()?.floor() as i64)))),
        Rc::new(Function::native("round", Arity::Exact(1), |_, a| Ok(Value::Int(a[0].as_float()?.round() as i64)))),
        Rc::new(Function::native("bitsNeededFor", Arity::Exact(1), builtin_bits_needed_for)),
        Rc::new(Function::native("log2", Arity::Exact(1), |_, a| Ok(Value::Float(a[0].as_float()?.log2())))),
        Rc::new(Function::native("identifier", Arity::Exact(1), builtin_identifier)),
        Rc::new(Function::native("splitString", Arity::Exact(1), builtin_split_string)),
        Rc::new(Function::native("toUpper", Arity::Exact(1), |_, a| Ok(Value::Str(a[0].to_string().to_uppercase())))),
        Rc::new(Function::native("toLower", Arity::Exact(1), |_, a| Ok(Value::Str(a[0].to_string().to_lowercase())))),
    ];
}

/// Bind the core functions into `ctx`.
pub fn install_core(ctx: &Context) {
    CORE.with(|funcs| install(ctx, funcs));
}

/// Bind the standard helper functions into `ctx`.
pub fn install_standard(ctx: &Context) {
    STANDARD.with(|funcs| install(ctx, funcs));
}

fn install(ctx: &Context, funcs: &[Rc<Function>]) {
    for f in funcs {
        ctx.set_var(f.name(), Value::Function(Rc::clone(f)));
    }
}

// ── Core ──────────────────────────────────────────────────────────────────────

fn builtin_format(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    let fmt = args[0].to_string();
    Ok(Value::Str(format_values(&fmt, &args[1..])?))
}

/// Evaluates its argument and reports whether that succeeded, so
/// `isPresent(args.width)` is false when no `width` was passed.
fn builtin_is_present(ctx: &Context, args: &[Expr]) -> Result<Value, EvalError> {
    Ok(Value::Bool(eval_expr(&args[0], ctx).is_ok()))
}

fn builtin_size_of(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    let size = args[0].as_array()?.size();
    Ok(Value::Int(i64::try_from(size).unwrap_or(i64::MAX)))
}

static FORMAT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%([-0]*)(\d*)(?:\.(\d+))?([dxXobscf%])").expect("format directive regex")
});

/// printf-style formatting: `%d %x %X %o %b %s %c %f %%` with optional
/// `-`/`0` flags, width and precision.
pub fn format_values(fmt: &str, args: &[Value]) -> Result<String, EvalError> {
    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut last = 0;

    for caps in FORMAT_SPEC.captures_iter(fmt) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&fmt[last..whole.start()]);
        last = whole.end();

        let flags = caps.get(1).map_or("", |m| m.as_str());
        let width: usize = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let precision: Option<usize> = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let conv = caps.get(4).map_or("", |m| m.as_str());

        if conv == "%" {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| EvalError::Format(format!("missing argument for %{conv}")))?;

        let body = match conv {
            "d" => arg.as_int()?.to_string(),
            "x" => format!("{:x}", arg.as_int()?),
            "X" => format!("{:X}", arg.as_int()?),
            "o" => format!("{:o}", arg.as_int()?),
            "b" => format!("{:b}", arg.as_int()?),
            "f" => format!("{:.*}", precision.unwrap_or(6), arg.as_float()?),
            "s" => {
                let s = arg.to_string();
                match precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s,
                }
            }
            "c" => u32::try_from(arg.as_int()?)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .ok_or_else(|| EvalError::Format(format!("invalid character code {arg}")))?,
            other => return Err(EvalError::Format(format!("unsupported conversion %{other}"))),
        };

        let numeric = !matches!(conv, "s" | "c");
        out.push_str(&pad(body, width, flags.contains('-'), numeric && flags.contains('0')));
    }
    out.push_str(&fmt[last..]);
    Ok(out)
}

fn pad(body: String, width: usize, left: bool, zero: bool) -> String {
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if left {
        body + &" ".repeat(fill)
    } else if zero {
        match body.strip_prefix('-') {
            Some(digits) => format!("-{}{digits}", "0".repeat(fill)),
            None => "0".repeat(fill) + &body,
        }
    } else {
        " ".repeat(fill) + &body
    }
}

// ── Standard ──────────────────────────────────────────────────────────────────

fn builtin_abs(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        other => Ok(Value::Float(other.as_float()?.abs())),
    }
}

fn pick(args: &[Value], want: std::cmp::Ordering) -> Result<Value, EvalError> {
    let mut best = args[0].clone();
    for v in &args[1..] {
        if v.cmp_value(&best)? == want {
            best = v.clone();
        }
    }
    Ok(best)
}

/// Number of bits needed to store the non-negative value `n` (at least 1).
fn builtin_bits_needed_for(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    let n = args[0].as_int()?;
    let bits = 64 - (n as u64).leading_zeros();
    Ok(Value::Int(i64::from(bits.max(1))))
}

static NON_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("identifier regex"));

/// Turn arbitrary text into a valid identifier.
fn builtin_identifier(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    let text = args[0].to_string();
    let mut ident = NON_IDENT.replace_all(&text, "_").into_owned();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    Ok(Value::Str(ident))
}

/// Split on commas and whitespace, dropping empty parts.
fn builtin_split_string(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    let text = args[0].to_string();
    let parts = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(Value::from)
        .collect();
    Ok(Value::List(List::from_vec(parts)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
