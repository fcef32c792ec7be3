//! Tree-walking statement execution.

use std::rc::Rc;

use super::builtins::{self, format_values};
use super::context::Context;
use super::error::{EvalError, ScriptError};
use super::expr::{apply_binary, eval_expr, Expr};
use super::function::Function;
use super::parser;
use super::stmt::Stmt;
use super::value::Value;

// ── Flow ──────────────────────────────────────────────────────────────────────

/// Non-local exit out of a statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Return(Value),
}

fn truthy(cond: &Expr, ctx: &Context) -> Result<bool, EvalError> {
    eval_expr(cond, ctx)?.as_bool()
}

/// Execute `stmt` against `ctx`.  Returns `Some(flow)` when a `return`
/// unwinds through it.
pub fn exec_stmt(stmt: &Stmt, ctx: &Context) -> Result<Option<Flow>, EvalError> {
    match stmt {
        Stmt::Block(body) => {
            for s in body {
                if let Some(flow) = exec_stmt(s, ctx)? {
                    return Ok(Some(flow));
                }
            }
        }
        Stmt::Assign(target, e) => {
            let v = eval_expr(e, ctx)?;
            target.set(ctx, v)?;
        }
        Stmt::Compound(target, op, e) => {
            let current = target.get(ctx)?;
            let rhs = eval_expr(e, ctx)?;
            target.set(ctx, apply_binary(*op, &current, &rhs)?)?;
        }
        Stmt::If(cond, then, els) => {
            if truthy(cond, ctx)? {
                return exec_stmt(then, ctx);
            }
            if let Some(els) = els {
                return exec_stmt(els, ctx);
            }
        }
        Stmt::While(cond, body) => {
            while truthy(cond, ctx)? {
                if let Some(flow) = exec_stmt(body, ctx)? {
                    return Ok(Some(flow));
                }
            }
        }
        Stmt::Repeat(body, cond) => loop {
            if let Some(flow) = exec_stmt(body, ctx)? {
                return Ok(Some(flow));
            }
            if truthy(cond, ctx)? {
                break;
            }
        },
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            exec_stmt(init, ctx)?;
            while truthy(cond, ctx)? {
                if let Some(flow) = exec_stmt(body, ctx)? {
                    return Ok(Some(flow));
                }
                exec_stmt(step, ctx)?;
            }
        }
        Stmt::FuncDecl(name, def) => {
            ctx.add_func(Function::user(name.clone(), Rc::clone(def), ctx));
        }
        Stmt::Return(e) => return Ok(Some(Flow::Return(eval_expr(e, ctx)?))),
        Stmt::Print(args) => {
            for arg in args {
                let v = eval_expr(arg, ctx)?;
                ctx.print(&v.to_string());
            }
        }
        Stmt::Printf(args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx)?);
            }
            let Some((fmt, rest)) = values.split_first() else {
                return Err(EvalError::ArityMismatch {
                    name: "printf".into(),
                    expected: "at least 1".into(),
                    found: 0,
                });
            };
            ctx.print(&format_values(&fmt.to_string(), rest)?);
        }
        Stmt::Panic(e) => return Err(EvalError::Panic(eval_expr(e, ctx)?.to_string())),
        Stmt::Text(text) => {
            ctx.print(text);
        }
        Stmt::Expr(e) => {
            eval_expr(e, ctx)?;
        }
    }
    Ok(None)
}

impl Stmt {
    /// Run a whole script body.  A top-level `return` ends it early.
    pub fn execute(&self, ctx: &Context) -> Result<(), EvalError> {
        exec_stmt(self, ctx).map(|_| ())
    }
}

/// Parse `code` and run it in a fresh root scope carrying the standard
/// functions.  Returns the scope so callers can inspect bindings and output.
pub fn run(code: &str) -> Result<Context, ScriptError> {
    let ctx = Context::new();
    builtins::install_standard(&ctx);
    parser::parse(code)?.execute(&ctx)?;
    Ok(ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn output(src: &str) -> String {
        run(src).expect("script failed").output()
    }

    fn var(ctx: &Context, name: &str) -> Value {
        ctx.get_var(name).expect("unbound")
    }

    #[test]
    fn assignment_and_arithmetic() {
        let ctx = run("a := 3; b := a * 4 + 1; a += 2;").unwrap();
        assert_eq!(var(&ctx, "a"), Value::Int(5));
        assert_eq!(var(&ctx, "b"), Value::Int(13));
    }

    #[test]
    fn print_and_printf() {
        assert_eq!(output(r#"print("x=", 1 + 1, "\n");"#), "x=2\n");
        assert_eq!(output(r#"printf("%s:%02d", "t", 7);"#), "t:07");
    }

    #[test]
    fn if_else() {
        assert_eq!(output("a := 5; if (a > 3) print(\"yes\"); else print(\"no\");"), "yes");
        assert_eq!(output("a := 1; if (a > 3) print(\"yes\"); else print(\"no\");"), "no");
    }

    #[test]
    fn loops() {
        assert_eq!(output("for (i := 0; i < 3; i++) print(i);"), "012");
        assert_eq!(output("i := 3; while (i > 0) { print(i); i--; }"), "321");
        assert_eq!(output("i := 0; repeat { i++; } until i >= 5; print(i);"), "5");
        // repeat runs its body at least once
        assert_eq!(output("i := 9; repeat i++; until true; print(i);"), "10");
    }

    #[test]
    fn functions_and_return() {
        let src = r#"
            func fact(n) {
                if (n <= 1) return 1;
                return n * fact(n - 1);
            }
            print(fact(5));
        "#;
        assert_eq!(output(src), "120");
    }

    #[test]
    fn function_locals_do_not_leak() {
        let ctx = run("func f(a) { t := a; return t; } r := f(4);").unwrap();
        assert_eq!(var(&ctx, "r"), Value::Int(4));
        assert!(!ctx.contains("t"));
        assert!(!ctx.contains("a"));
    }

    #[test]
    fn function_output_goes_to_caller() {
        assert_eq!(output("func hello(n) print(\"hi \", n); hello(1); hello(2);"), "hi 1hi 2");
    }

    #[test]
    fn function_prints_into_calling_chain() {
        let lib = run("func hello() print(\"hi\");").unwrap();
        let ctx = Context::new();
        ctx.set_var("lib", Value::Context(lib.clone()));
        parser::parse("lib.hello();").unwrap().execute(&ctx).unwrap();
        assert_eq!(ctx.output(), "hi");
        assert_eq!(lib.output(), "");
    }

    #[test]
    fn returned_closure_keeps_its_frame() {
        let src = "func adder(n) { return func(x) return x + n; } a := adder(2); print(a(3));";
        assert_eq!(output(src), "5");
    }

    #[test]
    fn closures_stored_in_a_map_outlive_the_call() {
        let src = r#"
            func counter() {
                m := newMap();
                m.n = 0;
                m.next = func() { m.n = m.n + 1; return m.n; };
                return m;
            }
            c := counter();
            c.next();
            print(c.next());
        "#;
        assert_eq!(output(src), "2");
    }

    #[test]
    fn first_class_functions() {
        let src = "twice := func(f, x) return f(f(x)); inc := func(v) return v + 1; print(twice(inc, 5));";
        assert_eq!(output(src), "7");
    }

    #[test]
    fn lists_and_maps() {
        let src = r#"
            l := newList();
            l[0] := 0;
        "#;
        // `:=` only declares plain names
        assert!(matches!(run(src), Err(ScriptError::Parse(_))));

        let src = r#"
            l := newList();
            l[0] = "a"; l[1] = "b";
            m := {width: 4};
            m.height = sizeOf(l);
            print(l, " ", m.width * m.height);
        "#;
        assert_eq!(output(src), "[a, b] 8");
    }

    #[test]
    fn printing_a_list_that_holds_itself() {
        assert_eq!(output("l := newList(); l[0] = l; print(l);"), "[[...]]");
    }

    #[test]
    fn is_present() {
        let src = r#"m := {a: 1}; print(isPresent(m.a), isPresent(m.b), isPresent(nothing));"#;
        assert_eq!(output(src), "truefalsefalse");
    }

    #[test]
    fn output_reads_back_printed_text() {
        assert_eq!(output("print(\"ab\"); x := output; print(x);"), "abab");
    }

    #[test]
    fn panic_aborts() {
        assert_eq!(
            run("print(1); panic(\"bad width\"); print(2);").unwrap_err(),
            ScriptError::Eval(EvalError::Panic("bad width".into()))
        );
    }

    #[test]
    fn runtime_errors_surface() {
        assert!(matches!(
            run("x := y + 1;"),
            Err(ScriptError::Eval(EvalError::UndefinedVariable(_)))
        ));
        assert!(matches!(
            run("l := [1]; x := l[5];"),
            Err(ScriptError::Eval(EvalError::IndexOutOfBounds(5)))
        ));
        assert!(matches!(
            run("x := 1; x(2);"),
            Err(ScriptError::Eval(EvalError::NotCallable(_)))
        ));
        assert!(matches!(
            run("x := sizeOf(1, 2);"),
            Err(ScriptError::Eval(EvalError::ArityMismatch { .. }))
        ));
    }

    #[test]
    fn top_level_return_stops_script() {
        assert_eq!(output("print(1); return; print(2);"), "1");
    }

    #[test]
    fn template_text_and_echo() {
        let ctx = Context::new();
        parser::parse_template("n=<?= 2 * 3 ?>;<? for (i := 0; i < 3; i++) { ?>[<?= i ?>]<? } ?>")
            .unwrap()
            .execute(&ctx)
            .unwrap();
        assert_eq!(ctx.output(), "n=6;[0][1][2]");
    }
}
