//! Generator script language.
//!
//! A small tree-walking interpreter used to compute the arguments of generic
//! circuits and to configure the elements inside them:
//!
//! - Scoped variables with parent-chain lookup ([`Context`])
//! - Assignable access paths `a`, `a[i]`, `a.b` ([`Reference`])
//! - Integers, floats, strings, lists, maps and first-class functions
//! - Control flow: `if`/`else`, `while`, `repeat`/`until`, `for`, `func`
//! - A text output channel (`print`, `printf`, template text)
//!
//! # Quick start
//!
//! ```rust
//! use hgs::script;
//!
//! let ctx = script::run("width := 4; printf(\"w=%d\", width * 2);").unwrap();
//! assert_eq!(ctx.output(), "w=8");
//! ```

pub mod builtins;
pub mod context;
pub mod error;
pub mod expr;
pub mod function;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod reference;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use context::{Context, OUTPUT};
pub use error::{EvalError, ParseError, ScriptError};
pub use expr::Expr;
pub use function::{Arity, Function};
pub use interp::run;
pub use parser::{parse, parse_template};
pub use reference::Reference;
pub use stmt::Stmt;
pub use value::{List, Map, Value};
