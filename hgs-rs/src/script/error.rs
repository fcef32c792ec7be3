//! Error taxonomy of the script layer.
//!
//! Parse failures are permanent: the same text always fails the same way, so
//! callers never retry them.  Evaluation failures are runtime faults raised
//! while a statement tree executes against a [`Context`](super::Context).

use thiserror::Error;

/// Malformed script source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line of the offending token.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

/// Runtime fault raised while executing a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("variable not found: {0}")]
    UndefinedVariable(String),

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(i64),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("not a function: {0}")]
    NotCallable(String),

    #[error("{name}: expected {expected} argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("format: {0}")]
    Format(String),

    #[error("panic: {0}")]
    Panic(String),
}

/// Either failure surface of "parse, then execute".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_line() {
        let e = ParseError::new(3, "expected ';'");
        assert_eq!(e.to_string(), "line 3: expected ';'");
    }

    #[test]
    fn script_error_wraps_both_layers() {
        let p: ScriptError = ParseError::new(1, "bad").into();
        assert!(matches!(p, ScriptError::Parse(_)));
        let e: ScriptError = EvalError::UndefinedVariable("x".into()).into();
        assert_eq!(e.to_string(), "variable not found: x");
    }
}
