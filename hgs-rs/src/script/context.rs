//! Evaluation scopes.
//!
//! A [`Context`] is one node of a chain of lexically nested scopes.  Lookups
//! walk the chain upwards; writes always land in the scope they are made on,
//! so a child can shadow an ancestor's binding but never modify it.
//!
//! Each chain has text output ("print") attached.  A scope either owns an
//! output buffer or delegates every print to its parent; the nearest owning
//! ancestor receives the text.  A function call frame is the exception: it
//! looks names up through the function's defining scope but prints into the
//! chain of its caller.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::builtins;
use super::error::EvalError;
use super::function::Function;
use super::value::Value;

/// Reserved name that reads back the accumulated output of the chain.
pub const OUTPUT: &str = "output";

struct Scope {
    parent: Option<Context>,
    vars: RefCell<HashMap<String, Value>>,
    output: Output,
}

enum Output {
    Own(RefCell<String>),
    Parent,
    /// Call frames: print into the caller's chain.
    Caller(Context),
}

/// Shared handle to a scope.  Cloning the handle does not copy the scope.
#[derive(Clone)]
pub struct Context(Rc<Scope>);

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("names", &self.local_names())
            .field("owns_output", &self.length().is_some())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

impl Context {
    /// A root scope owning its output buffer.
    pub fn new() -> Self {
        Self::build(None, Output::Own(RefCell::default()))
    }

    /// A child scope with its own output buffer.
    pub fn with_parent(parent: &Context) -> Self {
        Self::build(Some(parent.clone()), Output::Own(RefCell::default()))
    }

    /// A child scope with printing disabled: all output is forwarded to the
    /// parent chain.
    pub fn delegating(parent: &Context) -> Self {
        Self::build(Some(parent.clone()), Output::Parent)
    }

    /// A call frame: names resolve through `closure`, prints go to `caller`.
    pub fn frame(closure: &Context, caller: &Context) -> Self {
        Self::build(Some(closure.clone()), Output::Caller(caller.clone()))
    }

    fn build(parent: Option<Context>, output: Output) -> Self {
        let ctx = Context(Rc::new(Scope {
            parent,
            vars: RefCell::new(HashMap::new()),
            output,
        }));
        builtins::install_core(&ctx);
        ctx
    }

    fn chain(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |c| c.0.parent.as_ref())
    }

    pub fn parent(&self) -> Option<&Context> {
        self.0.parent.as_ref()
    }

    /// True if `name` is bound here or in any ancestor.
    pub fn contains(&self, name: &str) -> bool {
        self.chain().any(|c| c.0.vars.borrow().contains_key(name))
    }

    /// Look `name` up through the chain.
    ///
    /// `output` that is not bound anywhere reads the current text of the
    /// nearest owned output buffer.
    pub fn get_var(&self, name: &str) -> Result<Value, EvalError> {
        for scope in self.chain() {
            if let Some(v) = scope.0.vars.borrow().get(name) {
                return Ok(v.clone());
            }
        }
        if name == OUTPUT {
            return Ok(Value::Str(self.output()));
        }
        Err(EvalError::UndefinedVariable(name.to_owned()))
    }

    /// Bind `name` in this scope, shadowing any ancestor binding.
    pub fn set_var(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.0.vars.borrow_mut().insert(name.to_owned(), value.into());
        self
    }

    /// Register a function under its own name.
    pub fn add_func(&self, func: Function) -> &Self {
        let name = func.name().to_owned();
        self.set_var(&name, Value::Function(Rc::new(func)))
    }

    /// The buffer this scope's prints end up in.
    fn sink(&self) -> Option<Context> {
        let mut scope = self.clone();
        loop {
            let next = match &scope.0.output {
                Output::Own(_) => return Some(scope),
                Output::Caller(caller) => caller.clone(),
                Output::Parent => scope.0.parent.clone()?,
            };
            scope = next;
        }
    }

    fn buffer(&self) -> Option<&RefCell<String>> {
        match &self.0.output {
            Output::Own(buf) => Some(buf),
            _ => None,
        }
    }

    /// Append `text` to the output buffer this scope prints into.
    pub fn print(&self, text: &str) -> &Self {
        if let Some(sink) = self.sink() {
            if let Some(buf) = sink.buffer() {
                buf.borrow_mut().push_str(text);
            }
        }
        self
    }

    /// Text accumulated in the output buffer this scope prints into.
    pub fn output(&self) -> String {
        self.sink()
            .and_then(|sink| sink.buffer().map(|buf| buf.borrow().clone()))
            .unwrap_or_default()
    }

    /// Length of this scope's own buffer; `None` for delegating scopes.
    pub fn length(&self) -> Option<usize> {
        self.buffer().map(|buf| buf.borrow().len())
    }

    /// Names bound directly in this scope, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
