//! Circuits used as elements, and generic expansion.
//!
//! A [`CircuitTemplate`] wraps a circuit loaded from a file so it can be
//! placed inside other circuits.  If the circuit is marked generic, every
//! instantiation runs the instance's argument script, deep-copies the
//! circuit, and runs each nested element's script against those arguments
//! before the copy is handed to the model builder.  The shared circuit is
//! never modified.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::circuit::{keys, AttributeHandle, Circuit, ElementAttributes, VisualElement};
use crate::library::ElementLibrary;
use crate::model::{ModelCreator, NetList, NodeError};
use crate::script::{builtins, parse, Context, ParseError, ScriptError, Stmt, Value};

/// Deepest nesting level accepted before a circuit is assumed to contain
/// itself.
pub const MAX_DEPTH: usize = 30;

/// Name under which the enclosing arguments are bound in argument scripts.
pub const ARGS: &str = "args";

/// Name under which a primitive element's attributes are bound.
pub const THIS: &str = "this";

pub struct CircuitTemplate {
    file: String,
    short_name: String,
    circuit: Circuit,
    description: Option<String>,
    attribute_keys: Vec<&'static str>,
    /// Parsed argument scripts keyed by their exact source text.
    statements: RefCell<HashMap<String, Rc<Stmt>>>,
}

impl fmt::Debug for CircuitTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitTemplate")
            .field("file", &self.file)
            .field("generic", &self.is_generic())
            .field("elements", &self.circuit.elements().len())
            .field("cached_statements", &self.cached_statements())
            .finish()
    }
}

impl CircuitTemplate {
    pub fn new(file: impl Into<String>, circuit: Circuit) -> Self {
        let file = file.into();
        let short_name = Path::new(&file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&file)
            .to_owned();
        let mut attribute_keys = vec![keys::ROTATE, keys::LABEL, keys::SHAPE_TYPE];
        if circuit.is_generic() {
            attribute_keys.push(keys::GENERIC);
        }
        CircuitTemplate {
            file,
            short_name,
            circuit,
            description: None,
            attribute_keys,
            statements: RefCell::new(HashMap::new()),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Name the template is registered under: the file name without its
    /// directory.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn attributes(&self) -> &ElementAttributes {
        self.circuit.attributes()
    }

    pub fn is_generic(&self) -> bool {
        self.circuit.is_generic()
    }

    /// Attributes an instance of this template can be configured with.
    pub fn attribute_keys(&self) -> &[&'static str] {
        &self.attribute_keys
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Custom description if set, else the circuit's own, else its name.
    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .or_else(|| self.circuit.attributes().get_str(keys::DESCRIPTION))
            .unwrap_or(&self.short_name)
    }

    /// Parse `code`, reusing an earlier parse of the identical text.
    pub fn statement(&self, code: &str) -> Result<Rc<Stmt>, ParseError> {
        if let Some(stmt) = self.statements.borrow().get(code) {
            trace!(origin = %self.file, "statement cache hit");
            return Ok(Rc::clone(stmt));
        }
        let parsed = Rc::new(parse(code)?);
        trace!(origin = %self.file, statements = parsed.size(), "statement cache miss");
        let stmt = Rc::clone(
            self.statements
                .borrow_mut()
                .entry(code.to_owned())
                .or_insert(parsed),
        );
        Ok(stmt)
    }

    pub fn cached_statements(&self) -> usize {
        self.statements.borrow().len()
    }

    /// Build the model of one instance of this template.
    ///
    /// `parent` is the net-list scope the instance is placed in (`None` at
    /// the top level), `instantiating` the element that places it and
    /// `enclosing_args` the resolved arguments of the circuit containing that
    /// element.
    #[tracing::instrument(level = "debug", skip_all, fields(origin = %self.file, depth = depth))]
    pub fn model_creator(
        &self,
        parent: Option<&NetList>,
        sub_name: &str,
        depth: usize,
        instantiating: Option<&VisualElement>,
        enclosing_args: Option<&Context>,
        library: &ElementLibrary,
    ) -> Result<ModelCreator, NodeError> {
        if depth > MAX_DEPTH {
            return Err(NodeError::RecursiveNesting {
                origin: self.file.clone(),
            });
        }

        let net_list = match parent {
            Some(p) => p.nested(self.file.as_str(), sub_name),
            None => NetList::root(self.file.as_str()),
        };

        if !self.is_generic() {
            debug!(generic = false, "expanding template");
            return ModelCreator::new(&self.circuit, library, net_list, depth, None);
        }
        debug!(generic = true, "expanding template");

        let origin = net_list.describe();
        let args = self
            .resolve_args(instantiating, enclosing_args)
            .map_err(|e| generics_error(&origin, e))?;
        let circuit = self.specialize(&args, library, &origin)?;
        ModelCreator::new(&circuit, library, net_list, depth, Some(args))
    }

    /// The argument scope of the instance being expanded.
    ///
    /// An instance specialized by its enclosing template already carries one.
    /// Otherwise its own argument script runs in a fresh scope, with the
    /// enclosing arguments bound as `args`.  The top level gets empty
    /// arguments.
    fn resolve_args(
        &self,
        instantiating: Option<&VisualElement>,
        enclosing_args: Option<&Context>,
    ) -> Result<Context, ScriptError> {
        let Some(element) = instantiating else {
            return Ok(script_root());
        };
        if let Some(args) = element.generic_args() {
            trace!(instance = element.label(), "reusing resolved arguments");
            return Ok(args.clone());
        }

        let stmt = self.statement(element.generic_code().unwrap_or(""))?;
        let args = script_root();
        if let Some(enclosing) = enclosing_args {
            args.set_var(ARGS, enclosing.clone());
        }
        stmt.execute(&args)?;
        trace!(instance = element.label(), names = ?args.local_names(), "resolved arguments");
        Ok(args)
    }

    /// Deep-copy the circuit and run every nested element's argument script.
    ///
    /// Scripts of custom elements produce that element's argument scope, to
    /// be picked up when it is expanded in turn.  Scripts of primitives get
    /// the element's attributes as `this` and write to them directly.
    fn specialize(
        &self,
        args: &Context,
        library: &ElementLibrary,
        origin: &str,
    ) -> Result<Circuit, NodeError> {
        let mut circuit = self.circuit.create_deep_copy();
        for element in circuit.elements_mut() {
            let Some(code) = element.generic_code().map(str::to_owned) else {
                continue;
            };
            let is_custom = library.is_custom(element.element_name())?;
            let stmt = self
                .statement(&code)
                .map_err(|e| generics_error(origin, e.into()))?;

            let scope = script_root();
            scope.set_var(ARGS, args.clone());
            if is_custom {
                stmt.execute(&scope)
                    .map_err(|e| generics_error(origin, e.into()))?;
                element.set_generic_args(scope);
            } else {
                let this = AttributeHandle::new(element.attributes().clone());
                scope.set_var(THIS, Value::Attributes(this.clone()));
                stmt.execute(&scope)
                    .map_err(|e| generics_error(origin, e.into()))?;
                element.set_attributes(this.snapshot());
            }
        }
        Ok(circuit)
    }
}

/// Fresh root scope with the standard functions.
fn script_root() -> Context {
    let ctx = Context::new();
    builtins::install_standard(&ctx);
    ctx
}

fn generics_error(origin: &str, source: ScriptError) -> NodeError {
    NodeError::Generics {
        origin: origin.to_owned(),
        source,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PrimitiveDescription;

    fn generic_circuit(file: &str) -> Circuit {
        Circuit::new(file).with_attr(keys::IS_GENERIC, true)
    }

    #[test]
    fn short_name_and_keys() {
        let t = CircuitTemplate::new("lib/adder.dig", generic_circuit("lib/adder.dig"));
        assert_eq!(t.short_name(), "adder.dig");
        assert_eq!(t.file(), "lib/adder.dig");
        assert!(t.attribute_keys().contains(&keys::GENERIC));

        let plain = CircuitTemplate::new("plain.dig", Circuit::new("plain.dig"));
        assert!(!plain.attribute_keys().contains(&keys::GENERIC));
    }

    #[test]
    fn description_fallbacks() {
        let mut t = CircuitTemplate::new("a.dig", Circuit::new("a.dig"));
        assert_eq!(t.description(), "a.dig");
        let c = Circuit::new("b.dig").with_attr(keys::DESCRIPTION, "A counter");
        let t2 = CircuitTemplate::new("b.dig", c);
        assert_eq!(t2.description(), "A counter");
        t.set_description("custom");
        assert_eq!(t.description(), "custom");
    }

    #[test]
    fn statement_cache_returns_same_tree() {
        let t = CircuitTemplate::new("a.dig", Circuit::new("a.dig"));
        let a = t.statement("x := 1;").unwrap();
        let b = t.statement("x := 1;").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(t.cached_statements(), 1);
        // keyed by exact text
        let c = t.statement("x := 1; ").unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(t.cached_statements(), 2);
    }

    #[test]
    fn parse_failures_are_not_cached() {
        let t = CircuitTemplate::new("a.dig", Circuit::new("a.dig"));
        assert!(t.statement("x := ;").is_err());
        assert_eq!(t.cached_statements(), 0);
    }

    #[test]
    fn depth_ceiling_checked_first() {
        let t = CircuitTemplate::new("a.dig", Circuit::new("a.dig"));
        let lib = ElementLibrary::new();
        let err = t
            .model_creator(None, "", MAX_DEPTH + 1, None, None, &lib)
            .unwrap_err();
        assert!(matches!(err, NodeError::RecursiveNesting { origin } if origin == "a.dig"));
        assert!(t.model_creator(None, "", MAX_DEPTH, None, None, &lib).is_ok());
    }

    #[test]
    fn primitive_script_writes_this() {
        let mut lib = ElementLibrary::new();
        lib.add_primitive(PrimitiveDescription::new(
            "Register",
            ElementAttributes::new().with("Bits", 1i64),
        ));
        let circuit = generic_circuit("reg.dig").with_element(
            VisualElement::new("Register")
                .with_attr(keys::LABEL, "r")
                .with_attr(keys::GENERIC, "this.Bits = args.bits;"),
        );
        let t = lib.add_template(CircuitTemplate::new("reg.dig", circuit));
        let inst = VisualElement::new("reg.dig").with_attr(keys::GENERIC, "bits := 16;");

        let model = t
            .model_creator(None, "", 0, Some(&inst), None, &lib)
            .unwrap();
        assert_eq!(model.node("r").unwrap().attributes.get_int("Bits"), Some(16));
        // the shared circuit keeps its unspecialized attributes
        assert_eq!(t.circuit().elements()[0].attributes().get_int("Bits"), None);
        assert_eq!(model.args().unwrap().get_var("bits"), Ok(Value::Int(16)));
    }

    #[test]
    fn script_failure_is_wrapped() {
        let mut lib = ElementLibrary::new();
        lib.add_primitive(PrimitiveDescription::new("And", ElementAttributes::new()));
        let circuit = generic_circuit("g.dig").with_element(
            VisualElement::new("And").with_attr(keys::GENERIC, "this.Bits = args.missing;"),
        );
        let t = lib.add_template(CircuitTemplate::new("g.dig", circuit));
        let err = t.model_creator(None, "", 0, None, None, &lib).unwrap_err();
        match err {
            NodeError::Generics { origin, source } => {
                assert_eq!(origin, "g.dig");
                assert!(matches!(source, ScriptError::Eval(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_failure_in_instance_script_is_wrapped() {
        let lib = ElementLibrary::new();
        let t = CircuitTemplate::new("g.dig", generic_circuit("g.dig"));
        let inst = VisualElement::new("g.dig").with_attr(keys::GENERIC, "bits := ;");
        let err = t
            .model_creator(None, "", 0, Some(&inst), None, &lib)
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Generics {
                source: ScriptError::Parse(_),
                ..
            }
        ));
    }
}
