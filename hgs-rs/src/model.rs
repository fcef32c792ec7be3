//! Structural model builder.
//!
//! Realizes a circuit into a flat list of primitive [`Node`]s named by their
//! hierarchical instance path.  Custom elements are expanded through their
//! [`CircuitTemplate`](crate::template::CircuitTemplate), one nesting level
//! deeper each time, so a circuit that contains itself hits the depth ceiling
//! instead of the call stack.

use thiserror::Error;

use crate::circuit::{Circuit, ElementAttributes};
use crate::library::{ElementLibrary, ElementType};
use crate::script::{Context, ScriptError};
use crate::template::CircuitTemplate;

// ── NodeError ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("recursive nesting of circuit {origin}")]
    RecursiveNesting { origin: String },

    #[error("error parsing generics code in {origin}")]
    Generics {
        origin: String,
        #[source]
        source: ScriptError,
    },

    #[error("element not found: {0}")]
    ElementNotFound(String),
}

// ── NetList ───────────────────────────────────────────────────────────────────

/// Net-list scope of one circuit instance: the circuit it came from and the
/// path of instance names leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetList {
    origin: String,
    path: String,
}

impl NetList {
    /// Scope of a top-level circuit.
    pub fn root(origin: impl Into<String>) -> Self {
        NetList {
            origin: origin.into(),
            path: String::new(),
        }
    }

    /// Scope of the instance `sub_name` of circuit `origin` placed inside
    /// this scope.
    pub fn nested(&self, origin: impl Into<String>, sub_name: &str) -> Self {
        NetList {
            origin: origin.into(),
            path: self.qualify(sub_name),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Hierarchical name of `name` inside this scope.
    pub fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", self.path)
        }
    }

    /// `origin` or `origin (path)`, for diagnostics.
    pub fn describe(&self) -> String {
        if self.path.is_empty() {
            self.origin.clone()
        } else {
            format!("{} ({})", self.origin, self.path)
        }
    }
}

// ── ModelCreator ──────────────────────────────────────────────────────────────

/// A realized primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Hierarchical instance name, e.g. `adder/fa0/xor1`.
    pub name: String,
    /// Element type name in the library.
    pub element: String,
    /// Library defaults overlaid with the instance's attributes.
    pub attributes: ElementAttributes,
}

#[derive(Debug)]
pub struct ModelCreator {
    net_list: NetList,
    depth: usize,
    args: Option<Context>,
    nodes: Vec<Node>,
}

impl ModelCreator {
    /// Model of a plain top-level circuit.
    pub fn for_circuit(circuit: &Circuit, library: &ElementLibrary) -> Result<Self, NodeError> {
        Self::new(circuit, library, NetList::root(circuit.origin()), 0, None)
    }

    /// Model of a template used as the top-level circuit.  A generic
    /// template is expanded with empty arguments.
    pub fn for_template(
        template: &CircuitTemplate,
        library: &ElementLibrary,
    ) -> Result<Self, NodeError> {
        template.model_creator(None, "", 0, None, None, library)
    }

    /// Realize `circuit` at nesting level `depth`.  `args` are the resolved
    /// generic arguments of this instance; they become the enclosing
    /// arguments of nested generic elements that carry no resolved scope.
    pub fn new(
        circuit: &Circuit,
        library: &ElementLibrary,
        net_list: NetList,
        depth: usize,
        args: Option<Context>,
    ) -> Result<Self, NodeError> {
        let mut nodes = Vec::new();
        for (i, element) in circuit.elements().iter().enumerate() {
            let sub_name = match element.label() {
                "" => format!("{}{i}", element.element_name()),
                label => label.to_owned(),
            };
            match library.get(element.element_name())? {
                ElementType::Primitive(desc) => {
                    let mut attributes = desc.defaults().clone();
                    for (key, value) in element.attributes().iter() {
                        attributes.set(key, value.clone());
                    }
                    nodes.push(Node {
                        name: net_list.qualify(&sub_name),
                        element: element.element_name().to_owned(),
                        attributes,
                    });
                }
                ElementType::Custom(template) => {
                    let child = template.model_creator(
                        Some(&net_list),
                        &sub_name,
                        depth + 1,
                        Some(element),
                        args.as_ref(),
                        library,
                    )?;
                    nodes.extend(child.nodes);
                }
            }
        }
        Ok(ModelCreator {
            net_list,
            depth,
            args,
            nodes,
        })
    }

    pub fn net_list(&self) -> &NetList {
        &self.net_list
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Generic arguments this instance was built with.
    pub fn args(&self) -> Option<&Context> {
        self.args.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{keys, VisualElement};
    use crate::library::PrimitiveDescription;

    #[test]
    fn net_list_paths() {
        let top = NetList::root("top.dig");
        assert_eq!(top.describe(), "top.dig");
        let sub = top.nested("adder.dig", "A");
        let subsub = sub.nested("fa.dig", "fa0");
        assert_eq!(subsub.path(), "A/fa0");
        assert_eq!(subsub.qualify("x"), "A/fa0/x");
        assert_eq!(subsub.describe(), "fa.dig (A/fa0)");
    }

    #[test]
    fn primitives_overlay_defaults() {
        let mut library = ElementLibrary::new();
        library.add_primitive(PrimitiveDescription::new(
            "And",
            ElementAttributes::new().with("Bits", 1i64).with("Inputs", 2i64),
        ));
        let circuit = Circuit::new("top.dig")
            .with_element(VisualElement::new("And").with_attr("Bits", 8i64))
            .with_element(VisualElement::new("And").with_attr(keys::LABEL, "g"));

        let model = ModelCreator::for_circuit(&circuit, &library).unwrap();
        assert_eq!(model.len(), 2);
        let first = model.node("And0").unwrap();
        assert_eq!(first.attributes.get_int("Bits"), Some(8));
        assert_eq!(first.attributes.get_int("Inputs"), Some(2));
        assert_eq!(model.node("g").unwrap().attributes.get_int("Bits"), Some(1));
        assert_eq!(model.depth(), 0);
    }

    #[test]
    fn unknown_element() {
        let circuit = Circuit::new("top.dig").with_element(VisualElement::new("Flux"));
        let err = ModelCreator::for_circuit(&circuit, &ElementLibrary::new()).unwrap_err();
        assert!(matches!(err, NodeError::ElementNotFound(name) if name == "Flux"));
    }
}
