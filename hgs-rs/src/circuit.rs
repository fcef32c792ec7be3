//! Circuit structure consumed by the expansion engine.
//!
//! Only what generic expansion needs is modelled: elements with a key/value
//! attribute store, and circuits as an ordered list of elements plus
//! circuit-level attributes.  Wires and pins belong to the model builder.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::script::{Context, EvalError, Value};

/// Well-known attribute keys.
pub mod keys {
    pub const ROTATE: &str = "rotation";
    pub const LABEL: &str = "Label";
    pub const SHAPE_TYPE: &str = "shapeType";
    /// Circuit-level flag: the circuit accepts generic arguments.
    pub const IS_GENERIC: &str = "isGeneric";
    /// Generic-argument script text of an element instance.
    pub const GENERIC: &str = "generic";
    pub const DESCRIPTION: &str = "Description";
}

// ── AttrValue ─────────────────────────────────────────────────────────────────

/// Plain attribute value.  Unlike script values these are owned data, so an
/// attribute set copies deeply.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl AttrValue {
    pub fn to_value(&self) -> Value {
        match self {
            AttrValue::Int(n) => Value::Int(*n),
            AttrValue::Float(x) => Value::Float(*x),
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Str(s) => Value::Str(s.clone()),
        }
    }

    /// Convert a script value; only scalars can be stored as attributes.
    pub fn from_value(value: &Value) -> Result<Self, EvalError> {
        match value {
            Value::Int(n) => Ok(AttrValue::Int(*n)),
            Value::Float(x) => Ok(AttrValue::Float(*x)),
            Value::Bool(b) => Ok(AttrValue::Bool(*b)),
            Value::Str(s) => Ok(AttrValue::Str(s.clone())),
            other => Err(EvalError::TypeMismatch {
                expected: "attribute value",
                found: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Float(x)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

// ── ElementAttributes ─────────────────────────────────────────────────────────

/// Key/value attribute store of an element or circuit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementAttributes {
    attrs: BTreeMap<String, AttrValue>,
}

impl ElementAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set (or overwrite) an attribute.
    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) -> &mut Self {
        self.attrs.insert(key.to_owned(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key)? {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key)? {
            AttrValue::Int(n) => Some(*n),
            AttrValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean flag; unset means false.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.attrs.get(key), Some(AttrValue::Bool(true)))
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

// ── AttributeHandle ───────────────────────────────────────────────────────────

/// Shared mutable view of one element's attributes, exposed to scripts as
/// `this`.
#[derive(Debug, Clone)]
pub struct AttributeHandle(Rc<RefCell<ElementAttributes>>);

impl AttributeHandle {
    pub fn new(attrs: ElementAttributes) -> Self {
        AttributeHandle(Rc::new(RefCell::new(attrs)))
    }

    pub fn get(&self, key: &str) -> Result<Value, EvalError> {
        self.0
            .borrow()
            .get(key)
            .map(AttrValue::to_value)
            .ok_or_else(|| EvalError::FieldNotFound(key.to_owned()))
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<(), EvalError> {
        let v = AttrValue::from_value(value)?;
        self.0.borrow_mut().set(key, v);
        Ok(())
    }

    /// Current contents as plain data.
    pub fn snapshot(&self) -> ElementAttributes {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &AttributeHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ── VisualElement ─────────────────────────────────────────────────────────────

/// One placed element: the name of its type in the library plus its
/// attributes.
#[derive(Debug, Clone)]
pub struct VisualElement {
    element_name: String,
    attributes: ElementAttributes,
    /// Arguments resolved for this instance during expansion of the
    /// enclosing template.
    generic_args: Option<Context>,
}

impl VisualElement {
    pub fn new(element_name: impl Into<String>) -> Self {
        VisualElement {
            element_name: element_name.into(),
            attributes: ElementAttributes::new(),
            generic_args: None,
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.set(key, value);
        self
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    pub fn set_attributes(&mut self, attributes: ElementAttributes) {
        self.attributes = attributes;
    }

    pub fn label(&self) -> &str {
        self.attributes.get_str(keys::LABEL).unwrap_or("")
    }

    /// Trimmed generic-argument script, if the instance carries a non-blank
    /// one.
    pub fn generic_code(&self) -> Option<&str> {
        self.attributes
            .get_str(keys::GENERIC)
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn generic_args(&self) -> Option<&Context> {
        self.generic_args.as_ref()
    }

    pub fn set_generic_args(&mut self, args: Context) {
        self.generic_args = Some(args);
    }
}

// ── Circuit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Circuit {
    /// Opaque identity of the file the circuit was loaded from.
    origin: String,
    attributes: ElementAttributes,
    elements: Vec<VisualElement>,
}

impl Circuit {
    pub fn new(origin: impl Into<String>) -> Self {
        Circuit {
            origin: origin.into(),
            attributes: ElementAttributes::new(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: VisualElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.set(key, value);
        self
    }

    pub fn add(&mut self, element: VisualElement) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ElementAttributes {
        &mut self.attributes
    }

    pub fn elements(&self) -> &[VisualElement] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [VisualElement] {
        &mut self.elements
    }

    pub fn is_generic(&self) -> bool {
        self.attributes.get_bool(keys::IS_GENERIC)
    }

    /// An independent copy.  Attributes are copied; argument scopes resolved
    /// on the elements are not, so the copy starts unspecialized.
    pub fn create_deep_copy(&self) -> Circuit {
        Circuit {
            origin: self.origin.clone(),
            attributes: self.attributes.clone(),
            elements: self
                .elements
                .iter()
                .map(|e| VisualElement {
                    element_name: e.element_name.clone(),
                    attributes: e.attributes.clone(),
                    generic_args: None,
                })
                .collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_accessors() {
        let attrs = ElementAttributes::new()
            .with("Bits", 4i64)
            .with(keys::LABEL, "A")
            .with(keys::IS_GENERIC, true)
            .with("count", "12");
        assert_eq!(attrs.get_int("Bits"), Some(4));
        assert_eq!(attrs.get_int("count"), Some(12));
        assert_eq!(attrs.get_str(keys::LABEL), Some("A"));
        assert!(attrs.get_bool(keys::IS_GENERIC));
        assert!(!attrs.get_bool("missing"));
        assert_eq!(attrs.len(), 4);
    }

    #[test]
    fn handle_reads_and_writes() {
        let handle = AttributeHandle::new(ElementAttributes::new().with("Bits", 1i64));
        assert_eq!(handle.get("Bits"), Ok(Value::Int(1)));
        handle.set("Bits", &Value::Int(8)).unwrap();
        assert_eq!(handle.snapshot().get_int("Bits"), Some(8));
        assert_eq!(
            handle.get("nope"),
            Err(EvalError::FieldNotFound("nope".into()))
        );
    }

    #[test]
    fn handle_rejects_containers() {
        let handle = AttributeHandle::new(ElementAttributes::new());
        let err = handle
            .set("x", &Value::List(crate::script::List::new()))
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { found: "list", .. }));
    }

    #[test]
    fn generic_code_is_trimmed_and_ignores_blank() {
        let e = VisualElement::new("And").with_attr(keys::GENERIC, "   ");
        assert_eq!(e.generic_code(), None);
        let e = VisualElement::new("And").with_attr(keys::GENERIC, "\n this.Bits = 2; ");
        assert_eq!(e.generic_code(), Some("this.Bits = 2;"));
    }

    #[test]
    fn deep_copy_is_independent_and_unresolved() {
        let mut elem = VisualElement::new("Sub").with_attr("Bits", 1i64);
        elem.set_generic_args(Context::new());
        let original = Circuit::new("top.dig").with_element(elem);

        let mut copy = original.create_deep_copy();
        assert!(copy.elements()[0].generic_args().is_none());
        copy.elements_mut()[0].attributes_mut().set("Bits", 9i64);

        assert_eq!(original.elements()[0].attributes().get_int("Bits"), Some(1));
        assert!(original.elements()[0].generic_args().is_some());
        assert_eq!(copy.origin(), "top.dig");
    }
}
