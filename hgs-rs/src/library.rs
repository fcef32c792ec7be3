//! Element library: every element type a circuit may place, by name.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::circuit::ElementAttributes;
use crate::model::NodeError;
use crate::template::CircuitTemplate;

/// A built-in element type and its default attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveDescription {
    name: String,
    defaults: ElementAttributes,
}

impl PrimitiveDescription {
    pub fn new(name: impl Into<String>, defaults: ElementAttributes) -> Self {
        PrimitiveDescription {
            name: name.into(),
            defaults,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &ElementAttributes {
        &self.defaults
    }
}

#[derive(Debug, Clone)]
pub enum ElementType {
    Primitive(Rc<PrimitiveDescription>),
    /// A circuit used as an element.
    Custom(Rc<CircuitTemplate>),
}

impl ElementType {
    pub fn name(&self) -> &str {
        match self {
            ElementType::Primitive(desc) => desc.name(),
            ElementType::Custom(template) => template.short_name(),
        }
    }
}

/// Registry of element types, keyed by name.
#[derive(Debug, Default)]
pub struct ElementLibrary {
    types: BTreeMap<String, ElementType>,
}

impl ElementLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a type.  Returns `true` if the name was new.
    pub fn add(&mut self, ty: ElementType) -> bool {
        self.types.insert(ty.name().to_owned(), ty).is_none()
    }

    pub fn add_primitive(&mut self, desc: PrimitiveDescription) -> bool {
        self.add(ElementType::Primitive(Rc::new(desc)))
    }

    /// Register a template under its short name and return the shared handle.
    pub fn add_template(&mut self, template: CircuitTemplate) -> Rc<CircuitTemplate> {
        let template = Rc::new(template);
        self.add(ElementType::Custom(Rc::clone(&template)));
        template
    }

    pub fn get(&self, name: &str) -> Result<&ElementType, NodeError> {
        self.types
            .get(name)
            .ok_or_else(|| NodeError::ElementNotFound(name.to_owned()))
    }

    /// True if `name` is a circuit template rather than a primitive.
    pub fn is_custom(&self, name: &str) -> Result<bool, NodeError> {
        Ok(matches!(self.get(name)?, ElementType::Custom(_)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
