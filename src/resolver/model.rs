use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::components::{Arena, Component, Ref};
use crate::walker::{self, TypeFields};
use crate::xsd::{
    builtins::{BuiltinType, Primitive},
    Compositor, DerivationMethod, MaxOccurs, NamespaceBindings, QName,
};

pub type ElementId = Ref<Element>;
pub type ComplexTypeId = Ref<ComplexType>;
pub type SimpleTypeId = Ref<SimpleType>;

/// A type definition as referenced from elements, attributes and derivations
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Builtin(BuiltinType),
    Simple(SimpleTypeId),
    Complex(ComplexTypeId),
}

/// A top-level element declaration
#[derive(Clone, Debug)]
pub struct Element {
    pub name: QName,
    pub type_: TypeRef,
    pub abstract_: bool,
    pub nillable: bool,
    /// The head of the substitution group this element is a member of
    pub substitution_group: Option<ElementId>,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub documentation: Option<String>,
}

impl Component for Element {
    const DISPLAY_NAME: &'static str = "Element";
}

/// A complex type definition with its inheritance chain flattened.
///
/// `content` and `attributes` are the *effective* ones: for an extension the base's content
/// comes first, for a restriction the restricted content replaces it.
#[derive(Clone, Debug)]
pub struct ComplexType {
    /// `None` for anonymous types
    pub name: Option<QName>,
    pub abstract_: bool,
    pub mixed: bool,
    pub base: Option<TypeRef>,
    pub derivation: Option<DerivationMethod>,
    pub content: Content,
    pub attributes: Vec<Attribute>,
    pub documentation: Option<String>,
}

impl Component for ComplexType {
    const DISPLAY_NAME: &'static str = "ComplexType";
}

#[derive(Clone, Debug)]
pub enum Content {
    Empty,
    Elements(Group),
    /// Text content of the given simple type
    Simple(TypeRef),
}

/// A model group with every group reference inlined and every substitution expanded
#[derive(Clone, Debug)]
pub struct Group {
    pub compositor: Compositor,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
    pub particles: Vec<Particle>,
}

#[derive(Clone, Debug)]
pub enum Particle {
    Element(ElementUse),
    Group(Group),
}

/// An occurrence of an element inside a content model
#[derive(Clone, Debug)]
pub struct ElementUse {
    pub term: ElementTerm,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
}

#[derive(Clone, Debug)]
pub enum ElementTerm {
    /// A reference to a top-level declaration
    Global(ElementId),
    Local(Box<LocalElement>),
}

/// An element declared inside a content model
#[derive(Clone, Debug)]
pub struct LocalElement {
    pub name: QName,
    pub type_: TypeRef,
    pub nillable: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub documentation: Option<String>,
}

/// An attribute use of a complex type, attribute group references already inlined
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: QName,
    pub type_: TypeRef,
    pub required: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub documentation: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SimpleType {
    pub name: Option<QName>,
    pub variety: SimpleVariety,
    pub documentation: Option<String>,
}

impl Component for SimpleType {
    const DISPLAY_NAME: &'static str = "SimpleType";
}

#[derive(Clone, Debug)]
pub enum SimpleVariety {
    Atomic {
        /// The primitive family of the built-in type at the root of the restriction chain
        primitive: Primitive,
        enumerations: Vec<String>,
    },
    List {
        item: TypeRef,
    },
    Union {
        members: Vec<TypeRef>,
    },
}

/// The fully merged schema produced by the [`Resolver`](super::Resolver).
///
/// A resolved schema is immutable; effective field lists are computed on first use and cached.
pub struct ResolvedSchema {
    pub(super) target_namespace: Option<String>,
    pub(super) namespaces: NamespaceBindings,

    pub(super) elements: Arena<Element>,
    pub(super) complex_types: Arena<ComplexType>,
    pub(super) simple_types: Arena<SimpleType>,

    /// Top-level elements in declaration order, root schema first
    pub(super) top_level_elements: Vec<ElementId>,
    pub(super) element_index: HashMap<QName, ElementId>,
    pub(super) type_index: HashMap<QName, TypeRef>,
    pub(super) substitutions: HashMap<ElementId, Vec<ElementId>>,

    pub(super) fields: Box<[OnceCell<Arc<TypeFields>>]>,
}

impl ResolvedSchema {
    /// The target namespace of the resolution root; never taken from an imported schema.
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Prefix bindings collected from all merged schemas, the root schema's taking precedence.
    pub fn namespaces(&self) -> &NamespaceBindings {
        &self.namespaces
    }

    pub fn element(&self, id: ElementId) -> &Element {
        self.elements.get(id)
    }

    pub fn complex_type(&self, id: ComplexTypeId) -> &ComplexType {
        self.complex_types.get(id)
    }

    pub fn simple_type(&self, id: SimpleTypeId) -> &SimpleType {
        self.simple_types.get(id)
    }

    /// All top-level elements, in declaration order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.top_level_elements
            .iter()
            .map(|&id| (id, self.elements.get(id)))
    }

    /// All complex types, named and anonymous.
    pub fn complex_types(&self) -> impl Iterator<Item = (ComplexTypeId, &ComplexType)> {
        self.complex_types.iter()
    }

    pub fn simple_types(&self) -> impl Iterator<Item = (SimpleTypeId, &SimpleType)> {
        self.simple_types.iter()
    }

    pub fn find_element(&self, name: &QName) -> Option<ElementId> {
        self.element_index.get(name).copied()
    }

    /// The first top-level element with the given local name, in any namespace.
    pub fn find_element_by_local_name(&self, local_name: &str) -> Option<ElementId> {
        self.elements()
            .find(|(_, element)| element.name.local_name == local_name)
            .map(|(id, _)| id)
    }

    pub fn find_type(&self, name: &QName) -> Option<TypeRef> {
        self.type_index.get(name).copied()
    }

    /// Looks a named type up by its local name; fails if the name is ambiguous.
    pub fn find_type_by_local_name(&self, local_name: &str) -> Option<TypeRef> {
        let mut matches = self
            .type_index
            .iter()
            .filter(|(name, _)| name.local_name == local_name);
        match (matches.next(), matches.next()) {
            (Some((_, &type_)), None) => Some(type_),
            _ => None,
        }
    }

    /// The concrete members of `head`'s substitution group (direct and transitive), in
    /// declaration order.
    pub fn substitutes(&self, head: ElementId) -> &[ElementId] {
        self.substitutions
            .get(&head)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The effective fields of a complex type, computed on first request.
    pub fn fields(&self, id: ComplexTypeId) -> Arc<TypeFields> {
        Arc::clone(
            self.fields[id.index()].get_or_init(|| Arc::new(walker::walk(self, id))),
        )
    }

    pub fn type_name(&self, type_: TypeRef) -> String {
        let name = match type_ {
            TypeRef::Builtin(builtin) => return builtin.to_string(),
            TypeRef::Simple(id) => self.simple_type(id).name.as_ref(),
            TypeRef::Complex(id) => self.complex_type(id).name.as_ref(),
        };
        name.map(|name| name.local_name.clone())
            .unwrap_or_else(|| "(anonymous)".to_string())
    }
}

impl fmt::Debug for ResolvedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSchema")
            .field("target_namespace", &self.target_namespace)
            .field("elements", &self.elements)
            .field("complex_types", &self.complex_types)
            .field("simple_types", &self.simple_types)
            .field("substitutions", &self.substitutions)
            .finish_non_exhaustive()
    }
}
