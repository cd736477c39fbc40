//! Effective field lists of resolved complex types.
//!
//! The walker flattens a type's content model into the ordered list of element fields the
//! codec works with. Nested groups multiply their occurrence bounds into their members, choice
//! members become optional and elements occurring more than once are merged into the first
//! occurrence.

use std::collections::HashMap;

use tracing::debug;

use crate::resolver::{
    ComplexTypeId, Content, ElementTerm, Group, Particle, ResolvedSchema, TypeRef,
};
use crate::xsd::{Compositor, MaxOccurs, QName};

/// Data key of the text value of a simple-content type
pub const TEXT_FIELD: &str = "$value";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Element,
    Attribute,
    Text,
}

/// An effective member of a complex type
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: QName,
    pub kind: FieldKind,
    pub type_: TypeRef,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
    pub nillable: bool,
    pub default: Option<String>,
    pub fixed: Option<String>,
}

impl Field {
    /// The key of this field in codec data
    pub fn key(&self) -> &str {
        match self.kind {
            FieldKind::Text => TEXT_FIELD,
            FieldKind::Element | FieldKind::Attribute => &self.name.local_name,
        }
    }

    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }

    /// Whether the field is represented as an array
    pub fn is_array(&self) -> bool {
        self.kind == FieldKind::Element && self.max_occurs.is_many()
    }
}

/// The effective fields of a complex type, in document order within each kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeFields {
    pub attributes: Vec<Field>,
    pub text: Option<Field>,
    pub elements: Vec<Field>,
}

impl TypeFields {
    /// All fields: attributes, then the text field, then elements
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.attributes
            .iter()
            .chain(self.text.iter())
            .chain(self.elements.iter())
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.iter().find(|field| field.key() == key)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.text.is_none() && self.elements.is_empty()
    }

    /// Keys used by both an attribute and a child element. Such a key maps to the attribute
    /// in [`TypeFields::get()`].
    pub fn shared_keys(&self) -> impl Iterator<Item = &str> {
        self.elements
            .iter()
            .map(Field::key)
            .filter(move |key| self.attributes.iter().any(|attribute| attribute.key() == *key))
    }
}

/// Computes the effective fields of `id`. Use [`ResolvedSchema::fields()`] for the cached
/// variant.
pub(crate) fn walk(schema: &ResolvedSchema, id: ComplexTypeId) -> TypeFields {
    let complex_type = schema.complex_type(id);

    let attributes = complex_type
        .attributes
        .iter()
        .map(|attribute| Field {
            name: attribute.name.clone(),
            kind: FieldKind::Attribute,
            type_: attribute.type_,
            min_occurs: u64::from(attribute.required),
            max_occurs: MaxOccurs::Count(1),
            nillable: false,
            default: attribute.default.clone(),
            fixed: attribute.fixed.clone(),
        })
        .collect();

    let mut text = None;
    let mut elements = Vec::new();
    match &complex_type.content {
        Content::Empty => {}
        Content::Simple(text_type) => {
            text = Some(Field {
                name: QName::unqualified(TEXT_FIELD),
                kind: FieldKind::Text,
                type_: *text_type,
                min_occurs: 0,
                max_occurs: MaxOccurs::Count(1),
                nillable: false,
                default: None,
                fixed: None,
            })
        }
        Content::Elements(group) => {
            let mut collector = Collector::default();
            collector.group(schema, group, 1, MaxOccurs::Count(1), false);
            elements = collector.fields;
        }
    }

    let fields = TypeFields {
        attributes,
        text,
        elements,
    };
    for key in fields.shared_keys() {
        debug!(
            type_ = %schema.type_name(TypeRef::Complex(id)),
            key,
            "attribute and child element share a data key"
        );
    }
    fields
}

#[derive(Default)]
struct Collector {
    fields: Vec<Field>,
    /// Whether any occurrence of the field sits inside a choice
    in_choice: Vec<bool>,
    positions: HashMap<String, usize>,
}

impl Collector {
    fn group(
        &mut self,
        schema: &ResolvedSchema,
        group: &Group,
        min_occurs: u64,
        max_occurs: MaxOccurs,
        in_choice: bool,
    ) {
        let choice = group.compositor == Compositor::Choice;
        let min_occurs = if choice {
            0
        } else {
            min_occurs.saturating_mul(group.min_occurs)
        };
        let max_occurs = max_occurs.mul(&group.max_occurs);

        for particle in &group.particles {
            match particle {
                Particle::Element(element_use) => {
                    let mut field = match &element_use.term {
                        ElementTerm::Global(id) => {
                            // The referenced declaration provides name and type
                            let element = schema.element(*id);
                            Field {
                                name: element.name.clone(),
                                kind: FieldKind::Element,
                                type_: element.type_,
                                min_occurs: 0,
                                max_occurs: MaxOccurs::Count(1),
                                nillable: element.nillable,
                                default: element.default.clone(),
                                fixed: element.fixed.clone(),
                            }
                        }
                        ElementTerm::Local(element) => Field {
                            name: element.name.clone(),
                            kind: FieldKind::Element,
                            type_: element.type_,
                            min_occurs: 0,
                            max_occurs: MaxOccurs::Count(1),
                            nillable: element.nillable,
                            default: element.default.clone(),
                            fixed: element.fixed.clone(),
                        },
                    };
                    field.min_occurs = min_occurs.saturating_mul(element_use.min_occurs);
                    field.max_occurs = max_occurs.mul(&element_use.max_occurs);
                    self.push(field, in_choice || choice);
                }
                Particle::Group(inner) => {
                    self.group(schema, inner, min_occurs, max_occurs, in_choice || choice)
                }
            }
        }
    }

    fn push(&mut self, field: Field, in_choice: bool) {
        match self.positions.get(&field.name.local_name) {
            Some(&index) => {
                let either_in_choice = self.in_choice[index] || in_choice;
                let existing = &mut self.fields[index];
                existing.min_occurs = existing.min_occurs.min(field.min_occurs);
                existing.max_occurs = if either_in_choice {
                    existing.max_occurs.max(&field.max_occurs)
                } else {
                    existing.max_occurs.add(&field.max_occurs)
                };
                self.in_choice[index] = either_in_choice;
            }
            None => {
                self.positions
                    .insert(field.name.local_name.clone(), self.fields.len());
                self.fields.push(field);
                self.in_choice.push(in_choice);
            }
        }
    }
}
