use roxmltree::Node;

use super::{
    annotation::documentation,
    complex_type_def::ComplexTypeDefinition,
    namespaces::Form,
    particle::{occurs, MaxOccurs},
    simple_type_def::SimpleTypeDefinition,
    structure_error,
    values::{attribute, required_attribute},
    xs_child,
    xstypes::{NCName, PrefixedName},
    SchemaParseError,
};

/// An `<element>`, either a top-level declaration or a particle inside a content model.
///
/// Exactly one of `name` and `ref_` is present. Top-level declarations always have a name and
/// keep the default occurrence bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementDeclaration {
    pub name: Option<NCName>,
    pub ref_: Option<PrefixedName>,
    pub type_name: Option<PrefixedName>,
    pub inline_type: Option<InlineType>,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
    pub abstract_: bool,
    pub nillable: bool,
    pub substitution_group: Option<PrefixedName>,
    pub form: Option<Form>,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub documentation: Option<String>,
}

/// An anonymous type definition nested inside an `<element>`
#[derive(Clone, Debug, PartialEq)]
pub enum InlineType {
    Complex(Box<ComplexTypeDefinition>),
    Simple(Box<SimpleTypeDefinition>),
}

impl ElementDeclaration {
    pub const TAG_NAME: &'static str = "element";

    /// Maps a top-level `<element>` child of `<schema>`.
    pub(super) fn map_from_top_level_xml(element: Node) -> Result<Self, SchemaParseError> {
        if element.has_attribute("ref") {
            return Err(structure_error(
                element,
                "a top-level element declaration cannot have a ref",
            ));
        }
        let name = required_attribute::<NCName>(element, "name")?;
        let declaration = Self::map_common(element, Some(name), None)?;
        Ok(Self {
            min_occurs: 1,
            max_occurs: MaxOccurs::Count(1),
            ..declaration
        })
    }

    /// Maps an `<element>` particle, which either declares a local element or references a
    /// top-level one.
    pub(super) fn map_from_local_xml(element: Node) -> Result<Self, SchemaParseError> {
        let name = attribute::<NCName>(element, "name")?;
        let ref_ = attribute::<PrefixedName>(element, "ref")?;
        match (&name, &ref_) {
            (Some(_), Some(_)) => Err(structure_error(
                element,
                "an element cannot have both a name and a ref",
            )),
            (None, None) => Err(structure_error(
                element,
                "an element needs either a name or a ref",
            )),
            _ => Self::map_common(element, name, ref_),
        }
    }

    fn map_common(
        element: Node,
        name: Option<NCName>,
        ref_: Option<PrefixedName>,
    ) -> Result<Self, SchemaParseError> {
        let type_name = attribute::<PrefixedName>(element, "type")?;

        let inline_type = if let Some(complex_type) = xs_child(element, "complexType") {
            Some(InlineType::Complex(Box::new(
                ComplexTypeDefinition::map_from_xml(complex_type)?,
            )))
        } else if let Some(simple_type) = xs_child(element, "simpleType") {
            Some(InlineType::Simple(Box::new(
                SimpleTypeDefinition::map_from_xml(simple_type)?,
            )))
        } else {
            None
        };
        if type_name.is_some() && inline_type.is_some() {
            return Err(structure_error(
                element,
                "an element cannot have both a type attribute and an inline type",
            ));
        }
        if ref_.is_some() && (type_name.is_some() || inline_type.is_some()) {
            return Err(structure_error(
                element,
                "an element reference cannot declare a type",
            ));
        }

        let (min_occurs, max_occurs) = occurs(element)?;

        Ok(Self {
            name,
            ref_,
            type_name,
            inline_type,
            min_occurs,
            max_occurs,
            abstract_: attribute(element, "abstract")?.unwrap_or(false),
            nillable: attribute(element, "nillable")?.unwrap_or(false),
            substitution_group: attribute(element, "substitutionGroup")?,
            form: attribute(element, "form")?,
            default: attribute(element, "default")?,
            fixed: attribute(element, "fixed")?,
            documentation: documentation(element),
        })
    }
}
