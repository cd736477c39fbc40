use roxmltree::Node;

use super::{
    annotation::documentation,
    attribute_decl::{map_attribute_items, AttributeItem},
    model_group::ModelGroup,
    structure_error,
    values::{attribute, required_attribute},
    xs_child, xs_children,
    xstypes::{NCName, PrefixedName},
    SchemaParseError,
};

/// A `<complexType>`, named (top-level) or anonymous.
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexTypeDefinition {
    pub name: Option<NCName>,
    pub abstract_: bool,
    pub mixed: bool,
    pub content: ContentModel,
    /// Attributes declared directly on the `<complexType>`; attributes of a derivation live on
    /// the [`Derivation`] itself.
    pub attributes: Vec<AttributeItem>,
    pub documentation: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContentModel {
    Empty,
    /// Implicit complex content: a model group, or a `<group ref>` wrapped into a sequence
    Particle(ModelGroup),
    ComplexContent(Derivation),
    SimpleContent(Derivation),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DerivationMethod {
    Extension,
    Restriction,
}

/// The `<extension>` or `<restriction>` inside `<complexContent>`/`<simpleContent>`
#[derive(Clone, Debug, PartialEq)]
pub struct Derivation {
    pub method: DerivationMethod,
    pub base: PrefixedName,
    pub particle: Option<ModelGroup>,
    pub attributes: Vec<AttributeItem>,
}

impl ComplexTypeDefinition {
    pub const TAG_NAME: &'static str = "complexType";

    pub(super) fn map_from_xml(complex_type: Node) -> Result<Self, SchemaParseError> {
        let content = if let Some(simple_content) = xs_child(complex_type, "simpleContent") {
            ContentModel::SimpleContent(Derivation::map_from_xml(simple_content)?)
        } else if let Some(complex_content) = xs_child(complex_type, "complexContent") {
            ContentModel::ComplexContent(Derivation::map_from_xml(complex_content)?)
        } else {
            // Implicit complex content: {base type definition} is ·xs:anyType·, the particle is
            // the model group or group reference among the [children], if any.
            match ModelGroup::map_content_from_children(complex_type)? {
                Some(model_group) => ContentModel::Particle(model_group),
                None => ContentModel::Empty,
            }
        };

        Ok(Self {
            name: attribute(complex_type, "name")?,
            abstract_: attribute(complex_type, "abstract")?.unwrap_or(false),
            mixed: attribute(complex_type, "mixed")?.unwrap_or(false),
            content,
            attributes: map_attribute_items(complex_type)?,
            documentation: documentation(complex_type),
        })
    }

    /// The `base` of this type's derivation, if it has explicit content.
    pub fn base(&self) -> Option<&PrefixedName> {
        match &self.content {
            ContentModel::ComplexContent(derivation) | ContentModel::SimpleContent(derivation) => {
                Some(&derivation.base)
            }
            ContentModel::Empty | ContentModel::Particle(_) => None,
        }
    }
}

impl Derivation {
    fn map_from_xml(content: Node) -> Result<Self, SchemaParseError> {
        let mut derivations = xs_children(content)
            .filter(|c| matches!(c.tag_name().name(), "extension" | "restriction"));
        let (Some(derivation), None) = (derivations.next(), derivations.next()) else {
            return Err(structure_error(
                content,
                "expected exactly one extension or restriction",
            ));
        };

        // {derivation method}
        //   If the <restriction> alternative is chosen, then restriction, otherwise (the
        //   <extension> alternative is chosen) extension.
        let method = match derivation.tag_name().name() {
            "extension" => DerivationMethod::Extension,
            _ => DerivationMethod::Restriction,
        };

        Ok(Self {
            method,
            base: required_attribute(derivation, "base")?,
            particle: ModelGroup::map_content_from_children(derivation)?,
            attributes: map_attribute_items(derivation)?,
        })
    }
}
