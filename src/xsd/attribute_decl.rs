use roxmltree::Node;

use super::{
    annotation::documentation,
    namespaces::Form,
    simple_type_def::SimpleTypeDefinition,
    structure_error,
    values::{attribute, required_attribute, ActualValue},
    xs_child, xs_children,
    xstypes::{NCName, PrefixedName},
    SchemaParseError,
};

/// Value of the `use` attribute of a local `<attribute>`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AttributeUse {
    #[default]
    Optional,
    Required,
    Prohibited,
}

impl ActualValue for AttributeUse {
    fn convert(src: &str) -> Option<Self> {
        match src.trim() {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }
}

/// An `<attribute>`: a top-level declaration, a local declaration or a reference.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDeclaration {
    pub name: Option<NCName>,
    pub ref_: Option<PrefixedName>,
    pub type_name: Option<PrefixedName>,
    pub simple_type: Option<Box<SimpleTypeDefinition>>,
    pub use_: AttributeUse,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub form: Option<Form>,
    pub documentation: Option<String>,
}

/// An entry of an attribute list: an attribute or a reference to an attribute group.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeItem {
    Attribute(AttributeDeclaration),
    Group(PrefixedName),
}

impl AttributeDeclaration {
    pub const TAG_NAME: &'static str = "attribute";

    pub(super) fn map_from_top_level_xml(attribute_node: Node) -> Result<Self, SchemaParseError> {
        let name = required_attribute::<NCName>(attribute_node, "name")?;
        if attribute_node.has_attribute("ref") || attribute_node.has_attribute("use") {
            return Err(structure_error(
                attribute_node,
                "a top-level attribute declaration cannot have ref or use",
            ));
        }
        Self::map_common(attribute_node, Some(name), None)
    }

    pub(super) fn map_from_local_xml(attribute_node: Node) -> Result<Self, SchemaParseError> {
        let name = attribute::<NCName>(attribute_node, "name")?;
        let ref_ = attribute::<PrefixedName>(attribute_node, "ref")?;
        if name.is_some() == ref_.is_some() {
            return Err(structure_error(
                attribute_node,
                "an attribute needs exactly one of name and ref",
            ));
        }
        Self::map_common(attribute_node, name, ref_)
    }

    fn map_common(
        attribute_node: Node,
        name: Option<NCName>,
        ref_: Option<PrefixedName>,
    ) -> Result<Self, SchemaParseError> {
        let type_name = attribute::<PrefixedName>(attribute_node, "type")?;
        let simple_type = xs_child(attribute_node, "simpleType")
            .map(SimpleTypeDefinition::map_from_xml)
            .transpose()?
            .map(Box::new);
        if type_name.is_some() && simple_type.is_some() {
            return Err(structure_error(
                attribute_node,
                "an attribute cannot have both a type attribute and an inline simpleType",
            ));
        }

        Ok(Self {
            name,
            ref_,
            type_name,
            simple_type,
            use_: attribute(attribute_node, "use")?.unwrap_or_default(),
            default: attribute(attribute_node, "default")?,
            fixed: attribute(attribute_node, "fixed")?,
            form: attribute(attribute_node, "form")?,
            documentation: documentation(attribute_node),
        })
    }
}

/// Maps the `<attribute>` and `<attributeGroup ref>` children of `parent`, in order.
pub(super) fn map_attribute_items(parent: Node) -> Result<Vec<AttributeItem>, SchemaParseError> {
    let mut items = Vec::new();
    for child in xs_children(parent) {
        match child.tag_name().name() {
            AttributeDeclaration::TAG_NAME => items.push(AttributeItem::Attribute(
                AttributeDeclaration::map_from_local_xml(child)?,
            )),
            "attributeGroup" => {
                items.push(AttributeItem::Group(required_attribute(child, "ref")?));
            }
            _ => {}
        }
    }
    Ok(items)
}
