use roxmltree::Node;

use super::{
    annotation::documentation,
    attribute_decl::{map_attribute_items, AttributeItem},
    values::required_attribute,
    xstypes::NCName,
    SchemaParseError,
};

/// A named `<attributeGroup>` definition
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeGroupDefinition {
    pub name: NCName,
    pub attributes: Vec<AttributeItem>,
    pub documentation: Option<String>,
}

impl AttributeGroupDefinition {
    pub const TAG_NAME: &'static str = "attributeGroup";

    pub(super) fn map_from_xml(group: Node) -> Result<Self, SchemaParseError> {
        Ok(Self {
            name: required_attribute(group, "name")?,
            attributes: map_attribute_items(group)?,
            documentation: documentation(group),
        })
    }
}
