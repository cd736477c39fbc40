use roxmltree::Node;

use super::{
    annotation::documentation, model_group::ModelGroup, structure_error, values::required_attribute,
    xs_children, xstypes::NCName, SchemaParseError,
};

/// A named `<group>` definition
#[derive(Clone, Debug, PartialEq)]
pub struct ModelGroupDefinition {
    pub name: NCName,
    pub model_group: ModelGroup,
    pub documentation: Option<String>,
}

impl ModelGroupDefinition {
    pub const TAG_NAME: &'static str = "group";

    pub(super) fn map_from_xml(group: Node) -> Result<Self, SchemaParseError> {
        let name = required_attribute(group, "name")?;

        // {model group}
        //   A model group which is the {term} of a particle corresponding to the <all>, <choice>
        //   or <sequence> among the [children] (there must be exactly one).
        let mut model_groups =
            xs_children(group).filter(|c| ModelGroup::is_model_group_tag(c.tag_name().name()));
        let (Some(model_group), None) = (model_groups.next(), model_groups.next()) else {
            return Err(structure_error(
                group,
                "a group definition needs exactly one of all, choice or sequence",
            ));
        };

        Ok(Self {
            name,
            model_group: ModelGroup::map_from_xml(model_group)?,
            documentation: documentation(group),
        })
    }
}
