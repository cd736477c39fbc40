use roxmltree::Node;

use super::{
    annotation::documentation,
    structure_error,
    values::{attribute, required_attribute},
    xs_child, xs_children,
    xstypes::{NCName, PrefixedName},
    SchemaParseError,
};

/// A `<simpleType>`, named (top-level) or anonymous.
#[derive(Clone, Debug, PartialEq)]
pub struct SimpleTypeDefinition {
    pub name: Option<NCName>,
    pub variety: SimpleVariety,
    pub documentation: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SimpleVariety {
    Restriction(Restriction),
    List {
        item_type: Option<PrefixedName>,
        inline_item: Option<Box<SimpleTypeDefinition>>,
    },
    Union {
        member_types: Vec<PrefixedName>,
        inline_members: Vec<SimpleTypeDefinition>,
    },
}

/// A `<restriction>` of a simple type. Facets other than `enumeration` are kept as-is and not
/// interpreted.
#[derive(Clone, Debug, PartialEq)]
pub struct Restriction {
    pub base: Option<PrefixedName>,
    pub inline_base: Option<Box<SimpleTypeDefinition>>,
    pub enumerations: Vec<String>,
    pub facets: Vec<Facet>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Facet {
    pub name: String,
    pub value: String,
}

impl SimpleTypeDefinition {
    pub const TAG_NAME: &'static str = "simpleType";

    pub fn restriction(&self) -> Option<&Restriction> {
        match &self.variety {
            SimpleVariety::Restriction(restriction) => Some(restriction),
            _ => None,
        }
    }

    pub(super) fn map_from_xml(simple_type: Node) -> Result<Self, SchemaParseError> {
        let variety = if let Some(restriction) = xs_child(simple_type, "restriction") {
            SimpleVariety::Restriction(Restriction::map_from_xml(restriction)?)
        } else if let Some(list) = xs_child(simple_type, "list") {
            SimpleVariety::List {
                item_type: attribute(list, "itemType")?,
                inline_item: xs_child(list, Self::TAG_NAME)
                    .map(Self::map_from_xml)
                    .transpose()?
                    .map(Box::new),
            }
        } else if let Some(union) = xs_child(simple_type, "union") {
            SimpleVariety::Union {
                member_types: attribute(union, "memberTypes")?.unwrap_or_default(),
                inline_members: xs_children(union)
                    .filter(|c| c.tag_name().name() == Self::TAG_NAME)
                    .map(Self::map_from_xml)
                    .collect::<Result<_, _>>()?,
            }
        } else {
            return Err(structure_error(
                simple_type,
                "a simpleType needs one of restriction, list or union",
            ));
        };

        Ok(Self {
            name: attribute(simple_type, "name")?,
            variety,
            documentation: documentation(simple_type),
        })
    }
}

impl Restriction {
    fn map_from_xml(restriction: Node) -> Result<Self, SchemaParseError> {
        let base = attribute(restriction, "base")?;
        let inline_base = xs_child(restriction, SimpleTypeDefinition::TAG_NAME)
            .map(SimpleTypeDefinition::map_from_xml)
            .transpose()?
            .map(Box::new);
        if base.is_none() && inline_base.is_none() {
            return Err(structure_error(
                restriction,
                "a restriction needs a base attribute or an inline simpleType",
            ));
        }

        let mut enumerations = Vec::new();
        let mut facets = Vec::new();
        for facet in xs_children(restriction) {
            match facet.tag_name().name() {
                "enumeration" => enumerations.push(required_attribute(facet, "value")?),
                "simpleType" | "annotation" => {}
                name => {
                    if let Some(value) = attribute(facet, "value")? {
                        facets.push(Facet {
                            name: name.to_string(),
                            value,
                        });
                    }
                }
            }
        }

        Ok(Self {
            base,
            inline_base,
            enumerations,
            facets,
        })
    }
}
