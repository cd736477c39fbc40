use std::sync::Arc;

use roxmltree::Node;

use super::{
    attribute_group_def::AttributeGroupDefinition, complex_type_def::ComplexTypeDefinition,
    model_group_def::ModelGroupDefinition, simple_type_def::SimpleTypeDefinition,
    structure_error, values::attribute, xs_children, SchemaParseError,
};
use crate::xsd::Schema;

/// This structure represents the `import` element; it is not a schema component.
///
/// Note that an import is allowed to have neither a `schemaLocation` nor a `namespace` attribute.
/// `schema` is filled in when the imported document is linked (see
/// [`SchemaLoader`](crate::loader::SchemaLoader) and [`Schema::link()`]).
#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub namespace: Option<String>,
    pub schema_location: Option<String>,
    pub schema: Option<Arc<Schema>>,
}

impl Import {
    pub const TAG_NAME: &'static str = "import";

    pub(super) fn map_from_xml(import: Node, schema: Node) -> Result<Self, SchemaParseError> {
        let namespace: Option<String> = attribute(import, "namespace")?;
        let schema_location = attribute(import, "schemaLocation")?;

        // § 4.2.6 Schema Representation Constraint: Import Constraints and Semantics
        // 1.1 If the namespace [attribute] is present, then its ·actual value· does not match
        //   the ·actual value· of the enclosing <schema>'s targetNamespace [attribute].
        if let (Some(namespace), Some(target_namespace)) =
            (namespace.as_deref(), schema.attribute("targetNamespace"))
        {
            if namespace == target_namespace {
                return Err(structure_error(
                    import,
                    "import namespace matches the target namespace",
                ));
            }
        }

        Ok(Import {
            namespace,
            schema_location,
            schema: None,
        })
    }
}

/// The `include` element: pulls in a schema document of the same (or no) target namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct Include {
    pub schema_location: Option<String>,
    pub schema: Option<Arc<Schema>>,
}

impl Include {
    pub const TAG_NAME: &'static str = "include";

    pub(super) fn map_from_xml(include: Node) -> Result<Self, SchemaParseError> {
        Ok(Self {
            schema_location: attribute(include, "schemaLocation")?,
            schema: None,
        })
    }
}

/// The `redefine` element: includes a schema document and replaces some of its components.
///
/// Each redefined component must derive from (or, for groups, may reference) its own previous
/// version, which the resolver binds to the component of the redefined document.
#[derive(Clone, Debug, PartialEq)]
pub struct Redefine {
    pub schema_location: Option<String>,
    pub schema: Option<Arc<Schema>>,
    pub complex_types: Vec<ComplexTypeDefinition>,
    pub simple_types: Vec<SimpleTypeDefinition>,
    pub groups: Vec<ModelGroupDefinition>,
    pub attribute_groups: Vec<AttributeGroupDefinition>,
}

impl Redefine {
    pub const TAG_NAME: &'static str = "redefine";

    pub(super) fn map_from_xml(redefine: Node) -> Result<Self, SchemaParseError> {
        let mut complex_types = Vec::new();
        let mut simple_types = Vec::new();
        let mut groups = Vec::new();
        let mut attribute_groups = Vec::new();

        for child in xs_children(redefine) {
            match child.tag_name().name() {
                ComplexTypeDefinition::TAG_NAME => {
                    complex_types.push(ComplexTypeDefinition::map_from_xml(child)?)
                }
                SimpleTypeDefinition::TAG_NAME => {
                    simple_types.push(SimpleTypeDefinition::map_from_xml(child)?)
                }
                ModelGroupDefinition::TAG_NAME => {
                    groups.push(ModelGroupDefinition::map_from_xml(child)?)
                }
                AttributeGroupDefinition::TAG_NAME => {
                    attribute_groups.push(AttributeGroupDefinition::map_from_xml(child)?)
                }
                "annotation" => {}
                other => {
                    return Err(structure_error(
                        child,
                        format!("<{other}> cannot be redefined"),
                    ))
                }
            }
        }

        if complex_types
            .iter()
            .map(|c| c.name.as_ref())
            .chain(simple_types.iter().map(|s| s.name.as_ref()))
            .any(|name| name.is_none())
        {
            return Err(structure_error(
                redefine,
                "redefined type definitions must be named",
            ));
        }

        Ok(Self {
            schema_location: attribute(redefine, "schemaLocation")?,
            schema: None,
            complex_types,
            simple_types,
            groups,
            attribute_groups,
        })
    }
}
