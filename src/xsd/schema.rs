use std::sync::Arc;

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use super::{
    attribute_decl::AttributeDeclaration,
    attribute_group_def::AttributeGroupDefinition,
    builtins::XS_NAMESPACE,
    complex_type_def::ComplexTypeDefinition,
    element_decl::ElementDeclaration,
    import::{Import, Include, Redefine},
    model_group_def::ModelGroupDefinition,
    namespaces::{Form, NamespaceBindings},
    position,
    simple_type_def::SimpleTypeDefinition,
    structure_error,
    values::attribute,
    xs_children,
    xstypes::AnyURI,
    SchemaParseError,
};

/// Options for mapping a schema document
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    /// Allow a XML Document Type Definition (DTD) to occur
    pub allow_dtd: bool,
}

/// One schema document, as written.
///
/// Declarations appear in document order. Nothing is resolved yet: references are
/// [prefixed names](super::PrefixedName), and imported, included and redefined documents are
/// attached to their directives once loaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    /// Absent for a chameleon schema, which adopts the namespace of whatever pulls it in
    pub target_namespace: Option<AnyURI>,
    pub element_form_default: Form,
    pub attribute_form_default: Form,
    pub namespaces: NamespaceBindings,

    pub elements: Vec<ElementDeclaration>,
    pub attributes: Vec<AttributeDeclaration>,
    pub complex_types: Vec<ComplexTypeDefinition>,
    pub simple_types: Vec<SimpleTypeDefinition>,
    pub groups: Vec<ModelGroupDefinition>,
    pub attribute_groups: Vec<AttributeGroupDefinition>,

    pub imports: Vec<Import>,
    pub includes: Vec<Include>,
    pub redefines: Vec<Redefine>,
}

impl Schema {
    pub const TAG_NAME: &'static str = "schema";

    pub fn parse(xsd: &str) -> Result<Self, SchemaParseError> {
        Self::parse_with_options(xsd, &ParseOptions::default())
    }

    pub fn parse_with_options(xsd: &str, options: &ParseOptions) -> Result<Self, SchemaParseError> {
        let mut parsing_options = roxmltree::ParsingOptions::default();
        parsing_options.allow_dtd = options.allow_dtd;
        let document = Document::parse_with_options(xsd, parsing_options)?;
        Self::map_from_xml(document.root_element())
    }

    pub fn map_from_xml(schema: Node) -> Result<Self, SchemaParseError> {
        if schema.tag_name().name() != Self::TAG_NAME
            || schema.tag_name().namespace() != Some(XS_NAMESPACE)
        {
            return Err(SchemaParseError::UnexpectedRoot {
                found: schema.tag_name().name().to_string(),
                position: position(schema),
            });
        }

        let mut result = Self {
            target_namespace: attribute(schema, "targetNamespace")?
                .filter(|ns: &String| !ns.is_empty()),
            element_form_default: attribute(schema, "elementFormDefault")?.unwrap_or_default(),
            attribute_form_default: attribute(schema, "attributeFormDefault")?
                .unwrap_or_default(),
            namespaces: NamespaceBindings::from_node(schema),
            ..Self::default()
        };

        for top_level_element in xs_children(schema) {
            match top_level_element.tag_name().name() {
                ElementDeclaration::TAG_NAME => result
                    .elements
                    .push(ElementDeclaration::map_from_top_level_xml(top_level_element)?),
                AttributeDeclaration::TAG_NAME => result
                    .attributes
                    .push(AttributeDeclaration::map_from_top_level_xml(top_level_element)?),
                ComplexTypeDefinition::TAG_NAME => {
                    let complex_type = ComplexTypeDefinition::map_from_xml(top_level_element)?;
                    if complex_type.name.is_none() {
                        return Err(structure_error(
                            top_level_element,
                            "a top-level complexType must be named",
                        ));
                    }
                    result.complex_types.push(complex_type);
                }
                SimpleTypeDefinition::TAG_NAME => {
                    let simple_type = SimpleTypeDefinition::map_from_xml(top_level_element)?;
                    if simple_type.name.is_none() {
                        return Err(structure_error(
                            top_level_element,
                            "a top-level simpleType must be named",
                        ));
                    }
                    result.simple_types.push(simple_type);
                }
                ModelGroupDefinition::TAG_NAME => result
                    .groups
                    .push(ModelGroupDefinition::map_from_xml(top_level_element)?),
                AttributeGroupDefinition::TAG_NAME => result
                    .attribute_groups
                    .push(AttributeGroupDefinition::map_from_xml(top_level_element)?),
                Import::TAG_NAME => result
                    .imports
                    .push(Import::map_from_xml(top_level_element, schema)?),
                Include::TAG_NAME => result
                    .includes
                    .push(Include::map_from_xml(top_level_element)?),
                Redefine::TAG_NAME => result
                    .redefines
                    .push(Redefine::map_from_xml(top_level_element)?),

                // These tags don't contribute anything to the model
                "annotation" | "notation" => {}

                other => warn!(
                    element = other,
                    position = %position(top_level_element),
                    "ignoring unsupported top-level schema element"
                ),
            }
        }

        debug!(
            target_namespace = ?result.target_namespace,
            elements = result.elements.len(),
            complex_types = result.complex_types.len(),
            simple_types = result.simple_types.len(),
            "mapped schema document"
        );
        Ok(result)
    }

    /// Attaches `child` to every import, include and redefine directive whose `schemaLocation`
    /// equals `location`. Returns the number of directives linked.
    pub fn link(&mut self, location: &str, child: Arc<Schema>) -> usize {
        let mut linked = 0;
        let mut attach = |schema_location: &Option<String>, slot: &mut Option<Arc<Schema>>| {
            if schema_location.as_deref() == Some(location) {
                *slot = Some(Arc::clone(&child));
                linked += 1;
            }
        };
        for import in &mut self.imports {
            attach(&import.schema_location, &mut import.schema);
        }
        for include in &mut self.includes {
            attach(&include.schema_location, &mut include.schema);
        }
        for redefine in &mut self.redefines {
            attach(&redefine.schema_location, &mut redefine.schema);
        }
        linked
    }

    /// The `schemaLocation`s of all directives, in document order (imports, includes,
    /// redefines).
    pub fn directive_locations(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .filter_map(|i| i.schema_location.as_deref())
            .chain(
                self.includes
                    .iter()
                    .filter_map(|i| i.schema_location.as_deref()),
            )
            .chain(
                self.redefines
                    .iter()
                    .filter_map(|r| r.schema_location.as_deref()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::{
        AttributeItem, AttributeUse, Compositor, ContentModel, DerivationMethod, InlineType,
        MaxOccurs, Particle, PrefixedName,
    };

    #[test]
    fn parses_enumerated_simple_type() {
        let schema = Schema::parse(
            r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema">
                <xsd:simpleType name="StatusType">
                    <xsd:restriction base="xsd:string">
                        <xsd:enumeration value="draft"/>
                        <xsd:enumeration value="active"/>
                        <xsd:enumeration value="archived"/>
                    </xsd:restriction>
                </xsd:simpleType>
            </xsd:schema>"#,
        )
        .unwrap();

        let restriction = schema.simple_types[0].restriction().unwrap();
        assert_eq!(restriction.enumerations.len(), 3);
        assert_eq!(restriction.enumerations, ["draft", "active", "archived"]);
        assert_eq!(restriction.base, Some(PrefixedName::parse("xsd:string")));
    }

    #[test]
    fn parses_elements_and_particles() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                    xmlns:sap="http://www.sap.com/tool-metadata"
                    targetNamespace="urn:test" elementFormDefault="qualified">
                <xs:element name="root" sap:generated="true">
                    <xs:complexType>
                        <xs:sequence>
                            <xs:element name="item" type="xs:string" maxOccurs="unbounded"/>
                            <xs:element ref="other" minOccurs="0"/>
                            <xs:choice>
                                <xs:element name="a" type="xs:int"/>
                                <xs:group ref="extra"/>
                            </xs:choice>
                            <sap:hint/>
                        </xs:sequence>
                        <xs:attribute name="id" type="xs:string" use="required"/>
                        <xs:attributeGroup ref="common"/>
                    </xs:complexType>
                </xs:element>
            </xs:schema>"#,
        )
        .unwrap();

        assert_eq!(schema.target_namespace.as_deref(), Some("urn:test"));
        assert_eq!(schema.element_form_default, Form::Qualified);
        let root = &schema.elements[0];
        assert_eq!(root.name.as_deref(), Some("root"));
        let Some(InlineType::Complex(complex_type)) = &root.inline_type else {
            panic!("expected an inline complex type");
        };
        let ContentModel::Particle(sequence) = &complex_type.content else {
            panic!("expected a particle");
        };
        assert_eq!(sequence.compositor, Compositor::Sequence);
        assert_eq!(sequence.particles.len(), 3);
        let Particle::Element(item) = &sequence.particles[0] else {
            panic!("expected an element");
        };
        assert_eq!(item.max_occurs, MaxOccurs::Unbounded);
        let Particle::Element(other) = &sequence.particles[1] else {
            panic!("expected an element");
        };
        assert_eq!(other.ref_, Some(PrefixedName::local("other")));
        assert_eq!(other.min_occurs, 0);
        let Particle::ModelGroup(choice) = &sequence.particles[2] else {
            panic!("expected a choice");
        };
        assert_eq!(choice.compositor, Compositor::Choice);
        assert!(matches!(choice.particles[1], Particle::Group(_)));

        assert_eq!(complex_type.attributes.len(), 2);
        let AttributeItem::Attribute(id) = &complex_type.attributes[0] else {
            panic!("expected an attribute");
        };
        assert_eq!(id.use_, AttributeUse::Required);
        assert_eq!(
            complex_type.attributes[1],
            AttributeItem::Group(PrefixedName::local("common"))
        );
    }

    #[test]
    fn parses_derivations_and_directives() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:b="urn:base"
                    targetNamespace="urn:derived">
                <xs:import namespace="urn:base" schemaLocation="base.xsd"/>
                <xs:include schemaLocation="common.xsd"/>
                <xs:redefine schemaLocation="old.xsd">
                    <xs:complexType name="Old">
                        <xs:complexContent>
                            <xs:extension base="Old"/>
                        </xs:complexContent>
                    </xs:complexType>
                </xs:redefine>
                <xs:complexType name="DerivedType">
                    <xs:complexContent>
                        <xs:extension base="b:BaseType">
                            <xs:sequence>
                                <xs:element name="extra" type="xs:string"/>
                            </xs:sequence>
                            <xs:attribute name="flag" type="xs:boolean"/>
                        </xs:extension>
                    </xs:complexContent>
                </xs:complexType>
            </xs:schema>"#,
        )
        .unwrap();

        assert_eq!(schema.imports[0].namespace.as_deref(), Some("urn:base"));
        assert_eq!(schema.includes[0].schema_location.as_deref(), Some("common.xsd"));
        assert_eq!(schema.redefines[0].complex_types.len(), 1);
        assert_eq!(
            schema.directive_locations().collect::<Vec<_>>(),
            ["base.xsd", "common.xsd", "old.xsd"]
        );

        let ContentModel::ComplexContent(derivation) = &schema.complex_types[0].content else {
            panic!("expected complex content");
        };
        assert_eq!(derivation.method, DerivationMethod::Extension);
        assert_eq!(derivation.base, PrefixedName::parse("b:BaseType"));
        assert!(derivation.particle.is_some());
        assert_eq!(derivation.attributes.len(), 1);
    }

    #[test]
    fn links_directives_by_location() {
        let mut schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:include schemaLocation="a.xsd"/>
                <xs:import namespace="urn:b" schemaLocation="b.xsd"/>
            </xs:schema>"#,
        )
        .unwrap();
        let child = Arc::new(Schema::default());
        assert_eq!(schema.link("a.xsd", Arc::clone(&child)), 1);
        assert!(schema.includes[0].schema.is_some());
        assert!(schema.imports[0].schema.is_none());
    }

    #[test]
    fn rejects_invalid_documents() {
        assert!(matches!(
            Schema::parse("<xs:schema"),
            Err(SchemaParseError::Xml(_))
        ));
        assert!(matches!(
            Schema::parse("<notASchema/>"),
            Err(SchemaParseError::UnexpectedRoot { .. })
        ));
        assert!(matches!(
            Schema::parse(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                    <xs:complexType name="T"><xs:sequence>
                        <xs:element name="a" ref="b"/>
                    </xs:sequence></xs:complexType>
                </xs:schema>"#
            ),
            Err(SchemaParseError::Structure { .. })
        ));
        assert!(matches!(
            Schema::parse(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                    <xs:element name="a" maxOccurs="lots"/>
                </xs:schema>"#
            ),
            Err(SchemaParseError::InvalidAttribute { .. })
        ));
    }
}
