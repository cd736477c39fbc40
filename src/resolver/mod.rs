//! Merging of a schema graph into one [`ResolvedSchema`].
//!
//! Resolution walks the imported, included and redefined documents breadth-first, registers
//! every top-level declaration in its namespace context and then constructs all components
//! into typed arenas. Group references are inlined, substitution groups expanded and
//! inheritance chains flattened along the way, so that consumers never need to look anything up
//! by name again.

mod components;
mod context;
mod memo;
mod model;

pub use components::{Arena, Component, Ref};
pub use memo::resolve_schema;
pub use model::{
    Attribute, ComplexType, ComplexTypeId, Content, Element, ElementId, ElementTerm, ElementUse,
    Group, LocalElement, Particle, ResolvedSchema, SimpleType, SimpleTypeId, SimpleVariety,
    TypeRef,
};

use tracing::debug;

use crate::error::ResolveError;
use crate::xsd::Schema;

/// Uncached schema resolution; see [`resolve_schema()`] for the memoized variant.
pub struct Resolver;

impl Resolver {
    /// Merges `schema` with every schema linked to its directives.
    pub fn resolve(schema: &Schema) -> Result<ResolvedSchema, ResolveError> {
        let units = context::collect_units(schema);
        debug!(
            target_namespace = ?schema.target_namespace,
            documents = units.len(),
            "resolving schema"
        );
        let resolved = context::ResolutionContext::new(&units)?.finish()?;
        debug!(
            elements = resolved.elements.len(),
            complex_types = resolved.complex_types.len(),
            simple_types = resolved.simple_types.len(),
            "resolved schema"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{ReferenceKind, UnresolvedReason};
    use crate::xsd::{builtins::Primitive, QName};

    fn resolve(xsd: &str) -> Result<ResolvedSchema, ResolveError> {
        Resolver::resolve(&Schema::parse(xsd).unwrap())
    }

    fn linked(mut parent: Schema, location: &str, child: &str) -> Schema {
        let child = Arc::new(Schema::parse(child).unwrap());
        assert!(parent.link(location, child) > 0);
        parent
    }

    #[test]
    fn restriction_chain_keeps_primitive_and_enumerations() {
        let resolved = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t"
                    xmlns:t="urn:t">
                <xs:simpleType name="StatusType">
                    <xs:restriction base="xs:string">
                        <xs:enumeration value="draft"/>
                        <xs:enumeration value="active"/>
                    </xs:restriction>
                </xs:simpleType>
                <xs:simpleType name="Narrowed">
                    <xs:restriction base="t:StatusType"/>
                </xs:simpleType>
                <xs:simpleType name="Count">
                    <xs:restriction base="xs:nonNegativeInteger"/>
                </xs:simpleType>
            </xs:schema>"#,
        )
        .unwrap();

        let Some(TypeRef::Simple(narrowed)) =
            resolved.find_type(&QName::with_namespace("urn:t", "Narrowed"))
        else {
            panic!("expected a simple type");
        };
        let SimpleVariety::Atomic {
            primitive,
            enumerations,
        } = &resolved.simple_type(narrowed).variety
        else {
            panic!("expected an atomic type");
        };
        assert_eq!(*primitive, Primitive::String);
        assert_eq!(enumerations, &["draft", "active"]);

        let Some(TypeRef::Simple(count)) = resolved.find_type_by_local_name("Count") else {
            panic!("expected a simple type");
        };
        assert!(matches!(
            resolved.simple_type(count).variety,
            SimpleVariety::Atomic {
                primitive: Primitive::Integer,
                ..
            }
        ));
    }

    #[test]
    fn conflicting_includes_are_rejected() {
        let parent = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:include schemaLocation="a.xsd"/>
                <xs:simpleType name="Code"><xs:restriction base="xs:string"/></xs:simpleType>
            </xs:schema>"#,
        )
        .unwrap();
        let parent = linked(
            parent,
            "a.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:simpleType name="Code"><xs:restriction base="xs:int"/></xs:simpleType>
            </xs:schema>"#,
        );
        assert_eq!(
            Resolver::resolve(&parent).unwrap_err(),
            ResolveError::ConflictingDefinition {
                kind: ReferenceKind::Type,
                name: QName::unqualified("Code"),
            }
        );
    }

    #[test]
    fn identical_duplicates_are_merged() {
        let parent = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:include schemaLocation="a.xsd"/>
                <xs:simpleType name="Code"><xs:restriction base="xs:string"/></xs:simpleType>
            </xs:schema>"#,
        )
        .unwrap();
        let parent = linked(
            parent,
            "a.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:simpleType name="Code"><xs:restriction base="xs:string"/></xs:simpleType>
            </xs:schema>"#,
        );
        let resolved = Resolver::resolve(&parent).unwrap();
        assert!(resolved.find_type_by_local_name("Code").is_some());
    }

    #[test]
    fn cyclic_base_chain_is_an_error() {
        let error = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="A">
                    <xs:complexContent><xs:extension base="B"/></xs:complexContent>
                </xs:complexType>
                <xs:complexType name="B">
                    <xs:complexContent><xs:extension base="A"/></xs:complexContent>
                </xs:complexType>
            </xs:schema>"#,
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ResolveError::UnresolvedReference {
                kind: ReferenceKind::Type,
                reason: UnresolvedReason::Cycle,
                ..
            }
        ));
    }

    #[test]
    fn cyclic_groups_are_an_error() {
        let error = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:group name="A"><xs:sequence><xs:group ref="B"/></xs:sequence></xs:group>
                <xs:group name="B"><xs:sequence><xs:group ref="A"/></xs:sequence></xs:group>
                <xs:complexType name="T"><xs:group ref="A"/></xs:complexType>
            </xs:schema>"#,
        )
        .unwrap_err();
        assert!(matches!(
            error,
            ResolveError::UnresolvedReference {
                kind: ReferenceKind::Group,
                reason: UnresolvedReason::Cycle,
                ..
            }
        ));
    }

    #[test]
    fn recursive_element_types_are_allowed() {
        let resolved = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="Node">
                    <xs:sequence>
                        <xs:element name="child" type="Node" minOccurs="0" maxOccurs="unbounded"/>
                    </xs:sequence>
                </xs:complexType>
                <xs:element name="tree" type="Node"/>
            </xs:schema>"#,
        )
        .unwrap();
        let tree = resolved.find_element_by_local_name("tree").unwrap();
        assert_eq!(
            resolved.element(tree).type_,
            resolved.find_type_by_local_name("Node").unwrap()
        );
    }

    #[test]
    fn local_derivations_of_the_enclosing_type_are_allowed() {
        let resolved = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="Node">
                    <xs:sequence>
                        <xs:element name="label" type="xs:string"/>
                        <xs:element name="child" minOccurs="0" maxOccurs="unbounded">
                            <xs:complexType>
                                <xs:complexContent>
                                    <xs:extension base="Node">
                                        <xs:sequence>
                                            <xs:element name="weight" type="xs:int"/>
                                        </xs:sequence>
                                    </xs:extension>
                                </xs:complexContent>
                            </xs:complexType>
                        </xs:element>
                    </xs:sequence>
                </xs:complexType>
                <xs:element name="tree" type="Node"/>
            </xs:schema>"#,
        )
        .unwrap();
        let Some(TypeRef::Complex(node)) = resolved.find_type_by_local_name("Node") else {
            panic!("Node is not a complex type");
        };
        let child = resolved.fields(node).get("child").unwrap().type_;
        let TypeRef::Complex(child) = child else {
            panic!("child is not of a complex type");
        };
        assert_eq!(resolved.complex_type(child).base, Some(TypeRef::Complex(node)));
        let keys: Vec<String> = resolved
            .fields(child)
            .iter()
            .map(|field| field.key().to_string())
            .collect();
        assert_eq!(keys, ["label", "child", "weight"]);
    }

    #[test]
    fn unknown_references_are_reported() {
        let error = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:element name="a" type="Missing"/>
            </xs:schema>"#,
        )
        .unwrap_err();
        assert_eq!(
            error,
            ResolveError::UnresolvedReference {
                kind: ReferenceKind::Type,
                name: QName::unqualified("Missing"),
                reason: UnresolvedReason::NotFound,
            }
        );
    }

    #[test]
    fn member_without_type_takes_head_type() {
        let resolved = resolve(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:element name="head" type="xs:int" abstract="true"/>
                <xs:element name="member" substitutionGroup="head"/>
            </xs:schema>"#,
        )
        .unwrap();
        let head = resolved.find_element_by_local_name("head").unwrap();
        let member = resolved.find_element_by_local_name("member").unwrap();
        assert_eq!(resolved.element(member).type_, resolved.element(head).type_);
        assert_eq!(resolved.element(member).substitution_group, Some(head));
        assert_eq!(resolved.substitutes(head), &[member]);
    }
}
