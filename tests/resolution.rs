use std::sync::Arc;

use xsd_codec::error::{ReferenceKind, ResolveError};
use xsd_codec::loader::{MemorySource, SchemaLoader};
use xsd_codec::resolver::TypeRef;
use xsd_codec::walker::TypeFields;
use xsd_codec::xsd::{MaxOccurs, QName};
use xsd_codec::{resolve_schema, ResolvedSchema, Schema};

fn load(documents: &[(&str, &str)]) -> Arc<Schema> {
    let mut source = MemorySource::new();
    for (location, text) in documents {
        source.insert(*location, *text);
    }
    let mut loader = SchemaLoader::new(vec![Box::new(source)]);
    loader.load(documents[0].0).unwrap()
}

fn resolve(documents: &[(&str, &str)]) -> Arc<ResolvedSchema> {
    resolve_schema(&load(documents)).unwrap()
}

fn fields(schema: &ResolvedSchema, type_name: &str) -> Arc<TypeFields> {
    match schema.find_type_by_local_name(type_name) {
        Some(TypeRef::Complex(id)) => schema.fields(id),
        other => panic!("{type_name} is not a complex type: {other:?}"),
    }
}

fn element_names(fields: &TypeFields) -> Vec<&str> {
    fields.elements.iter().map(|f| f.key()).collect()
}

fn attribute_names(fields: &TypeFields) -> Vec<&str> {
    fields.attributes.iter().map(|f| f.key()).collect()
}

const CHAMELEON_ROOT: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:adtcore="http://www.sap.com/adt/core" targetNamespace="http://www.sap.com/adt/core"
        elementFormDefault="qualified">
    <xs:include schemaLocation="templatelink.xsd"/>
    <xs:complexType name="adtObject">
        <xs:sequence>
            <xs:element ref="adtcore:templateLink" minOccurs="0" maxOccurs="unbounded"/>
        </xs:sequence>
        <xs:attribute name="name" type="xs:string"/>
    </xs:complexType>
</xs:schema>"#;

const CHAMELEON_LINK: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:complexType name="linkType">
        <xs:attribute name="href" type="xs:anyURI" use="required"/>
        <xs:attribute name="rel" type="xs:string"/>
    </xs:complexType>
    <xs:element name="templateLink" type="linkType"/>
</xs:schema>"#;

#[test]
fn chameleon_include_adopts_the_including_namespace() {
    let schema = resolve(&[
        ("adtcore.xsd", CHAMELEON_ROOT),
        ("templatelink.xsd", CHAMELEON_LINK),
    ]);
    let namespace = "http://www.sap.com/adt/core";
    assert_eq!(schema.target_namespace(), Some(namespace));

    let link = schema
        .find_element(&QName::with_namespace(namespace, "templateLink"))
        .expect("templateLink is absorbed into the including namespace");
    assert_eq!(
        schema.element(link).type_,
        schema
            .find_type(&QName::with_namespace(namespace, "linkType"))
            .unwrap()
    );

    // ref="templateLink" takes name and type from the referenced declaration
    let object = fields(&schema, "adtObject");
    let field = &object.elements[0];
    assert_eq!(field.name, QName::with_namespace(namespace, "templateLink"));
    assert_eq!(schema.type_name(field.type_), "linkType");
    assert_eq!((field.min_occurs, field.max_occurs), (0, MaxOccurs::Unbounded));
}

#[test]
fn target_namespace_is_never_inherited_from_imports() {
    let schema = resolve(&[
        (
            "root.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:x="urn:x">
                <xs:import namespace="urn:x" schemaLocation="x.xsd"/>
                <xs:element name="wrapper">
                    <xs:complexType>
                        <xs:sequence><xs:element ref="x:item"/></xs:sequence>
                    </xs:complexType>
                </xs:element>
            </xs:schema>"#,
        ),
        (
            "x.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x">
                <xs:element name="item" type="xs:string"/>
            </xs:schema>"#,
        ),
    ]);
    assert_eq!(schema.target_namespace(), None);
    assert!(schema
        .find_element(&QName::with_namespace("urn:x", "item"))
        .is_some());
    assert!(schema.find_element(&QName::unqualified("wrapper")).is_some());
}

const DDIC: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:ddic="urn:ddic" targetNamespace="urn:ddic">
    <xs:element name="Schema" type="ddic:SchemaType" abstract="true"/>
    <xs:complexType name="SchemaType">
        <xs:attribute name="name" type="xs:string"/>
    </xs:complexType>
    <xs:element name="DD01V" substitutionGroup="ddic:Schema">
        <xs:complexType>
            <xs:complexContent>
                <xs:extension base="ddic:SchemaType">
                    <xs:sequence><xs:element name="DOMNAME" type="xs:string"/></xs:sequence>
                </xs:extension>
            </xs:complexContent>
        </xs:complexType>
    </xs:element>
    <xs:element name="DD07V_TAB" substitutionGroup="ddic:Schema">
        <xs:complexType>
            <xs:complexContent>
                <xs:extension base="ddic:SchemaType">
                    <xs:sequence>
                        <xs:element name="DD07V" type="xs:string" maxOccurs="unbounded"/>
                    </xs:sequence>
                </xs:extension>
            </xs:complexContent>
        </xs:complexType>
    </xs:element>
    <xs:complexType name="Values">
        <xs:sequence>
            <xs:element ref="ddic:Schema" minOccurs="0" maxOccurs="unbounded"/>
        </xs:sequence>
    </xs:complexType>
</xs:schema>"#;

#[test]
fn abstract_heads_expand_to_their_substitutes() {
    let schema = resolve(&[("ddic.xsd", DDIC)]);

    let head = schema.find_element_by_local_name("Schema").unwrap();
    let members: Vec<&str> = schema
        .substitutes(head)
        .iter()
        .map(|&id| schema.element(id).name.local_name.as_str())
        .collect();
    assert_eq!(members, ["DD01V", "DD07V_TAB"]);

    let values = fields(&schema, "Values");
    assert_eq!(element_names(&values), ["DD01V", "DD07V_TAB"]);
    for field in &values.elements {
        assert_eq!((field.min_occurs, field.max_occurs), (0, MaxOccurs::Unbounded));
        assert!(field.is_array());
    }
}

#[test]
fn concrete_heads_stay_next_to_their_substitutes() {
    let schema = resolve(&[(
        "heads.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="note" type="xs:string"/>
            <xs:element name="warning" substitutionGroup="note"/>
            <xs:complexType name="Log">
                <xs:sequence><xs:element ref="note" maxOccurs="unbounded"/></xs:sequence>
            </xs:complexType>
        </xs:schema>"#,
    )]);
    let log = fields(&schema, "Log");
    assert_eq!(element_names(&log), ["note", "warning"]);
    assert_eq!(log.elements[0].min_occurs, 0);
}

const INHERITANCE: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:complexType name="BaseType">
        <xs:sequence>
            <xs:element name="id" type="xs:int"/>
            <xs:element name="label" type="xs:string" minOccurs="0"/>
        </xs:sequence>
        <xs:attribute name="version" type="xs:int"/>
        <xs:attribute name="lang" type="xs:language"/>
    </xs:complexType>
    <xs:complexType name="DerivedType">
        <xs:complexContent>
            <xs:extension base="BaseType">
                <xs:sequence><xs:element name="extra" type="xs:boolean"/></xs:sequence>
                <xs:attribute name="version" type="xs:string" use="required"/>
                <xs:attribute name="owner" type="xs:string"/>
            </xs:extension>
        </xs:complexContent>
    </xs:complexType>
    <xs:complexType name="RestrictedType">
        <xs:complexContent>
            <xs:restriction base="BaseType">
                <xs:sequence><xs:element name="id" type="xs:int"/></xs:sequence>
                <xs:attribute name="lang" use="prohibited"/>
            </xs:restriction>
        </xs:complexContent>
    </xs:complexType>
</xs:schema>"#;

#[test]
fn extension_appends_to_the_inherited_fields() {
    let schema = resolve(&[("inheritance.xsd", INHERITANCE)]);
    let derived = fields(&schema, "DerivedType");
    assert_eq!(element_names(&derived), ["id", "label", "extra"]);
    assert_eq!(attribute_names(&derived), ["version", "lang", "owner"]);
    // The redeclared attribute replaces the inherited one in place
    assert!(derived.attributes[0].is_required());
    assert_eq!(schema.type_name(derived.attributes[0].type_), "xs:string");
}

#[test]
fn base_fields_are_not_affected_by_derivations() {
    let schema = resolve(&[("inheritance.xsd", INHERITANCE)]);
    fields(&schema, "DerivedType");
    fields(&schema, "RestrictedType");

    let base = fields(&schema, "BaseType");
    assert_eq!(element_names(&base), ["id", "label"]);
    assert_eq!(attribute_names(&base), ["version", "lang"]);
    assert!(!base.attributes[0].is_required());
}

#[test]
fn restriction_replaces_content_and_prohibits_attributes() {
    let schema = resolve(&[("inheritance.xsd", INHERITANCE)]);
    let restricted = fields(&schema, "RestrictedType");
    assert_eq!(element_names(&restricted), ["id"]);
    assert_eq!(attribute_names(&restricted), ["version"]);
}

#[test]
fn groups_and_attribute_groups_are_inlined_in_place() {
    let schema = resolve(&[(
        "groups.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:group name="Address">
                <xs:sequence>
                    <xs:element name="street" type="xs:string"/>
                    <xs:element name="city" type="xs:string"/>
                </xs:sequence>
            </xs:group>
            <xs:attributeGroup name="Audit">
                <xs:attribute name="createdBy" type="xs:string"/>
                <xs:attribute name="createdAt" type="xs:dateTime"/>
            </xs:attributeGroup>
            <xs:complexType name="Customer">
                <xs:sequence>
                    <xs:element name="name" type="xs:string"/>
                    <xs:group ref="Address" minOccurs="0" maxOccurs="3"/>
                    <xs:element name="phone" type="xs:string"/>
                </xs:sequence>
                <xs:attribute name="id" type="xs:int"/>
                <xs:attributeGroup ref="Audit"/>
            </xs:complexType>
        </xs:schema>"#,
    )]);
    let customer = fields(&schema, "Customer");
    assert_eq!(element_names(&customer), ["name", "street", "city", "phone"]);
    assert_eq!(
        (customer.elements[1].min_occurs, customer.elements[1].max_occurs),
        (0, MaxOccurs::Count(3))
    );
    assert_eq!(attribute_names(&customer), ["id", "createdBy", "createdAt"]);
}

#[test]
fn redefine_extends_the_original_component() {
    let schema = resolve(&[
        (
            "main.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:redefine schemaLocation="person.xsd">
                    <xs:complexType name="Person">
                        <xs:complexContent>
                            <xs:extension base="Person">
                                <xs:sequence><xs:element name="email" type="xs:string"/></xs:sequence>
                            </xs:extension>
                        </xs:complexContent>
                    </xs:complexType>
                </xs:redefine>
                <xs:element name="person" type="Person"/>
            </xs:schema>"#,
        ),
        (
            "person.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="Person">
                    <xs:sequence><xs:element name="name" type="xs:string"/></xs:sequence>
                </xs:complexType>
            </xs:schema>"#,
        ),
    ]);
    assert_eq!(element_names(&fields(&schema, "Person")), ["name", "email"]);
}

#[test]
fn redefinitions_must_derive_from_themselves() {
    let schema = load(&[
        (
            "main.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:redefine schemaLocation="person.xsd">
                    <xs:complexType name="Person">
                        <xs:sequence><xs:element name="email" type="xs:string"/></xs:sequence>
                    </xs:complexType>
                </xs:redefine>
            </xs:schema>"#,
        ),
        (
            "person.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="Person"/>
            </xs:schema>"#,
        ),
    ]);
    assert_eq!(
        resolve_schema(&schema).unwrap_err(),
        ResolveError::InvalidRedefinition {
            name: QName::unqualified("Person")
        }
    );
}

#[test]
fn conflicting_definitions_across_includes_are_rejected() {
    let schema = load(&[
        (
            "a.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
                <xs:include schemaLocation="b.xsd"/>
                <xs:element name="item" type="xs:string"/>
            </xs:schema>"#,
        ),
        (
            "b.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
                <xs:element name="item" type="xs:int"/>
            </xs:schema>"#,
        ),
    ]);
    assert_eq!(
        resolve_schema(&schema).unwrap_err(),
        ResolveError::ConflictingDefinition {
            kind: ReferenceKind::Element,
            name: QName::with_namespace("urn:a", "item"),
        }
    );
}

#[test]
fn enumerations_keep_declaration_order() {
    let schema = resolve(&[(
        "status.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="StatusType">
                <xs:restriction base="xs:string">
                    <xs:enumeration value="draft"/>
                    <xs:enumeration value="active"/>
                    <xs:enumeration value="retired"/>
                </xs:restriction>
            </xs:simpleType>
        </xs:schema>"#,
    )]);
    let Some(TypeRef::Simple(id)) = schema.find_type_by_local_name("StatusType") else {
        panic!("StatusType is not a simple type");
    };
    let xsd_codec::resolver::SimpleVariety::Atomic { enumerations, .. } =
        &schema.simple_type(id).variety
    else {
        panic!("StatusType is not atomic");
    };
    assert_eq!(enumerations, &["draft", "active", "retired"]);
}
