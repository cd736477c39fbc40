use roxmltree::{Document, Node};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::value::{read_scalar, scalar};
use crate::error::ParseError;
use crate::resolver::{ComplexTypeId, ResolvedSchema, TypeRef};
use crate::walker::{Field, TEXT_FIELD};
use crate::xsd::builtins::XSI_NAMESPACE;
use crate::xsd::QName;

/// Reads an XML document into the data of its root element's content.
///
/// Elements and attributes are matched by local name; prefixes are not checked.
pub fn parse(schema: &ResolvedSchema, xml: &str) -> Result<Value, ParseError> {
    let document = Document::parse(xml)?;
    let root = document.root_element();
    let tag = root.tag_name();
    let id = schema
        .find_element(&QName::with_optional_namespace(tag.namespace(), tag.name()))
        .or_else(|| schema.find_element_by_local_name(tag.name()))
        .ok_or_else(|| ParseError::UnknownRootElement {
            name: tag.name().to_string(),
        })?;
    let element = schema.element(id);
    debug!(root = %element.name, "parsing document");

    let mut reader = Reader {
        schema,
        path: vec![tag.name().to_string()],
    };
    reader.value(
        root,
        element.type_,
        element.fixed.as_deref().or(element.default.as_deref()),
    )
}

struct Reader<'a> {
    schema: &'a ResolvedSchema,
    /// Local names from the root to the element being read
    path: Vec<String>,
}

impl Reader<'_> {
    fn value(
        &mut self,
        node: Node,
        type_: TypeRef,
        default: Option<&str>,
    ) -> Result<Value, ParseError> {
        if is_nil(node) {
            return Ok(Value::Null);
        }
        match type_ {
            TypeRef::Complex(id) => self.complex(node, id, default),
            TypeRef::Builtin(_) | TypeRef::Simple(_) => {
                let text = text_content(node);
                let text = match default {
                    Some(default) if text.is_empty() => default.to_string(),
                    _ => text,
                };
                self.scalar(type_, &text, None)
            }
        }
    }

    /// Reads the attributes, text and children of `node`; `default` stands in for missing
    /// simple content.
    fn complex(
        &mut self,
        node: Node,
        id: ComplexTypeId,
        default: Option<&str>,
    ) -> Result<Value, ParseError> {
        let fields = self.schema.fields(id);
        let mut object = Map::new();

        for field in &fields.attributes {
            let raw = node
                .attributes()
                .find(|attribute| attribute.name() == field.key())
                .map(|attribute| attribute.value());
            match raw.or(field.fixed.as_deref()).or(field.default.as_deref()) {
                Some(raw) => {
                    let value = self.scalar(field.type_, raw, Some(field.key()))?;
                    object.insert(field.key().to_string(), value);
                }
                None if field.is_required() => return Err(self.missing(field)),
                None => {}
            }
        }

        if let Some(field) = &fields.text {
            let text = text_content(node);
            let default = field.fixed.as_deref().or(field.default.as_deref()).or(default);
            let text = if text.is_empty() {
                default.map(str::to_string)
            } else {
                Some(text)
            };
            // An element without character data has no text value
            if let Some(text) = text {
                let value = self.scalar(field.type_, &text, Some(TEXT_FIELD))?;
                object.insert(TEXT_FIELD.to_string(), value);
            }
        }

        let children: Vec<Node> = node.children().filter(Node::is_element).collect();
        for field in &fields.elements {
            let mut matches = children
                .iter()
                .filter(|child| child.tag_name().name() == field.key());
            if field.is_array() {
                let mut items = Vec::new();
                for &child in matches {
                    items.push(self.child(child, field)?);
                }
                object.insert(field.key().to_string(), Value::Array(items));
            } else if let Some(&child) = matches.next() {
                let value = self.child(child, field)?;
                object.insert(field.key().to_string(), value);
            } else if field.is_required() {
                return Err(self.missing(field));
            }
        }

        for child in &children {
            let name = child.tag_name().name();
            if !fields.elements.iter().any(|field| field.key() == name) {
                trace!(path = %self.path.join("/"), name, "ignoring unmatched element");
            }
        }

        Ok(Value::Object(object))
    }

    fn child(&mut self, node: Node, field: &Field) -> Result<Value, ParseError> {
        self.path.push(field.key().to_string());
        let default = field.fixed.as_deref().or(field.default.as_deref());
        let result = self.value(node, field.type_, default);
        self.path.pop();
        result
    }

    /// Coerces `text`; `key` names the attribute or text field it was read from.
    fn scalar(&self, type_: TypeRef, text: &str, key: Option<&str>) -> Result<Value, ParseError> {
        read_scalar(scalar(self.schema, type_), text).ok_or_else(|| ParseError::TypeCoercion {
            path: match key {
                Some(key) => format!("{}/{}", self.path.join("/"), key),
                None => self.path.join("/"),
            },
            value: text.to_string(),
            expected: self.schema.type_name(type_),
        })
    }

    fn missing(&self, field: &Field) -> ParseError {
        ParseError::MissingRequiredField {
            path: self.path.join("/"),
            field: field.key().to_string(),
        }
    }
}

fn is_nil(node: Node) -> bool {
    matches!(node.attribute((XSI_NAMESPACE, "nil")), Some("true" | "1"))
}

/// The concatenated character data directly inside `node`
fn text_content(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::xsd::Schema;
    use serde_json::json;

    const LIBRARY: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns="urn:lib" targetNamespace="urn:lib" elementFormDefault="qualified">
        <xs:element name="library">
            <xs:complexType>
                <xs:sequence>
                    <xs:element name="book" minOccurs="0" maxOccurs="unbounded">
                        <xs:complexType>
                            <xs:sequence>
                                <xs:element name="title" type="xs:string"/>
                                <xs:element name="pages" type="xs:positiveInteger" minOccurs="0"/>
                                <xs:element name="tags" minOccurs="0">
                                    <xs:simpleType>
                                        <xs:list itemType="xs:NCName"/>
                                    </xs:simpleType>
                                </xs:element>
                            </xs:sequence>
                            <xs:attribute name="available" type="xs:boolean" default="true"/>
                            <xs:attribute name="isbn" type="xs:string" use="required"/>
                        </xs:complexType>
                    </xs:element>
                </xs:sequence>
                <xs:attribute name="version" type="xs:decimal" fixed="1.0"/>
            </xs:complexType>
        </xs:element>
    </xs:schema>"#;

    fn schema() -> ResolvedSchema {
        Resolver::resolve(&Schema::parse(LIBRARY).unwrap()).unwrap()
    }

    #[test]
    fn reads_nested_content_by_local_name() {
        let data = parse(
            &schema(),
            r#"<l:library xmlns:l="urn:lib">
                <l:book isbn="1" available="0">
                    <l:title>Dune</l:title>
                    <l:pages>412</l:pages>
                    <l:tags>scifi classic</l:tags>
                    <l:unknown/>
                </l:book>
                <l:book isbn="2"><l:title/></l:book>
            </l:library>"#,
        )
        .unwrap();
        assert_eq!(
            data,
            json!({
                "version": 1.0,
                "book": [
                    {
                        "available": false,
                        "isbn": "1",
                        "title": "Dune",
                        "pages": 412,
                        "tags": ["scifi", "classic"],
                    },
                    {"available": true, "isbn": "2", "title": ""},
                ],
            })
        );
    }

    #[test]
    fn unbounded_fields_are_empty_arrays_when_absent() {
        let data = parse(&schema(), r#"<library xmlns="urn:lib"/>"#).unwrap();
        assert_eq!(data, json!({"version": 1.0, "book": []}));
    }

    #[test]
    fn missing_required_fields_carry_their_path() {
        let error = parse(
            &schema(),
            r#"<library xmlns="urn:lib"><book isbn="1"><pages>3</pages></book></library>"#,
        )
        .unwrap_err();
        let ParseError::MissingRequiredField { path, field } = error else {
            panic!("expected a missing field, got {error:?}");
        };
        assert_eq!((path.as_str(), field.as_str()), ("library/book", "title"));

        let error = parse(&schema(), r#"<library xmlns="urn:lib"><book/></library>"#).unwrap_err();
        assert!(matches!(
            error,
            ParseError::MissingRequiredField { ref field, .. } if field == "isbn"
        ));
    }

    #[test]
    fn coercion_failures_carry_their_path() {
        let error = parse(
            &schema(),
            r#"<library xmlns="urn:lib"><book isbn="1"><title>x</title><pages>many</pages></book></library>"#,
        )
        .unwrap_err();
        let ParseError::TypeCoercion {
            path,
            value,
            expected,
        } = error
        else {
            panic!("expected a coercion error, got {error:?}");
        };
        assert_eq!(path, "library/book/pages");
        assert_eq!(value, "many");
        assert_eq!(expected, "xs:positiveInteger");
    }

    #[test]
    fn unknown_roots_and_malformed_documents() {
        assert!(matches!(
            parse(&schema(), "<shelf/>"),
            Err(ParseError::UnknownRootElement { ref name }) if name == "shelf"
        ));
        assert!(matches!(
            parse(&schema(), "<library>"),
            Err(ParseError::Xml(_))
        ));
    }
}
