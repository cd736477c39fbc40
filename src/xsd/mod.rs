//! Structural model of XSD documents and the parser producing it.
//!
//! Each schema document is mapped on its own; references between components are kept as
//! written ([`PrefixedName`]) and only bound by the [resolver](crate::resolver).

mod annotation;
pub mod attribute_decl;
pub mod attribute_group_def;
pub mod builtins;
pub mod complex_type_def;
pub mod element_decl;
pub mod import;
pub mod model_group;
pub mod model_group_def;
pub mod namespaces;
pub mod particle;
pub mod schema;
pub mod simple_type_def;
pub mod xstypes;

mod values;

pub use attribute_decl::{AttributeDeclaration, AttributeItem, AttributeUse};
pub use attribute_group_def::AttributeGroupDefinition;
pub use complex_type_def::{ComplexTypeDefinition, ContentModel, Derivation, DerivationMethod};
pub use element_decl::{ElementDeclaration, InlineType};
pub use import::{Import, Include, Redefine};
pub use model_group::{Compositor, ModelGroup};
pub use model_group_def::ModelGroupDefinition;
pub use namespaces::{Form, NamespaceBindings, NamespaceRegistry};
pub use particle::{GroupReference, MaxOccurs, Particle};
pub use schema::{ParseOptions, Schema};
pub use simple_type_def::{Restriction, SimpleTypeDefinition, SimpleVariety};
pub use xstypes::{PrefixedName, QName};

pub use crate::error::SchemaParseError;

use builtins::XS_NAMESPACE;
use roxmltree::{Node, TextPos};

/// Row/column of `node` in its source document, for error reporting.
pub(crate) fn position(node: Node) -> TextPos {
    node.document().text_pos_at(node.range().start)
}

/// The element children of `node` that belong to the XSD namespace.
///
/// Anything else (tool-specific extension elements, text, comments) does not participate in the
/// model.
pub(crate) fn xs_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|child| child.is_element() && child.tag_name().namespace() == Some(XS_NAMESPACE))
}

pub(crate) fn xs_child<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    xs_children(node).find(|child| child.tag_name().name() == name)
}

fn structure_error(node: Node, message: impl Into<String>) -> SchemaParseError {
    SchemaParseError::Structure {
        element: node.tag_name().name().to_string(),
        position: position(node),
        message: message.into(),
    }
}
