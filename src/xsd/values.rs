use roxmltree::Node;

use super::xstypes::PrefixedName;
use super::{position, SchemaParseError};

/// Conversion of an attribute's normalized value to its actual value.
pub(super) trait ActualValue: Sized {
    fn convert(src: &str) -> Option<Self>;
}

impl ActualValue for String {
    fn convert(src: &str) -> Option<Self> {
        Some(src.to_string())
    }
}

impl ActualValue for PrefixedName {
    fn convert(src: &str) -> Option<Self> {
        let name = PrefixedName::parse(src);
        (!name.local_name.is_empty()).then_some(name)
    }
}

impl<T: ActualValue> ActualValue for Vec<T> {
    fn convert(src: &str) -> Option<Self> {
        // NOTE: This assumes a list with whiteSpace="collapse"
        src.split_ascii_whitespace().map(T::convert).collect()
    }
}

impl ActualValue for bool {
    fn convert(src: &str) -> Option<Self> {
        match src.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ActualValue for u64 {
    fn convert(src: &str) -> Option<Self> {
        src.trim().parse().ok()
    }
}

/// Reads the optional, unqualified attribute `name` of `node`.
///
/// Attributes in foreign namespaces never match, since roxmltree only matches unqualified
/// attributes for a plain local name.
pub(super) fn attribute<T: ActualValue>(
    node: Node,
    name: &str,
) -> Result<Option<T>, SchemaParseError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(None);
    };
    T::convert(raw)
        .map(Some)
        .ok_or_else(|| SchemaParseError::InvalidAttribute {
            element: node.tag_name().name().to_string(),
            attribute: name.to_string(),
            value: raw.to_string(),
            position: position(node),
        })
}

pub(super) fn required_attribute<T: ActualValue>(
    node: Node,
    name: &str,
) -> Result<T, SchemaParseError> {
    attribute(node, name)?.ok_or_else(|| SchemaParseError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute: name.to_string(),
        position: position(node),
    })
}
