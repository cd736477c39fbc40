use std::fmt;

use roxmltree::Node;
use tracing::debug;

use super::{
    element_decl::ElementDeclaration,
    model_group::ModelGroup,
    position,
    values::{attribute, required_attribute, ActualValue},
    xstypes::PrefixedName,
    SchemaParseError,
};

/// The {max occurs} of a particle; `unbounded` is kept distinct from any count.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
    Unbounded,
    Count(u64),
}

impl Default for MaxOccurs {
    fn default() -> Self {
        Self::Count(1)
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Count(count) => write!(f, "{count}"),
        }
    }
}

impl ActualValue for MaxOccurs {
    fn convert(src: &str) -> Option<Self> {
        match src.trim() {
            "unbounded" => Some(Self::Unbounded),
            count => count.parse().ok().map(Self::Count),
        }
    }
}

impl MaxOccurs {
    pub fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unbounded, _) | (_, Self::Unbounded) => Self::Unbounded,
            (Self::Count(a), Self::Count(b)) => Self::Count(a.saturating_add(*b)),
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Count(0), _) | (_, Self::Count(0)) => Self::Count(0),
            (Self::Unbounded, _) | (_, Self::Unbounded) => Self::Unbounded,
            (Self::Count(a), Self::Count(b)) => Self::Count(a.saturating_mul(*b)),
        }
    }

    pub fn max(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unbounded, _) | (_, Self::Unbounded) => Self::Unbounded,
            (Self::Count(a), Self::Count(b)) => Self::Count((*a).max(*b)),
        }
    }

    /// Whether more than one occurrence is allowed.
    pub fn is_many(&self) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Count(count) => *count > 1,
        }
    }
}

/// An entry of a model group's particle list.
#[derive(Clone, Debug, PartialEq)]
pub enum Particle {
    Element(ElementDeclaration),
    Group(GroupReference),
    ModelGroup(ModelGroup),
}

/// A `<group ref="...">` occurring inside a content model
#[derive(Clone, Debug, PartialEq)]
pub struct GroupReference {
    pub ref_: PrefixedName,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
}

impl GroupReference {
    pub const TAG_NAME: &'static str = "group";

    pub(super) fn map_from_xml(group: Node) -> Result<Self, SchemaParseError> {
        let ref_ = required_attribute(group, "ref")?;
        let (min_occurs, max_occurs) = occurs(group)?;
        Ok(Self {
            ref_,
            min_occurs,
            max_occurs,
        })
    }
}

impl Particle {
    /// Maps a child of `<sequence>`, `<choice>` or `<all>`. Returns `None` for constructs outside
    /// the supported subset (wildcards, annotations).
    pub(super) fn map_from_xml(child: Node) -> Result<Option<Self>, SchemaParseError> {
        let particle = match child.tag_name().name() {
            ElementDeclaration::TAG_NAME => {
                Some(Self::Element(ElementDeclaration::map_from_local_xml(child)?))
            }
            GroupReference::TAG_NAME => Some(Self::Group(GroupReference::map_from_xml(child)?)),
            "sequence" | "choice" | "all" => {
                Some(Self::ModelGroup(ModelGroup::map_from_xml(child)?))
            }
            "annotation" => None,
            other => {
                debug!(element = other, position = %position(child), "ignoring particle");
                None
            }
        };
        Ok(particle)
    }
}

/// Reads `minOccurs`/`maxOccurs`, defaulting both to 1.
pub(super) fn occurs(node: Node) -> Result<(u64, MaxOccurs), SchemaParseError> {
    let min_occurs: u64 = attribute(node, "minOccurs")?.unwrap_or(1);
    let max_occurs: MaxOccurs = attribute(node, "maxOccurs")?.unwrap_or_default();
    if let MaxOccurs::Count(max) = max_occurs {
        if max < min_occurs {
            return Err(super::structure_error(
                node,
                format!("maxOccurs ({max}) is less than minOccurs ({min_occurs})"),
            ));
        }
    }
    Ok((min_occurs, max_occurs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_occurs_arithmetic() {
        let one = MaxOccurs::Count(1);
        let two = MaxOccurs::Count(2);
        assert_eq!(one.add(&two), MaxOccurs::Count(3));
        assert_eq!(two.mul(&two), MaxOccurs::Count(4));
        assert_eq!(one.max(&two), two);
        assert_eq!(one.add(&MaxOccurs::Unbounded), MaxOccurs::Unbounded);
        assert_eq!(
            MaxOccurs::Count(0).mul(&MaxOccurs::Unbounded),
            MaxOccurs::Count(0)
        );
    }

    #[test]
    fn unbounded_is_many() {
        assert!(MaxOccurs::Unbounded.is_many());
        assert!(MaxOccurs::Count(2).is_many());
        assert!(!MaxOccurs::Count(1).is_many());
        assert_eq!(MaxOccurs::convert("unbounded"), Some(MaxOccurs::Unbounded));
        assert_eq!(MaxOccurs::convert("3"), Some(MaxOccurs::Count(3)));
        assert_eq!(MaxOccurs::convert("many"), None);
    }
}
