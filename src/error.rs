use std::fmt;

use roxmltree::TextPos;
use thiserror::Error;

use crate::xsd::QName;

/// Errors raised while mapping a single schema document.
#[derive(Debug, Error)]
pub enum SchemaParseError {
    #[error("the schema document is not well-formed XML")]
    Xml(#[from] roxmltree::Error),
    #[error("expected <xs:schema> as the document element, found <{found}> at {position}")]
    UnexpectedRoot { found: String, position: TextPos },
    #[error("invalid value {value:?} for attribute `{attribute}` of <{element}> at {position}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
        position: TextPos,
    },
    #[error("<{element}> at {position} is missing the required attribute `{attribute}`")]
    MissingAttribute {
        element: String,
        attribute: String,
        position: TextPos,
    },
    #[error("invalid <{element}> at {position}: {message}")]
    Structure {
        element: String,
        position: TextPos,
        message: String,
    },
}

/// The symbol space a reference is looked up in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Element,
    Attribute,
    /// Simple and complex type definitions share a symbol space
    Type,
    Group,
    AttributeGroup,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::Type => "type",
            Self::Group => "group",
            Self::AttributeGroup => "attribute group",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnresolvedReason {
    NotFound,
    /// The reference is part of a cyclic `base`, `group ref`, `attributeGroup ref` or
    /// `substitutionGroup` chain
    Cycle,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not found",
            Self::Cycle => "cyclic definition",
        })
    }
}

/// Errors raised while merging a schema graph into a [`ResolvedSchema`](crate::ResolvedSchema).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unresolved {kind} reference {name}: {reason}")]
    UnresolvedReference {
        kind: ReferenceKind,
        name: QName,
        reason: UnresolvedReason,
    },
    #[error("conflicting definitions for {kind} {name}")]
    ConflictingDefinition { kind: ReferenceKind, name: QName },
    #[error("the redefinition of {name} does not derive from its previous version")]
    InvalidRedefinition { name: QName },
}

impl ResolveError {
    pub(crate) fn not_found(kind: ReferenceKind, name: QName) -> Self {
        Self::UnresolvedReference {
            kind,
            name,
            reason: UnresolvedReason::NotFound,
        }
    }

    pub(crate) fn cycle(kind: ReferenceKind, name: QName) -> Self {
        Self::UnresolvedReference {
            kind,
            name,
            reason: UnresolvedReason::Cycle,
        }
    }
}

/// Errors raised while serializing data to XML.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot choose a root element, candidates: {}", candidates.join(", "))]
    AmbiguousRootElement { candidates: Vec<String> },
    #[error("no top-level element named `{name}`")]
    UnknownRootElement { name: String },
    #[error("cannot format {value} at `{path}` as {expected}")]
    TypeCoercion {
        path: String,
        value: String,
        expected: String,
    },
    #[error("failed to write XML")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to write XML")]
    Io(#[from] std::io::Error),
    #[error("the written document is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors raised while reading an XML document into data.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("the document is not well-formed XML")]
    Xml(#[from] roxmltree::Error),
    #[error("no top-level element matches the document element <{name}>")]
    UnknownRootElement { name: String },
    #[error("missing required field `{field}` at `{path}`")]
    MissingRequiredField { path: String, field: String },
    #[error("cannot read {value:?} at `{path}` as {expected}")]
    TypeCoercion {
        path: String,
        value: String,
        expected: String,
    },
}

/// Errors raised by the [`SchemaLoader`](crate::loader::SchemaLoader).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {location}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "http")]
    #[error("failed to fetch {location}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to parse {location}")]
    Parse {
        location: String,
        #[source]
        source: SchemaParseError,
    },
    #[error("no schema source can load {location}")]
    UnsupportedLocation { location: String },
}

/// Any error of this crate, for callers that do not need to tell the stages apart.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    SchemaParse(#[from] SchemaParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Load(#[from] LoadError),
}
