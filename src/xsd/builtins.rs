use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use super::xstypes::QName;

// Namespaces defined by XML Schema Part 1, §1.3.1
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The lexical family a built-in datatype belongs to, as far as value coercion is concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Passed through verbatim (strings, dates, URIs, binary encodings, ...)
    String,
    Boolean,
    Integer,
    /// `xs:decimal`, `xs:float` and `xs:double`
    Decimal,
    /// `xs:anyType` and `xs:anySimpleType`; content is read and written as text
    Any,
}

/// A built-in datatype of XML Schema (pt. 2, §3)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinType {
    pub name: &'static str,
    pub primitive: Primitive,
}

impl BuiltinType {
    pub fn qname(&self) -> QName {
        QName::with_namespace(XS_NAMESPACE, self.name)
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.name)
    }
}

pub const ANY_TYPE: BuiltinType = BuiltinType {
    name: "anyType",
    primitive: Primitive::Any,
};

pub const ANY_SIMPLE_TYPE: BuiltinType = BuiltinType {
    name: "anySimpleType",
    primitive: Primitive::Any,
};

pub const STRING: BuiltinType = BuiltinType {
    name: "string",
    primitive: Primitive::String,
};

const STRING_TYPES: &[&str] = &[
    "string",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "NMTOKEN",
    "NMTOKENS",
    "ID",
    "IDREF",
    "IDREFS",
    "ENTITY",
    "ENTITIES",
    "NOTATION",
    "QName",
    "anyURI",
    "base64Binary",
    "hexBinary",
    "duration",
    "dayTimeDuration",
    "yearMonthDuration",
    "dateTime",
    "dateTimeStamp",
    "time",
    "date",
    "gYearMonth",
    "gYear",
    "gMonthDay",
    "gDay",
    "gMonth",
];

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "nonPositiveInteger",
    "negativeInteger",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
    "positiveInteger",
];

const DECIMAL_TYPES: &[&str] = &["decimal", "float", "double"];

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, BuiltinType> = {
        let mut builtins = HashMap::new();
        let families = [
            (STRING_TYPES, Primitive::String),
            (INTEGER_TYPES, Primitive::Integer),
            (DECIMAL_TYPES, Primitive::Decimal),
            (&["boolean"][..], Primitive::Boolean),
            (&["anyType", "anySimpleType", "anyAtomicType"][..], Primitive::Any),
        ];
        for (names, primitive) in families {
            for &name in names {
                builtins.insert(name, BuiltinType { name, primitive });
            }
        }
        builtins
    };
}

/// Looks up a built-in datatype by its local name in the XSD namespace.
pub fn lookup(local_name: &str) -> Option<BuiltinType> {
    BUILTINS.get(local_name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_primitive_families() {
        assert_eq!(lookup("int").map(|b| b.primitive), Some(Primitive::Integer));
        assert_eq!(lookup("boolean").map(|b| b.primitive), Some(Primitive::Boolean));
        assert_eq!(lookup("double").map(|b| b.primitive), Some(Primitive::Decimal));
        assert_eq!(lookup("dateTime").map(|b| b.primitive), Some(Primitive::String));
        assert_eq!(lookup("anyType"), Some(ANY_TYPE));
        assert_eq!(lookup("notAType"), None);
    }

    #[test]
    fn builtin_qname_is_in_xs_namespace() {
        assert_eq!(STRING.qname(), QName::with_namespace(XS_NAMESPACE, "string"));
        assert_eq!(STRING.to_string(), "xs:string");
    }
}
