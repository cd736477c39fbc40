use std::fmt;

pub type NCName = String;
pub type AnyURI = String;

/// An expanded name: a local name plus the namespace it belongs to (if any).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace_name: Option<AnyURI>,
    pub local_name: NCName,
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace_name) = self.namespace_name.as_ref() {
            write!(f, "{{{}}}:{}", namespace_name, self.local_name)
        } else {
            write!(f, "{}", self.local_name)
        }
    }
}

impl QName {
    pub fn with_namespace(
        namespace_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self::with_optional_namespace(Some(namespace_name), local_name)
    }

    pub fn with_optional_namespace(
        namespace_name: Option<impl Into<String>>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace_name: namespace_name.map(Into::into),
            local_name: local_name.into(),
        }
    }

    pub fn unqualified(local_name: impl Into<String>) -> Self {
        Self {
            namespace_name: None,
            local_name: local_name.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace_name.as_deref()
    }
}

/// A name as written in a `ref`, `type`, `base` or `substitutionGroup` attribute.
///
/// The prefix is kept verbatim; binding it to a namespace URI is deferred to the resolver, which
/// knows the namespace context the declaration ends up in (see chameleon schemas).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrefixedName {
    pub prefix: Option<String>,
    pub local_name: NCName,
}

impl PrefixedName {
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        match source.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local_name: local.to_string(),
            },
            None => Self {
                prefix: None,
                local_name: source.to_string(),
            },
        }
    }

    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for PrefixedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

pub type Sequence<T> = Vec<T>;
