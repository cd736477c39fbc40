use std::collections::BTreeMap;

use roxmltree::Node;
use tracing::debug;

use super::builtins::XML_NAMESPACE;
use super::values::ActualValue;
use super::xstypes::{PrefixedName, QName};
use super::Schema;

/// Value of the `elementFormDefault`, `attributeFormDefault` and `form` attributes
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Form {
    Qualified,
    #[default]
    Unqualified,
}

impl ActualValue for Form {
    fn convert(src: &str) -> Option<Self> {
        match src.trim() {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }
}

/// Prefix to namespace URI bindings, as declared on a `<schema>` element.
///
/// The default namespace is stored under the empty prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    bindings: BTreeMap<String, String>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects all namespace declarations in scope at `node`.
    pub(super) fn from_node(node: Node) -> Self {
        let mut bindings = Self::new();
        for namespace in node.namespaces() {
            bindings.insert(namespace.name(), namespace.uri());
        }
        bindings
    }

    pub fn insert(&mut self, prefix: Option<&str>, uri: impl Into<String>) {
        self.bindings
            .insert(prefix.unwrap_or_default().to_string(), uri.into());
    }

    /// Resolves `prefix` to its URI; `None` looks up the default namespace.
    pub fn uri(&self, prefix: Option<&str>) -> Option<&str> {
        match prefix {
            // The prefix xml is by definition bound to the namespace name
            // http://www.w3.org/XML/1998/namespace. (Namespaces in XML 1.0, §3)
            Some("xml") => Some(XML_NAMESPACE),
            _ => self
                .bindings
                .get(prefix.unwrap_or_default())
                .map(String::as_str)
                .filter(|uri| !uri.is_empty()),
        }
    }

    /// Returns the preferred prefix bound to `uri`: a named prefix if there is one, otherwise
    /// `Some(None)` when `uri` is the default namespace.
    pub fn prefix_for(&self, uri: &str) -> Option<Option<&str>> {
        let mut default = false;
        for (prefix, bound) in &self.bindings {
            if bound == uri {
                if prefix.is_empty() {
                    default = true;
                } else {
                    return Some(Some(prefix));
                }
            }
        }
        default.then_some(None)
    }

    /// Adds the bindings of `other` whose prefix is not bound here yet.
    pub fn merge(&mut self, other: &NamespaceBindings) {
        for (prefix, uri) in &other.bindings {
            self.bindings
                .entry(prefix.clone())
                .or_insert_with(|| uri.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.bindings.iter().map(|(prefix, uri)| {
            (
                (!prefix.is_empty()).then_some(prefix.as_str()),
                uri.as_str(),
            )
        })
    }
}

/// Resolves names declared in, or referenced from, one schema document.
///
/// The registry is built per schema and per namespace context: a chameleon schema (one without a
/// `targetNamespace`) gets the namespace of the schema that pulled it in as its effective target
/// namespace.
#[derive(Clone, Debug)]
pub struct NamespaceRegistry {
    bindings: NamespaceBindings,
    target_namespace: Option<String>,
    chameleon: bool,
    element_form_default: Form,
    attribute_form_default: Form,
}

impl NamespaceRegistry {
    pub fn new(schema: &Schema, effective_namespace: Option<&str>) -> Self {
        let chameleon = schema.target_namespace.is_none();
        let target_namespace = schema
            .target_namespace
            .as_deref()
            .or(effective_namespace)
            .map(str::to_string);
        Self {
            bindings: schema.namespaces.clone(),
            target_namespace,
            chameleon,
            element_form_default: schema.element_form_default,
            attribute_form_default: schema.attribute_form_default,
        }
    }

    pub fn bindings(&self) -> &NamespaceBindings {
        &self.bindings
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Binds the prefix of a reference (`ref`, `type`, `base`, ...) to its namespace.
    ///
    /// Unprefixed names use the default namespace; in a chameleon schema without a default
    /// namespace they belong to the adopted target namespace. A prefix that is not declared
    /// yields an unqualified name, which the resolver may still match by local name.
    pub fn expand(&self, name: &PrefixedName) -> QName {
        let namespace = match name.prefix.as_deref() {
            Some(prefix) => {
                let uri = self.bindings.uri(Some(prefix));
                if uri.is_none() {
                    debug!(prefix, name = %name, "reference uses an undeclared prefix");
                }
                uri
            }
            None => self.bindings.uri(None).or(if self.chameleon {
                self.target_namespace()
            } else {
                None
            }),
        };
        QName::with_optional_namespace(namespace, name.local_name.as_str())
    }

    /// The expanded name of an element declaration.
    ///
    /// Global declarations are always in the target namespace; local ones only if they are
    /// qualified, either explicitly via `form` or through `elementFormDefault`.
    pub fn element_name(&self, local_name: &str, global: bool, form: Option<Form>) -> QName {
        self.declared_name(local_name, global, form.unwrap_or(self.element_form_default))
    }

    /// Same as [`Self::element_name()`], governed by `attributeFormDefault`.
    pub fn attribute_name(&self, local_name: &str, global: bool, form: Option<Form>) -> QName {
        self.declared_name(
            local_name,
            global,
            form.unwrap_or(self.attribute_form_default),
        )
    }

    fn declared_name(&self, local_name: &str, global: bool, form: Form) -> QName {
        if global || form == Form::Qualified {
            QName::with_optional_namespace(self.target_namespace(), local_name)
        } else {
            QName::unqualified(local_name)
        }
    }
}
