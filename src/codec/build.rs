use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::value::{format_scalar, scalar};
use crate::error::BuildError;
use crate::resolver::{ElementId, ResolvedSchema, TypeRef};
use crate::walker::{Field, TEXT_FIELD};
use crate::xsd::builtins::XML_NAMESPACE;
use crate::xsd::{PrefixedName, QName};

/// Options of [`build()`].
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Emit an `<?xml ...?>` declaration
    pub xml_decl: bool,
    /// The encoding named in the declaration; the output is always UTF-8 text
    pub encoding: String,
    /// Indent nested elements by two spaces
    pub pretty: bool,
    /// Local name of the top-level element to emit, skipping root selection
    pub root_element: Option<String>,
    /// Prefix to bind the root element's namespace to
    pub prefix: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            xml_decl: true,
            encoding: "utf-8".to_string(),
            pretty: false,
            root_element: None,
            prefix: None,
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn xml_decl(mut self, xml_decl: bool) -> Self {
        self.xml_decl = xml_decl;
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn root_element(mut self, root_element: impl Into<String>) -> Self {
        self.root_element = Some(root_element.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Serializes `data`, the content of the root element, to an XML document.
pub fn build(
    schema: &ResolvedSchema,
    data: &Value,
    options: &BuildOptions,
) -> Result<String, BuildError> {
    let root = select_root(schema, data, options.root_element.as_deref())?;
    let element = schema.element(root);
    debug!(root = %element.name, "building document");

    let writer = if options.pretty {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };
    let mut builder = Builder {
        schema,
        writer,
        scopes: Scopes::default(),
        generated_prefixes: 0,
        path: Vec::new(),
    };

    if options.xml_decl {
        builder.writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some(options.encoding.as_str()),
            None,
        )))?;
    }
    builder.element(
        &element.name,
        element.type_,
        data,
        options.prefix.as_deref().filter(|prefix| !prefix.is_empty()),
    )?;

    Ok(String::from_utf8(builder.writer.into_inner())?)
}

/// Picks the top-level element `data` is the content of.
fn select_root(
    schema: &ResolvedSchema,
    data: &Value,
    explicit: Option<&str>,
) -> Result<ElementId, BuildError> {
    if let Some(name) = explicit {
        let local_name = PrefixedName::parse(name).local_name;
        return schema
            .find_element_by_local_name(&local_name)
            .ok_or_else(|| BuildError::UnknownRootElement {
                name: name.to_string(),
            });
    }

    let candidates: Vec<ElementId> = schema
        .elements()
        .filter(|(_, element)| !element.abstract_)
        .map(|(id, _)| id)
        .collect();
    if let [single] = candidates.as_slice() {
        return Ok(*single);
    }

    let keys: Vec<&String> = data.as_object().map(|o| o.keys().collect()).unwrap_or_default();
    let mut best: Vec<ElementId> = Vec::new();
    let mut best_score = 0;
    for &id in &candidates {
        let score = match schema.element(id).type_ {
            TypeRef::Complex(type_id) => {
                let fields = schema.fields(type_id);
                keys.iter().filter(|key| fields.get(key).is_some()).count()
            }
            TypeRef::Builtin(_) | TypeRef::Simple(_) => 0,
        };
        trace!(element = %schema.element(id).name, score, "root candidate");
        if score > best_score {
            best_score = score;
            best.clear();
        }
        if score == best_score && score > 0 {
            best.push(id);
        }
    }

    match best.as_slice() {
        [winner] => Ok(*winner),
        _ => {
            let tied = if best.is_empty() { &candidates } else { &best };
            Err(BuildError::AmbiguousRootElement {
                candidates: tied
                    .iter()
                    .map(|&id| schema.element(id).name.local_name.clone())
                    .collect(),
            })
        }
    }
}

/// A namespace declaration; `uri: None` undeclares the default namespace.
#[derive(Debug)]
struct Binding {
    prefix: Option<String>,
    uri: Option<String>,
}

/// The namespace declarations in scope, one frame per open element.
#[derive(Debug, Default)]
struct Scopes {
    frames: Vec<Vec<Binding>>,
}

impl Scopes {
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn declare(&mut self, prefix: Option<String>, uri: Option<String>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(Binding { prefix, uri });
        }
    }

    fn current(&self) -> &[Binding] {
        self.frames.last().map(Vec::as_slice).unwrap_or_default()
    }

    /// The URI `prefix` is bound to; `None` for the default namespace.
    fn uri(&self, prefix: Option<&str>) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|binding| binding.prefix.as_deref() == prefix)
            .and_then(|binding| binding.uri.as_deref())
    }

    /// The innermost prefix in scope for `uri` that is not shadowed by a later declaration.
    fn prefix_for(&self, uri: &str, named_only: bool) -> Option<Option<String>> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .filter(|binding| binding.uri.as_deref() == Some(uri))
            .filter(|binding| !named_only || binding.prefix.is_some())
            .find(|binding| self.uri(binding.prefix.as_deref()) == Some(uri))
            .map(|binding| binding.prefix.clone())
    }
}

struct Builder<'a> {
    schema: &'a ResolvedSchema,
    writer: Writer<Vec<u8>>,
    scopes: Scopes,
    generated_prefixes: usize,
    /// Local names from the root to the element being written
    path: Vec<String>,
}

impl Builder<'_> {
    fn element(
        &mut self,
        name: &QName,
        type_: TypeRef,
        value: &Value,
        prefix: Option<&str>,
    ) -> Result<(), BuildError> {
        self.path.push(name.local_name.clone());
        self.scopes.push();
        let result = self.write_element(name, type_, value, prefix);
        self.scopes.pop();
        self.path.pop();
        result
    }

    fn write_element(
        &mut self,
        name: &QName,
        type_: TypeRef,
        value: &Value,
        prefix: Option<&str>,
    ) -> Result<(), BuildError> {
        let tag = self.element_tag(name, prefix);

        let fields = match type_ {
            TypeRef::Complex(id) => Some(self.schema.fields(id)),
            TypeRef::Builtin(_) | TypeRef::Simple(_) => None,
        };
        let mut attributes = Vec::new();
        let mut text = None;
        let mut children: Vec<(&Field, &Value)> = Vec::new();

        match (&fields, value) {
            (Some(fields), Value::Object(object)) => {
                for field in &fields.attributes {
                    if let Some(value) = present(object, field.key()) {
                        let name = self.attribute_name(&field.name);
                        let formatted = self.format(field, value)?;
                        attributes.push((name, formatted));
                    }
                }
                if let Some(field) = &fields.text {
                    if let Some(value) = present(object, TEXT_FIELD) {
                        text = Some(self.format(field, value)?);
                    }
                }
                for field in &fields.elements {
                    match present(object, field.key()) {
                        Some(Value::Array(items)) if items.iter().all(Value::is_null) => {}
                        Some(value) => children.push((field, value)),
                        None => {}
                    }
                }
                for key in object.keys() {
                    if fields.get(key).is_none() {
                        trace!(path = %self.path.join("/"), key, "ignoring unknown key");
                    }
                }
            }
            // A bare value is the text of a simple-content type
            (Some(fields), value) => match &fields.text {
                Some(field) => text = Some(self.format(field, value)?),
                None => return Err(self.coercion(type_, value)),
            },
            (None, value) => {
                text = Some(
                    format_scalar(scalar(self.schema, type_), value)
                        .ok_or_else(|| self.coercion(type_, value))?,
                )
            }
        }

        let mut start = BytesStart::new(tag.as_str());
        for binding in self.scopes.current() {
            let attribute = match &binding.prefix {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            start.push_attribute((attribute.as_str(), binding.uri.as_deref().unwrap_or("")));
        }
        for (name, value) in &attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        let text = text.filter(|text| !text.is_empty());
        if text.is_none() && children.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        self.writer.write_event(Event::Start(start))?;
        if let Some(text) = &text {
            self.writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for (field, value) in children {
            match value {
                Value::Array(items) => {
                    for item in items.iter().filter(|item| !item.is_null()) {
                        self.element(&field.name, field.type_, item, None)?;
                    }
                }
                value => self.element(&field.name, field.type_, value, None)?,
            }
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        Ok(())
    }

    /// The tag of an element named `name`, declaring its namespace in the current frame if it is
    /// not in scope yet.
    fn element_tag(&mut self, name: &QName, prefix: Option<&str>) -> String {
        let Some(uri) = name.namespace() else {
            if self.scopes.uri(None).is_some() {
                self.scopes.declare(None, None);
            }
            return name.local_name.clone();
        };

        if prefix.is_none() {
            if let Some(prefix) = self.scopes.prefix_for(uri, false) {
                return qualified(prefix.as_deref(), &name.local_name);
            }
        }

        let prefix = prefix.map(str::to_string).or_else(|| {
            match self.schema.namespaces().prefix_for(uri) {
                Some(Some(prefix)) if self.scopes.uri(Some(prefix)).is_none() => {
                    Some(prefix.to_string())
                }
                _ => None,
            }
        });
        trace!(namespace = uri, prefix = ?prefix, "declaring element namespace");
        self.scopes.declare(prefix.clone(), Some(uri.to_string()));
        qualified(prefix.as_deref(), &name.local_name)
    }

    /// Qualified attributes need a named prefix; the default namespace does not apply to them.
    fn attribute_name(&mut self, name: &QName) -> String {
        let uri = match name.namespace() {
            None => return name.local_name.clone(),
            Some(XML_NAMESPACE) => return qualified(Some("xml"), &name.local_name),
            Some(uri) => uri,
        };
        if let Some(Some(prefix)) = self.scopes.prefix_for(uri, true) {
            return qualified(Some(&prefix), &name.local_name);
        }

        let prefix = match self.schema.namespaces().prefix_for(uri) {
            Some(Some(prefix)) if self.scopes.uri(Some(prefix)).is_none() => prefix.to_string(),
            _ => self.generate_prefix(),
        };
        self.scopes
            .declare(Some(prefix.clone()), Some(uri.to_string()));
        qualified(Some(&prefix), &name.local_name)
    }

    fn generate_prefix(&mut self) -> String {
        loop {
            self.generated_prefixes += 1;
            let prefix = format!("ns{}", self.generated_prefixes);
            if self.scopes.uri(Some(&prefix)).is_none() {
                return prefix;
            }
        }
    }

    fn format(&self, field: &Field, value: &Value) -> Result<String, BuildError> {
        format_scalar(scalar(self.schema, field.type_), value).ok_or_else(|| {
            BuildError::TypeCoercion {
                path: format!("{}/{}", self.path.join("/"), field.key()),
                value: value.to_string(),
                expected: self.schema.type_name(field.type_),
            }
        })
    }

    fn coercion(&self, type_: TypeRef, value: &Value) -> BuildError {
        BuildError::TypeCoercion {
            path: self.path.join("/"),
            value: value.to_string(),
            expected: self.schema.type_name(type_),
        }
    }
}

/// The value under `key`, unless it is absent or null
fn present<'v>(object: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.to_string(),
    }
}
