//! Loading of schema documents and linking of their directives.
//!
//! The [`SchemaLoader`] fetches a document through the first [`SchemaSource`] that handles its
//! location, parses it and recursively loads every `schemaLocation` referenced by an `import`,
//! `include` or `redefine`, linking the loaded child into the directive. The result is the
//! linked schema graph the [`Resolver`](crate::resolver::Resolver) consumes.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LoadError;
use crate::xsd::{ParseOptions, Schema};

/// Provides the text of documents by location.
pub trait SchemaSource {
    /// Returns `Ok(None)` if this source does not handle `location`.
    fn fetch(&self, location: &str) -> Result<Option<String>, LoadError>;
}

/// Reads local files; handles every location that is not an HTTP(S) URL.
#[derive(Clone, Debug, Default)]
pub struct FileSource;

impl SchemaSource for FileSource {
    fn fetch(&self, location: &str) -> Result<Option<String>, LoadError> {
        if is_url(location) {
            return Ok(None);
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|source| LoadError::Io {
                location: location.to_string(),
                source,
            })
    }
}

/// Fetches HTTP(S) URLs with a blocking client.
#[cfg(feature = "http")]
#[derive(Clone, Debug, Default)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl SchemaSource for HttpSource {
    fn fetch(&self, location: &str) -> Result<Option<String>, LoadError> {
        if !is_url(location) {
            return Ok(None);
        }
        let http_error = |source| LoadError::Http {
            location: location.to_string(),
            source,
        };
        let response = self
            .client
            .get(location)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(http_error)?;
        response.text().map(Some).map_err(http_error)
    }
}

/// Documents registered up front, looked up by their exact location.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(location.into(), text.into());
    }

    pub fn with(mut self, location: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(location, text);
        self
    }
}

impl SchemaSource for MemorySource {
    fn fetch(&self, location: &str) -> Result<Option<String>, LoadError> {
        Ok(self.documents.get(location).cloned())
    }
}

/// Loads schema documents together with every document they reference.
///
/// Each location is loaded once per loader; a document referenced again while it is still
/// being loaded (a cyclic include) is left unlinked at that point, which the resolver tolerates
/// since the document is part of the graph already.
pub struct SchemaLoader {
    sources: Vec<Box<dyn SchemaSource>>,
    options: ParseOptions,
    loaded: HashMap<String, Arc<Schema>>,
    in_progress: HashSet<String>,
}

impl SchemaLoader {
    pub fn new(sources: Vec<Box<dyn SchemaSource>>) -> Self {
        Self {
            sources,
            options: ParseOptions::default(),
            loaded: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// A loader reading local files and, with the `http` feature, HTTP(S) URLs.
    pub fn with_default_sources() -> Self {
        let mut sources: Vec<Box<dyn SchemaSource>> = Vec::new();
        #[cfg(feature = "http")]
        sources.push(Box::new(HttpSource::new()));
        sources.push(Box::new(FileSource));
        Self::new(sources)
    }

    pub fn parse_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetches the text at `location` from the first source handling it.
    pub fn fetch(&self, location: &str) -> Result<String, LoadError> {
        for source in &self.sources {
            if let Some(text) = source.fetch(location)? {
                return Ok(text);
            }
        }
        Err(LoadError::UnsupportedLocation {
            location: location.to_string(),
        })
    }

    /// Loads the schema at `location` and, recursively, all documents it references.
    pub fn load(&mut self, location: &str) -> Result<Arc<Schema>, LoadError> {
        if let Some(schema) = self.loaded.get(location) {
            return Ok(Arc::clone(schema));
        }

        let text = self.fetch(location)?;
        let mut schema =
            Schema::parse_with_options(&text, &self.options).map_err(|source| LoadError::Parse {
                location: location.to_string(),
                source,
            })?;
        debug!(location, target_namespace = ?schema.target_namespace, "loaded schema");

        self.in_progress.insert(location.to_string());
        let directives: Vec<String> = schema.directive_locations().map(str::to_string).collect();
        let result = self.link_directives(location, &mut schema, &directives);
        self.in_progress.remove(location);
        result?;

        let schema = Arc::new(schema);
        self.loaded
            .insert(location.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    fn link_directives(
        &mut self,
        location: &str,
        schema: &mut Schema,
        directives: &[String],
    ) -> Result<(), LoadError> {
        for directive in directives {
            let child_location = join_location(location, directive);
            if self.in_progress.contains(&child_location) {
                debug!(
                    location,
                    directive = directive.as_str(),
                    "skipping cyclic reference"
                );
                continue;
            }
            let child = self.load(&child_location)?;
            if schema.link(directive, child) == 0 {
                warn!(location, directive = directive.as_str(), "directive was not linked");
            }
        }
        Ok(())
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Resolves `relative` against the location of the document referencing it.
fn join_location(base: &str, relative: &str) -> String {
    if is_url(relative) || relative.starts_with("file://") || Path::new(relative).is_absolute() {
        return relative.to_string();
    }
    if is_url(base) {
        return match base.rfind('/') {
            Some(index) => format!("{}/{}", &base[..index], relative),
            None => relative.to_string(),
        };
    }
    let base = base.strip_prefix("file://").unwrap_or(base);
    match Path::new(base).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(relative).to_string_lossy().into_owned()
        }
        _ => relative.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_locations() {
        assert_eq!(
            join_location("https://example.com/xsd/main.xsd", "common.xsd"),
            "https://example.com/xsd/common.xsd"
        );
        assert_eq!(
            join_location("schemas/adt/main.xsd", "core.xsd"),
            Path::new("schemas/adt").join("core.xsd").to_string_lossy()
        );
        assert_eq!(join_location("main.xsd", "core.xsd"), "core.xsd");
        assert_eq!(
            join_location("main.xsd", "http://example.com/x.xsd"),
            "http://example.com/x.xsd"
        );
    }

    #[test]
    fn loads_and_links_directives() {
        let source = MemorySource::new()
            .with(
                "main.xsd",
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:m">
                    <xs:include schemaLocation="common.xsd"/>
                    <xs:import namespace="urn:x" schemaLocation="x.xsd"/>
                </xs:schema>"#,
            )
            .with(
                "common.xsd",
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                    <xs:include schemaLocation="main.xsd"/>
                </xs:schema>"#,
            )
            .with(
                "x.xsd",
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x"/>"#,
            );
        let mut loader = SchemaLoader::new(vec![Box::new(source)]);
        let schema = loader.load("main.xsd").unwrap();

        let common = schema.includes[0].schema.as_ref().unwrap();
        // The cyclic back reference stays unlinked
        assert!(common.includes[0].schema.is_none());
        let imported = schema.imports[0].schema.as_ref().unwrap();
        assert_eq!(imported.target_namespace.as_deref(), Some("urn:x"));

        // Loaded documents are reused
        assert!(Arc::ptr_eq(&schema, &loader.load("main.xsd").unwrap()));
    }

    #[test]
    fn reports_missing_documents() {
        let source = MemorySource::new().with(
            "main.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:include schemaLocation="gone.xsd"/>
            </xs:schema>"#,
        );
        let mut loader = SchemaLoader::new(vec![Box::new(source)]);
        assert!(matches!(
            loader.load("main.xsd"),
            Err(LoadError::UnsupportedLocation { location }) if location == "gone.xsd"
        ));
    }

    #[test]
    fn reports_parse_failures_with_location() {
        let source = MemorySource::new().with("bad.xsd", "<xs:schema");
        let mut loader = SchemaLoader::new(vec![Box::new(source)]);
        assert!(matches!(
            loader.load("bad.xsd"),
            Err(LoadError::Parse { location, .. }) if location == "bad.xsd"
        ));
    }

    #[test]
    fn file_source_reads_local_files() {
        let path = std::env::temp_dir().join("xsd-codec-loader-test.xsd");
        std::fs::write(
            &path,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:f"/>"#,
        )
        .unwrap();
        let mut loader = SchemaLoader::new(vec![Box::new(FileSource)]);
        let schema = loader.load(&path.to_string_lossy()).unwrap();
        assert_eq!(schema.target_namespace.as_deref(), Some("urn:f"));
        assert!(FileSource.fetch("https://example.com/a.xsd").unwrap().is_none());
        std::fs::remove_file(path).unwrap();
    }
}
