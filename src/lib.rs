//! Resolution of composed XML Schemas and schema-directed XML reading and writing.
//!
//! Schema documents are parsed into a structural [`Schema`] model, linked with the documents
//! their directives reference (see [`loader`]) and merged into one [`ResolvedSchema`]. The
//! resolved schema drives [`parse()`] and [`build()`], which convert between XML documents and
//! [`serde_json::Value`] data.
//!
//! ```
//! use std::sync::Arc;
//! use xsd_codec::{build, parse, resolve_schema, BuildOptions, Schema};
//!
//! let schema = Schema::parse(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!     <xs:element name="greeting">
//!         <xs:complexType>
//!             <xs:sequence><xs:element name="to" type="xs:string" maxOccurs="unbounded"/></xs:sequence>
//!         </xs:complexType>
//!     </xs:element>
//! </xs:schema>"#).unwrap();
//! let resolved = resolve_schema(&Arc::new(schema)).unwrap();
//!
//! let data = parse(&resolved, "<greeting><to>world</to></greeting>").unwrap();
//! assert_eq!(data, serde_json::json!({"to": ["world"]}));
//!
//! let xml = build(&resolved, &data, &BuildOptions::new().xml_decl(false)).unwrap();
//! assert_eq!(xml, "<greeting><to>world</to></greeting>");
//! ```

pub mod codec;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod walker;
pub mod xsd;

pub use codec::{build, parse, BuildOptions};
pub use error::Error;
pub use resolver::{resolve_schema, ResolvedSchema, Resolver};
pub use xsd::Schema;
