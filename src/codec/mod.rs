//! Schema-directed conversion between XML documents and [`serde_json::Value`] data.
//!
//! A complex element is represented as an object keyed by the local names of its effective
//! fields (see [`crate::walker`]); attributes and child elements share the key space, and the
//! text of a simple-content type is stored under [`TEXT_FIELD`](crate::walker::TEXT_FIELD).
//! Fields allowing more than one occurrence are always arrays.

mod build;
mod parse;
mod value;

pub use build::{build, BuildOptions};
pub use parse::parse;
