use std::collections::HashMap;
use std::sync::{Arc, Weak};

use lazy_static::lazy_static;
use parking_lot::RwLock;
use tracing::trace;

use super::{ResolvedSchema, Resolver};
use crate::error::ResolveError;
use crate::xsd::Schema;

struct MemoEntry {
    schema: Weak<Schema>,
    resolved: Arc<ResolvedSchema>,
}

lazy_static! {
    /// Resolved schemas keyed by the address of the unresolved schema they were built from.
    ///
    /// The `Weak` keeps the allocation (and thus the address) from being reused while the entry
    /// exists; entries whose schema is gone are swept on insert.
    static ref RESOLVED: RwLock<HashMap<usize, MemoEntry>> = RwLock::new(HashMap::new());
}

/// Resolves `schema`, reusing the result of an earlier call for the same `Arc`.
///
/// Concurrent first calls may both resolve; the last one to finish is kept.
pub fn resolve_schema(schema: &Arc<Schema>) -> Result<Arc<ResolvedSchema>, ResolveError> {
    let key = Arc::as_ptr(schema) as usize;
    if let Some(entry) = RESOLVED.read().get(&key) {
        if entry.schema.strong_count() > 0 {
            trace!(key, "reusing resolved schema");
            return Ok(Arc::clone(&entry.resolved));
        }
    }

    let resolved = Arc::new(Resolver::resolve(schema)?);

    let mut table = RESOLVED.write();
    table.retain(|_, entry| entry.schema.strong_count() > 0);
    table.insert(
        key,
        MemoEntry {
            schema: Arc::downgrade(schema),
            resolved: Arc::clone(&resolved),
        },
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TypeRef;

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
        <xs:element name="a" type="xs:string"/>
    </xs:schema>"#;

    #[test]
    fn same_schema_resolves_once() {
        let schema = Arc::new(Schema::parse(XSD).unwrap());
        let first = resolve_schema(&schema).unwrap();
        let second = resolve_schema(&schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = Arc::new(Schema::parse(XSD).unwrap());
        let third = resolve_schema(&other).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn dropped_schemas_are_evicted() {
        let schema = Arc::new(Schema::parse(XSD).unwrap());
        let key = Arc::as_ptr(&schema) as usize;
        resolve_schema(&schema).unwrap();
        drop(schema);

        // Any insert sweeps dead entries
        let other = Arc::new(Schema::parse(XSD).unwrap());
        resolve_schema(&other).unwrap();
        assert!(!RESOLVED.read().contains_key(&key) || Arc::as_ptr(&other) as usize == key);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn resolved_schemas_are_shareable() {
        assert_send_sync::<ResolvedSchema>();
        assert_send_sync::<Arc<Schema>>();
    }

    #[test]
    fn concurrent_callers_agree() {
        let schema = Arc::new(
            Schema::parse(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                    <xs:complexType name="Point">
                        <xs:sequence>
                            <xs:element name="x" type="xs:int"/>
                            <xs:element name="y" type="xs:int"/>
                        </xs:sequence>
                        <xs:attribute name="label" type="xs:string"/>
                    </xs:complexType>
                    <xs:element name="point" type="Point"/>
                </xs:schema>"#,
            )
            .unwrap(),
        );

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let resolved = resolve_schema(&schema).unwrap();
                        let Some(TypeRef::Complex(id)) = resolved.find_type_by_local_name("Point")
                        else {
                            panic!("Point is not a complex type");
                        };
                        let fields = resolved.fields(id);
                        (resolved, fields)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        let (_, expected) = &results[0];
        let keys: Vec<&str> = expected.iter().map(|field| field.key()).collect();
        assert_eq!(keys, ["label", "x", "y"]);
        for (_, fields) in &results {
            assert_eq!(fields.as_ref(), expected.as_ref());
        }

        // Later calls all see the one entry that won
        let kept = resolve_schema(&schema).unwrap();
        assert!(Arc::ptr_eq(&kept, &resolve_schema(&schema).unwrap()));
        assert!(results.iter().any(|(resolved, _)| Arc::ptr_eq(resolved, &kept)));
    }
}
