//! Collection Resolver
//!
//! Turns the user-supplied `[database/]collection` identifiers into concrete
//! (database, collection) pairs, resolving unqualified names against the
//! connection's default database.

use crate::error::{Result, TailError};
use serde::{Deserialize, Serialize};

/// A fully qualified tailing target. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
    pub database: String,
    pub collection: String,
}

impl CollectionRef {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl std::fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.database, self.collection)
    }
}

/// Resolve raw identifiers into `CollectionRef`s, preserving input order.
///
/// Each identifier splits on the rightmost `/`: the part after it is the
/// collection, the part before it the database. Unqualified identifiers use
/// `default_database`.
pub fn resolve(
    raw_identifiers: &[String],
    default_database: Option<&str>,
) -> Result<Vec<CollectionRef>> {
    if raw_identifiers.is_empty() {
        return Err(TailError::Config(
            "at least one collection must be configured".to_string(),
        ));
    }

    raw_identifiers
        .iter()
        .map(|raw| {
            let (database, collection) = match raw.rsplit_once('/') {
                Some((db, coll)) => (db.to_string(), coll.to_string()),
                None => {
                    let db = default_database.ok_or_else(|| {
                        TailError::Config(format!(
                            "collection '{}' is unqualified and no default database is configured",
                            raw
                        ))
                    })?;
                    (db.to_string(), raw.clone())
                }
            };

            if database.is_empty() || collection.is_empty() {
                return Err(TailError::Config(format!(
                    "invalid collection identifier '{}'",
                    raw
                )));
            }

            Ok(CollectionRef { database, collection })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unqualified_uses_default_database() {
        let refs = resolve(&ids(&["coll"]), Some("mydb")).unwrap();
        assert_eq!(refs, vec![CollectionRef::new("mydb", "coll")]);
    }

    #[test]
    fn test_qualified_identifier() {
        let refs = resolve(&ids(&["db/coll"]), Some("mydb")).unwrap();
        assert_eq!(refs, vec![CollectionRef::new("db", "coll")]);
    }

    #[test]
    fn test_splits_on_rightmost_slash() {
        let refs = resolve(&ids(&["a/b/coll"]), None).unwrap();
        assert_eq!(refs, vec![CollectionRef::new("a/b", "coll")]);
    }

    #[test]
    fn test_preserves_input_order() {
        let refs = resolve(&ids(&["foo/bar", "baz/quux", "plain"]), Some("d")).unwrap();
        assert_eq!(
            refs,
            vec![
                CollectionRef::new("foo", "bar"),
                CollectionRef::new("baz", "quux"),
                CollectionRef::new("d", "plain"),
            ]
        );
    }

    #[test]
    fn test_empty_list_is_config_error() {
        let err = resolve(&[], Some("d")).unwrap_err();
        assert!(matches!(err, TailError::Config(_)));
    }

    #[test]
    fn test_unqualified_without_default_is_config_error() {
        let err = resolve(&ids(&["coll"]), None).unwrap_err();
        assert!(matches!(err, TailError::Config(_)));
    }

    #[test]
    fn test_empty_parts_are_config_errors() {
        assert!(resolve(&ids(&["/coll"]), Some("d")).is_err());
        assert!(resolve(&ids(&["db/"]), Some("d")).is_err());
    }
}
