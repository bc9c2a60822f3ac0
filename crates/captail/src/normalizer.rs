//! Document Normalizer
//!
//! Converts BSON documents into a transport-safe shape: only null, booleans,
//! numbers, strings, arrays, and nested documents survive. Rich BSON types
//! are rendered as canonical strings so downstream consumers never see a
//! backend-proprietary value. Scalar types are preserved as-is.

use bson::{Bson, Document};

/// Normalize a document read from a tailed collection.
///
/// Pure and infallible for any well-formed document; idempotent on already
/// normalized input.
pub fn normalize(doc: &Document) -> Document {
    doc.iter()
        .map(|(key, value)| (key.clone(), normalize_value(value)))
        .collect()
}

fn normalize_value(value: &Bson) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(normalize(doc)),
        Bson::Array(items) => Bson::Array(items.iter().map(normalize_value).collect()),

        // Pass-through scalars.
        Bson::Null
        | Bson::Boolean(_)
        | Bson::Int32(_)
        | Bson::Int64(_)
        | Bson::Double(_)
        | Bson::String(_) => value.clone(),

        // Rich types render as canonical strings.
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        Bson::Binary(bin) => Bson::String(hex::encode(&bin.bytes)),
        Bson::DateTime(dt) => Bson::String(
            dt.to_chrono()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ),
        Bson::Timestamp(ts) => Bson::String(format!("{}:{}", ts.time, ts.increment)),
        Bson::RegularExpression(re) => {
            Bson::String(format!("/{}/{}", re.pattern, re.options))
        }
        Bson::JavaScriptCode(code) => Bson::String(code.clone()),
        Bson::JavaScriptCodeWithScope(cws) => Bson::String(cws.code.clone()),
        Bson::Symbol(s) => Bson::String(s.clone()),
        Bson::Decimal128(d) => Bson::String(d.to_string()),
        Bson::MinKey => Bson::String("MinKey".to_string()),
        Bson::MaxKey => Bson::String("MaxKey".to_string()),

        // Anything else (DbPointer, future additions) falls back to its
        // relaxed extended JSON rendering.
        other => Bson::String(other.clone().into_relaxed_extjson().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId, spec::BinarySubtype, Binary, Timestamp};

    #[test]
    fn test_scalars_pass_through_unchanged() {
        let input = doc! {
            "n": Bson::Null,
            "b": true,
            "i": 42_i32,
            "l": 42_i64,
            "f": 1.5_f64,
            "s": "hello",
        };
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn test_object_id_and_binary_become_strings() {
        let oid = ObjectId::new();
        let input = doc! {
            "id": oid,
            "blob": Binary { subtype: BinarySubtype::Generic, bytes: vec![0xde, 0xad, 0xbe, 0xef] },
            "count": 3_i32,
        };
        let out = normalize(&input);
        assert_eq!(out.get_str("id").unwrap(), oid.to_hex());
        assert_eq!(out.get_str("blob").unwrap(), "deadbeef");
        assert_eq!(out.get_i32("count").unwrap(), 3);
    }

    #[test]
    fn test_recurses_into_nested_documents_and_arrays() {
        let oid = ObjectId::new();
        let input = doc! {
            "outer": {
                "inner": { "ref": oid },
                "list": [Bson::Timestamp(Timestamp { time: 7, increment: 2 }), 1_i32],
            },
        };
        let out = normalize(&input);
        let inner = out.get_document("outer").unwrap().get_document("inner").unwrap();
        assert_eq!(inner.get_str("ref").unwrap(), oid.to_hex());

        let list = out.get_document("outer").unwrap().get_array("list").unwrap();
        assert_eq!(list[0], Bson::String("7:2".to_string()));
        assert_eq!(list[1], Bson::Int32(1));
    }

    #[test]
    fn test_idempotent_on_normalized_input() {
        let input = doc! {
            "id": ObjectId::new(),
            "ts": Bson::Timestamp(Timestamp { time: 1, increment: 1 }),
            "nested": { "min": Bson::MinKey, "keep": 9_i64 },
        };
        let once = normalize(&input);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sentinels_and_regex() {
        let input = doc! {
            "min": Bson::MinKey,
            "max": Bson::MaxKey,
            "re": Bson::RegularExpression(bson::Regex { pattern: "^a.*z$".into(), options: "i".into() }),
        };
        let out = normalize(&input);
        assert_eq!(out.get_str("min").unwrap(), "MinKey");
        assert_eq!(out.get_str("max").unwrap(), "MaxKey");
        assert_eq!(out.get_str("re").unwrap(), "/^a.*z$/i");
    }
}
