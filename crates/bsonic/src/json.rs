//! Relaxed extended JSON rendering for documents.
//!
//! This is a one-way debug representation, not a serialization API; there
//! is no JSON-to-document direction. Types with no native JSON form use
//! the `$`-prefixed wrapper objects of the extended JSON convention.
//!
//! # Value Mapping
//!
//! | BSON           | JSON                                             |
//! |----------------|--------------------------------------------------|
//! | double         | number, or `{"$numberDouble"}` when non-finite   |
//! | string         | string                                           |
//! | document       | object                                           |
//! | array          | array                                            |
//! | binary         | `{"$binary": {"base64", "subType"}}`             |
//! | objectid       | `{"$oid"}`                                       |
//! | boolean        | true/false                                       |
//! | datetime       | `{"$date"}` (RFC 3339, or `$numberLong` when     |
//! |                | outside years 1970-9999)                         |
//! | null           | null                                             |
//! | regex          | `{"$regularExpression": {"pattern", "options"}}` |
//! | javascript     | `{"$code"}` (plus `"$scope"` when captured)      |
//! | int32 / int64  | number                                           |
//! | timestamp      | `{"$timestamp": {"t", "i"}}`                     |
//! | decimal128     | `{"$numberDecimal"}`                             |
//! | minkey/maxkey  | `{"$minKey": 1}` / `{"$maxKey": 1}`              |

use base64::Engine;
use serde_json::{Value as JsonValue, json};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::value::{Bson, DateTime};

/// Milliseconds of 9999-12-31T23:59:59.999Z, the last instant the plain
/// RFC 3339 form covers.
const MAX_RFC3339_MILLIS: i64 = 253_402_300_799_999;

/// Render a document as a relaxed extended JSON string.
///
/// # Errors
///
/// Returns an error if the document cannot be decoded or serialization
/// fails. `Document`'s `Display` impl maps that to an empty string.
pub fn to_relaxed_json(doc: &Document) -> Result<String> {
    let value = document_to_json(doc)?;
    serde_json::to_string(&value).map_err(|e| Error::JsonSerialize(e.to_string()))
}

fn document_to_json(doc: &Document) -> Result<JsonValue> {
    let mut obj = serde_json::Map::new();
    for entry in doc.iter() {
        let (key, value) = entry?;
        obj.insert(key, bson_to_json(&value)?);
    }
    Ok(JsonValue::Object(obj))
}

fn bson_to_json(value: &Bson) -> Result<JsonValue> {
    Ok(match value {
        Bson::Double(d) => {
            if d.is_finite() {
                serde_json::Number::from_f64(*d)
                    .map(JsonValue::Number)
                    .ok_or_else(|| Error::JsonSerialize(format!("unrepresentable double {d}")))?
            } else if d.is_nan() {
                json!({"$numberDouble": "NaN"})
            } else if *d > 0.0 {
                json!({"$numberDouble": "Infinity"})
            } else {
                json!({"$numberDouble": "-Infinity"})
            }
        }
        Bson::String(s) => JsonValue::String(s.clone()),
        Bson::Document(d) => document_to_json(d)?,
        Bson::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(bson_to_json(item)?);
            }
            JsonValue::Array(out)
        }
        Bson::Binary(b) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&b.bytes);
            json!({"$binary": {"base64": encoded, "subType": format!("{:02x}", u8::from(b.subtype))}})
        }
        Bson::ObjectId(oid) => json!({"$oid": oid.to_hex()}),
        Bson::Boolean(b) => JsonValue::Bool(*b),
        Bson::DateTime(dt) => datetime_to_json(*dt),
        Bson::Null => JsonValue::Null,
        Bson::RegularExpression(r) => {
            json!({"$regularExpression": {"pattern": r.pattern, "options": r.options}})
        }
        Bson::JavaScriptCode(code) => json!({"$code": code}),
        Bson::JavaScriptCodeWithScope(c) => {
            json!({"$code": c.code, "$scope": document_to_json(&c.scope)?})
        }
        Bson::Int32(i) => JsonValue::Number((*i).into()),
        Bson::Int64(i) => JsonValue::Number((*i).into()),
        Bson::Timestamp(ts) => json!({"$timestamp": {"t": ts.time, "i": ts.increment}}),
        Bson::Decimal128(d) => json!({"$numberDecimal": d.to_string()}),
        Bson::MinKey => json!({"$minKey": 1}),
        Bson::MaxKey => json!({"$maxKey": 1}),
    })
}

fn datetime_to_json(dt: DateTime) -> JsonValue {
    let millis = dt.timestamp_millis();
    if (0..=MAX_RFC3339_MILLIS).contains(&millis) {
        if let Some(text) = dt.to_rfc3339() {
            return json!({"$date": text});
        }
    }
    json!({"$date": {"$numberLong": millis.to_string()}})
}
