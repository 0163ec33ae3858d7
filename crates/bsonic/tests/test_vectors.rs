//! Tests using the `wire_vectors.json` test vectors.
//!
//! Each vector is the full frame of a one-element document. Every vector
//! is decoded through `Document::from_bytes` + `get`; vectors for
//! encodable types are additionally re-encoded through `Document::set`
//! and must reproduce the wire bytes exactly.

use serde::Deserialize;

use bsonic::{BinarySubtype, Bson, Document, ObjectId};

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

#[derive(Deserialize)]
struct TestVectors {
    empty: Vec<EmptyTest>,
    double: Vec<DoubleTest>,
    string: Vec<StringTest>,
    int32: Vec<Int32Test>,
    int64: Vec<Int64Test>,
    boolean: Vec<BooleanTest>,
    null: Vec<KeyOnlyTest>,
    objectid: Vec<ObjectIdTest>,
    datetime: Vec<DateTimeTest>,
    binary: Vec<BinaryTest>,
    timestamp: Vec<TimestampTest>,
    regex: Vec<RegexTest>,
    decimal128: Vec<Decimal128Test>,
    minkey: Vec<KeyOnlyTest>,
    maxkey: Vec<KeyOnlyTest>,
    code: Vec<CodeTest>,
    code_with_scope: Vec<CodeTest>,
    document: Vec<DocumentTest>,
    array: Vec<ArrayTest>,
    symbol: Vec<StringTest>,
    undefined: Vec<KeyOnlyTest>,
    dbpointer: Vec<DbPointerTest>,
}

#[derive(Deserialize)]
struct EmptyTest {
    bytes: String,
}

#[derive(Deserialize)]
struct DoubleTest {
    bytes: String,
    key: String,
    value: f64,
}

#[derive(Deserialize)]
struct StringTest {
    bytes: String,
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct Int32Test {
    bytes: String,
    key: String,
    value: i32,
}

#[derive(Deserialize)]
struct Int64Test {
    bytes: String,
    key: String,
    value: i64,
}

#[derive(Deserialize)]
struct BooleanTest {
    bytes: String,
    key: String,
    value: bool,
}

#[derive(Deserialize)]
struct KeyOnlyTest {
    bytes: String,
    key: String,
}

#[derive(Deserialize)]
struct ObjectIdTest {
    bytes: String,
    key: String,
    hex: String,
}

#[derive(Deserialize)]
struct DateTimeTest {
    bytes: String,
    key: String,
    millis: i64,
}

#[derive(Deserialize)]
struct BinaryTest {
    bytes: String,
    key: String,
    subtype: u8,
    hex: String,
}

#[derive(Deserialize)]
struct TimestampTest {
    bytes: String,
    key: String,
    t: u32,
    i: u32,
}

#[derive(Deserialize)]
struct RegexTest {
    bytes: String,
    key: String,
    pattern: String,
    options: String,
}

#[derive(Deserialize)]
struct Decimal128Test {
    bytes: String,
    key: String,
    string: String,
}

#[derive(Deserialize)]
struct CodeTest {
    bytes: String,
    key: String,
    code: String,
}

#[derive(Deserialize)]
struct DocumentTest {
    bytes: String,
    key: String,
    inner_key: String,
    inner_value: i32,
}

#[derive(Deserialize)]
struct ArrayTest {
    bytes: String,
    key: String,
    values: Vec<i32>,
}

#[derive(Deserialize)]
struct DbPointerTest {
    bytes: String,
    key: String,
    collection: String,
    id_hex: String,
}

fn load_test_vectors() -> TestVectors {
    let json = include_str!("testdata/wire_vectors.json");
    serde_json::from_str(json).expect("failed to parse test vectors")
}

fn decode(bytes_hex: &str) -> Document {
    Document::from_bytes(hex_to_bytes(bytes_hex)).expect("failed to adopt frame")
}

/// Decode the vector, re-encode its single entry through `set`, and
/// require byte-for-byte identical output.
fn assert_reencodes(bytes_hex: &str, key: &str) {
    let doc = decode(bytes_hex);
    let value = doc.get(key).unwrap().expect("vector key missing");
    let mut rebuilt = Document::new();
    rebuilt.set(key, value).unwrap();
    assert_eq!(
        rebuilt.as_bytes(),
        hex_to_bytes(bytes_hex).as_slice(),
        "re-encode mismatch for {bytes_hex}"
    );
}

#[test]
fn test_empty_vectors() {
    for test in &load_test_vectors().empty {
        let doc = decode(&test.bytes);
        assert!(doc.is_empty());
        assert_eq!(doc.get("anything").unwrap(), None);
        assert_eq!(doc.to_string(), "{}");
        assert_eq!(doc.as_bytes(), hex_to_bytes(&test.bytes).as_slice());
    }
}

#[test]
fn test_double_vectors() {
    for test in &load_test_vectors().double {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::Double(d)) => assert!(
                (d - test.value).abs() < f64::EPSILON,
                "wrong value for {}: {d}",
                test.bytes
            ),
            other => panic!("expected double for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_string_vectors() {
    for test in &load_test_vectors().string {
        let doc = decode(&test.bytes);
        assert_eq!(
            doc.get(&test.key).unwrap(),
            Some(Bson::String(test.value.clone())),
            "wrong value for {}",
            test.bytes
        );
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_int32_vectors() {
    for test in &load_test_vectors().int32 {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::Int32(test.value)));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_int64_vectors() {
    for test in &load_test_vectors().int64 {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::Int64(test.value)));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_boolean_vectors() {
    for test in &load_test_vectors().boolean {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::Boolean(test.value)));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_null_vectors() {
    for test in &load_test_vectors().null {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::Null));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_objectid_vectors() {
    for test in &load_test_vectors().objectid {
        let doc = decode(&test.bytes);
        let expected = ObjectId::parse_str(&test.hex).unwrap();
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::ObjectId(expected)));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_datetime_vectors() {
    for test in &load_test_vectors().datetime {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::DateTime(dt)) => assert_eq!(dt.timestamp_millis(), test.millis),
            other => panic!("expected datetime for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_binary_vectors() {
    for test in &load_test_vectors().binary {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::Binary(b)) => {
                assert_eq!(b.subtype, BinarySubtype::from(test.subtype));
                assert_eq!(b.bytes, hex_to_bytes(&test.hex));
            }
            other => panic!("expected binary for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_timestamp_vectors() {
    for test in &load_test_vectors().timestamp {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::Timestamp(ts)) => {
                assert_eq!(ts.time, test.t);
                assert_eq!(ts.increment, test.i);
            }
            other => panic!("expected timestamp for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_regex_vectors() {
    for test in &load_test_vectors().regex {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::RegularExpression(r)) => {
                assert_eq!(r.pattern, test.pattern);
                assert_eq!(r.options, test.options);
            }
            other => panic!("expected regex for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_decimal128_vectors() {
    for test in &load_test_vectors().decimal128 {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::Decimal128(d)) => assert_eq!(d.to_string(), test.string),
            other => panic!("expected decimal128 for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_key_sentinel_vectors() {
    let vectors = load_test_vectors();
    for test in &vectors.minkey {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::MinKey));
        assert_reencodes(&test.bytes, &test.key);
    }
    for test in &vectors.maxkey {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::MaxKey));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_code_vectors() {
    for test in &load_test_vectors().code {
        let doc = decode(&test.bytes);
        assert_eq!(
            doc.get(&test.key).unwrap(),
            Some(Bson::JavaScriptCode(test.code.clone()))
        );
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_code_with_scope_vectors() {
    for test in &load_test_vectors().code_with_scope {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::JavaScriptCodeWithScope(c)) => {
                assert_eq!(c.code, test.code);
                assert!(c.scope.is_empty());
            }
            other => panic!("expected code with scope for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_document_vectors() {
    for test in &load_test_vectors().document {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::Document(inner)) => {
                assert_eq!(
                    inner.get(&test.inner_key).unwrap(),
                    Some(Bson::Int32(test.inner_value))
                );
            }
            other => panic!("expected document for {}, got {other:?}", test.bytes),
        }
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_array_vectors() {
    for test in &load_test_vectors().array {
        let doc = decode(&test.bytes);
        let expected: Vec<Bson> = test.values.iter().map(|&v| Bson::Int32(v)).collect();
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::Array(expected)));
        assert_reencodes(&test.bytes, &test.key);
    }
}

#[test]
fn test_symbol_normalizes_to_string() {
    for test in &load_test_vectors().symbol {
        let doc = decode(&test.bytes);
        assert_eq!(
            doc.get(&test.key).unwrap(),
            Some(Bson::String(test.value.clone())),
            "symbol did not normalize for {}",
            test.bytes
        );
    }
}

#[test]
fn test_undefined_normalizes_to_null() {
    for test in &load_test_vectors().undefined {
        let doc = decode(&test.bytes);
        assert_eq!(doc.get(&test.key).unwrap(), Some(Bson::Null));
    }
}

#[test]
fn test_dbpointer_normalizes_to_ref_document() {
    for test in &load_test_vectors().dbpointer {
        let doc = decode(&test.bytes);
        match doc.get(&test.key).unwrap() {
            Some(Bson::Document(dbref)) => {
                assert_eq!(
                    dbref.get("$ref").unwrap(),
                    Some(Bson::String(test.collection.clone()))
                );
                assert_eq!(
                    dbref.get("$id").unwrap(),
                    Some(Bson::ObjectId(ObjectId::parse_str(&test.id_hex).unwrap()))
                );
            }
            other => panic!("expected dbref document for {}, got {other:?}", test.bytes),
        }
    }
}

#[test]
fn test_all_vectors_survive_adopt_round_trip() {
    let json = include_str!("testdata/wire_vectors.json");
    let raw: serde_json::Value = serde_json::from_str(json).unwrap();
    for entries in raw.as_object().unwrap().values() {
        for entry in entries.as_array().unwrap() {
            let bytes = hex_to_bytes(entry["bytes"].as_str().unwrap());
            let doc = Document::from_bytes(bytes.clone()).unwrap();
            assert_eq!(doc.into_bytes(), bytes);
        }
    }
}
