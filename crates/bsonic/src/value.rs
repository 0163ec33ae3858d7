//! The tagged value model.
//!
//! [`Bson`] is a closed sum type with one variant per encodable BSON type.
//! Every variant knows its wire tag ([`Bson::element_type`]) and how to
//! append itself to a buffer under a key ([`Bson::append_to`]); the decode
//! direction ([`Bson::from_element`]) dispatches on the tag of a raw
//! element view. Exhaustive matching at both sites means a new wire type
//! cannot be added without the compiler pointing at every dispatch.
//!
//! Deprecated wire types have no variant and normalize on read:
//! Undefined becomes [`Bson::Null`], Symbol becomes [`Bson::String`], and
//! DBPointer becomes a `{"$ref", "$id"}` document.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, TimeZone, Utc};

use crate::buffer::{RawDocBuf, RawElement};
use crate::decimal128::Decimal128;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::oid::ObjectId;
use crate::tag::{BinarySubtype, ElementType};

/// One decoded BSON field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Bson {
    /// 64-bit IEEE-754 floating point number.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Nested document with its own independent buffer.
    Document(Document),
    /// Ordered sequence, encoded as a document keyed "0", "1", ...
    Array(Vec<Bson>),
    /// Byte sequence with a subtype marker.
    Binary(Binary),
    /// 12-byte object identifier.
    ObjectId(ObjectId),
    /// Boolean.
    Boolean(bool),
    /// UTC datetime, signed milliseconds since epoch.
    DateTime(DateTime),
    /// Explicit null (also produced by deprecated Undefined on read).
    Null,
    /// Regular expression pattern plus options.
    RegularExpression(Regex),
    /// JavaScript code without scope.
    JavaScriptCode(String),
    /// JavaScript code with a captured-scope document.
    JavaScriptCodeWithScope(CodeWithScope),
    /// 32-bit signed integer. Never silently widened to Int64.
    Int32(i32),
    /// Replication timestamp: seconds plus ordinal increment.
    Timestamp(Timestamp),
    /// 64-bit signed integer. Never silently narrowed to Int32.
    Int64(i64),
    /// 128-bit decimal, full precision preserved.
    Decimal128(Decimal128),
    /// Sentinel ordered before every other value.
    MinKey,
    /// Sentinel ordered after every other value.
    MaxKey,
}

impl Bson {
    /// The wire type tag for this variant.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Bson::Double(_) => ElementType::Double,
            Bson::String(_) => ElementType::String,
            Bson::Document(_) => ElementType::EmbeddedDocument,
            Bson::Array(_) => ElementType::Array,
            Bson::Binary(_) => ElementType::Binary,
            Bson::ObjectId(_) => ElementType::ObjectId,
            Bson::Boolean(_) => ElementType::Boolean,
            Bson::DateTime(_) => ElementType::DateTime,
            Bson::Null => ElementType::Null,
            Bson::RegularExpression(_) => ElementType::RegularExpression,
            Bson::JavaScriptCode(_) => ElementType::JavaScriptCode,
            Bson::JavaScriptCodeWithScope(_) => ElementType::JavaScriptCodeWithScope,
            Bson::Int32(_) => ElementType::Int32,
            Bson::Timestamp(_) => ElementType::Timestamp,
            Bson::Int64(_) => ElementType::Int64,
            Bson::Decimal128(_) => ElementType::Decimal128,
            Bson::MinKey => ElementType::MinKey,
            Bson::MaxKey => ElementType::MaxKey,
        }
    }

    /// Append this value to a buffer as one correctly-tagged element.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid key or an interior NUL in a
    /// cstring-encoded field. Failure leaves the buffer unchanged; the
    /// caller must propagate it rather than continue.
    pub fn append_to(&self, buf: &mut RawDocBuf, key: &str) -> Result<()> {
        match self {
            Bson::Double(v) => buf.append_f64(key, *v),
            Bson::String(s) => buf.append_str(key, s),
            Bson::Document(d) => buf.append_document(key, d.as_bytes()),
            Bson::Array(items) => {
                let mut frame = RawDocBuf::new();
                for (i, item) in items.iter().enumerate() {
                    item.append_to(&mut frame, &i.to_string())?;
                }
                buf.append_array(key, frame.as_bytes())
            }
            Bson::Binary(b) => buf.append_binary(key, b.subtype, &b.bytes),
            Bson::ObjectId(oid) => buf.append_object_id(key, *oid),
            Bson::Boolean(v) => buf.append_bool(key, *v),
            Bson::DateTime(dt) => buf.append_datetime(key, dt.timestamp_millis()),
            Bson::Null => buf.append_null(key),
            Bson::RegularExpression(r) => buf.append_regex(key, &r.pattern, &r.options),
            Bson::JavaScriptCode(code) => buf.append_code(key, code),
            Bson::JavaScriptCodeWithScope(c) => {
                buf.append_code_with_scope(key, &c.code, c.scope.as_bytes())
            }
            Bson::Int32(v) => buf.append_i32(key, *v),
            Bson::Timestamp(ts) => buf.append_timestamp(key, ts.time, ts.increment),
            Bson::Int64(v) => buf.append_i64(key, *v),
            Bson::Decimal128(d) => buf.append_decimal128(key, d.bytes()),
            Bson::MinKey => buf.append_min_key(key),
            Bson::MaxKey => buf.append_max_key(key),
        }
    }

    /// Decode a raw element view into a value, applying the documented
    /// deprecated-type normalizations.
    ///
    /// Unrecognized tags decode as [`Bson::Null`] (forward compatibility).
    ///
    /// # Errors
    ///
    /// Returns an error on any structural inconsistency in a recognized
    /// payload; never a best-effort partial value.
    pub(crate) fn from_element(elem: &RawElement<'_>) -> Result<Bson> {
        let Some(element_type) = elem.element_type() else {
            return Ok(Bson::Null);
        };
        Ok(match element_type {
            ElementType::Double => Bson::Double(elem.read_f64()?),
            ElementType::String => Bson::String(elem.read_str()?.to_string()),
            ElementType::EmbeddedDocument => {
                Bson::Document(Document::from_bytes(elem.read_doc_bytes()?.to_vec())?)
            }
            ElementType::Array => {
                let doc = Document::from_bytes(elem.read_doc_bytes()?.to_vec())?;
                let mut items = Vec::new();
                for entry in doc.iter() {
                    let (_, value) = entry?;
                    items.push(value);
                }
                Bson::Array(items)
            }
            ElementType::Binary => {
                let (subtype, bytes) = elem.read_binary()?;
                Bson::Binary(Binary {
                    subtype,
                    bytes: bytes.to_vec(),
                })
            }
            ElementType::Undefined => Bson::Null,
            ElementType::ObjectId => Bson::ObjectId(elem.read_object_id()?),
            ElementType::Boolean => Bson::Boolean(elem.read_bool()?),
            ElementType::DateTime => Bson::DateTime(DateTime::from_millis(elem.read_datetime()?)),
            ElementType::Null => Bson::Null,
            ElementType::RegularExpression => {
                let (pattern, options) = elem.read_regex()?;
                Bson::RegularExpression(Regex::new(pattern, options)?)
            }
            ElementType::DbPointer => {
                let (collection, id) = elem.read_db_pointer()?;
                let mut doc = Document::new();
                doc.set("$ref", collection)?;
                doc.set("$id", id)?;
                Bson::Document(doc)
            }
            ElementType::JavaScriptCode => Bson::JavaScriptCode(elem.read_code()?.to_string()),
            ElementType::Symbol => Bson::String(elem.read_symbol()?.to_string()),
            ElementType::JavaScriptCodeWithScope => {
                let (code, scope) = elem.read_code_with_scope()?;
                Bson::JavaScriptCodeWithScope(CodeWithScope {
                    code: code.to_string(),
                    scope: Document::from_bytes(scope.to_vec())?,
                })
            }
            ElementType::Int32 => Bson::Int32(elem.read_i32()?),
            ElementType::Timestamp => {
                let (time, increment) = elem.read_timestamp()?;
                Bson::Timestamp(Timestamp { time, increment })
            }
            ElementType::Int64 => Bson::Int64(elem.read_i64()?),
            ElementType::Decimal128 => {
                Bson::Decimal128(Decimal128::from_bytes(elem.read_decimal128()?))
            }
            ElementType::MinKey => Bson::MinKey,
            ElementType::MaxKey => Bson::MaxKey,
        })
    }
}

/// A byte sequence with a subtype marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

/// A regular expression: pattern plus options, both cstrings on the wire.
///
/// Options are stored sorted. Construction compiles the pattern with the
/// platform regex engine; a rejected pattern or an unknown option letter
/// is an error, which makes a malformed wire regex a fatal decode error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

/// Option letters the wire format permits.
const REGEX_OPTIONS: &str = "ilmsux";

/// Option letters the platform engine understands as inline flags.
const INLINE_FLAGS: &str = "imsx";

impl Regex {
    /// Validate and construct a regular expression value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRegex` if an option letter is not one of
    /// `i l m s u x` or the engine rejects the pattern.
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let options = options.into();

        for c in options.chars() {
            if !REGEX_OPTIONS.contains(c) {
                return Err(Error::InvalidRegex(format!("unknown option {c:?}")));
            }
        }
        let flags: String = options.chars().filter(|c| INLINE_FLAGS.contains(*c)).collect();
        let compiled = if flags.is_empty() {
            regex::Regex::new(&pattern)
        } else {
            regex::Regex::new(&format!("(?{flags}){pattern}"))
        };
        compiled.map_err(|e| Error::InvalidRegex(e.to_string()))?;

        let mut sorted: Vec<char> = options.chars().collect();
        sorted.sort_unstable();
        Ok(Self {
            pattern,
            options: sorted.into_iter().collect(),
        })
    }
}

/// A replication timestamp: seconds since epoch plus an ordinal increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

/// A UTC datetime carried as signed milliseconds since the Unix epoch,
/// exactly as on the wire. Conversions truncate to millisecond precision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(i64);

impl DateTime {
    /// Construct from milliseconds since epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The current time, truncated to milliseconds.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Milliseconds since epoch.
    #[inline]
    #[must_use]
    pub const fn timestamp_millis(self) -> i64 {
        self.0
    }

    /// Convert to a chrono datetime, if representable.
    #[must_use]
    pub fn to_chrono(self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Construct from a chrono datetime, truncating below milliseconds.
    #[must_use]
    pub fn from_chrono(dt: chrono::DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Convert to a `SystemTime`.
    #[must_use]
    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_millis(self.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_millis(self.0.unsigned_abs())
        }
    }

    /// Construct from a `SystemTime`, truncating below milliseconds.
    #[must_use]
    pub fn from_system_time(st: SystemTime) -> Self {
        match st.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(d.as_millis() as i64),
            Err(e) => Self(-(e.duration().as_millis() as i64)),
        }
    }

    /// RFC 3339 text with millisecond precision, for datetimes the
    /// calendar can represent.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        self.to_chrono()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime({self})")
    }
}

/// JavaScript code with its captured-scope document.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeWithScope {
    pub code: String,
    pub scope: Document,
}

impl From<f64> for Bson {
    fn from(v: f64) -> Self {
        Bson::Double(v)
    }
}

impl From<&str> for Bson {
    fn from(v: &str) -> Self {
        Bson::String(v.to_string())
    }
}

impl From<String> for Bson {
    fn from(v: String) -> Self {
        Bson::String(v)
    }
}

impl From<bool> for Bson {
    fn from(v: bool) -> Self {
        Bson::Boolean(v)
    }
}

impl From<i32> for Bson {
    fn from(v: i32) -> Self {
        Bson::Int32(v)
    }
}

impl From<i64> for Bson {
    fn from(v: i64) -> Self {
        Bson::Int64(v)
    }
}

impl From<ObjectId> for Bson {
    fn from(v: ObjectId) -> Self {
        Bson::ObjectId(v)
    }
}

impl From<Binary> for Bson {
    fn from(v: Binary) -> Self {
        Bson::Binary(v)
    }
}

impl From<Regex> for Bson {
    fn from(v: Regex) -> Self {
        Bson::RegularExpression(v)
    }
}

impl From<Timestamp> for Bson {
    fn from(v: Timestamp) -> Self {
        Bson::Timestamp(v)
    }
}

impl From<DateTime> for Bson {
    fn from(v: DateTime) -> Self {
        Bson::DateTime(v)
    }
}

impl From<Decimal128> for Bson {
    fn from(v: Decimal128) -> Self {
        Bson::Decimal128(v)
    }
}

impl From<Document> for Bson {
    fn from(v: Document) -> Self {
        Bson::Document(v)
    }
}

impl From<Vec<Bson>> for Bson {
    fn from(v: Vec<Bson>) -> Self {
        Bson::Array(v)
    }
}

impl From<CodeWithScope> for Bson {
    fn from(v: CodeWithScope) -> Self {
        Bson::JavaScriptCodeWithScope(v)
    }
}

/// `None` encodes as an explicit null entry.
impl<T: Into<Bson>> From<Option<T>> for Bson {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Bson::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_types() {
        assert_eq!(Bson::Double(1.0).element_type(), ElementType::Double);
        assert_eq!(Bson::Null.element_type(), ElementType::Null);
        assert_eq!(Bson::Int32(1).element_type(), ElementType::Int32);
        assert_eq!(Bson::Int64(1).element_type(), ElementType::Int64);
        assert_eq!(Bson::MinKey.element_type(), ElementType::MinKey);
        assert_eq!(Bson::MaxKey.element_type(), ElementType::MaxKey);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Bson::from(1.5), Bson::Double(1.5));
        assert_eq!(Bson::from("hi"), Bson::String("hi".to_string()));
        assert_eq!(Bson::from(true), Bson::Boolean(true));
        assert_eq!(Bson::from(42i32), Bson::Int32(42));
        assert_eq!(Bson::from(42i64), Bson::Int64(42));
        assert_eq!(Bson::from(None::<i32>), Bson::Null);
        assert_eq!(Bson::from(Some(42i32)), Bson::Int32(42));
        assert_eq!(
            Bson::from(vec![Bson::Int32(1), Bson::Int32(2)]),
            Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)])
        );
    }

    #[test]
    fn test_int_widths_stay_distinct() {
        assert_ne!(Bson::from(1i32), Bson::from(1i64));
    }

    #[test]
    fn test_regex_validation() {
        let r = Regex::new("^a+$", "xi").unwrap();
        assert_eq!(r.options, "ix"); // stored sorted
        assert!(matches!(
            Regex::new("(unclosed", ""),
            Err(Error::InvalidRegex(_))
        ));
        assert!(matches!(
            Regex::new("a", "z"),
            Err(Error::InvalidRegex(_))
        ));
        // Locale and unicode options are legal but have no inline flag.
        assert!(Regex::new("a", "lu").is_ok());
    }

    #[test]
    fn test_datetime_conversions() {
        let dt = DateTime::from_millis(1_700_000_000_123);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(DateTime::from_chrono(dt.to_chrono().unwrap()), dt);
        assert_eq!(DateTime::from_system_time(dt.to_system_time()), dt);
        assert_eq!(dt.to_rfc3339().unwrap(), "2023-11-14T22:13:20.123Z");

        let pre_epoch = DateTime::from_millis(-1_000);
        assert_eq!(DateTime::from_system_time(pre_epoch.to_system_time()), pre_epoch);
    }
}
