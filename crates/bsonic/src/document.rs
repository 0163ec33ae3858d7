//! BSON document.
//!
//! A [`Document`] is an ordered key-value container backed by exactly one
//! [`RawDocBuf`]. The buffer is the only representation of the entries;
//! there is no side index, so every read re-scans and decodes from bytes.
//!
//! Writes always append. Overwriting a key does not rewrite the old entry
//! in place; it appends a new one, and reads return the **first** match
//! found by forward scan. This first-occurrence-wins rule is a documented
//! contract of [`Document::get`], not an accident of the scan direction.
//!
//! A `Document` is not designed for concurrent access: reads of an
//! unmutated document from several threads are fine (scans are
//! reentrant), but read-plus-write on the same document is the caller's
//! responsibility and is ruled out in safe Rust by `&mut self` on writes.

use std::fmt;

use crate::buffer::{RawDocBuf, RawIter};
use crate::error::{Error, Result};
use crate::oid::ObjectId;
use crate::value::{Binary, Bson, DateTime};

/// An ordered key → [`Bson`] container backed by one BSON buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    buf: RawDocBuf,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a fresh buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: RawDocBuf::new(),
        }
    }

    /// Adopt an already-encoded frame, taking sole ownership of the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame invariants do not hold (length
    /// prefix, terminator). Element payloads are validated lazily on read.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Ok(Self {
            buf: RawDocBuf::from_bytes(bytes)?,
        })
    }

    /// Build a document from ordered `(key, value)` pairs, applying
    /// [`Document::set`] once per pair in iteration order.
    ///
    /// A pair's value may be any type convertible into [`Bson`],
    /// including `Option` (where `None` becomes an explicit null).
    ///
    /// # Errors
    ///
    /// Returns the first encode error, if any pair has an invalid key.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<Bson>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut doc = Self::new();
        for (key, value) in pairs {
            doc.set(key.as_ref(), value)?;
        }
        Ok(doc)
    }

    /// Append an entry for `key`.
    ///
    /// Never mutates or removes a prior entry with the same key; see the
    /// module docs for the duplicate-key read rule.
    ///
    /// # Errors
    ///
    /// An encode failure (empty key, interior NUL) is fatal for this call
    /// and leaves the document unchanged.
    pub fn set<V: Into<Bson>>(&mut self, key: &str, value: V) -> Result<()> {
        value.into().append_to(&mut self.buf, key)
    }

    /// Look up `key` and decode its value.
    ///
    /// Scans entries in encoded order and decodes the first whose key is
    /// byte-for-byte equal. Returns `Ok(None)` when the key is absent,
    /// distinct from `Ok(Some(Bson::Null))`, which means the key is
    /// present with an explicit null.
    ///
    /// An entry with an unrecognized type tag decodes as null if its key
    /// matches; because such an entry cannot be sized, keys encoded after
    /// it read as absent.
    ///
    /// # Errors
    ///
    /// Any structural inconsistency while decoding a recognized tag is a
    /// corruption signal and aborts the call.
    pub fn get(&self, key: &str) -> Result<Option<Bson>> {
        for elem in self.buf.iter() {
            let elem = elem?;
            if elem.key() == key {
                return Bson::from_element(&elem).map(Some);
            }
        }
        Ok(None)
    }

    /// Check whether `key` is present. Decodes nothing; scan errors read
    /// as absent.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.buf
            .iter()
            .any(|e| matches!(e, Ok(elem) if elem.key() == key))
    }

    /// Iterate over `(key, value)` pairs in encoded order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            raw: self.buf.iter(),
        }
    }

    /// Iterate over keys in encoded order. Decodes no payloads.
    pub fn keys(&self) -> impl Iterator<Item = Result<String>> + '_ {
        self.buf
            .iter()
            .map(|e| e.map(|elem| elem.key().to_string()))
    }

    /// Count entries. Walks the buffer; stops at the first inconsistency.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.iter().take_while(|e| e.is_ok()).count()
    }

    /// Check whether the document holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty_frame()
    }

    /// The encoded frame bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Consume the document and return the frame bytes.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }

    fn get_with<T>(
        &self,
        key: &str,
        expected: &'static str,
        extract: impl FnOnce(Bson) -> std::result::Result<T, Bson>,
    ) -> Result<Option<T>> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => match extract(value) {
                Ok(v) => Ok(Some(v)),
                Err(other) => Err(Error::UnexpectedType {
                    expected,
                    found: other.element_type().name(),
                }),
            },
        }
    }

    /// Get a string value, erroring on a type mismatch.
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        self.get_with(key, "string", |v| match v {
            Bson::String(s) => Ok(s),
            other => Err(other),
        })
    }

    /// Get a double value, erroring on a type mismatch.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.get_with(key, "double", |v| match v {
            Bson::Double(d) => Ok(d),
            other => Err(other),
        })
    }

    /// Get a boolean value, erroring on a type mismatch.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get_with(key, "boolean", |v| match v {
            Bson::Boolean(b) => Ok(b),
            other => Err(other),
        })
    }

    /// Get an int32 value, erroring on a type mismatch. An int64 under
    /// the key is a mismatch; widths never coerce.
    pub fn get_i32(&self, key: &str) -> Result<Option<i32>> {
        self.get_with(key, "int32", |v| match v {
            Bson::Int32(i) => Ok(i),
            other => Err(other),
        })
    }

    /// Get an int64 value, erroring on a type mismatch. An int32 under
    /// the key is a mismatch; widths never coerce.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get_with(key, "int64", |v| match v {
            Bson::Int64(i) => Ok(i),
            other => Err(other),
        })
    }

    /// Get a nested document, erroring on a type mismatch.
    pub fn get_document(&self, key: &str) -> Result<Option<Document>> {
        self.get_with(key, "document", |v| match v {
            Bson::Document(d) => Ok(d),
            other => Err(other),
        })
    }

    /// Get an array value, erroring on a type mismatch.
    pub fn get_array(&self, key: &str) -> Result<Option<Vec<Bson>>> {
        self.get_with(key, "array", |v| match v {
            Bson::Array(a) => Ok(a),
            other => Err(other),
        })
    }

    /// Get an ObjectId value, erroring on a type mismatch.
    pub fn get_object_id(&self, key: &str) -> Result<Option<ObjectId>> {
        self.get_with(key, "objectid", |v| match v {
            Bson::ObjectId(oid) => Ok(oid),
            other => Err(other),
        })
    }

    /// Get a datetime value, erroring on a type mismatch.
    pub fn get_datetime(&self, key: &str) -> Result<Option<DateTime>> {
        self.get_with(key, "datetime", |v| match v {
            Bson::DateTime(dt) => Ok(dt),
            other => Err(other),
        })
    }

    /// Get a binary value, erroring on a type mismatch.
    pub fn get_binary(&self, key: &str) -> Result<Option<Binary>> {
        self.get_with(key, "binary", |v| match v {
            Bson::Binary(b) => Ok(b),
            other => Err(other),
        })
    }
}

/// Renders the document as relaxed extended JSON. This is a best-effort
/// debug aid: a rendering failure yields the empty string, never an error.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::json::to_relaxed_json(self).unwrap_or_default())
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = Result<(String, Bson)>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a document's decoded `(key, value)` pairs.
///
/// Entries come out in encoded order. An entry with an unrecognized tag
/// yields `(key, Bson::Null)` and ends the iteration, since its payload
/// cannot be sized.
pub struct Iter<'a> {
    raw: RawIter<'a>,
}

impl Iterator for Iter<'_> {
    type Item = Result<(String, Bson)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.raw.next()? {
            Ok(elem) => {
                Some(Bson::from_element(&elem).map(|value| (elem.key().to_string(), value)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
