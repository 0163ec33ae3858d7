//! Raw BSON buffer engine.
//!
//! [`RawDocBuf`] owns the framed bytes of one document: a little-endian
//! i32 total length, a sequence of `(tag, cstring key, payload)` elements,
//! and a trailing 0x00. It provides one append primitive per element type
//! and a forward iterator ([`RawIter`]) yielding bounds-checked element
//! views ([`RawElement`]) that read payloads on demand, without copying.
//!
//! Writers only ever append: an element, once written, is immutable.

use crate::error::{Error, Result};
use crate::oid::ObjectId;
use crate::tag::{BinarySubtype, ElementType};

/// The frame of an empty document: length 5, no elements, terminator.
const EMPTY_FRAME: [u8; 5] = [0x05, 0x00, 0x00, 0x00, 0x00];

/// Smallest possible frame (the empty document).
const MIN_FRAME_LEN: usize = 5;

/// Read a little-endian i32 at the given offset.
pub(crate) fn read_i32_le(data: &[u8], at: usize) -> Result<i32> {
    let bytes = data.get(at..at + 4).ok_or(Error::TruncatedValue)?;
    Ok(i32::from_le_bytes(
        bytes.try_into().map_err(|_| Error::TruncatedValue)?,
    ))
}

/// Read a little-endian i64 at the given offset.
pub(crate) fn read_i64_le(data: &[u8], at: usize) -> Result<i64> {
    let bytes = data.get(at..at + 8).ok_or(Error::TruncatedValue)?;
    Ok(i64::from_le_bytes(
        bytes.try_into().map_err(|_| Error::TruncatedValue)?,
    ))
}

/// Read a little-endian u32 at the given offset.
pub(crate) fn read_u32_le(data: &[u8], at: usize) -> Result<u32> {
    let bytes = data.get(at..at + 4).ok_or(Error::TruncatedValue)?;
    Ok(u32::from_le_bytes(
        bytes.try_into().map_err(|_| Error::TruncatedValue)?,
    ))
}

/// Read a length-prefixed BSON string at the given offset.
///
/// Layout: i32 byte length (terminator included), UTF-8 bytes, 0x00.
/// Returns the string and the total bytes consumed.
fn read_length_prefixed_str(data: &[u8], at: usize) -> Result<(&str, usize)> {
    let len = read_i32_le(data, at)?;
    if len < 1 {
        return Err(Error::InvalidLength { length: len });
    }
    let len = len as usize;
    let bytes = data.get(at + 4..at + 4 + len).ok_or(Error::TruncatedValue)?;
    if bytes[len - 1] != 0 {
        return Err(Error::MissingTerminator);
    }
    let s = std::str::from_utf8(&bytes[..len - 1]).map_err(|_| Error::InvalidUtf8)?;
    Ok((s, 4 + len))
}

/// Read a NUL-terminated cstring at the given offset.
///
/// Returns the string and the total bytes consumed (terminator included).
fn read_cstr(data: &[u8], at: usize) -> Result<(&str, usize)> {
    let rest = data.get(at..).ok_or(Error::TruncatedValue)?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::TruncatedValue)?;
    let s = std::str::from_utf8(&rest[..nul]).map_err(|_| Error::InvalidUtf8)?;
    Ok((s, nul + 1))
}

/// An owned, framed BSON byte buffer.
///
/// This is the single backing store of a document. No other entity holds a
/// live reference to it; dropping the buffer releases the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocBuf {
    data: Vec<u8>,
}

impl Default for RawDocBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl RawDocBuf {
    /// Allocate a fresh, empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: EMPTY_FRAME.to_vec(),
        }
    }

    /// Adopt an already-built frame, taking sole ownership of the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame invariants do not hold: at least 5
    /// bytes, declared length equal to the buffer length, 0x00 terminator.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < MIN_FRAME_LEN {
            return Err(Error::DocumentTooSmall { len: data.len() });
        }
        let declared = read_i32_le(&data, 0)?;
        if declared < 0 || declared as usize != data.len() {
            return Err(Error::LengthMismatch {
                declared,
                actual: data.len(),
            });
        }
        if data[data.len() - 1] != 0 {
            return Err(Error::MissingTerminator);
        }
        Ok(Self { data })
    }

    /// Get the underlying frame bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return the frame bytes.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Check whether the frame holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty_frame(&self) -> bool {
        self.data.len() == MIN_FRAME_LEN
    }

    /// Iterate over the elements in encoded order.
    #[must_use]
    pub fn iter(&self) -> RawIter<'_> {
        RawIter {
            data: &self.data,
            pos: 4,
            done: false,
        }
    }

    /// Append one `(tag, key, payload)` element and re-seal the frame.
    fn append_element(&mut self, tag: ElementType, key: &str, payload: &[u8]) -> Result<()> {
        if key.is_empty() || key.as_bytes().contains(&0) {
            return Err(Error::InvalidKey(key.to_string()));
        }
        self.data.pop(); // terminator
        self.data.push(tag as u8);
        self.data.extend_from_slice(key.as_bytes());
        self.data.push(0);
        self.data.extend_from_slice(payload);
        self.data.push(0);
        let total = self.data.len() as i32;
        self.data[..4].copy_from_slice(&total.to_le_bytes());
        Ok(())
    }

    /// Append a double element.
    pub fn append_f64(&mut self, key: &str, value: f64) -> Result<()> {
        self.append_element(ElementType::Double, key, &value.to_le_bytes())
    }

    /// Append a UTF-8 string element.
    pub fn append_str(&mut self, key: &str, value: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(4 + value.len() + 1);
        payload.extend_from_slice(&(value.len() as i32 + 1).to_le_bytes());
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.append_element(ElementType::String, key, &payload)
    }

    /// Append an embedded document element from its frame bytes.
    pub fn append_document(&mut self, key: &str, frame: &[u8]) -> Result<()> {
        self.append_element(ElementType::EmbeddedDocument, key, frame)
    }

    /// Append an array element from its frame bytes.
    ///
    /// Arrays are framed exactly like documents; the caller supplies a
    /// frame keyed `"0"`, `"1"`, ... in positional order.
    pub fn append_array(&mut self, key: &str, frame: &[u8]) -> Result<()> {
        self.append_element(ElementType::Array, key, frame)
    }

    /// Append a binary element.
    ///
    /// The deprecated `BinaryOld` subtype carries a redundant inner i32
    /// length prefix which is written here and stripped again on read.
    pub fn append_binary(&mut self, key: &str, subtype: BinarySubtype, bytes: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(4 + 1 + 4 + bytes.len());
        if subtype == BinarySubtype::BinaryOld {
            payload.extend_from_slice(&(bytes.len() as i32 + 4).to_le_bytes());
            payload.push(u8::from(subtype));
            payload.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
        } else {
            payload.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            payload.push(u8::from(subtype));
        }
        payload.extend_from_slice(bytes);
        self.append_element(ElementType::Binary, key, &payload)
    }

    /// Append an ObjectId element.
    pub fn append_object_id(&mut self, key: &str, oid: ObjectId) -> Result<()> {
        self.append_element(ElementType::ObjectId, key, &oid.bytes())
    }

    /// Append a boolean element.
    pub fn append_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.append_element(ElementType::Boolean, key, &[u8::from(value)])
    }

    /// Append a UTC datetime element (signed milliseconds since epoch).
    pub fn append_datetime(&mut self, key: &str, millis: i64) -> Result<()> {
        self.append_element(ElementType::DateTime, key, &millis.to_le_bytes())
    }

    /// Append a null element.
    pub fn append_null(&mut self, key: &str) -> Result<()> {
        self.append_element(ElementType::Null, key, &[])
    }

    /// Append a regular expression element.
    ///
    /// Options are stored sorted, as the wire format requires. Pattern and
    /// options are cstrings and must not contain NUL bytes.
    pub fn append_regex(&mut self, key: &str, pattern: &str, options: &str) -> Result<()> {
        if pattern.as_bytes().contains(&0) {
            return Err(Error::InteriorNul("regex pattern"));
        }
        if options.as_bytes().contains(&0) {
            return Err(Error::InteriorNul("regex options"));
        }
        let mut opts: Vec<u8> = options.as_bytes().to_vec();
        opts.sort_unstable();
        let mut payload = Vec::with_capacity(pattern.len() + opts.len() + 2);
        payload.extend_from_slice(pattern.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&opts);
        payload.push(0);
        self.append_element(ElementType::RegularExpression, key, &payload)
    }

    /// Append a JavaScript code element.
    pub fn append_code(&mut self, key: &str, code: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(4 + code.len() + 1);
        payload.extend_from_slice(&(code.len() as i32 + 1).to_le_bytes());
        payload.extend_from_slice(code.as_bytes());
        payload.push(0);
        self.append_element(ElementType::JavaScriptCode, key, &payload)
    }

    /// Append a JavaScript code-with-scope element.
    ///
    /// Layout: i32 total length (itself included), code string, scope frame.
    pub fn append_code_with_scope(&mut self, key: &str, code: &str, scope: &[u8]) -> Result<()> {
        let total = 4 + 4 + code.len() + 1 + scope.len();
        let mut payload = Vec::with_capacity(total);
        payload.extend_from_slice(&(total as i32).to_le_bytes());
        payload.extend_from_slice(&(code.len() as i32 + 1).to_le_bytes());
        payload.extend_from_slice(code.as_bytes());
        payload.push(0);
        payload.extend_from_slice(scope);
        self.append_element(ElementType::JavaScriptCodeWithScope, key, &payload)
    }

    /// Append an int32 element.
    pub fn append_i32(&mut self, key: &str, value: i32) -> Result<()> {
        self.append_element(ElementType::Int32, key, &value.to_le_bytes())
    }

    /// Append an int64 element.
    pub fn append_i64(&mut self, key: &str, value: i64) -> Result<()> {
        self.append_element(ElementType::Int64, key, &value.to_le_bytes())
    }

    /// Append a timestamp element.
    ///
    /// On the wire the increment occupies the low 4 bytes and the seconds
    /// the high 4 bytes of one little-endian u64.
    pub fn append_timestamp(&mut self, key: &str, time: u32, increment: u32) -> Result<()> {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&increment.to_le_bytes());
        payload[4..].copy_from_slice(&time.to_le_bytes());
        self.append_element(ElementType::Timestamp, key, &payload)
    }

    /// Append a decimal128 element (16 raw bytes, little-endian).
    pub fn append_decimal128(&mut self, key: &str, bytes: [u8; 16]) -> Result<()> {
        self.append_element(ElementType::Decimal128, key, &bytes)
    }

    /// Append a min-key sentinel element.
    pub fn append_min_key(&mut self, key: &str) -> Result<()> {
        self.append_element(ElementType::MinKey, key, &[])
    }

    /// Append a max-key sentinel element.
    pub fn append_max_key(&mut self, key: &str) -> Result<()> {
        self.append_element(ElementType::MaxKey, key, &[])
    }
}

/// Compute the payload size of an element, reading length prefixes where
/// the type requires them. `start` is the payload offset, `end` the offset
/// of the frame terminator.
fn element_size(t: ElementType, data: &[u8], start: usize, end: usize) -> Result<usize> {
    Ok(match t {
        ElementType::Double | ElementType::DateTime | ElementType::Int64 | ElementType::Timestamp => 8,
        ElementType::String | ElementType::JavaScriptCode | ElementType::Symbol => {
            let len = read_i32_le(data, start)?;
            if len < 1 {
                return Err(Error::InvalidLength { length: len });
            }
            4 + len as usize
        }
        ElementType::EmbeddedDocument | ElementType::Array => {
            let len = read_i32_le(data, start)?;
            if len < MIN_FRAME_LEN as i32 {
                return Err(Error::InvalidLength { length: len });
            }
            len as usize
        }
        ElementType::JavaScriptCodeWithScope => {
            // i32 total + minimal string (5) + empty scope frame (5)
            let len = read_i32_le(data, start)?;
            if len < 14 {
                return Err(Error::InvalidLength { length: len });
            }
            len as usize
        }
        ElementType::Binary => {
            let len = read_i32_le(data, start)?;
            if len < 0 {
                return Err(Error::InvalidLength { length: len });
            }
            4 + 1 + len as usize
        }
        ElementType::Undefined | ElementType::Null | ElementType::MinKey | ElementType::MaxKey => 0,
        ElementType::ObjectId => 12,
        ElementType::Boolean => 1,
        ElementType::RegularExpression => {
            let region = data.get(start..end).ok_or(Error::TruncatedValue)?;
            let first = region
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::TruncatedValue)?;
            let second = region
                .get(first + 1..)
                .ok_or(Error::TruncatedValue)?
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::TruncatedValue)?;
            first + 1 + second + 1
        }
        ElementType::DbPointer => {
            let len = read_i32_le(data, start)?;
            if len < 1 {
                return Err(Error::InvalidLength { length: len });
            }
            4 + len as usize + 12
        }
        ElementType::Int32 => 4,
        ElementType::Decimal128 => 16,
    })
}

/// Forward iterator over a frame's elements.
///
/// Yields one [`RawElement`] per entry in encoded order. An element whose
/// tag byte is unrecognized is yielded with `element_type() == None` and
/// ends the iteration, since its payload cannot be sized. Any structural
/// inconsistency (truncation, bad length prefix, invalid UTF-8 in a key)
/// yields an error and ends the iteration.
pub struct RawIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Iterator for RawIter<'a> {
    type Item = Result<RawElement<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let data = self.data;
        let end = data.len() - 1;
        if self.pos >= end {
            self.done = true;
            return None;
        }
        let tag_byte = data[self.pos];
        if tag_byte == 0 {
            self.done = true;
            return None;
        }
        let key_start = self.pos + 1;
        let (key, key_consumed) = match read_cstr(&data[..end], key_start) {
            Ok(kv) => kv,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let payload_start = key_start + key_consumed;
        let Some(element_type) = ElementType::from_u8(tag_byte) else {
            // Extension type: unsized, so nothing after it is reachable.
            self.done = true;
            return Some(Ok(RawElement {
                key,
                tag_byte,
                element_type: None,
                payload: &[],
            }));
        };
        let size = match element_size(element_type, data, payload_start, end) {
            Ok(s) => s,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if payload_start + size > end {
            self.done = true;
            return Some(Err(Error::TruncatedValue));
        }
        let payload = &data[payload_start..payload_start + size];
        self.pos = payload_start + size;
        Some(Ok(RawElement {
            key,
            tag_byte,
            element_type: Some(element_type),
            payload,
        }))
    }
}

/// A view of one element inside a frame.
///
/// Does not store parsed data; payload bytes are read on demand via the
/// typed read methods. Each read validates the payload structure it
/// touches and reports corruption as an error rather than a partial value.
#[derive(Debug, Clone, Copy)]
pub struct RawElement<'a> {
    key: &'a str,
    tag_byte: u8,
    element_type: Option<ElementType>,
    payload: &'a [u8],
}

impl<'a> RawElement<'a> {
    /// The element key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// The raw tag byte.
    #[inline]
    #[must_use]
    pub fn tag_byte(&self) -> u8 {
        self.tag_byte
    }

    /// The element type, or `None` for an unrecognized tag.
    #[inline]
    #[must_use]
    pub fn element_type(&self) -> Option<ElementType> {
        self.element_type
    }

    /// The raw payload bytes (empty for unrecognized tags).
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Read a double payload.
    pub fn read_f64(&self) -> Result<f64> {
        let bytes = self.payload.get(..8).ok_or(Error::TruncatedValue)?;
        Ok(f64::from_le_bytes(
            bytes.try_into().map_err(|_| Error::TruncatedValue)?,
        ))
    }

    /// Read a string payload.
    pub fn read_str(&self) -> Result<&'a str> {
        read_length_prefixed_str(self.payload, 0).map(|(s, _)| s)
    }

    /// Read an embedded document or array payload as frame bytes.
    ///
    /// The caller adopts a copy of these bytes; the child's lifetime is
    /// independent of this buffer.
    pub fn read_doc_bytes(&self) -> Result<&'a [u8]> {
        if self.payload.len() < MIN_FRAME_LEN {
            return Err(Error::TruncatedValue);
        }
        Ok(self.payload)
    }

    /// Read a binary payload as `(subtype, bytes)`.
    pub fn read_binary(&self) -> Result<(BinarySubtype, &'a [u8])> {
        let len = read_i32_le(self.payload, 0)?;
        if len < 0 {
            return Err(Error::InvalidLength { length: len });
        }
        let subtype = BinarySubtype::from(*self.payload.get(4).ok_or(Error::TruncatedValue)?);
        let bytes = self
            .payload
            .get(5..5 + len as usize)
            .ok_or(Error::TruncatedValue)?;
        if subtype == BinarySubtype::BinaryOld {
            let inner = read_i32_le(bytes, 0)?;
            if i64::from(inner) != i64::from(len) - 4 {
                return Err(Error::InvalidLength { length: inner });
            }
            return Ok((subtype, &bytes[4..]));
        }
        Ok((subtype, bytes))
    }

    /// Read an ObjectId payload.
    pub fn read_object_id(&self) -> Result<ObjectId> {
        let bytes = self.payload.get(..12).ok_or(Error::TruncatedValue)?;
        Ok(ObjectId::from_bytes(
            bytes.try_into().map_err(|_| Error::TruncatedValue)?,
        ))
    }

    /// Read a boolean payload.
    pub fn read_bool(&self) -> Result<bool> {
        match self.payload.first().ok_or(Error::TruncatedValue)? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(Error::InvalidBoolean(*other)),
        }
    }

    /// Read a UTC datetime payload (milliseconds since epoch).
    pub fn read_datetime(&self) -> Result<i64> {
        read_i64_le(self.payload, 0)
    }

    /// Read a regular expression payload as `(pattern, options)`.
    pub fn read_regex(&self) -> Result<(&'a str, &'a str)> {
        let (pattern, consumed) = read_cstr(self.payload, 0)?;
        let (options, _) = read_cstr(self.payload, consumed)?;
        Ok((pattern, options))
    }

    /// Read a DBPointer payload as `(collection, id)`.
    pub fn read_db_pointer(&self) -> Result<(&'a str, ObjectId)> {
        let (collection, consumed) = read_length_prefixed_str(self.payload, 0)?;
        let bytes = self
            .payload
            .get(consumed..consumed + 12)
            .ok_or(Error::TruncatedValue)?;
        let id = ObjectId::from_bytes(bytes.try_into().map_err(|_| Error::TruncatedValue)?);
        Ok((collection, id))
    }

    /// Read a JavaScript code payload.
    pub fn read_code(&self) -> Result<&'a str> {
        self.read_str()
    }

    /// Read a code-with-scope payload as `(code, scope frame bytes)`.
    pub fn read_code_with_scope(&self) -> Result<(&'a str, &'a [u8])> {
        let total = read_i32_le(self.payload, 0)?;
        if total < 14 || total as usize != self.payload.len() {
            return Err(Error::InvalidLength { length: total });
        }
        let (code, consumed) = read_length_prefixed_str(self.payload, 4)?;
        let scope = self.payload.get(4 + consumed..).ok_or(Error::TruncatedValue)?;
        if scope.len() < MIN_FRAME_LEN {
            return Err(Error::TruncatedValue);
        }
        Ok((code, scope))
    }

    /// Read a symbol payload as a plain string.
    pub fn read_symbol(&self) -> Result<&'a str> {
        self.read_str()
    }

    /// Read an int32 payload.
    pub fn read_i32(&self) -> Result<i32> {
        read_i32_le(self.payload, 0)
    }

    /// Read an int64 payload.
    pub fn read_i64(&self) -> Result<i64> {
        read_i64_le(self.payload, 0)
    }

    /// Read a timestamp payload as `(time, increment)`.
    pub fn read_timestamp(&self) -> Result<(u32, u32)> {
        let increment = read_u32_le(self.payload, 0)?;
        let time = read_u32_le(self.payload, 4)?;
        Ok((time, increment))
    }

    /// Read a decimal128 payload (16 raw bytes, little-endian).
    pub fn read_decimal128(&self) -> Result<[u8; 16]> {
        let bytes = self.payload.get(..16).ok_or(Error::TruncatedValue)?;
        bytes.try_into().map_err(|_| Error::TruncatedValue)
    }
}
