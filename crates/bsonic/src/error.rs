//! Error types for BSON operations.

use std::fmt;

/// Error type for BSON operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    // Frame errors
    /// Buffer is too small to contain a valid document frame.
    DocumentTooSmall { len: usize },
    /// Declared document length does not match the buffer length.
    LengthMismatch { declared: i32, actual: usize },
    /// Document frame does not end with a 0x00 terminator.
    MissingTerminator,

    // Element errors
    /// Element payload is truncated (not enough bytes).
    TruncatedValue,
    /// Invalid length prefix inside an element payload.
    InvalidLength { length: i32 },
    /// String payload or key contains invalid UTF-8.
    InvalidUtf8,
    /// Boolean payload is neither 0x00 nor 0x01.
    InvalidBoolean(u8),
    /// Expected one element type but found another.
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    // Encode errors
    /// Key is empty or contains an interior NUL byte.
    InvalidKey(String),
    /// A cstring-encoded field contains an interior NUL byte.
    InteriorNul(&'static str),

    // Value errors
    /// ObjectId text form is not 24 hex characters.
    InvalidObjectId(String),
    /// Regular expression pattern or options rejected by the regex engine.
    InvalidRegex(String),

    // Render errors
    /// Failed to serialize to JSON.
    JsonSerialize(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DocumentTooSmall { len } => {
                write!(f, "document too small for frame (len={len})")
            }
            Error::LengthMismatch { declared, actual } => {
                write!(f, "declared length {declared} does not match buffer length {actual}")
            }
            Error::MissingTerminator => write!(f, "document frame missing 0x00 terminator"),
            Error::TruncatedValue => write!(f, "truncated value data"),
            Error::InvalidLength { length } => write!(f, "invalid length prefix: {length}"),
            Error::InvalidUtf8 => write!(f, "invalid UTF-8 in string value"),
            Error::InvalidBoolean(b) => write!(f, "invalid boolean byte: {b:#04x}"),
            Error::UnexpectedType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Error::InvalidKey(key) => write!(f, "invalid key: {key:?}"),
            Error::InteriorNul(what) => write!(f, "interior NUL byte in {what}"),
            Error::InvalidObjectId(s) => write!(f, "invalid ObjectId: {s:?}"),
            Error::InvalidRegex(msg) => write!(f, "invalid regular expression: {msg}"),
            Error::JsonSerialize(msg) => write!(f, "JSON serialize error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for BSON operations.
pub type Result<T> = std::result::Result<T, Error>;
