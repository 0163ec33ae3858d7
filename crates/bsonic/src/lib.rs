//! Typed, mutable in-memory BSON documents.
//!
//! A [`Document`] is an ordered key-value container backed by one
//! exclusively-owned BSON byte buffer; a [`Bson`] is one decoded value,
//! tagged with its wire type. Reads scan and decode from the bytes on
//! demand; writes append correctly-tagged elements. The buffer layout is
//! byte-for-byte standard BSON.

pub mod buffer;
pub mod decimal128;
pub mod document;
pub mod error;
pub mod json;
pub mod oid;
pub mod tag;
pub mod value;

pub use decimal128::Decimal128;
pub use document::Document;
pub use error::{Error, Result};
pub use json::to_relaxed_json;
pub use oid::ObjectId;
pub use tag::{BinarySubtype, ElementType};
pub use value::{Binary, Bson, CodeWithScope, DateTime, Regex, Timestamp};
