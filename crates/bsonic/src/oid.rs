//! 12-byte object identifiers.
//!
//! Layout: 4-byte big-endian seconds timestamp, 5-byte per-process random
//! value, 3-byte big-endian counter starting at a random value.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// A 12-byte BSON object identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    bytes: [u8; 12],
}

/// Per-process random value and counter seed, generated once.
fn process_state() -> &'static ([u8; 5], AtomicU32) {
    static STATE: OnceLock<([u8; 5], AtomicU32)> = OnceLock::new();
    STATE.get_or_init(|| (rand::random(), AtomicU32::new(rand::random())))
}

impl ObjectId {
    /// Generate a new identifier from the current time, the per-process
    /// random value, and the next counter value.
    #[must_use]
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let (random, counter) = process_state();
        let count = counter.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(random);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self { bytes }
    }

    /// Construct from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(&self) -> [u8; 12] {
        self.bytes
    }

    /// The 4-byte creation timestamp as seconds since epoch.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// The 24-character lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse the 24-character hex form.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidObjectId` if the input is not exactly 24 hex
    /// characters.
    pub fn parse_str(s: &str) -> Result<Self> {
        let decoded = hex::decode(s).map_err(|_| Error::InvalidObjectId(s.to_string()))?;
        let bytes: [u8; 12] = decoded
            .try_into()
            .map_err(|_| Error::InvalidObjectId(s.to_string()))?;
        Ok(Self { bytes })
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}
