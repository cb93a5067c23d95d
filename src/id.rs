//! # Identifier Module
//!
//! Documents are addressed by version-1 (time-based) UUIDs. The external form
//! is the usual hyphenated string; the storage key is derived from it so that
//! the byte order of keys in a bucket equals creation order.
//!
//! ## Lookup Key Layout
//! ```text
//! +---------------------------+----------------------------+
//! | timestamp (u64, BE, 8B)   | raw uuid bytes (16B)       |
//! +---------------------------+----------------------------+
//! ```
//! The timestamp is the UUID's own 60-bit count of 100ns intervals since the
//! Gregorian epoch (1582-10-15), so the key can always be rebuilt from the
//! external string alone.

use parking_lot::Mutex;
use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::{Timestamp, Uuid, Version};

use crate::error::{Error, Result};

/// Width in bytes of a [`LookupKey`]
pub const LOOKUP_KEY_LEN: usize = 8 + 16;

/// 100ns intervals between 1582-10-15 and 1970-01-01
const GREGORIAN_OFFSET: u64 = 0x01B2_1DD2_1381_4000;

/// Version-1 UUIDs only have 60 bits of timestamp
const MAX_TICKS: u64 = (1 << 60) - 1;

/// The external, API-facing identifier of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

/// Fixed-width, order-preserving storage key of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookupKey([u8; LOOKUP_KEY_LEN]);

impl DocumentId {
    /// Parses an external identifier string
    ///
    /// Fails with [`Error::InvalidIdentifier`] if the string is not a UUID or
    /// not a version-1 UUID. Other time-based versions (6, 7) are rejected
    /// too: their timestamps are laid out differently and would not order
    /// with generated ids.
    pub fn parse(s: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(s)
            .map_err(|e| Error::InvalidIdentifier(format!("{}: {}", s, e)))?;
        if uuid.get_version() != Some(Version::Mac) {
            return Err(Error::InvalidIdentifier(format!(
                "{}: not a version 1 identifier",
                s
            )));
        }
        Ok(Self(uuid))
    }

    /// The underlying UUID
    pub fn uuid(&self) -> &Uuid {
        &self.0
    }

    /// 100ns ticks since the Gregorian epoch embedded in the identifier
    pub fn ticks(&self) -> u64 {
        // parse() and the generator only admit version-1 UUIDs
        self.0
            .get_timestamp()
            .map(|ts| ts.to_gregorian().0)
            .unwrap_or_default()
    }

    /// Builds the storage key for this identifier
    pub fn lookup_key(&self) -> LookupKey {
        let mut key = [0u8; LOOKUP_KEY_LEN];
        key[..8].copy_from_slice(&self.ticks().to_be_bytes());
        key[8..].copy_from_slice(self.0.as_bytes());
        LookupKey(key)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl LookupKey {
    /// Raw key bytes as stored in a bucket
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The big-endian timestamp prefix
    pub fn timestamp(&self) -> u64 {
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(ts)
    }

    /// Recovers a key from raw bucket bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; LOOKUP_KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::InvalidIdentifier(format!("lookup key must be {} bytes", LOOKUP_KEY_LEN))
        })?;
        Ok(Self(key))
    }

    /// The identifier this key was derived from
    pub fn document_id(&self) -> DocumentId {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&self.0[8..]);
        DocumentId(Uuid::from_bytes(raw))
    }
}

impl AsRef<[u8]> for LookupKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Parses an external identifier straight to its lookup key
pub fn parse(s: &str) -> Result<LookupKey> {
    Ok(DocumentId::parse(s)?.lookup_key())
}

/// Generates time-ordered version-1 identifiers
///
/// Each generator owns a random node id and clock sequence. Timestamps handed
/// out are strictly increasing: if the wall clock has not advanced (or went
/// backwards) since the last identifier, the previous tick plus one is used.
#[derive(Debug)]
pub struct IdGenerator {
    node: [u8; 6],
    clock_seq: u16,
    last_ticks: Mutex<u64>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Creates a generator with a random multicast node id
    pub fn new() -> Self {
        let mut node: [u8; 6] = rand::random();
        // random node ids must set the multicast bit
        node[0] |= 0x01;
        Self {
            node,
            clock_seq: rand::random::<u16>() & 0x3FFF,
            last_ticks: Mutex::new(0),
        }
    }

    /// Produces a new identifier and its lookup key
    pub fn generate(&self) -> Result<(DocumentId, LookupKey)> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::IdentifierGeneration(e.to_string()))?;
        let now_ticks = (now.as_nanos() / 100) as u64 + GREGORIAN_OFFSET;

        let ticks = {
            let mut last = self.last_ticks.lock();
            let ticks = now_ticks.max(*last + 1);
            if ticks > MAX_TICKS {
                return Err(Error::IdentifierGeneration(
                    "timestamp exceeds 60 bits".to_string(),
                ));
            }
            *last = ticks;
            ticks
        };

        let uuid = Uuid::new_v1(Timestamp::from_gregorian(ticks, self.clock_seq), &self.node);
        let id = DocumentId(uuid);
        Ok((id, id.lookup_key()))
    }
}
