use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::DagError;

/// Content identifier for a node.
///
/// A `ContentId` is the BLAKE3 hash of a node's canonical encoding, tagged
/// with the codec that produced that encoding. Two nodes are the same node
/// exactly when their identifiers are equal, which is what makes link
/// targets deduplicatable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId {
    codec: u64,
    hash: [u8; 32],
}

impl ContentId {
    /// Hash `data` under the given codec tag.
    pub fn compute(codec: u64, data: &[u8]) -> Self {
        Self {
            codec,
            hash: *blake3::hash(data).as_bytes(),
        }
    }

    /// Identifier of `data` interpreted as a raw leaf.
    pub fn raw(data: &[u8]) -> Self {
        Self::compute(codec::RAW, data)
    }

    /// Create from a pre-computed hash.
    pub fn from_hash(codec: u64, hash: [u8; 32]) -> Self {
        Self { codec, hash }
    }

    /// The codec tag.
    pub fn codec(&self) -> u64 {
        self.codec
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Returns `true` if `data` hashes to this identifier.
    pub fn verify(&self, data: &[u8]) -> bool {
        blake3::hash(data).as_bytes() == &self.hash
    }

    /// Hex-encoded hash.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    /// Parse a hex-encoded hash under the given codec tag.
    pub fn from_hex(codec: u64, s: &str) -> Result<Self, DagError> {
        let bytes = hex::decode(s).map_err(|e| DagError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(DagError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self { codec, hash })
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({:x}:{})", self.codec, self.short_hex())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{}", self.codec, self.to_hex())
    }
}
