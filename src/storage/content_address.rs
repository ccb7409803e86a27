//! BLAKE3 content addresses for stored artifacts.

use crate::error::{RegflowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content-addressed identifier for a stored artifact blob.
///
/// Identical bytes always map to the same address, so logging the same
/// model twice stores it once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentAddress {
    /// BLAKE3 hash of content (32 bytes).
    hash: [u8; 32],
    /// Content size in bytes.
    size: u64,
}

impl ContentAddress {
    /// Create a content address from raw components.
    #[must_use]
    pub fn new(hash: [u8; 32], size: u64) -> Self {
        Self { hash, size }
    }

    /// Compute the content address of a byte slice.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            hash: *blake3::hash(data).as_bytes(),
            size: data.len() as u64,
        }
    }

    /// Rebuild an address from its hex digest and size, as stored in the database.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `hex` is not a 64-character hex digest.
    pub fn from_hex(hex: &str, size: u64) -> Result<Self> {
        let hash = blake3::Hash::from_hex(hex)
            .map_err(|e| RegflowError::Validation(format!("invalid content hash '{hex}': {e}")))?;
        Ok(Self::new(*hash.as_bytes(), size))
    }

    /// Get the hash as bytes.
    #[must_use]
    pub fn hash_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Get the hash as a lowercase hex string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        blake3::Hash::from(self.hash).to_hex().to_string()
    }

    /// Get the content size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Shard directory for this address (first byte as two hex chars).
    #[must_use]
    pub fn storage_prefix(&self) -> String {
        self.hash_hex()[..2].to_string()
    }

    /// Verify that data matches this content address.
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        self.size == data.len() as u64 && blake3::hash(data) == blake3::Hash::from(self.hash)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake3:{}:{}", self.hash_hex(), self.size)
    }
}

impl FromStr for ContentAddress {
    type Err = RegflowError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RegflowError::Validation(format!("invalid content address: {s}"));
        let rest = s.strip_prefix("blake3:").ok_or_else(invalid)?;
        let (hex, size) = rest.split_once(':').ok_or_else(invalid)?;
        let size = size.parse().map_err(|_| invalid())?;
        Self::from_hex(hex, size)
    }
}
