//! # Record Format
//!
//! Binary encoding for individual stored records (plantations, templates).
//!
//! Format: Header (5 bytes) + postcard-serialized record.
//! - 4 bytes: Magic ("VRDT")
//! - 1 byte: Version
//!
//! Size and header checks run before the payload is decoded, so a corrupted
//! store fails with an error instead of a large allocation.

use crate::{VerdantError, primitives};
use serde::Serialize;
use serde::de::DeserializeOwned;

const HEADER_LEN: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header precedes every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl RecordHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn current() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Check magic and version.
    pub fn validate(&self) -> Result<(), VerdantError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(VerdantError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(VerdantError::SerializationError(format!(
                "Unsupported record version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerdantError> {
        let Some(head) = bytes.get(0..HEADER_LEN) else {
            return Err(VerdantError::SerializationError(
                "Record too short: header missing".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        Ok(Self {
            magic,
            version: head[4],
        })
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a record as header + postcard payload.
pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>, VerdantError> {
    let payload = postcard::to_allocvec(record)
        .map_err(|e| VerdantError::SerializationError(e.to_string()))?;

    let total = HEADER_LEN.saturating_add(payload.len());
    if total > primitives::MAX_RECORD_SIZE {
        return Err(VerdantError::SerializationError(format!(
            "Record too large: {} bytes (max {})",
            total,
            primitives::MAX_RECORD_SIZE
        )));
    }

    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&RecordHeader::current().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a record previously written by [`encode_record`].
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, VerdantError> {
    if bytes.len() > primitives::MAX_RECORD_SIZE {
        return Err(VerdantError::SerializationError(format!(
            "Record too large: {} bytes (max {})",
            bytes.len(),
            primitives::MAX_RECORD_SIZE
        )));
    }

    let header = RecordHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..])
        .map_err(|e| VerdantError::SerializationError(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
