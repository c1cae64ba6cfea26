//! Checksum and size derivation from content bytes.

use sha1::{Digest, Sha1};

use crate::mime;

/// Facts derived from a content payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// Byte length.
    pub size: u64,
    /// Lowercase hex SHA-1.
    pub checksum: String,
    /// Mimetype sniffed from the bytes.
    pub detected_mimetype: String,
}

impl ContentDigest {
    /// Digest a payload.
    pub fn of(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            checksum: sha1_hex(data),
            detected_mimetype: mime::sniff(data).to_string(),
        }
    }
}

/// Lowercase hex SHA-1 of the given bytes.
pub fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}
