//! Checksums over decoded payloads.
//!
//! An empty buffer has no checksum at all - callers record absence
//! rather than the digest of zero bytes, matching the reference
//! tooling's behavior.

use sha2::{Digest, Sha256};

/// CRC-32 of a decoded payload, absent for the empty buffer.
pub fn crc32(data: &[u8]) -> Option<u32> {
    if data.is_empty() {
        return None;
    }
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    Some(hasher.finalize())
}

/// Lowercase hex SHA-256 of a decoded payload, absent for the empty
/// buffer.
pub fn sha256_hex(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(data);
    Some(hex::encode(hasher.finalize()))
}
