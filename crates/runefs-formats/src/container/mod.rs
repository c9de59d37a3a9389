//! Compressed-container codec.
//!
//! Every entry in the data channel - archive metadata and group payloads
//! alike - is wrapped in a small container:
//!
//! ```text
//! [kind: u8]
//! [compressed length: u32 BE]
//! [uncompressed length: u32 BE]   only when kind != none
//! [payload bytes]
//! [version: u16 BE]               only when the writer appended one
//! ```
//!
//! For `none` the compressed-length field is simply the payload length.
//! Group payloads of encrypted archives are XTEA-ciphered from byte 5
//! (everything after the kind and compressed-length fields) to the end
//! of the container, minus the version footer when one is present.
//!
//! Malformed input is a recoverable error, never a panic: callers treat
//! a failed decode as "entry unavailable" and move on to siblings.

mod compression;
mod error;

pub use compression::{MAX_DECOMPRESSED_SIZE, compress_payload, decompress_payload};
pub use error::{ContainerError, ContainerResult};

use runefs_crypto::keystore::XteaKeySet;
use runefs_crypto::xtea;

/// Offset at which the XTEA-encrypted region begins: the kind byte and
/// the compressed-length word stay in the clear.
pub const ENCRYPTION_OFFSET: usize = 5;

/// Compression applied to a container's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    /// Payload stored verbatim
    #[default]
    None = 0,
    /// bzip2, stream magic stripped
    Bzip2 = 1,
    /// gzip
    Gzip = 2,
}

impl Compression {
    /// Parse the on-disk tag byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Bzip2),
            2 => Some(Self::Gzip),
            _ => None,
        }
    }

    /// The on-disk tag byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A decoded container: payload plus the metadata recovered around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Compression the payload was stored with.
    pub compression: Compression,
    /// The decompressed payload.
    pub payload: Vec<u8>,
    /// Trailing version word, when the container carried one.
    pub version: Option<u16>,
}

impl Container {
    /// Encode a payload into container bytes.
    pub fn encode(
        payload: &[u8],
        kind: Compression,
        version: Option<u16>,
    ) -> ContainerResult<Vec<u8>> {
        let body = compress_payload(payload, kind)?;
        let body_len = length_field(body.len())?;

        let mut out = Vec::with_capacity(body.len() + 11);
        out.push(kind.as_byte());
        out.extend_from_slice(&body_len.to_be_bytes());
        if kind != Compression::None {
            let payload_len = length_field(payload.len())?;
            out.extend_from_slice(&payload_len.to_be_bytes());
        }
        out.extend_from_slice(&body);
        if let Some(version) = version {
            out.extend_from_slice(&version.to_be_bytes());
        }
        Ok(out)
    }

    /// Decode container bytes.
    pub fn decode(raw: &[u8]) -> ContainerResult<Self> {
        if raw.len() < ENCRYPTION_OFFSET {
            return Err(ContainerError::Truncated {
                expected: ENCRYPTION_OFFSET,
                actual: raw.len(),
            });
        }

        let kind = Compression::from_byte(raw[0])
            .ok_or(ContainerError::UnknownCompression(raw[0]))?;
        let compressed_len = u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]) as usize;

        let (payload, rest) = if kind == Compression::None {
            let end = ENCRYPTION_OFFSET + compressed_len;
            if raw.len() < end {
                return Err(ContainerError::Truncated {
                    expected: end,
                    actual: raw.len(),
                });
            }
            (raw[ENCRYPTION_OFFSET..end].to_vec(), &raw[end..])
        } else {
            let data_start = ENCRYPTION_OFFSET + 4;
            let end = data_start + compressed_len;
            if raw.len() < end {
                return Err(ContainerError::Truncated {
                    expected: end,
                    actual: raw.len(),
                });
            }
            let uncompressed_len =
                u32::from_be_bytes([raw[5], raw[6], raw[7], raw[8]]) as usize;
            let payload =
                decompress_payload(&raw[data_start..end], kind, uncompressed_len)?;
            (payload, &raw[end..])
        };

        let version = if rest.len() >= 2 {
            Some(u16::from_be_bytes([rest[0], rest[1]]))
        } else {
            None
        };

        Ok(Self {
            compression: kind,
            payload,
            version,
        })
    }

    /// Decode an encrypted container, trialing candidate keys in order.
    ///
    /// Each candidate is validated, applied to a copy of the raw bytes,
    /// and accepted only when the full decode succeeds (for compressed
    /// kinds that means the declared uncompressed length checks out).
    /// With no candidates at all this falls through to a plain decode
    /// attempt; when every candidate fails the result is the soft
    /// [`ContainerError::MissingKey`].
    pub fn decode_encrypted(
        raw: &[u8],
        candidates: &[XteaKeySet],
    ) -> ContainerResult<Self> {
        if candidates.is_empty() {
            return Self::decode(raw);
        }

        if raw.len() < ENCRYPTION_OFFSET {
            return Err(ContainerError::Truncated {
                expected: ENCRYPTION_OFFSET,
                actual: raw.len(),
            });
        }
        let end = encrypted_region_end(raw);

        for candidate in candidates {
            if !candidate.key.is_valid() {
                continue;
            }
            let mut copy = raw.to_vec();
            xtea::decrypt(&mut copy[ENCRYPTION_OFFSET..end], &candidate.key);
            if let Ok(container) = Self::decode(&copy) {
                return Ok(container);
            }
        }

        Err(ContainerError::MissingKey)
    }
}

fn length_field(len: usize) -> ContainerResult<u32> {
    u32::try_from(len).map_err(|_| ContainerError::TooLarge {
        declared: len,
        limit: u32::MAX as usize,
    })
}

/// End of the XTEA-encrypted region: the whole tail of the container,
/// minus the version footer when the length arithmetic says one exists.
fn encrypted_region_end(raw: &[u8]) -> usize {
    let compressed_len =
        u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]) as i64;
    let total = raw.len() as i64;
    if total - (compressed_len + ENCRYPTION_OFFSET as i64 + 4) >= 2 {
        raw.len() - 2
    } else {
        raw.len()
    }
}
