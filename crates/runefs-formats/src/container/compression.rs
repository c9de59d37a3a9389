//! Payload compression backends for the container codec.

use std::io::Read;

use bzip2::read::{BzDecoder, BzEncoder};
use flate2::read::{GzDecoder, GzEncoder};

use super::Compression;
use super::error::{ContainerError, ContainerResult};

/// Maximum allowed decompressed payload size (256 MB).
///
/// Declared lengths beyond this are rejected before any allocation
/// happens; the largest real store entries are a few megabytes.
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// bzip2 streams are stored without their four-byte `BZh1` magic; the
/// decoder re-prepends it and the encoder strips it back off.
const BZIP2_MAGIC: [u8; 4] = *b"BZh1";

/// Compress payload bytes with the given algorithm.
pub fn compress_payload(data: &[u8], kind: Compression) -> ContainerResult<Vec<u8>> {
    match kind {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(data, flate2::Compression::default());
            let mut compressed = Vec::new();
            encoder
                .read_to_end(&mut compressed)
                .map_err(|e| ContainerError::Compression(format!("gzip compression failed: {e}")))?;
            Ok(compressed)
        }
        Compression::Bzip2 => {
            let mut encoder = BzEncoder::new(data, bzip2::Compression::new(1));
            let mut compressed = Vec::new();
            encoder
                .read_to_end(&mut compressed)
                .map_err(|e| {
                    ContainerError::Compression(format!("bzip2 compression failed: {e}"))
                })?;
            if compressed.len() < BZIP2_MAGIC.len() || compressed[..4] != BZIP2_MAGIC {
                return Err(ContainerError::Compression(
                    "bzip2 stream missing expected magic".to_string(),
                ));
            }
            Ok(compressed.split_off(BZIP2_MAGIC.len()))
        }
    }
}

/// Decompress payload bytes, verifying the declared uncompressed length.
pub fn decompress_payload(
    data: &[u8],
    kind: Compression,
    expected_len: usize,
) -> ContainerResult<Vec<u8>> {
    if expected_len > MAX_DECOMPRESSED_SIZE {
        return Err(ContainerError::TooLarge {
            declared: expected_len,
            limit: MAX_DECOMPRESSED_SIZE,
        });
    }

    match kind {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => read_verified(GzDecoder::new(data), expected_len, "gzip"),
        Compression::Bzip2 => {
            let mut stream = Vec::with_capacity(data.len() + BZIP2_MAGIC.len());
            stream.extend_from_slice(&BZIP2_MAGIC);
            stream.extend_from_slice(data);
            read_verified(BzDecoder::new(stream.as_slice()), expected_len, "bzip2")
        }
    }
}

/// Drain a decoder, capping reads just past the declared length so a
/// lying stream cannot balloon, then verify the exact size.
fn read_verified<R: Read>(decoder: R, expected_len: usize, algo: &str) -> ContainerResult<Vec<u8>> {
    let mut decompressed = Vec::with_capacity(expected_len);
    decoder
        .take(expected_len as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| ContainerError::Compression(format!("{algo} decompression failed: {e}")))?;

    if decompressed.len() != expected_len {
        return Err(ContainerError::LengthMismatch {
            expected: expected_len,
            actual: decompressed.len(),
        });
    }
    Ok(decompressed)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_none_is_verbatim() {
        let data = b"uncompressed bytes";
        let out = compress_payload(data, Compression::None).expect("compress");
        assert_eq!(out, data);
    }

    #[test]
    fn test_gzip_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = compress_payload(&data, Compression::Gzip).expect("compress");
        let decompressed =
            decompress_payload(&compressed, Compression::Gzip, data.len()).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_bzip2_round_trip_strips_magic() {
        let data = b"striped stream data".repeat(16);
        let compressed = compress_payload(&data, Compression::Bzip2).expect("compress");
        // The stored stream must not carry the bzip2 magic.
        assert_ne!(&compressed[..4], b"BZh1");

        let decompressed =
            decompress_payload(&compressed, Compression::Bzip2, data.len()).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_declared_length_mismatch_rejected() {
        let data = b"some payload bytes here";
        let compressed = compress_payload(data, Compression::Gzip).expect("compress");
        let result = decompress_payload(&compressed, Compression::Gzip, data.len() + 1);
        assert!(matches!(
            result,
            Err(ContainerError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_oversize_declaration_rejected() {
        let result = decompress_payload(&[], Compression::Gzip, MAX_DECOMPRESSED_SIZE + 1);
        assert!(matches!(result, Err(ContainerError::TooLarge { .. })));
    }
}
