//! Container codec error types

use thiserror::Error;

/// Container-specific error type
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Unknown compression tag byte
    #[error("unknown compression tag: 0x{0:02X}")]
    UnknownCompression(u8),

    /// Input ended before the declared layout was consumed
    #[error("truncated container: needed {expected} bytes, had {actual}")]
    Truncated {
        /// Bytes the layout required
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Decompressed size did not match the declared uncompressed length
    #[error("uncompressed length mismatch: declared {expected}, got {actual}")]
    LengthMismatch {
        /// Declared uncompressed length
        expected: usize,
        /// Actual decompressed size
        actual: usize,
    },

    /// Declared length exceeds what the codec will allocate
    #[error("declared length {declared} exceeds limit of {limit} bytes")]
    TooLarge {
        /// The declared length
        declared: usize,
        /// Maximum the codec accepts
        limit: usize,
    },

    /// Compression/decompression error
    #[error("compression error: {0}")]
    Compression(String),

    /// No candidate key produced a decodable container
    #[error("missing or invalid encryption key")]
    MissingKey,
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;
