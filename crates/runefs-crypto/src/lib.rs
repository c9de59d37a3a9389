//! Cryptographic primitives for the JS5 file store.
//!
//! The JS5 cache encrypts the group payloads of certain archives with
//! XTEA, keyed per group name and per game version. This crate provides:
//!
//! - [`xtea`] - the XTEA block cipher as applied to container payloads
//! - [`keystore`] - lookup of candidate key sets by group name and version
//! - [`name_hash`] - the 32-bit signed polynomial hash used as on-disk
//!   identity for named groups and files, plus the reverse lookup table

pub mod keystore;
pub mod name_hash;
pub mod xtea;

pub use keystore::{XteaKeySet, XteaKeyStore};
pub use name_hash::{NameTable, hash_name};
pub use xtea::XteaKey;

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key size
    #[error("invalid key size: expected {expected} words, got {actual}")]
    InvalidKeySize {
        /// Expected key size in 32-bit words
        expected: usize,
        /// Actual key size in 32-bit words
        actual: usize,
    },

    /// Invalid key format
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
}
