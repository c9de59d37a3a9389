//! Common state shared by archives, groups and files.
//!
//! Every store entity carries a byte buffer that is either still in its
//! on-disk container form or already decoded, plus the metadata
//! recovered around it (name hash, version, checksums). The buffer's
//! two states are distinct [`Payload`] variants rather than a boolean
//! flag, so a caller can never misread compressed bytes as payload.

use runefs_crypto::NameTable;
use runefs_crypto::name_hash::hash_name;
use runefs_formats::checksum;

/// An entity's byte buffer, tagged with its decode state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Raw container bytes as reassembled from the data channel.
    Compressed(Vec<u8>),
    /// Decoded payload bytes.
    Decoded(Vec<u8>),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Compressed(Vec::new())
    }
}

impl Payload {
    /// The buffer, whichever state it is in.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Compressed(bytes) | Self::Decoded(bytes) => bytes,
        }
    }

    /// Whether the buffer holds decoded payload bytes.
    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }

    /// Whether the buffer holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }
}

/// Metadata common to archives, groups and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMeta {
    /// Resolved name, when known.
    pub name: Option<String>,
    /// Name hash, when the owning archive stores names.
    pub name_hash: Option<i32>,
    /// Version number, from archive metadata or the container footer.
    pub version: Option<u32>,
    /// CRC-32 recorded in archive metadata.
    pub crc32: Option<u32>,
    /// SHA-256 of the decoded payload, once generated.
    pub sha256: Option<String>,
}

impl EntryMeta {
    /// Set a known name; the hash follows from it.
    pub fn set_name(&mut self, name: &str) {
        self.name_hash = Some(hash_name(name));
        self.name = Some(name.to_string());
    }

    /// Set a name hash, resolving the name through the lookup table.
    pub fn set_name_hash(&mut self, name_hash: i32, names: &NameTable) {
        self.name_hash = Some(name_hash);
        self.name = names.lookup(name_hash).map(str::to_string);
    }

    /// Display label: the name when known, the hash otherwise, or the
    /// given id as a last resort.
    pub fn label(&self, id: u32) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.name_hash
                .map_or_else(|| id.to_string(), |hash| hash.to_string())
        })
    }
}

/// A child file within a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    /// File id, unique within the owning group.
    pub id: u32,
    /// Common metadata.
    pub meta: EntryMeta,
    /// The file's bytes.
    pub payload: Payload,
}

impl File {
    /// Create an empty file entry.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Generate and record the CRC-32 of the current buffer.
    ///
    /// An empty buffer clears the checksum instead of hashing nothing.
    pub fn generate_crc32(&mut self) -> Option<u32> {
        self.meta.crc32 = checksum::crc32(self.payload.bytes());
        self.meta.crc32
    }

    /// Generate and record the SHA-256 of the current buffer.
    pub fn generate_sha256(&mut self) -> Option<String> {
        self.meta.sha256 = checksum::sha256_hex(self.payload.bytes());
        self.meta.sha256.clone()
    }
}
