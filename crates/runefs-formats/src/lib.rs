//! Byte-level format codecs for the JS5 file store.
//!
//! Everything in this crate operates on in-memory buffers and must invert
//! the on-disk layout byte for byte - the store format is fixed by an
//! external client and admits no deviation. The modules map onto the
//! layers of a packed store:
//!
//! - [`container`] - the per-entry compressed container
//!   (compression tag, lengths, optional XTEA encryption, optional
//!   trailing version word)
//! - [`manifest`] - an archive's metadata block describing its groups
//!   and their child files
//! - [`group`] - the stripe interleaving that packs a multi-file group
//!   into one container payload
//! - [`checksum`] - CRC-32 and SHA-256 digests over decoded payloads

pub mod checksum;
pub mod container;
pub mod group;
pub mod manifest;

pub use container::{Compression, Container, ContainerError};
pub use group::GroupError;
pub use manifest::{ArchiveManifest, ChildManifest, GroupManifest, ManifestError};
