//! Packed JS5 file store reader.
//!
//! A JS5 store is a pair of flat binary channels: one data channel
//! (`main_file_cache.dat2`) holding fixed 520-byte sectors, and one
//! index channel per archive (`main_file_cache.idxN`) holding 6-byte
//! records that point at each entry's first sector. The master index
//! (`main_file_cache.idx255`) describes the archives themselves.
//!
//! [`Store::open`] snapshots the channels into memory and discovers the
//! archives; [`Store::decode`] then reassembles and decodes the whole
//! tree - archive metadata first, then every group and child file. A
//! failure decoding one entry never blocks its siblings: soft failures
//! are logged, tallied per archive, and leave the entity in its prior
//! state. Only construction-time problems (missing required channel
//! files) are fatal.
//!
//! # Example
//!
//! ```rust,ignore
//! use runefs_store::{Store, StoreOptions};
//!
//! let mut store = Store::open(StoreOptions::new("/path/to/store"))?;
//! store.decode(true);
//!
//! let maps = store.archive_by_name("maps").expect("maps archive");
//! println!("decoded {} groups", maps.stats.as_ref().map_or(0, |s| s.decoded));
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub mod archive;
pub mod config;
pub mod entry;
pub mod group;
pub mod sector;
pub mod store;

pub use archive::{Archive, DecodeStats};
pub use config::{ArchiveDescriptor, ArchiveRegistry, ContentType, EncryptionMethod};
pub use entry::{EntryMeta, File, Payload};
pub use group::Group;
pub use store::{Store, StoreOptions};

use runefs_formats::{ContainerError, GroupError, ManifestError};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while opening or decoding a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store path is not a directory.
    #[error("{0} is not a valid store directory")]
    NotADirectory(PathBuf),

    /// A required channel file is absent.
    #[error("required store file {name} could not be found")]
    MissingStoreFile {
        /// File name that was expected in the store directory.
        name: &'static str,
    },

    /// No archive is registered under the given name.
    #[error("unknown archive name: {0}")]
    UnknownArchive(String),

    /// An archive has no index channel on disk.
    #[error("archive {archive} has no index channel")]
    MissingIndexChannel {
        /// Archive numeric id.
        archive: u8,
    },

    /// File id falls outside the index channel.
    #[error("file {file} not found in archive {archive} index")]
    NotFound {
        /// Archive numeric id.
        archive: u8,
        /// File numeric id.
        file: u32,
    },

    /// Sector chain verification failed.
    #[error("corrupt sector chain for file {file} in archive {archive}: {detail}")]
    CorruptSector {
        /// Archive numeric id.
        archive: u8,
        /// File numeric id.
        file: u32,
        /// What the chain walk tripped over.
        detail: String,
    },

    /// Container decode failed.
    #[error("container decode failed: {0}")]
    Container(#[from] ContainerError),

    /// Archive metadata decode failed.
    #[error("archive metadata decode failed: {0}")]
    Manifest(#[from] ManifestError),

    /// Group stripe decode failed.
    #[error("group decode failed: {0}")]
    Group(#[from] GroupError),
}

/// Subdirectory of the store path holding the packed channels.
pub const STORE_DIR: &str = "js5";

/// Subdirectory of the store path holding configuration files.
pub const CONFIG_DIR: &str = "config";

/// Data channel file name.
pub const DATA_FILE: &str = "main_file_cache.dat2";

/// Master index channel file name.
pub const MAIN_INDEX_FILE: &str = "main_file_cache.idx255";

/// Prefix shared by every index channel file.
pub const INDEX_FILE_PREFIX: &str = "main_file_cache.idx";

/// Reserved id of the master archive, whose index channel describes the
/// other archives. It is never decoded as regular content.
pub const MASTER_ARCHIVE_ID: u8 = 255;
