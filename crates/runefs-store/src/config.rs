//! Archive configuration registry.
//!
//! The store format does not carry archive names or content semantics;
//! those come from a project-maintained `archives.json` in the store's
//! config directory, keyed by archive name:
//!
//! ```json
//! {
//!     "maps": {
//!         "index": 5,
//!         "compression": "gzip",
//!         "content": {
//!             "type": "groups",
//!             "encryption": "xtea",
//!             "fileExtension": ".dat"
//!         }
//!     }
//! }
//! ```
//!
//! Absence of the config file is a logged error, not a crash: lookups
//! then return nothing and decoding proceeds with fallback labels.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, error};

use runefs_formats::Compression;

/// How an archive's groups are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Groups bundling multiple child files.
    #[default]
    Groups,
    /// Plain single-file entries.
    Files,
}

/// Encryption applied to an archive's group payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMethod {
    /// Payloads stored in the clear.
    #[default]
    None,
    /// Payloads XTEA-ciphered, keyed by group name and game version.
    Xtea,
}

/// Compression an archive's entries are expected to be written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    /// Stored verbatim.
    #[default]
    None,
    /// bzip2.
    #[serde(alias = "bzip2")]
    Bzip,
    /// gzip.
    Gzip,
}

impl CompressionKind {
    /// The container codec equivalent.
    pub fn as_compression(self) -> Compression {
        match self {
            Self::None => Compression::None,
            Self::Bzip => Compression::Bzip2,
            Self::Gzip => Compression::Gzip,
        }
    }
}

/// Content semantics of an archive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDescriptor {
    /// Whether entries are multi-file groups or plain files.
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Encryption applied to group payloads.
    pub encryption: EncryptionMethod,
    /// Extension used when entries are unpacked to disk.
    pub file_extension: Option<String>,
    /// Whether unpacked entries keep their resolved names.
    pub save_file_names: bool,
    /// Well-known entry names, seeded into the name table.
    pub default_file_names: HashMap<String, u32>,
}

/// Configuration of one archive.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveDescriptor {
    /// Display name; the key in `archives.json`.
    #[serde(skip)]
    pub name: String,
    /// Archive numeric id.
    pub index: u8,
    /// Expected metadata format byte, when pinned.
    #[serde(default)]
    pub format: Option<u8>,
    /// Compression entries are written with.
    #[serde(default)]
    pub compression: CompressionKind,
    /// Content semantics, when described.
    #[serde(default)]
    pub content: Option<ContentDescriptor>,
}

impl ArchiveDescriptor {
    /// Encryption declared for this archive's content.
    pub fn encryption(&self) -> EncryptionMethod {
        self.content
            .as_ref()
            .map_or(EncryptionMethod::None, |content| content.encryption)
    }
}

/// Registry of archive descriptors, looked up by id or name.
#[derive(Debug, Clone, Default)]
pub struct ArchiveRegistry {
    archives: BTreeMap<u8, ArchiveDescriptor>,
}

impl ArchiveRegistry {
    /// Create an empty registry; every lookup misses.
    pub fn empty() -> Self {
        Self {
            archives: BTreeMap::new(),
        }
    }

    /// Load `archives.json` from the given path.
    ///
    /// A missing or malformed file is logged and yields an empty
    /// registry.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                error!("Error loading archive config {}: {err}", path.display());
                return Self::empty();
            }
        };

        let raw: HashMap<String, ArchiveDescriptor> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(err) => {
                error!("Error parsing archive config {}: {err}", path.display());
                return Self::empty();
            }
        };

        let mut archives = BTreeMap::new();
        for (name, mut descriptor) in raw {
            descriptor.name = name;
            archives.insert(descriptor.index, descriptor);
        }
        debug!("Loaded {} archive descriptor(s)", archives.len());

        Self { archives }
    }

    /// Register a descriptor directly.
    pub fn add(&mut self, descriptor: ArchiveDescriptor) {
        self.archives.insert(descriptor.index, descriptor);
    }

    /// Descriptor for an archive id.
    pub fn descriptor(&self, index: u8) -> Option<&ArchiveDescriptor> {
        self.archives.get(&index)
    }

    /// Numeric id registered under an archive name.
    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.archives
            .values()
            .find(|descriptor| descriptor.name == name)
            .map(|descriptor| descriptor.index)
    }

    /// All descriptors in id order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ArchiveDescriptor> {
        self.archives.values()
    }

    /// Number of registered archives.
    pub fn len(&self) -> usize {
        self.archives.len()
    }

    /// Whether the registry holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}
