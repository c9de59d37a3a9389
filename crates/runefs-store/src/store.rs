//! Store construction and whole-tree decode orchestration.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::{error, info, warn};

use runefs_crypto::{NameTable, XteaKeyStore};

use crate::archive::Archive;
use crate::config::ArchiveRegistry;
use crate::{
    CONFIG_DIR, DATA_FILE, INDEX_FILE_PREFIX, MAIN_INDEX_FILE, MASTER_ARCHIVE_ID, Result,
    STORE_DIR, StoreError,
};

/// Options for opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Store root directory, holding the `js5/` and `config/`
    /// subdirectories.
    pub path: PathBuf,
    /// Game version (build number) used to pick encryption keys.
    pub game_version: Option<u32>,
    /// Skip decryption entirely, decoding nominally encrypted archives
    /// as plain containers.
    pub xtea_disabled: bool,
}

impl StoreOptions {
    /// Options for a store rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            game_version: None,
            xtea_disabled: false,
        }
    }

    /// Set the game version keys are selected for.
    pub fn with_game_version(mut self, game_version: u32) -> Self {
        self.game_version = Some(game_version);
        self
    }

    /// Disable XTEA decryption.
    pub fn without_xtea(mut self) -> Self {
        self.xtea_disabled = true;
        self
    }
}

/// Everything a decode step needs to see, borrowed from the store.
///
/// The channel buffers are shared and read-only for the life of the
/// store; decode steps copy derived data into fresh buffers.
pub(crate) struct DecodeContext<'a> {
    /// The shared data channel.
    pub data_channel: &'a [u8],
    /// The master index channel (archive metadata entries).
    pub main_index_channel: &'a [u8],
    /// The current archive's own index channel, when one exists.
    pub index_channel: Option<&'a [u8]>,
    /// Archive configuration lookups.
    pub registry: &'a ArchiveRegistry,
    /// Name hash resolution.
    pub names: &'a NameTable,
    /// Encryption key candidates.
    pub keys: &'a XteaKeyStore,
    /// Game version keys are selected for.
    pub game_version: Option<u32>,
    /// Whether decryption is switched off.
    pub xtea_disabled: bool,
}

/// A read-only snapshot of a packed JS5 store.
#[derive(Debug)]
pub struct Store {
    options: StoreOptions,
    registry: ArchiveRegistry,
    names: NameTable,
    keys: XteaKeyStore,
    data_channel: Vec<u8>,
    main_index_channel: Vec<u8>,
    index_channels: BTreeMap<u8, Vec<u8>>,
    archives: BTreeMap<u8, Archive>,
}

impl Store {
    /// Open the store at `options.path`.
    ///
    /// Reads both required channels (`main_file_cache.dat2` and
    /// `main_file_cache.idx255`) fully into memory, discovers the
    /// per-archive index channels, and loads the configuration
    /// services. A missing required channel or an invalid store
    /// directory is fatal; missing configuration files merely degrade
    /// lookups.
    pub fn open(options: StoreOptions) -> Result<Self> {
        let js5_dir = options.path.join(STORE_DIR);
        if !js5_dir.is_dir() {
            return Err(StoreError::NotADirectory(js5_dir));
        }

        let data_path = js5_dir.join(DATA_FILE);
        if !data_path.is_file() {
            return Err(StoreError::MissingStoreFile { name: DATA_FILE });
        }
        let main_index_path = js5_dir.join(MAIN_INDEX_FILE);
        if !main_index_path.is_file() {
            return Err(StoreError::MissingStoreFile {
                name: MAIN_INDEX_FILE,
            });
        }

        let data_channel = fs::read(&data_path)?;
        let main_index_channel = fs::read(&main_index_path)?;

        let config_dir = options.path.join(CONFIG_DIR);
        let registry = ArchiveRegistry::load(&config_dir.join("archives.json"));
        let mut names = NameTable::load(&config_dir.join("name-hashes.json"));
        let keys = XteaKeyStore::load(&config_dir.join("xtea"));

        // Seed the name table with everything the registry knows.
        for descriptor in registry.descriptors() {
            names.insert(&descriptor.name);
            if let Some(content) = &descriptor.content {
                for name in content.default_file_names.keys() {
                    names.insert(name);
                }
            }
        }

        let mut index_channels = BTreeMap::new();
        let mut archives = BTreeMap::new();
        archives.insert(MASTER_ARCHIVE_ID, Archive::new(MASTER_ARCHIVE_ID));

        for entry in fs::read_dir(&js5_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name == DATA_FILE || name == MAIN_INDEX_FILE {
                continue;
            }
            let Some(suffix) = name.strip_prefix(INDEX_FILE_PREFIX) else {
                continue;
            };

            match suffix.parse::<u8>() {
                Ok(id) if id != MASTER_ARCHIVE_ID => {
                    index_channels.insert(id, fs::read(entry.path())?);
                    archives.insert(id, Archive::new(id));
                }
                _ => error!("Index file {name} does not have a valid archive id extension."),
            }
        }

        info!(
            "Opened JS5 store at {} with {} archive(s).",
            options.path.display(),
            archives.len() - 1
        );

        Ok(Self {
            options,
            registry,
            names,
            keys,
            data_channel,
            main_index_channel,
            index_channels,
            archives,
        })
    }

    /// Decode every archive, and with `decode_groups` every group and
    /// child file.
    ///
    /// Failures are logged and tallied per archive; no archive blocks
    /// another.
    pub fn decode(&mut self, decode_groups: bool) {
        let ids: Vec<u8> = self.archives.keys().copied().collect();
        for id in ids {
            if let Err(err) = self.decode_archive(id, decode_groups) {
                warn!("Error decoding archive {id}: {err}");
            }
        }
    }

    /// Decode a single archive by id.
    pub fn decode_archive(&mut self, id: u8, decode_groups: bool) -> Result<()> {
        let ctx = DecodeContext {
            data_channel: &self.data_channel,
            main_index_channel: &self.main_index_channel,
            index_channel: self.index_channels.get(&id).map(Vec::as_slice),
            registry: &self.registry,
            names: &self.names,
            keys: &self.keys,
            game_version: self.options.game_version,
            xtea_disabled: self.options.xtea_disabled,
        };

        let archive = self
            .archives
            .get_mut(&id)
            .ok_or_else(|| StoreError::UnknownArchive(id.to_string()))?;
        archive.decode(&ctx, decode_groups)
    }

    /// Decode a single archive by registered name.
    pub fn decode_archive_by_name(&mut self, name: &str, decode_groups: bool) -> Result<()> {
        let id = self
            .registry
            .index_of(name)
            .ok_or_else(|| StoreError::UnknownArchive(name.to_string()))?;
        self.decode_archive(id, decode_groups)
    }

    /// An archive by id.
    pub fn archive(&self, id: u8) -> Option<&Archive> {
        self.archives.get(&id)
    }

    /// An archive by registered name.
    pub fn archive_by_name(&self, name: &str) -> Option<&Archive> {
        self.registry
            .index_of(name)
            .and_then(|id| self.archives.get(&id))
    }

    /// All archives in id order, the master archive included.
    pub fn archives(&self) -> impl Iterator<Item = &Archive> {
        self.archives.values()
    }

    /// The archive configuration registry.
    pub fn registry(&self) -> &ArchiveRegistry {
        &self.registry
    }

    /// The name lookup table.
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// The encryption key store.
    pub fn keys(&self) -> &XteaKeyStore {
        &self.keys
    }

    /// The options the store was opened with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }
}
