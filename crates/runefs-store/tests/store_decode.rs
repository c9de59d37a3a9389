//! End-to-end decode of synthetic on-disk stores.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use binrw::BinWrite;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use runefs_crypto::name_hash::hash_name;
use runefs_crypto::xtea::{self, XteaKey};
use runefs_formats::group::pack_children;
use runefs_formats::{
    ArchiveManifest, ChildManifest, Compression, Container, GroupManifest,
};
use runefs_store::sector::{
    INDEX_ENTRY_SIZE, IndexEntry, SECTOR_PAYLOAD_SIZE, SECTOR_SIZE, SectorHeader,
};
use runefs_store::{Store, StoreError, StoreOptions};

/// Builds the `js5/` channel files of a synthetic store.
#[derive(Default)]
struct ChannelBuilder {
    data: Vec<u8>,
    indexes: BTreeMap<u8, Vec<u8>>,
}

impl ChannelBuilder {
    fn new() -> Self {
        let mut builder = Self::default();
        // The master index channel must exist even when empty.
        builder.indexes.insert(255, Vec::new());
        builder
    }

    /// Append `bytes` as a sector chain owned by `archive_id` and
    /// record it in that archive's index channel under `file_id`.
    fn put(&mut self, archive_id: u8, file_id: u32, bytes: &[u8]) {
        let first_sector = (self.data.len() / SECTOR_SIZE) as u32;
        let chunks: Vec<&[u8]> = bytes.chunks(SECTOR_PAYLOAD_SIZE).collect();

        for (sequence, chunk) in chunks.iter().enumerate() {
            let sector_number = first_sector + sequence as u32;
            let header = SectorHeader {
                file_id: file_id as u16,
                sequence: sequence as u16,
                next_sector: if sequence + 1 < chunks.len() {
                    sector_number + 1
                } else {
                    0
                },
                archive_id,
            };
            let mut cursor = Cursor::new(Vec::new());
            header
                .write_options(&mut cursor, binrw::Endian::Big, ())
                .expect("write sector header");
            self.data.extend_from_slice(&cursor.into_inner());

            let mut payload = chunk.to_vec();
            payload.resize(SECTOR_PAYLOAD_SIZE, 0);
            self.data.extend_from_slice(&payload);
        }

        let index = self.indexes.entry(archive_id).or_default();
        let offset = file_id as usize * INDEX_ENTRY_SIZE;
        if index.len() < offset {
            index.resize(offset, 0);
        }
        let entry = IndexEntry {
            length: bytes.len() as u32,
            first_sector,
        };
        let mut cursor = Cursor::new(Vec::new());
        entry
            .write_options(&mut cursor, binrw::Endian::Big, ())
            .expect("write index entry");
        index.extend_from_slice(&cursor.into_inner());
    }

    /// Write the channel files under `<root>/js5/`.
    fn write(self, root: &Path) {
        let js5_dir = root.join("js5");
        fs::create_dir_all(&js5_dir).expect("create js5 dir");
        fs::write(js5_dir.join("main_file_cache.dat2"), &self.data).expect("write data channel");
        for (archive_id, index) in self.indexes {
            fs::write(
                js5_dir.join(format!("main_file_cache.idx{archive_id}")),
                index,
            )
            .expect("write index channel");
        }
    }
}

/// Encrypt container bytes the way the store writer would: everything
/// after the kind and compressed-length fields, minus the version
/// footer when one is present.
fn encrypt_container(raw: &mut [u8], key: &XteaKey) {
    let compressed_len = i64::from(u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]));
    let total = raw.len() as i64;
    let end = if total - (compressed_len + 5 + 4) >= 2 {
        raw.len() - 2
    } else {
        raw.len()
    };
    xtea::encrypt(&mut raw[5..end], key);
}

#[test]
fn test_open_rejects_missing_store_dir() {
    let root = TempDir::new().expect("temp dir");
    let result = Store::open(StoreOptions::new(root.path()));
    assert!(matches!(result, Err(StoreError::NotADirectory(_))));
}

#[test]
fn test_open_rejects_missing_data_channel() {
    let root = TempDir::new().expect("temp dir");
    fs::create_dir_all(root.path().join("js5")).expect("create js5 dir");

    let result = Store::open(StoreOptions::new(root.path()));
    assert!(matches!(
        result,
        Err(StoreError::MissingStoreFile {
            name: "main_file_cache.dat2"
        })
    ));
}

#[test]
fn test_open_rejects_missing_master_index() {
    let root = TempDir::new().expect("temp dir");
    let js5_dir = root.path().join("js5");
    fs::create_dir_all(&js5_dir).expect("create js5 dir");
    fs::write(js5_dir.join("main_file_cache.dat2"), []).expect("write data channel");

    let result = Store::open(StoreOptions::new(root.path()));
    assert!(matches!(
        result,
        Err(StoreError::MissingStoreFile {
            name: "main_file_cache.idx255"
        })
    ));
}

#[test]
fn test_decode_plain_archive() {
    let root = TempDir::new().expect("temp dir");

    // Group 1: one child, container spanning several sectors.
    let single_payload = b"single child payload ".repeat(64);
    let group1 = Container::encode(&single_payload, Compression::None, Some(3)).expect("encode");

    // Group 3: three children, striped and bzip2-compressed.
    let children = vec![
        b"alpha".to_vec(),
        b"bravo-bravo".to_vec(),
        b"c".to_vec(),
    ];
    let striped = pack_children(&children, 2);
    let group3 = Container::encode(&striped, Compression::Bzip2, None).expect("encode");

    let manifest = ArchiveManifest {
        format: 6,
        files_named: false,
        groups: vec![
            GroupManifest {
                id: 1,
                name_hash: None,
                crc32: 0,
                version: 7,
                children: vec![ChildManifest {
                    id: 0,
                    name_hash: None,
                }],
            },
            GroupManifest {
                id: 3,
                name_hash: None,
                crc32: 0,
                version: 9,
                children: vec![
                    ChildManifest {
                        id: 0,
                        name_hash: None,
                    },
                    ChildManifest {
                        id: 1,
                        name_hash: None,
                    },
                    ChildManifest {
                        id: 2,
                        name_hash: None,
                    },
                ],
            },
        ],
    };
    let metadata =
        Container::encode(&manifest.build(), Compression::Gzip, None).expect("encode");

    let mut channels = ChannelBuilder::new();
    channels.put(255, 0, &metadata);
    channels.put(0, 1, &group1);
    channels.put(0, 3, &group3);
    channels.write(root.path());

    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).expect("create config dir");
    fs::write(
        config_dir.join("archives.json"),
        r#"{ "binary": { "index": 0, "compression": "gzip" } }"#,
    )
    .expect("write archives.json");

    let mut store = Store::open(StoreOptions::new(root.path())).expect("open store");
    store.decode(true);

    let archive = store.archive_by_name("binary").expect("binary archive");
    assert_eq!(archive.id, 0);
    assert_eq!(archive.format, Some(6));
    assert!(!archive.files_named);

    let stats = archive.stats.expect("stats");
    assert_eq!(stats.decoded, 2);
    assert_eq!(stats.failed, 0);

    // Single-child group: the child's bytes are the group's bytes, and
    // the container footer overrode the metadata version.
    let group1 = archive.group(1).expect("group 1");
    assert_eq!(group1.meta.version, Some(3));
    assert_eq!(group1.payload.bytes(), single_payload.as_slice());
    assert_eq!(
        group1.file(0).expect("child").payload.bytes(),
        single_payload.as_slice()
    );

    // Striped group: each child came back out exactly.
    let group3 = archive.group(3).expect("group 3");
    assert_eq!(group3.meta.version, Some(9));
    for (id, expected) in children.iter().enumerate() {
        let file = group3.file(id as u32).expect("child");
        assert_eq!(file.payload.bytes(), expected.as_slice());
    }

    // The master archive exists but is never decoded as content.
    let master = store.archive(255).expect("master archive");
    assert!(master.groups.is_empty());
}

fn build_encrypted_store(root: &Path, key: XteaKey) {
    let landscape = b"landscape tile deltas ".repeat(40);
    let mut container =
        Container::encode(&landscape, Compression::Gzip, None).expect("encode");
    encrypt_container(&mut container, &key);

    let name_hash = hash_name("l40_55");
    let manifest = ArchiveManifest {
        format: 6,
        files_named: true,
        groups: vec![GroupManifest {
            id: 0,
            name_hash: Some(name_hash),
            crc32: 0,
            version: 1,
            children: vec![ChildManifest {
                id: 0,
                name_hash: Some(name_hash),
            }],
        }],
    };
    let metadata =
        Container::encode(&manifest.build(), Compression::Gzip, None).expect("encode");

    let mut channels = ChannelBuilder::new();
    channels.put(255, 5, &metadata);
    channels.put(5, 0, &container);
    channels.write(root);

    let config_dir = root.join("config");
    fs::create_dir_all(config_dir.join("xtea")).expect("create config dirs");
    fs::write(
        config_dir.join("archives.json"),
        r#"{
            "maps": {
                "index": 5,
                "compression": "gzip",
                "content": {
                    "type": "groups",
                    "encryption": "xtea",
                    "defaultFileNames": { "l40_55": 0 }
                }
            }
        }"#,
    )
    .expect("write archives.json");

    // The requested version's key file plus a decoy for another build.
    fs::write(
        config_dir.join("xtea").join("462.json"),
        format!(
            r#"{{ "l40_55": [{}, {}, {}, {}] }}"#,
            key.0[0], key.0[1], key.0[2], key.0[3]
        ),
    )
    .expect("write 462.json");
    fs::write(
        config_dir.join("xtea").join("435.json"),
        r#"{ "l40_55": [101, 102, 103, 104] }"#,
    )
    .expect("write 435.json");
}

#[test]
fn test_decode_encrypted_archive_with_versioned_keys() {
    let root = TempDir::new().expect("temp dir");
    let key = XteaKey([0x1A2B3C4D, -0x70605040, 0x11223344, -0x0F0E0D0C]);
    build_encrypted_store(root.path(), key);

    let mut store =
        Store::open(StoreOptions::new(root.path()).with_game_version(462)).expect("open store");
    store.decode(true);

    let archive = store.archive_by_name("maps").expect("maps archive");
    let stats = archive.stats.expect("stats");
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.failed, 0);

    let group = archive.group_by_name("l40_55").expect("landscape group");
    let expected = b"landscape tile deltas ".repeat(40);
    assert_eq!(group.payload.bytes(), expected.as_slice());
    assert_eq!(
        group.file(0).expect("child").payload.bytes(),
        expected.as_slice()
    );
}

#[test]
fn test_encrypted_archive_fails_soft_with_decryption_disabled() {
    let root = TempDir::new().expect("temp dir");
    let key = XteaKey([1, 2, 3, 4]);
    build_encrypted_store(root.path(), key);

    let mut store = Store::open(
        StoreOptions::new(root.path())
            .with_game_version(462)
            .without_xtea(),
    )
    .expect("open store");
    store.decode(true);

    // The ciphered container cannot decode as plain bytes; the group is
    // tallied as failed and left undecoded, without poisoning the rest
    // of the archive walk.
    let archive = store.archive_by_name("maps").expect("maps archive");
    let stats = archive.stats.expect("stats");
    assert_eq!(stats.decoded, 0);
    assert_eq!(stats.failed, 1);

    let group = archive.group(0).expect("group");
    assert!(!group.payload.is_decoded());
}
