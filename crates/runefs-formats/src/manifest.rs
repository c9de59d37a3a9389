//! Archive metadata block decode and build.
//!
//! Each archive's own entry in the master index decompresses to a
//! manifest describing every group it owns: ids (delta-encoded), name
//! hashes when the archive flags its contents as named, CRCs, versions,
//! and per-group child file ids (delta-encoded again, with optional name
//! hashes). Field order is fixed by the client and reproduced here
//! exactly.

use std::collections::HashSet;
use std::io::Cursor;

use binrw::BinRead;
use binrw::io::{Read, Seek};
use thiserror::Error;

/// Manifest decode error type
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Delta accumulation produced an id that was already taken
    #[error("duplicate id {id} in {scope} table")]
    DuplicateId {
        /// Which table the collision happened in
        scope: &'static str,
        /// The colliding id
        id: u32,
    },

    /// Binary parsing error (truncation, I/O)
    #[error("malformed archive manifest: {0}")]
    BinRw(#[from] binrw::Error),
}

/// One child file within a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildManifest {
    /// Child file id, unique within the group.
    pub id: u32,
    /// Name hash, when the archive stores names.
    pub name_hash: Option<i32>,
}

/// One group owned by an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupManifest {
    /// Group id, unique within the archive.
    pub id: u32,
    /// Name hash, when the archive stores names.
    pub name_hash: Option<i32>,
    /// CRC-32 of the group's container bytes.
    pub crc32: u32,
    /// Group version number.
    pub version: u32,
    /// Child files in id order.
    pub children: Vec<ChildManifest>,
}

/// A decoded archive metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    /// Metadata format byte.
    pub format: u8,
    /// Whether groups and files carry name hashes.
    pub files_named: bool,
    /// Groups in id order.
    pub groups: Vec<GroupManifest>,
}

impl ArchiveManifest {
    /// Decode a manifest from a decompressed metadata payload.
    pub fn decode(data: &[u8]) -> Result<Self, ManifestError> {
        const ENDIAN: binrw::Endian = binrw::Endian::Big;
        let reader = &mut Cursor::new(data);

        let format = u8::read_options(reader, ENDIAN, ())?;
        let flags = u8::read_options(reader, ENDIAN, ())?;
        let files_named = flags & 0x01 != 0;
        let group_count = u16::read_options(reader, ENDIAN, ())? as usize;

        let group_ids = read_id_deltas(reader, group_count, "group")?;

        let group_name_hashes = if files_named {
            Some(read_hashes(reader, group_count)?)
        } else {
            None
        };

        let mut crcs = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            crcs.push(u32::read_options(reader, ENDIAN, ())?);
        }

        let mut versions = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            versions.push(u32::read_options(reader, ENDIAN, ())?);
        }

        let mut child_counts = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            child_counts.push(u16::read_options(reader, ENDIAN, ())? as usize);
        }

        let mut groups = Vec::with_capacity(group_count);
        for (index, id) in group_ids.into_iter().enumerate() {
            let children = read_id_deltas(reader, child_counts[index], "child")?
                .into_iter()
                .map(|child_id| ChildManifest {
                    id: child_id,
                    name_hash: None,
                })
                .collect();
            groups.push(GroupManifest {
                id,
                name_hash: group_name_hashes.as_ref().map(|hashes| hashes[index]),
                crc32: crcs[index],
                version: versions[index],
                children,
            });
        }

        if files_named {
            for group in &mut groups {
                for child in &mut group.children {
                    child.name_hash = Some(i32::read_options(reader, ENDIAN, ())?);
                }
            }
        }

        Ok(Self {
            format,
            files_named,
            groups,
        })
    }

    /// Build the metadata payload back out of this manifest.
    ///
    /// Groups and children must already be sorted by ascending id (the
    /// decoder always produces them that way); deltas are emitted
    /// relative to the previous id in each table.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.format);
        out.push(u8::from(self.files_named));
        out.extend_from_slice(&(self.groups.len() as u16).to_be_bytes());

        let mut previous = 0u32;
        for group in &self.groups {
            let delta = group.id.wrapping_sub(previous) as u16;
            out.extend_from_slice(&delta.to_be_bytes());
            previous = group.id;
        }

        if self.files_named {
            for group in &self.groups {
                out.extend_from_slice(&group.name_hash.unwrap_or(0).to_be_bytes());
            }
        }

        for group in &self.groups {
            out.extend_from_slice(&group.crc32.to_be_bytes());
        }

        for group in &self.groups {
            out.extend_from_slice(&group.version.to_be_bytes());
        }

        for group in &self.groups {
            out.extend_from_slice(&(group.children.len() as u16).to_be_bytes());
        }

        for group in &self.groups {
            let mut previous = 0u32;
            for child in &group.children {
                let delta = child.id.wrapping_sub(previous) as u16;
                out.extend_from_slice(&delta.to_be_bytes());
                previous = child.id;
            }
        }

        if self.files_named {
            for group in &self.groups {
                for child in &group.children {
                    out.extend_from_slice(&child.name_hash.unwrap_or(0).to_be_bytes());
                }
            }
        }

        out
    }
}

/// Read a delta-encoded id table.
///
/// Ids accumulate from zero; a delta that lands on an id already seen in
/// this table is a decode error (a zero delta is legal only where it
/// produces a fresh id, which can happen for the first entry alone).
fn read_id_deltas<R: Read + Seek>(
    reader: &mut R,
    count: usize,
    scope: &'static str,
) -> Result<Vec<u32>, ManifestError> {
    let mut ids = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);
    let mut accumulator = 0u32;

    for _ in 0..count {
        let delta = u16::read_options(reader, binrw::Endian::Big, ())?;
        accumulator = accumulator.wrapping_add(u32::from(delta));
        if !seen.insert(accumulator) {
            return Err(ManifestError::DuplicateId {
                scope,
                id: accumulator,
            });
        }
        ids.push(accumulator);
    }

    Ok(ids)
}

fn read_hashes<R: Read + Seek>(reader: &mut R, count: usize) -> Result<Vec<i32>, ManifestError> {
    let mut hashes = Vec::with_capacity(count);
    for _ in 0..count {
        hashes.push(i32::read_options(reader, binrw::Endian::Big, ())?);
    }
    Ok(hashes)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named_manifest() -> ArchiveManifest {
        ArchiveManifest {
            format: 6,
            files_named: true,
            groups: vec![
                GroupManifest {
                    id: 1,
                    name_hash: Some(92962946),
                    crc32: 0xDEADBEEF,
                    version: 12,
                    children: vec![
                        ChildManifest {
                            id: 0,
                            name_hash: Some(-77),
                        },
                        ChildManifest {
                            id: 3,
                            name_hash: Some(1400399128),
                        },
                    ],
                },
                GroupManifest {
                    id: 5,
                    name_hash: Some(-2136884405),
                    crc32: 0x01020304,
                    version: 9,
                    children: vec![ChildManifest {
                        id: 2,
                        name_hash: Some(3351329),
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_named_round_trip() {
        let manifest = named_manifest();
        let decoded = ArchiveManifest::decode(&manifest.build()).expect("decode");
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_unnamed_round_trip() {
        let manifest = ArchiveManifest {
            format: 5,
            files_named: false,
            groups: vec![GroupManifest {
                id: 0,
                name_hash: None,
                crc32: 7,
                version: 1,
                children: vec![ChildManifest {
                    id: 0,
                    name_hash: None,
                }],
            }],
        };
        let decoded = ArchiveManifest::decode(&manifest.build()).expect("decode");
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_empty_manifest_round_trip() {
        let manifest = ArchiveManifest {
            format: 6,
            files_named: false,
            groups: Vec::new(),
        };
        let decoded = ArchiveManifest::decode(&manifest.build()).expect("decode");
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_duplicate_group_id_rejected() {
        // Two groups, deltas 1 then 0: ids collapse to {1, 1}.
        let raw = [6u8, 0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00];
        assert!(matches!(
            ArchiveManifest::decode(&raw),
            Err(ManifestError::DuplicateId {
                scope: "group",
                id: 1
            })
        ));
    }

    #[test]
    fn test_first_zero_delta_is_legal() {
        // A single group with delta 0 yields the valid id 0.
        let manifest = ArchiveManifest {
            format: 6,
            files_named: false,
            groups: vec![GroupManifest {
                id: 0,
                name_hash: None,
                crc32: 0,
                version: 0,
                children: Vec::new(),
            }],
        };
        let decoded = ArchiveManifest::decode(&manifest.build()).expect("decode");
        assert_eq!(decoded.groups[0].id, 0);
    }

    #[test]
    fn test_truncated_manifest_rejected() {
        // Declares two groups but carries no id table.
        let raw = [6u8, 0, 0x00, 0x02];
        assert!(matches!(
            ArchiveManifest::decode(&raw),
            Err(ManifestError::BinRw(_))
        ));
    }

    #[test]
    fn test_group_order_is_id_order() {
        let decoded = ArchiveManifest::decode(&named_manifest().build()).expect("decode");
        let ids: Vec<u32> = decoded.groups.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }
}
