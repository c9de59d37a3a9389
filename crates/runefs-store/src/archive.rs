//! Archive entities and the metadata decode state machine.

use std::collections::BTreeMap;

use tracing::{info, warn};

use runefs_formats::{ArchiveManifest, Container};

use crate::entry::{EntryMeta, File, Payload};
use crate::group::Group;
use crate::sector;
use crate::store::DecodeContext;
use crate::{MASTER_ARCHIVE_ID, Result};

/// Per-archive decode outcome tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Groups that produced a non-empty decoded payload.
    pub decoded: usize,
    /// Groups that failed or came out empty.
    pub failed: usize,
}

/// A top-level content category of the store.
///
/// Decode runs through `Packed -> Reassembled -> MetadataParsed ->
/// GroupsDecoded`: the archive's own entry in the master index is
/// reassembled and decompressed, its manifest parsed into [`Group`]
/// entries, then every group decoded in turn. A per-group failure is
/// tallied, never propagated.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    /// Archive numeric id (0-254; 255 is the master archive).
    pub id: u8,
    /// Metadata format byte, once parsed.
    pub format: Option<u8>,
    /// Whether groups and files carry name hashes.
    pub files_named: bool,
    /// Common metadata.
    pub meta: EntryMeta,
    /// The archive's metadata bytes: container form until decoded.
    pub payload: Payload,
    /// Groups keyed by id, in id order.
    pub groups: BTreeMap<u32, Group>,
    /// Group decode tally, once groups were decoded.
    pub stats: Option<DecodeStats>,
}

impl Archive {
    /// Create an empty archive entry.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A group by id.
    pub fn group(&self, id: u32) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// A group by resolved name.
    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups
            .values()
            .find(|group| group.meta.name.as_deref() == Some(name))
    }

    /// Decode this archive's metadata and, optionally, every group it
    /// owns.
    pub(crate) fn decode(&mut self, ctx: &DecodeContext<'_>, decode_groups: bool) -> Result<()> {
        if let Some(descriptor) = ctx.registry.descriptor(self.id) {
            self.meta.set_name(&descriptor.name);
        }

        // The master archive is the container of the other archives'
        // index entries; it has no metadata of its own to parse.
        if self.id == MASTER_ARCHIVE_ID {
            return Ok(());
        }

        let label = self.meta.label(u32::from(self.id));
        info!("Decoding archive {label}...");

        let raw = sector::extract(
            ctx.main_index_channel,
            ctx.data_channel,
            MASTER_ARCHIVE_ID,
            u32::from(self.id),
        )?;
        self.payload = Payload::Compressed(raw);

        // Archive metadata is never encrypted.
        let container = Container::decode(self.payload.bytes())?;
        let manifest = ArchiveManifest::decode(&container.payload)?;

        self.format = Some(manifest.format);
        self.files_named = manifest.files_named;

        self.groups.clear();
        for group_manifest in &manifest.groups {
            let mut group = Group::new(group_manifest.id);
            if let Some(hash) = group_manifest.name_hash {
                group.meta.set_name_hash(hash, ctx.names);
            }
            group.meta.crc32 = Some(group_manifest.crc32);
            group.meta.version = Some(group_manifest.version);

            for child in &group_manifest.children {
                let mut file = File::new(child.id);
                if let Some(hash) = child.name_hash {
                    file.meta.set_name_hash(hash, ctx.names);
                }
                group.files.insert(child.id, file);
            }

            self.groups.insert(group_manifest.id, group);
        }

        info!("{} group(s) found in archive {label}.", self.groups.len());
        self.payload = Payload::Decoded(container.payload);

        if decode_groups {
            self.decode_owned_groups(ctx);
        }

        Ok(())
    }

    /// Decode every group, tallying outcomes; a failed group leaves its
    /// siblings untouched.
    fn decode_owned_groups(&mut self, ctx: &DecodeContext<'_>) {
        let archive_id = self.id;
        let encryption = ctx
            .registry
            .descriptor(archive_id)
            .map_or_else(Default::default, |descriptor| descriptor.encryption());

        let mut stats = DecodeStats::default();
        for group in self.groups.values_mut() {
            match group.decode(ctx, archive_id, encryption) {
                Ok(()) if group.payload.is_decoded() && !group.payload.is_empty() => {
                    stats.decoded += 1;
                }
                Ok(()) => stats.failed += 1,
                Err(err) => {
                    warn!(
                        "Error decoding group {} in archive {archive_id}: {err}",
                        group.meta.label(group.id)
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(
            "Archive {}: {} group(s) decoded, {} failed.",
            self.meta.label(u32::from(archive_id)),
            stats.decoded,
            stats.failed
        );
        self.stats = Some(stats);
    }
}
