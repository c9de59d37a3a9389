//! Group entities and their decode step.

use std::collections::BTreeMap;

use runefs_formats::Container;
use runefs_formats::group::split_children;

use crate::config::EncryptionMethod;
use crate::entry::{EntryMeta, File, Payload};
use crate::sector;
use crate::store::DecodeContext;
use crate::{Result, StoreError};

/// A logical file unit within an archive, bundling one or more child
/// files.
///
/// The set of child ids is fixed when the archive metadata is parsed
/// and never changes afterwards; decoding only fills in their bytes.
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// Group id, unique within the owning archive.
    pub id: u32,
    /// Common metadata.
    pub meta: EntryMeta,
    /// The group's bytes: container form until decoded.
    pub payload: Payload,
    /// Child files keyed by id, in id order.
    pub files: BTreeMap<u32, File>,
}

impl Group {
    /// Create an empty group entry.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A child file by id.
    pub fn file(&self, id: u32) -> Option<&File> {
        self.files.get(&id)
    }

    /// A child file by resolved name.
    pub fn file_by_name(&self, name: &str) -> Option<&File> {
        self.files
            .values()
            .find(|file| file.meta.name.as_deref() == Some(name))
    }

    /// Decode this group: reassemble its container bytes if they are
    /// not present yet, decode the container (trialing XTEA keys when
    /// the archive calls for them), and split the payload over the
    /// child files.
    ///
    /// Re-entering an already decoded group is a no-op.
    pub(crate) fn decode(
        &mut self,
        ctx: &DecodeContext<'_>,
        archive_id: u8,
        encryption: EncryptionMethod,
    ) -> Result<()> {
        if self.payload.is_decoded() {
            return Ok(());
        }

        if self.payload.is_empty() {
            let index_channel = ctx
                .index_channel
                .ok_or(StoreError::MissingIndexChannel {
                    archive: archive_id,
                })?;
            let raw = sector::extract(index_channel, ctx.data_channel, archive_id, self.id)?;
            self.payload = Payload::Compressed(raw);
        }

        let container = match encryption {
            EncryptionMethod::Xtea if !ctx.xtea_disabled => {
                let candidates = self.meta.name.as_deref().map_or_else(Vec::new, |name| {
                    ctx.keys.candidates(name, ctx.game_version)
                });
                Container::decode_encrypted(self.payload.bytes(), &candidates)?
            }
            _ => Container::decode(self.payload.bytes())?,
        };

        if let Some(version) = container.version {
            self.meta.version = Some(u32::from(version));
        }

        match self.files.len() {
            0 => {}
            1 => {
                // Degenerate case: the child's bytes are the group's
                // bytes verbatim, and it inherits the group's name.
                let name_hash = self.meta.name_hash;
                if let Some(file) = self.files.values_mut().next() {
                    if let Some(hash) = name_hash {
                        file.meta.set_name_hash(hash, ctx.names);
                    }
                    file.payload = Payload::Decoded(container.payload.clone());
                }
            }
            count => {
                let buffers = split_children(&container.payload, count)?;
                for (file, bytes) in self.files.values_mut().zip(buffers) {
                    file.payload = Payload::Decoded(bytes);
                }
            }
        }

        self.payload = Payload::Decoded(container.payload);
        Ok(())
    }
}
