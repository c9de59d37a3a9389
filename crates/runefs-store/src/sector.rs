//! Sector chain reassembly.
//!
//! The data channel is divided into fixed 520-byte physical sectors:
//! an 8-byte header (file id, running sequence number, next sector
//! number, owning archive id) followed by 512 payload bytes. A logical
//! file is scattered over a singly-linked chain of sectors; its index
//! channel record gives the total length and the first sector number:
//!
//! ```text
//! index record (6 bytes):  length: u24 BE, first sector: u24 BE
//! sector (520 bytes):      file id: u16, sequence: u16,
//!                          next sector: u24, archive id: u8,
//!                          payload: [u8; 512]
//! ```
//!
//! [`extract`] walks the chain and verifies every header against the
//! requested file; any mismatch aborts reassembly for that file with a
//! [`StoreError::CorruptSector`], leaving other files untouched.

use std::io::Cursor;

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite};

use crate::{Result, StoreError};

/// Size of one index channel record.
pub const INDEX_ENTRY_SIZE: usize = 6;

/// Size of one physical sector, header included.
pub const SECTOR_SIZE: usize = 520;

/// Size of a sector header.
pub const SECTOR_HEADER_SIZE: usize = 8;

/// Payload bytes carried by one sector.
pub const SECTOR_PAYLOAD_SIZE: usize = SECTOR_SIZE - SECTOR_HEADER_SIZE;

fn read_u24<R: Read + Seek>(reader: &mut R) -> BinResult<u32> {
    let mut bytes = [0u8; 3];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

fn write_u24<W: Write + Seek>(writer: &mut W, value: u32) -> BinResult<()> {
    writer.write_all(&value.to_be_bytes()[1..])?;
    Ok(())
}

/// One record in an index channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Total length of the file in bytes.
    pub length: u32,
    /// Number of the first sector in the file's chain.
    pub first_sector: u32,
}

impl BinRead for IndexEntry {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(Self {
            length: read_u24(reader)?,
            first_sector: read_u24(reader)?,
        })
    }
}

impl BinWrite for IndexEntry {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        write_u24(writer, self.length)?;
        write_u24(writer, self.first_sector)
    }
}

/// Header of one physical sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    /// Id of the file this sector belongs to.
    pub file_id: u16,
    /// Position of this sector within the file's chain, counted from 0.
    pub sequence: u16,
    /// Number of the next sector in the chain.
    pub next_sector: u32,
    /// Id of the archive that owns the file.
    pub archive_id: u8,
}

impl BinRead for SectorHeader {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let endian = binrw::Endian::Big;
        Ok(Self {
            file_id: u16::read_options(reader, endian, ())?,
            sequence: u16::read_options(reader, endian, ())?,
            next_sector: read_u24(reader)?,
            archive_id: u8::read_options(reader, endian, ())?,
        })
    }
}

impl BinWrite for SectorHeader {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let endian = binrw::Endian::Big;
        self.file_id.write_options(writer, endian, ())?;
        self.sequence.write_options(writer, endian, ())?;
        write_u24(writer, self.next_sector)?;
        self.archive_id.write_options(writer, endian, ())
    }
}

/// Reassemble a file from its sector chain.
///
/// Looks the file up in `index_channel`, then walks the chain through
/// `data_channel`, verifying on every step that the sector belongs to
/// the requested file, the owning archive, and the expected position in
/// the chain. A declared length of zero yields an empty buffer without
/// touching the data channel at all.
pub fn extract(
    index_channel: &[u8],
    data_channel: &[u8],
    archive_id: u8,
    file_id: u32,
) -> Result<Vec<u8>> {
    let record_offset = file_id as usize * INDEX_ENTRY_SIZE;
    let record_end = record_offset + INDEX_ENTRY_SIZE;
    if record_end > index_channel.len() {
        return Err(StoreError::NotFound {
            archive: archive_id,
            file: file_id,
        });
    }

    let mut cursor = Cursor::new(&index_channel[record_offset..record_end]);
    let entry = IndexEntry::read_options(&mut cursor, binrw::Endian::Big, ())
        .map_err(|e| corrupt(archive_id, file_id, format!("unreadable index record: {e}")))?;

    let length = entry.length as usize;
    if length == 0 {
        return Ok(Vec::new());
    }

    let mut data = Vec::with_capacity(length);
    let mut remaining = length;
    let mut expected_sequence = 0u16;
    let mut sector = entry.first_sector as usize;

    while remaining > 0 {
        let start = sector * SECTOR_SIZE;
        let end = start + SECTOR_SIZE;
        if end > data_channel.len() {
            return Err(corrupt(
                archive_id,
                file_id,
                format!("sector {sector} lies outside the data channel"),
            ));
        }

        let mut cursor = Cursor::new(&data_channel[start..start + SECTOR_HEADER_SIZE]);
        let header = SectorHeader::read_options(&mut cursor, binrw::Endian::Big, ())
            .map_err(|e| corrupt(archive_id, file_id, format!("unreadable sector header: {e}")))?;

        if header.archive_id != archive_id {
            return Err(corrupt(
                archive_id,
                file_id,
                format!(
                    "archive id mismatch: expected {archive_id}, found {}",
                    header.archive_id
                ),
            ));
        }
        if u32::from(header.file_id) != file_id {
            return Err(corrupt(
                archive_id,
                file_id,
                format!("file id mismatch: expected {file_id}, found {}", header.file_id),
            ));
        }
        if header.sequence != expected_sequence {
            return Err(corrupt(
                archive_id,
                file_id,
                format!(
                    "sequence mismatch: expected {expected_sequence}, found {}",
                    header.sequence
                ),
            ));
        }

        let take = remaining.min(SECTOR_PAYLOAD_SIZE);
        let payload_start = start + SECTOR_HEADER_SIZE;
        data.extend_from_slice(&data_channel[payload_start..payload_start + take]);
        remaining -= take;

        expected_sequence = expected_sequence.wrapping_add(1);
        sector = header.next_sector as usize;
    }

    Ok(data)
}

fn corrupt(archive: u8, file: u32, detail: String) -> StoreError {
    StoreError::CorruptSector {
        archive,
        file,
        detail,
    }
}
