//! On-disk layout of a column segment.
//!
//! All integers are little-endian. The header persists the column's storage
//! attributes so a scan can rebuild its decompression state from the file
//! alone.

use crate::attributes::StorageAttributes;
use crate::registry::MAX_NAME_LEN;
use crate::types::TypeId;

/// "BCSEG1\n" padded with NULs to 14 bytes.
pub const MAGIC: &[u8; 14] = b"BCSEG1\n\x00\x00\x00\x00\x00\x00\x00";

pub const FORMAT_VERSION: u16 = 1;

/// NUL-padded compression type name; one byte more than the longest name.
pub const COMPTYPE_FIELD_LEN: usize = MAX_NAME_LEN + 1;

/// Header layout:
///
/// | offset | field       | type     |
/// |--------|-------------|----------|
/// | 0      | magic       | [u8; 14] |
/// | 14     | version     | u16      |
/// | 16     | typid       | u32      |
/// | 20     | complevel   | i32      |
/// | 24     | blocksize   | u32      |
/// | 28     | block_count | u64      |
/// | 36     | flags       | u64      |
/// | 44     | comptype    | [u8; 64] |
/// | 108    | reserved    | [u8; 20] |
pub const HEADER_SIZE: u64 = 128;

const COMPTYPE_OFFSET: usize = 44;

/// Index entry layout: offset u64, stored_len u32, raw_len u32, checksum u64,
/// flags u16, then six bytes of padding.
pub const BLOCK_ENTRY_SIZE: u64 = 32;

/// The footer is the u64 offset of the block index.
pub const FOOTER_SIZE: u64 = 8;

/// Header flag: every index entry carries the xxh3-64 of its stored payload.
pub const FLAG_HAS_CHECKSUM: u64 = 0x1;

/// Block flag: compression did not shrink the block, payload is the raw bytes.
pub const BLOCK_STORED_RAW: u16 = 0x1;

fn le<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub version: u16,
    /// Storage attributes the segment was written with.
    pub attrs: StorageAttributes,
    pub block_count: u64,
    pub flags: u64,
}

impl SegmentHeader {
    pub fn to_bytes(&self) -> anyhow::Result<[u8; HEADER_SIZE as usize]> {
        let name = self.attrs.comptype.as_bytes();
        anyhow::ensure!(
            name.len() < COMPTYPE_FIELD_LEN,
            "compresstype \"{}\" does not fit the {}-byte header field",
            self.attrs.comptype,
            COMPTYPE_FIELD_LEN
        );
        let blocksize = u32::try_from(self.attrs.blocksize)?;

        let mut out = [0u8; HEADER_SIZE as usize];
        out[0..14].copy_from_slice(MAGIC);
        out[14..16].copy_from_slice(&self.version.to_le_bytes());
        out[16..20].copy_from_slice(&self.attrs.typid.0.to_le_bytes());
        out[20..24].copy_from_slice(&self.attrs.complevel.to_le_bytes());
        out[24..28].copy_from_slice(&blocksize.to_le_bytes());
        out[28..36].copy_from_slice(&self.block_count.to_le_bytes());
        out[36..44].copy_from_slice(&self.flags.to_le_bytes());
        out[COMPTYPE_OFFSET..COMPTYPE_OFFSET + name.len()].copy_from_slice(name);
        Ok(out)
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> anyhow::Result<Self> {
        anyhow::ensure!(&buf[0..14] == MAGIC, "not a column segment file (bad magic)");

        let field = &buf[COMPTYPE_OFFSET..COMPTYPE_OFFSET + COMPTYPE_FIELD_LEN];
        let Some(end) = field.iter().position(|&b| b == 0) else {
            anyhow::bail!("compresstype field is not NUL-terminated");
        };
        let comptype = std::str::from_utf8(&field[..end])?.to_string();

        Ok(Self {
            version: u16::from_le_bytes(le(buf, 14)),
            attrs: StorageAttributes {
                comptype,
                complevel: i32::from_le_bytes(le(buf, 20)),
                blocksize: u32::from_le_bytes(le(buf, 24)) as usize,
                typid: TypeId(u32::from_le_bytes(le(buf, 16))),
            },
            block_count: u64::from_le_bytes(le(buf, 28)),
            flags: u64::from_le_bytes(le(buf, 36)),
        })
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flags & flag == flag
    }
}

/// Where one block lives in the file and how to check it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEntry {
    /// Absolute file offset of the payload.
    pub offset: u64,
    pub stored_len: u32,
    /// Length once decoded; equal to `stored_len` for raw blocks.
    pub raw_len: u32,
    /// xxh3-64 of the payload as stored.
    pub checksum: u64,
    pub flags: u16,
}

impl BlockEntry {
    pub fn is_stored_raw(&self) -> bool {
        self.flags & BLOCK_STORED_RAW != 0
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_ENTRY_SIZE as usize] {
        let mut out = [0u8; BLOCK_ENTRY_SIZE as usize];
        out[0..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..12].copy_from_slice(&self.stored_len.to_le_bytes());
        out[12..16].copy_from_slice(&self.raw_len.to_le_bytes());
        out[16..24].copy_from_slice(&self.checksum.to_le_bytes());
        out[24..26].copy_from_slice(&self.flags.to_le_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8; BLOCK_ENTRY_SIZE as usize]) -> anyhow::Result<Self> {
        let entry = Self {
            offset: u64::from_le_bytes(le(buf, 0)),
            stored_len: u32::from_le_bytes(le(buf, 8)),
            raw_len: u32::from_le_bytes(le(buf, 12)),
            checksum: u64::from_le_bytes(le(buf, 16)),
            flags: u16::from_le_bytes(le(buf, 24)),
        };
        anyhow::ensure!(
            !entry.is_stored_raw() || entry.stored_len == entry.raw_len,
            "raw block at offset {} has stored length {} but raw length {}",
            entry.offset,
            entry.stored_len,
            entry.raw_len
        );
        Ok(entry)
    }
}
