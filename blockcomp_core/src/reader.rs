use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use anyhow::Context;
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::attributes::{Direction, StorageAttributes};
use crate::format::{BlockEntry, SegmentHeader, BLOCK_ENTRY_SIZE, FLAG_HAS_CHECKSUM, FOOTER_SIZE, FORMAT_VERSION, HEADER_SIZE};
use crate::lifecycle::ScopedCompression;
use crate::registry::Registry;
use crate::types::TupleDesc;

/// Scan side of a column segment.
///
/// # Open sequence
/// 1. Read the header and check its framing (magic, version, a non-zero
///    block size). The storage attributes inside it are not validated again.
/// 2. Resolve the persisted compression type once and build the single
///    decompression state used for the whole scan.
/// 3. Follow the footer to the block index and load it, refusing an index
///    that claims more entries than the file can hold.
///
/// # Access pattern
/// Any block can be decoded on its own through [`read_block`](Self::read_block);
/// [`read_range`](Self::read_range) decodes only the blocks a byte range
/// touches.
///
/// Dropping the reader destructs the decompression state.
pub struct SegmentReader {
    file: File,
    header: SegmentHeader,
    index: Vec<BlockEntry>,
    compression: ScopedCompression,
}

fn load_header(file: &mut File) -> anyhow::Result<SegmentHeader> {
    let mut raw = [0u8; HEADER_SIZE as usize];
    file.read_exact(&mut raw).context("segment file is shorter than its header")?;
    let header = SegmentHeader::from_bytes(&raw)?;
    anyhow::ensure!(
        header.version == FORMAT_VERSION,
        "segment format version {} is not supported (expected {})",
        header.version,
        FORMAT_VERSION
    );
    anyhow::ensure!(header.attrs.blocksize > 0, "segment header has a zero block size");
    Ok(header)
}

/// The footer holds the offset of the index, which holds one entry per block.
fn load_index(file: &mut File, block_count: u64) -> anyhow::Result<Vec<BlockEntry>> {
    let file_len = file.metadata()?.len();
    anyhow::ensure!(
        file_len >= HEADER_SIZE + FOOTER_SIZE,
        "segment file is {} bytes, too short for header and footer",
        file_len
    );

    // ── Footer → index offset ───────────────────────────────────────────
    file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
    let mut footer = [0u8; FOOTER_SIZE as usize];
    file.read_exact(&mut footer)?;
    let index_offset = u64::from_le_bytes(footer);

    // ── Index size must fit between its offset and the footer ───────────
    let index_len = block_count
        .checked_mul(BLOCK_ENTRY_SIZE)
        .filter(|&len| {
            index_offset >= HEADER_SIZE
                && index_offset
                    .checked_add(len)
                    .is_some_and(|end| end <= file_len - FOOTER_SIZE)
        })
        .ok_or_else(|| {
            anyhow::anyhow!(
                "block index of {} entries at offset {} does not fit in a {} byte file",
                block_count,
                index_offset,
                file_len
            )
        })?;

    // ── Entries ─────────────────────────────────────────────────────────
    file.seek(SeekFrom::Start(index_offset))?;
    let mut raw = vec![0u8; index_len as usize];
    file.read_exact(&mut raw).context("block index is truncated")?;
    raw.chunks_exact(BLOCK_ENTRY_SIZE as usize)
        .map(|chunk| {
            let bytes: &[u8; BLOCK_ENTRY_SIZE as usize] = chunk.try_into()?;
            BlockEntry::from_bytes(bytes)
        })
        .collect()
}

impl SegmentReader {
    /// Header of a segment, without resolving its compression type.
    pub fn read_header(path: impl AsRef<Path>) -> anyhow::Result<SegmentHeader> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("opening segment file {:?}", path))?;
        load_header(&mut file)
    }

    pub fn open(path: impl AsRef<Path>, registry: &Registry, tupdesc: &TupleDesc) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).with_context(|| format!("opening segment file {:?}", path))?;
        let header = load_header(&mut file)?;

        let entry = registry.lookup(&header.attrs.comptype)?;
        let compression = ScopedCompression::open(entry, tupdesc, &header.attrs, Direction::Decompress)?;
        let index = load_index(&mut file, header.block_count)?;

        Ok(Self {
            file,
            header,
            index,
            compression,
        })
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    pub fn attributes(&self) -> &StorageAttributes {
        &self.header.attrs
    }

    #[inline]
    pub fn block_count(&self) -> u64 {
        self.header.block_count
    }

    /// Raw bytes per block. Only the final block may hold fewer.
    #[inline]
    pub fn blocksize(&self) -> usize {
        self.header.attrs.blocksize
    }

    pub fn raw_size(&self) -> u64 {
        self.index.iter().map(|e| u64::from(e.raw_len)).sum()
    }

    /// Bytes occupied by block payloads, not counting header, index and footer.
    pub fn stored_size(&self) -> u64 {
        self.index.iter().map(|e| u64::from(e.stored_len)).sum()
    }

    /// raw / stored; 1.0 for an empty segment.
    pub fn ratio(&self) -> f64 {
        match self.stored_size() {
            0 => 1.0,
            stored => self.raw_size() as f64 / stored as f64,
        }
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.index
    }

    /// Decode block `idx`.
    ///
    /// A checksum mismatch, a decompression failure or a decoded length that
    /// disagrees with the index aborts the read. Nothing partial is returned.
    pub fn read_block(&mut self, idx: u64) -> anyhow::Result<Vec<u8>> {
        let Some(entry) = self.index.get(idx as usize).cloned() else {
            anyhow::bail!("block {} does not exist, segment has {}", idx, self.index.len());
        };

        let mut stored = vec![0u8; entry.stored_len as usize];
        self.file.seek(SeekFrom::Start(entry.offset))?;
        self.file
            .read_exact(&mut stored)
            .with_context(|| format!("reading block {}", idx))?;

        // ── Integrity ───────────────────────────────────────────────────────
        if self.header.has_flag(FLAG_HAS_CHECKSUM) {
            let actual = xxh3_64(&stored);
            if actual != entry.checksum {
                warn!(block = idx, expected = entry.checksum, actual, "block checksum mismatch");
                anyhow::bail!(
                    "block {} checksum mismatch: index has {:016x}, payload hashes to {:016x}",
                    idx,
                    entry.checksum,
                    actual
                );
            }
        }

        // ── Decode ──────────────────────────────────────────────────────────
        let raw = if entry.is_stored_raw() {
            stored
        } else {
            let mut raw = vec![0u8; entry.raw_len as usize];
            let produced = self
                .compression
                .actuate(&stored, &mut raw)
                .with_context(|| format!("decompressing block {}", idx))?;
            raw.truncate(produced);
            raw
        };

        if raw.len() != entry.raw_len as usize {
            warn!(block = idx, decoded = raw.len(), expected = entry.raw_len, "block length mismatch");
            anyhow::bail!(
                "block {} decoded to {} bytes, index says {}",
                idx,
                raw.len(),
                entry.raw_len
            );
        }
        Ok(raw)
    }

    /// `len` raw bytes starting at raw offset `start`, decoding only the
    /// blocks that overlap the range. The range is clamped to the data.
    pub fn read_range(&mut self, start: u64, len: u64) -> anyhow::Result<Vec<u8>> {
        let total = self.raw_size();
        if len == 0 {
            return Ok(Vec::new());
        }
        anyhow::ensure!(start < total, "offset {} is past the end of the data ({} bytes)", start, total);

        let wanted: Range<u64> = start..start.saturating_add(len).min(total);
        let blocksize = self.blocksize() as u64;
        let mut out = Vec::with_capacity((wanted.end - wanted.start) as usize);

        for idx in wanted.start / blocksize..=(wanted.end - 1) / blocksize {
            let block = self.read_block(idx)?;
            let base = idx * blocksize;
            let from = wanted.start.saturating_sub(base) as usize;
            let to = ((wanted.end - base) as usize).min(block.len());
            out.extend_from_slice(&block[from..to]);
        }
        Ok(out)
    }
}
