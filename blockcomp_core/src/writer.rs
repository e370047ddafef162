use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::Context;
use xxhash_rust::xxh3::xxh3_64;

use crate::attributes::{Direction, StorageAttributes};
use crate::format::{BlockEntry, SegmentHeader, BLOCK_STORED_RAW, FLAG_HAS_CHECKSUM, FORMAT_VERSION, HEADER_SIZE};
use crate::lifecycle::ScopedCompression;
use crate::registry::Registry;
use crate::types::TupleDesc;

/// Write side of a column segment.
///
/// # Write contract
/// Bytes handed to [`write`](Self::write) are cut into `blocksize` chunks and
/// each chunk goes through the one compression state opened in
/// [`create`](Self::create). [`finish`](Self::finish) compresses the short
/// tail, appends the block index and footer, then fills in the header that
/// was reserved at the start of the file.
///
/// # Layout written
/// ```text
/// header (128) | block 0 | block 1 | ... | index (32 per block) | footer (8)
/// ```
///
/// If the writer is dropped without `finish`, the file is left incomplete and
/// the compression state is still destructed.
pub struct SegmentWriter {
    out: BufWriter<File>,
    compression: ScopedCompression,
    attrs: StorageAttributes,
    /// Raw bytes waiting for a full block.
    buffered: Vec<u8>,
    /// Compression output, sized once from `desired_sz(blocksize)`.
    scratch: Vec<u8>,
    index: Vec<BlockEntry>,
    /// File offset where the next block lands.
    next_offset: u64,
}

impl SegmentWriter {
    /// Start a segment at `path` encoded with `attrs`, which are trusted to
    /// have been validated when the column was defined.
    pub fn create(
        path: impl AsRef<Path>,
        registry: &Registry,
        tupdesc: &TupleDesc,
        attrs: StorageAttributes,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(attrs.blocksize > 0, "segment block size must be positive");
        let entry = registry.lookup(&attrs.comptype)?;
        let compression = ScopedCompression::open(entry, tupdesc, &attrs, Direction::Compress)?;
        let scratch = vec![0u8; compression.desired_sz(attrs.blocksize)];

        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("creating segment file {:?}", path))?;
        let mut out = BufWriter::new(file);
        out.write_all(&[0u8; HEADER_SIZE as usize])?;

        Ok(Self {
            out,
            compression,
            buffered: Vec::with_capacity(attrs.blocksize),
            scratch,
            attrs,
            index: Vec::new(),
            next_offset: HEADER_SIZE,
        })
    }

    pub fn attributes(&self) -> &StorageAttributes {
        &self.attrs
    }

    pub fn write(&mut self, mut data: &[u8]) -> anyhow::Result<()> {
        let blocksize = self.attrs.blocksize;
        while !data.is_empty() {
            let take = (blocksize - self.buffered.len()).min(data.len());
            self.buffered.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffered.len() == blocksize {
                let block = std::mem::take(&mut self.buffered);
                self.append_block(&block)?;
                self.buffered = block;
                self.buffered.clear();
            }
        }
        Ok(())
    }

    fn append_block(&mut self, raw: &[u8]) -> anyhow::Result<()> {
        let capacity = self.compression.desired_sz(raw.len());
        if self.scratch.len() < capacity {
            self.scratch.resize(capacity, 0);
        }
        let written = self
            .compression
            .actuate(raw, &mut self.scratch[..capacity])
            .with_context(|| format!("compressing block {}", self.index.len()))?;

        // Blocks that do not shrink are kept raw so scans skip decoding them.
        let (payload, flags) = if written < raw.len() {
            (&self.scratch[..written], 0)
        } else {
            (raw, BLOCK_STORED_RAW)
        };
        self.out.write_all(payload)?;

        // ── Index entry ─────────────────────────────────────────────────────
        let stored_len = u32::try_from(payload.len())?;
        self.index.push(BlockEntry {
            offset: self.next_offset,
            stored_len,
            raw_len: u32::try_from(raw.len())?,
            checksum: xxh3_64(payload),
            flags,
        });
        self.next_offset += u64::from(stored_len);
        Ok(())
    }

    /// Seal the segment and destruct the compression state. Returns the
    /// number of blocks in the file.
    pub fn finish(mut self) -> anyhow::Result<u64> {
        if !self.buffered.is_empty() {
            let tail = std::mem::take(&mut self.buffered);
            self.append_block(&tail)?;
        }

        // ── Block index ─────────────────────────────────────────────────────
        for entry in &self.index {
            self.out.write_all(&entry.to_bytes())?;
        }

        // ── Footer: where the index starts ──────────────────────────────────
        self.out.write_all(&self.next_offset.to_le_bytes())?;

        // ── Header, now that the block count is known ───────────────────────
        let header = SegmentHeader {
            version: FORMAT_VERSION,
            attrs: self.attrs.clone(),
            block_count: self.index.len() as u64,
            flags: FLAG_HAS_CHECKSUM,
        };
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&header.to_bytes()?)?;
        self.out.flush()?;

        self.compression.finish();
        Ok(header.block_count)
    }
}
