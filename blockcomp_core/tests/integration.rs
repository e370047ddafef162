/// Integration tests for column segment files: the write path compresses
/// every block through one compression state, the scan path decodes any block
/// on its own through another.
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use blockcomp_codecs::builtin_registry;
use blockcomp_core::format::HEADER_SIZE;
use blockcomp_core::{
    CompressionError, Direction, Registry, SegmentReader, SegmentWriter, StorageAttributes, TupleDesc, TypeId,
};
use tempfile::TempDir;

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

/// An int8 column with long runs of repeated values.
fn int8_column(values: usize) -> Vec<u8> {
    (0..values)
        .flat_map(|i| ((i / 500) as i64 * 1_000_003).to_le_bytes())
        .collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

/// Overwrite `bytes` at `offset` in an existing file.
fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut f = OpenOptions::new().write(true).open(path).unwrap();
    f.seek(SeekFrom::Start(offset)).unwrap();
    f.write_all(bytes).unwrap();
}

struct Fixture {
    dir: TempDir,
    registry: Registry,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            registry: builtin_registry().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.seg", name))
    }

    /// Write `data` as one segment and return the number of blocks.
    fn write(&self, name: &str, attrs: StorageAttributes, data: &[u8]) -> u64 {
        let tupdesc = TupleDesc::single("c", attrs.typid);
        let mut w = SegmentWriter::create(self.path(name), &self.registry, &tupdesc, attrs).unwrap();
        w.write(data).unwrap();
        w.finish().unwrap()
    }

    fn open(&self, name: &str, typid: TypeId) -> SegmentReader {
        SegmentReader::open(self.path(name), &self.registry, &TupleDesc::single("c", typid)).unwrap()
    }

    fn read_all(&self, name: &str, typid: TypeId) -> Vec<u8> {
        let mut r = self.open(name, typid);
        let mut out = Vec::new();
        for i in 0..r.block_count() {
            out.extend(r.read_block(i).unwrap());
        }
        out
    }
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_every_builtin() {
    let fx = Fixture::new();
    let bytes = compressible_bytes(4 * 32768 + 1234);
    let ints = int8_column(20_000);

    for (comptype, level, typid, data) in [
        ("none", 0, TypeId::BYTEA, &bytes),
        ("snappy", 0, TypeId::BYTEA, &bytes),
        ("zlib", 5, TypeId::BYTEA, &bytes),
        ("quicklz", 1, TypeId::BYTEA, &bytes),
        ("rle_type", 1, TypeId::INT8, &ints),
        ("rle_type", 4, TypeId::INT8, &ints),
    ] {
        let name = format!("{}_{}", comptype, level);
        let attrs = StorageAttributes::new(comptype, level, 32768, typid);
        let blocks = fx.write(&name, attrs.clone(), data);
        assert_eq!(blocks as usize, data.len().div_ceil(32768));

        let r = fx.open(&name, typid);
        assert_eq!(r.attributes(), &attrs);
        assert_eq!(r.raw_size(), data.len() as u64);
        if comptype != "none" {
            assert!(r.stored_size() < r.raw_size(), "{} should shrink compressible data", name);
        }
        assert_eq!(&fx.read_all(&name, typid), data, "{} round-trip should be byte-exact", name);
    }
}

#[test]
fn test_incompressible_blocks_stored_raw() {
    let fx = Fixture::new();
    let data = pseudo_random_bytes(3 * 8192, 0x1234_5678);
    fx.write("random", StorageAttributes::new("zlib", 1, 8192, TypeId::BYTEA), &data);

    let r = fx.open("random", TypeId::BYTEA);
    assert!(r.entries().iter().all(|e| e.is_stored_raw()));
    assert!((r.ratio() - 1.0).abs() < f64::EPSILON);
    assert_eq!(fx.read_all("random", TypeId::BYTEA), data);
}

#[test]
fn test_random_access_single_block() {
    const NUM_BLOCKS: usize = 16;
    const TARGET_BLOCK: u64 = 12;
    let fx = Fixture::new();
    let data = compressible_bytes(NUM_BLOCKS * 8192);
    fx.write("random_access", StorageAttributes::new("snappy", 0, 8192, TypeId::BYTEA), &data);

    let mut r = fx.open("random_access", TypeId::BYTEA);
    let raw = r.read_block(TARGET_BLOCK).unwrap();
    let start = TARGET_BLOCK as usize * 8192;
    assert_eq!(raw.as_slice(), &data[start..start + 8192]);
}

#[test]
fn test_read_range_crosses_block_boundary() {
    let fx = Fixture::new();
    let data = compressible_bytes(4 * 8192);
    fx.write("range", StorageAttributes::new("quicklz", 0, 8192, TypeId::BYTEA), &data);

    let mut r = fx.open("range", TypeId::BYTEA);
    let start = 8192u64 - 100;
    let result = r.read_range(start, 300).unwrap();
    assert_eq!(result.as_slice(), &data[start as usize..start as usize + 300]);
    assert!(r.read_range(data.len() as u64, 1).is_err());
}

#[test]
fn test_unregistered_comptype_fails_to_open() {
    let fx = Fixture::new();
    fx.write("ext", StorageAttributes::new("zlib", 1, 8192, TypeId::BYTEA), b"payload");

    // Same file, scanned by an engine that never registered zlib.
    let bare = Registry::default();
    let err = SegmentReader::open(fx.path("ext"), &bare, &TupleDesc::default())
        .err()
        .unwrap()
        .to_string();
    assert!(err.contains("unknown compresstype \"zlib\""), "got: {err}");
}

#[test]
fn test_corrupt_block_is_a_hard_error() {
    let fx = Fixture::new();
    let data = compressible_bytes(2 * 8192);
    fx.write("corrupt", StorageAttributes::new("zlib", 3, 8192, TypeId::BYTEA), &data);

    // Flip a byte inside the first block's payload.
    patch(&fx.path("corrupt"), HEADER_SIZE + 4, &[0xff]);

    let mut r = fx.open("corrupt", TypeId::BYTEA);
    let err = r.read_block(0).unwrap_err().to_string();
    assert!(err.contains("checksum mismatch"), "got: {err}");
    assert_eq!(r.read_block(1).unwrap(), &data[8192..]);
}

#[test]
fn test_single_partial_block() {
    let fx = Fixture::new();
    let data = b"a small payload that fits in one partial block";
    let blocks = fx.write("single", StorageAttributes::new("zlib", 0, 8192, TypeId::TEXT), data);
    assert_eq!(blocks, 1);
    assert_eq!(fx.read_all("single", TypeId::TEXT), data);
}

#[test]
fn test_empty_segment() {
    let fx = Fixture::new();
    let blocks = fx.write("empty", StorageAttributes::default().with_type(TypeId::INT4), b"");
    assert_eq!(blocks, 0);
    let r = fx.open("empty", TypeId::INT4);
    assert_eq!(r.block_count(), 0);
    assert_eq!(r.ratio(), 1.0);
}

#[test]
fn test_undecodable_block_fails_in_the_codec() {
    let fx = Fixture::new();
    let data = compressible_bytes(2 * 8192);
    fx.write("garbled", StorageAttributes::new("zlib", 1, 8192, TypeId::BYTEA), &data);
    let first = fx.open("garbled", TypeId::BYTEA).entries()[0].clone();
    assert!(!first.is_stored_raw());

    // Same-length garbage payload, and a header that no longer carries
    // checksums, so the bytes reach the decompressor.
    patch(&fx.path("garbled"), first.offset, &vec![0xff; first.stored_len as usize]);
    patch(&fx.path("garbled"), 36, &0u64.to_le_bytes());

    let mut r = fx.open("garbled", TypeId::BYTEA);
    let err = r.read_block(0).unwrap_err();
    match err.downcast_ref::<CompressionError>() {
        Some(CompressionError::ActuationFailed { algorithm, direction, .. }) => {
            assert_eq!(algorithm, "zlib");
            assert_eq!(*direction, Direction::Decompress);
        }
        other => panic!("expected ActuationFailed, got {:?} ({err:#})", other),
    }
    assert_eq!(r.read_block(1).unwrap(), &data[8192..]);
}

#[test]
fn test_read_range_clamps_oversized_length() {
    let fx = Fixture::new();
    let data = compressible_bytes(20_000);
    fx.write("tail", StorageAttributes::new("zlib", 1, 8192, TypeId::BYTEA), &data);

    let mut r = fx.open("tail", TypeId::BYTEA);
    let tail = r.read_range(10, u64::MAX).unwrap();
    assert_eq!(tail.len(), 19_990);
    assert_eq!(tail.as_slice(), &data[10..]);
}

#[test]
fn test_zero_blocksize_header_rejected() {
    let fx = Fixture::new();
    fx.write("zero_bs", StorageAttributes::new("none", 0, 8192, TypeId::BYTEA), &compressible_bytes(100));
    patch(&fx.path("zero_bs"), 24, &0u32.to_le_bytes());

    let err = SegmentReader::read_header(fx.path("zero_bs")).unwrap_err().to_string();
    assert!(err.contains("zero block size"), "got: {err}");
    let err = SegmentReader::open(fx.path("zero_bs"), &fx.registry, &TupleDesc::default())
        .err()
        .unwrap()
        .to_string();
    assert!(err.contains("zero block size"), "got: {err}");
}

#[test]
fn test_block_count_beyond_file_rejected() {
    let fx = Fixture::new();
    fx.write("count", StorageAttributes::new("none", 0, 8192, TypeId::BYTEA), &compressible_bytes(3 * 8192));

    // Fits in u64 once multiplied, but not in the file; then overflows outright.
    for block_count in [1_000_000u64, u64::MAX / 2] {
        patch(&fx.path("count"), 28, &block_count.to_le_bytes());
        let err = SegmentReader::open(fx.path("count"), &fx.registry, &TupleDesc::default())
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("does not fit"), "got: {err}");
    }
}
