//! Properties every registered algorithm must satisfy on single blocks.
use blockcomp_codecs::{builtin_registry, zstd_row};
use blockcomp_core::registry::BOOTSTRAP_SUPERUSER;
use blockcomp_core::{
    validate, CompressionError, Direction, Registry, ScopedCompression, StorageAttributes, TupleDesc, TypeId,
};
use proptest::prelude::*;

const BLOCKSIZE: usize = 8192;

fn registry() -> Registry {
    let mut registry = builtin_registry().unwrap();
    registry.register(zstd_row(BOOTSTRAP_SUPERUSER)).unwrap();
    registry
}

/// Compress then decompress one block, returning (compressed len, desired_sz, output).
fn round_trip(registry: &Registry, attrs: &StorageAttributes, data: &[u8]) -> (usize, usize, Vec<u8>) {
    let tupdesc = TupleDesc::single("c", attrs.typid);
    let entry = registry.lookup(&attrs.comptype).unwrap();

    let mut compressor = ScopedCompression::open(entry.clone(), &tupdesc, attrs, Direction::Compress).unwrap();
    let desired = compressor.desired_sz(data.len());
    let mut compressed = vec![0u8; desired];
    let written = compressor.actuate(data, &mut compressed).unwrap();

    let mut decompressor = ScopedCompression::open(entry, &tupdesc, attrs, Direction::Decompress).unwrap();
    let mut out = vec![0u8; data.len()];
    let produced = decompressor.actuate(&compressed[..written], &mut out).unwrap();
    out.truncate(produced);

    (written, desired, out)
}

fn byte_codecs() -> Vec<StorageAttributes> {
    vec![
        StorageAttributes::new("none", 0, BLOCKSIZE, TypeId::BYTEA),
        StorageAttributes::new("snappy", 0, BLOCKSIZE, TypeId::BYTEA),
        StorageAttributes::new("zlib", 1, BLOCKSIZE, TypeId::BYTEA),
        StorageAttributes::new("zlib", 9, BLOCKSIZE, TypeId::BYTEA),
        StorageAttributes::new("quicklz", 1, BLOCKSIZE, TypeId::BYTEA),
        StorageAttributes::new("zstd", 3, BLOCKSIZE, TypeId::BYTEA),
    ]
}

fn bytes_with_runs() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..=BLOCKSIZE),
        proptest::collection::vec((any::<u8>(), 1usize..64), 0..256).prop_map(|runs| {
            let mut data: Vec<u8> = runs.into_iter().flat_map(|(b, n)| std::iter::repeat(b).take(n)).collect();
            data.truncate(BLOCKSIZE);
            data
        }),
    ]
}

fn int4_column() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec((0i32..4, 1usize..40), 0..200).prop_map(|runs| {
        let mut data: Vec<u8> = runs
            .into_iter()
            .flat_map(|(v, n)| std::iter::repeat(v).take(n))
            .flat_map(|v| v.to_le_bytes())
            .collect();
        data.truncate(BLOCKSIZE);
        data
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn byte_codecs_round_trip_within_desired_size(data in bytes_with_runs()) {
        let registry = registry();
        for attrs in byte_codecs() {
            let (written, desired, out) = round_trip(&registry, &attrs, &data);
            prop_assert!(written <= desired, "{}: {} > {}", attrs.comptype, written, desired);
            prop_assert_eq!(&out, &data, "{} did not round-trip", attrs.comptype);
        }
    }

    #[test]
    fn rle_type_round_trips_fixed_width_values(data in int4_column(), level in 0i32..=4) {
        let registry = registry();
        let attrs = StorageAttributes::new("rle_type", level, BLOCKSIZE, TypeId::INT4);
        let (written, desired, out) = round_trip(&registry, &attrs, &data);
        prop_assert!(written <= desired);
        prop_assert_eq!(out, data);
    }

    #[test]
    fn passthrough_is_identity(data in proptest::collection::vec(any::<u8>(), 0..=BLOCKSIZE)) {
        let registry = registry();
        let attrs = StorageAttributes::new("none", 0, BLOCKSIZE, TypeId::BYTEA);
        let entry = registry.lookup("none").unwrap();
        let tupdesc = TupleDesc::default();

        let mut c = ScopedCompression::open(entry.clone(), &tupdesc, &attrs, Direction::Compress).unwrap();
        let mut compressed = vec![0u8; c.desired_sz(data.len())];
        let n = c.actuate(&data, &mut compressed).unwrap();
        prop_assert_eq!(&compressed[..n], &data[..]);

        let mut d = ScopedCompression::open(entry, &tupdesc, &attrs, Direction::Decompress).unwrap();
        let mut out = vec![0u8; data.len()];
        let n = d.actuate(&data, &mut out).unwrap();
        prop_assert_eq!(&out[..n], &data[..]);
    }

    #[test]
    fn validation_is_deterministic(
        comptype in prop::sample::select(vec!["none", "snappy", "zlib", "quicklz", "rle_type", "zstd", "lzma"]),
        level in -2i32..25,
        blocksize in prop::sample::select(vec![0usize, 4096, 8192, 12288, 32768, 2 * 1024 * 1024, 4 * 1024 * 1024]),
        typid in prop::sample::select(vec![TypeId::INT4, TypeId::INT8, TypeId::TEXT, TypeId::NUMERIC, TypeId::BOOL]),
    ) {
        let registry = registry();
        let attrs = StorageAttributes::new(comptype, level, blocksize, typid);
        prop_assert_eq!(validate(&registry, &attrs), validate(&registry, &attrs));
    }

    #[test]
    fn unregistered_names_are_unknown_never_invalid(
        name in "[a-z_]{1,20}",
        level in -5i32..50,
        blocksize in 0usize..(4 * 1024 * 1024),
    ) {
        let registry = registry();
        prop_assume!(!registry.is_valid(&name));
        let attrs = StorageAttributes::new(name.clone(), level, blocksize, TypeId::TEXT);
        prop_assert_eq!(validate(&registry, &attrs), Err(CompressionError::UnknownAlgorithm { name }));
    }
}
