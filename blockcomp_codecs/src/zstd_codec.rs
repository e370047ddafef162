use blockcomp_core::attributes::effective_level;
use blockcomp_core::registry::{Oid, RegistryRow};
use blockcomp_core::{AlgorithmError, CompressionAlgorithm, CompressionState, Direction, StorageAttributes, TupleDesc, TypeId};
use zstd::bulk::{Compressor, Decompressor};

pub const ZSTD_PROVIDER: &str = "gp_zstd";

const DEFAULT_LEVEL: i32 = 1;
const MAX_LEVEL: i32 = 19;

/// Zstandard block codec.
///
/// Not part of the seed rows. It is published in the entry-point catalog and
/// becomes usable once a row such as [`zstd_row`] is registered.
///
/// Each block is an independent zstd frame; the compression and decompression
/// contexts live in the state and are reused across blocks.
///
/// Best for: general text, JSON, logs, mixed structured data.
pub struct Zstd;

/// Registry row that binds the name `zstd` to this implementer.
pub fn zstd_row(owner: Oid) -> RegistryRow {
    RegistryRow::for_provider("zstd", ZSTD_PROVIDER, owner)
}

fn zstd_desired_sz(input: usize) -> usize {
    zstd::zstd_safe::compress_bound(input)
}

fn check_level(level: i32) -> Result<i32, String> {
    match effective_level(level, DEFAULT_LEVEL) {
        l @ 1..=MAX_LEVEL => Ok(l),
        _ => Err(format!(
            "compresslevel {} is out of range for zstd (should be between 1 and {})",
            level, MAX_LEVEL
        )),
    }
}

impl CompressionAlgorithm for Zstd {
    fn provider(&self) -> &'static str {
        ZSTD_PROVIDER
    }

    fn construct(
        &self,
        _tupdesc: &TupleDesc,
        attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError> {
        match direction {
            Direction::Compress => {
                let level = check_level(attrs.complevel).map_err(AlgorithmError)?;
                let ctx = Compressor::new(level)
                    .map_err(|e| AlgorithmError::new(format!("could not create zstd context: {}", e)))?;
                Ok(CompressionState::new(direction, zstd_desired_sz, ctx))
            }
            Direction::Decompress => {
                let ctx = Decompressor::new()
                    .map_err(|e| AlgorithmError::new(format!("could not create zstd context: {}", e)))?;
                Ok(CompressionState::new(direction, zstd_desired_sz, ctx))
            }
        }
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        state
            .opaque_mut::<Compressor<'static>>()?
            .compress_to_buffer(src, dst)
            .map_err(|e| AlgorithmError::new(format!("zstd compress failed: {}", e)))
    }

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        state
            .opaque_mut::<Decompressor<'static>>()?
            .decompress_to_buffer(src, dst)
            .map_err(|e| AlgorithmError::new(format!("zstd decompress failed: {}", e)))
    }

    fn validate(&self, level: i32, _blocksize: usize, _typid: TypeId) -> Result<(), AlgorithmError> {
        check_level(level).map(|_| ()).map_err(AlgorithmError)
    }
}
