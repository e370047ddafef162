use blockcomp_core::{AlgorithmError, CompressionAlgorithm, CompressionState, Direction, StorageAttributes, TupleDesc, TypeId};
use snap::raw::{max_compress_len, Decoder, Encoder};

pub const SNAPPY_PROVIDER: &str = "gp_snappy";

/// Snappy raw-block codec.
///
/// Fast, moderate ratio, no tunable level. The encoder's hash table is kept in
/// the compression state and reused for every block of a scan.
pub struct Snappy;

fn snappy_desired_sz(input: usize) -> usize {
    max_compress_len(input)
}

impl CompressionAlgorithm for Snappy {
    fn provider(&self) -> &'static str {
        SNAPPY_PROVIDER
    }

    fn construct(
        &self,
        _tupdesc: &TupleDesc,
        _attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError> {
        Ok(match direction {
            Direction::Compress => CompressionState::new(direction, snappy_desired_sz, Encoder::new()),
            Direction::Decompress => CompressionState::new(direction, snappy_desired_sz, Decoder::new()),
        })
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        state
            .opaque_mut::<Encoder>()?
            .compress(src, dst)
            .map_err(|e| AlgorithmError::new(format!("snappy compress failed: {}", e)))
    }

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        state
            .opaque_mut::<Decoder>()?
            .decompress(src, dst)
            .map_err(|e| AlgorithmError::new(format!("snappy decompress failed: {}", e)))
    }

    fn validate(&self, level: i32, _blocksize: usize, _typid: TypeId) -> Result<(), AlgorithmError> {
        if level == 0 || level == 1 {
            Ok(())
        } else {
            Err(AlgorithmError::new(format!(
                "compresslevel {} is not supported by snappy (only 1 is allowed)",
                level
            )))
        }
    }
}
