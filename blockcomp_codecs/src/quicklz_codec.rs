use blockcomp_core::{AlgorithmError, CompressionAlgorithm, CompressionState, Direction, StorageAttributes, TupleDesc, TypeId};
use lz4_flex::block::{compress_into, decompress_into, get_maximum_output_size};

pub const QUICKLZ_PROVIDER: &str = "gp_quicklz";

/// Bytes of the length prefix in front of every block.
const PREFIX_LEN: usize = 4;

/// quicklz-family LZ77 block codec.
///
/// Block layout is `[raw_len: u32 LE][lz4 block]`, so the decoder can refuse
/// a block that claims to expand past the column's block size before touching
/// the payload. Only level 1 exists.
///
/// Best for: hot columns where decode speed matters more than size reduction.
pub struct QuickLz;

/// Decoder-side limit taken from the column's block size.
struct BlockLimit {
    blocksize: usize,
}

fn quicklz_desired_sz(input: usize) -> usize {
    PREFIX_LEN + get_maximum_output_size(input)
}

impl CompressionAlgorithm for QuickLz {
    fn provider(&self) -> &'static str {
        QUICKLZ_PROVIDER
    }

    fn construct(
        &self,
        _tupdesc: &TupleDesc,
        attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError> {
        Ok(match direction {
            Direction::Compress => CompressionState::stateless(direction, quicklz_desired_sz),
            Direction::Decompress => CompressionState::new(
                direction,
                quicklz_desired_sz,
                BlockLimit {
                    blocksize: attrs.blocksize,
                },
            ),
        })
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        _state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        let raw_len = u32::try_from(src.len())
            .map_err(|_| AlgorithmError::new(format!("block of {} bytes is too large", src.len())))?;
        if dst.len() < PREFIX_LEN {
            return Err(AlgorithmError::new("destination cannot hold the block header"));
        }
        let (prefix, body) = dst.split_at_mut(PREFIX_LEN);
        prefix.copy_from_slice(&raw_len.to_le_bytes());
        let written = compress_into(src, body)
            .map_err(|e| AlgorithmError::new(format!("quicklz compress failed: {}", e)))?;
        Ok(PREFIX_LEN + written)
    }

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        let limit = state.opaque_mut::<BlockLimit>()?.blocksize;
        if src.len() < PREFIX_LEN {
            return Err(AlgorithmError::new("quicklz block is shorter than its header"));
        }
        let (prefix, body) = src.split_at(PREFIX_LEN);
        let raw_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if raw_len > limit || raw_len > dst.len() {
            return Err(AlgorithmError::new(format!(
                "quicklz block claims {} raw bytes, more than the {} available",
                raw_len,
                limit.min(dst.len())
            )));
        }
        let produced = decompress_into(body, &mut dst[..raw_len])
            .map_err(|e| AlgorithmError::new(format!("quicklz decompress failed: {}", e)))?;
        if produced != raw_len {
            return Err(AlgorithmError::new(format!(
                "quicklz block decoded to {} bytes, header says {}",
                produced, raw_len
            )));
        }
        Ok(produced)
    }

    fn validate(&self, level: i32, _blocksize: usize, _typid: TypeId) -> Result<(), AlgorithmError> {
        if level == 0 || level == 1 {
            Ok(())
        } else {
            Err(AlgorithmError::new(format!(
                "compresslevel {} is not supported by quicklz (only 1 is allowed)",
                level
            )))
        }
    }
}
