use blockcomp_core::attributes::effective_level;
use blockcomp_core::{AlgorithmError, CompressionAlgorithm, CompressionState, Direction, StorageAttributes, TupleDesc, TypeId};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

pub const ZLIB_PROVIDER: &str = "gp_zlib";

const DEFAULT_LEVEL: i32 = 1;

/// zlib (deflate with zlib framing) block codec.
///
/// The deflate/inflate stream context is allocated once per scan and reset
/// for every block, so blocks stay independent without paying for a fresh
/// context each time.
///
/// Levels 1–9; 0 selects level 1.
pub struct Zlib;

/// Worst-case deflate output for `n` input bytes, covering both the zlib and
/// miniz bound formulas.
pub(crate) fn deflate_bound(n: usize) -> usize {
    let zlib = n + (n >> 12) + (n >> 14) + (n >> 25) + 13;
    let stored = 128 + n + (n / (31 * 1024) + 1) * 5;
    let ratio = 128 + n.saturating_mul(110) / 100;
    zlib.max(stored).max(ratio)
}

/// Deflate `src` into `dst` as one complete zlib stream.
pub(crate) fn deflate_into(ctx: &mut Compress, src: &[u8], dst: &mut [u8]) -> Result<usize, AlgorithmError> {
    ctx.reset();
    match ctx.compress(src, dst, FlushCompress::Finish) {
        Ok(Status::StreamEnd) => Ok(ctx.total_out() as usize),
        Ok(_) => Err(AlgorithmError::new(format!(
            "deflate output does not fit in {} bytes",
            dst.len()
        ))),
        Err(e) => Err(AlgorithmError::new(format!("deflate failed: {}", e))),
    }
}

/// Inflate one complete zlib stream from `src` into `dst`.
pub(crate) fn inflate_into(ctx: &mut Decompress, src: &[u8], dst: &mut [u8]) -> Result<usize, AlgorithmError> {
    ctx.reset(true);
    match ctx.decompress(src, dst, FlushDecompress::Finish) {
        Ok(Status::StreamEnd) => Ok(ctx.total_out() as usize),
        Ok(_) => Err(AlgorithmError::new(format!(
            "zlib stream is truncated or inflates beyond {} bytes",
            dst.len()
        ))),
        Err(e) => Err(AlgorithmError::new(format!("inflate failed: {}", e))),
    }
}

pub(crate) fn check_zlib_level(level: i32) -> Result<u32, String> {
    match effective_level(level, DEFAULT_LEVEL) {
        l @ 1..=9 => Ok(l as u32),
        _ => Err(format!(
            "compresslevel {} is out of range for zlib (should be between 1 and 9)",
            level
        )),
    }
}

impl CompressionAlgorithm for Zlib {
    fn provider(&self) -> &'static str {
        ZLIB_PROVIDER
    }

    fn construct(
        &self,
        _tupdesc: &TupleDesc,
        attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError> {
        match direction {
            Direction::Compress => {
                let level = check_zlib_level(attrs.complevel).map_err(AlgorithmError)?;
                let ctx = Compress::new(Compression::new(level), true);
                Ok(CompressionState::new(direction, deflate_bound, ctx))
            }
            Direction::Decompress => Ok(CompressionState::new(direction, deflate_bound, Decompress::new(true))),
        }
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        deflate_into(state.opaque_mut::<Compress>()?, src, dst)
    }

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        inflate_into(state.opaque_mut::<Decompress>()?, src, dst)
    }

    fn validate(&self, level: i32, _blocksize: usize, _typid: TypeId) -> Result<(), AlgorithmError> {
        check_zlib_level(level).map(|_| ()).map_err(AlgorithmError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(check_zlib_level(0), Ok(1));
        assert_eq!(check_zlib_level(9), Ok(9));
        assert!(check_zlib_level(10).is_err());
        assert!(check_zlib_level(-1).is_err());
    }

    #[test]
    fn context_is_reused_across_blocks() {
        let attrs = StorageAttributes::new("zlib", 6, 8192, TypeId::TEXT);
        let tupdesc = TupleDesc::default();
        let mut c = Zlib.construct(&tupdesc, &attrs, Direction::Compress).unwrap();
        let mut d = Zlib.construct(&tupdesc, &attrs, Direction::Decompress).unwrap();

        for block in [&b"first block first block first block"[..], &b"second"[..]] {
            let mut out = vec![0u8; c.desired_sz(block.len())];
            let n = Zlib.compress(block, &mut out, &mut c).unwrap();
            let mut back = vec![0u8; block.len()];
            let m = Zlib.decompress(&out[..n], &mut back, &mut d).unwrap();
            assert_eq!(&back[..m], block);
        }
    }

    #[test]
    fn garbage_fails_to_inflate() {
        let attrs = StorageAttributes::new("zlib", 1, 8192, TypeId::TEXT);
        let mut d = Zlib
            .construct(&TupleDesc::default(), &attrs, Direction::Decompress)
            .unwrap();
        let mut out = vec![0u8; 64];
        assert!(Zlib.decompress(b"definitely not zlib", &mut out, &mut d).is_err());
    }
}
