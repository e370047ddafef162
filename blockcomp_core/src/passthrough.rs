use crate::algorithm::{copy_into, CompressionAlgorithm};
use crate::attributes::{Direction, StorageAttributes};
use crate::error::AlgorithmError;
use crate::state::CompressionState;
use crate::types::{TupleDesc, TypeId};

/// Provider prefix of the built-in passthrough entry points.
pub const PASSTHROUGH_PROVIDER: &str = "gp_dummy_compression";

/// The `none` algorithm: blocks are stored verbatim.
///
/// Always present in every registry. Output is bit-identical to input in both
/// directions, and any level, block size or column type is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

fn passthrough_desired_sz(input: usize) -> usize {
    input
}

impl CompressionAlgorithm for PassThrough {
    fn provider(&self) -> &'static str {
        PASSTHROUGH_PROVIDER
    }

    fn construct(
        &self,
        _tupdesc: &TupleDesc,
        _attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<CompressionState, AlgorithmError> {
        Ok(CompressionState::stateless(direction, passthrough_desired_sz))
    }

    fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        _state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        copy_into(src, dst)
    }

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        _state: &mut CompressionState,
    ) -> Result<usize, AlgorithmError> {
        copy_into(src, dst)
    }

    fn validate(&self, _level: i32, _blocksize: usize, _typid: TypeId) -> Result<(), AlgorithmError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_both_ways() {
        let attrs = StorageAttributes::default();
        let tupdesc = TupleDesc::default();
        let data = b"\x00\x01\x02 verbatim bytes \xff";

        let mut c = PassThrough.construct(&tupdesc, &attrs, Direction::Compress).unwrap();
        let mut out = vec![0u8; c.desired_sz(data.len())];
        let n = PassThrough.compress(data, &mut out, &mut c).unwrap();
        assert_eq!(&out[..n], data);

        let mut d = PassThrough.construct(&tupdesc, &attrs, Direction::Decompress).unwrap();
        let mut back = vec![0u8; data.len()];
        let n = PassThrough.decompress(&out[..n], &mut back, &mut d).unwrap();
        assert_eq!(&back[..n], data);
    }

    #[test]
    fn short_destination_is_an_error() {
        let attrs = StorageAttributes::default();
        let mut c = PassThrough
            .construct(&TupleDesc::default(), &attrs, Direction::Compress)
            .unwrap();
        let mut out = [0u8; 3];
        assert!(PassThrough.compress(b"four", &mut out, &mut c).is_err());
    }
}
