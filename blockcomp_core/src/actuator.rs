use crate::attributes::Direction;
use crate::error::CompressionError;
use crate::registry::RegistryEntry;
use crate::state::CompressionState;

/// Compress or decompress one block.
///
/// Writes into `dst` (whose length is the capacity) and returns the number of
/// bytes produced. `state` must have been constructed for `direction`, and
/// for compression `dst` must hold at least `state.desired_sz(src.len())`
/// bytes; both are the caller's responsibility.
///
/// Runs once per storage block: no allocation, no registry access, a single
/// indirect call into the algorithm.
#[inline]
pub fn actuate(
    entry: &RegistryEntry,
    direction: Direction,
    src: &[u8],
    dst: &mut [u8],
    state: &mut CompressionState,
) -> Result<usize, CompressionError> {
    debug_assert_eq!(state.direction(), direction, "state built for the other direction");
    debug_assert!(
        direction == Direction::Decompress || dst.len() >= state.desired_sz(src.len()),
        "destination smaller than desired_sz"
    );

    let algorithm = entry.algorithm();
    let result = match direction {
        Direction::Compress => algorithm.compress(src, dst, state),
        Direction::Decompress => algorithm.decompress(src, dst, state),
    };
    match result {
        Ok(written) if written <= dst.len() => Ok(written),
        Ok(written) => Err(CompressionError::ActuationFailed {
            algorithm: entry.name().to_string(),
            direction,
            reason: format!("reported {} bytes written into a {} byte buffer", written, dst.len()),
        }),
        Err(e) => Err(CompressionError::ActuationFailed {
            algorithm: entry.name().to_string(),
            direction,
            reason: e.0,
        }),
    }
}
