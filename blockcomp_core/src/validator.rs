use tracing::debug;

use crate::attributes::{StorageAttributes, MAX_BLOCKSIZE, MIN_BLOCKSIZE};
use crate::error::CompressionError;
use crate::registry::Registry;

/// Check proposed storage attributes at DDL time.
///
/// In order: the compression type must be registered, the block size must
/// fall within the engine limits, and the algorithm's own validator must
/// accept the level, block size and column type. The algorithm's reason is
/// passed through verbatim.
pub fn validate(registry: &Registry, attrs: &StorageAttributes) -> Result<(), CompressionError> {
    let entry = registry.lookup(&attrs.comptype)?;

    let reject = |reason: String| {
        debug!(comptype = %attrs.comptype, %reason, "storage attributes rejected");
        CompressionError::InvalidConfig {
            algorithm: attrs.comptype.clone(),
            reason,
        }
    };

    check_blocksize(attrs.blocksize).map_err(reject)?;

    entry
        .algorithm()
        .validate(attrs.complevel, attrs.blocksize, attrs.typid)
        .map_err(|e| reject(e.0))
}

fn check_blocksize(blocksize: usize) -> Result<(), String> {
    if !(MIN_BLOCKSIZE..=MAX_BLOCKSIZE).contains(&blocksize) || blocksize % MIN_BLOCKSIZE != 0 {
        return Err(format!(
            "block size must be between {} and {} and be a multiple of {}, got {}",
            MIN_BLOCKSIZE, MAX_BLOCKSIZE, MIN_BLOCKSIZE, blocksize
        ));
    }
    Ok(())
}
