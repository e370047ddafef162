use std::sync::Arc;

use tracing::debug;

use crate::actuator::actuate;
use crate::attributes::{Direction, StorageAttributes};
use crate::error::CompressionError;
use crate::registry::RegistryEntry;
use crate::state::CompressionState;
use crate::types::TupleDesc;

/// Invoke the entry's constructor.
///
/// A failure is fatal to the scan or write being opened; there is no fallback
/// to `none`.
pub fn construct(
    entry: &RegistryEntry,
    tupdesc: &TupleDesc,
    attrs: &StorageAttributes,
    direction: Direction,
) -> Result<CompressionState, CompressionError> {
    let state = entry
        .algorithm()
        .construct(tupdesc, attrs, direction)
        .map_err(|e| CompressionError::ConstructionFailed {
            algorithm: entry.name().to_string(),
            direction,
            reason: e.0,
        })?;
    debug!(algorithm = entry.name(), %direction, blocksize = attrs.blocksize, "constructed compression state");
    Ok(state)
}

/// Invoke the entry's destructor. Consumes the state, so it can only happen once.
pub fn destruct(entry: &RegistryEntry, state: CompressionState) {
    let direction = state.direction();
    entry.algorithm().destruct(state);
    debug!(algorithm = entry.name(), %direction, "destructed compression state");
}

/// A compression state bound to the scope that opened it.
///
/// Owns the resolved registry entry and exactly one state. The state is
/// destructed when this value is dropped or [`finish`](Self::finish)ed,
/// whichever comes first, so early returns through `?` and unwinding panics
/// release it too. Not `Clone` and not `Sync`: every concurrent scan of a
/// column builds its own.
pub struct ScopedCompression {
    entry: Arc<RegistryEntry>,
    state: Option<CompressionState>,
}

impl ScopedCompression {
    pub fn open(
        entry: Arc<RegistryEntry>,
        tupdesc: &TupleDesc,
        attrs: &StorageAttributes,
        direction: Direction,
    ) -> Result<Self, CompressionError> {
        let state = construct(&entry, tupdesc, attrs, direction)?;
        Ok(Self {
            entry,
            state: Some(state),
        })
    }

    pub fn entry(&self) -> &RegistryEntry {
        &self.entry
    }

    pub fn algorithm_name(&self) -> &str {
        self.entry.name()
    }

    #[inline]
    fn state(&self) -> &CompressionState {
        // Only `finish` and `drop` take the state, and both consume `self`.
        self.state.as_ref().unwrap_or_else(|| unreachable!("state taken before scope end"))
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.state().direction()
    }

    /// Worst-case output size for `input_len` bytes. Query before every
    /// compress call to size the destination.
    #[inline]
    pub fn desired_sz(&self, input_len: usize) -> usize {
        self.state().desired_sz(input_len)
    }

    /// Run one block through the state in its own direction.
    #[inline]
    pub fn actuate(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressionError> {
        let state = self
            .state
            .as_mut()
            .unwrap_or_else(|| unreachable!("state taken before scope end"));
        actuate(&self.entry, state.direction(), src, dst, state)
    }

    /// End the scope now instead of at drop.
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(state) = self.state.take() {
            destruct(&self.entry, state);
        }
    }
}

impl Drop for ScopedCompression {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ScopedCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedCompression")
            .field("algorithm", &self.entry.name())
            .field("state", &self.state)
            .finish()
    }
}
